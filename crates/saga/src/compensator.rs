//! Retrying executor for the inverse of already-applied steps.

use std::sync::Arc;

use chrono::Utc;
use common::RequestContext;
use uuid::Uuid;

use crate::escalation::{EscalationLog, EscalationRecord};
use crate::retry::RetryPolicy;
use crate::step::Step;

/// Outcome of one compensation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompensationReport {
    /// Number of inverses that eventually succeeded.
    pub compensated: usize,
    /// Input indices of the inverses that succeeded, in the order they ran.
    pub succeeded: Vec<usize>,
    /// Inverses still failing after all retries, already escalated.
    pub residual: Vec<EscalationRecord>,
}

impl CompensationReport {
    /// Returns true if every inverse succeeded.
    pub fn is_complete(&self) -> bool {
        self.residual.is_empty()
    }
}

/// Runs inverses one at a time in strict reverse order of application,
/// retrying each under a [`RetryPolicy`].
///
/// A failing inverse never stops the others and never surfaces as an
/// error: it is written to the escalation log and reported as residual.
#[derive(Clone)]
pub struct Compensator {
    policy: RetryPolicy,
    escalation: Arc<dyn EscalationLog>,
}

impl Compensator {
    pub fn new(policy: RetryPolicy, escalation: Arc<dyn EscalationLog>) -> Self {
        Self { policy, escalation }
    }

    /// Returns a compensator sharing this escalation log with another policy.
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            policy,
            escalation: self.escalation.clone(),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Compensates `applied`, given in the order the forward actions ran.
    #[tracing::instrument(skip(self, ctx, applied), fields(actions = applied.len()))]
    pub async fn compensate<S: Step>(
        &self,
        saga: &'static str,
        ctx: &RequestContext,
        applied: &[S],
    ) -> CompensationReport {
        let mut report = CompensationReport::default();

        for (index, step) in applied.iter().enumerate().rev() {
            match self.compensate_one(saga, ctx, step).await {
                Ok(()) => {
                    report.compensated += 1;
                    report.succeeded.push(index);
                }
                Err(record) => {
                    self.escalation.record(record.clone()).await;
                    report.residual.push(record);
                }
            }
        }

        if !report.is_complete() {
            tracing::warn!(
                saga,
                compensated = report.compensated,
                residual = report.residual.len(),
                "compensation finished with residual failures"
            );
        }
        report
    }

    async fn compensate_one<S: Step>(
        &self,
        saga: &'static str,
        ctx: &RequestContext,
        step: &S,
    ) -> Result<(), EscalationRecord> {
        let mut attempt = 1;
        loop {
            metrics::counter!("compensation_attempts_total", "saga" => saga, "step" => step.name())
                .increment(1);

            let error = match step.inverse(ctx).await {
                Ok(affected) => {
                    tracing::info!(
                        saga,
                        step = step.name(),
                        resource_key = %step.resource_key(),
                        attempt,
                        affected,
                        "compensation succeeded"
                    );
                    return Ok(());
                }
                Err(error) => error,
            };

            tracing::warn!(
                saga,
                step = step.name(),
                resource_key = %step.resource_key(),
                attempt,
                %error,
                "compensation attempt failed"
            );

            match self.policy.backoff_after(attempt) {
                Some(delay) => {
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    metrics::counter!("compensation_residual_total", "saga" => saga, "step" => step.name())
                        .increment(1);
                    return Err(EscalationRecord {
                        id: Uuid::new_v4(),
                        saga: saga.to_string(),
                        step: step.name().to_string(),
                        resource_key: step.resource_key(),
                        magnitude: step.magnitude(),
                        attempts: attempt,
                        error: error.to_string(),
                        recorded_at: Utc::now(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::escalation::InMemoryEscalationLog;
    use crate::step::testing::ScriptedStep;

    fn setup(policy: RetryPolicy) -> (Compensator, Arc<InMemoryEscalationLog>) {
        let log = Arc::new(InMemoryEscalationLog::new());
        (Compensator::new(policy, log.clone()), log)
    }

    #[tokio::test(start_paused = true)]
    async fn test_compensates_in_reverse_order() {
        let (compensator, log) = setup(RetryPolicy::default());
        let journal = Arc::new(Mutex::new(Vec::new()));
        let steps = vec![
            ScriptedStep::new("1", journal.clone()),
            ScriptedStep::new("2", journal.clone()),
            ScriptedStep::new("3", journal.clone()),
        ];

        let report = compensator
            .compensate("test", &RequestContext::system(), &steps)
            .await;

        assert_eq!(report.compensated, 3);
        assert_eq!(report.succeeded, vec![2, 1, 0]);
        assert!(report.is_complete());
        assert!(log.is_empty().await);
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["inverse:3", "inverse:2", "inverse:1"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_exponential_backoff() {
        let (compensator, log) = setup(RetryPolicy::new(3, Duration::from_secs(1)));
        let journal = Arc::new(Mutex::new(Vec::new()));
        let steps = vec![ScriptedStep::new("flaky", journal.clone()).failing_inverse(2)];

        let started = Instant::now();
        let report = compensator
            .compensate("test", &RequestContext::system(), &steps)
            .await;

        assert!(report.is_complete());
        assert_eq!(steps[0].inverse_calls(), 3);
        // 1s after attempt 1, 2s after attempt 2
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert!(log.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_residual_failure_is_escalated_and_others_continue() {
        let (compensator, log) = setup(RetryPolicy::new(3, Duration::from_millis(500)));
        let journal = Arc::new(Mutex::new(Vec::new()));
        let steps = vec![
            ScriptedStep::new("first", journal.clone()),
            ScriptedStep::new("broken", journal.clone()).failing_inverse(u32::MAX),
        ];

        let started = Instant::now();
        let report = compensator
            .compensate("test", &RequestContext::system(), &steps)
            .await;

        assert_eq!(report.compensated, 1);
        assert_eq!(report.succeeded, vec![0]);
        assert_eq!(report.residual.len(), 1);
        assert_eq!(steps[1].inverse_calls(), 3);
        assert_eq!(steps[0].inverse_calls(), 1);
        // no sleep after the final attempt
        assert_eq!(started.elapsed(), Duration::from_millis(1500));

        let escalated = log.list().await;
        assert_eq!(escalated.len(), 1);
        assert_eq!(escalated[0].resource_key, "broken");
        assert_eq!(escalated[0].attempts, 3);
        assert_eq!(escalated[0].saga, "test");
        assert_eq!(report.residual[0], escalated[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy() {
        let (compensator, log) = setup(RetryPolicy::default());
        let single = compensator.with_policy(RetryPolicy::single_attempt());
        let journal = Arc::new(Mutex::new(Vec::new()));
        let steps = vec![ScriptedStep::new("once", journal).failing_inverse(1)];

        let report = single
            .compensate("test", &RequestContext::system(), &steps)
            .await;

        assert_eq!(steps[0].inverse_calls(), 1);
        assert_eq!(report.residual.len(), 1);
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_input_is_complete() {
        let (compensator, _) = setup(RetryPolicy::default());
        let steps: Vec<ScriptedStep> = Vec::new();
        let report = compensator
            .compensate("test", &RequestContext::system(), &steps)
            .await;
        assert_eq!(report, CompensationReport::default());
    }
}
