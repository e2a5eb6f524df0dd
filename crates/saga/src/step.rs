//! Reversible remote steps and the generic forward runner.

use async_trait::async_trait;
use common::RequestContext;

use crate::compensator::{CompensationReport, Compensator};
use crate::error::RemoteError;

/// A remote state change with a separately callable inverse.
///
/// Both directions must be no-ops, not errors, when nothing applicable
/// remains on the remote side.
#[async_trait]
pub trait Step: Send + Sync {
    /// Stable step name used in logs, metrics and escalation records.
    fn name(&self) -> &'static str;

    /// Correlation key of the remote resource.
    fn resource_key(&self) -> String;

    /// Count or signed delta the inverse puts back.
    fn magnitude(&self) -> i64;

    /// Applies the change. Returns the number of affected records or units.
    async fn forward(&self, ctx: &RequestContext) -> Result<u64, RemoteError>;

    /// Reverts the change.
    async fn inverse(&self, ctx: &RequestContext) -> Result<u64, RemoteError>;
}

/// The step that failed and what happened to the steps before it.
#[derive(Debug)]
pub struct StepFailure {
    /// Index of the failed step in the input slice.
    pub index: usize,
    pub error: RemoteError,
    pub report: CompensationReport,
}

/// Applies `steps` in order.
///
/// On the first failure, every step already applied is handed to the
/// compensator; the failed step itself is not compensated. Returns the
/// forward results on success.
pub async fn run_steps<S: Step>(
    saga: &'static str,
    ctx: &RequestContext,
    steps: &[S],
    compensator: &Compensator,
) -> Result<Vec<u64>, StepFailure> {
    let mut results = Vec::with_capacity(steps.len());

    for (index, step) in steps.iter().enumerate() {
        tracing::debug!(saga, step = step.name(), resource_key = %step.resource_key(), "saga step started");
        match step.forward(ctx).await {
            Ok(affected) => results.push(affected),
            Err(error) => {
                tracing::warn!(
                    saga,
                    step = step.name(),
                    resource_key = %step.resource_key(),
                    %error,
                    applied = index,
                    "saga step failed, compensating"
                );
                let report = compensator.compensate(saga, ctx, &steps[..index]).await;
                return Err(StepFailure {
                    index,
                    error,
                    report,
                });
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Scripted step recording every call into a shared journal.
    pub struct ScriptedStep {
        pub key: String,
        pub fail_forward: bool,
        /// Number of leading inverse calls that fail.
        pub inverse_failures: u32,
        pub journal: Arc<Mutex<Vec<String>>>,
        inverse_calls: Mutex<u32>,
    }

    impl ScriptedStep {
        pub fn new(key: &str, journal: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                key: key.to_string(),
                fail_forward: false,
                inverse_failures: 0,
                journal,
                inverse_calls: Mutex::new(0),
            }
        }

        pub fn failing_forward(mut self) -> Self {
            self.fail_forward = true;
            self
        }

        pub fn failing_inverse(mut self, times: u32) -> Self {
            self.inverse_failures = times;
            self
        }

        pub fn inverse_calls(&self) -> u32 {
            *self.inverse_calls.lock().unwrap()
        }
    }

    fn failure(key: &str) -> RemoteError {
        RemoteError::Transport {
            service: "scripted",
            message: format!("{key} failed"),
        }
    }

    #[async_trait]
    impl Step for ScriptedStep {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn resource_key(&self) -> String {
            self.key.clone()
        }

        fn magnitude(&self) -> i64 {
            1
        }

        async fn forward(&self, _ctx: &RequestContext) -> Result<u64, RemoteError> {
            self.journal.lock().unwrap().push(format!("forward:{}", self.key));
            if self.fail_forward {
                return Err(failure(&self.key));
            }
            Ok(1)
        }

        async fn inverse(&self, _ctx: &RequestContext) -> Result<u64, RemoteError> {
            let call = {
                let mut calls = self.inverse_calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            self.journal.lock().unwrap().push(format!("inverse:{}", self.key));
            if call <= self.inverse_failures {
                return Err(failure(&self.key));
            }
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::testing::ScriptedStep;
    use super::*;
    use crate::escalation::InMemoryEscalationLog;
    use crate::retry::RetryPolicy;

    fn compensator() -> Compensator {
        Compensator::new(
            RetryPolicy::new(3, Duration::from_millis(10)),
            Arc::new(InMemoryEscalationLog::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_steps_succeed() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let steps = vec![
            ScriptedStep::new("a", journal.clone()),
            ScriptedStep::new("b", journal.clone()),
        ];

        let results = run_steps("test", &RequestContext::system(), &steps, &compensator())
            .await
            .unwrap();

        assert_eq!(results, vec![1, 1]);
        assert_eq!(*journal.lock().unwrap(), vec!["forward:a", "forward:b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_compensates_applied_steps_in_reverse() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let steps = vec![
            ScriptedStep::new("a", journal.clone()),
            ScriptedStep::new("b", journal.clone()),
            ScriptedStep::new("c", journal.clone()).failing_forward(),
            ScriptedStep::new("d", journal.clone()),
        ];

        let failure = run_steps("test", &RequestContext::system(), &steps, &compensator())
            .await
            .unwrap_err();

        assert_eq!(failure.index, 2);
        assert_eq!(failure.report.compensated, 2);
        assert!(failure.report.residual.is_empty());
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["forward:a", "forward:b", "forward:c", "inverse:b", "inverse:a"]
        );
        assert_eq!(steps[2].inverse_calls(), 0);
        assert_eq!(steps[3].inverse_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_step_failure_has_nothing_to_compensate() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let steps = vec![ScriptedStep::new("a", journal.clone()).failing_forward()];

        let failure = run_steps("test", &RequestContext::system(), &steps, &compensator())
            .await
            .unwrap_err();

        assert_eq!(failure.index, 0);
        assert_eq!(failure.report.compensated, 0);
        assert_eq!(*journal.lock().unwrap(), vec!["forward:a"]);
    }
}
