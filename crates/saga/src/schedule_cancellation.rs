//! Schedule cancellation saga.
//!
//! ```text
//! AVAILABLE/BOOKED ──► PENDING_CANCEL ──(cancel appointments)──► CANCELLED
//!                            │                    │
//!                            │ remote failure     │ finalize failure
//!                            ▼                    ▼
//!                     original status    restore appointments, original status
//! ```

use std::slice;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{EmployeeId, RequestContext, ScheduleId};
use domain::ScheduleStatus;
use serde::Serialize;
use store::ScheduleRepository;
use uuid::Uuid;

use crate::compensator::Compensator;
use crate::error::{RemoteError, Result, SagaError};
use crate::escalation::{EscalationLog, EscalationRecord};
use crate::retry::RetryPolicy;
use crate::services::AppointmentClient;
use crate::step::{Step, run_steps};

/// Saga name used in logs, metrics and escalation records.
pub const SAGA_NAME: &str = "schedule_cancel";

/// Reason recorded when the caller gives none.
pub const DEFAULT_CANCEL_REASON: &str = "Doctor schedule cancelled";

/// Result of a completed cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelScheduleSummary {
    pub schedule_id: ScheduleId,
    pub employee_id: EmployeeId,
    pub work_date: NaiveDate,
    pub status: ScheduleStatus,
    pub reason: String,
    /// Appointments cancelled, as reported by the appointment service.
    pub appointments_cancelled: u64,
    pub cancelled_at: DateTime<Utc>,
}

/// Bulk cancellation of a doctor's appointments for one day.
struct AppointmentCancellation<'a, A> {
    client: &'a A,
    doctor_id: EmployeeId,
    date: NaiveDate,
    reason: String,
    cancelled: AtomicU64,
}

#[async_trait]
impl<'a, A: AppointmentClient> Step for AppointmentCancellation<'a, A> {
    fn name(&self) -> &'static str {
        "cancel_appointments"
    }

    fn resource_key(&self) -> String {
        format!("doctor {} on {}", self.doctor_id, self.date)
    }

    fn magnitude(&self) -> i64 {
        i64::try_from(self.cancelled.load(Ordering::SeqCst)).unwrap_or(i64::MAX)
    }

    async fn forward(&self, ctx: &RequestContext) -> std::result::Result<u64, RemoteError> {
        let count = self
            .client
            .cancel_by_doctor_and_date(ctx, self.doctor_id, self.date, &self.reason)
            .await?;
        self.cancelled.store(count, Ordering::SeqCst);
        Ok(count)
    }

    async fn inverse(&self, ctx: &RequestContext) -> std::result::Result<u64, RemoteError> {
        self.client
            .restore_by_doctor_and_date(ctx, self.doctor_id, self.date)
            .await
    }
}

/// Orchestrates the cancellation of a schedule and its appointments.
///
/// The appointment restore that compensates a failed finalize is attempted
/// exactly once; if it fails it is escalated, never returned.
pub struct ScheduleCancellationSaga<R, A>
where
    R: ScheduleRepository,
    A: AppointmentClient,
{
    schedules: R,
    appointments: A,
    compensator: Compensator,
    escalation: Arc<dyn EscalationLog>,
}

impl<R, A> ScheduleCancellationSaga<R, A>
where
    R: ScheduleRepository,
    A: AppointmentClient,
{
    /// Creates a new schedule cancellation saga.
    pub fn new(schedules: R, appointments: A, escalation: Arc<dyn EscalationLog>) -> Self {
        Self {
            schedules,
            appointments,
            compensator: Compensator::new(RetryPolicy::single_attempt(), escalation.clone()),
            escalation,
        }
    }

    /// Cancels a schedule and every SCHEDULED appointment of that doctor
    /// on that day.
    ///
    /// A missing or blank reason is replaced by [`DEFAULT_CANCEL_REASON`].
    #[tracing::instrument(skip(self, ctx, reason), fields(saga = SAGA_NAME, user = %ctx.user_id))]
    pub async fn cancel(
        &self,
        ctx: &RequestContext,
        schedule_id: ScheduleId,
        reason: Option<&str>,
    ) -> Result<CancelScheduleSummary> {
        metrics::counter!("saga_executions_total", "saga" => SAGA_NAME).increment(1);
        let started = std::time::Instant::now();

        let result = self.execute(ctx, schedule_id, reason).await;

        metrics::histogram!("saga_duration_seconds", "saga" => SAGA_NAME)
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(summary) => tracing::info!(
                %schedule_id,
                appointments_cancelled = summary.appointments_cancelled,
                "schedule cancelled"
            ),
            Err(error) => {
                metrics::counter!("saga_failed_total", "saga" => SAGA_NAME).increment(1);
                tracing::warn!(%schedule_id, %error, "schedule cancellation failed");
            }
        }
        result
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        schedule_id: ScheduleId,
        reason: Option<&str>,
    ) -> Result<CancelScheduleSummary> {
        // 1. Load and guard
        let schedule = self
            .schedules
            .get_schedule(schedule_id)
            .await?
            .ok_or_else(|| SagaError::not_found("Schedule", schedule_id))?;
        schedule.ensure_cancellable()?;

        let original = schedule.status;
        let reason = match reason.map(str::trim) {
            Some(r) if !r.is_empty() => r.to_string(),
            _ => DEFAULT_CANCEL_REASON.to_string(),
        };

        // 2. Durability checkpoint
        self.schedules
            .transition_schedule_status(
                schedule_id,
                original,
                ScheduleStatus::PendingCancel,
                Some(reason.clone()),
            )
            .await?;

        // 3. Remote cancel
        let step = AppointmentCancellation {
            client: &self.appointments,
            doctor_id: schedule.employee_id,
            date: schedule.work_date,
            reason: reason.clone(),
            cancelled: AtomicU64::new(0),
        };
        let appointments_cancelled =
            match run_steps(SAGA_NAME, ctx, slice::from_ref(&step), &self.compensator).await {
                Ok(results) => results.first().copied().unwrap_or(0),
                Err(failure) => {
                    self.revert(schedule_id, original).await;
                    return Err(SagaError::AppointmentCancelFailed {
                        restored_status: original.to_string(),
                        source: failure.error,
                    });
                }
            };

        // 4. Finalize
        match self
            .schedules
            .transition_schedule_status(
                schedule_id,
                ScheduleStatus::PendingCancel,
                ScheduleStatus::Cancelled,
                Some(reason.clone()),
            )
            .await
        {
            Ok(cancelled) => Ok(CancelScheduleSummary {
                schedule_id,
                employee_id: cancelled.employee_id,
                work_date: cancelled.work_date,
                status: cancelled.status,
                reason,
                appointments_cancelled,
                cancelled_at: cancelled.updated_at,
            }),
            Err(source) => {
                tracing::error!(
                    %schedule_id,
                    error = %source,
                    "appointments cancelled but schedule could not be finalized, restoring"
                );
                self.compensator
                    .compensate(SAGA_NAME, ctx, slice::from_ref(&step))
                    .await;
                self.revert(schedule_id, original).await;
                Err(SagaError::FinalizeFailed { source })
            }
        }
    }

    /// Puts the schedule back to `original` and clears the notes.
    ///
    /// A failing write is escalated; the caller still returns its own error.
    async fn revert(&self, schedule_id: ScheduleId, original: ScheduleStatus) {
        let result = self
            .schedules
            .transition_schedule_status(
                schedule_id,
                ScheduleStatus::PendingCancel,
                original,
                None,
            )
            .await;

        if let Err(error) = result {
            tracing::error!(%schedule_id, %error, "failed to revert schedule status");
            self.escalation
                .record(EscalationRecord {
                    id: Uuid::new_v4(),
                    saga: SAGA_NAME.to_string(),
                    step: "revert_schedule_status".to_string(),
                    resource_key: format!("schedule {schedule_id} to {original}"),
                    magnitude: 0,
                    attempts: 1,
                    error: error.to_string(),
                    recorded_at: Utc::now(),
                })
                .await;
        }
    }
}
