//! Schedule service providing the non-saga schedule operations.

use common::{RequestContext, ScheduleId};
use domain::{NewSchedule, Schedule, ScheduleStatus};
use store::{ScheduleRepository, StoreError};

use crate::error::{Result, SagaError};
use crate::services::AppointmentClient;

/// Service for managing doctor schedules.
///
/// Cancellation is not here: it goes through
/// [`ScheduleCancellationSaga`](crate::ScheduleCancellationSaga).
pub struct ScheduleService<R, A>
where
    R: ScheduleRepository,
    A: AppointmentClient,
{
    schedules: R,
    appointments: A,
}

impl<R, A> ScheduleService<R, A>
where
    R: ScheduleRepository,
    A: AppointmentClient,
{
    /// Creates a new schedule service.
    pub fn new(schedules: R, appointments: A) -> Self {
        Self {
            schedules,
            appointments,
        }
    }

    /// Creates a schedule. A second schedule for the same employee and day
    /// is a validation error.
    #[tracing::instrument(skip(self, input), fields(employee_id = %input.employee_id, work_date = %input.work_date))]
    pub async fn create(&self, input: NewSchedule) -> Result<Schedule> {
        let schedule = Schedule::create(input)?;

        match self.schedules.insert_schedule(&schedule).await {
            Ok(()) => {
                tracing::info!(schedule_id = %schedule.id, "schedule created");
                Ok(schedule)
            }
            Err(StoreError::Duplicate { .. }) => Err(SagaError::Validation(format!(
                "Schedule already exists for employee {} on {}",
                schedule.employee_id, schedule.work_date
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Gets a schedule by id.
    pub async fn get(&self, schedule_id: ScheduleId) -> Result<Schedule> {
        self.schedules
            .get_schedule(schedule_id)
            .await?
            .ok_or_else(|| SagaError::not_found("Schedule", schedule_id))
    }

    /// Sets the status directly.
    ///
    /// Only `Available` and `Booked` may be written, and only from one of
    /// those; the cancellation states belong to the saga.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        schedule_id: ScheduleId,
        status: ScheduleStatus,
    ) -> Result<Schedule> {
        let schedule = self.get(schedule_id).await?;
        schedule.ensure_direct_update(status)?;

        let updated = self
            .schedules
            .transition_schedule_status(schedule_id, schedule.status, status, schedule.notes)
            .await?;
        tracing::info!(%schedule_id, from = %schedule.status, to = %status, "schedule status updated");
        Ok(updated)
    }

    /// Deletes a schedule that has no active appointments.
    ///
    /// Refused when the appointment service reports any SCHEDULED
    /// appointment for the day, or cannot be reached.
    #[tracing::instrument(skip(self, ctx), fields(user = %ctx.user_id))]
    pub async fn delete(&self, ctx: &RequestContext, schedule_id: ScheduleId) -> Result<()> {
        let schedule = self.get(schedule_id).await?;

        let active = self
            .appointments
            .count_active_by_doctor_and_date(ctx, schedule.employee_id, schedule.work_date)
            .await
            .map_err(|error| {
                tracing::warn!(%schedule_id, %error, "appointment count unavailable");
                SagaError::Conflict(
                    "Cannot verify appointments for this schedule; deletion blocked".to_string(),
                )
            })?;

        if active > 0 {
            return Err(SagaError::Conflict(format!(
                "Cannot delete schedule with {active} active appointments"
            )));
        }

        self.schedules.delete_schedule(schedule_id).await?;
        tracing::info!(%schedule_id, "schedule deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use common::EmployeeId;
    use store::InMemoryStore;

    use super::*;
    use crate::services::InMemoryAppointmentService;

    fn service() -> (
        ScheduleService<InMemoryStore, InMemoryAppointmentService>,
        InMemoryAppointmentService,
    ) {
        let appointments = InMemoryAppointmentService::new();
        (
            ScheduleService::new(InMemoryStore::new(), appointments.clone()),
            appointments,
        )
    }

    fn input(employee_id: EmployeeId) -> NewSchedule {
        NewSchedule {
            employee_id,
            work_date: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            status: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (service, _) = service();
        let created = service.create(input(EmployeeId::new())).await.unwrap();

        let loaded = service.get(created.id).await.unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.status, ScheduleStatus::Available);
    }

    #[tokio::test]
    async fn test_duplicate_day_is_validation_error() {
        let (service, _) = service();
        let employee = EmployeeId::new();
        service.create(input(employee)).await.unwrap();

        let err = service.create(input(employee)).await.unwrap_err();
        assert!(matches!(err, SagaError::Validation(_)));
    }

    #[tokio::test]
    async fn test_inverted_window_is_rejected() {
        let (service, _) = service();
        let mut bad = input(EmployeeId::new());
        bad.end_time = NaiveTime::from_hms_opt(8, 0, 0).unwrap();

        let err = service.create(bad).await.unwrap_err();
        assert!(matches!(err, SagaError::Domain(_)));
    }

    #[tokio::test]
    async fn test_update_status_rejects_saga_states() {
        let (service, _) = service();
        let created = service.create(input(EmployeeId::new())).await.unwrap();

        let booked = service
            .update_status(created.id, ScheduleStatus::Booked)
            .await
            .unwrap();
        assert_eq!(booked.status, ScheduleStatus::Booked);

        for target in [ScheduleStatus::PendingCancel, ScheduleStatus::Cancelled] {
            let err = service.update_status(created.id, target).await.unwrap_err();
            match err {
                SagaError::Domain(domain) => assert!(domain.is_conflict()),
                other => panic!("expected conflict, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_delete_guarded_by_active_appointments() {
        let (service, appointments) = service();
        let created = service.create(input(EmployeeId::new())).await.unwrap();
        appointments
            .book(
                created.employee_id,
                created.work_date,
                NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            )
            .await;
        let ctx = RequestContext::system();

        let err = service.delete(&ctx, created.id).await.unwrap_err();
        assert!(matches!(err, SagaError::Conflict(_)));

        appointments
            .cancel_by_doctor_and_date(&ctx, created.employee_id, created.work_date, "moved")
            .await
            .unwrap();
        service.delete(&ctx, created.id).await.unwrap();
        assert!(matches!(
            service.get(created.id).await,
            Err(SagaError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_blocked_when_count_unavailable() {
        let (service, appointments) = service();
        let created = service.create(input(EmployeeId::new())).await.unwrap();
        appointments.set_fail_count(true).await;

        let err = service
            .delete(&RequestContext::system(), created.id)
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::Conflict(_)));
        assert!(service.get(created.id).await.is_ok());
    }
}
