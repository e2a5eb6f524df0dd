//! Schedule entity.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use common::{EmployeeId, ScheduleId};
use serde::{Deserialize, Serialize};

use super::{ScheduleError, ScheduleStatus};

/// Input for creating a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSchedule {
    pub employee_id: EmployeeId,
    pub work_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Initial status; defaults to `Available`.
    pub status: Option<ScheduleStatus>,
    pub notes: Option<String>,
}

/// One working day of a doctor.
///
/// At most one schedule exists per (employee, work date); the repository
/// enforces that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub employee_id: EmployeeId,
    pub work_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: ScheduleStatus,
    /// Free text. Holds the cancellation reason from `PendingCancel` onwards.
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// Validates the input and builds a new schedule.
    pub fn create(input: NewSchedule) -> Result<Self, ScheduleError> {
        if input.end_time <= input.start_time {
            return Err(ScheduleError::InvalidTimeWindow {
                start: input.start_time,
                end: input.end_time,
            });
        }

        let status = input.status.unwrap_or_default();
        if !status.can_set_directly() {
            return Err(ScheduleError::ReservedStatus { status });
        }

        Ok(Self {
            id: ScheduleId::new(),
            employee_id: input.employee_id,
            work_date: input.work_date,
            start_time: input.start_time,
            end_time: input.end_time,
            status,
            notes: input.notes,
            updated_at: Utc::now(),
        })
    }

    /// Checks that the cancellation saga may start.
    pub fn ensure_cancellable(&self) -> Result<(), ScheduleError> {
        match self.status {
            ScheduleStatus::Cancelled => Err(ScheduleError::AlreadyCancelled),
            ScheduleStatus::PendingCancel => Err(ScheduleError::CancellationInProgress),
            ScheduleStatus::Available | ScheduleStatus::Booked => Ok(()),
        }
    }

    /// Checks that a plain status update to `target` is allowed.
    pub fn ensure_direct_update(&self, target: ScheduleStatus) -> Result<(), ScheduleError> {
        if !target.can_set_directly() {
            return Err(ScheduleError::ReservedStatus { status: target });
        }
        if !self.status.can_set_directly() {
            return Err(ScheduleError::InvalidStateTransition {
                current: self.status,
                action: "update status",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(start: (u32, u32), end: (u32, u32)) -> NewSchedule {
        NewSchedule {
            employee_id: EmployeeId::new(),
            work_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            status: None,
            notes: None,
        }
    }

    #[test]
    fn test_create_defaults_to_available() {
        let schedule = Schedule::create(input((8, 0), (17, 0))).unwrap();
        assert_eq!(schedule.status, ScheduleStatus::Available);
        assert!(schedule.notes.is_none());
    }

    #[test]
    fn test_create_rejects_inverted_window() {
        let result = Schedule::create(input((17, 0), (8, 0)));
        assert!(matches!(
            result,
            Err(ScheduleError::InvalidTimeWindow { .. })
        ));

        let result = Schedule::create(input((9, 0), (9, 0)));
        assert!(matches!(
            result,
            Err(ScheduleError::InvalidTimeWindow { .. })
        ));
    }

    #[test]
    fn test_create_rejects_saga_owned_status() {
        let mut new = input((8, 0), (12, 0));
        new.status = Some(ScheduleStatus::Cancelled);
        assert!(matches!(
            Schedule::create(new),
            Err(ScheduleError::ReservedStatus {
                status: ScheduleStatus::Cancelled
            })
        ));
    }

    #[test]
    fn test_ensure_cancellable() {
        let mut schedule = Schedule::create(input((8, 0), (12, 0))).unwrap();
        assert!(schedule.ensure_cancellable().is_ok());

        schedule.status = ScheduleStatus::Booked;
        assert!(schedule.ensure_cancellable().is_ok());

        schedule.status = ScheduleStatus::PendingCancel;
        assert!(matches!(
            schedule.ensure_cancellable(),
            Err(ScheduleError::CancellationInProgress)
        ));

        schedule.status = ScheduleStatus::Cancelled;
        assert!(matches!(
            schedule.ensure_cancellable(),
            Err(ScheduleError::AlreadyCancelled)
        ));
    }

    #[test]
    fn test_direct_update_guards() {
        let mut schedule = Schedule::create(input((8, 0), (12, 0))).unwrap();
        assert!(schedule.ensure_direct_update(ScheduleStatus::Booked).is_ok());
        assert!(schedule
            .ensure_direct_update(ScheduleStatus::PendingCancel)
            .is_err());

        schedule.status = ScheduleStatus::Cancelled;
        assert!(matches!(
            schedule.ensure_direct_update(ScheduleStatus::Available),
            Err(ScheduleError::InvalidStateTransition { .. })
        ));
    }
}
