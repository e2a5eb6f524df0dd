//! Doctor work schedule and its cancellation state machine.

mod model;
mod state;

pub use model::{NewSchedule, Schedule};
pub use state::ScheduleStatus;

use chrono::NaiveTime;
use thiserror::Error;

/// Errors that can occur during schedule operations.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The time window is empty or inverted.
    #[error("End time {end} must be after start time {start}")]
    InvalidTimeWindow { start: NaiveTime, end: NaiveTime },

    /// The schedule has already been cancelled.
    #[error("Schedule is already cancelled")]
    AlreadyCancelled,

    /// Another cancellation is mid-flight for this schedule.
    #[error("Schedule cancellation is already in progress")]
    CancellationInProgress,

    /// The status may only be reached through the cancellation saga.
    #[error("Status {status} cannot be set directly; use the cancel operation")]
    ReservedStatus { status: ScheduleStatus },

    /// The schedule is not in a state that allows the action.
    #[error("Invalid state transition: cannot {action} from {current} state")]
    InvalidStateTransition {
        current: ScheduleStatus,
        action: &'static str,
    },
}

impl ScheduleError {
    /// Returns true when the error rejects a state transition rather than input.
    pub fn is_conflict(&self) -> bool {
        !matches!(self, ScheduleError::InvalidTimeWindow { .. })
    }
}
