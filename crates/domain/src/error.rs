//! Domain error types.

use thiserror::Error;

use crate::prescription::PrescriptionError;
use crate::schedule::ScheduleError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the schedule model.
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// An error occurred in the prescription model.
    #[error("Prescription error: {0}")]
    Prescription(#[from] PrescriptionError),
}

impl DomainError {
    /// Returns true when the error rejects a state transition rather than input.
    pub fn is_conflict(&self) -> bool {
        match self {
            DomainError::Schedule(e) => e.is_conflict(),
            DomainError::Prescription(e) => e.is_conflict(),
        }
    }
}
