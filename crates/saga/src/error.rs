//! Saga error types.

use common::MedicineId;
use domain::{DomainError, PrescriptionError, ScheduleError};
use store::StoreError;
use thiserror::Error;

/// Failure of a call to a collaborating service.
///
/// The orchestrators treat every variant the same way: the remote step did
/// not happen.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The request never produced a response (connect error, timeout).
    #[error("{service} unreachable: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    /// The service answered with a non-success status.
    #[error("{service} rejected the request with status {status}: {message}")]
    Rejected {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// The response body could not be decoded.
    #[error("{service} returned an undecodable response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl RemoteError {
    /// Returns the HTTP status for `Rejected` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The request was rejected before any state was mutated.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The target is in a terminal or in-flight state.
    #[error("{0}")]
    Conflict(String),

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A prescription item cannot be covered by current stock.
    #[error("Insufficient stock for medicine {medicine}: required {required}, available {available}")]
    InsufficientStock {
        medicine: String,
        required: u32,
        available: u32,
    },

    /// A remote call failed outside of any compensation path.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Cancelling the appointments failed; the schedule was put back.
    #[error("Failed to cancel appointments; schedule restored to {restored_status}: {source}")]
    AppointmentCancelFailed {
        restored_status: String,
        #[source]
        source: RemoteError,
    },

    /// Appointments were cancelled but the schedule could not be finalized.
    #[error("Failed to finalize schedule cancellation; appointment restore was attempted: {source}")]
    FinalizeFailed {
        #[source]
        source: StoreError,
    },

    /// A stock decrement failed after the prescription was persisted.
    #[error(
        "Failed to decrement stock for medicine {medicine_id}. Compensation attempted for {compensated} items, {failed} failed."
    )]
    StockDecrementFailed {
        medicine_id: MedicineId,
        compensated: usize,
        failed: usize,
        #[source]
        source: RemoteError,
    },

    /// Domain rule violated.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SagaError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        SagaError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<ScheduleError> for SagaError {
    fn from(err: ScheduleError) -> Self {
        SagaError::Domain(err.into())
    }
}

impl From<PrescriptionError> for SagaError {
    fn from(err: PrescriptionError) -> Self {
        SagaError::Domain(err.into())
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
