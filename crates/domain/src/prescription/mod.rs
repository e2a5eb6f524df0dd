//! Prescription with price-snapshotted items and its terminal transitions.

mod model;
mod state;

pub use model::{Cancellation, Dispensation, NewPrescriptionItem, Prescription, PrescriptionItem};
pub use state::PrescriptionStatus;

use thiserror::Error;

/// Errors that can occur during prescription operations.
#[derive(Debug, Error)]
pub enum PrescriptionError {
    /// A prescription needs at least one item.
    #[error("Prescription has no items")]
    NoItems,

    /// Item quantity must be positive.
    #[error("Invalid quantity for medicine {medicine_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { medicine_id: String, quantity: u32 },

    /// The prescription is not in a state that allows the action.
    #[error("Cannot {action} prescription with status {current}; only ACTIVE prescriptions allow it")]
    InvalidStateTransition {
        current: PrescriptionStatus,
        action: &'static str,
    },
}

impl PrescriptionError {
    /// Returns true when the error rejects a state transition rather than input.
    pub fn is_conflict(&self) -> bool {
        matches!(self, PrescriptionError::InvalidStateTransition { .. })
    }
}
