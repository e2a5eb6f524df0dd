//! Prescription state machine.

use serde::{Deserialize, Serialize};

/// The status of a prescription.
///
/// State transitions:
/// ```text
/// Active ──┬──► Cancelled   (stock restored)
///          └──► Dispensed   (handed to the patient)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrescriptionStatus {
    /// Issued, waiting for the pharmacy.
    #[default]
    Active,

    /// Cancelled by the doctor (terminal state).
    Cancelled,

    /// Medicines handed to the patient (terminal state).
    Dispensed,
}

impl PrescriptionStatus {
    /// Returns true if the prescription can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, PrescriptionStatus::Active)
    }

    /// Returns true if the prescription can be dispensed in this state.
    pub fn can_dispense(&self) -> bool {
        matches!(self, PrescriptionStatus::Active)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PrescriptionStatus::Cancelled | PrescriptionStatus::Dispensed
        )
    }

    /// Returns the status name as stored and sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrescriptionStatus::Active => "ACTIVE",
            PrescriptionStatus::Cancelled => "CANCELLED",
            PrescriptionStatus::Dispensed => "DISPENSED",
        }
    }
}

impl std::fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PrescriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(PrescriptionStatus::Active),
            "CANCELLED" => Ok(PrescriptionStatus::Cancelled),
            "DISPENSED" => Ok(PrescriptionStatus::Dispensed),
            other => Err(format!("unknown prescription status: {other}")),
        }
    }
}
