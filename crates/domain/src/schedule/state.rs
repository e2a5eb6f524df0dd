//! Schedule state machine.

use serde::{Deserialize, Serialize};

/// The status of a doctor's schedule for one working day.
///
/// State transitions:
/// ```text
/// Available ◄──► Booked
///     │            │
///     └─────┬──────┘
///           ▼
///     PendingCancel ──► Cancelled
///           │
///           └──► (rollback to the original Available / Booked)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    /// Open for appointments.
    #[default]
    Available,

    /// All time slots are filled.
    Booked,

    /// Cancellation saga in flight: appointments are being cancelled.
    PendingCancel,

    /// Schedule and its appointments were cancelled (terminal state).
    Cancelled,
}

impl ScheduleStatus {
    /// Returns true if the cancellation saga may start from this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, ScheduleStatus::Available | ScheduleStatus::Booked)
    }

    /// Returns true if the status can be written by a plain status update.
    ///
    /// `PendingCancel` and `Cancelled` are owned by the cancellation saga.
    pub fn can_set_directly(&self) -> bool {
        matches!(self, ScheduleStatus::Available | ScheduleStatus::Booked)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScheduleStatus::Cancelled)
    }

    /// Returns the status name as stored and sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Available => "AVAILABLE",
            ScheduleStatus::Booked => "BOOKED",
            ScheduleStatus::PendingCancel => "PENDING_CANCEL",
            ScheduleStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ScheduleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(ScheduleStatus::Available),
            "BOOKED" => Ok(ScheduleStatus::Booked),
            "PENDING_CANCEL" => Ok(ScheduleStatus::PendingCancel),
            "CANCELLED" => Ok(ScheduleStatus::Cancelled),
            other => Err(format!("unknown schedule status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_available() {
        assert_eq!(ScheduleStatus::default(), ScheduleStatus::Available);
    }

    #[test]
    fn test_can_cancel() {
        assert!(ScheduleStatus::Available.can_cancel());
        assert!(ScheduleStatus::Booked.can_cancel());
        assert!(!ScheduleStatus::PendingCancel.can_cancel());
        assert!(!ScheduleStatus::Cancelled.can_cancel());
    }

    #[test]
    fn test_saga_owned_statuses_cannot_be_set_directly() {
        assert!(ScheduleStatus::Available.can_set_directly());
        assert!(ScheduleStatus::Booked.can_set_directly());
        assert!(!ScheduleStatus::PendingCancel.can_set_directly());
        assert!(!ScheduleStatus::Cancelled.can_set_directly());
    }

    #[test]
    fn test_parse_and_display_agree() {
        for status in [
            ScheduleStatus::Available,
            ScheduleStatus::Booked,
            ScheduleStatus::PendingCancel,
            ScheduleStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<ScheduleStatus>(), Ok(status));
        }
        assert!("OPEN".parse::<ScheduleStatus>().is_err());
    }

    #[test]
    fn test_serialization_uses_wire_names() {
        let json = serde_json::to_string(&ScheduleStatus::PendingCancel).unwrap();
        assert_eq!(json, "\"PENDING_CANCEL\"");
    }
}
