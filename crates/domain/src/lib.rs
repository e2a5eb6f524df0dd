//! Domain layer for the clinic saga services.
//!
//! This crate provides the locally-owned entities the sagas mutate:
//! - Schedule with its cancellation state machine
//! - MedicalExam, consulted when issuing a prescription
//! - Prescription with immutable, price-snapshotted items

pub mod error;
pub mod exam;
pub mod money;
pub mod prescription;
pub mod schedule;

pub use error::DomainError;
pub use exam::MedicalExam;
pub use money::Money;
pub use prescription::{
    Cancellation, Dispensation, NewPrescriptionItem, Prescription, PrescriptionError,
    PrescriptionItem, PrescriptionStatus,
};
pub use schedule::{NewSchedule, Schedule, ScheduleError, ScheduleStatus};
