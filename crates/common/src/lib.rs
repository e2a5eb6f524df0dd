//! Shared identifiers and request context used across the clinic services.

pub mod context;
pub mod types;

pub use context::RequestContext;
pub use types::{
    AppointmentId, EmployeeId, ExamId, MedicineId, PrescriptionId, PrescriptionItemId, ScheduleId,
};
