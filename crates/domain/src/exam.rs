//! Medical exam, the parent record of a prescription.

use common::{AppointmentId, EmployeeId, ExamId};
use serde::{Deserialize, Serialize};

/// A medical exam performed during an appointment.
///
/// Only the fields the prescription flow reads are modelled here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalExam {
    pub id: ExamId,
    pub appointment_id: AppointmentId,
    pub patient_id: String,
    pub doctor_id: EmployeeId,
    pub has_prescription: bool,
}

impl MedicalExam {
    /// Creates an exam without a prescription.
    pub fn new(appointment_id: AppointmentId, patient_id: impl Into<String>, doctor_id: EmployeeId) -> Self {
        Self {
            id: ExamId::new(),
            appointment_id,
            patient_id: patient_id.into(),
            doctor_id,
            has_prescription: false,
        }
    }
}
