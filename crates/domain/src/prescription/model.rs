//! Prescription entity and its items.

use chrono::{DateTime, Utc};
use common::{EmployeeId, ExamId, MedicineId, PrescriptionId, PrescriptionItemId};
use serde::{Deserialize, Serialize};

use super::{PrescriptionError, PrescriptionStatus};
use crate::exam::MedicalExam;
use crate::money::Money;

/// A requested line item before medicine data has been looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPrescriptionItem {
    pub medicine_id: MedicineId,
    pub quantity: u32,
    pub dosage: String,
    pub duration_days: Option<u32>,
    pub instructions: Option<String>,
}

impl NewPrescriptionItem {
    /// Creates a request for `quantity` units of a medicine.
    pub fn new(medicine_id: impl Into<MedicineId>, quantity: u32, dosage: impl Into<String>) -> Self {
        Self {
            medicine_id: medicine_id.into(),
            quantity,
            dosage: dosage.into(),
            duration_days: None,
            instructions: None,
        }
    }
}

/// A prescribed medicine with the name and price captured at issue time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionItem {
    pub id: PrescriptionItemId,
    pub medicine_id: MedicineId,
    pub medicine_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub dosage: String,
    pub duration_days: Option<u32>,
    pub instructions: Option<String>,
}

impl PrescriptionItem {
    /// Builds an item from a request and the medicine snapshot.
    pub fn snapshot(request: NewPrescriptionItem, medicine_name: impl Into<String>, unit_price: Money) -> Self {
        Self {
            id: PrescriptionItemId::new(),
            medicine_id: request.medicine_id,
            medicine_name: medicine_name.into(),
            unit_price,
            quantity: request.quantity,
            dosage: request.dosage,
            duration_days: request.duration_days,
            instructions: request.instructions,
        }
    }

    /// Returns quantity * unit price.
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Who cancelled a prescription, when and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub at: DateTime<Utc>,
    pub by: String,
    pub reason: String,
}

/// Who dispensed a prescription and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispensation {
    pub at: DateTime<Utc>,
    pub by: String,
}

/// A prescription issued for one medical exam.
///
/// Items never change after creation. The only transitions are
/// `Active -> Cancelled` and `Active -> Dispensed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: PrescriptionId,
    pub exam_id: ExamId,
    pub patient_id: String,
    pub doctor_id: EmployeeId,
    pub status: PrescriptionStatus,
    pub notes: Option<String>,
    pub prescribed_at: DateTime<Utc>,
    pub cancellation: Option<Cancellation>,
    pub dispensation: Option<Dispensation>,
    items: Vec<PrescriptionItem>,
}

impl Prescription {
    /// Issues an active prescription for `exam`.
    pub fn issue(
        exam: &MedicalExam,
        notes: Option<String>,
        items: Vec<PrescriptionItem>,
    ) -> Result<Self, PrescriptionError> {
        if items.is_empty() {
            return Err(PrescriptionError::NoItems);
        }
        if let Some(item) = items.iter().find(|i| i.quantity == 0) {
            return Err(PrescriptionError::InvalidQuantity {
                medicine_id: item.medicine_id.to_string(),
                quantity: item.quantity,
            });
        }

        Ok(Self {
            id: PrescriptionId::new(),
            exam_id: exam.id,
            patient_id: exam.patient_id.clone(),
            doctor_id: exam.doctor_id,
            status: PrescriptionStatus::Active,
            notes,
            prescribed_at: Utc::now(),
            cancellation: None,
            dispensation: None,
            items,
        })
    }

    /// Rebuilds a prescription from storage without re-validating it.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: PrescriptionId,
        exam_id: ExamId,
        patient_id: String,
        doctor_id: EmployeeId,
        status: PrescriptionStatus,
        notes: Option<String>,
        prescribed_at: DateTime<Utc>,
        cancellation: Option<Cancellation>,
        dispensation: Option<Dispensation>,
        items: Vec<PrescriptionItem>,
    ) -> Self {
        Self {
            id,
            exam_id,
            patient_id,
            doctor_id,
            status,
            notes,
            prescribed_at,
            cancellation,
            dispensation,
            items,
        }
    }

    /// Returns the items in prescription order.
    pub fn items(&self) -> &[PrescriptionItem] {
        &self.items
    }

    /// Returns the sum of all item totals.
    pub fn total_amount(&self) -> Money {
        self.items.iter().map(PrescriptionItem::total_price).sum()
    }

    /// Checks that the prescription can still be cancelled.
    pub fn ensure_cancellable(&self) -> Result<(), PrescriptionError> {
        if !self.status.can_cancel() {
            return Err(PrescriptionError::InvalidStateTransition {
                current: self.status,
                action: "cancel",
            });
        }
        Ok(())
    }

    /// Checks that the prescription can still be dispensed.
    pub fn ensure_dispensable(&self) -> Result<(), PrescriptionError> {
        if !self.status.can_dispense() {
            return Err(PrescriptionError::InvalidStateTransition {
                current: self.status,
                action: "dispense",
            });
        }
        Ok(())
    }

    /// Marks the prescription cancelled.
    pub fn cancel(
        &mut self,
        by: impl Into<String>,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<(), PrescriptionError> {
        self.ensure_cancellable()?;
        self.status = PrescriptionStatus::Cancelled;
        self.cancellation = Some(Cancellation {
            at,
            by: by.into(),
            reason: reason.into(),
        });
        Ok(())
    }

    /// Marks the prescription dispensed.
    pub fn dispense(&mut self, by: impl Into<String>, at: DateTime<Utc>) -> Result<(), PrescriptionError> {
        self.ensure_dispensable()?;
        self.status = PrescriptionStatus::Dispensed;
        self.dispensation = Some(Dispensation { at, by: by.into() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AppointmentId;

    fn exam() -> MedicalExam {
        MedicalExam::new(AppointmentId::new(), "patient-1", EmployeeId::new())
    }

    fn item(medicine: &str, quantity: u32, price_cents: i64) -> PrescriptionItem {
        PrescriptionItem::snapshot(
            NewPrescriptionItem::new(medicine, quantity, "1 tablet twice daily"),
            format!("{medicine} 500mg"),
            Money::from_cents(price_cents),
        )
    }

    #[test]
    fn test_issue_copies_exam_fields() {
        let exam = exam();
        let prescription =
            Prescription::issue(&exam, None, vec![item("MED-A", 2, 150)]).unwrap();

        assert_eq!(prescription.exam_id, exam.id);
        assert_eq!(prescription.patient_id, "patient-1");
        assert_eq!(prescription.doctor_id, exam.doctor_id);
        assert_eq!(prescription.status, PrescriptionStatus::Active);
        assert!(prescription.cancellation.is_none());
    }

    #[test]
    fn test_issue_requires_items() {
        let result = Prescription::issue(&exam(), None, vec![]);
        assert!(matches!(result, Err(PrescriptionError::NoItems)));
    }

    #[test]
    fn test_issue_rejects_zero_quantity() {
        let result = Prescription::issue(&exam(), None, vec![item("MED-A", 0, 150)]);
        assert!(matches!(
            result,
            Err(PrescriptionError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn test_total_amount_uses_snapshots() {
        let prescription = Prescription::issue(
            &exam(),
            None,
            vec![item("MED-A", 2, 150), item("MED-B", 1, 1000)],
        )
        .unwrap();
        assert_eq!(prescription.total_amount().cents(), 1300);
    }

    #[test]
    fn test_cancel_records_metadata_once() {
        let mut prescription =
            Prescription::issue(&exam(), None, vec![item("MED-A", 1, 100)]).unwrap();
        let at = Utc::now();

        prescription.cancel("doctor-7", "wrong dosage", at).unwrap();
        assert_eq!(prescription.status, PrescriptionStatus::Cancelled);
        let cancellation = prescription.cancellation.clone().unwrap();
        assert_eq!(cancellation.by, "doctor-7");
        assert_eq!(cancellation.reason, "wrong dosage");
        assert_eq!(cancellation.at, at);

        let again = prescription.cancel("doctor-7", "again", Utc::now());
        assert!(matches!(
            again,
            Err(PrescriptionError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_dispensed_cannot_be_cancelled() {
        let mut prescription =
            Prescription::issue(&exam(), None, vec![item("MED-A", 1, 100)]).unwrap();
        prescription.dispense("pharmacist-1", Utc::now()).unwrap();

        assert_eq!(prescription.status, PrescriptionStatus::Dispensed);
        assert!(prescription.cancel("doctor", "late", Utc::now()).is_err());
        assert!(prescription.dispense("pharmacist-1", Utc::now()).is_err());
        assert!(prescription.cancellation.is_none());
    }
}
