//! Integration tests for the schedule and prescription lifecycles.

use chrono::{NaiveDate, NaiveTime, Utc};
use common::{AppointmentId, EmployeeId};
use domain::{
    DomainError, MedicalExam, Money, NewPrescriptionItem, NewSchedule, Prescription,
    PrescriptionItem, PrescriptionStatus, Schedule, ScheduleStatus,
};

fn item(medicine: &str, quantity: u32, cents: i64) -> PrescriptionItem {
    PrescriptionItem::snapshot(
        NewPrescriptionItem::new(medicine, quantity, "twice a day"),
        format!("{medicine} name"),
        Money::from_cents(cents),
    )
}

#[test]
fn test_schedule_cancellation_states() {
    let mut schedule = Schedule::create(NewSchedule {
        employee_id: EmployeeId::new(),
        work_date: NaiveDate::from_ymd_opt(2026, 10, 5).unwrap(),
        start_time: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(11, 30, 0).unwrap(),
        status: Some(ScheduleStatus::Booked),
        notes: None,
    })
    .unwrap();
    assert!(schedule.ensure_cancellable().is_ok());

    schedule.status = ScheduleStatus::PendingCancel;
    let in_flight: DomainError = schedule.ensure_cancellable().unwrap_err().into();
    assert!(in_flight.is_conflict());
    assert!(schedule.ensure_direct_update(ScheduleStatus::Available).is_err());

    schedule.status = ScheduleStatus::Cancelled;
    assert!(schedule.status.is_terminal());
    assert!(schedule.ensure_cancellable().is_err());
}

#[test]
fn test_prescription_snapshot_survives_price_changes() {
    let exam = MedicalExam::new(AppointmentId::new(), "patient-9", EmployeeId::new());
    let prescription = Prescription::issue(
        &exam,
        None,
        vec![item("MED-1", 2, 1500), item("MED-2", 1, 250)],
    )
    .unwrap();

    assert_eq!(prescription.exam_id, exam.id);
    assert_eq!(prescription.doctor_id, exam.doctor_id);
    assert_eq!(prescription.total_amount(), Money::from_cents(3250));
    assert_eq!(prescription.items()[0].total_price(), Money::from_cents(3000));

    let json = serde_json::to_value(&prescription).unwrap();
    assert_eq!(json["status"], "ACTIVE");
    assert_eq!(json["items"][1]["unit_price"], 250);
}

#[test]
fn test_terminal_prescriptions_reject_everything() {
    let exam = MedicalExam::new(AppointmentId::new(), "patient-9", EmployeeId::new());
    let mut dispensed = Prescription::issue(&exam, None, vec![item("MED-1", 1, 100)]).unwrap();
    dispensed.dispense("pharm-2", Utc::now()).unwrap();
    assert_eq!(dispensed.status, PrescriptionStatus::Dispensed);

    let err: DomainError = dispensed
        .cancel("doc-1", "changed my mind", Utc::now())
        .unwrap_err()
        .into();
    assert!(err.is_conflict());
    assert!(dispensed.cancellation.is_none());
    assert!(dispensed.dispense("pharm-2", Utc::now()).is_err());
}
