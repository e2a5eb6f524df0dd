use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{EmployeeId, ExamId, PrescriptionId, ScheduleId};
use domain::{MedicalExam, Prescription, PrescriptionStatus, Schedule, ScheduleStatus};

use crate::Result;

/// Storage for doctor schedules.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Inserts a new schedule.
    ///
    /// Fails with `Duplicate` if the employee already has a schedule on
    /// that date.
    async fn insert_schedule(&self, schedule: &Schedule) -> Result<()>;

    /// Loads a schedule by id.
    async fn get_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>>;

    /// Loads the schedule of an employee for one date.
    async fn find_schedule_by_employee_and_date(
        &self,
        employee_id: EmployeeId,
        work_date: NaiveDate,
    ) -> Result<Option<Schedule>>;

    /// Moves a schedule from `expected` to `next` and overwrites its notes.
    ///
    /// The write only happens if the stored status still equals `expected`;
    /// otherwise it fails with `StatusConflict`. Returns the updated schedule.
    async fn transition_schedule_status(
        &self,
        id: ScheduleId,
        expected: ScheduleStatus,
        next: ScheduleStatus,
        notes: Option<String>,
    ) -> Result<Schedule>;

    /// Deletes a schedule. Fails with `NotFound` if it does not exist.
    async fn delete_schedule(&self, id: ScheduleId) -> Result<()>;
}

/// Storage for medical exams.
#[async_trait]
pub trait ExamRepository: Send + Sync {
    /// Inserts a new exam.
    async fn insert_exam(&self, exam: &MedicalExam) -> Result<()>;

    /// Loads an exam by id.
    async fn get_exam(&self, id: ExamId) -> Result<Option<MedicalExam>>;

    /// Sets the has-prescription flag of an exam.
    async fn mark_exam_prescribed(&self, id: ExamId) -> Result<()>;
}

/// Storage for prescriptions and their items.
#[async_trait]
pub trait PrescriptionRepository: Send + Sync {
    /// Inserts a prescription together with its items.
    ///
    /// Fails with `Duplicate` if the exam already has a prescription.
    async fn insert_prescription(&self, prescription: &Prescription) -> Result<()>;

    /// Loads a prescription by id.
    async fn get_prescription(&self, id: PrescriptionId) -> Result<Option<Prescription>>;

    /// Loads the prescription issued for an exam.
    async fn find_prescription_by_exam(&self, exam_id: ExamId) -> Result<Option<Prescription>>;

    /// Persists a status change together with its cancel or dispense metadata.
    ///
    /// The write only happens if the stored status still equals `expected`.
    /// Items are never rewritten.
    async fn save_prescription_transition(
        &self,
        prescription: &Prescription,
        expected: PrescriptionStatus,
    ) -> Result<()>;
}

#[async_trait]
impl<T: ScheduleRepository + ?Sized> ScheduleRepository for Arc<T> {
    async fn insert_schedule(&self, schedule: &Schedule) -> Result<()> {
        (**self).insert_schedule(schedule).await
    }

    async fn get_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>> {
        (**self).get_schedule(id).await
    }

    async fn find_schedule_by_employee_and_date(
        &self,
        employee_id: EmployeeId,
        work_date: NaiveDate,
    ) -> Result<Option<Schedule>> {
        (**self)
            .find_schedule_by_employee_and_date(employee_id, work_date)
            .await
    }

    async fn transition_schedule_status(
        &self,
        id: ScheduleId,
        expected: ScheduleStatus,
        next: ScheduleStatus,
        notes: Option<String>,
    ) -> Result<Schedule> {
        (**self).transition_schedule_status(id, expected, next, notes).await
    }

    async fn delete_schedule(&self, id: ScheduleId) -> Result<()> {
        (**self).delete_schedule(id).await
    }
}

#[async_trait]
impl<T: ExamRepository + ?Sized> ExamRepository for Arc<T> {
    async fn insert_exam(&self, exam: &MedicalExam) -> Result<()> {
        (**self).insert_exam(exam).await
    }

    async fn get_exam(&self, id: ExamId) -> Result<Option<MedicalExam>> {
        (**self).get_exam(id).await
    }

    async fn mark_exam_prescribed(&self, id: ExamId) -> Result<()> {
        (**self).mark_exam_prescribed(id).await
    }
}

#[async_trait]
impl<T: PrescriptionRepository + ?Sized> PrescriptionRepository for Arc<T> {
    async fn insert_prescription(&self, prescription: &Prescription) -> Result<()> {
        (**self).insert_prescription(prescription).await
    }

    async fn get_prescription(&self, id: PrescriptionId) -> Result<Option<Prescription>> {
        (**self).get_prescription(id).await
    }

    async fn find_prescription_by_exam(&self, exam_id: ExamId) -> Result<Option<Prescription>> {
        (**self).find_prescription_by_exam(exam_id).await
    }

    async fn save_prescription_transition(
        &self,
        prescription: &Prescription,
        expected: PrescriptionStatus,
    ) -> Result<()> {
        (**self).save_prescription_transition(prescription, expected).await
    }
}
