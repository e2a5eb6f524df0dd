use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use common::{EmployeeId, ExamId, PrescriptionId, ScheduleId};
use domain::{MedicalExam, Prescription, PrescriptionStatus, Schedule, ScheduleStatus};
use tokio::sync::RwLock;

use crate::{
    ExamRepository, PrescriptionRepository, Result, ScheduleRepository, StoreError,
};

#[derive(Debug, Default)]
struct MemoryState {
    schedules: HashMap<ScheduleId, Schedule>,
    exams: HashMap<ExamId, MedicalExam>,
    prescriptions: HashMap<PrescriptionId, Prescription>,
    // injected failures: remaining count per target status
    fail_schedule_transitions: HashMap<ScheduleStatus, usize>,
    fail_prescription_transitions: usize,
}

impl MemoryState {
    fn take_failure(counter: &mut usize) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }
}

/// In-memory store implementation for testing and local runs.
///
/// Implements every repository trait with the same semantics as the
/// PostgreSQL implementation, including compare-and-set status writes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `times` schedule transitions to `target` fail with
    /// `Unavailable`.
    pub async fn fail_schedule_transitions_to(&self, target: ScheduleStatus, times: usize) {
        self.state
            .write()
            .await
            .fail_schedule_transitions
            .insert(target, times);
    }

    /// Makes the next `times` prescription status writes fail with
    /// `Unavailable`.
    pub async fn fail_prescription_transitions(&self, times: usize) {
        self.state.write().await.fail_prescription_transitions = times;
    }

    /// Returns the number of stored prescriptions.
    pub async fn prescription_count(&self) -> usize {
        self.state.read().await.prescriptions.len()
    }

    /// Clears all data and injected failures.
    pub async fn clear(&self) {
        *self.state.write().await = MemoryState::default();
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryStore {
    async fn insert_schedule(&self, schedule: &Schedule) -> Result<()> {
        let mut state = self.state.write().await;

        let taken = state.schedules.values().any(|s| {
            s.employee_id == schedule.employee_id && s.work_date == schedule.work_date
        });
        if taken {
            return Err(StoreError::Duplicate {
                entity: "Schedule",
                key: format!("{} on {}", schedule.employee_id, schedule.work_date),
            });
        }

        state.schedules.insert(schedule.id, schedule.clone());
        Ok(())
    }

    async fn get_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>> {
        Ok(self.state.read().await.schedules.get(&id).cloned())
    }

    async fn find_schedule_by_employee_and_date(
        &self,
        employee_id: EmployeeId,
        work_date: NaiveDate,
    ) -> Result<Option<Schedule>> {
        let state = self.state.read().await;
        Ok(state
            .schedules
            .values()
            .find(|s| s.employee_id == employee_id && s.work_date == work_date)
            .cloned())
    }

    async fn transition_schedule_status(
        &self,
        id: ScheduleId,
        expected: ScheduleStatus,
        next: ScheduleStatus,
        notes: Option<String>,
    ) -> Result<Schedule> {
        let mut state = self.state.write().await;

        if let Some(remaining) = state.fail_schedule_transitions.get_mut(&next)
            && MemoryState::take_failure(remaining)
        {
            return Err(StoreError::Unavailable(format!(
                "injected failure writing schedule status {next}"
            )));
        }

        let schedule = state
            .schedules
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Schedule",
                id: id.to_string(),
            })?;

        if schedule.status != expected {
            return Err(StoreError::StatusConflict {
                entity: "Schedule",
                id: id.to_string(),
                expected: expected.to_string(),
                actual: schedule.status.to_string(),
            });
        }

        schedule.status = next;
        schedule.notes = notes;
        schedule.updated_at = Utc::now();
        Ok(schedule.clone())
    }

    async fn delete_schedule(&self, id: ScheduleId) -> Result<()> {
        self.state
            .write()
            .await
            .schedules
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                entity: "Schedule",
                id: id.to_string(),
            })
    }
}

#[async_trait]
impl ExamRepository for InMemoryStore {
    async fn insert_exam(&self, exam: &MedicalExam) -> Result<()> {
        let mut state = self.state.write().await;
        if state.exams.contains_key(&exam.id) {
            return Err(StoreError::Duplicate {
                entity: "MedicalExam",
                key: exam.id.to_string(),
            });
        }
        state.exams.insert(exam.id, exam.clone());
        Ok(())
    }

    async fn get_exam(&self, id: ExamId) -> Result<Option<MedicalExam>> {
        Ok(self.state.read().await.exams.get(&id).cloned())
    }

    async fn mark_exam_prescribed(&self, id: ExamId) -> Result<()> {
        let mut state = self.state.write().await;
        let exam = state.exams.get_mut(&id).ok_or_else(|| StoreError::NotFound {
            entity: "MedicalExam",
            id: id.to_string(),
        })?;
        exam.has_prescription = true;
        Ok(())
    }
}

#[async_trait]
impl PrescriptionRepository for InMemoryStore {
    async fn insert_prescription(&self, prescription: &Prescription) -> Result<()> {
        let mut state = self.state.write().await;

        if state
            .prescriptions
            .values()
            .any(|p| p.exam_id == prescription.exam_id)
        {
            return Err(StoreError::Duplicate {
                entity: "Prescription",
                key: format!("exam {}", prescription.exam_id),
            });
        }

        state
            .prescriptions
            .insert(prescription.id, prescription.clone());
        Ok(())
    }

    async fn get_prescription(&self, id: PrescriptionId) -> Result<Option<Prescription>> {
        Ok(self.state.read().await.prescriptions.get(&id).cloned())
    }

    async fn find_prescription_by_exam(&self, exam_id: ExamId) -> Result<Option<Prescription>> {
        let state = self.state.read().await;
        Ok(state
            .prescriptions
            .values()
            .find(|p| p.exam_id == exam_id)
            .cloned())
    }

    async fn save_prescription_transition(
        &self,
        prescription: &Prescription,
        expected: PrescriptionStatus,
    ) -> Result<()> {
        let mut state = self.state.write().await;

        if MemoryState::take_failure(&mut state.fail_prescription_transitions) {
            return Err(StoreError::Unavailable(format!(
                "injected failure writing prescription status {}",
                prescription.status
            )));
        }

        let stored = state
            .prescriptions
            .get_mut(&prescription.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Prescription",
                id: prescription.id.to_string(),
            })?;

        if stored.status != expected {
            return Err(StoreError::StatusConflict {
                entity: "Prescription",
                id: prescription.id.to_string(),
                expected: expected.to_string(),
                actual: stored.status.to_string(),
            });
        }

        stored.status = prescription.status;
        stored.cancellation = prescription.cancellation.clone();
        stored.dispensation = prescription.dispensation.clone();
        Ok(())
    }
}
