//! Appointment service client trait and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use common::{AppointmentId, EmployeeId, RequestContext};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::RemoteError;

const SERVICE: &str = "appointment-service";

/// Bulk operations on the appointments of one doctor for one day.
///
/// Cancel and restore are idempotent at (doctor, date) granularity: calling
/// either when nothing applies returns 0.
#[async_trait]
pub trait AppointmentClient: Send + Sync {
    /// Cancels every SCHEDULED appointment with `reason`. Returns the count.
    async fn cancel_by_doctor_and_date(
        &self,
        ctx: &RequestContext,
        doctor_id: EmployeeId,
        date: NaiveDate,
        reason: &str,
    ) -> Result<u64, RemoteError>;

    /// Puts every CANCELLED appointment with a recorded reason back to
    /// SCHEDULED. Returns the count.
    async fn restore_by_doctor_and_date(
        &self,
        ctx: &RequestContext,
        doctor_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<u64, RemoteError>;

    /// Counts SCHEDULED appointments.
    async fn count_active_by_doctor_and_date(
        &self,
        ctx: &RequestContext,
        doctor_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<u64, RemoteError>;
}

#[async_trait]
impl<T: AppointmentClient + ?Sized> AppointmentClient for Arc<T> {
    async fn cancel_by_doctor_and_date(
        &self,
        ctx: &RequestContext,
        doctor_id: EmployeeId,
        date: NaiveDate,
        reason: &str,
    ) -> Result<u64, RemoteError> {
        (**self)
            .cancel_by_doctor_and_date(ctx, doctor_id, date, reason)
            .await
    }

    async fn restore_by_doctor_and_date(
        &self,
        ctx: &RequestContext,
        doctor_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<u64, RemoteError> {
        (**self)
            .restore_by_doctor_and_date(ctx, doctor_id, date)
            .await
    }

    async fn count_active_by_doctor_and_date(
        &self,
        ctx: &RequestContext,
        doctor_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<u64, RemoteError> {
        (**self)
            .count_active_by_doctor_and_date(ctx, doctor_id, date)
            .await
    }
}

/// Status of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

/// An appointment as kept by the in-memory service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appointment {
    pub id: AppointmentId,
    pub doctor_id: EmployeeId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub cancel_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct InMemoryAppointmentState {
    appointments: Vec<Appointment>,
    fail_cancel: usize,
    fail_restore: usize,
    fail_count: bool,
    cancel_calls: usize,
    restore_calls: usize,
    count_calls: usize,
    last_context: Option<RequestContext>,
}

/// In-memory appointment service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAppointmentService {
    state: Arc<RwLock<InMemoryAppointmentState>>,
}

impl InMemoryAppointmentService {
    /// Creates a new in-memory appointment service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Books a SCHEDULED appointment.
    pub async fn book(&self, doctor_id: EmployeeId, date: NaiveDate, time: NaiveTime) -> AppointmentId {
        let id = AppointmentId::new();
        self.state.write().await.appointments.push(Appointment {
            id,
            doctor_id,
            date,
            time,
            status: AppointmentStatus::Scheduled,
            cancel_reason: None,
            cancelled_at: None,
        });
        id
    }

    /// Makes the next `times` cancel calls fail.
    pub async fn fail_cancel(&self, times: usize) {
        self.state.write().await.fail_cancel = times;
    }

    /// Makes the next `times` restore calls fail.
    pub async fn fail_restore(&self, times: usize) {
        self.state.write().await.fail_restore = times;
    }

    /// Makes every count call fail while set.
    pub async fn set_fail_count(&self, fail: bool) {
        self.state.write().await.fail_count = fail;
    }

    /// Returns the appointments of a doctor for one day, in booking order.
    pub async fn appointments_for(&self, doctor_id: EmployeeId, date: NaiveDate) -> Vec<Appointment> {
        self.state
            .read()
            .await
            .appointments
            .iter()
            .filter(|a| a.doctor_id == doctor_id && a.date == date)
            .cloned()
            .collect()
    }

    pub async fn cancel_calls(&self) -> usize {
        self.state.read().await.cancel_calls
    }

    pub async fn restore_calls(&self) -> usize {
        self.state.read().await.restore_calls
    }

    /// Total number of remote calls received, failed ones included.
    pub async fn total_calls(&self) -> usize {
        let state = self.state.read().await;
        state.cancel_calls + state.restore_calls + state.count_calls
    }

    /// Identity attached to the most recent call.
    pub async fn last_context(&self) -> Option<RequestContext> {
        self.state.read().await.last_context.clone()
    }
}

fn injected(operation: &str) -> RemoteError {
    RemoteError::Rejected {
        service: SERVICE,
        status: 503,
        message: format!("{operation} unavailable"),
    }
}

#[async_trait]
impl AppointmentClient for InMemoryAppointmentService {
    async fn cancel_by_doctor_and_date(
        &self,
        ctx: &RequestContext,
        doctor_id: EmployeeId,
        date: NaiveDate,
        reason: &str,
    ) -> Result<u64, RemoteError> {
        let mut state = self.state.write().await;
        state.cancel_calls += 1;
        state.last_context = Some(ctx.clone());

        if state.fail_cancel > 0 {
            state.fail_cancel -= 1;
            return Err(injected("bulk cancel"));
        }

        let now = Utc::now();
        let mut cancelled = 0;
        for appointment in state.appointments.iter_mut().filter(|a| {
            a.doctor_id == doctor_id && a.date == date && a.status == AppointmentStatus::Scheduled
        }) {
            appointment.status = AppointmentStatus::Cancelled;
            appointment.cancel_reason = Some(reason.to_string());
            appointment.cancelled_at = Some(now);
            cancelled += 1;
        }
        Ok(cancelled)
    }

    async fn restore_by_doctor_and_date(
        &self,
        ctx: &RequestContext,
        doctor_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<u64, RemoteError> {
        let mut state = self.state.write().await;
        state.restore_calls += 1;
        state.last_context = Some(ctx.clone());

        if state.fail_restore > 0 {
            state.fail_restore -= 1;
            return Err(injected("bulk restore"));
        }

        let mut restored = 0;
        for appointment in state.appointments.iter_mut().filter(|a| {
            a.doctor_id == doctor_id
                && a.date == date
                && a.status == AppointmentStatus::Cancelled
                && a.cancel_reason.is_some()
        }) {
            appointment.status = AppointmentStatus::Scheduled;
            appointment.cancel_reason = None;
            appointment.cancelled_at = None;
            restored += 1;
        }
        Ok(restored)
    }

    async fn count_active_by_doctor_and_date(
        &self,
        ctx: &RequestContext,
        doctor_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<u64, RemoteError> {
        let mut state = self.state.write().await;
        state.count_calls += 1;
        state.last_context = Some(ctx.clone());

        if state.fail_count {
            return Err(injected("count"));
        }

        Ok(state
            .appointments
            .iter()
            .filter(|a| {
                a.doctor_id == doctor_id
                    && a.date == date
                    && a.status == AppointmentStatus::Scheduled
            })
            .count() as u64)
    }
}
