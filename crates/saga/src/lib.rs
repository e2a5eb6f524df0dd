//! Saga orchestration for the clinic services.
//!
//! This crate drives multi-step operations that mutate both the local store
//! and remote services, compensating the remote side on failure:
//!
//! - Schedule cancellation: cancel a doctor's appointments for a day, then
//!   finalize the schedule; restore the appointments if finalizing fails.
//! - Prescription fulfillment: decrement stock per item on creation, restore
//!   it on cancellation, request an invoice on dispense.
//!
//! Compensations run in strict reverse order under a [`RetryPolicy`]; what
//! still fails is written to the [`EscalationLog`] instead of being returned.

pub mod compensator;
pub mod error;
pub mod escalation;
pub mod prescription_fulfillment;
pub mod retry;
pub mod schedule_cancellation;
pub mod schedule_service;
pub mod services;
pub mod step;

pub use compensator::{CompensationReport, Compensator};
pub use error::{RemoteError, Result, SagaError};
pub use escalation::{EscalationLog, EscalationRecord, InMemoryEscalationLog};
pub use prescription_fulfillment::{CreatePrescription, PrescriptionSaga};
pub use retry::RetryPolicy;
pub use schedule_cancellation::{CancelScheduleSummary, ScheduleCancellationSaga};
pub use schedule_service::ScheduleService;
pub use services::{
    AppointmentClient, BillingClient, HttpAppointmentClient, HttpBillingClient,
    HttpClientConfig, HttpInventoryClient, InMemoryAppointmentService, InMemoryBillingService,
    InMemoryInventoryService, InventoryClient, InvoiceRef, MedicineInfo,
};
pub use step::{Step, StepFailure, run_steps};
