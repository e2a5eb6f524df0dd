//! Shared application state and the backends it is built from.

use std::sync::Arc;

use saga::{
    AppointmentClient, BillingClient, Compensator, EscalationLog, InMemoryAppointmentService,
    InMemoryBillingService, InMemoryEscalationLog, InMemoryInventoryService, InventoryClient,
    PrescriptionSaga, RetryPolicy, ScheduleCancellationSaga, ScheduleService,
};
use store::{ExamRepository, InMemoryStore, PrescriptionRepository, ScheduleRepository};

pub type Schedules = Arc<dyn ScheduleRepository>;
pub type Exams = Arc<dyn ExamRepository>;
pub type Prescriptions = Arc<dyn PrescriptionRepository>;
pub type Appointments = Arc<dyn AppointmentClient>;
pub type Inventory = Arc<dyn InventoryClient>;
pub type Billing = Arc<dyn BillingClient>;

/// Storage, remote clients and retry settings the application runs on.
#[derive(Clone)]
pub struct Backends {
    pub schedules: Schedules,
    pub exams: Exams,
    pub prescriptions: Prescriptions,
    pub appointments: Appointments,
    pub inventory: Inventory,
    pub billing: Billing,
    pub escalations: Arc<dyn EscalationLog>,
    pub retry: RetryPolicy,
}

impl Backends {
    /// Everything in memory, with the default retry policy.
    pub fn in_memory() -> Self {
        let store = InMemoryStore::new();
        Self {
            schedules: Arc::new(store.clone()),
            exams: Arc::new(store.clone()),
            prescriptions: Arc::new(store),
            appointments: Arc::new(InMemoryAppointmentService::new()),
            inventory: Arc::new(InMemoryInventoryService::new()),
            billing: Arc::new(InMemoryBillingService::new()),
            escalations: Arc::new(InMemoryEscalationLog::new()),
            retry: RetryPolicy::default(),
        }
    }
}

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub schedules: ScheduleService<Schedules, Appointments>,
    pub schedule_cancellation: ScheduleCancellationSaga<Schedules, Appointments>,
    pub prescriptions: PrescriptionSaga<Prescriptions, Exams, Inventory, Billing>,
    pub escalations: Arc<dyn EscalationLog>,
}

impl AppState {
    /// Wires the services and sagas over `backends`.
    pub fn new(backends: Backends) -> Self {
        let compensator = Compensator::new(backends.retry, backends.escalations.clone());
        Self {
            schedules: ScheduleService::new(
                backends.schedules.clone(),
                backends.appointments.clone(),
            ),
            schedule_cancellation: ScheduleCancellationSaga::new(
                backends.schedules,
                backends.appointments,
                backends.escalations.clone(),
            ),
            prescriptions: PrescriptionSaga::new(
                backends.prescriptions,
                backends.exams,
                backends.inventory,
                backends.billing,
                compensator,
            ),
            escalations: backends.escalations,
        }
    }
}
