//! Clients for the services a saga mutates remotely, with in-memory and
//! HTTP implementations.

pub mod appointment;
pub mod billing;
pub mod http;
pub mod inventory;

pub use appointment::{
    Appointment, AppointmentClient, AppointmentStatus, InMemoryAppointmentService,
};
pub use billing::{BillingClient, InMemoryBillingService, InvoiceRef};
pub use http::{HttpAppointmentClient, HttpBillingClient, HttpClientConfig, HttpInventoryClient};
pub use inventory::{InMemoryInventoryService, InventoryClient, MedicineInfo};
