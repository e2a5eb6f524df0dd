//! Billing service client trait and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use common::{AppointmentId, RequestContext};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::RemoteError;

/// Invoice reference returned by the billing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRef {
    pub id: String,
}

/// Invoice generation on the billing service.
#[async_trait]
pub trait BillingClient: Send + Sync {
    /// Requests an invoice for the appointment. The billing service gathers
    /// the line items itself.
    async fn create_invoice(
        &self,
        ctx: &RequestContext,
        appointment_id: AppointmentId,
        notes: &str,
    ) -> Result<InvoiceRef, RemoteError>;
}

#[async_trait]
impl<T: BillingClient + ?Sized> BillingClient for Arc<T> {
    async fn create_invoice(
        &self,
        ctx: &RequestContext,
        appointment_id: AppointmentId,
        notes: &str,
    ) -> Result<InvoiceRef, RemoteError> {
        (**self).create_invoice(ctx, appointment_id, notes).await
    }
}

#[derive(Debug, Default)]
struct InMemoryBillingState {
    invoices: Vec<(AppointmentId, String)>,
    next_id: u32,
    fail_on_create: bool,
}

/// In-memory billing service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBillingService {
    state: Arc<RwLock<InMemoryBillingState>>,
}

impl InMemoryBillingService {
    /// Creates a new in-memory billing service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail every create call.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    /// Appointments invoiced so far, with the notes sent.
    pub async fn invoices(&self) -> Vec<(AppointmentId, String)> {
        self.state.read().await.invoices.clone()
    }
}

#[async_trait]
impl BillingClient for InMemoryBillingService {
    async fn create_invoice(
        &self,
        _ctx: &RequestContext,
        appointment_id: AppointmentId,
        notes: &str,
    ) -> Result<InvoiceRef, RemoteError> {
        let mut state = self.state.write().await;

        if state.fail_on_create {
            return Err(RemoteError::Rejected {
                service: "billing-service",
                status: 500,
                message: "Invoice generation failed".to_string(),
            });
        }

        state.next_id += 1;
        let id = format!("INV-{:05}", state.next_id);
        state.invoices.push((appointment_id, notes.to_string()));
        Ok(InvoiceRef { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_invoice() {
        let service = InMemoryBillingService::new();
        let appointment = AppointmentId::new();

        let invoice = service
            .create_invoice(&RequestContext::system(), appointment, "notes")
            .await
            .unwrap();
        assert_eq!(invoice.id, "INV-00001");
        assert_eq!(service.invoices().await, vec![(appointment, "notes".to_string())]);
    }

    #[tokio::test]
    async fn test_fail_on_create() {
        let service = InMemoryBillingService::new();
        service.set_fail_on_create(true).await;

        let result = service
            .create_invoice(&RequestContext::system(), AppointmentId::new(), "notes")
            .await;
        assert!(result.is_err());
        assert!(service.invoices().await.is_empty());
    }
}
