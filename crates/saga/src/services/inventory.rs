//! Medicine inventory client trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{MedicineId, RequestContext};
use domain::Money;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::RemoteError;

const SERVICE: &str = "medicine-service";

/// Medicine data as reported by the inventory service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineInfo {
    pub id: MedicineId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

/// Stock operations on the medicine service.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Looks up a medicine. `None` if the service does not know it.
    async fn get_medicine(
        &self,
        ctx: &RequestContext,
        medicine_id: &MedicineId,
    ) -> Result<Option<MedicineInfo>, RemoteError>;

    /// Adds `delta` to the stock; negative values decrement.
    ///
    /// A zero delta and a delta that would make the stock negative are
    /// rejected. Any success status from the service means the change was
    /// applied; the response body is not inspected.
    async fn adjust_stock(
        &self,
        ctx: &RequestContext,
        medicine_id: &MedicineId,
        delta: i64,
    ) -> Result<(), RemoteError>;
}

#[async_trait]
impl<T: InventoryClient + ?Sized> InventoryClient for Arc<T> {
    async fn get_medicine(
        &self,
        ctx: &RequestContext,
        medicine_id: &MedicineId,
    ) -> Result<Option<MedicineInfo>, RemoteError> {
        (**self).get_medicine(ctx, medicine_id).await
    }

    async fn adjust_stock(
        &self,
        ctx: &RequestContext,
        medicine_id: &MedicineId,
        delta: i64,
    ) -> Result<(), RemoteError> {
        (**self).adjust_stock(ctx, medicine_id, delta).await
    }
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    medicines: HashMap<MedicineId, MedicineInfo>,
    // remaining injected failures per medicine
    fail_adjustments: HashMap<MedicineId, usize>,
    adjust_attempts: HashMap<MedicineId, usize>,
    applied: Vec<(MedicineId, i64)>,
}

/// In-memory inventory service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryService {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryService {
    /// Creates a new in-memory inventory service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a medicine with its price and stock.
    pub async fn add_medicine(
        &self,
        id: impl Into<MedicineId>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) {
        let id = id.into();
        self.state.write().await.medicines.insert(
            id.clone(),
            MedicineInfo {
                id,
                name: name.into(),
                unit_price,
                quantity,
            },
        );
    }

    /// Overwrites the stock of a medicine.
    pub async fn set_stock(&self, id: &MedicineId, quantity: u32) {
        if let Some(medicine) = self.state.write().await.medicines.get_mut(id) {
            medicine.quantity = quantity;
        }
    }

    /// Returns the current stock of a medicine.
    pub async fn stock(&self, id: &MedicineId) -> Option<u32> {
        self.state.read().await.medicines.get(id).map(|m| m.quantity)
    }

    /// Makes the next `times` stock adjustments of `id` fail.
    pub async fn fail_adjustments(&self, id: &MedicineId, times: usize) {
        self.state
            .write()
            .await
            .fail_adjustments
            .insert(id.clone(), times);
    }

    /// Number of adjust calls received for `id`, failed ones included.
    pub async fn adjust_attempts(&self, id: &MedicineId) -> usize {
        self.state
            .read()
            .await
            .adjust_attempts
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    /// Successful adjustments in the order they were applied.
    pub async fn applied_adjustments(&self) -> Vec<(MedicineId, i64)> {
        self.state.read().await.applied.clone()
    }
}

fn rejected(status: u16, message: String) -> RemoteError {
    RemoteError::Rejected {
        service: SERVICE,
        status,
        message,
    }
}

#[async_trait]
impl InventoryClient for InMemoryInventoryService {
    async fn get_medicine(
        &self,
        _ctx: &RequestContext,
        medicine_id: &MedicineId,
    ) -> Result<Option<MedicineInfo>, RemoteError> {
        Ok(self.state.read().await.medicines.get(medicine_id).cloned())
    }

    async fn adjust_stock(
        &self,
        _ctx: &RequestContext,
        medicine_id: &MedicineId,
        delta: i64,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.write().await;
        *state
            .adjust_attempts
            .entry(medicine_id.clone())
            .or_default() += 1;

        if let Some(remaining) = state.fail_adjustments.get_mut(medicine_id)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(rejected(503, "stock service unavailable".to_string()));
        }

        if delta == 0 {
            return Err(rejected(400, "Delta must be non-zero".to_string()));
        }

        let medicine = state
            .medicines
            .get_mut(medicine_id)
            .ok_or_else(|| rejected(404, format!("Medicine not found: {medicine_id}")))?;

        let current = i64::from(medicine.quantity);
        let next = current + delta;
        if next < 0 {
            return Err(rejected(
                400,
                format!(
                    "Insufficient stock. Available: {current}, Requested deduction: {}",
                    delta.unsigned_abs()
                ),
            ));
        }
        let next = u32::try_from(next)
            .map_err(|_| rejected(400, format!("Stock overflow for medicine {medicine_id}")))?;

        medicine.quantity = next;
        state.applied.push((medicine_id.clone(), delta));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service_with(id: &str, quantity: u32) -> (InMemoryInventoryService, MedicineId) {
        let service = InMemoryInventoryService::new();
        service
            .add_medicine(id, "Ibuprofen", Money::from_cents(499), quantity)
            .await;
        (service, MedicineId::new(id))
    }

    #[tokio::test]
    async fn test_decrement_and_restore() {
        let (service, id) = service_with("MED-1", 10).await;
        let ctx = RequestContext::system();

        service.adjust_stock(&ctx, &id, -4).await.unwrap();
        assert_eq!(service.stock(&id).await, Some(6));
        service.adjust_stock(&ctx, &id, 4).await.unwrap();
        assert_eq!(service.stock(&id).await, Some(10));
        assert_eq!(
            service.applied_adjustments().await,
            vec![(id.clone(), -4), (id.clone(), 4)]
        );
    }

    #[tokio::test]
    async fn test_rejects_zero_and_negative_result() {
        let (service, id) = service_with("MED-1", 3).await;
        let ctx = RequestContext::system();

        let zero = service.adjust_stock(&ctx, &id, 0).await.unwrap_err();
        assert_eq!(zero.status(), Some(400));

        let too_much = service.adjust_stock(&ctx, &id, -4).await.unwrap_err();
        assert!(too_much.to_string().contains("Insufficient stock"));
        assert_eq!(service.stock(&id).await, Some(3));
        assert_eq!(service.adjust_attempts(&id).await, 2);
    }

    #[tokio::test]
    async fn test_unknown_medicine() {
        let service = InMemoryInventoryService::new();
        let ctx = RequestContext::system();
        let id = MedicineId::new("missing");

        assert!(service.get_medicine(&ctx, &id).await.unwrap().is_none());
        let err = service.adjust_stock(&ctx, &id, 1).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_injected_failures_then_success() {
        let (service, id) = service_with("MED-1", 5).await;
        service.fail_adjustments(&id, 2).await;
        let ctx = RequestContext::system();

        assert!(service.adjust_stock(&ctx, &id, 1).await.is_err());
        assert!(service.adjust_stock(&ctx, &id, 1).await.is_err());
        service.adjust_stock(&ctx, &id, 1).await.unwrap();
        assert_eq!(service.stock(&id).await, Some(6));
        assert_eq!(service.adjust_attempts(&id).await, 3);
    }
}
