//! Record of compensations that could not be completed.
//!
//! Every entry asks an operator to repair the named resource by hand.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One compensating action that still failed after all retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalationRecord {
    pub id: Uuid,
    /// Saga that owned the action, e.g. `prescription_create`.
    pub saga: String,
    /// Step whose inverse failed.
    pub step: String,
    /// Correlation key of the remote resource (medicine id, doctor+date).
    pub resource_key: String,
    /// Count or signed delta the inverse should have applied.
    pub magnitude: i64,
    pub attempts: u32,
    pub error: String,
    pub recorded_at: DateTime<Utc>,
}

/// Sink for escalation records.
#[async_trait]
pub trait EscalationLog: Send + Sync {
    /// Stores a record. Must not fail.
    async fn record(&self, record: EscalationRecord);

    /// Returns every record, oldest first.
    async fn list(&self) -> Vec<EscalationRecord>;
}

#[async_trait]
impl<T: EscalationLog + ?Sized> EscalationLog for Arc<T> {
    async fn record(&self, record: EscalationRecord) {
        (**self).record(record).await
    }

    async fn list(&self) -> Vec<EscalationRecord> {
        (**self).list().await
    }
}

/// Escalation log kept in process memory and mirrored to the error log.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEscalationLog {
    records: Arc<RwLock<Vec<EscalationRecord>>>,
}

impl InMemoryEscalationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if nothing has been escalated.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl EscalationLog for InMemoryEscalationLog {
    async fn record(&self, record: EscalationRecord) {
        metrics::counter!("escalations_total", "saga" => record.saga.clone()).increment(1);
        tracing::error!(
            escalation_id = %record.id,
            saga = %record.saga,
            step = %record.step,
            resource_key = %record.resource_key,
            magnitude = record.magnitude,
            attempts = record.attempts,
            error = %record.error,
            "compensation failed, manual intervention required"
        );
        self.records.write().await.push(record);
    }

    async fn list(&self) -> Vec<EscalationRecord> {
        self.records.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(step: &str) -> EscalationRecord {
        EscalationRecord {
            id: Uuid::new_v4(),
            saga: "prescription_create".to_string(),
            step: step.to_string(),
            resource_key: "MED-1".to_string(),
            magnitude: 5,
            attempts: 3,
            error: "timeout".to_string(),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_records_are_listed_in_order() {
        let log = InMemoryEscalationLog::new();
        assert!(log.is_empty().await);

        log.record(record("first")).await;
        log.record(record("second")).await;

        let listed = log.list().await;
        assert_eq!(log.len().await, 2);
        assert_eq!(listed[0].step, "first");
        assert_eq!(listed[1].step, "second");
    }

    #[tokio::test]
    async fn test_shared_through_arc() {
        let log = Arc::new(InMemoryEscalationLog::new());
        let shared: Arc<dyn EscalationLog> = log.clone();
        shared.record(record("restore_stock")).await;
        assert_eq!(log.len().await, 1);
    }
}
