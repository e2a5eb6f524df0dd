//! Operator view of compensations that exhausted their retries.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use saga::EscalationRecord;

use crate::state::AppState;

/// GET /admin/escalations: lists escalated compensations, oldest first.
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<EscalationRecord>> {
    Json(state.escalations.list().await)
}
