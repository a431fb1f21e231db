//! C7 — status endpoint. Read-only projections of the endpoint table; both
//! surfaces poll C1 before responding, matching the handler's own reload
//! check (spec §4.7).

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn liveness(State(state): State<AppState>) -> impl IntoResponse {
    state.maybe_reload().await;
    Json(json!({"status": "ok"}))
}

pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    state.maybe_reload().await;
    let rpcs = state.inner.table.snapshot_all().await;
    Json(json!({"rpcs": rpcs}))
}
