pub mod handler;
pub mod status;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status::liveness).post(handler::relay))
        .route("/status", get(status::get_status))
        .with_state(state)
}
