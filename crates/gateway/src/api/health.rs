use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

/// `GET /health`: liveness probe.  Unauthenticated and never rate limited
/// by the daily quotas.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.conversations.len(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}
