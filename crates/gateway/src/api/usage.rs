//! `GET /api/usage`: the caller's and the service's quota for today.
//!
//! Read-only: asking never consumes quota.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::api::auth::CallerIdentity;
use crate::state::AppState;

pub async fn usage(State(state): State<AppState>, caller: CallerIdentity) -> impl IntoResponse {
    Json(state.quota.usage(&caller.0))
}
