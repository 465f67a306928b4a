//! Operator endpoints.
//!
//! - `POST /v1/admin/limits/reset`: zero every daily counter
//! - `GET  /v1/admin/conversations`: list active conversations
//!
//! Handlers opt in to the bearer check by taking `_guard: AdminGuard`.

use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use tp_domain::trace::TraceEvent;

use crate::api::error::api_error;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Guard
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Axum extractor that enforces the admin bearer token.
///
/// The provided token is hashed with SHA-256 and compared in constant time
/// against the digest cached at startup.  With no admin token configured
/// the admin surface is closed (403).
pub struct AdminGuard;

#[async_trait]
impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected_hash) = &state.admin_token_hash else {
            return Err(api_error(
                StatusCode::FORBIDDEN,
                "admin endpoints are disabled (no admin token configured)",
            ));
        };

        let provided = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or("");

        let provided_hash = Sha256::digest(provided.as_bytes());
        if !bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
            return Err(api_error(StatusCode::UNAUTHORIZED, "invalid admin token"));
        }
        Ok(AdminGuard)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/admin/limits/reset
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn reset_limits(_guard: AdminGuard, State(state): State<AppState>) -> impl IntoResponse {
    state.quota.reset_all();
    TraceEvent::LimitsReset {
        source: "admin".into(),
    }
    .emit();
    tracing::warn!("all daily limits reset by operator");

    Json(serde_json::json!({
        "success": true,
        "global": state.quota.global().status(),
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/admin/conversations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_conversations(
    _guard: AdminGuard,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let conversations = state.conversations.list();
    Json(serde_json::json!({
        "count": conversations.len(),
        "conversations": conversations,
    }))
}
