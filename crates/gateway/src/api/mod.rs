pub mod admin;
pub mod auth;
pub mod error;
pub mod feedback;
pub mod health;
pub mod middleware;
pub mod query;
pub mod usage;

use axum::middleware as mw;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the API router.
///
/// Public routes identify the caller from the request (signed bearer token
/// or client address) and never reject on authentication.  Admin routes are
/// gated per handler by [`admin::AdminGuard`].
pub fn router() -> Router<AppState> {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/api/query", post(query::query))
        .route("/api/feedback", post(feedback::feedback))
        .route("/api/usage", get(usage::usage));

    let admin = Router::new()
        .route("/v1/admin/limits/reset", post(admin::reset_limits))
        .route("/v1/admin/conversations", get(admin::list_conversations));

    public.merge(admin)
}

/// The router with state attached and the per-request middleware stack
/// applied.  Transport layers (CORS, concurrency, per-IP rate limiting,
/// HTTP tracing) are added by the binary.
pub fn app(state: AppState) -> Router {
    router()
        .layer(mw::from_fn(middleware::require_content_type))
        .layer(mw::from_fn_with_state(
            state.clone(),
            middleware::security_headers,
        ))
        .layer(mw::from_fn(middleware::request_id))
        .with_state(state)
}
