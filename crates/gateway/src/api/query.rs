//! `POST /api/query`: one conversational turn.
//!
//! Admission runs before anything touches the conversation registry, so a
//! rejected request never creates a session.

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use tp_domain::error::Error;
use tp_limits::{GateDecision, UsageView};
use tp_sessions::is_new_session_marker;

use crate::api::auth::CallerIdentity;
use crate::api::error::{api_error, ApiError};
use crate::concierge::{ConciergeRequest, FALLBACK_REPLY};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / response shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Optional label separating conversations of one anonymous client.
    /// Ignored for authenticated callers.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Start a fresh conversation before answering.
    #[serde(default)]
    pub new_session: bool,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    pub response: String,
    pub session_id: String,
    pub conversation_id: String,
    pub query_count: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/query
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn query(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(body): Json<QueryRequest>,
) -> Result<Response, ApiError> {
    let query = body.query.trim();
    if query.is_empty() {
        return Ok(api_error(StatusCode::BAD_REQUEST, "query cannot be empty"));
    }

    let decision = match state.quota.admit(&caller.0) {
        Ok(decision) => decision,
        Err(e @ Error::QuotaExceeded { .. }) => {
            let mut resp = ApiError(e).into_response();
            apply_denial_headers(resp.headers_mut(), &state.quota.usage(&caller.0));
            return Ok(resp);
        }
        Err(e) => return Err(e.into()),
    };

    let key = caller.conversation_key(body.user_id.as_deref());
    let conversation = if body.new_session {
        state.conversations.force_new(&key).await?
    } else {
        state.conversations.get_or_create(&key).await?
    };

    let marker = is_new_session_marker(query);
    let span = if marker {
        None
    } else {
        state.conversations.open_query_span(&conversation, query).await
    };

    tracing::info!(
        conversation = %key,
        session_id = %conversation.handle.session_id,
        query_num = span.as_ref().map(|s| s.query_num),
        "dispatching query"
    );

    let request = ConciergeRequest {
        user_id: key.clone(),
        session_id: conversation.handle.session_id.clone(),
        conversation_id: conversation.conversation_id.to_string(),
        query: query.to_owned(),
    };
    let reply = match state.concierge.respond(&request).await {
        Ok(reply) if reply.trim().is_empty() => FALLBACK_REPLY.to_owned(),
        Ok(reply) => reply,
        Err(e) => {
            if let Some(span) = span {
                state.conversations.close_query_span(span, "").await;
            }
            return Err(e.into());
        }
    };

    if let Some(span) = span {
        state.conversations.close_query_span(span, &reply).await;
    }
    let recorded = if marker {
        None
    } else {
        state.conversations.record_exchange(&conversation, query, &reply)
    };
    let query_count = recorded.unwrap_or_else(|| state.conversations.query_count(&key));

    let mut resp = Json(QueryResponse {
        success: true,
        response: reply,
        session_id: conversation.handle.session_id,
        conversation_id: conversation.conversation_id.to_string(),
        query_count,
    })
    .into_response();
    apply_rate_headers(resp.headers_mut(), &decision);
    Ok(resp)
}

/// Unix timestamp of the next UTC midnight after `day`.
fn reset_timestamp(day: NaiveDate) -> i64 {
    day.checked_add_days(Days::new(1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Complete a quota denial with the caller's reset time and identity.  The
/// limit/remaining pair already names the limiter that rejected.
fn apply_denial_headers(headers: &mut HeaderMap, usage: &UsageView) {
    headers.insert(
        "x-ratelimit-reset",
        HeaderValue::from(reset_timestamp(usage.global.reset_date)),
    );
    headers.insert(
        "x-authenticated",
        HeaderValue::from_static(if usage.authenticated { "true" } else { "false" }),
    );
    if usage.authenticated {
        headers.remove("x-anonymous-remaining");
    } else {
        headers.insert(
            "x-anonymous-remaining",
            HeaderValue::from(usage.caller.remaining),
        );
    }
}

/// Attach the caller's quota figures to a successful response.
pub fn apply_rate_headers(headers: &mut HeaderMap, decision: &GateDecision) {
    headers.insert(
        "x-ratelimit-remaining",
        HeaderValue::from(decision.scoped.remaining),
    );
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.scoped_limit));
    headers.insert(
        "x-ratelimit-reset",
        HeaderValue::from(reset_timestamp(decision.reset_date)),
    );
    headers.insert(
        "x-authenticated",
        HeaderValue::from_static(if decision.authenticated { "true" } else { "false" }),
    );
    if let Some(remaining) = decision.anonymous_remaining() {
        headers.insert("x-anonymous-remaining", HeaderValue::from(remaining));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_is_next_midnight_utc() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        // 2026-01-02T00:00:00Z
        assert_eq!(reset_timestamp(day), 1_767_312_000);
    }
}
