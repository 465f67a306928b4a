//! Domain error to HTTP response mapping.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};

use tp_domain::error::{Error, QuotaScope};

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Handler error wrapper so `?` works on `tp_domain::error::Result`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            Error::QuotaExceeded {
                scope,
                count,
                limit,
            } => quota_response(scope, count, limit),
            Error::SessionCreationFailed(msg) => {
                tracing::error!(error = %msg, "agent session creation failed");
                api_error(StatusCode::BAD_GATEWAY, "could not start a conversation")
            }
            Error::Concierge(msg) => {
                tracing::error!(error = %msg, "concierge call failed");
                api_error(StatusCode::BAD_GATEWAY, "the trip planner is unavailable")
            }
            other => {
                tracing::error!(error = %other, "request failed");
                api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

fn quota_response(scope: QuotaScope, count: u32, limit: u32) -> Response {
    let (status, body) = match scope {
        QuotaScope::Anonymous => (
            StatusCode::TOO_MANY_REQUESTS,
            serde_json::json!({
                "error": "free query limit reached, log in to keep planning",
                "login_required": true,
                "count": count,
                "limit": limit,
            }),
        ),
        QuotaScope::User => (
            StatusCode::TOO_MANY_REQUESTS,
            serde_json::json!({
                "error": "daily limit reached, try again tomorrow",
                "count": count,
                "limit": limit,
            }),
        ),
        QuotaScope::Global => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "error": "service busy, try again tomorrow",
            }),
        ),
    };

    let mut resp = (status, Json(body)).into_response();
    let headers = resp.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(0u32));
    match scope {
        QuotaScope::Anonymous => {
            headers.insert("x-authenticated", HeaderValue::from_static("false"));
            headers.insert("x-anonymous-remaining", HeaderValue::from(0u32));
        }
        QuotaScope::User => {
            headers.insert("x-authenticated", HeaderValue::from_static("true"));
        }
        QuotaScope::Global => {}
    }
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: Error) -> StatusCode {
        ApiError(e).into_response().status()
    }

    #[test]
    fn scopes_map_to_distinct_statuses() {
        let q = |scope| Error::QuotaExceeded {
            scope,
            count: 5,
            limit: 5,
        };
        assert_eq!(status_of(q(QuotaScope::Anonymous)), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_of(q(QuotaScope::User)), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_of(q(QuotaScope::Global)), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn upstream_failures_are_bad_gateway() {
        assert_eq!(
            status_of(Error::SessionCreationFailed("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status_of(Error::Concierge("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_of(Error::Other("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn anonymous_denial_sets_headers() {
        let resp = ApiError(Error::QuotaExceeded {
            scope: QuotaScope::Anonymous,
            count: 5,
            limit: 5,
        })
        .into_response();
        assert_eq!(resp.headers()["x-anonymous-remaining"], "0");
        assert_eq!(resp.headers()["x-authenticated"], "false");
        assert_eq!(resp.headers()["x-ratelimit-limit"], "5");
    }
}
