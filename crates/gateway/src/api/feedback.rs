//! `POST /api/feedback`: a satisfied user closes their conversation.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use crate::api::auth::CallerIdentity;
use crate::api::error::{api_error, ApiError};
use crate::state::AppState;

const SATISFIED: &str = "satisfied";

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: String,
    /// Same label as on `/api/query`.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Informational; the conversation is found by caller.
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub success: bool,
    pub message: String,
    pub ended: bool,
}

pub async fn feedback(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(body): Json<FeedbackRequest>,
) -> Result<Response, ApiError> {
    let feedback = body.feedback.trim().to_ascii_lowercase();
    if feedback.is_empty() {
        return Ok(api_error(StatusCode::BAD_REQUEST, "feedback cannot be empty"));
    }

    let key = caller.conversation_key(body.user_id.as_deref());
    tracing::info!(
        conversation = %key,
        session_id = body.session_id.as_deref().unwrap_or(""),
        feedback = %feedback,
        "feedback received"
    );

    let ended = if feedback == SATISFIED {
        state.conversations.end(&key, Some(SATISFIED)).await?
    } else {
        false
    };

    let message = if ended {
        "Thanks! Your conversation has been closed."
    } else {
        "Thanks for the feedback."
    };
    Ok(Json(FeedbackResponse {
        success: true,
        message: message.into(),
        ended,
    })
    .into_response())
}
