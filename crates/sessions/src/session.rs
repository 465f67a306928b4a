use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::observability::TraceId;
use crate::runtime::SessionHandle;

/// Stored in place of an empty agent reply.
pub const EMPTY_RESPONSE: &str = "No response";

/// Identifies one conversation: `conv_` followed by 12 lowercase hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn generate() -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("conv_{}", &hex[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One query/response pair, already truncated for storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    pub query: String,
    pub response: String,
}

/// An active conversation.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub handle: SessionHandle,
    pub conversation_id: ConversationId,
    pub exchanges: Vec<Exchange>,
    pub created_at: DateTime<Utc>,
    pub(crate) trace: Option<TraceId>,
}

impl ConversationSession {
    pub fn query_count(&self) -> usize {
        self.exchanges.len()
    }

    pub fn active(&self, user_id: &str) -> ActiveConversation {
        ActiveConversation {
            user_id: user_id.to_owned(),
            handle: self.handle.clone(),
            conversation_id: self.conversation_id.clone(),
        }
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            user_id: self.handle.user_id.clone(),
            session_id: self.handle.session_id.clone(),
            conversation_id: self.conversation_id.clone(),
            query_count: self.exchanges.len(),
            created_at: self.created_at,
        }
    }
}

/// A consistent view of one conversation as handed to a request: the
/// runtime handle and conversation id always belong together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConversation {
    /// Registry key the conversation is stored under.
    pub user_id: String,
    pub handle: SessionHandle,
    pub conversation_id: ConversationId,
}

/// What the admin listing shows per conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub user_id: String,
    pub session_id: String,
    pub conversation_id: ConversationId,
    pub query_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Cut `text` to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Truncate a response, substituting [`EMPTY_RESPONSE`] for an empty one.
pub(crate) fn stored_response(response: &str, max: usize) -> String {
    if response.is_empty() {
        EMPTY_RESPONSE.to_owned()
    } else {
        truncate_chars(response, max).to_owned()
    }
}

/// `true` for the placeholder queries clients send to start a fresh
/// conversation.  They get no span and no log entry.
pub fn is_new_session_marker(query: &str) -> bool {
    let q = query.trim();
    q.eq_ignore_ascii_case("new session") || q.eq_ignore_ascii_case("new_session")
}
