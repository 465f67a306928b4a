//! Agent runtime port.
//!
//! The agent framework owns the real conversational state; the gateway only
//! needs an opaque handle to route follow-up turns to the same session.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use tp_domain::error::Result;

/// Opaque session handle issued by the agent runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionHandle {
    pub session_id: String,
    pub user_id: String,
    pub app_name: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Allocate a fresh session for `user_id`.
    async fn create_session(&self, app_name: &str, user_id: &str) -> Result<SessionHandle>;

    /// Release a session the registry no longer routes to.
    async fn close_session(&self, _handle: &SessionHandle) -> Result<()> {
        Ok(())
    }
}

/// Process-local runtime: sessions live in a map and vanish on restart.
#[derive(Default)]
pub struct InMemoryAgentRuntime {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl InMemoryAgentRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Number of sessions currently allocated.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl AgentRuntime for InMemoryAgentRuntime {
    async fn create_session(&self, app_name: &str, user_id: &str) -> Result<SessionHandle> {
        let handle = SessionHandle {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_owned(),
            app_name: app_name.to_owned(),
            created_at: Utc::now(),
        };
        self.sessions
            .write()
            .insert(handle.session_id.clone(), handle.clone());
        Ok(handle)
    }

    async fn close_session(&self, handle: &SessionHandle) -> Result<()> {
        self.sessions.write().remove(&handle.session_id);
        Ok(())
    }
}
