//! Conversation session registry.
//!
//! Each user is either idle (no entry) or has exactly one active
//! conversation.  Lifecycle transitions for one user are serialized by a
//! [`UserLockMap`] permit; the session map itself is a plain
//! `parking_lot::RwLock` that is never held across an `.await`.
//!
//! Request futures can be dropped at any `.await`.  Resources allocated
//! before the entry is inserted (the runtime session) and spans opened for a
//! query are released from `Drop` on a spawned task when that happens.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use tp_domain::config::SessionsConfig;
use tp_domain::error::{Error, Result};
use tp_domain::trace::TraceEvent;

use crate::lock::UserLockMap;
use crate::observability::{Observability, SpanId, TraceEnd, TraceStart};
use crate::runtime::{AgentRuntime, SessionHandle};
use crate::session::{
    stored_response, truncate_chars, ActiveConversation, ConversationId, ConversationSession,
    ConversationSummary, Exchange,
};

/// Reason recorded when a conversation is replaced by a fresh one.
pub const REASON_NEW_SESSION: &str = "new_session";
/// Reason recorded when a conversation is ended explicitly.
pub const REASON_ENDED: &str = "ended";

const DEFAULT_FEEDBACK: &str = "satisfied";

/// An open span for one user query.  Pass it back to
/// [`ConversationRegistry::close_query_span`] once the reply is known;
/// dropping it instead closes the span with an empty output.
pub struct QuerySpan {
    pub query_num: usize,
    span: Option<SpanId>,
    observability: Observability,
}

impl Drop for QuerySpan {
    fn drop(&mut self) {
        if let Some(id) = self.span.take() {
            let observability = self.observability.clone();
            spawn_cleanup(async move { observability.end_span(id, "").await });
        }
    }
}

/// Runtime session allocated for an entry that is not inserted yet.
/// Released on drop unless [`PendingSession::commit`] was reached.
struct PendingSession {
    runtime: Arc<dyn AgentRuntime>,
    handle: Option<SessionHandle>,
}

impl PendingSession {
    fn commit(mut self) {
        self.handle = None;
    }
}

impl Drop for PendingSession {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        tracing::warn!(
            session_id = %handle.session_id,
            "conversation setup abandoned, releasing agent session"
        );
        let runtime = self.runtime.clone();
        spawn_cleanup(async move {
            if let Err(e) = runtime.close_session(&handle).await {
                tracing::warn!(
                    error = %e,
                    session_id = %handle.session_id,
                    "could not release agent session"
                );
            }
        });
    }
}

fn spawn_cleanup(fut: impl Future<Output = ()> + Send + 'static) {
    match tokio::runtime::Handle::try_current() {
        Ok(rt) => {
            rt.spawn(fut);
        }
        Err(_) => tracing::warn!("no async runtime, cleanup skipped"),
    }
}

pub struct ConversationRegistry {
    config: SessionsConfig,
    runtime: Arc<dyn AgentRuntime>,
    observability: Observability,
    sessions: RwLock<HashMap<String, ConversationSession>>,
    locks: UserLockMap,
}

impl ConversationRegistry {
    pub fn new(
        config: SessionsConfig,
        runtime: Arc<dyn AgentRuntime>,
        observability: Observability,
    ) -> Self {
        Self {
            config,
            runtime,
            observability,
            sessions: RwLock::new(HashMap::new()),
            locks: UserLockMap::new(),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Return the user's active conversation, creating one if there is none.
    pub async fn get_or_create(&self, user_id: &str) -> Result<ActiveConversation> {
        // Fast path: session already exists.
        if let Some(active) = self.active(user_id) {
            return Ok(active);
        }

        let _permit = self.locks.acquire(user_id).await?;
        if let Some(active) = self.active(user_id) {
            return Ok(active);
        }
        self.open(user_id).await
    }

    /// Tear down any active conversation and start a fresh one.
    pub async fn force_new(&self, user_id: &str) -> Result<ActiveConversation> {
        let _permit = self.locks.acquire(user_id).await?;
        let previous = self.sessions.write().remove(user_id);
        if let Some(previous) = previous {
            self.close(previous, REASON_NEW_SESSION, None).await;
        }
        self.open(user_id).await
    }

    /// End the user's conversation.  Returns `false` when there was none.
    pub async fn end(&self, user_id: &str, feedback: Option<&str>) -> Result<bool> {
        let permit = self.locks.acquire(user_id).await?;
        let ended = self.sessions.write().remove(user_id);
        let found = ended.is_some();
        if let Some(session) = ended {
            let feedback = feedback.unwrap_or(DEFAULT_FEEDBACK);
            self.close(session, REASON_ENDED, Some(feedback)).await;
        }
        drop(permit);
        self.locks.prune_idle();
        Ok(found)
    }

    // ── Conversation log ─────────────────────────────────────────────

    /// Append a query/response pair to `conversation` and return its new
    /// query count.  Ignored with a warning when that conversation is no
    /// longer the user's active one.
    pub fn record_exchange(
        &self,
        conversation: &ActiveConversation,
        query: &str,
        response: &str,
    ) -> Option<usize> {
        let user_id = conversation.user_id.as_str();
        let recorded = {
            let mut sessions = self.sessions.write();
            sessions
                .get_mut(user_id)
                .filter(|s| s.conversation_id == conversation.conversation_id)
                .map(|session| {
                    session.exchanges.push(Exchange {
                        query: truncate_chars(query, self.config.query_max_chars).to_owned(),
                        response: stored_response(response, self.config.response_max_chars),
                    });
                    session.exchanges.len()
                })
        };

        match recorded {
            Some(query_num) => TraceEvent::ExchangeRecorded {
                user_id: user_id.to_owned(),
                conversation_id: conversation.conversation_id.to_string(),
                query_num,
            }
            .emit(),
            None => tracing::warn!(
                user_id,
                conversation_id = %conversation.conversation_id,
                "conversation no longer active, exchange dropped"
            ),
        }
        recorded
    }

    pub fn query_count(&self, user_id: &str) -> usize {
        self.sessions
            .read()
            .get(user_id)
            .map_or(0, ConversationSession::query_count)
    }

    pub fn conversation_id(&self, user_id: &str) -> Option<ConversationId> {
        self.sessions
            .read()
            .get(user_id)
            .map(|s| s.conversation_id.clone())
    }

    pub fn session(&self, user_id: &str) -> Option<SessionHandle> {
        self.sessions.read().get(user_id).map(|s| s.handle.clone())
    }

    fn active(&self, user_id: &str) -> Option<ActiveConversation> {
        self.sessions.read().get(user_id).map(|s| s.active(user_id))
    }

    /// The stored log for the user's active conversation.
    pub fn exchanges(&self, user_id: &str) -> Vec<Exchange> {
        self.sessions
            .read()
            .get(user_id)
            .map(|s| s.exchanges.clone())
            .unwrap_or_default()
    }

    // ── Query spans ──────────────────────────────────────────────────

    /// Open a `user_query_<n>` span under the conversation's trace, where
    /// `n` is the number this query will have in the log.  `None` once the
    /// conversation has been replaced or ended.
    pub async fn open_query_span(
        &self,
        conversation: &ActiveConversation,
        query: &str,
    ) -> Option<QuerySpan> {
        let (trace, query_num) = {
            let sessions = self.sessions.read();
            let session = sessions
                .get(&conversation.user_id)
                .filter(|s| s.conversation_id == conversation.conversation_id)?;
            (session.trace, session.query_count() + 1)
        };
        let span = match trace {
            Some(trace) => {
                let name = format!("user_query_{query_num}");
                self.observability.span(trace, &name, query, query_num).await
            }
            None => None,
        };
        Some(QuerySpan {
            query_num,
            span,
            observability: self.observability.clone(),
        })
    }

    pub async fn close_query_span(&self, mut span: QuerySpan, response: &str) {
        if let Some(id) = span.span.take() {
            let output = stored_response(response, self.config.span_output_max_chars);
            self.observability.end_span(id, &output).await;
        }
    }

    // ── Introspection ────────────────────────────────────────────────

    pub fn list(&self) -> Vec<ConversationSummary> {
        let mut list: Vec<_> = self
            .sessions
            .read()
            .values()
            .map(ConversationSession::summary)
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        list
    }

    /// Number of active conversations.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    // ── Private ──────────────────────────────────────────────────────

    /// Allocate a session and trace, then insert the entry in one step.
    /// Caller holds the user's lifecycle permit.
    async fn open(&self, user_id: &str) -> Result<ActiveConversation> {
        let handle = self
            .runtime
            .create_session(&self.config.app_name, user_id)
            .await
            .map_err(|e| match e {
                Error::SessionCreationFailed(_) => e,
                other => Error::SessionCreationFailed(other.to_string()),
            })?;
        let pending = PendingSession {
            runtime: self.runtime.clone(),
            handle: Some(handle.clone()),
        };

        let conversation_id = ConversationId::generate();
        let trace = self
            .observability
            .start(&TraceStart {
                user_id: user_id.to_owned(),
                session_id: handle.session_id.clone(),
                conversation_id: conversation_id.to_string(),
                app_name: self.config.app_name.clone(),
            })
            .await;

        let session = ConversationSession {
            handle: handle.clone(),
            conversation_id: conversation_id.clone(),
            exchanges: Vec::new(),
            created_at: handle.created_at,
            trace,
        };
        let active = session.active(user_id);
        self.sessions.write().insert(user_id.to_owned(), session);
        pending.commit();

        tracing::info!(
            user_id,
            session_id = %handle.session_id,
            conversation_id = %conversation_id,
            "conversation started"
        );
        TraceEvent::ConversationStarted {
            user_id: user_id.to_owned(),
            session_id: handle.session_id.clone(),
            conversation_id: conversation_id.to_string(),
        }
        .emit();

        Ok(active)
    }

    /// Close the trace and release the runtime session of a removed entry.
    async fn close(&self, session: ConversationSession, reason: &str, feedback: Option<&str>) {
        let total_queries = session.query_count();
        if let Some(trace) = session.trace {
            self.observability
                .end(
                    trace,
                    &TraceEnd {
                        reason: reason.to_owned(),
                        feedback: feedback.map(str::to_owned),
                        total_queries,
                    },
                )
                .await;
        }
        if let Err(e) = self.runtime.close_session(&session.handle).await {
            tracing::warn!(
                error = %e,
                session_id = %session.handle.session_id,
                "could not release agent session"
            );
        }

        let user_id = &session.handle.user_id;
        tracing::info!(
            user_id = %user_id,
            conversation_id = %session.conversation_id,
            reason,
            total_queries,
            "conversation ended"
        );
        TraceEvent::ConversationEnded {
            user_id: user_id.clone(),
            conversation_id: session.conversation_id.to_string(),
            reason: reason.to_owned(),
            total_queries,
        }
        .emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::InMemoryAgentRuntime;

    fn registry() -> ConversationRegistry {
        ConversationRegistry::new(
            SessionsConfig::default(),
            Arc::new(InMemoryAgentRuntime::new()),
            Observability::disabled(),
        )
    }

    #[tokio::test]
    async fn get_or_create_is_stable() {
        let reg = registry();
        let a = reg.get_or_create("alice").await.unwrap();
        let b = reg.get_or_create("alice").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn force_new_replaces_session_and_log() {
        let reg = registry();
        let first = reg.get_or_create("alice").await.unwrap();
        assert_eq!(reg.record_exchange(&first, "q", "r"), Some(1));

        let second = reg.force_new("alice").await.unwrap();
        assert_ne!(first.handle.session_id, second.handle.session_id);
        assert_ne!(first.conversation_id, second.conversation_id);
        assert_eq!(reg.conversation_id("alice"), Some(second.conversation_id));
        assert_eq!(reg.query_count("alice"), 0);
    }

    #[tokio::test]
    async fn force_new_without_session_creates_one() {
        let reg = registry();
        let active = reg.force_new("bob").await.unwrap();
        assert_eq!(reg.session("bob"), Some(active.handle));
    }

    #[tokio::test]
    async fn stale_conversation_is_not_written() {
        let reg = registry();
        let old = reg.get_or_create("alice").await.unwrap();
        let fresh = reg.force_new("alice").await.unwrap();

        assert_eq!(reg.record_exchange(&old, "q", "r"), None);
        assert!(reg.open_query_span(&old, "q").await.is_none());
        assert_eq!(reg.query_count("alice"), 0);

        reg.end("alice", None).await.unwrap();
        assert_eq!(reg.record_exchange(&fresh, "q", "r"), None);
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn exchanges_are_truncated() {
        let reg = registry();
        let active = reg.get_or_create("alice").await.unwrap();
        reg.record_exchange(&active, &"q".repeat(250), "");
        let log = reg.exchanges("alice");
        assert_eq!(log[0].query.chars().count(), 200);
        assert_eq!(log[0].response, "No response");
    }

    #[tokio::test]
    async fn end_is_idempotent() {
        let reg = registry();
        reg.get_or_create("alice").await.unwrap();
        assert!(reg.end("alice", Some("satisfied")).await.unwrap());
        assert!(!reg.end("alice", None).await.unwrap());
        assert_eq!(reg.query_count("alice"), 0);
        assert!(reg.conversation_id("alice").is_none());
    }

    #[tokio::test]
    async fn query_span_numbers_follow_the_log() {
        let reg = registry();
        let active = reg.get_or_create("alice").await.unwrap();
        let span = reg.open_query_span(&active, "q1").await.unwrap();
        assert_eq!(span.query_num, 1);
        reg.close_query_span(span, "r1").await;
        reg.record_exchange(&active, "q1", "r1");

        let span = reg.open_query_span(&active, "q2").await.unwrap();
        assert_eq!(span.query_num, 2);
    }
}
