//! Conversation session management for the trip planner gateway.
//!
//! A user has at most one active conversation: an agent runtime session
//! handle, a conversation id, an append-only query log and a best-effort
//! observability trace.  Everything lives in process memory.

pub mod lock;
pub mod observability;
pub mod registry;
pub mod runtime;
pub mod session;

pub use lock::UserLockMap;
pub use observability::{
    ConversationTracer, NoopTracer, Observability, SpanId, SpanTracer, TraceEnd, TraceId,
    TraceStart,
};
pub use registry::{ConversationRegistry, QuerySpan};
pub use runtime::{AgentRuntime, InMemoryAgentRuntime, SessionHandle};
pub use session::{
    is_new_session_marker, truncate_chars, ActiveConversation, ConversationId,
    ConversationSession, ConversationSummary, Exchange,
};
