//! Conversation tracing.
//!
//! A conversation gets one root trace; every user query inside it gets a
//! child span.  Tracing is strictly best-effort: tracer adapters may fail,
//! and [`Observability`] is the only place those failures are absorbed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::field::Empty;

use tp_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Handle to an open conversation trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TraceId(pub u64);

/// Handle to an open query span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SpanId(pub u64);

/// Metadata attached to a conversation trace when it opens.
#[derive(Debug, Clone, Serialize)]
pub struct TraceStart {
    pub user_id: String,
    pub session_id: String,
    pub conversation_id: String,
    pub app_name: String,
}

/// Output attached to a conversation trace when it closes.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEnd {
    pub reason: String,
    pub feedback: Option<String>,
    pub total_queries: usize,
}

#[async_trait]
pub trait ConversationTracer: Send + Sync {
    async fn start_trace(&self, start: &TraceStart) -> Result<TraceId>;

    /// Open `name` as a child of `trace`.
    async fn span(&self, trace: TraceId, name: &str, query: &str, query_num: usize)
        -> Result<SpanId>;

    async fn end_span(&self, span: SpanId, output: &str) -> Result<()>;

    async fn end_trace(&self, trace: TraceId, end: &TraceEnd) -> Result<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Accepts everything and records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

#[async_trait]
impl ConversationTracer for NoopTracer {
    async fn start_trace(&self, _start: &TraceStart) -> Result<TraceId> {
        Ok(TraceId(0))
    }

    async fn span(&self, _trace: TraceId, _name: &str, _query: &str, _n: usize) -> Result<SpanId> {
        Ok(SpanId(0))
    }

    async fn end_span(&self, _span: SpanId, _output: &str) -> Result<()> {
        Ok(())
    }

    async fn end_trace(&self, _trace: TraceId, _end: &TraceEnd) -> Result<()> {
        Ok(())
    }
}

/// Maps conversations onto `tracing` spans.  With the OpenTelemetry layer
/// installed these are exported like any other span; `otel.name` carries
/// the per-query span name.
///
/// Query spans still open when their conversation ends are closed with it.
#[derive(Default)]
pub struct SpanTracer {
    next_id: AtomicU64,
    traces: Mutex<HashMap<u64, tracing::Span>>,
    /// Span id -> (owning trace id, span).
    spans: Mutex<HashMap<u64, (u64, tracing::Span)>>,
}

impl SpanTracer {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Traces currently open.
    pub fn open_traces(&self) -> usize {
        self.traces.lock().len()
    }

    /// Query spans currently open.
    pub fn open_spans(&self) -> usize {
        self.spans.lock().len()
    }
}

#[async_trait]
impl ConversationTracer for SpanTracer {
    async fn start_trace(&self, start: &TraceStart) -> Result<TraceId> {
        let span = tracing::info_span!(
            "travel_conversation",
            conversation_id = %start.conversation_id,
            user_id = %start.user_id,
            session_id = %start.session_id,
            app = %start.app_name,
            reason = Empty,
            feedback = Empty,
            total_queries = Empty,
        );
        let id = self.next();
        self.traces.lock().insert(id, span);
        Ok(TraceId(id))
    }

    async fn span(
        &self,
        trace: TraceId,
        name: &str,
        query: &str,
        query_num: usize,
    ) -> Result<SpanId> {
        let parent = self
            .traces
            .lock()
            .get(&trace.0)
            .cloned()
            .ok_or_else(|| Error::TracingUnavailable(format!("no open trace {}", trace.0)))?;
        let span = tracing::info_span!(
            parent: &parent,
            "user_query",
            otel.name = %name,
            query = %query,
            query_num,
            response = Empty,
        );
        let id = self.next();
        self.spans.lock().insert(id, (trace.0, span));
        Ok(SpanId(id))
    }

    async fn end_span(&self, span: SpanId, output: &str) -> Result<()> {
        let (_, span) = self
            .spans
            .lock()
            .remove(&span.0)
            .ok_or_else(|| Error::TracingUnavailable(format!("no open span {}", span.0)))?;
        span.record("response", output);
        Ok(())
    }

    async fn end_trace(&self, trace: TraceId, end: &TraceEnd) -> Result<()> {
        let span = self
            .traces
            .lock()
            .remove(&trace.0)
            .ok_or_else(|| Error::TracingUnavailable(format!("no open trace {}", trace.0)))?;
        let orphans = {
            let mut spans = self.spans.lock();
            let before = spans.len();
            spans.retain(|_, (parent, _)| *parent != trace.0);
            before - spans.len()
        };
        if orphans > 0 {
            tracing::debug!(trace = trace.0, orphans, "closed unfinished query spans");
        }
        span.record("reason", end.reason.as_str());
        span.record("total_queries", end.total_queries);
        if let Some(feedback) = &end.feedback {
            span.record("feedback", feedback.as_str());
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Observability
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Best-effort front for a [`ConversationTracer`].  Errors are logged at
/// `warn` and turned into `None`; nothing here can fail a request.
#[derive(Clone)]
pub struct Observability {
    tracer: Arc<dyn ConversationTracer>,
}

impl Observability {
    pub fn new(tracer: Arc<dyn ConversationTracer>) -> Self {
        Self { tracer }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopTracer))
    }

    pub async fn start(&self, start: &TraceStart) -> Option<TraceId> {
        match self.tracer.start_trace(start).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    conversation_id = %start.conversation_id,
                    "could not open conversation trace"
                );
                None
            }
        }
    }

    pub async fn span(
        &self,
        trace: TraceId,
        name: &str,
        query: &str,
        query_num: usize,
    ) -> Option<SpanId> {
        match self.tracer.span(trace, name, query, query_num).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, span = name, "could not open query span");
                None
            }
        }
    }

    pub async fn end_span(&self, span: SpanId, output: &str) {
        if let Err(e) = self.tracer.end_span(span, output).await {
            tracing::warn!(error = %e, "could not close query span");
        }
    }

    pub async fn end(&self, trace: TraceId, end: &TraceEnd) {
        if let Err(e) = self.tracer.end_trace(trace, end).await {
            tracing::warn!(error = %e, reason = %end.reason, "could not close conversation trace");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> TraceStart {
        TraceStart {
            user_id: "alice".into(),
            session_id: "s-1".into(),
            conversation_id: "conv_0123456789ab".into(),
            app_name: "trip_planner_concierge".into(),
        }
    }

    fn end() -> TraceEnd {
        TraceEnd {
            reason: "ended".into(),
            feedback: Some("satisfied".into()),
            total_queries: 2,
        }
    }

    #[tokio::test]
    async fn span_tracer_tracks_open_traces() {
        let tracer = SpanTracer::new();
        let trace = tracer.start_trace(&start()).await.unwrap();
        assert_eq!(tracer.open_traces(), 1);

        let span = tracer.span(trace, "user_query_1", "flights?", 1).await.unwrap();
        tracer.end_span(span, "here you go").await.unwrap();
        tracer.end_trace(trace, &end()).await.unwrap();
        assert_eq!(tracer.open_traces(), 0);
    }

    #[tokio::test]
    async fn ending_a_trace_drains_its_unfinished_spans() {
        let tracer = SpanTracer::new();
        let trace = tracer.start_trace(&start()).await.unwrap();
        let other = tracer.start_trace(&start()).await.unwrap();
        for n in 1..=100 {
            tracer.span(trace, "user_query", "q", n).await.unwrap();
        }
        let kept = tracer.span(other, "user_query_1", "q", 1).await.unwrap();
        assert_eq!(tracer.open_spans(), 101);

        tracer.end_trace(trace, &end()).await.unwrap();
        assert_eq!(tracer.open_traces(), 1);
        assert_eq!(tracer.open_spans(), 1);
        tracer.end_span(kept, "ok").await.unwrap();
        assert_eq!(tracer.open_spans(), 0);
    }

    #[tokio::test]
    async fn span_tracer_rejects_unknown_handles() {
        let tracer = SpanTracer::new();
        assert!(matches!(
            tracer.span(TraceId(99), "user_query_1", "q", 1).await,
            Err(Error::TracingUnavailable(_))
        ));
        assert!(tracer.end_trace(TraceId(99), &end()).await.is_err());
        assert!(tracer.end_span(SpanId(7), "x").await.is_err());
    }

    #[tokio::test]
    async fn observability_absorbs_tracer_errors() {
        let obs = Observability::new(Arc::new(SpanTracer::new()));
        assert!(obs.span(TraceId(5), "user_query_1", "q", 1).await.is_none());
        obs.end_span(SpanId(5), "x").await;
        obs.end(TraceId(5), &end()).await;
    }
}
