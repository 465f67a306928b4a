use serde::Serialize;

use crate::error::QuotaScope;

/// Structured trace events emitted across all trip planner crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    LimiterInitialized {
        scope: QuotaScope,
        limit: u32,
    },
    DailyReset {
        scope: QuotaScope,
        date: String,
        stale_entries_dropped: usize,
    },
    UsageWarning {
        percent: u32,
        count: u32,
        limit: u32,
    },
    QuotaDenied {
        scope: QuotaScope,
        key: Option<String>,
        count: u32,
        limit: u32,
    },
    QuotaRefunded {
        scope: QuotaScope,
        key: String,
    },
    LimitsReset {
        source: String,
    },
    ConversationStarted {
        user_id: String,
        session_id: String,
        conversation_id: String,
    },
    ConversationEnded {
        user_id: String,
        conversation_id: String,
        reason: String,
        total_queries: usize,
    },
    ExchangeRecorded {
        user_id: String,
        conversation_id: String,
        query_num: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "tp_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged() {
        let ev = TraceEvent::UsageWarning {
            percent: 80,
            count: 160,
            limit: 200,
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["event"], "UsageWarning");
        assert_eq!(v["percent"], 80);
    }
}
