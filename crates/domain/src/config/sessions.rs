use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Conversation registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Application name passed to the agent runtime when allocating sessions
    /// and attached to every conversation trace.
    #[serde(default = "d_app_name")]
    pub app_name: String,

    /// Stored query text is cut to this many characters.
    #[serde(default = "d_200")]
    pub query_max_chars: usize,

    /// Stored response text is cut to this many characters.
    #[serde(default = "d_500")]
    pub response_max_chars: usize,

    /// Response text attached to a query span is cut to this many characters.
    #[serde(default = "d_2000")]
    pub span_output_max_chars: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            app_name: d_app_name(),
            query_max_chars: d_200(),
            response_max_chars: d_500(),
            span_output_max_chars: d_2000(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_app_name() -> String {
    "trip_planner_concierge".into()
}
fn d_200() -> usize {
    200
}
fn d_500() -> usize {
    500
}
fn d_2000() -> usize {
    2000
}
