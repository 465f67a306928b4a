use serde::{Deserialize, Serialize};

/// Upstream agent (concierge) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConciergeConfig {
    /// Base URL of the agent service.  `None` selects the built-in echo
    /// concierge, which is only meant for local development.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Per-request timeout for the agent call.
    #[serde(default = "d_120")]
    pub timeout_secs: u64,
}

impl Default for ConciergeConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: d_120(),
        }
    }
}

fn d_120() -> u64 {
    120
}
