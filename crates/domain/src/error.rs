use std::fmt;

use serde::Serialize;

/// Which limiter rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaScope {
    /// System-wide daily cap on external-API calls.
    Global,
    /// Free-tier allowance for an unauthenticated client.
    Anonymous,
    /// Daily allowance for an authenticated user.
    User,
}

impl QuotaScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Anonymous => "anonymous",
            Self::User => "user",
        }
    }
}

impl fmt::Display for QuotaScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared error type used across all trip planner crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{scope} quota exceeded ({count}/{limit})")]
    QuotaExceeded {
        scope: QuotaScope,
        count: u32,
        limit: u32,
    },

    #[error("session creation failed: {0}")]
    SessionCreationFailed(String),

    #[error("tracing unavailable: {0}")]
    TracingUnavailable(String),

    #[error("concierge: {0}")]
    Concierge(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
