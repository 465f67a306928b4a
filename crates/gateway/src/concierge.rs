//! Downstream agent port.
//!
//! The concierge agent (and the specialist agents behind it) run in a
//! separate service.  The gateway hands it one query per turn and relays the
//! reply text.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tp_domain::config::ConciergeConfig;
use tp_domain::error::{Error, Result};

/// Sent to the user when the agent produced no text at all.
pub const FALLBACK_REPLY: &str =
    "I received your message but couldn't generate a response. Please try again.";

/// One turn for the concierge.
#[derive(Debug, Clone, Serialize)]
pub struct ConciergeRequest {
    pub user_id: String,
    pub session_id: String,
    pub conversation_id: String,
    pub query: String,
}

#[async_trait]
pub trait Concierge: Send + Sync {
    async fn respond(&self, request: &ConciergeRequest) -> Result<String>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Deserialize)]
struct ConciergeReply {
    #[serde(default)]
    response: String,
}

/// Posts each turn as JSON to `{endpoint}` and reads `{"response": "..."}`.
pub struct HttpConcierge {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpConcierge {
    pub fn new(endpoint: impl Into<String>, config: &ConciergeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("HTTP client build failed: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Concierge for HttpConcierge {
    async fn respond(&self, request: &ConciergeRequest) -> Result<String> {
        let resp = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Concierge(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Concierge(format!("upstream returned {status}: {body}")));
        }

        let reply: ConciergeReply = resp
            .json()
            .await
            .map_err(|e| Error::Concierge(format!("invalid reply: {e}")))?;
        Ok(reply.response)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Echo
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Development stand-in that repeats the query back.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoConcierge;

#[async_trait]
impl Concierge for EchoConcierge {
    async fn respond(&self, request: &ConciergeRequest) -> Result<String> {
        Ok(format!("You asked: {}", request.query))
    }
}

/// Pick the concierge implied by the config.
pub fn from_config(config: &ConciergeConfig) -> Result<Arc<dyn Concierge>> {
    match &config.endpoint {
        Some(endpoint) => {
            tracing::info!(endpoint = %endpoint, timeout_secs = config.timeout_secs, "HTTP concierge ready");
            Ok(Arc::new(HttpConcierge::new(endpoint.clone(), config)?))
        }
        None => {
            tracing::warn!("no [concierge] endpoint configured, using the echo concierge");
            Ok(Arc::new(EchoConcierge))
        }
    }
}
