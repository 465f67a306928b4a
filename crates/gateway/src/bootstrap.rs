//! AppState construction extracted from `main.rs`.
//!
//! [`build_app_state`] is the production boot path: it validates config and
//! reads secrets from the environment.  [`assemble`] takes every external
//! input explicitly so tests can drive the full router with a manual clock
//! and an in-process concierge.

use std::sync::Arc;
use std::time::Instant;

use sha2::{Digest, Sha256};

use tp_domain::config::{Config, ConfigSeverity};
use tp_limits::{Clock, QuotaGate, SystemClock};
use tp_sessions::{
    ConversationRegistry, ConversationTracer, InMemoryAgentRuntime, NoopTracer, Observability,
    SpanTracer,
};

use crate::api::auth::UserTokenSigner;
use crate::concierge::{self, Concierge};
use crate::state::AppState;

/// Everything [`assemble`] needs besides the config.
pub struct Wiring {
    pub clock: Arc<dyn Clock>,
    pub concierge: Arc<dyn Concierge>,
    /// Key for user bearer tokens.  `None` = every caller is anonymous.
    pub session_secret: Option<String>,
    /// Plain admin token.  `None` = admin endpoints disabled.
    pub admin_token: Option<String>,
}

/// Validate config, read secrets and return a fully-wired [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Secrets (read once) ──────────────────────────────────────────
    let session_secret = read_secret(&config.auth.secret_env);
    if session_secret.is_none() {
        tracing::warn!(
            "user tokens DISABLED, every caller is anonymous, set the {} env var",
            config.auth.secret_env
        );
    }
    let admin_token = read_secret(&config.auth.admin_token_env);
    if admin_token.is_none() {
        tracing::warn!(
            "admin endpoints DISABLED, set the {} env var",
            config.auth.admin_token_env
        );
    }

    // ── Concierge ────────────────────────────────────────────────────
    let concierge = concierge::from_config(&config.concierge)?;

    Ok(assemble(
        config,
        Wiring {
            clock: Arc::new(SystemClock),
            concierge,
            session_secret,
            admin_token,
        },
    ))
}

/// Wire the quota gate, conversation registry and auth material together.
pub fn assemble(config: Arc<Config>, wiring: Wiring) -> AppState {
    // ── Quotas ───────────────────────────────────────────────────────
    let quota = Arc::new(QuotaGate::from_config(&config.limits, wiring.clock));
    tracing::info!(
        daily_api_limit = config.limits.daily_api_limit,
        anonymous_free_limit = config.limits.anonymous_free_limit,
        user_daily_limit = config.limits.user_daily_limit,
        "quota gate ready"
    );

    // ── Conversations ────────────────────────────────────────────────
    let tracer: Arc<dyn ConversationTracer> = if config.observability.conversation_traces {
        Arc::new(SpanTracer::new())
    } else {
        Arc::new(NoopTracer)
    };
    let conversations = Arc::new(ConversationRegistry::new(
        config.sessions.clone(),
        Arc::new(InMemoryAgentRuntime::new()),
        Observability::new(tracer),
    ));
    tracing::info!(
        app_name = %config.sessions.app_name,
        conversation_traces = config.observability.conversation_traces,
        "conversation registry ready"
    );

    // ── Auth material ────────────────────────────────────────────────
    let user_tokens = wiring
        .session_secret
        .filter(|s| !s.is_empty())
        .map(|s| Arc::new(UserTokenSigner::new(s)));
    let admin_token_hash = wiring
        .admin_token
        .filter(|t| !t.is_empty())
        .map(|t| Sha256::digest(t.as_bytes()).to_vec());

    AppState {
        config,
        quota,
        conversations,
        concierge: wiring.concierge,
        user_tokens,
        admin_token_hash,
        started_at: Instant::now(),
    }
}

/// Non-empty value of the env var `name`.
pub fn read_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
