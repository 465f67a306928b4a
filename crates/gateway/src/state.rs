use std::sync::Arc;
use std::time::Instant;

use tp_domain::config::Config;
use tp_limits::QuotaGate;
use tp_sessions::ConversationRegistry;

use crate::api::auth::UserTokenSigner;
use crate::concierge::Concierge;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub quota: Arc<QuotaGate>,
    pub conversations: Arc<ConversationRegistry>,
    pub concierge: Arc<dyn Concierge>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// Verifies user bearer tokens.  `None` = no signing secret configured,
    /// every caller is anonymous.
    pub user_tokens: Option<Arc<UserTokenSigner>>,
    /// SHA-256 hash of the admin bearer token (read once at startup).
    /// `None` = admin endpoints disabled.
    pub admin_token_hash: Option<Vec<u8>>,

    pub started_at: Instant,
}
