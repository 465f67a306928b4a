use serde::{Deserialize, Serialize};

/// Where the gateway reads its secrets from.
///
/// Both values are environment variable *names*; the secrets themselves are
/// read once at startup and never written to the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Env var holding the HMAC key used to sign and verify user tokens.
    /// If unset, every caller is treated as anonymous.
    #[serde(default = "d_secret_env")]
    pub secret_env: String,
    /// Env var holding the admin bearer token.
    /// If unset, admin endpoints are **disabled** (403).
    #[serde(default = "d_admin_token_env")]
    pub admin_token_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_env: d_secret_env(),
            admin_token_env: d_admin_token_env(),
        }
    }
}

fn d_secret_env() -> String {
    "TP_SESSION_SECRET".into()
}

fn d_admin_token_env() -> String {
    "TP_ADMIN_TOKEN".into()
}
