//! `tripplanner issue-token <user_id>`: mint a user bearer token with the
//! same key the server verifies against.

use anyhow::Context;

use tp_domain::config::Config;

use crate::api::auth::UserTokenSigner;
use crate::bootstrap::read_secret;

pub fn issue(config: &Config, user_id: &str) -> anyhow::Result<String> {
    let user_id = user_id.trim();
    anyhow::ensure!(!user_id.is_empty(), "user id must not be empty");

    let secret = read_secret(&config.auth.secret_env)
        .with_context(|| format!("{} is not set", config.auth.secret_env))?;
    Ok(UserTokenSigner::new(secret).issue(user_id))
}
