pub mod config;
pub mod token;

use clap::{Parser, Subcommand};

use tp_domain::config::Config;

/// Trip planner gateway: quota-gated conversations with the concierge agent.
#[derive(Debug, Parser)]
#[command(name = "tripplanner", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print a signed bearer token for a user.
    IssueToken {
        /// User id to embed in the token.
        user_id: String,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `TP_CONFIG` (or `config.toml`
/// by default).  A missing file means all defaults.  Returns the parsed
/// [`Config`] and the path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("TP_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(config_path: &str) -> anyhow::Result<Config> {
    if !std::path::Path::new(config_path).exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_config_from("/nonexistent/tripplanner.toml").unwrap();
        assert_eq!(cfg.limits.anonymous_free_limit, 5);
        assert_eq!(cfg.server.port, 5000);
    }

    #[test]
    fn reads_toml_file() {
        let path = std::env::temp_dir().join(format!("tp-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[limits]\nuser_daily_limit = 7\n").unwrap();
        let cfg = load_config_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.limits.user_daily_limit, 7);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn malformed_toml_names_the_file() {
        let path = std::env::temp_dir().join(format!("tp-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[limits\n").unwrap();
        let err = load_config_from(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("parsing"));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn cli_parses_issue_token() {
        let cli = Cli::parse_from(["tripplanner", "issue-token", "alice"]);
        assert!(matches!(cli.command, Some(Command::IssueToken { ref user_id }) if user_id == "alice"));
    }
}
