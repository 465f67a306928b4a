use tp_domain::config::{Config, ConfigError, ConfigSeverity};

use crate::bootstrap::read_secret;

/// Validation issues plus the environment-dependent checks that
/// `Config::validate` cannot see.
pub fn collect_issues(config: &Config) -> Vec<ConfigError> {
    let mut issues = config.validate();
    for (env, what) in [
        (&config.auth.secret_env, "user tokens disabled, every caller is anonymous"),
        (&config.auth.admin_token_env, "admin endpoints disabled"),
    ] {
        if read_secret(env).is_none() {
            issues.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: format!("env:{env}"),
                message: format!("not set ({what})"),
            });
        }
    }
    issues
}

/// Print every issue and a summary line.  Returns `false` when any issue is
/// an error.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = collect_issues(config);
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();

    for issue in &issues {
        println!("{issue}");
    }
    if issues.is_empty() {
        println!("Config OK ({config_path})");
    } else {
        println!(
            "\n{errors} error(s), {} warning(s) in {config_path}",
            issues.len() - errors
        );
    }
    println!(
        "limits: {} per day overall, {} per anonymous client, {} per user",
        config.limits.daily_api_limit,
        config.limits.anonymous_free_limit,
        config.limits.user_daily_limit,
    );

    errors == 0
}

/// Dump the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("serializing config: {e}"))?;
    print!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate(&Config::default(), "config.toml"));
    }

    #[test]
    fn zero_port_fails_validation() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        assert!(!validate(&cfg, "config.toml"));
    }

    #[test]
    fn unset_secrets_are_warnings() {
        let mut cfg = Config::default();
        cfg.auth.secret_env = "TP_TEST_UNSET_SECRET_6F1A".into();
        let issues = collect_issues(&cfg);
        let issue = issues
            .iter()
            .find(|i| i.field == "env:TP_TEST_UNSET_SECRET_6F1A")
            .unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn show_serializes_defaults() {
        show(&Config::default()).unwrap();
    }
}
