mod auth;
mod concierge;
mod limits;
mod observability;
mod server;
mod sessions;

pub use auth::*;
pub use concierge::*;
pub use limits::*;
pub use observability::*;
pub use server::*;
pub use sessions::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub concierge: ConciergeConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut error = |field: &str, message: String| {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: field.into(),
                message,
            })
        };

        if self.server.port == 0 {
            error("server.port", "port must be greater than 0".into());
        }
        if self.server.host.is_empty() {
            error("server.host", "host must not be empty".into());
        }
        if self.server.max_concurrent_requests == 0 {
            error(
                "server.max_concurrent_requests",
                "must be greater than 0".into(),
            );
        }
        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 || rl.burst_size == 0 {
                error(
                    "server.rate_limit",
                    "requests_per_second and burst_size must be > 0".into(),
                );
            }
        }

        // Every daily counter needs a positive limit.
        for (field, value) in [
            ("limits.daily_api_limit", self.limits.daily_api_limit),
            ("limits.anonymous_free_limit", self.limits.anonymous_free_limit),
            ("limits.user_daily_limit", self.limits.user_daily_limit),
        ] {
            if value == 0 {
                error(field, "limit must be greater than 0".into());
            }
        }

        for (i, t) in self.limits.warning_thresholds.iter().enumerate() {
            if !(*t > 0.0 && *t <= 1.0) {
                error(
                    &format!("limits.warning_thresholds[{i}]"),
                    format!("{t} is outside (0, 1]"),
                );
            }
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            error(
                "observability.sample_rate",
                "sample_rate must be within [0, 1]".into(),
            );
        }

        if self.concierge.timeout_secs == 0 {
            error("concierge.timeout_secs", "timeout must be > 0".into());
        }

        if self.concierge.endpoint.is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "concierge.endpoint".into(),
                message: "no endpoint configured, using the echo concierge".into(),
            });
        }

        // CORS: warn if wildcard is used.
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)".into(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors_of(cfg: &Config) -> Vec<String> {
        cfg.validate()
            .into_iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .map(|e| e.field)
            .collect()
    }

    #[test]
    fn default_config_has_no_errors() {
        assert!(errors_of(&Config::default()).is_empty());
    }

    #[test]
    fn default_config_warns_about_echo_concierge() {
        let issues = Config::default().validate();
        assert!(issues
            .iter()
            .any(|i| i.severity == ConfigSeverity::Warning && i.field == "concierge.endpoint"));
    }

    #[test]
    fn zero_limits_are_errors() {
        let mut cfg = Config::default();
        cfg.limits.anonymous_free_limit = 0;
        cfg.limits.daily_api_limit = 0;
        let fields = errors_of(&cfg);
        assert!(fields.contains(&"limits.anonymous_free_limit".to_string()));
        assert!(fields.contains(&"limits.daily_api_limit".to_string()));
    }

    #[test]
    fn out_of_range_threshold_is_error() {
        let mut cfg = Config::default();
        cfg.limits.warning_thresholds = vec![0.5, 1.5];
        assert_eq!(errors_of(&cfg), vec!["limits.warning_thresholds[1]".to_string()]);
    }

    #[test]
    fn display_includes_severity_tag() {
        let e = ConfigError {
            severity: ConfigSeverity::Warning,
            field: "x".into(),
            message: "y".into(),
        };
        assert_eq!(e.to_string(), "[WARN] x: y");
    }
}
