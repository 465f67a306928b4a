use serde::{Deserialize, Serialize};

/// Daily quota configuration for the three limiter scopes.
///
/// All counters live in process memory and reset at UTC midnight.  A restart
/// clears every counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// System-wide cap on downstream agent calls per day.
    #[serde(default = "d_200")]
    pub daily_api_limit: u32,
    /// Free queries per anonymous client (keyed by client address) per day.
    #[serde(default = "d_5")]
    pub anonymous_free_limit: u32,
    /// Queries per authenticated user per day.
    #[serde(default = "d_50")]
    pub user_daily_limit: u32,
    /// Fractions of `daily_api_limit` at which a one-time warning is logged.
    #[serde(default = "d_thresholds")]
    pub warning_thresholds: Vec<f64>,
    /// Give back the caller's scoped charge when the global cap rejects the
    /// request after the scoped check already passed.  When `false` the
    /// scoped charge is kept (pessimistic pre-charge).
    #[serde(default = "d_true")]
    pub refund_on_global_reject: bool,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            daily_api_limit: d_200(),
            anonymous_free_limit: d_5(),
            user_daily_limit: d_50(),
            warning_thresholds: d_thresholds(),
            refund_on_global_reject: true,
        }
    }
}

fn d_200() -> u32 {
    200
}
fn d_5() -> u32 {
    5
}
fn d_50() -> u32 {
    50
}
fn d_thresholds() -> Vec<f64> {
    vec![0.5, 0.8, 0.9, 0.95]
}
fn d_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg: LimitsConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.daily_api_limit, 200);
        assert_eq!(cfg.anonymous_free_limit, 5);
        assert_eq!(cfg.user_daily_limit, 50);
        assert_eq!(cfg.warning_thresholds, vec![0.5, 0.8, 0.9, 0.95]);
        assert!(cfg.refund_on_global_reject);
    }

    #[test]
    fn overrides_parse() {
        let cfg: LimitsConfig = toml::from_str(
            r#"
            daily_api_limit = 1000
            anonymous_free_limit = 3
            refund_on_global_reject = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.daily_api_limit, 1000);
        assert_eq!(cfg.anonymous_free_limit, 3);
        assert_eq!(cfg.user_daily_limit, 50);
        assert!(!cfg.refund_on_global_reject);
    }
}
