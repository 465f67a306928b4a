use tp_domain::config::Config;

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 5000);
}

#[test]
fn default_cors_allows_only_localhost() {
    let config = Config::default();
    assert!(config.server.cors.allowed_origins.contains(&"http://localhost:*".to_string()));
    assert!(config.server.cors.allowed_origins.contains(&"http://127.0.0.1:*".to_string()));
}

#[test]
fn default_quotas_match_free_tier() {
    let config = Config::default();
    assert_eq!(config.limits.daily_api_limit, 200);
    assert_eq!(config.limits.anonymous_free_limit, 5);
    assert_eq!(config.limits.user_daily_limit, 50);
}

#[test]
fn default_session_truncation() {
    let config = Config::default();
    assert_eq!(config.sessions.app_name, "trip_planner_concierge");
    assert_eq!(config.sessions.query_max_chars, 200);
    assert_eq!(config.sessions.response_max_chars, 500);
}

#[test]
fn secret_env_defaults() {
    let config = Config::default();
    assert_eq!(config.auth.secret_env, "TP_SESSION_SECRET");
    assert_eq!(config.auth.admin_token_env, "TP_ADMIN_TOKEN");
}

#[test]
fn full_file_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 8080
hsts = true

[server.rate_limit]
requests_per_second = 1
burst_size = 20

[limits]
daily_api_limit = 500
user_daily_limit = 100

[sessions]
app_name = "planner"

[concierge]
endpoint = "http://agents.internal:9000"
timeout_secs = 30

[observability]
otlp_endpoint = "http://otel:4317"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.port, 8080);
    assert!(config.server.hsts);
    assert_eq!(config.limits.daily_api_limit, 500);
    assert_eq!(config.limits.anonymous_free_limit, 5);
    assert_eq!(config.sessions.app_name, "planner");
    assert_eq!(
        config.concierge.endpoint.as_deref(),
        Some("http://agents.internal:9000")
    );
    assert!(config.validate().is_empty());
}
