// crates/kite-config/tests/config_defaults.rs
// ============================================================================
// Module: Configuration Default Tests
// Description: Validate default values and typed parsing.
// Purpose: Ensure an empty environment yields a valid production config.
// Dependencies: kite-config
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::time::Duration;

use kite_config::KiteConfig;
use kite_config::LogFormat;
use kite_core::Severity;
use kite_store_sqlite::SqliteJournalMode;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn load(vars: &[(&str, &str)]) -> Result<KiteConfig, kite_config::ConfigError> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect();
    KiteConfig::load_with(|key| map.get(key).cloned())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn empty_environment_yields_defaults() {
    let config = load(&[]).unwrap();
    assert_eq!(config.server.bind_address(), "0.0.0.0:3000");
    assert_eq!(config.server.environment, "production");
    assert_eq!(config.server.shutdown_timeout, Duration::from_secs(10));
    assert_eq!(config.store.journal_mode, SqliteJournalMode::Wal);
    assert_eq!(config.store.max_retries, 10);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert!(config.security.enable_cors);
    assert_eq!(config.security.allowed_origins, vec!["*".to_string()]);
    assert!(config.features.enable_namespace_checking);
    assert!(config.features.enable_webhooks);
    assert_eq!(config.webhooks.default_severity, Severity::Major);
    assert_eq!(config.webhooks.logs_endpoint, "/logs/pipelineruns/");
    assert!(config.is_production());
}

#[test]
fn overrides_are_honored() {
    let config = load(&[
        ("KITE_HOST", "127.0.0.1"),
        ("KITE_PORT", "8080"),
        ("KITE_PROJECT_ENV", "development"),
        ("KITE_LOG_FORMAT", "text"),
        ("KITE_DB_PATH", "/var/lib/kite/issues.sqlite"),
        ("KITE_DB_RETRY_DELAY_MS", "250"),
        ("KITE_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
        ("KITE_WEBHOOK_DEFAULT_SEVERITY", "critical"),
    ])
    .unwrap();
    assert_eq!(config.server.bind_address(), "127.0.0.1:8080");
    assert!(config.is_development());
    assert_eq!(config.logging.format, LogFormat::Text);
    assert_eq!(config.store.retry_delay, Duration::from_millis(250));
    assert_eq!(
        config.security.allowed_origins,
        vec!["https://a.example".to_string(), "https://b.example".to_string()]
    );
    assert_eq!(config.webhooks.default_severity, Severity::Critical);
}

#[test]
fn empty_values_fall_back_to_defaults() {
    let config = load(&[("KITE_HOST", ""), ("KITE_PORT", "")]).unwrap();
    assert_eq!(config.server.bind_address(), "0.0.0.0:3000");
}

#[test]
fn feature_flags_parse_common_boolean_forms() {
    let config = load(&[
        ("KITE_FEATURE_NAMESPACE_CHECKING", "false"),
        ("KITE_FEATURE_WEBHOOKS", "0"),
        ("KITE_ENABLE_CORS", "yes"),
    ])
    .unwrap();
    assert!(!config.features.enable_namespace_checking);
    assert!(!config.features.enable_webhooks);
    assert!(config.security.enable_cors);
}
