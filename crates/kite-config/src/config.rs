// crates/kite-config/src/config.rs
// ============================================================================
// Module: Kite Configuration
// Description: Environment-variable configuration loading and validation.
// Purpose: Provide strict, fail-closed config parsing for the Kite server.
// Dependencies: kite-core, kite-store-sqlite, thiserror
// ============================================================================

//! ## Overview
//! Configuration is read from `KITE_*` environment variables with documented
//! defaults. Loading goes through a lookup seam so tests can inject values
//! without mutating the process environment. Invalid configuration fails
//! closed before the server binds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use kite_core::Severity;
use kite_store_sqlite::SqliteJournalMode;
use kite_store_sqlite::SqliteSyncMode;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default server bind host.
const DEFAULT_HOST: &str = "0.0.0.0";
/// Default server port.
const DEFAULT_PORT: u16 = 3000;
/// Default read timeout in seconds.
const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;
/// Default write timeout in seconds.
const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 30;
/// Default idle timeout in seconds.
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;
/// Default graceful shutdown window in seconds.
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;
/// Default database file path.
const DEFAULT_DB_PATH: &str = "kite.sqlite";
/// Default SQLite busy timeout in milliseconds.
const DEFAULT_DB_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default number of initial database open attempts.
const DEFAULT_DB_MAX_RETRIES: u32 = 10;
/// Default delay between database open attempts in milliseconds.
const DEFAULT_DB_RETRY_DELAY_MS: u64 = 5_000;
/// Default base URL for generated pipeline-run log links.
const DEFAULT_LOGS_BASE_URL: &str = "https://konflux.dev";
/// Default endpoint prefix for generated pipeline-run log links.
const DEFAULT_LOGS_ENDPOINT: &str = "/logs/pipelineruns/";
/// Valid environment tags.
const VALID_ENVIRONMENTS: &[&str] = &["development", "staging", "production", "test"];
/// Valid log levels.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration failures.
///
/// # Invariants
/// - Variants are stable for startup error reporting.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable could not be parsed into its expected type.
    #[error("invalid config value for {key}: {message}")]
    Parse {
        /// Environment variable name.
        key: String,
        /// Parse failure description.
        message: String,
    },
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Section Types
// ============================================================================

/// Server bind and timeout configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Read timeout for inbound requests.
    pub read_timeout: Duration,
    /// Write timeout bounding total request duration.
    pub write_timeout: Duration,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
    /// Graceful shutdown drain window.
    pub shutdown_timeout: Duration,
    /// Deployment environment tag.
    pub environment: String,
}

impl ServerConfig {
    /// Returns the full bind address.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Durable store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database file path.
    pub path: PathBuf,
    /// Busy timeout for writer contention.
    pub busy_timeout_ms: u64,
    /// Journal mode.
    pub journal_mode: SqliteJournalMode,
    /// Synchronous mode.
    pub sync_mode: SqliteSyncMode,
    /// Initial open attempts before giving up.
    pub max_retries: u32,
    /// Delay between open attempts (scaled linearly per attempt).
    pub retry_delay: Duration,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON lines.
    Json,
    /// Human-readable text.
    Text,
}

/// Security configuration.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Whether CORS headers are emitted.
    pub enable_cors: bool,
    /// Allowed CORS origins; `*` allows any origin.
    pub allowed_origins: Vec<String>,
}

/// Feature flags.
#[derive(Debug, Clone)]
pub struct FeatureFlags {
    /// Whether the namespace access guard is installed.
    pub enable_namespace_checking: bool,
    /// Whether webhook routes are served.
    pub enable_webhooks: bool,
}

/// Webhook ingress configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Base URL for generated pipeline-run log links.
    pub logs_base_url: String,
    /// Endpoint prefix appended to the base URL before the run id.
    pub logs_endpoint: String,
    /// Severity applied when a failure event carries none.
    pub default_severity: Severity,
}

// ============================================================================
// SECTION: Root Configuration
// ============================================================================

/// Kite server configuration.
#[derive(Debug, Clone)]
pub struct KiteConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Store configuration.
    pub store: StoreConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Security configuration.
    pub security: SecurityConfig,
    /// Feature flags.
    pub features: FeatureFlags,
    /// Webhook ingress configuration.
    pub webhooks: WebhookConfig,
}

impl KiteConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| env::var(key).ok())
    }

    /// Loads configuration through the provided variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = EnvReader {
            lookup,
        };
        let config = Self {
            server: ServerConfig {
                host: env.string("KITE_HOST", DEFAULT_HOST),
                port: env.parse("KITE_PORT", DEFAULT_PORT)?,
                read_timeout: env.duration_secs("KITE_READ_TIMEOUT", DEFAULT_READ_TIMEOUT_SECS)?,
                write_timeout: env
                    .duration_secs("KITE_WRITE_TIMEOUT", DEFAULT_WRITE_TIMEOUT_SECS)?,
                idle_timeout: env.duration_secs("KITE_IDLE_TIMEOUT", DEFAULT_IDLE_TIMEOUT_SECS)?,
                shutdown_timeout: env
                    .duration_secs("KITE_SHUTDOWN_TIMEOUT", DEFAULT_SHUTDOWN_TIMEOUT_SECS)?,
                environment: env.string("KITE_PROJECT_ENV", "production"),
            },
            store: StoreConfig {
                path: PathBuf::from(env.string("KITE_DB_PATH", DEFAULT_DB_PATH)),
                busy_timeout_ms: env
                    .parse("KITE_DB_BUSY_TIMEOUT_MS", DEFAULT_DB_BUSY_TIMEOUT_MS)?,
                journal_mode: match env.string("KITE_DB_JOURNAL_MODE", "wal").as_str() {
                    "wal" => SqliteJournalMode::Wal,
                    "delete" => SqliteJournalMode::Delete,
                    other => {
                        return Err(ConfigError::Parse {
                            key: "KITE_DB_JOURNAL_MODE".to_string(),
                            message: format!("unknown journal mode: {other}"),
                        });
                    }
                },
                sync_mode: match env.string("KITE_DB_SYNC_MODE", "full").as_str() {
                    "full" => SqliteSyncMode::Full,
                    "normal" => SqliteSyncMode::Normal,
                    other => {
                        return Err(ConfigError::Parse {
                            key: "KITE_DB_SYNC_MODE".to_string(),
                            message: format!("unknown sync mode: {other}"),
                        });
                    }
                },
                max_retries: env.parse("KITE_DB_MAX_RETRIES", DEFAULT_DB_MAX_RETRIES)?,
                retry_delay: env
                    .duration_ms("KITE_DB_RETRY_DELAY_MS", DEFAULT_DB_RETRY_DELAY_MS)?,
            },
            logging: LoggingConfig {
                level: env.string("KITE_LOG_LEVEL", "info"),
                format: match env.string("KITE_LOG_FORMAT", "json").as_str() {
                    "json" => LogFormat::Json,
                    "text" => LogFormat::Text,
                    other => {
                        return Err(ConfigError::Parse {
                            key: "KITE_LOG_FORMAT".to_string(),
                            message: format!("unknown log format: {other}"),
                        });
                    }
                },
            },
            security: SecurityConfig {
                enable_cors: env.boolean("KITE_ENABLE_CORS", true)?,
                allowed_origins: env.list("KITE_ALLOWED_ORIGINS", &["*"]),
            },
            features: FeatureFlags {
                enable_namespace_checking: env
                    .boolean("KITE_FEATURE_NAMESPACE_CHECKING", true)?,
                enable_webhooks: env.boolean("KITE_FEATURE_WEBHOOKS", true)?,
            },
            webhooks: WebhookConfig {
                logs_base_url: env.string("KITE_CLUSTER_URL", DEFAULT_LOGS_BASE_URL),
                logs_endpoint: env.string("KITE_LOGS_ENDPOINT", DEFAULT_LOGS_ENDPOINT),
                default_severity: {
                    let label = env.string("KITE_WEBHOOK_DEFAULT_SEVERITY", "major");
                    Severity::parse(&label).ok_or_else(|| ConfigError::Parse {
                        key: "KITE_WEBHOOK_DEFAULT_SEVERITY".to_string(),
                        message: format!("unknown severity: {label}"),
                    })?
                },
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server port must be non-zero".to_string()));
        }
        if !VALID_ENVIRONMENTS.contains(&self.server.environment.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "invalid project environment: {} (must be one of: {})",
                self.server.environment,
                VALID_ENVIRONMENTS.join(", ")
            )));
        }
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "invalid log level: {} (must be one of: {})",
                self.logging.level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database path must be set".to_string()));
        }
        if self.store.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "database max retries must be greater than zero".to_string(),
            ));
        }
        if self.security.enable_cors && self.security.allowed_origins.is_empty() {
            return Err(ConfigError::Invalid(
                "allowed origins must not be empty when CORS is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns true when running in development mode.
    #[must_use]
    pub fn is_development(&self) -> bool {
        self.server.environment == "development"
    }

    /// Returns true when running in production mode.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.server.environment == "production"
    }
}

// ============================================================================
// SECTION: Environment Reader
// ============================================================================

/// Lookup-backed environment reader with typed accessors.
struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.raw(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T::Err: std::fmt::Display,
    {
        match self.raw(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|err| ConfigError::Parse {
                key: key.to_string(),
                message: format!("{err}"),
            }),
        }
    }

    fn boolean(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.raw(key).as_deref() {
            None => Ok(default),
            Some("1" | "true" | "TRUE" | "yes" | "YES") => Ok(true),
            Some("0" | "false" | "FALSE" | "no" | "NO") => Ok(false),
            Some(other) => Err(ConfigError::Parse {
                key: key.to_string(),
                message: format!("expected a boolean, got: {other}"),
            }),
        }
    }

    fn duration_secs(&self, key: &str, default_secs: u64) -> Result<Duration, ConfigError> {
        Ok(Duration::from_secs(self.parse(key, default_secs)?))
    }

    fn duration_ms(&self, key: &str, default_ms: u64) -> Result<Duration, ConfigError> {
        Ok(Duration::from_millis(self.parse(key, default_ms)?))
    }

    fn list(&self, key: &str, default: &[&str]) -> Vec<String> {
        self.raw(key).map_or_else(
            || default.iter().map(ToString::to_string).collect(),
            |value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(ToString::to_string)
                    .collect()
            },
        )
    }
}
