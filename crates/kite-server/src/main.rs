// crates/kite-server/src/main.rs
// ============================================================================
// Module: Kite Server Binary
// Description: Entry point wiring config, store, authority, and server.
// Purpose: Start the Kite issue-tracking API server.
// Dependencies: kite-config, kite-core, kite-server, kite-store-sqlite
// ============================================================================

//! ## Overview
//! Startup order: configuration from the environment, structured logging,
//! the durable store (with retries for a slow volume mount), the namespace
//! authority (cluster-backed when credentials are discoverable, logged
//! pass-through otherwise), then the HTTP server with graceful shutdown.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::process::ExitCode;
use std::sync::Arc;

use kite_config::KiteConfig;
use kite_config::LogFormat;
use kite_core::IssueService;
use kite_core::IssueStore;
use kite_core::StoreError;
use kite_server::AccessReviewAuthority;
use kite_server::AppState;
use kite_server::NamespaceAuthority;
use kite_server::PassthroughAuthority;
use kite_store_sqlite::SqliteIssueStore;
use kite_store_sqlite::SqliteStoreConfig;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let config = match KiteConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config);
    info!(
        environment = %config.server.environment,
        version = env!("CARGO_PKG_VERSION"),
        "kite server starting"
    );

    let store = match open_store_with_retries(&config) {
        Ok(store) => store,
        Err(err) => {
            error!(error = %err, "failed to initialize database");
            return ExitCode::FAILURE;
        }
    };
    let authority = build_authority(&config).await;
    let state = AppState::new(
        IssueService::new(Arc::new(store)),
        authority,
        Arc::new(config),
    );

    match kite_server::serve(state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "server failed");
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// SECTION: Startup Helpers
// ============================================================================

/// Installs the tracing subscriber per the logging configuration.
fn init_tracing(config: &KiteConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

/// Opens the durable store, retrying with linear backoff so a slow volume
/// mount does not kill the pod.
fn open_store_with_retries(config: &KiteConfig) -> Result<SqliteIssueStore, StoreError> {
    let store_config = SqliteStoreConfig {
        path: config.store.path.clone(),
        busy_timeout_ms: config.store.busy_timeout_ms,
        journal_mode: config.store.journal_mode,
        sync_mode: config.store.sync_mode,
    };
    let mut last_error = StoreError::Unavailable("no attempts made".to_string());
    for attempt in 1..=config.store.max_retries {
        match SqliteIssueStore::open(&store_config).and_then(|store| {
            store.ping()?;
            Ok(store)
        }) {
            Ok(store) => {
                info!(path = %config.store.path.display(), "database connection established");
                return Ok(store);
            }
            Err(err) => {
                warn!(attempt, error = %err, "database connection attempt failed");
                last_error = err;
            }
        }
        if attempt < config.store.max_retries {
            std::thread::sleep(config.store.retry_delay * attempt);
        }
    }
    Err(last_error)
}

/// Builds the namespace authority, falling back to pass-through when no
/// cluster configuration is discoverable or the check is disabled.
async fn build_authority(config: &KiteConfig) -> Arc<dyn NamespaceAuthority> {
    if !config.features.enable_namespace_checking {
        warn!("namespace checking disabled by feature flag");
        return Arc::new(PassthroughAuthority);
    }
    match AccessReviewAuthority::connect().await {
        Ok(authority) => {
            info!("namespace authority backed by cluster access reviews");
            Arc::new(authority)
        }
        Err(err) => {
            warn!(
                error = %err,
                "no cluster configuration found; namespace access checks pass through"
            );
            Arc::new(PassthroughAuthority)
        }
    }
}
