// crates/kite-server/src/server.rs
// ============================================================================
// Module: Kite HTTP Server
// Description: Router assembly, shared state, and serving loop.
// Purpose: Expose the lifecycle service over the versioned HTTP API.
// Dependencies: axum, kite-config, kite-core, tokio
// ============================================================================

//! ## Overview
//! Builds the `/api/v1` router over the lifecycle service, wires the
//! middleware stack and the namespace guard, and serves with graceful
//! shutdown bounded by the configured drain window. Request handlers run
//! concurrently; the only shared mutable state is the store connection and
//! the authority client, both owned by [`AppState`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn;
use axum::middleware::from_fn_with_state;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::post;
use kite_config::KiteConfig;
use kite_core::IssueService;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;
use tracing::warn;

use crate::authz::NamespaceAuthority;
use crate::guard::namespace_guard;
use crate::health;
use crate::issues;
use crate::middleware;
use crate::webhooks;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server startup and serving failures.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid server configuration.
    #[error("server config error: {0}")]
    Config(String),
    /// Transport-level failure while binding or serving.
    #[error("server transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared state handed to every handler by construction.
#[derive(Clone)]
pub struct AppState {
    /// Issue lifecycle service.
    pub service: IssueService,
    /// Namespace authority guarding namespace-scoped routes.
    pub authority: Arc<dyn NamespaceAuthority>,
    /// Server configuration.
    pub config: Arc<KiteConfig>,
}

impl AppState {
    /// Builds the shared state.
    #[must_use]
    pub fn new(
        service: IssueService,
        authority: Arc<dyn NamespaceAuthority>,
        config: Arc<KiteConfig>,
    ) -> Self {
        Self {
            service,
            authority,
            config,
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the full application router with middleware.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let mut v1 = Router::new().nest("/issues", issues_router(&state));
    if state.config.features.enable_webhooks {
        v1 = v1.nest("/webhooks", webhooks_router(&state));
    }

    Router::new()
        .route("/health", get(health::health))
        .route("/version", get(health::version))
        .nest("/api/v1", v1)
        .layer(from_fn(middleware::recover_panics))
        .layer(from_fn_with_state(state.clone(), middleware::request_timeout))
        .layer(from_fn_with_state(state.clone(), middleware::cors))
        .layer(from_fn(middleware::request_logging))
        .with_state(state)
}

/// Issue routes, guarded by the namespace check when enabled.
fn issues_router(state: &AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/", get(issues::list_issues).post(issues::create_issue))
        .route(
            "/{id}",
            get(issues::get_issue).put(issues::update_issue).delete(issues::delete_issue),
        )
        .route("/{id}/resolve", post(issues::resolve_issue))
        .route("/{id}/related", post(issues::add_related_issue))
        .route("/{id}/related/{relatedId}", delete(issues::remove_related_issue));
    guard_routes(router, state)
}

/// Webhook routes, guarded by the namespace check when enabled.
fn webhooks_router(state: &AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/pipeline-failure", post(webhooks::pipeline_failure))
        .route("/pipeline-success", post(webhooks::pipeline_success));
    guard_routes(router, state)
}

/// Installs the namespace guard on a route group when the feature is on.
fn guard_routes(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    if state.config.features.enable_namespace_checking {
        router.route_layer(from_fn_with_state(state.clone(), namespace_guard))
    } else {
        router
    }
}

// ============================================================================
// SECTION: Serving
// ============================================================================

/// Binds the listener and serves until a shutdown signal arrives, draining
/// in-flight requests up to the configured window.
///
/// # Errors
///
/// Returns [`ServerError`] when binding or serving fails.
pub async fn serve(state: AppState) -> Result<(), ServerError> {
    let config = Arc::clone(&state.config);
    let addr: SocketAddr = config
        .server
        .bind_address()
        .parse()
        .map_err(|_| ServerError::Config("invalid bind address".to_string()))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| ServerError::Transport(format!("bind failed: {err}")))?;
    info!(
        address = %addr,
        environment = %config.server.environment,
        "starting http server"
    );

    let app = build_router(state);
    let (drained_tx, drained_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            info!("shutting down server");
            let _ = drained_tx.send(());
        })
        .into_future();

    let drain = config.server.shutdown_timeout;
    tokio::select! {
        result = server => {
            result.map_err(|err| ServerError::Transport(err.to_string()))?;
            info!("server shutdown gracefully");
            Ok(())
        }
        () = async {
            let _ = drained_rx.await;
            tokio::time::sleep(drain).await;
        } => {
            warn!(?drain, "shutdown drain window elapsed; terminating");
            Ok(())
        }
    }
}

/// Waits for SIGTERM or SIGINT.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::SignalKind;
        use tokio::signal::unix::signal;
        let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
            let _ = tokio::signal::ctrl_c().await;
            return;
        };
        let Ok(mut sigint) = signal(SignalKind::interrupt()) else {
            let _ = tokio::signal::ctrl_c().await;
            return;
        };
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
