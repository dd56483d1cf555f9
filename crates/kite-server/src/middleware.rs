// crates/kite-server/src/middleware.rs
// ============================================================================
// Module: Kite HTTP Middleware
// Description: Request logging, CORS, timeout, and panic recovery layers.
// Purpose: Wrap every route with the server's ambient request behavior.
// Dependencies: axum, futures, tokio, tracing
// ============================================================================

//! ## Overview
//! The middleware stack mirrors the server's request contract: structured
//! request logs, configurable CORS headers with preflight short-circuit, a
//! total-request deadline from the configured write timeout, and a panic
//! recovery layer that answers 500 without leaking internals.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use futures::FutureExt;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::error::ApiError;
use crate::server::AppState;

// ============================================================================
// SECTION: Request Logging
// ============================================================================

/// Logs method, path, status, and latency for every request.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed = started.elapsed();
    if status.is_client_error() || status.is_server_error() {
        warn!(%method, %path, status = status.as_u16(), ?elapsed, "http request");
    } else {
        info!(%method, %path, status = status.as_u16(), ?elapsed, "http request");
    }
    response
}

// ============================================================================
// SECTION: CORS
// ============================================================================

/// Emits CORS headers and short-circuits preflight requests.
pub async fn cors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.config.security.enable_cors {
        return next.run(request).await;
    }
    let origin = allowed_origin(&state, request.headers().get("origin"));
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        apply_cors_headers(&mut response, origin.as_deref());
        return response;
    }
    let mut response = next.run(request).await;
    apply_cors_headers(&mut response, origin.as_deref());
    response
}

/// Picks the origin value to echo, if the request origin is allowed.
fn allowed_origin(state: &AppState, origin: Option<&HeaderValue>) -> Option<String> {
    let origins = &state.config.security.allowed_origins;
    if origins.iter().any(|allowed| allowed == "*") {
        return Some("*".to_string());
    }
    let origin = origin.and_then(|value| value.to_str().ok())?;
    origins.iter().any(|allowed| allowed == origin).then(|| origin.to_string())
}

/// Writes the CORS header set onto a response.
fn apply_cors_headers(response: &mut Response, origin: Option<&str>) {
    let Some(origin) = origin else {
        return;
    };
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert("access-control-allow-origin", value);
    }
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,PUT,DELETE,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("Origin,Content-Type,Accept,Authorization"),
    );
}

// ============================================================================
// SECTION: Request Timeout
// ============================================================================

/// Bounds total request duration with the configured write timeout.
pub async fn request_timeout(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let deadline = state.config.server.write_timeout;
    match tokio::time::timeout(deadline, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(?deadline, "request exceeded the server write timeout");
            ApiError::unavailable("Request timed out").into_response()
        }
    }
}

// ============================================================================
// SECTION: Panic Recovery
// ============================================================================

/// Recovers handler panics and answers 500 without internals.
pub async fn recover_panics(request: Request, next: Next) -> Response {
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(message = %message, "panic recovered in request handler");
            ApiError::internal().into_response()
        }
    }
}
