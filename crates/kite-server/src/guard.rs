// crates/kite-server/src/guard.rs
// ============================================================================
// Module: Namespace Guard
// Description: Namespace resolution and access interlock middleware.
// Purpose: Deny namespace-scoped requests before handlers run.
// Dependencies: axum, serde_json
// ============================================================================

//! ## Overview
//! Every namespace-scoped route passes through this guard. The namespace is
//! resolved from the path parameter, then the query string, then the request
//! body's `namespace` field; the first non-empty value wins. A request with
//! no resolvable namespace fails 400 before the authority is consulted. The
//! body is buffered at most once and handed back to the handler untouched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::body::Body;
use axum::extract::RawPathParams;
use axum::extract::Request;
use axum::extract::State;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use tracing::debug;

use crate::error::ApiError;
use crate::server::AppState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound for buffered request bodies.
const MAX_BODY_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Resolves the request namespace and checks access before the handler.
pub async fn namespace_guard(
    State(state): State<AppState>,
    params: RawPathParams,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    let mut namespace = params
        .iter()
        .find(|(name, _)| *name == "namespace")
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty());
    if namespace.is_none() {
        namespace = parts
            .uri
            .query()
            .and_then(|query| query_param(query, "namespace"))
            .filter(|value| !value.is_empty());
    }

    // The body is only buffered when the namespace is still unresolved for a
    // method that carries one. Reading is bounded by the server read timeout.
    let body = if namespace.is_none() && body_may_carry_namespace(&parts.method) {
        let read = tokio::time::timeout(
            state.config.server.read_timeout,
            axum::body::to_bytes(body, MAX_BODY_BYTES),
        )
        .await;
        let bytes = match read {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(_)) => {
                return ApiError::bad_request("Invalid request body").into_response();
            }
            Err(_) => {
                return ApiError::unavailable("Request timed out").into_response();
            }
        };
        namespace = serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .and_then(|value| value.get("namespace").and_then(|ns| ns.as_str().map(String::from)))
            .filter(|value| !value.is_empty());
        Body::from(bytes)
    } else {
        body
    };

    let Some(namespace) = namespace else {
        return ApiError::bad_request("Missing namespace").into_response();
    };

    if let Err(error) = state.authority.ensure_access(&namespace).await {
        return ApiError::from(error).into_response();
    }
    debug!(namespace = %namespace, "namespace access allowed");

    next.run(Request::from_parts(parts, body)).await
}

/// Returns true when the method's body may carry the namespace field.
fn body_may_carry_namespace(method: &axum::http::Method) -> bool {
    method == axum::http::Method::POST || method == axum::http::Method::PUT
}

/// Extracts one query parameter without decoding; namespaces are plain
/// DNS labels.
fn query_param(query: &str, name: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::query_param;

    #[test]
    fn query_param_finds_the_named_pair() {
        assert_eq!(
            query_param("state=active&namespace=team-a", "namespace"),
            Some("team-a".to_string())
        );
    }

    #[test]
    fn query_param_ignores_other_pairs_and_missing_values() {
        assert_eq!(query_param("state=active", "namespace"), None);
        assert_eq!(query_param("", "namespace"), None);
        assert_eq!(query_param("namespace=", "namespace"), Some(String::new()));
    }
}
