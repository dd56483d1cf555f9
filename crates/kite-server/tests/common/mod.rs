// crates/kite-server/tests/common/mod.rs
// ============================================================================
// Module: Server Test Helpers
// Description: Router construction and request helpers for HTTP tests.
// Purpose: Drive the full router with an in-memory store.
// Dependencies: kite-server, kite-core, kite-config, tower
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    dead_code,
    reason = "Test-only helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::body::to_bytes;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use kite_config::KiteConfig;
use kite_core::InMemoryIssueStore;
use kite_core::IssueService;
use kite_server::AppState;
use kite_server::AuthorityError;
use kite_server::NamespaceAuthority;
use kite_server::PassthroughAuthority;
use kite_server::build_router;
use serde_json::Value;
use tower::ServiceExt;

// ============================================================================
// SECTION: Authorities
// ============================================================================

/// Authority that allows only the listed namespaces.
pub struct AllowListAuthority {
    /// Namespaces the caller may access.
    pub allowed: Vec<String>,
}

#[async_trait]
impl NamespaceAuthority for AllowListAuthority {
    async fn ensure_access(&self, namespace: &str) -> Result<(), AuthorityError> {
        if self.allowed.iter().any(|allowed| allowed == namespace) {
            Ok(())
        } else {
            Err(AuthorityError::Denied(format!("access denied to namespace {namespace}")))
        }
    }
}

// ============================================================================
// SECTION: App Construction
// ============================================================================

/// Builds a router over a fresh in-memory store with default configuration.
pub fn app() -> (Router, Arc<InMemoryIssueStore>) {
    app_with(&[], Arc::new(PassthroughAuthority))
}

/// Builds a router with configuration overrides and a custom authority.
pub fn app_with(
    vars: &[(&str, &str)],
    authority: Arc<dyn NamespaceAuthority>,
) -> (Router, Arc<InMemoryIssueStore>) {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect();
    let config = KiteConfig::load_with(|key| map.get(key).cloned()).expect("test config");
    let store = Arc::new(InMemoryIssueStore::new());
    let state = AppState::new(
        IssueService::new(Arc::clone(&store) as Arc<dyn kite_core::IssueStore>),
        authority,
        Arc::new(config),
    );
    (build_router(state), store)
}

// ============================================================================
// SECTION: Request Helpers
// ============================================================================

/// Sends one request through the router and decodes the JSON body.
pub async fn request(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Convenience create payload used across tests.
pub fn issue_payload(namespace: &str, resource_name: &str, title: &str) -> Value {
    serde_json::json!({
        "title": title,
        "description": format!("{title} description"),
        "severity": "major",
        "issueType": "build",
        "namespace": namespace,
        "scope": {
            "resourceType": "component",
            "resourceName": resource_name,
        },
    })
}
