// crates/kite-server/src/health.rs
// ============================================================================
// Module: Health Handlers
// Description: Liveness and version endpoints for the Kite server.
// Purpose: Report component health with a real database probe.
// Dependencies: axum, chrono, serde
// ============================================================================

//! ## Overview
//! `/health` probes the store and reports per-component status with the
//! probe response time; any component down turns the overall status to
//! `DOWN` with a 503. `/version` serves crate metadata.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tracing::error;

use crate::server::AppState;

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// Health report for one component.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// `UP` or `DOWN`.
    pub status: &'static str,
    /// Short status message.
    pub message: String,
    /// Component-specific detail payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Overall health report.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// `UP` or `DOWN`.
    pub status: &'static str,
    /// Overall status message.
    pub message: String,
    /// Report timestamp.
    pub timestamp: DateTime<Utc>,
    /// Per-component reports.
    pub components: BTreeMap<&'static str, ComponentHealth>,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let mut components = BTreeMap::new();

    let probe_started = Instant::now();
    let database = match state.service.store().ping() {
        Ok(()) => ComponentHealth {
            status: "UP",
            message: "Database connection successful".to_string(),
            details: Some(json!({
                "response_time_seconds": probe_started.elapsed().as_secs_f64(),
            })),
        },
        Err(err) => {
            error!(error = %err, "database health check failed");
            ComponentHealth {
                status: "DOWN",
                message: err.to_string(),
                details: Some(json!({
                    "response_time_seconds": probe_started.elapsed().as_secs_f64(),
                })),
            }
        }
    };
    let healthy = database.status == "UP";
    components.insert("database", database);

    components.insert(
        "api",
        ComponentHealth {
            status: "UP",
            message: "API server is responding".to_string(),
            details: Some(json!({"version": env!("CARGO_PKG_VERSION")})),
        },
    );
    components.insert(
        "response_time",
        ComponentHealth {
            status: "UP",
            message: "Response time measurement".to_string(),
            details: Some(json!({
                "duration_seconds": started.elapsed().as_secs_f64(),
            })),
        },
    );

    let (status, message, code) = if healthy {
        ("UP", "All systems operational", StatusCode::OK)
    } else {
        ("DOWN", "One or more components are unhealthy", StatusCode::SERVICE_UNAVAILABLE)
    };
    let report = HealthStatus {
        status,
        message: message.to_string(),
        timestamp: Utc::now(),
        components,
    };
    (code, Json(report)).into_response()
}

/// GET /version
pub async fn version() -> Response {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
    }))
    .into_response()
}
