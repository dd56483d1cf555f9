// crates/kite-server/src/error.rs
// ============================================================================
// Module: Kite API Errors
// Description: HTTP error responses for the Kite API surface.
// Purpose: Map service, store, and authority errors to status codes.
// Dependencies: axum, kite-core, serde_json
// ============================================================================

//! ## Overview
//! [`ApiError`] is the single error type returned by handlers. It maps the
//! error taxonomy onto HTTP statuses (400/403/404/409/500/503) and renders
//! the `{"error", "details"}` JSON body without leaking internals.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use kite_core::ServiceError;
use kite_core::StoreError;
use serde_json::json;

use crate::authz::AuthorityError;

// ============================================================================
// SECTION: API Error
// ============================================================================

/// HTTP-facing error with a status code and a short user-visible message.
///
/// # Invariants
/// - `message` and `details` never carry stack traces or internal paths.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status for the response.
    pub status: StatusCode,
    /// Short user-visible message.
    pub message: String,
    /// Optional detail line.
    pub details: Option<String>,
}

impl ApiError {
    /// Builds an error with a status and message.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Attaches a detail line.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// 400 with the given message.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 403 for namespace access denial.
    #[must_use]
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Access denied to this namespace")
    }

    /// 404 with the given message.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 503 with the given message.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// 500 with a generic message.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({"error": self.message, "details": details}),
            None => json!({"error": self.message}),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(message) => Self::not_found(message),
            StoreError::Conflict(message) => Self::new(StatusCode::CONFLICT, message),
            StoreError::Invalid(message) => Self::bad_request(message),
            StoreError::Unavailable(message) => Self::unavailable(message),
            StoreError::Store(_) => Self::internal(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Validation(message) => {
                Self::bad_request("Validation failed").with_details(message)
            }
            ServiceError::Store(store) => store.into(),
        }
    }
}

impl From<AuthorityError> for ApiError {
    fn from(error: AuthorityError) -> Self {
        match error {
            AuthorityError::Denied(_) => Self::forbidden(),
            AuthorityError::Unavailable(message) => Self::unavailable(message),
        }
    }
}
