// crates/kite-server/src/issues.rs
// ============================================================================
// Module: Issue Handlers
// Description: CRUD, resolve, and relationship handlers for /api/v1/issues.
// Purpose: Translate HTTP requests into lifecycle service operations.
// Dependencies: axum, kite-core, serde
// ============================================================================

//! ## Overview
//! Handlers for the issue query/command surface. Fetch-style handlers
//! enforce the requested namespace against the stored issue as defense in
//! depth beyond the namespace guard; list queries parse enum filters
//! strictly and fail 400 on unknown labels.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use kite_core::Issue;
use kite_core::IssueFilters;
use kite_core::IssueId;
use kite_core::IssuePatch;
use kite_core::IssueState;
use kite_core::IssueType;
use kite_core::MAX_PAGE_LIMIT;
use kite_core::NewIssue;
use kite_core::Severity;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::server::AppState;

// ============================================================================
// SECTION: Query Payloads
// ============================================================================

/// Query parameters for issue listings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// Namespace filter.
    pub namespace: Option<String>,
    /// Severity filter label.
    pub severity: Option<String>,
    /// Issue type filter label.
    pub issue_type: Option<String>,
    /// State filter label.
    pub state: Option<String>,
    /// Scope resource type filter.
    pub resource_type: Option<String>,
    /// Scope resource name filter.
    pub resource_name: Option<String>,
    /// Substring search over title and description.
    pub search: Option<String>,
    /// Page size; non-numeric values fall back to the default.
    pub limit: Option<String>,
    /// Page offset; non-numeric values fall back to zero.
    pub offset: Option<String>,
}

/// Query parameters carrying the caller's namespace.
#[derive(Debug, Default, Deserialize)]
pub struct NamespaceQuery {
    /// Namespace asserted by the caller.
    pub namespace: Option<String>,
}

/// Body for relationship creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedRequest {
    /// Identifier of the issue to relate to.
    pub related_id: String,
}

impl ListQuery {
    /// Converts the raw query into typed filters.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when an enum filter label is unknown.
    fn into_filters(self) -> Result<IssueFilters, ApiError> {
        let severity = self
            .severity
            .filter(|label| !label.is_empty())
            .map(|label| {
                Severity::parse(&label)
                    .ok_or_else(|| ApiError::bad_request(format!("invalid severity value: {label}")))
            })
            .transpose()?;
        let issue_type = self
            .issue_type
            .filter(|label| !label.is_empty())
            .map(|label| {
                IssueType::parse(&label).ok_or_else(|| {
                    ApiError::bad_request(format!("invalid issueType value: {label}"))
                })
            })
            .transpose()?;
        let state = self
            .state
            .filter(|label| !label.is_empty())
            .map(|label| {
                IssueState::parse(&label)
                    .ok_or_else(|| ApiError::bad_request(format!("invalid state value: {label}")))
            })
            .transpose()?;
        Ok(IssueFilters {
            namespace: self.namespace.filter(|value| !value.is_empty()),
            severity,
            issue_type,
            state,
            resource_type: self.resource_type.filter(|value| !value.is_empty()),
            resource_name: self.resource_name.filter(|value| !value.is_empty()),
            search: self.search.filter(|value| !value.is_empty()),
            limit: self
                .limit
                .and_then(|raw| raw.parse::<usize>().ok())
                .unwrap_or(0)
                .min(MAX_PAGE_LIMIT),
            offset: self.offset.and_then(|raw| raw.parse::<usize>().ok()).unwrap_or(0),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates the id path segment.
fn require_id(id: &str) -> Result<IssueId, ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::bad_request("Invalid ID parameter"));
    }
    Ok(IssueId::new(id))
}

/// Unwraps a JSON body, mapping extractor rejections to 400.
fn require_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            Err(ApiError::bad_request("Invalid request body").with_details(rejection.body_text()))
        }
    }
}

/// Loads an issue and enforces the caller's namespace when provided.
fn load_checked(
    state: &AppState,
    id: &IssueId,
    namespace: Option<&str>,
) -> Result<Issue, ApiError> {
    let issue = state.service.get(id)?.ok_or_else(|| ApiError::not_found("Issue not found"))?;
    if let Some(namespace) = namespace
        && !namespace.is_empty()
        && issue.namespace != namespace
    {
        return Err(ApiError::forbidden());
    }
    Ok(issue)
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// GET /api/v1/issues
pub async fn list_issues(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let filters = query.into_filters()?;
    let page = state.service.list(&filters)?;
    Ok(Json(page).into_response())
}

/// GET /api/v1/issues/{id}
pub async fn get_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<NamespaceQuery>,
) -> Result<Response, ApiError> {
    let id = require_id(&id)?;
    let issue = load_checked(&state, &id, query.namespace.as_deref())?;
    Ok(Json(issue).into_response())
}

/// POST /api/v1/issues
pub async fn create_issue(
    State(state): State<AppState>,
    body: Result<Json<NewIssue>, JsonRejection>,
) -> Result<Response, ApiError> {
    let candidate = require_body(body)?;
    let issue = state.service.create(&candidate)?;
    Ok((StatusCode::CREATED, Json(issue)).into_response())
}

/// PUT /api/v1/issues/{id}
pub async fn update_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<NamespaceQuery>,
    body: Result<Json<IssuePatch>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = require_id(&id)?;
    let patch = require_body(body)?;
    load_checked(&state, &id, query.namespace.as_deref())?;
    let issue = state.service.update(&id, &patch)?;
    Ok(Json(issue).into_response())
}

/// DELETE /api/v1/issues/{id}
pub async fn delete_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<NamespaceQuery>,
) -> Result<Response, ApiError> {
    let id = require_id(&id)?;
    load_checked(&state, &id, query.namespace.as_deref())?;
    state.service.delete(&id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// POST /api/v1/issues/{id}/resolve
pub async fn resolve_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<NamespaceQuery>,
) -> Result<Response, ApiError> {
    let id = require_id(&id)?;
    load_checked(&state, &id, query.namespace.as_deref())?;
    let issue = state.service.resolve_one(&id)?;
    Ok(Json(issue).into_response())
}

/// POST /api/v1/issues/{id}/related
pub async fn add_related_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<RelatedRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = require_id(&id)?;
    let request = require_body(body)?;
    let related_id = require_id(&request.related_id)?;
    state.service.relate(&id, &related_id)?;
    Ok((StatusCode::CREATED, Json(json!({"message": "Relationship created"}))).into_response())
}

/// DELETE /api/v1/issues/{id}/related/{relatedId}
pub async fn remove_related_issue(
    State(state): State<AppState>,
    Path((id, related_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let id = require_id(&id)?;
    let related_id = require_id(&related_id)?;
    state.service.unrelate(&id, &related_id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
