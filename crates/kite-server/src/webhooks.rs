// crates/kite-server/src/webhooks.rs
// ============================================================================
// Module: Webhook Handlers
// Description: Pipeline failure and success webhook ingress.
// Purpose: Translate external pipeline events into lifecycle operations.
// Dependencies: axum, kite-core, serde
// ============================================================================

//! ## Overview
//! Event ingress for the pipeline workflow. Failure events are idempotent:
//! repeated reports for one (namespace, pipeline) update the existing active
//! issue instead of creating another, so controller retries on 5xx are safe.
//! Success events bulk-resolve every active issue for the pipeline's scope.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use kite_core::IssueType;
use kite_core::NewIssue;
use kite_core::NewLink;
use kite_core::NewScope;
use kite_core::Severity;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::ApiError;
use crate::server::AppState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Scope resource type recorded for pipeline issues.
const PIPELINE_RESOURCE_TYPE: &str = "pipelinerun";

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// Payload for a pipeline failure webhook.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineFailureRequest {
    /// Name of the failed pipeline.
    pub pipeline_name: String,
    /// Namespace where the pipeline ran.
    pub namespace: String,
    /// Issue severity label; defaults to the configured webhook severity.
    #[serde(default)]
    pub severity: Option<String>,
    /// Why the pipeline failed.
    pub failure_reason: String,
    /// Pipeline run identifier used for generated log URLs.
    #[serde(default)]
    pub run_id: Option<String>,
    /// Direct URL to logs; generated when omitted.
    #[serde(default)]
    pub logs_url: Option<String>,
}

/// Payload for a pipeline success webhook.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSuccessRequest {
    /// Name of the successful pipeline.
    pub pipeline_name: String,
    /// Namespace where the pipeline ran.
    pub namespace: String,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// POST /api/v1/webhooks/pipeline-failure
pub async fn pipeline_failure(
    State(state): State<AppState>,
    body: Result<Json<PipelineFailureRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = require_body(body)?;
    if request.pipeline_name.is_empty()
        || request.namespace.is_empty()
        || request.failure_reason.is_empty()
    {
        return Err(ApiError::bad_request("Missing required fields"));
    }

    let severity = match request.severity.as_deref() {
        None | Some("") => state.config.webhooks.default_severity,
        Some(label) => Severity::parse(label)
            .ok_or_else(|| ApiError::bad_request(format!("invalid severity value: {label}")))?,
    };
    let logs_url = request.logs_url.filter(|url| !url.is_empty()).unwrap_or_else(|| {
        format!(
            "{}{}{}",
            state.config.webhooks.logs_base_url,
            state.config.webhooks.logs_endpoint,
            request.run_id.as_deref().unwrap_or_default()
        )
    });

    let candidate = NewIssue {
        title: format!("Pipeline run failed: {}", request.pipeline_name),
        description: format!(
            "The pipeline run {} failed with reason: {}",
            request.pipeline_name, request.failure_reason
        ),
        severity,
        issue_type: IssueType::Pipeline,
        state: None,
        namespace: request.namespace.clone(),
        scope: NewScope {
            resource_type: PIPELINE_RESOURCE_TYPE.to_string(),
            resource_name: request.pipeline_name.clone(),
            resource_namespace: request.namespace.clone(),
        },
        links: vec![NewLink {
            title: "Pipeline Run Logs".to_string(),
            url: logs_url,
        }],
    };

    let issue = state.service.create(&candidate)?;
    info!(issue_id = %issue.id, pipeline = %request.pipeline_name, "processed pipeline failure webhook");
    Ok((StatusCode::CREATED, Json(json!({"status": "success", "issue": issue}))).into_response())
}

/// POST /api/v1/webhooks/pipeline-success
pub async fn pipeline_success(
    State(state): State<AppState>,
    body: Result<Json<PipelineSuccessRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = require_body(body)?;
    if request.pipeline_name.is_empty() || request.namespace.is_empty() {
        return Err(ApiError::bad_request("Missing required fields"));
    }

    let resolved = state.service.resolve_by_scope(
        PIPELINE_RESOURCE_TYPE,
        &request.pipeline_name,
        &request.namespace,
    )?;
    info!(
        pipeline = %request.pipeline_name,
        namespace = %request.namespace,
        resolved,
        "processed pipeline success webhook"
    );
    Ok(Json(json!({
        "status": "success",
        "message": format!("Resolved {resolved} issue(s) for pipeline {}", request.pipeline_name),
    }))
    .into_response())
}

/// Unwraps a JSON body, mapping extractor rejections to 400.
fn require_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            Err(ApiError::bad_request("Missing required fields").with_details(rejection.body_text()))
        }
    }
}
