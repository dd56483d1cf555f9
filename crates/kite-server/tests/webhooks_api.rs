// crates/kite-server/tests/webhooks_api.rs
// ============================================================================
// Module: Webhook API Tests
// Description: End-to-end tests for the pipeline webhook ingress.
// Purpose: Validate idempotent failure ingestion and bulk resolution.
// Dependencies: kite-server, kite-core, serde_json, tower
// ============================================================================

//! ## Overview
//! Exercises the pipeline failure/success webhooks through the full router:
//! dedup under repeated failures, generated log links, bulk resolution
//! reporting, and the webhook feature flag.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::http::StatusCode;
use kite_core::IssueState;
use kite_core::IssueStore;
use kite_core::IssueType;
use kite_core::NewIssue;
use kite_core::NewScope;
use kite_core::Severity;
use kite_server::PassthroughAuthority;
use serde_json::json;

use common::app;
use common::app_with;
use common::request;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn failure_payload(pipeline: &str, namespace: &str, reason: &str) -> serde_json::Value {
    json!({
        "pipelineName": pipeline,
        "namespace": namespace,
        "failureReason": reason,
    })
}

fn pipeline_issue(namespace: &str, pipeline: &str, description: &str) -> NewIssue {
    NewIssue {
        title: format!("Pipeline run failed: {pipeline}"),
        description: description.to_string(),
        severity: Severity::Major,
        issue_type: IssueType::Pipeline,
        state: None,
        namespace: namespace.to_string(),
        scope: NewScope {
            resource_type: "pipelinerun".to_string(),
            resource_name: pipeline.to_string(),
            resource_namespace: namespace.to_string(),
        },
        links: Vec::new(),
    }
}

// ============================================================================
// SECTION: Failure Webhook
// ============================================================================

#[tokio::test]
async fn failure_webhook_creates_an_issue_with_a_generated_log_link() {
    let (router, _) = app();
    let mut payload = failure_payload("build-xyz", "team-a", "timeout");
    payload["runId"] = json!("run-1");
    let (status, body) =
        request(&router, "POST", "/api/v1/webhooks/pipeline-failure", Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");

    let issue = &body["issue"];
    assert_eq!(issue["title"], "Pipeline run failed: build-xyz");
    assert_eq!(
        issue["description"],
        "The pipeline run build-xyz failed with reason: timeout"
    );
    assert_eq!(issue["issueType"], "pipeline");
    assert_eq!(issue["severity"], "major");
    assert_eq!(issue["scope"]["resourceType"], "pipelinerun");
    assert_eq!(issue["scope"]["resourceName"], "build-xyz");
    let links = issue["links"].as_array().unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0]["title"], "Pipeline Run Logs");
    assert_eq!(links[0]["url"], "https://konflux.dev/logs/pipelineruns/run-1");
}

#[tokio::test]
async fn failure_webhook_keeps_an_explicit_logs_url() {
    let (router, _) = app();
    let mut payload = failure_payload("build-xyz", "team-a", "timeout");
    payload["logsUrl"] = json!("https://logs.example.com/direct");
    let (_, body) =
        request(&router, "POST", "/api/v1/webhooks/pipeline-failure", Some(payload)).await;
    assert_eq!(body["issue"]["links"][0]["url"], "https://logs.example.com/direct");
}

#[tokio::test]
async fn repeated_failure_webhooks_update_one_issue() {
    let (router, _) = app();
    let (status, first) = request(
        &router,
        "POST",
        "/api/v1/webhooks/pipeline-failure",
        Some(failure_payload("build-xyz", "team-a", "timeout")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, second) = request(
        &router,
        "POST",
        "/api/v1/webhooks/pipeline-failure",
        Some(failure_payload("build-xyz", "team-a", "oom killed")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    assert_eq!(first["issue"]["id"], second["issue"]["id"]);
    assert_eq!(
        second["issue"]["description"],
        "The pipeline run build-xyz failed with reason: oom killed"
    );

    let (_, page) =
        request(&router, "GET", "/api/v1/issues?namespace=team-a&state=active", None).await;
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn failure_webhook_with_missing_fields_is_bad_request() {
    let (router, _) = app();
    let (status, _) = request(
        &router,
        "POST",
        "/api/v1/webhooks/pipeline-failure",
        Some(json!({"pipelineName": "build-xyz", "namespace": "team-a"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failure_webhook_with_invalid_severity_is_bad_request() {
    let (router, _) = app();
    let mut payload = failure_payload("build-xyz", "team-a", "timeout");
    payload["severity"] = json!("catastrophic");
    let (status, _) =
        request(&router, "POST", "/api/v1/webhooks/pipeline-failure", Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failure_webhook_without_namespace_is_bad_request() {
    let (router, _) = app();
    let (status, body) = request(
        &router,
        "POST",
        "/api/v1/webhooks/pipeline-failure",
        Some(json!({"pipelineName": "build-xyz", "failureReason": "timeout"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing namespace");
}

// ============================================================================
// SECTION: Success Webhook
// ============================================================================

#[tokio::test]
async fn success_webhook_resolves_all_matching_issues_and_reports_the_count() {
    let (router, store) = app();
    // Two active issues for one scope, as direct creates can produce.
    store.create(&pipeline_issue("team-a", "build-xyz", "first failure")).unwrap();
    store.create(&pipeline_issue("team-a", "build-xyz", "second failure")).unwrap();

    let (status, body) = request(
        &router,
        "POST",
        "/api/v1/webhooks/pipeline-success",
        Some(json!({"pipelineName": "build-xyz", "namespace": "team-a"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Resolved 2 issue(s) for pipeline build-xyz");

    let (resolved, _) = store
        .find_all(&kite_core::IssueFilters {
            namespace: Some("team-a".to_string()),
            ..kite_core::IssueFilters::default()
        })
        .unwrap();
    let stamps: Vec<_> = resolved
        .iter()
        .map(|issue| {
            assert_eq!(issue.state, IssueState::Resolved);
            issue.resolved_at.unwrap()
        })
        .collect();
    assert_eq!(stamps[0], stamps[1], "batch resolution shares one timestamp");
}

#[tokio::test]
async fn success_webhook_is_idempotent() {
    let (router, store) = app();
    store.create(&pipeline_issue("team-a", "build-xyz", "failure")).unwrap();

    let (_, first) = request(
        &router,
        "POST",
        "/api/v1/webhooks/pipeline-success",
        Some(json!({"pipelineName": "build-xyz", "namespace": "team-a"})),
    )
    .await;
    assert_eq!(first["message"], "Resolved 1 issue(s) for pipeline build-xyz");

    let (status, second) = request(
        &router,
        "POST",
        "/api/v1/webhooks/pipeline-success",
        Some(json!({"pipelineName": "build-xyz", "namespace": "team-a"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["message"], "Resolved 0 issue(s) for pipeline build-xyz");
}

// ============================================================================
// SECTION: Feature Flag
// ============================================================================

#[tokio::test]
async fn webhooks_can_be_disabled_by_feature_flag() {
    let (router, _) = app_with(
        &[("KITE_FEATURE_WEBHOOKS", "false")],
        Arc::new(PassthroughAuthority),
    );
    let (status, _) = request(
        &router,
        "POST",
        "/api/v1/webhooks/pipeline-failure",
        Some(failure_payload("build-xyz", "team-a", "timeout")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
