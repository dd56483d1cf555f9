// crates/kite-core/tests/memory_store.rs
// ============================================================================
// Module: In-Memory Store Tests
// Description: Conformance tests for the in-memory issue store.
// Purpose: Validate store contracts shared with durable implementations.
// Dependencies: kite-core, serde_json
// ============================================================================

//! ## Overview
//! Exercises the store contract against the in-memory implementation:
//! cascade deletion, link replacement semantics, filter and pagination
//! behavior, and the duplicate-collapsing write path.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use kite_core::InMemoryIssueStore;
use kite_core::IssueFilters;
use kite_core::IssuePatch;
use kite_core::IssueState;
use kite_core::IssueStore;
use kite_core::IssueType;
use kite_core::NewIssue;
use kite_core::NewLink;
use kite_core::NewScope;
use kite_core::Severity;
use kite_core::StoreError;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn candidate(namespace: &str, resource_name: &str, title: &str) -> NewIssue {
    NewIssue {
        title: title.to_string(),
        description: format!("{title} description"),
        severity: Severity::Major,
        issue_type: IssueType::Pipeline,
        state: None,
        namespace: namespace.to_string(),
        scope: NewScope {
            resource_type: "pipelinerun".to_string(),
            resource_name: resource_name.to_string(),
            resource_namespace: String::new(),
        },
        links: Vec::new(),
    }
}

fn with_links(mut issue: NewIssue, links: &[(&str, &str)]) -> NewIssue {
    issue.links = links
        .iter()
        .map(|(title, url)| NewLink {
            title: (*title).to_string(),
            url: (*url).to_string(),
        })
        .collect();
    issue
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn delete_cascades_scope_links_and_relationships() {
    let store = InMemoryIssueStore::new();
    let issue = store
        .create(&with_links(
            candidate("team-a", "run-a", "Issue A"),
            &[("Logs", "https://logs/a"), ("Dashboard", "https://dash/a")],
        ))
        .unwrap();
    let other = store.create(&candidate("team-a", "run-b", "Issue B")).unwrap();
    store.add_related(&issue.id, &other.id).unwrap();

    store.delete(&issue.id).unwrap();

    assert!(store.find_by_id(&issue.id).unwrap().is_none());
    let survivor = store.find_by_id(&other.id).unwrap().unwrap();
    assert!(survivor.related_from.is_empty());
    assert!(survivor.related_to.is_empty());
    assert_eq!(survivor.scope.resource_name, "run-b");
}

#[test]
fn delete_missing_issue_is_not_found() {
    let store = InMemoryIssueStore::new();
    let err = store.delete(&"missing".into()).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn update_with_empty_links_clears_and_absent_links_preserves() {
    let store = InMemoryIssueStore::new();
    let issue = store
        .create(&with_links(candidate("team-a", "run-a", "Issue A"), &[("Logs", "https://logs/a")]))
        .unwrap();

    let patched = store
        .update(
            &issue.id,
            &IssuePatch {
                title: Some("Renamed".to_string()),
                ..IssuePatch::default()
            },
        )
        .unwrap();
    assert_eq!(patched.links.len(), 1, "absent links must preserve the set");
    assert_eq!(patched.title, "Renamed");

    let cleared = store
        .update(
            &issue.id,
            &IssuePatch {
                links: Some(Vec::new()),
                ..IssuePatch::default()
            },
        )
        .unwrap();
    assert!(cleared.links.is_empty(), "empty links must clear the set");
}

#[test]
fn update_to_resolved_stamps_and_back_to_active_clears() {
    let store = InMemoryIssueStore::new();
    let issue = store.create(&candidate("team-a", "run-a", "Issue A")).unwrap();

    let resolved = store
        .update(
            &issue.id,
            &IssuePatch {
                state: Some(IssueState::Resolved),
                ..IssuePatch::default()
            },
        )
        .unwrap();
    assert!(resolved.resolved_at.is_some());

    let reopened = store
        .update(
            &issue.id,
            &IssuePatch {
                state: Some(IssueState::Active),
                ..IssuePatch::default()
            },
        )
        .unwrap();
    assert_eq!(reopened.state, IssueState::Active);
    assert!(reopened.resolved_at.is_none());
}

#[test]
fn find_all_empty_result_is_not_an_error() {
    let store = InMemoryIssueStore::new();
    let (data, total) = store
        .find_all(&IssueFilters {
            namespace: Some("team-a".to_string()),
            ..IssueFilters::default()
        })
        .unwrap();
    assert!(data.is_empty());
    assert_eq!(total, 0);
}

#[test]
fn find_all_offset_beyond_total_returns_empty_with_total() {
    let store = InMemoryIssueStore::new();
    store.create(&candidate("team-a", "run-a", "Issue A")).unwrap();
    store.create(&candidate("team-a", "run-b", "Issue B")).unwrap();
    let (data, total) = store
        .find_all(&IssueFilters {
            namespace: Some("team-a".to_string()),
            offset: 10,
            ..IssueFilters::default()
        })
        .unwrap();
    assert!(data.is_empty());
    assert_eq!(total, 2);
}

#[test]
fn find_all_search_is_case_insensitive_over_title_and_description() {
    let store = InMemoryIssueStore::new();
    store.create(&candidate("team-a", "run-a", "Frontend BUILD broke")).unwrap();
    store.create(&candidate("team-a", "run-b", "Backend test flake")).unwrap();

    let (by_title, _) = store
        .find_all(&IssueFilters {
            search: Some("frontend".to_string()),
            ..IssueFilters::default()
        })
        .unwrap();
    assert_eq!(by_title.len(), 1);

    let (by_description, _) = store
        .find_all(&IssueFilters {
            search: Some("FLAKE DESCRIPTION".to_lowercase()),
            ..IssueFilters::default()
        })
        .unwrap();
    assert_eq!(by_description.len(), 1);
}

#[test]
fn find_all_filters_by_scope_resource() {
    let store = InMemoryIssueStore::new();
    store.create(&candidate("team-a", "run-a", "Issue A")).unwrap();
    store.create(&candidate("team-a", "run-b", "Issue B")).unwrap();
    let (data, total) = store
        .find_all(&IssueFilters {
            resource_type: Some("pipelinerun".to_string()),
            resource_name: Some("run-b".to_string()),
            ..IssueFilters::default()
        })
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(data[0].scope.resource_name, "run-b");
}

#[test]
fn create_or_update_replaces_links_on_duplicate() {
    let store = InMemoryIssueStore::new();
    let first = store
        .create_or_update(&with_links(
            candidate("team-a", "run-a", "Issue A"),
            &[("Logs", "https://logs/old")],
        ))
        .unwrap();
    let second = store
        .create_or_update(&with_links(
            candidate("team-a", "run-a", "Issue A updated"),
            &[("Logs", "https://logs/new")],
        ))
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.title, "Issue A updated");
    assert_eq!(second.links.len(), 1);
    assert_eq!(second.links[0].url, "https://logs/new");
}

#[test]
fn create_or_update_ignores_resolved_issues_for_dedup() {
    let store = InMemoryIssueStore::new();
    let first = store.create_or_update(&candidate("team-a", "run-a", "Issue A")).unwrap();
    store.resolve_by_scope("pipelinerun", "run-a", "team-a").unwrap();
    let second = store.create_or_update(&candidate("team-a", "run-a", "Issue A again")).unwrap();
    assert_ne!(first.id, second.id, "a resolved issue is not a duplicate target");
}

#[test]
fn resolve_by_scope_stamps_a_single_resolution_time() {
    let store = InMemoryIssueStore::new();
    // Two active issues for one scope can only arise through direct creates.
    let mut second = candidate("team-a", "run-a", "Issue A2");
    second.state = Some(IssueState::Active);
    store.create(&candidate("team-a", "run-a", "Issue A1")).unwrap();
    store.create(&second).unwrap();

    let count = store.resolve_by_scope("pipelinerun", "run-a", "team-a").unwrap();
    assert_eq!(count, 2);

    let (data, _) = store
        .find_all(&IssueFilters {
            namespace: Some("team-a".to_string()),
            ..IssueFilters::default()
        })
        .unwrap();
    let stamps: Vec<_> = data.iter().map(|issue| issue.resolved_at.unwrap()).collect();
    assert_eq!(stamps[0], stamps[1]);
}

#[test]
fn remove_related_matches_either_direction() {
    let store = InMemoryIssueStore::new();
    let a = store.create(&candidate("team-a", "run-a", "Issue A")).unwrap();
    let b = store.create(&candidate("team-a", "run-b", "Issue B")).unwrap();
    store.add_related(&a.id, &b.id).unwrap();
    store.remove_related(&b.id, &a.id).unwrap();
    let err = store.remove_related(&a.id, &b.id).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn relation_edges_surface_on_both_issues() {
    let store = InMemoryIssueStore::new();
    let a = store.create(&candidate("team-a", "run-a", "Issue A")).unwrap();
    let b = store.create(&candidate("team-a", "run-b", "Issue B")).unwrap();
    store.add_related(&a.id, &b.id).unwrap();

    let a_view = store.find_by_id(&a.id).unwrap().unwrap();
    assert_eq!(a_view.related_from.len(), 1);
    assert_eq!(a_view.related_from[0].related.id, b.id);
    assert_eq!(a_view.related_from[0].related.scope.resource_name, "run-b");

    let b_view = store.find_by_id(&b.id).unwrap().unwrap();
    assert_eq!(b_view.related_to.len(), 1);
    assert_eq!(b_view.related_to[0].related.id, a.id);
}

#[test]
fn issue_serializes_with_camel_case_wire_fields() {
    let store = InMemoryIssueStore::new();
    let issue = store.create(&candidate("team-a", "run-a", "Issue A")).unwrap();
    let value = serde_json::to_value(&issue).unwrap();
    assert_eq!(value["issueType"], "pipeline");
    assert_eq!(value["state"], "active");
    assert_eq!(value["severity"], "major");
    assert!(value["resolvedAt"].is_null());
    assert_eq!(value["scope"]["resourceNamespace"], "team-a");
    assert!(value["detectedAt"].is_string());
}
