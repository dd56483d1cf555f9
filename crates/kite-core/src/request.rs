// crates/kite-core/src/request.rs
// ============================================================================
// Module: Kite Request Payloads
// Description: Create, patch, filter, and page payloads for issue operations.
// Purpose: Carry data between the API surface, the service, and stores.
// Dependencies: chrono, serde
// ============================================================================

//! ## Overview
//! Payload types shared by the HTTP layer, the lifecycle service, and the
//! store implementations. Create payloads carry required fields; patch
//! payloads carry only the fields to mutate, with `links` replacing the
//! whole link set when present and preserving it when absent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::issue::Issue;
use crate::issue::IssueState;
use crate::issue::IssueType;
use crate::issue::Severity;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default page size for issue listings.
pub const DEFAULT_PAGE_LIMIT: usize = 50;
/// Maximum page size accepted from callers.
pub const MAX_PAGE_LIMIT: usize = 500;

// ============================================================================
// SECTION: Create Payloads
// ============================================================================

/// Scope payload for issue creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewScope {
    /// Resource type.
    pub resource_type: String,
    /// Resource name.
    pub resource_name: String,
    /// Resource namespace; defaults to the issue namespace when empty.
    #[serde(default)]
    pub resource_namespace: String,
}

/// Link payload for issue creation and link replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLink {
    /// Link title.
    pub title: String,
    /// Link URL.
    pub url: String,
}

/// Payload for creating an issue.
///
/// # Invariants
/// - Title, description, namespace, and the scope's resource type and name
///   are required and non-empty (enforced at the service boundary).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIssue {
    /// Issue title.
    pub title: String,
    /// Issue description.
    pub description: String,
    /// Issue severity.
    pub severity: Severity,
    /// Issue type.
    pub issue_type: IssueType,
    /// Optional initial state; defaults to active.
    #[serde(default)]
    pub state: Option<IssueState>,
    /// Owning namespace.
    pub namespace: String,
    /// Scope describing the affected resource.
    pub scope: NewScope,
    /// Links to attach.
    #[serde(default)]
    pub links: Vec<NewLink>,
}

// ============================================================================
// SECTION: Patch Payload
// ============================================================================

/// Partial update for an existing issue.
///
/// Only populated fields mutate. A populated `links` replaces the whole
/// link set; an absent `links` preserves the existing set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePatch {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New severity.
    #[serde(default)]
    pub severity: Option<Severity>,
    /// New issue type.
    #[serde(default)]
    pub issue_type: Option<IssueType>,
    /// New state. Transitioning to resolved stamps `resolved_at` when it is
    /// not supplied here.
    #[serde(default)]
    pub state: Option<IssueState>,
    /// Explicit resolution time.
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Replacement link set.
    #[serde(default)]
    pub links: Option<Vec<NewLink>>,
}

impl IssuePatch {
    /// Builds the patch used to resolve a single issue.
    #[must_use]
    pub fn resolution(now: DateTime<Utc>) -> Self {
        Self {
            state: Some(IssueState::Resolved),
            resolved_at: Some(now),
            ..Self::default()
        }
    }
}

// ============================================================================
// SECTION: Filters and Pages
// ============================================================================

/// Filters for issue listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueFilters {
    /// Restrict to a namespace.
    pub namespace: Option<String>,
    /// Restrict to a severity.
    pub severity: Option<Severity>,
    /// Restrict to an issue type.
    pub issue_type: Option<IssueType>,
    /// Restrict to a state.
    pub state: Option<IssueState>,
    /// Restrict to a scope resource type.
    pub resource_type: Option<String>,
    /// Restrict to a scope resource name.
    pub resource_name: Option<String>,
    /// Case-insensitive substring match over title and description.
    pub search: Option<String>,
    /// Page size; zero selects [`DEFAULT_PAGE_LIMIT`].
    pub limit: usize,
    /// Page offset.
    pub offset: usize,
}

impl IssueFilters {
    /// Returns the effective page size.
    #[must_use]
    pub const fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            DEFAULT_PAGE_LIMIT
        } else {
            self.limit
        }
    }
}

/// One page of issues with the total matching count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePage {
    /// Issues on this page.
    pub data: Vec<Issue>,
    /// Total issues matching the filters.
    pub total: u64,
    /// Effective page size.
    pub limit: usize,
    /// Page offset.
    pub offset: usize,
}
