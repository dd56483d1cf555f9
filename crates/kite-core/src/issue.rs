// crates/kite-core/src/issue.rs
// ============================================================================
// Module: Kite Issue Model
// Description: Canonical issue entities for the Kite issue-tracking core.
// Purpose: Provide strongly typed issues, scopes, links, and relationships.
// Dependencies: chrono, serde, uuid
// ============================================================================

//! ## Overview
//! This module defines the central issue entity and its owned records. An
//! issue exclusively owns one scope, owns zero or more links, and may
//! participate in relationships with other issues. Enum wire labels are
//! lowercase and stable; timestamps serialize as RFC 3339.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Opaque issue identifier.
///
/// # Invariants
/// - Opaque UTF-8 string; assigned once at creation and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(String);

impl IssueId {
    /// Creates an issue identifier from an existing value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for IssueId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for IssueId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Enumerations
// ============================================================================

/// Issue severity levels.
///
/// # Invariants
/// - Wire labels are lowercase and stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational finding.
    Info,
    /// Minor degradation.
    Minor,
    /// Major failure.
    Major,
    /// Critical outage.
    Critical,
}

impl Severity {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
        }
    }

    /// Parses a wire label into a severity.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "info" => Some(Self::Info),
            "minor" => Some(Self::Minor),
            "major" => Some(Self::Major),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue classification by failure domain.
///
/// # Invariants
/// - Wire labels are lowercase and stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    /// Build failure.
    Build,
    /// Test failure.
    Test,
    /// Release failure.
    Release,
    /// Dependency failure.
    Dependency,
    /// Pipeline failure.
    Pipeline,
}

impl IssueType {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Test => "test",
            Self::Release => "release",
            Self::Dependency => "dependency",
            Self::Pipeline => "pipeline",
        }
    }

    /// Parses a wire label into an issue type.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "build" => Some(Self::Build),
            "test" => Some(Self::Test),
            "release" => Some(Self::Release),
            "dependency" => Some(Self::Dependency),
            "pipeline" => Some(Self::Pipeline),
            _ => None,
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue lifecycle state.
///
/// # Invariants
/// - `Resolved` is equivalent to a populated `resolved_at` on the issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    /// The issue is open and actively tracked.
    Active,
    /// The issue has been resolved.
    Resolved,
}

impl IssueState {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Resolved => "resolved",
        }
    }

    /// Parses a wire label into a state.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "active" => Some(Self::Active),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Owned Records
// ============================================================================

/// The cluster resource an issue concerns.
///
/// # Invariants
/// - Owned by exactly one issue; deleted when the issue is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueScope {
    /// Scope identifier.
    pub id: String,
    /// Resource type (for example: "pipelinerun", "component").
    pub resource_type: String,
    /// Resource name.
    pub resource_name: String,
    /// Resource namespace.
    pub resource_namespace: String,
}

/// Auxiliary URL attached to an issue.
///
/// # Invariants
/// - Owned by one issue; the link set is replaced wholesale on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    /// Link identifier.
    pub id: String,
    /// Link title.
    pub title: String,
    /// Link URL.
    pub url: String,
    /// Owning issue identifier.
    pub issue_id: IssueId,
}

// ============================================================================
// SECTION: Relationships
// ============================================================================

/// Counterpart issue summary carried on a relationship edge.
///
/// Carries the counterpart's scope so list and get responses serialize
/// without per-edge lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedIssueSummary {
    /// Counterpart issue identifier.
    pub id: IssueId,
    /// Counterpart issue title.
    pub title: String,
    /// Counterpart issue severity.
    pub severity: Severity,
    /// Counterpart issue type.
    pub issue_type: IssueType,
    /// Counterpart issue state.
    pub state: IssueState,
    /// Counterpart issue namespace.
    pub namespace: String,
    /// Counterpart issue scope.
    pub scope: IssueScope,
}

/// Directed relationship edge between two issues.
///
/// # Invariants
/// - `source_id != target_id`.
/// - At most one edge exists per unordered issue pair; lookups match either
///   direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRelation {
    /// Edge identifier.
    pub id: String,
    /// Source issue identifier.
    pub source_id: IssueId,
    /// Target issue identifier.
    pub target_id: IssueId,
    /// Counterpart issue summary (target when viewed from the source,
    /// source when viewed from the target).
    pub related: RelatedIssueSummary,
}

// ============================================================================
// SECTION: Issue
// ============================================================================

/// The central issue entity.
///
/// # Invariants
/// - `state == Resolved` if and only if `resolved_at` is set.
/// - `namespace` is immutable after creation.
/// - Exactly one scope is owned per issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Issue identifier.
    pub id: IssueId,
    /// Issue title.
    pub title: String,
    /// Issue description.
    pub description: String,
    /// Issue severity.
    pub severity: Severity,
    /// Issue type.
    pub issue_type: IssueType,
    /// Lifecycle state.
    pub state: IssueState,
    /// Time the failure was first detected.
    pub detected_at: DateTime<Utc>,
    /// Time the issue was resolved, when resolved.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Owning namespace.
    pub namespace: String,
    /// Scope describing the affected resource.
    pub scope: IssueScope,
    /// Attached links.
    pub links: Vec<Link>,
    /// Relationship edges where this issue is the source.
    pub related_from: Vec<IssueRelation>,
    /// Relationship edges where this issue is the target.
    pub related_to: Vec<IssueRelation>,
    /// Record creation time.
    pub created_at: DateTime<Utc>,
    /// Record last-update time.
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    /// Returns a relationship counterpart summary for this issue.
    #[must_use]
    pub fn summary(&self) -> RelatedIssueSummary {
        RelatedIssueSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            severity: self.severity,
            issue_type: self.issue_type,
            state: self.state,
            namespace: self.namespace.clone(),
            scope: self.scope.clone(),
        }
    }
}
