// crates/kite-core/src/store.rs
// ============================================================================
// Module: Kite Store Interface
// Description: Backend-agnostic issue store contract and error taxonomy.
// Purpose: Define the persistence seam used by the lifecycle service.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The store persists issues, scopes, links, and relationships and exposes a
//! narrow interface to the lifecycle service. Every multi-entity mutation is
//! transactional in conforming implementations, and `create_or_update` must
//! close the duplicate check-then-insert window so concurrent failure events
//! for one scope converge on a single active issue.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::issue::Issue;
use crate::issue::IssueId;
use crate::request::IssueFilters;
use crate::request::IssuePatch;
use crate::request::NewIssue;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Issue store failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling and HTTP status mapping.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The mutation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Input rejected by the store.
    #[error("invalid input: {0}")]
    Invalid(String),
    /// The backing engine is temporarily unavailable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The backing engine reported an error.
    #[error("store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Store Interface
// ============================================================================

/// Issue store for durable persistence.
pub trait IssueStore: Send + Sync {
    /// Lists issues matching the filters, newest detection first, together
    /// with the total matching count. Scope, links, and relationship
    /// counterparts are preloaded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn find_all(&self, filters: &IssueFilters) -> Result<(Vec<Issue>, u64), StoreError>;

    /// Loads one issue with scope, links, and both relationship sides.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_by_id(&self, id: &IssueId) -> Result<Option<Issue>, StoreError>;

    /// Finds the active issue matching the candidate's namespace, issue
    /// type, and scope, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_duplicate(&self, candidate: &NewIssue) -> Result<Option<Issue>, StoreError>;

    /// Creates an issue with its scope and links in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when required fields are missing.
    fn create(&self, candidate: &NewIssue) -> Result<Issue, StoreError>;

    /// Applies a partial update in one transaction. Absent fields are
    /// preserved; a present link set replaces the stored one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the issue does not exist.
    fn update(&self, id: &IssueId, patch: &IssuePatch) -> Result<Issue, StoreError>;

    /// Deletes the issue together with its scope, links, and every
    /// relationship edge incident to it, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the issue does not exist.
    fn delete(&self, id: &IssueId) -> Result<(), StoreError>;

    /// Resolves every active issue matching the scope in one transaction
    /// and returns the number of issues transitioned. A scope with no
    /// active issues yields zero without error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn resolve_by_scope(
        &self,
        resource_type: &str,
        resource_name: &str,
        namespace: &str,
    ) -> Result<u64, StoreError>;

    /// Inserts a relationship edge between two issues.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for self-relationships,
    /// [`StoreError::NotFound`] when either endpoint is absent, and
    /// [`StoreError::Conflict`] when an edge already exists in either
    /// direction.
    fn add_related(&self, source_id: &IssueId, target_id: &IssueId) -> Result<(), StoreError>;

    /// Removes the relationship edge between two issues, matching either
    /// direction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no edge exists.
    fn remove_related(&self, source_id: &IssueId, target_id: &IssueId) -> Result<(), StoreError>;

    /// Creates the issue, or updates the existing active duplicate for the
    /// same (namespace, issue type, scope). The duplicate lookup and the
    /// write happen in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn create_or_update(&self, candidate: &NewIssue) -> Result<Issue, StoreError>;

    /// Probes store connectivity for liveness reporting.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
