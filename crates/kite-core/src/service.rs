// crates/kite-core/src/service.rs
// ============================================================================
// Module: Kite Issue Lifecycle Service
// Description: Deduplication, bulk resolution, and relationship management.
// Purpose: Sit between the HTTP surface and the store with validation.
// Dependencies: chrono, thiserror, tracing
// ============================================================================

//! ## Overview
//! The lifecycle service is the behavioral core. It validates incoming
//! payloads, routes every create through the single `create_or_update` path
//! so repeated failure events never fan out into duplicate active issues,
//! and passes store errors through unchanged for status mapping at the API
//! boundary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::issue::Issue;
use crate::issue::IssueId;
use crate::request::IssueFilters;
use crate::request::IssuePage;
use crate::request::IssuePatch;
use crate::request::NewIssue;
use crate::request::NewLink;
use crate::store::IssueStore;
use crate::store::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Lifecycle service failures.
///
/// # Invariants
/// - Store errors pass through unchanged so the API layer maps kinds once.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Payload failed boundary validation.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Issue lifecycle service.
#[derive(Clone)]
pub struct IssueService {
    /// Backing issue store.
    store: Arc<dyn IssueStore>,
}

impl IssueService {
    /// Creates a service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn IssueStore>) -> Self {
        Self {
            store,
        }
    }

    /// Returns the backing store handle.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn IssueStore> {
        &self.store
    }

    /// Lists issues matching the filters.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the store query fails.
    pub fn list(&self, filters: &IssueFilters) -> Result<IssuePage, ServiceError> {
        let (data, total) = self.store.find_all(filters)?;
        Ok(IssuePage {
            data,
            total,
            limit: filters.effective_limit(),
            offset: filters.offset,
        })
    }

    /// Fetches one issue by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the store lookup fails.
    pub fn get(&self, id: &IssueId) -> Result<Option<Issue>, ServiceError> {
        Ok(self.store.find_by_id(id)?)
    }

    /// Creates an issue, or updates the active duplicate for the same
    /// (namespace, issue type, scope). Idempotent under identical payloads.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] for missing or empty required
    /// fields, otherwise passes store errors through.
    pub fn create(&self, candidate: &NewIssue) -> Result<Issue, ServiceError> {
        validate_new_issue(candidate)?;
        let issue = self.store.create_or_update(candidate)?;
        info!(issue_id = %issue.id, namespace = %issue.namespace, "issue created or updated");
        Ok(issue)
    }

    /// Applies a partial update to an issue.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] for invalid link entries,
    /// otherwise passes store errors through.
    pub fn update(&self, id: &IssueId, patch: &IssuePatch) -> Result<Issue, ServiceError> {
        if let Some(links) = &patch.links {
            validate_links(links)?;
        }
        let issue = self.store.update(id, patch)?;
        info!(issue_id = %id, "issue updated");
        Ok(issue)
    }

    /// Deletes an issue with its scope, links, and relationships.
    ///
    /// # Errors
    ///
    /// Passes store errors through.
    pub fn delete(&self, id: &IssueId) -> Result<(), ServiceError> {
        self.store.delete(id)?;
        info!(issue_id = %id, "issue deleted");
        Ok(())
    }

    /// Transitions one issue to resolved, stamping the resolution time.
    ///
    /// # Errors
    ///
    /// Passes store errors through.
    pub fn resolve_one(&self, id: &IssueId) -> Result<Issue, ServiceError> {
        let issue = self.store.update(id, &IssuePatch::resolution(Utc::now()))?;
        info!(issue_id = %id, "issue resolved");
        Ok(issue)
    }

    /// Resolves every active issue for the scope and returns the count.
    ///
    /// # Errors
    ///
    /// Passes store errors through.
    pub fn resolve_by_scope(
        &self,
        resource_type: &str,
        resource_name: &str,
        namespace: &str,
    ) -> Result<u64, ServiceError> {
        let count = self.store.resolve_by_scope(resource_type, resource_name, namespace)?;
        info!(
            resource_type,
            resource_name,
            namespace,
            count,
            "resolved issues by scope"
        );
        Ok(count)
    }

    /// Creates a relationship edge between two issues.
    ///
    /// # Errors
    ///
    /// Passes store errors through (invalid self-relation, missing
    /// endpoint, or duplicate edge).
    pub fn relate(&self, source_id: &IssueId, target_id: &IssueId) -> Result<(), ServiceError> {
        self.store.add_related(source_id, target_id)?;
        info!(source_id = %source_id, target_id = %target_id, "related issues");
        Ok(())
    }

    /// Removes the relationship edge between two issues.
    ///
    /// # Errors
    ///
    /// Passes store errors through.
    pub fn unrelate(&self, source_id: &IssueId, target_id: &IssueId) -> Result<(), ServiceError> {
        self.store.remove_related(source_id, target_id)?;
        info!(source_id = %source_id, target_id = %target_id, "unrelated issues");
        Ok(())
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates a create payload at the service boundary.
fn validate_new_issue(candidate: &NewIssue) -> Result<(), ServiceError> {
    if candidate.title.trim().is_empty() {
        return Err(ServiceError::Validation("title is required".to_string()));
    }
    if candidate.description.trim().is_empty() {
        return Err(ServiceError::Validation("description is required".to_string()));
    }
    if candidate.namespace.trim().is_empty() {
        return Err(ServiceError::Validation("namespace is required".to_string()));
    }
    if candidate.scope.resource_type.trim().is_empty() {
        return Err(ServiceError::Validation("scope.resourceType is required".to_string()));
    }
    if candidate.scope.resource_name.trim().is_empty() {
        return Err(ServiceError::Validation("scope.resourceName is required".to_string()));
    }
    validate_links(&candidate.links)
}

/// Validates link entries.
fn validate_links(links: &[NewLink]) -> Result<(), ServiceError> {
    for link in links {
        if link.title.trim().is_empty() {
            return Err(ServiceError::Validation("link title is required".to_string()));
        }
        if link.url.trim().is_empty() {
            return Err(ServiceError::Validation("link url is required".to_string()));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
