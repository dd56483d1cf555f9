// crates/kite-core/src/memory.rs
// ============================================================================
// Module: In-Memory Issue Store
// Description: Mutex-guarded in-memory IssueStore implementation.
// Purpose: Reference store for unit tests and HTTP tests.
// Dependencies: chrono, uuid
// ============================================================================

//! ## Overview
//! [`InMemoryIssueStore`] keeps issues and relationship edges in maps behind
//! a mutex. All mutations run under the lock, so the store exhibits the same
//! serialized-writer semantics as the durable store, including the
//! single-active-issue-per-scope guarantee of `create_or_update`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::issue::Issue;
use crate::issue::IssueId;
use crate::issue::IssueRelation;
use crate::issue::IssueScope;
use crate::issue::IssueState;
use crate::issue::IssueType;
use crate::issue::Link;
use crate::issue::RelatedIssueSummary;
use crate::issue::Severity;
use crate::request::IssueFilters;
use crate::request::IssuePatch;
use crate::request::NewIssue;
use crate::store::IssueStore;
use crate::store::StoreError;

// ============================================================================
// SECTION: Records
// ============================================================================

/// Flat issue row with its owned scope and links.
#[derive(Debug, Clone)]
struct IssueRecord {
    id: IssueId,
    title: String,
    description: String,
    severity: Severity,
    issue_type: IssueType,
    state: IssueState,
    detected_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    namespace: String,
    scope: IssueScope,
    links: Vec<Link>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IssueRecord {
    fn summary(&self) -> RelatedIssueSummary {
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

/// Directed relationship row.
#[derive(Debug, Clone)]
struct RelationRecord {
    id: String,
    source_id: IssueId,
    target_id: IssueId,
}

/// Mutable store state guarded by the mutex.
#[derive(Debug, Default)]
struct MemoryState {
    issues: BTreeMap<String, IssueRecord>,
    relations: Vec<RelationRecord>,
}

impl MemoryState {
    /// Assembles the full issue view with both relationship sides.
    fn materialize(&self, record: &IssueRecord) -> Issue {
        let mut related_from = Vec::new();
        let mut related_to = Vec::new();
        for relation in &self.relations {
            if relation.source_id == record.id {
                if let Some(target) = self.issues.get(relation.target_id.as_str()) {
                    related_from.push(IssueRelation {
                        id: relation.id.clone(),
                        source_id: relation.source_id.clone(),
                        target_id: relation.target_id.clone(),
                        related: target.summary(),
                    });
                }
            } else if relation.target_id == record.id {
                if let Some(source) = self.issues.get(relation.source_id.as_str()) {
                    related_to.push(IssueRelation {
                        id: relation.id.clone(),
                        source_id: relation.source_id.clone(),
                        target_id: relation.target_id.clone(),
                        related: source.summary(),
                    });
                }
            }
        }
        Issue {
            id: record.id.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            severity: record.severity,
            issue_type: record.issue_type,
            state: record.state,
            detected_at: record.detected_at,
            resolved_at: record.resolved_at,
            namespace: record.namespace.clone(),
            scope: record.scope.clone(),
            links: record.links.clone(),
            related_from,
            related_to,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// Returns the id of the active duplicate for the candidate, if any.
    fn duplicate_id(&self, candidate: &NewIssue) -> Option<IssueId> {
        self.issues
            .values()
            .find(|record| {
                record.state == IssueState::Active
                    && record.namespace == candidate.namespace
                    && record.issue_type == candidate.issue_type
                    && record.scope.resource_type == candidate.scope.resource_type
                    && record.scope.resource_name == candidate.scope.resource_name
                    && record.scope.resource_namespace == candidate.namespace
            })
            .map(|record| record.id.clone())
    }

    /// Inserts a new issue record from the candidate.
    fn insert(&mut self, candidate: &NewIssue, now: DateTime<Utc>) -> IssueId {
        let id = IssueId::generate();
        let resource_namespace = if candidate.scope.resource_namespace.is_empty() {
            candidate.namespace.clone()
        } else {
            candidate.scope.resource_namespace.clone()
        };
        let state = candidate.state.unwrap_or(IssueState::Active);
        let resolved_at = (state == IssueState::Resolved).then_some(now);
        let links = candidate
            .links
            .iter()
            .map(|link| Link {
                id: Uuid::new_v4().to_string(),
                title: link.title.clone(),
                url: link.url.clone(),
                issue_id: id.clone(),
            })
            .collect();
        let record = IssueRecord {
            id: id.clone(),
            title: candidate.title.clone(),
            description: candidate.description.clone(),
            severity: candidate.severity,
            issue_type: candidate.issue_type,
            state,
            detected_at: now,
            resolved_at,
            namespace: candidate.namespace.clone(),
            scope: IssueScope {
                id: Uuid::new_v4().to_string(),
                resource_type: candidate.scope.resource_type.clone(),
                resource_name: candidate.scope.resource_name.clone(),
                resource_namespace,
            },
            links,
            created_at: now,
            updated_at: now,
        };
        self.issues.insert(id.as_str().to_string(), record);
        id
    }

    /// Applies a patch to an existing record.
    fn apply_patch(
        &mut self,
        id: &IssueId,
        patch: &IssuePatch,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let record = self
            .issues
            .get_mut(id.as_str())
            .ok_or_else(|| StoreError::NotFound(format!("issue {id} not found")))?;
        if let Some(title) = &patch.title {
            record.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            record.description.clone_from(description);
        }
        if let Some(severity) = patch.severity {
            record.severity = severity;
        }
        if let Some(issue_type) = patch.issue_type {
            record.issue_type = issue_type;
        }
        if let Some(state) = patch.state {
            match state {
                IssueState::Resolved => {
                    if record.state != IssueState::Resolved && patch.resolved_at.is_none() {
                        record.resolved_at = Some(now);
                    }
                }
                IssueState::Active => {
                    record.resolved_at = None;
                }
            }
            record.state = state;
        }
        if let Some(resolved_at) = patch.resolved_at {
            record.resolved_at = Some(resolved_at);
        }
        if let Some(links) = &patch.links {
            record.links = links
                .iter()
                .map(|link| Link {
                    id: Uuid::new_v4().to_string(),
                    title: link.title.clone(),
                    url: link.url.clone(),
                    issue_id: id.clone(),
                })
                .collect();
        }
        record.updated_at = now;
        Ok(())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// In-memory issue store for tests and local development.
#[derive(Debug, Default)]
pub struct InMemoryIssueStore {
    state: Mutex<MemoryState>,
}

impl InMemoryIssueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Store("mutex poisoned".to_string()))
    }
}

impl IssueStore for InMemoryIssueStore {
    fn find_all(&self, filters: &IssueFilters) -> Result<(Vec<Issue>, u64), StoreError> {
        let state = self.lock()?;
        let mut matches: Vec<&IssueRecord> = state
            .issues
            .values()
            .filter(|record| matches_filters(record, filters))
            .collect();
        matches.sort_by(|a, b| {
            b.detected_at.cmp(&a.detected_at).then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        let total = matches.len() as u64;
        let issues = matches
            .into_iter()
            .skip(filters.offset)
            .take(filters.effective_limit())
            .map(|record| state.materialize(record))
            .collect();
        Ok((issues, total))
    }

    fn find_by_id(&self, id: &IssueId) -> Result<Option<Issue>, StoreError> {
        let state = self.lock()?;
        Ok(state.issues.get(id.as_str()).map(|record| state.materialize(record)))
    }

    fn find_duplicate(&self, candidate: &NewIssue) -> Result<Option<Issue>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .duplicate_id(candidate)
            .and_then(|id| state.issues.get(id.as_str()).map(|record| state.materialize(record))))
    }

    fn create(&self, candidate: &NewIssue) -> Result<Issue, StoreError> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let id = state.insert(candidate, now);
        let record = state
            .issues
            .get(id.as_str())
            .ok_or_else(|| StoreError::Store("created issue vanished".to_string()))?;
        Ok(state.materialize(record))
    }

    fn update(&self, id: &IssueId, patch: &IssuePatch) -> Result<Issue, StoreError> {
        let mut state = self.lock()?;
        let now = Utc::now();
        state.apply_patch(id, patch, now)?;
        let record = state
            .issues
            .get(id.as_str())
            .ok_or_else(|| StoreError::Store("updated issue vanished".to_string()))?;
        Ok(state.materialize(record))
    }

    fn delete(&self, id: &IssueId) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.issues.remove(id.as_str()).is_none() {
            return Err(StoreError::NotFound(format!("issue {id} not found")));
        }
        state
            .relations
            .retain(|relation| relation.source_id != *id && relation.target_id != *id);
        Ok(())
    }

    fn resolve_by_scope(
        &self,
        resource_type: &str,
        resource_name: &str,
        namespace: &str,
    ) -> Result<u64, StoreError> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let mut count = 0_u64;
        for record in state.issues.values_mut() {
            if record.state == IssueState::Active
                && record.namespace == namespace
                && record.scope.resource_type == resource_type
                && record.scope.resource_name == resource_name
            {
                record.state = IssueState::Resolved;
                record.resolved_at = Some(now);
                record.updated_at = now;
                count += 1;
            }
        }
        Ok(count)
    }

    fn add_related(&self, source_id: &IssueId, target_id: &IssueId) -> Result<(), StoreError> {
        if source_id == target_id {
            return Err(StoreError::Invalid("cannot relate an issue to itself".to_string()));
        }
        let mut state = self.lock()?;
        if !state.issues.contains_key(source_id.as_str())
            || !state.issues.contains_key(target_id.as_str())
        {
            return Err(StoreError::NotFound("one or both issues not found".to_string()));
        }
        let exists = state.relations.iter().any(|relation| {
            (relation.source_id == *source_id && relation.target_id == *target_id)
                || (relation.source_id == *target_id && relation.target_id == *source_id)
        });
        if exists {
            return Err(StoreError::Conflict("relationship already exists".to_string()));
        }
        state.relations.push(RelationRecord {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.clone(),
            target_id: target_id.clone(),
        });
        Ok(())
    }

    fn remove_related(&self, source_id: &IssueId, target_id: &IssueId) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let before = state.relations.len();
        state.relations.retain(|relation| {
            !((relation.source_id == *source_id && relation.target_id == *target_id)
                || (relation.source_id == *target_id && relation.target_id == *source_id))
        });
        if state.relations.len() == before {
            return Err(StoreError::NotFound("relationship not found".to_string()));
        }
        Ok(())
    }

    fn create_or_update(&self, candidate: &NewIssue) -> Result<Issue, StoreError> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let id = match state.duplicate_id(candidate) {
            Some(id) => {
                let patch = IssuePatch {
                    title: Some(candidate.title.clone()),
                    description: Some(candidate.description.clone()),
                    severity: Some(candidate.severity),
                    issue_type: Some(candidate.issue_type),
                    links: Some(candidate.links.clone()),
                    ..IssuePatch::default()
                };
                state.apply_patch(&id, &patch, now)?;
                id
            }
            None => state.insert(candidate, now),
        };
        let record = state
            .issues
            .get(id.as_str())
            .ok_or_else(|| StoreError::Store("written issue vanished".to_string()))?;
        Ok(state.materialize(record))
    }
}

/// Returns true when a record matches every provided filter.
fn matches_filters(record: &IssueRecord, filters: &IssueFilters) -> bool {
    if let Some(namespace) = &filters.namespace
        && record.namespace != *namespace
    {
        return false;
    }
    if let Some(severity) = filters.severity
        && record.severity != severity
    {
        return false;
    }
    if let Some(issue_type) = filters.issue_type
        && record.issue_type != issue_type
    {
        return false;
    }
    if let Some(state) = filters.state
        && record.state != state
    {
        return false;
    }
    if let Some(resource_type) = &filters.resource_type
        && record.scope.resource_type != *resource_type
    {
        return false;
    }
    if let Some(resource_name) = &filters.resource_name
        && record.scope.resource_name != *resource_name
    {
        return false;
    }
    if let Some(search) = &filters.search {
        let needle = search.to_lowercase();
        if !record.title.to_lowercase().contains(&needle)
            && !record.description.to_lowercase().contains(&needle)
        {
            return false;
        }
    }
    true
}
