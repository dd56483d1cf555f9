// crates/kite-core/src/lib.rs
// ============================================================================
// Module: Kite Core Library
// Description: Domain model, store contract, and lifecycle engine for Kite.
// Purpose: Provide the issue-tracking core shared by stores and the server.
// Dependencies: chrono, serde, thiserror, tracing, uuid
// ============================================================================

//! ## Overview
//! Kite tracks CI/CD infrastructure issues scoped to Kubernetes namespaces.
//! This crate holds the domain entities, the request payloads, the
//! [`IssueStore`] persistence seam with its in-memory reference
//! implementation, and the [`IssueService`] lifecycle engine that
//! deduplicates failure events and resolves issues in bulk.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod issue;
pub mod memory;
pub mod request;
pub mod service;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use issue::Issue;
pub use issue::IssueId;
pub use issue::IssueRelation;
pub use issue::IssueScope;
pub use issue::IssueState;
pub use issue::IssueType;
pub use issue::Link;
pub use issue::RelatedIssueSummary;
pub use issue::Severity;
pub use memory::InMemoryIssueStore;
pub use request::DEFAULT_PAGE_LIMIT;
pub use request::IssueFilters;
pub use request::IssuePage;
pub use request::IssuePatch;
pub use request::MAX_PAGE_LIMIT;
pub use request::NewIssue;
pub use request::NewLink;
pub use request::NewScope;
pub use service::IssueService;
pub use service::ServiceError;
pub use store::IssueStore;
pub use store::StoreError;
