// crates/kite-server/src/lib.rs
// ============================================================================
// Module: Kite Server Library
// Description: HTTP surface, webhook ingress, and namespace authorization.
// Purpose: Serve the Kite issue-tracking API over axum.
// Dependencies: axum, kite-config, kite-core, kite-store-sqlite, kube
// ============================================================================

//! ## Overview
//! The Kite server exposes the issue lifecycle engine over a versioned REST
//! API: issue CRUD with filtering, webhook ingress for pipeline events, and
//! health/version endpoints. Every namespace-scoped route passes a
//! Kubernetes-backed access check before its handler runs.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod authz;
pub mod error;
pub mod guard;
pub mod health;
pub mod issues;
pub mod middleware;
pub mod server;
pub mod webhooks;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use authz::AccessReviewAuthority;
pub use authz::AuthorityError;
pub use authz::NamespaceAuthority;
pub use authz::PassthroughAuthority;
pub use error::ApiError;
pub use server::AppState;
pub use server::ServerError;
pub use server::build_router;
pub use server::serve;
