// crates/kite-server/src/authz.rs
// ============================================================================
// Module: Namespace Authority
// Description: Namespace access validation backends for the Kite server.
// Purpose: Enforce namespace scoping via Kubernetes access reviews.
// Dependencies: kube, k8s-openapi, async-trait, tokio
// ============================================================================

//! ## Overview
//! Namespace authority checks confirm that the caller may operate in a
//! namespace before any namespace-scoped request proceeds. The cluster
//! implementation asks the Kubernetes authorization API whether the service
//! account may `get` `pods` in the namespace, a documented proxy for
//! namespace visibility. When no cluster configuration is discoverable at
//! startup the server falls back to a pass-through authority; that choice is
//! logged and intended for local development only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::authorization::v1::ResourceAttributes;
use k8s_openapi::api::authorization::v1::SelfSubjectAccessReview;
use k8s_openapi::api::authorization::v1::SelfSubjectAccessReviewSpec;
use kube::Api;
use kube::Client;
use kube::api::PostParams;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound for a single access review round trip.
const ACCESS_REVIEW_TIMEOUT: Duration = Duration::from_secs(10);
/// Verb probed by the access review.
const ACCESS_REVIEW_VERB: &str = "get";
/// Resource probed by the access review.
const ACCESS_REVIEW_RESOURCE: &str = "pods";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Namespace authority failures.
///
/// # Invariants
/// - Variants are stable for HTTP status mapping (403 / 503).
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// The caller may not access the namespace.
    #[error("namespace denied: {0}")]
    Denied(String),
    /// The authority backend is unreachable.
    #[error("namespace authority unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// SECTION: Authority Interface
// ============================================================================

/// Namespace authority interface.
#[async_trait]
pub trait NamespaceAuthority: Send + Sync {
    /// Ensures the caller may access the namespace.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] when access is denied or the backend is
    /// unavailable.
    async fn ensure_access(&self, namespace: &str) -> Result<(), AuthorityError>;
}

/// Pass-through authority for deployments without cluster credentials.
///
/// # Invariants
/// - Always allows namespace access; selection is logged at startup.
pub struct PassthroughAuthority;

#[async_trait]
impl NamespaceAuthority for PassthroughAuthority {
    async fn ensure_access(&self, _namespace: &str) -> Result<(), AuthorityError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Access Review Authority
// ============================================================================

/// Kubernetes-backed namespace authority.
pub struct AccessReviewAuthority {
    /// Cluster client configured from the environment.
    client: Client,
    /// Per-review timeout.
    timeout: Duration,
}

impl AccessReviewAuthority {
    /// Connects using the default configuration resolution: in-cluster
    /// config, then `KUBECONFIG`, then the default user config.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::Unavailable`] when no configuration can be
    /// discovered.
    pub async fn connect() -> Result<Self, AuthorityError> {
        let client = Client::try_default()
            .await
            .map_err(|err| AuthorityError::Unavailable(err.to_string()))?;
        Ok(Self {
            client,
            timeout: ACCESS_REVIEW_TIMEOUT,
        })
    }

    /// Builds an authority over an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            timeout: ACCESS_REVIEW_TIMEOUT,
        }
    }
}

#[async_trait]
impl NamespaceAuthority for AccessReviewAuthority {
    async fn ensure_access(&self, namespace: &str) -> Result<(), AuthorityError> {
        let review = SelfSubjectAccessReview {
            spec: SelfSubjectAccessReviewSpec {
                resource_attributes: Some(ResourceAttributes {
                    namespace: Some(namespace.to_string()),
                    verb: Some(ACCESS_REVIEW_VERB.to_string()),
                    resource: Some(ACCESS_REVIEW_RESOURCE.to_string()),
                    ..ResourceAttributes::default()
                }),
                ..SelfSubjectAccessReviewSpec::default()
            },
            ..SelfSubjectAccessReview::default()
        };
        let api: Api<SelfSubjectAccessReview> = Api::all(self.client.clone());
        let created = tokio::time::timeout(self.timeout, api.create(&PostParams::default(), &review))
            .await
            .map_err(|_| AuthorityError::Unavailable("access review timed out".to_string()))?
            .map_err(|err| AuthorityError::Unavailable(err.to_string()))?;
        let allowed = created.status.is_some_and(|status| status.allowed);
        if allowed {
            Ok(())
        } else {
            Err(AuthorityError::Denied(format!("access denied to namespace {namespace}")))
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::NamespaceAuthority;
    use super::PassthroughAuthority;

    #[tokio::test]
    async fn passthrough_allows_any_namespace() {
        let authority = PassthroughAuthority;
        authority.ensure_access("team-a").await.unwrap();
        authority.ensure_access("kube-system").await.unwrap();
    }
}
