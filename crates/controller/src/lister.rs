//! Wildcard project discovery seam.
//!
//! The projects reconciliation pass keeps every stored project that some
//! configured wildcard still discovers upstream. Talking to the upstream API
//! is outside this crate; implement [`ProjectLister`] to plug a client in.

use async_trait::async_trait;
use pipewarden_core::{Project, Wildcard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ListerError {
    #[error("no upstream client is available to resolve wildcards")]
    Unavailable,

    #[error("upstream listing failed: {0}")]
    Upstream(String),
}

/// Lists the projects a wildcard currently matches upstream.
#[async_trait]
pub trait ProjectLister: Send + Sync {
    async fn list_projects(&self, wildcard: &Wildcard) -> Result<Vec<Project>, ListerError>;
}

/// Lister for deployments without an upstream client.
///
/// Every call fails, so a projects pass with wildcards configured aborts
/// rather than deleting projects it cannot vouch for.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineProjectLister;

#[async_trait]
impl ProjectLister for OfflineProjectLister {
    async fn list_projects(&self, _wildcard: &Wildcard) -> Result<Vec<Project>, ListerError> {
        Err(ListerError::Unavailable)
    }
}

/// Short human-readable description of a wildcard for logs and errors.
pub fn describe_wildcard(wildcard: &Wildcard) -> String {
    let owner = &wildcard.owner;
    match (owner.kind.is_empty(), owner.name.is_empty()) {
        (true, true) => format!("search={:?}", wildcard.search),
        _ => format!("{}/{} search={:?}", owner.kind, owner.name, wildcard.search),
    }
}
