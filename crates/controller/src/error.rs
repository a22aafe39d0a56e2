//! Controller error types.

use crate::lister::ListerError;
use pipewarden_store::StoreError;
use thiserror::Error;

/// Errors aborting a reconciliation pass.
///
/// The pass stops at the first error. Entities already deleted or refreshed
/// earlier in the pass stay that way.
#[derive(Debug, Error)]
pub enum GcError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("listing projects for wildcard {wildcard} failed: {source}")]
    Listing {
        wildcard: String,
        #[source]
        source: ListerError,
    },

    #[error("{0}")]
    InvalidRegexp(pipewarden_core::Error),
}

/// Errors loading or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(Box<figment::Error>),

    #[error("{0}")]
    Invalid(#[from] pipewarden_core::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}
