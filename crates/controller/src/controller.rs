//! Controller state shared by passes, accessors and scheduling loops.

use crate::config::ConfigHandle;
use crate::lister::ProjectLister;
use pipewarden_store::Store;
use std::sync::Arc;
use uuid::Uuid;

/// One running controller instance.
///
/// Holds everything a reconciliation pass or task needs: the store, the
/// configuration handle and the wildcard lister. The identity is used for
/// the keepalive lease and recorded on every task this controller claims.
pub struct Controller {
    pub(crate) id: String,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) config: ConfigHandle,
    pub(crate) lister: Arc<dyn ProjectLister>,
}

impl Controller {
    /// Create a controller with a fresh random identity.
    pub fn new(
        store: Arc<dyn Store>,
        config: ConfigHandle,
        lister: Arc<dyn ProjectLister>,
    ) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), store, config, lister)
    }

    pub fn with_id(
        id: impl Into<String>,
        store: Arc<dyn Store>,
        config: ConfigHandle,
        lister: Arc<dyn ProjectLister>,
    ) -> Self {
        Self {
            id: id.into(),
            store,
            config,
            lister,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }
}
