//! Store abstraction and backends for pipewarden.
//!
//! This crate provides the shared state every controller works against:
//! - Per-entity repositories for projects, environments, refs and metrics
//! - Controller keepalive leases
//! - The task queue used to deduplicate work across controllers
//!
//! Two backends are provided. [`LocalStore`] keeps everything in process and
//! suits a single controller; [`RedisStore`] is shared by any number of them.

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{LocalStore, RedisStore};
pub use error::{StoreError, StoreResult};
pub use traits::{
    EnvironmentRepo, MAX_KEEPALIVE_TTL, MetricRepo, ProjectRepo, RefRepo, Store, TaskQueue,
};

use pipewarden_core::StoreConfig;
use std::sync::Arc;

/// Create a store from configuration.
pub async fn from_config(config: &StoreConfig) -> StoreResult<Arc<dyn Store>> {
    config.validate().map_err(StoreError::Config)?;

    match config {
        StoreConfig::Local => {
            tracing::info!("Using in-process store");
            Ok(Arc::new(LocalStore::new()) as Arc<dyn Store>)
        }
        StoreConfig::Redis { url } => {
            tracing::info!("Connecting to Redis store");
            let store = RedisStore::connect(url).await?;
            Ok(Arc::new(store) as Arc<dyn Store>)
        }
    }
}
