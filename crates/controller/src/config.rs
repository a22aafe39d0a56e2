//! Configuration loading and the shared, versioned configuration handle.

use crate::error::ConfigError;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use pipewarden_core::Config;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};

/// Prefix of environment variables overriding file configuration.
pub const ENV_PREFIX: &str = "PIPEWARDEN_";

/// Build the configuration sources: the TOML file at `path` when it exists,
/// overridden by `PIPEWARDEN_*` environment variables (`__` separates
/// nesting levels, e.g. `PIPEWARDEN_STORE__URL`).
pub fn figment(path: &Path) -> Figment {
    let mut figment = Figment::new();
    if path.exists() {
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!(config_path = %path.display(), "No config file found");
    }
    figment.merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["config"]))
}

/// Load and validate configuration.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment(path).extract()?;
    config.validate()?;
    Ok(config)
}

/// A configuration snapshot and the version it was published under.
#[derive(Debug)]
pub struct VersionedConfig {
    pub version: u64,
    pub config: Config,
}

/// Process-wide configuration guarded by a reader/writer lock.
///
/// Reconciliation passes and metric accessors hold a read guard for their
/// whole duration. [`ConfigHandle::reload`] takes the write guard, so it
/// waits for in-flight readers and a pass never observes two snapshots.
#[derive(Clone, Debug)]
pub struct ConfigHandle {
    inner: Arc<RwLock<VersionedConfig>>,
}

impl ConfigHandle {
    /// Publish `config` as version 1.
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(VersionedConfig { version: 1, config })),
        }
    }

    /// Acquire the read guard.
    pub async fn read(&self) -> RwLockReadGuard<'_, VersionedConfig> {
        self.inner.read().await
    }

    pub async fn version(&self) -> u64 {
        self.inner.read().await.version
    }

    /// Validate `config` and swap it in, returning the new version.
    ///
    /// An invalid configuration is rejected without touching the current one.
    pub async fn reload(&self, config: Config) -> Result<u64, ConfigError> {
        config.validate()?;

        let mut current = self.inner.write().await;
        current.config = config;
        current.version += 1;

        tracing::info!(version = current.version, "Configuration reloaded");
        Ok(current.version)
    }
}
