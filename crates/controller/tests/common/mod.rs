//! Common test utilities for the controller.

pub mod stores;

use async_trait::async_trait;
use pipewarden_controller::{
    ConfigHandle, Controller, ListerError, OfflineProjectLister, ProjectLister,
};
use pipewarden_core::{Config, Project, Wildcard};
use pipewarden_store::{LocalStore, Store};
use std::collections::HashMap;
use std::sync::Arc;

#[allow(unused_imports)]
pub use stores::*;

/// Lister answering from a fixed table keyed by wildcard search string.
#[allow(dead_code)]
#[derive(Default)]
pub struct StaticProjectLister {
    found: HashMap<String, Vec<Project>>,
}

#[allow(dead_code)]
impl StaticProjectLister {
    pub fn with(mut self, search: &str, names: &[&str]) -> Self {
        self.found.insert(
            search.to_string(),
            names.iter().map(|name| Project::new(*name)).collect(),
        );
        self
    }
}

#[async_trait]
impl ProjectLister for StaticProjectLister {
    async fn list_projects(&self, wildcard: &Wildcard) -> Result<Vec<Project>, ListerError> {
        self.found
            .get(&wildcard.search)
            .cloned()
            .ok_or_else(|| ListerError::Upstream(format!("unknown search {:?}", wildcard.search)))
    }
}

/// Controller over a fresh in-process store, without wildcard support.
#[allow(dead_code)]
pub fn test_controller(config: Config) -> Controller {
    test_controller_with(config, Arc::new(LocalStore::new()), Arc::new(OfflineProjectLister))
}

#[allow(dead_code)]
pub fn test_controller_with(
    config: Config,
    store: Arc<dyn Store>,
    lister: Arc<dyn ProjectLister>,
) -> Controller {
    Controller::new(store, ConfigHandle::new(config), lister)
}

/// Configuration listing the given projects explicitly.
#[allow(dead_code)]
pub fn config_with_projects(projects: &[Project]) -> Config {
    Config {
        projects: projects.to_vec(),
        ..Config::default()
    }
}

/// Wildcard matching on `search` only.
#[allow(dead_code)]
pub fn wildcard(search: &str) -> Wildcard {
    Wildcard {
        search: search.to_string(),
        ..Wildcard::default()
    }
}
