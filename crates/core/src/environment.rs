//! Deployment environments of a project.

use crate::key::{EnvironmentKey, join_components};
use crate::project::Project;
use serde::{Deserialize, Serialize};

/// Project settings cached on an environment.
///
/// Copied from the owning project when the environment is created and
/// refreshed by the environments reconciliation pass when they drift.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSettings {
    pub output_sparse_status_metrics: bool,
    pub tags_regexp: String,
}

/// An environment, identified by (project name, environment name).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub project_name: String,
    pub name: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub external_url: String,
    #[serde(default)]
    pub available: bool,
    #[serde(flatten)]
    pub settings: EnvironmentSettings,
}

impl Environment {
    /// Create an environment of `project`, caching its current settings.
    pub fn new(project: &Project, name: impl Into<String>) -> Self {
        Self {
            project_name: project.name.clone(),
            name: name.into(),
            id: 0,
            external_url: String::new(),
            available: false,
            settings: project.environment_settings(),
        }
    }

    /// Canonical store key.
    pub fn key(&self) -> EnvironmentKey {
        Self::key_for(&self.project_name, &self.name)
    }

    /// Key of an environment from its identifying parts.
    pub fn key_for(project_name: &str, name: &str) -> EnvironmentKey {
        EnvironmentKey::from_raw(join_components([project_name, name]))
    }
}
