//! Projects and the pull settings derived from their configuration.

use crate::config::ProjectPull;
use crate::environment::EnvironmentSettings;
use crate::key::{ProjectKey, encode_component};
use crate::refs::RefSettings;
use serde::{Deserialize, Serialize};

/// A project, identified by its full path (`namespace/name`).
///
/// The pull configuration carried here is the authoritative source for the
/// settings cached on environments and refs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Full path of the project.
    pub name: String,
    /// What to pull for this project.
    #[serde(default)]
    pub pull: ProjectPull,
    /// Only keep the currently-true status row per entity.
    #[serde(default = "default_output_sparse_status_metrics")]
    pub output_sparse_status_metrics: bool,
}

pub(crate) fn default_output_sparse_status_metrics() -> bool {
    true
}

impl Project {
    /// Create a project with default pull settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pull: ProjectPull::default(),
            output_sparse_status_metrics: default_output_sparse_status_metrics(),
        }
    }

    /// Canonical store key.
    pub fn key(&self) -> ProjectKey {
        Self::key_for(&self.name)
    }

    /// Key of the project named `name`, without building the project.
    pub fn key_for(name: &str) -> ProjectKey {
        ProjectKey::from_raw(encode_component(name))
    }

    /// Settings an environment of this project should currently cache.
    pub fn environment_settings(&self) -> EnvironmentSettings {
        EnvironmentSettings {
            output_sparse_status_metrics: self.output_sparse_status_metrics,
            tags_regexp: self.pull.environments.tags_regexp.clone(),
        }
    }

    /// Settings a ref of this project should currently cache.
    pub fn ref_settings(&self) -> RefSettings {
        RefSettings {
            output_sparse_status_metrics: self.output_sparse_status_metrics,
            pull_pipeline_jobs_enabled: self.pull.pipeline.jobs.enabled,
            pull_pipeline_variables_enabled: self.pull.pipeline.variables.enabled,
            pull_pipeline_variables_regexp: self.pull.pipeline.variables.regexp.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_depends_only_on_name() {
        let mut a = Project::new("foo/bar");
        let b = Project::new("foo/bar");
        a.output_sparse_status_metrics = false;
        a.pull.pipeline.jobs.enabled = true;
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), Project::key_for("foo/bar"));
        assert_ne!(a.key(), Project::new("foo/baz").key());
    }

    #[test]
    fn derived_settings_follow_pull_config() {
        let mut p = Project::new("foo/bar");
        p.output_sparse_status_metrics = false;
        p.pull.environments.tags_regexp = "^v".to_string();
        p.pull.pipeline.jobs.enabled = true;
        p.pull.pipeline.variables.enabled = true;
        p.pull.pipeline.variables.regexp = "^CI_".to_string();

        let env = p.environment_settings();
        assert!(!env.output_sparse_status_metrics);
        assert_eq!(env.tags_regexp, "^v");

        let r = p.ref_settings();
        assert!(!r.output_sparse_status_metrics);
        assert!(r.pull_pipeline_jobs_enabled);
        assert!(r.pull_pipeline_variables_enabled);
        assert_eq!(r.pull_pipeline_variables_regexp, "^CI_");
    }

    #[test]
    fn deserialize_applies_defaults() {
        let p: Project = serde_json::from_str(r#"{"name":"foo/bar"}"#).unwrap();
        assert_eq!(p, Project::new("foo/bar"));
        assert!(p.output_sparse_status_metrics);
    }
}
