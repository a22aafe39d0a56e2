//! Configuration types shared across crates.

use crate::error::compile_regexp;
use crate::project::{Project, default_output_sparse_status_metrics};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Store backend configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-process store. Only valid for a single controller.
    #[default]
    Local,
    /// Redis store shared by every controller.
    Redis {
        /// Connection URL (e.g., "redis://127.0.0.1:6379/0").
        url: String,
    },
}

impl StoreConfig {
    /// Validate store configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StoreConfig::Local => Ok(()),
            StoreConfig::Redis { url } if url.trim().is_empty() => {
                Err("store.url cannot be empty for the redis store".to_string())
            }
            StoreConfig::Redis { .. } => Ok(()),
        }
    }
}

/// Controller (process) configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Lifetime of this controller's keepalive lease, in seconds.
    #[serde(default = "default_keepalive_ttl_secs")]
    pub keepalive_ttl_secs: u64,
    /// Interval between keepalive renewals, in seconds.
    /// Must be shorter than the TTL or the lease lapses between renewals.
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
}

fn default_keepalive_ttl_secs() -> u64 {
    10
}

fn default_keepalive_interval_secs() -> u64 {
    5
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            keepalive_ttl_secs: default_keepalive_ttl_secs(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
        }
    }
}

impl ControllerConfig {
    pub fn keepalive_ttl(&self) -> Duration {
        Duration::from_secs(self.keepalive_ttl_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    /// Validate controller configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.keepalive_interval_secs == 0 {
            return Err("controller.keepalive_interval_secs cannot be 0".to_string());
        }
        if self.keepalive_ttl_secs <= self.keepalive_interval_secs {
            return Err(format!(
                "controller.keepalive_ttl_secs ({}) must be greater than \
                 controller.keepalive_interval_secs ({})",
                self.keepalive_ttl_secs, self.keepalive_interval_secs
            ));
        }
        Ok(())
    }
}

/// Schedule of one reconciliation pass.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GcSchedule {
    /// Run once when the controller starts.
    #[serde(default)]
    pub on_init: bool,
    /// Run periodically.
    #[serde(default = "default_scheduled")]
    pub scheduled: bool,
    /// Interval between scheduled runs, in seconds.
    pub interval_secs: u64,
}

fn default_scheduled() -> bool {
    true
}

impl GcSchedule {
    fn every(interval_secs: u64) -> Self {
        Self {
            on_init: false,
            scheduled: default_scheduled(),
            interval_secs,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Reconciliation schedules, one per pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GarbageCollectConfig {
    #[serde(default = "default_gc_projects")]
    pub projects: GcSchedule,
    #[serde(default = "default_gc_environments")]
    pub environments: GcSchedule,
    #[serde(default = "default_gc_refs")]
    pub refs: GcSchedule,
    #[serde(default = "default_gc_metrics")]
    pub metrics: GcSchedule,
}

fn default_gc_projects() -> GcSchedule {
    GcSchedule::every(14400) // 4 hours
}

fn default_gc_environments() -> GcSchedule {
    GcSchedule::every(14400) // 4 hours
}

fn default_gc_refs() -> GcSchedule {
    GcSchedule::every(1800) // 30 minutes
}

fn default_gc_metrics() -> GcSchedule {
    GcSchedule::every(600) // 10 minutes
}

impl Default for GarbageCollectConfig {
    fn default() -> Self {
        Self {
            projects: default_gc_projects(),
            environments: default_gc_environments(),
            refs: default_gc_refs(),
            metrics: default_gc_metrics(),
        }
    }
}

impl GarbageCollectConfig {
    /// Validate schedules (a zero interval would make `tokio::time::interval` panic).
    pub fn validate(&self) -> Result<(), String> {
        for (name, schedule) in [
            ("projects", &self.projects),
            ("environments", &self.environments),
            ("refs", &self.refs),
            ("metrics", &self.metrics),
        ] {
            if schedule.scheduled && schedule.interval_secs == 0 {
                return Err(format!(
                    "garbage_collect.{name}.interval_secs cannot be 0 when scheduled"
                ));
            }
        }
        Ok(())
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Which environments to pull.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectPullEnvironments {
    #[serde(default)]
    pub enabled: bool,
    /// Environments whose name does not match are not pulled (and get collected).
    #[serde(default = "default_match_all")]
    pub name_regexp: String,
    /// Tags considered when resolving deployments.
    #[serde(default = "default_match_all")]
    pub tags_regexp: String,
}

impl Default for ProjectPullEnvironments {
    fn default() -> Self {
        Self {
            enabled: false,
            name_regexp: default_match_all(),
            tags_regexp: default_match_all(),
        }
    }
}

/// Which refs to pull.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectPullRefs {
    /// Refs whose name does not match are not pulled (and get collected).
    #[serde(default = "default_refs_regexp")]
    pub regexp: String,
}

fn default_refs_regexp() -> String {
    "^(?:main|master)$".to_string()
}

impl Default for ProjectPullRefs {
    fn default() -> Self {
        Self {
            regexp: default_refs_regexp(),
        }
    }
}

/// Pipeline jobs pulling.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectPullPipelineJobs {
    #[serde(default)]
    pub enabled: bool,
}

/// Pipeline variables pulling.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectPullPipelineVariables {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_match_all")]
    pub regexp: String,
}

impl Default for ProjectPullPipelineVariables {
    fn default() -> Self {
        Self {
            enabled: false,
            regexp: default_match_all(),
        }
    }
}

/// Pipeline pulling.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectPullPipeline {
    #[serde(default)]
    pub jobs: ProjectPullPipelineJobs,
    #[serde(default)]
    pub variables: ProjectPullPipelineVariables,
}

/// Everything pulled for a project.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectPull {
    #[serde(default)]
    pub environments: ProjectPullEnvironments,
    #[serde(default)]
    pub refs: ProjectPullRefs,
    #[serde(default)]
    pub pipeline: ProjectPullPipeline,
}

fn default_match_all() -> String {
    ".*".to_string()
}

impl ProjectPull {
    /// Compile every pattern once to reject invalid configuration early.
    pub fn validate(&self) -> crate::Result<()> {
        compile_regexp(&self.environments.name_regexp)?;
        compile_regexp(&self.environments.tags_regexp)?;
        compile_regexp(&self.refs.regexp)?;
        compile_regexp(&self.pipeline.variables.regexp)?;
        Ok(())
    }
}

/// Owner scope of a wildcard search.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WildcardOwner {
    #[serde(default)]
    pub name: String,
    /// "user" or "group".
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub include_subgroups: bool,
}

/// A project discovery rule.
///
/// Every project found through a wildcard inherits its pull settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wildcard {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub owner: WildcardOwner,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub pull: ProjectPull,
    #[serde(default = "default_output_sparse_status_metrics")]
    pub output_sparse_status_metrics: bool,
}

impl Default for Wildcard {
    fn default() -> Self {
        Self {
            search: String::new(),
            owner: WildcardOwner::default(),
            archived: false,
            pull: ProjectPull::default(),
            output_sparse_status_metrics: default_output_sparse_status_metrics(),
        }
    }
}

impl Wildcard {
    /// Project found through this wildcard, carrying the wildcard's settings.
    pub fn project(&self, name: impl Into<String>) -> Project {
        Project {
            name: name.into(),
            pull: self.pull.clone(),
            output_sparse_status_metrics: self.output_sparse_status_metrics,
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub garbage_collect: GarbageCollectConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// Explicitly configured projects.
    #[serde(default)]
    pub projects: Vec<Project>,
    /// Project discovery rules.
    #[serde(default)]
    pub wildcards: Vec<Wildcard>,
}

impl Config {
    /// Validate the whole configuration.
    pub fn validate(&self) -> crate::Result<()> {
        self.store
            .validate()
            .map_err(crate::Error::InvalidConfig)?;
        self.controller
            .validate()
            .map_err(crate::Error::InvalidConfig)?;
        self.garbage_collect
            .validate()
            .map_err(crate::Error::InvalidConfig)?;

        for project in &self.projects {
            if project.name.is_empty() {
                return Err(crate::Error::InvalidConfig(
                    "projects[].name cannot be empty".to_string(),
                ));
            }
            project.pull.validate()?;
        }
        for wildcard in &self.wildcards {
            wildcard.pull.validate()?;
        }
        Ok(())
    }
}
