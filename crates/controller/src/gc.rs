//! Reconciliation passes.
//!
//! Each pass holds the configuration read guard from start to finish, deletes
//! stored entities that are no longer justified and rewrites the project
//! settings cached on environments and refs when they drifted. Passes are
//! idempotent: re-running one on consistent state changes nothing.

use crate::controller::Controller;
use crate::error::GcError;
use crate::lister::describe_wildcard;
use pipewarden_core::error::compile_regexp;
use pipewarden_core::metric::{LABEL_ENVIRONMENT, LABEL_KIND, LABEL_PROJECT, LABEL_REF};
use pipewarden_core::{Environment, Metric, MetricKey, Project, Ref, TaskType};
use pipewarden_store::{EnvironmentRepo, MetricRepo, ProjectRepo, RefRepo};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

/// Outcome of a pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GcStats {
    pub deleted: u64,
    pub refreshed: u64,
}

/// The four reconciliation passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GcPass {
    Projects,
    Environments,
    Refs,
    Metrics,
}

impl GcPass {
    pub const ALL: [GcPass; 4] = [
        GcPass::Projects,
        GcPass::Environments,
        GcPass::Refs,
        GcPass::Metrics,
    ];

    /// Task type claimed in the queue before running this pass.
    pub fn task_type(&self) -> TaskType {
        match self {
            Self::Projects => TaskType::GarbageCollectProjects,
            Self::Environments => TaskType::GarbageCollectEnvironments,
            Self::Refs => TaskType::GarbageCollectRefs,
            Self::Metrics => TaskType::GarbageCollectMetrics,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Environments => "environments",
            Self::Refs => "refs",
            Self::Metrics => "metrics",
        }
    }

    pub async fn run(self, controller: &Controller) -> Result<GcStats, GcError> {
        match self {
            Self::Projects => controller.garbage_collect_projects().await,
            Self::Environments => controller.garbage_collect_environments().await,
            Self::Refs => controller.garbage_collect_refs().await,
            Self::Metrics => controller.garbage_collect_metrics().await,
        }
    }
}

impl fmt::Display for GcPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiled patterns, reused across the entities of one pass.
#[derive(Default)]
struct RegexCache(HashMap<String, Regex>);

impl RegexCache {
    fn is_match(&mut self, pattern: &str, haystack: &str) -> Result<bool, GcError> {
        if !self.0.contains_key(pattern) {
            let re = compile_regexp(pattern).map_err(GcError::InvalidRegexp)?;
            self.0.insert(pattern.to_string(), re);
        }
        Ok(self.0[pattern].is_match(haystack))
    }
}

impl Controller {
    /// Delete every stored project that is neither configured explicitly nor
    /// discovered by a configured wildcard.
    ///
    /// A wildcard listing failure aborts the pass before anything is deleted.
    pub async fn garbage_collect_projects(&self) -> Result<GcStats, GcError> {
        let current = self.config.read().await;
        let mut stale = self.store.projects().await?;

        for project in &current.config.projects {
            stale.remove(&project.key());
        }

        for wildcard in &current.config.wildcards {
            let found = self
                .lister
                .list_projects(wildcard)
                .await
                .map_err(|source| GcError::Listing {
                    wildcard: describe_wildcard(wildcard),
                    source,
                })?;
            for project in &found {
                stale.remove(&project.key());
            }
        }

        tracing::info!(projects_count = stale.len(), "Found projects to garbage collect");

        let mut stats = GcStats::default();
        for (key, project) in stale {
            self.store.del_project(&key).await?;
            tracing::info!(project_name = %project.name, "Deleted project from the store");
            stats.deleted += 1;
        }

        Ok(stats)
    }

    /// Delete environments whose project is gone or whose name no longer
    /// matches the project's environment pattern, and refresh the cached
    /// settings of the others.
    pub async fn garbage_collect_environments(&self) -> Result<GcStats, GcError> {
        let _current = self.config.read().await;
        let stored = self.store.environments().await?;
        let mut regexps = RegexCache::default();
        let mut stats = GcStats::default();

        for (key, mut environment) in stored {
            let project_key = Project::key_for(&environment.project_name);
            let Some(project) = self.store.get_project(&project_key).await? else {
                self.store.del_environment(&key).await?;
                tracing::info!(
                    project_name = %environment.project_name,
                    environment_name = %environment.name,
                    reason = "non-existent-project",
                    "Deleted environment from the store"
                );
                stats.deleted += 1;
                continue;
            };

            if !regexps.is_match(&project.pull.environments.name_regexp, &environment.name)? {
                self.store.del_environment(&key).await?;
                tracing::info!(
                    project_name = %environment.project_name,
                    environment_name = %environment.name,
                    reason = "environment-not-in-regexp",
                    "Deleted environment from the store"
                );
                stats.deleted += 1;
                continue;
            }

            let settings = project.environment_settings();
            if environment.settings != settings {
                environment.settings = settings;
                self.store.set_environment(&environment).await?;
                tracing::info!(
                    project_name = %environment.project_name,
                    environment_name = %environment.name,
                    "Updated environment, associated project configuration was not in sync"
                );
                stats.refreshed += 1;
            }
        }

        Ok(stats)
    }

    /// Same as the environments pass, against the project's ref pattern.
    ///
    /// Only the configured pattern is checked, not whether the ref still
    /// exists upstream.
    pub async fn garbage_collect_refs(&self) -> Result<GcStats, GcError> {
        let _current = self.config.read().await;
        let stored = self.store.refs().await?;
        let mut regexps = RegexCache::default();
        let mut stats = GcStats::default();

        for (key, mut reference) in stored {
            let project_key = Project::key_for(&reference.project_name);
            let Some(project) = self.store.get_project(&project_key).await? else {
                self.store.del_ref(&key).await?;
                tracing::info!(
                    project_name = %reference.project_name,
                    ref_name = %reference.name,
                    reason = "non-existent-project",
                    "Deleted ref from the store"
                );
                stats.deleted += 1;
                continue;
            };

            if !regexps.is_match(&project.pull.refs.regexp, &reference.name)? {
                self.store.del_ref(&key).await?;
                tracing::info!(
                    project_name = %reference.project_name,
                    ref_name = %reference.name,
                    reason = "ref-not-in-regexp",
                    "Deleted ref from the store"
                );
                stats.deleted += 1;
                continue;
            }

            let settings = project.ref_settings();
            if reference.settings != settings {
                reference.settings = settings;
                self.store.set_ref(&reference).await?;
                tracing::info!(
                    project_name = %reference.project_name,
                    ref_name = %reference.name,
                    "Updated ref, associated project configuration was not in sync"
                );
                stats.refreshed += 1;
            }
        }

        Ok(stats)
    }

    /// Delete metrics that cannot be attributed to a stored ref or
    /// environment, and ref metrics the ref's settings no longer produce.
    ///
    /// Refs and environments are listed once, before the metrics.
    pub async fn garbage_collect_metrics(&self) -> Result<GcStats, GcError> {
        let _current = self.config.read().await;
        let environments = self.store.environments().await?;
        let refs = self.store.refs().await?;
        let metrics = self.store.metrics().await?;
        let mut stats = GcStats::default();

        for (key, metric) in metrics {
            let ref_name = metric.label(LABEL_REF);
            let environment_name = metric.label(LABEL_ENVIRONMENT);

            let Some(project_name) = metric
                .label(LABEL_PROJECT)
                .filter(|_| ref_name.is_some() || environment_name.is_some())
            else {
                self.delete_metric(
                    &key,
                    &metric,
                    "project-or-ref-and-environment-label-undefined",
                )
                .await?;
                stats.deleted += 1;
                continue;
            };

            if let Some(ref_name) = ref_name {
                let kind = metric.label(LABEL_KIND).unwrap_or_default();
                let Some(reference) = refs.get(&Ref::key_for(project_name, kind, ref_name)) else {
                    self.delete_metric(&key, &metric, "non-existent-ref").await?;
                    stats.deleted += 1;
                    continue;
                };

                if metric.kind.is_job_kind() && !reference.settings.pull_pipeline_jobs_enabled {
                    self.delete_metric(&key, &metric, "jobs-metrics-disabled-on-project-ref")
                        .await?;
                    stats.deleted += 1;
                    continue;
                }

                if metric.kind.is_status_kind()
                    && reference.settings.output_sparse_status_metrics
                    && metric.value != 1.0
                {
                    self.delete_metric(
                        &key,
                        &metric,
                        "output-sparse-metrics-enabled-on-project-ref",
                    )
                    .await?;
                    stats.deleted += 1;
                    continue;
                }
            }

            if let Some(environment_name) = environment_name
                && !environments.contains_key(&Environment::key_for(project_name, environment_name))
            {
                self.delete_metric(&key, &metric, "non-existent-environment")
                    .await?;
                stats.deleted += 1;
            }
        }

        Ok(stats)
    }

    async fn delete_metric(
        &self,
        key: &MetricKey,
        metric: &Metric,
        reason: &'static str,
    ) -> Result<(), GcError> {
        self.store.del_metric(key).await?;
        tracing::info!(
            metric_kind = %metric.kind,
            metric_labels = ?metric.labels,
            reason,
            "Deleted metric from the store"
        );
        Ok(())
    }
}
