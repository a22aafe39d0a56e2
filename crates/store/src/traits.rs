//! Store trait definitions.
//!
//! Each entity type gets its own repository trait with the same six
//! operations. [`Store`] combines them with the task queue so callers only
//! ever hold an `Arc<dyn Store>` and never a concrete backend.

use crate::error::StoreResult;
use async_trait::async_trait;
use pipewarden_core::{
    Environment, EnvironmentKey, Metric, MetricKey, Project, ProjectKey, Ref, RefKey, TaskType,
};
use std::collections::HashMap;
use std::time::Duration;

/// Longest keepalive lease a backend grants. Longer TTLs are clamped.
pub const MAX_KEEPALIVE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Repository for projects.
#[async_trait]
pub trait ProjectRepo: Send + Sync {
    /// Insert or overwrite a project under its key.
    async fn set_project(&self, project: &Project) -> StoreResult<()>;

    /// Delete a project. Deleting a missing key is not an error.
    async fn del_project(&self, key: &ProjectKey) -> StoreResult<()>;

    /// Get a project by key, `None` when absent.
    async fn get_project(&self, key: &ProjectKey) -> StoreResult<Option<Project>>;

    async fn project_exists(&self, key: &ProjectKey) -> StoreResult<bool>;

    /// All stored projects.
    async fn projects(&self) -> StoreResult<HashMap<ProjectKey, Project>>;

    async fn projects_count(&self) -> StoreResult<u64>;
}

/// Repository for environments.
#[async_trait]
pub trait EnvironmentRepo: Send + Sync {
    async fn set_environment(&self, environment: &Environment) -> StoreResult<()>;

    async fn del_environment(&self, key: &EnvironmentKey) -> StoreResult<()>;

    async fn get_environment(&self, key: &EnvironmentKey) -> StoreResult<Option<Environment>>;

    async fn environment_exists(&self, key: &EnvironmentKey) -> StoreResult<bool>;

    async fn environments(&self) -> StoreResult<HashMap<EnvironmentKey, Environment>>;

    async fn environments_count(&self) -> StoreResult<u64>;
}

/// Repository for refs.
#[async_trait]
pub trait RefRepo: Send + Sync {
    async fn set_ref(&self, reference: &Ref) -> StoreResult<()>;

    async fn del_ref(&self, key: &RefKey) -> StoreResult<()>;

    async fn get_ref(&self, key: &RefKey) -> StoreResult<Option<Ref>>;

    async fn ref_exists(&self, key: &RefKey) -> StoreResult<bool>;

    async fn refs(&self) -> StoreResult<HashMap<RefKey, Ref>>;

    async fn refs_count(&self) -> StoreResult<u64>;
}

/// Repository for metrics.
#[async_trait]
pub trait MetricRepo: Send + Sync {
    async fn set_metric(&self, metric: &Metric) -> StoreResult<()>;

    async fn del_metric(&self, key: &MetricKey) -> StoreResult<()>;

    async fn get_metric(&self, key: &MetricKey) -> StoreResult<Option<Metric>>;

    async fn metric_exists(&self, key: &MetricKey) -> StoreResult<bool>;

    async fn metrics(&self) -> StoreResult<HashMap<MetricKey, Metric>>;

    async fn metrics_count(&self) -> StoreResult<u64>;
}

/// Controller leases and the shared task queue.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Create or renew the keepalive lease of `controller_id` for `ttl`.
    ///
    /// Returns `true` only when the lease went from absent (or expired) to
    /// present. Two controllers racing to create the same lease never both
    /// get `true`. `ttl` is clamped to [`MAX_KEEPALIVE_TTL`].
    async fn set_keepalive(&self, controller_id: &str, ttl: Duration) -> StoreResult<bool>;

    /// Whether the keepalive lease of `controller_id` is currently live.
    async fn keepalive_exists(&self, controller_id: &str) -> StoreResult<bool>;

    /// Claim `(task_type, work_id)` for `controller_id`.
    ///
    /// Atomic check-and-set: the claim succeeds when no entry exists, or when
    /// the recorded owner's keepalive has expired (the abandoned claim is
    /// stolen). It fails, without writing, while the recorded owner is live.
    async fn queue_task(
        &self,
        task_type: TaskType,
        work_id: &str,
        controller_id: &str,
    ) -> StoreResult<bool>;

    /// Release a claim and increment the executed-tasks counter.
    ///
    /// Safe on an entry that is already gone; the counter is still bumped.
    async fn unqueue_task(&self, task_type: TaskType, work_id: &str) -> StoreResult<()>;

    /// Number of queue entries currently present.
    async fn currently_queued_tasks_count(&self) -> StoreResult<u64>;

    /// Monotonic number of unqueued tasks.
    async fn executed_tasks_count(&self) -> StoreResult<u64>;
}

/// Combined store trait.
#[async_trait]
pub trait Store:
    ProjectRepo + EnvironmentRepo + RefRepo + MetricRepo + TaskQueue + Send + Sync
{
    /// Get the name of this backend, for logging.
    fn backend_name(&self) -> &'static str;

    /// Verify backend connectivity.
    ///
    /// The default implementation returns Ok(()), suitable for backends that
    /// don't require connectivity verification (e.g., in-process).
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
