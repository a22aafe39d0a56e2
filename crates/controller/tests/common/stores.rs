//! Store wrappers for failure-path tests.

use async_trait::async_trait;
use pipewarden_core::{
    Environment, EnvironmentKey, Metric, MetricKey, Project, ProjectKey, Ref, RefKey, TaskType,
};
use pipewarden_store::{
    EnvironmentRepo, LocalStore, MetricRepo, ProjectRepo, RefRepo, Store, StoreError,
    StoreResult, TaskQueue,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn unavailable() -> StoreError {
    StoreError::Config("store unavailable".to_string())
}

/// In-process store whose task queue and metric reads always fail.
///
/// Entity writes go through so tests can seed state. Metric deletes fail
/// once the budget given to [`FlakyStore::allowing_metric_deletes`] is spent.
#[allow(dead_code)]
#[derive(Default)]
pub struct FlakyStore {
    inner: LocalStore,
    metric_deletes_left: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allowing_metric_deletes(deletes: usize) -> Self {
        Self {
            inner: LocalStore::new(),
            metric_deletes_left: AtomicUsize::new(deletes),
        }
    }
}

#[async_trait]
impl ProjectRepo for FlakyStore {
    async fn set_project(&self, project: &Project) -> StoreResult<()> {
        self.inner.set_project(project).await
    }

    async fn del_project(&self, key: &ProjectKey) -> StoreResult<()> {
        self.inner.del_project(key).await
    }

    async fn get_project(&self, key: &ProjectKey) -> StoreResult<Option<Project>> {
        self.inner.get_project(key).await
    }

    async fn project_exists(&self, key: &ProjectKey) -> StoreResult<bool> {
        self.inner.project_exists(key).await
    }

    async fn projects(&self) -> StoreResult<HashMap<ProjectKey, Project>> {
        self.inner.projects().await
    }

    async fn projects_count(&self) -> StoreResult<u64> {
        self.inner.projects_count().await
    }
}

#[async_trait]
impl EnvironmentRepo for FlakyStore {
    async fn set_environment(&self, environment: &Environment) -> StoreResult<()> {
        self.inner.set_environment(environment).await
    }

    async fn del_environment(&self, key: &EnvironmentKey) -> StoreResult<()> {
        self.inner.del_environment(key).await
    }

    async fn get_environment(&self, key: &EnvironmentKey) -> StoreResult<Option<Environment>> {
        self.inner.get_environment(key).await
    }

    async fn environment_exists(&self, key: &EnvironmentKey) -> StoreResult<bool> {
        self.inner.environment_exists(key).await
    }

    async fn environments(&self) -> StoreResult<HashMap<EnvironmentKey, Environment>> {
        self.inner.environments().await
    }

    async fn environments_count(&self) -> StoreResult<u64> {
        self.inner.environments_count().await
    }
}

#[async_trait]
impl RefRepo for FlakyStore {
    async fn set_ref(&self, reference: &Ref) -> StoreResult<()> {
        self.inner.set_ref(reference).await
    }

    async fn del_ref(&self, key: &RefKey) -> StoreResult<()> {
        self.inner.del_ref(key).await
    }

    async fn get_ref(&self, key: &RefKey) -> StoreResult<Option<Ref>> {
        self.inner.get_ref(key).await
    }

    async fn ref_exists(&self, key: &RefKey) -> StoreResult<bool> {
        self.inner.ref_exists(key).await
    }

    async fn refs(&self) -> StoreResult<HashMap<RefKey, Ref>> {
        self.inner.refs().await
    }

    async fn refs_count(&self) -> StoreResult<u64> {
        self.inner.refs_count().await
    }
}

#[async_trait]
impl MetricRepo for FlakyStore {
    async fn set_metric(&self, metric: &Metric) -> StoreResult<()> {
        self.inner.set_metric(metric).await
    }

    async fn del_metric(&self, key: &MetricKey) -> StoreResult<()> {
        let spent = self
            .metric_deletes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        match spent {
            Ok(_) => self.inner.del_metric(key).await,
            Err(_) => Err(unavailable()),
        }
    }

    async fn get_metric(&self, _key: &MetricKey) -> StoreResult<Option<Metric>> {
        Err(unavailable())
    }

    async fn metric_exists(&self, key: &MetricKey) -> StoreResult<bool> {
        self.inner.metric_exists(key).await
    }

    async fn metrics(&self) -> StoreResult<HashMap<MetricKey, Metric>> {
        self.inner.metrics().await
    }

    async fn metrics_count(&self) -> StoreResult<u64> {
        self.inner.metrics_count().await
    }
}

#[async_trait]
impl TaskQueue for FlakyStore {
    async fn set_keepalive(&self, controller_id: &str, ttl: Duration) -> StoreResult<bool> {
        self.inner.set_keepalive(controller_id, ttl).await
    }

    async fn keepalive_exists(&self, controller_id: &str) -> StoreResult<bool> {
        self.inner.keepalive_exists(controller_id).await
    }

    async fn queue_task(
        &self,
        _task_type: TaskType,
        _work_id: &str,
        _controller_id: &str,
    ) -> StoreResult<bool> {
        Err(unavailable())
    }

    async fn unqueue_task(&self, _task_type: TaskType, _work_id: &str) -> StoreResult<()> {
        Err(unavailable())
    }

    async fn currently_queued_tasks_count(&self) -> StoreResult<u64> {
        self.inner.currently_queued_tasks_count().await
    }

    async fn executed_tasks_count(&self) -> StoreResult<u64> {
        self.inner.executed_tasks_count().await
    }
}

#[async_trait]
impl Store for FlakyStore {
    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}
