//! In-process store backend.
//!
//! One mutex guards every map, and each operation holds it for its whole
//! duration. Keepalive expiry is evaluated when a lease is read; expired
//! leases are dropped on the next keepalive write.
//!
//! This backend gives no cross-process guarantee. Use it only when a single
//! controller runs against the store.

use crate::error::{StoreError, StoreResult};
use crate::traits::{
    EnvironmentRepo, MAX_KEEPALIVE_TTL, MetricRepo, ProjectRepo, RefRepo, Store, TaskQueue,
};
use async_trait::async_trait;
use pipewarden_core::{
    Environment, EnvironmentKey, Metric, MetricKey, Project, ProjectKey, Ref, RefKey, TaskType,
    task_key,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
struct State {
    projects: HashMap<ProjectKey, Project>,
    environments: HashMap<EnvironmentKey, Environment>,
    refs: HashMap<RefKey, Ref>,
    metrics: HashMap<MetricKey, Metric>,
    /// Controller id -> lease expiry.
    keepalives: HashMap<String, Instant>,
    /// Task key -> claiming controller id.
    tasks: HashMap<String, String>,
    executed_tasks_count: u64,
}

impl State {
    fn keepalive_live(&self, controller_id: &str, now: Instant) -> bool {
        self.keepalives
            .get(controller_id)
            .is_some_and(|expires_at| *expires_at > now)
    }
}

fn poison_err<T>(_: PoisonError<T>) -> StoreError {
    StoreError::LockPoisoned
}

/// In-process store.
#[derive(Default)]
pub struct LocalStore {
    state: Mutex<State>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state.lock().map_err(poison_err)
    }
}

#[async_trait]
impl ProjectRepo for LocalStore {
    async fn set_project(&self, project: &Project) -> StoreResult<()> {
        self.lock()?.projects.insert(project.key(), project.clone());
        Ok(())
    }

    async fn del_project(&self, key: &ProjectKey) -> StoreResult<()> {
        self.lock()?.projects.remove(key);
        Ok(())
    }

    async fn get_project(&self, key: &ProjectKey) -> StoreResult<Option<Project>> {
        Ok(self.lock()?.projects.get(key).cloned())
    }

    async fn project_exists(&self, key: &ProjectKey) -> StoreResult<bool> {
        Ok(self.lock()?.projects.contains_key(key))
    }

    async fn projects(&self) -> StoreResult<HashMap<ProjectKey, Project>> {
        Ok(self.lock()?.projects.clone())
    }

    async fn projects_count(&self) -> StoreResult<u64> {
        Ok(self.lock()?.projects.len() as u64)
    }
}

#[async_trait]
impl EnvironmentRepo for LocalStore {
    async fn set_environment(&self, environment: &Environment) -> StoreResult<()> {
        self.lock()?
            .environments
            .insert(environment.key(), environment.clone());
        Ok(())
    }

    async fn del_environment(&self, key: &EnvironmentKey) -> StoreResult<()> {
        self.lock()?.environments.remove(key);
        Ok(())
    }

    async fn get_environment(&self, key: &EnvironmentKey) -> StoreResult<Option<Environment>> {
        Ok(self.lock()?.environments.get(key).cloned())
    }

    async fn environment_exists(&self, key: &EnvironmentKey) -> StoreResult<bool> {
        Ok(self.lock()?.environments.contains_key(key))
    }

    async fn environments(&self) -> StoreResult<HashMap<EnvironmentKey, Environment>> {
        Ok(self.lock()?.environments.clone())
    }

    async fn environments_count(&self) -> StoreResult<u64> {
        Ok(self.lock()?.environments.len() as u64)
    }
}

#[async_trait]
impl RefRepo for LocalStore {
    async fn set_ref(&self, reference: &Ref) -> StoreResult<()> {
        self.lock()?.refs.insert(reference.key(), reference.clone());
        Ok(())
    }

    async fn del_ref(&self, key: &RefKey) -> StoreResult<()> {
        self.lock()?.refs.remove(key);
        Ok(())
    }

    async fn get_ref(&self, key: &RefKey) -> StoreResult<Option<Ref>> {
        Ok(self.lock()?.refs.get(key).cloned())
    }

    async fn ref_exists(&self, key: &RefKey) -> StoreResult<bool> {
        Ok(self.lock()?.refs.contains_key(key))
    }

    async fn refs(&self) -> StoreResult<HashMap<RefKey, Ref>> {
        Ok(self.lock()?.refs.clone())
    }

    async fn refs_count(&self) -> StoreResult<u64> {
        Ok(self.lock()?.refs.len() as u64)
    }
}

#[async_trait]
impl MetricRepo for LocalStore {
    async fn set_metric(&self, metric: &Metric) -> StoreResult<()> {
        self.lock()?.metrics.insert(metric.key(), metric.clone());
        Ok(())
    }

    async fn del_metric(&self, key: &MetricKey) -> StoreResult<()> {
        self.lock()?.metrics.remove(key);
        Ok(())
    }

    async fn get_metric(&self, key: &MetricKey) -> StoreResult<Option<Metric>> {
        Ok(self.lock()?.metrics.get(key).cloned())
    }

    async fn metric_exists(&self, key: &MetricKey) -> StoreResult<bool> {
        Ok(self.lock()?.metrics.contains_key(key))
    }

    async fn metrics(&self) -> StoreResult<HashMap<MetricKey, Metric>> {
        Ok(self.lock()?.metrics.clone())
    }

    async fn metrics_count(&self) -> StoreResult<u64> {
        Ok(self.lock()?.metrics.len() as u64)
    }
}

#[async_trait]
impl TaskQueue for LocalStore {
    async fn set_keepalive(&self, controller_id: &str, ttl: Duration) -> StoreResult<bool> {
        let mut state = self.lock()?;
        let now = Instant::now();

        let created = !state.keepalive_live(controller_id, now);
        state.keepalives.retain(|_, expires_at| *expires_at > now);
        state
            .keepalives
            .insert(controller_id.to_string(), now + ttl.min(MAX_KEEPALIVE_TTL));
        drop(state);

        Ok(created)
    }

    async fn keepalive_exists(&self, controller_id: &str) -> StoreResult<bool> {
        Ok(self.lock()?.keepalive_live(controller_id, Instant::now()))
    }

    async fn queue_task(
        &self,
        task_type: TaskType,
        work_id: &str,
        controller_id: &str,
    ) -> StoreResult<bool> {
        let mut state = self.lock()?;
        let key = task_key(task_type, work_id);

        if let Some(owner) = state.tasks.get(&key) {
            if state.keepalive_live(owner, Instant::now()) {
                return Ok(false);
            }
            tracing::debug!(
                task = %key,
                previous_owner = %owner,
                controller_id = %controller_id,
                "Taking over task from expired controller"
            );
        }

        state.tasks.insert(key, controller_id.to_string());
        Ok(true)
    }

    async fn unqueue_task(&self, task_type: TaskType, work_id: &str) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.tasks.remove(&task_key(task_type, work_id));
        state.executed_tasks_count += 1;
        Ok(())
    }

    async fn currently_queued_tasks_count(&self) -> StoreResult<u64> {
        Ok(self.lock()?.tasks.len() as u64)
    }

    async fn executed_tasks_count(&self) -> StoreResult<u64> {
        Ok(self.lock()?.executed_tasks_count)
    }
}

#[async_trait]
impl Store for LocalStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }
}
