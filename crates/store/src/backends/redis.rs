//! Redis store backend.
//!
//! Entities are stored as JSON strings under `<prefix>:<canonical key>`,
//! with one prefix per entity type. Controller leases live under
//! `keepalive:<controller id>` with a TTL, and task claims under
//! `task:<TaskType>:<work id>` holding the claiming controller id. These key
//! names are shared by every controller version using the same Redis, so
//! they must not change.

use crate::error::StoreResult;
use crate::traits::{
    EnvironmentRepo, MAX_KEEPALIVE_TTL, MetricRepo, ProjectRepo, RefRepo, Store, TaskQueue,
};
use async_trait::async_trait;
use pipewarden_core::{
    Environment, EnvironmentKey, Metric, MetricKey, Project, ProjectKey, Ref, RefKey, TaskType,
    task_key,
};
use redis::Script;
use redis::aio::MultiplexedConnection;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::instrument;

pub const PROJECT_PREFIX: &str = "project";
pub const ENVIRONMENT_PREFIX: &str = "environment";
pub const REF_PREFIX: &str = "ref";
pub const METRIC_PREFIX: &str = "metric";
pub const KEEPALIVE_PREFIX: &str = "keepalive";
pub const TASK_PREFIX: &str = "task";
pub const TASKS_EXECUTED_COUNT_KEY: &str = "tasks_executed_count";

/// Keys fetched per SCAN / MGET round trip.
const SCAN_BATCH_SIZE: usize = 500;

/// Create the lease if absent, otherwise push its expiry forward.
/// Returns 1 only when this call created it.
static SET_KEEPALIVE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
if redis.call('SET', KEYS[1], '1', 'NX', 'PX', ARGV[1]) then
  return 1
end
redis.call('PEXPIRE', KEYS[1], ARGV[1])
return 0
",
    )
});

/// Claim a task unless its recorded owner still holds a live keepalive.
///
/// The owner's keepalive key is only known after reading the task entry, so
/// it is built from ARGV[2] inside the script. This is fine on a single
/// Redis node but not on a cluster.
static QUEUE_TASK: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
local owner = redis.call('GET', KEYS[1])
if owner and redis.call('EXISTS', ARGV[2] .. owner) == 1 then
  return 0
end
redis.call('SET', KEYS[1], ARGV[1])
return 1
",
    )
});

/// Escape glob metacharacters so a literal prefix can be used with SCAN MATCH.
fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Redis-backed store shared by every controller.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    /// Prepended to every key. Empty in production; set by tests for isolation.
    namespace: String,
}

impl RedisStore {
    /// Connect to the Redis server at `url`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self::new(conn))
    }

    /// Wrap an existing connection.
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            namespace: String::new(),
        }
    }

    /// Prefix every key with `namespace`.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    fn key(&self, prefix: &str, key: &str) -> String {
        format!("{}{prefix}:{key}", self.namespace)
    }

    fn prefix_of(&self, prefix: &str) -> String {
        format!("{}{prefix}:", self.namespace)
    }

    fn keepalive_key(&self, controller_id: &str) -> String {
        self.key(KEEPALIVE_PREFIX, controller_id)
    }

    fn queue_key(&self, task_type: TaskType, work_id: &str) -> String {
        self.key(TASK_PREFIX, &task_key(task_type, work_id))
    }

    fn executed_count_key(&self) -> String {
        format!("{}{TASKS_EXECUTED_COUNT_KEY}", self.namespace)
    }

    async fn set_entity<E: Serialize + Sync>(
        &self,
        prefix: &str,
        key: &str,
        entity: &E,
    ) -> StoreResult<()> {
        let value = serde_json::to_string(entity)?;
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(self.key(prefix, key))
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get_entity<E: DeserializeOwned>(
        &self,
        prefix: &str,
        key: &str,
    ) -> StoreResult<Option<E>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(self.key(prefix, key))
            .query_async(&mut conn)
            .await?;
        match value {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    async fn del_key(&self, key: String) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn key_exists(&self, key: String) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let count: i64 = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(count > 0)
    }

    /// All keys starting with the namespaced `prefix:`.
    async fn scan_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let pattern = format!("{}*", escape_glob(&self.prefix_of(prefix)));
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH_SIZE)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once.
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    /// Decode every entity under `prefix`.
    ///
    /// Entries that vanish between SCAN and MGET are ignored, and entries
    /// that fail to decode are logged and skipped so one bad value cannot
    /// hide the rest. Entity counts are taken from this listing so the two
    /// always agree.
    async fn list_entities<K, E>(
        &self,
        prefix: &str,
        make_key: impl Fn(String) -> K,
    ) -> StoreResult<HashMap<K, E>>
    where
        K: std::hash::Hash + Eq,
        E: DeserializeOwned,
    {
        let keys = self.scan_keys(prefix).await?;
        let strip = self.prefix_of(prefix);
        let mut conn = self.conn.clone();
        let mut entities = HashMap::with_capacity(keys.len());

        for batch in keys.chunks(SCAN_BATCH_SIZE) {
            let values: Vec<Option<String>> = redis::cmd("MGET")
                .arg(batch)
                .query_async(&mut conn)
                .await?;

            for (redis_key, value) in batch.iter().zip(values) {
                let Some(value) = value else {
                    continue;
                };
                match serde_json::from_str::<E>(&value) {
                    Ok(entity) => {
                        let key = redis_key.strip_prefix(&strip).unwrap_or(redis_key);
                        entities.insert(make_key(key.to_string()), entity);
                    }
                    Err(e) => {
                        tracing::warn!(
                            key = %redis_key,
                            error = %e,
                            "Skipping undecodable entry while listing store"
                        );
                    }
                }
            }
        }

        Ok(entities)
    }
}

#[async_trait]
impl ProjectRepo for RedisStore {
    #[instrument(skip(self, project), fields(backend = "redis", project_name = %project.name))]
    async fn set_project(&self, project: &Project) -> StoreResult<()> {
        self.set_entity(PROJECT_PREFIX, project.key().as_str(), project)
            .await
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn del_project(&self, key: &ProjectKey) -> StoreResult<()> {
        self.del_key(self.key(PROJECT_PREFIX, key.as_str())).await
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn get_project(&self, key: &ProjectKey) -> StoreResult<Option<Project>> {
        self.get_entity(PROJECT_PREFIX, key.as_str()).await
    }

    async fn project_exists(&self, key: &ProjectKey) -> StoreResult<bool> {
        self.key_exists(self.key(PROJECT_PREFIX, key.as_str())).await
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn projects(&self) -> StoreResult<HashMap<ProjectKey, Project>> {
        self.list_entities(PROJECT_PREFIX, ProjectKey::from_raw)
            .await
    }

    async fn projects_count(&self) -> StoreResult<u64> {
        Ok(self.projects().await?.len() as u64)
    }
}

#[async_trait]
impl EnvironmentRepo for RedisStore {
    #[instrument(skip(self, environment), fields(backend = "redis", environment = %environment.name))]
    async fn set_environment(&self, environment: &Environment) -> StoreResult<()> {
        self.set_entity(ENVIRONMENT_PREFIX, environment.key().as_str(), environment)
            .await
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn del_environment(&self, key: &EnvironmentKey) -> StoreResult<()> {
        self.del_key(self.key(ENVIRONMENT_PREFIX, key.as_str()))
            .await
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn get_environment(&self, key: &EnvironmentKey) -> StoreResult<Option<Environment>> {
        self.get_entity(ENVIRONMENT_PREFIX, key.as_str()).await
    }

    async fn environment_exists(&self, key: &EnvironmentKey) -> StoreResult<bool> {
        self.key_exists(self.key(ENVIRONMENT_PREFIX, key.as_str()))
            .await
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn environments(&self) -> StoreResult<HashMap<EnvironmentKey, Environment>> {
        self.list_entities(ENVIRONMENT_PREFIX, EnvironmentKey::from_raw)
            .await
    }

    async fn environments_count(&self) -> StoreResult<u64> {
        Ok(self.environments().await?.len() as u64)
    }
}

#[async_trait]
impl RefRepo for RedisStore {
    #[instrument(skip(self, reference), fields(backend = "redis", ref_name = %reference.name))]
    async fn set_ref(&self, reference: &Ref) -> StoreResult<()> {
        self.set_entity(REF_PREFIX, reference.key().as_str(), reference)
            .await
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn del_ref(&self, key: &RefKey) -> StoreResult<()> {
        self.del_key(self.key(REF_PREFIX, key.as_str())).await
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn get_ref(&self, key: &RefKey) -> StoreResult<Option<Ref>> {
        self.get_entity(REF_PREFIX, key.as_str()).await
    }

    async fn ref_exists(&self, key: &RefKey) -> StoreResult<bool> {
        self.key_exists(self.key(REF_PREFIX, key.as_str())).await
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn refs(&self) -> StoreResult<HashMap<RefKey, Ref>> {
        self.list_entities(REF_PREFIX, RefKey::from_raw)
            .await
    }

    async fn refs_count(&self) -> StoreResult<u64> {
        Ok(self.refs().await?.len() as u64)
    }
}

#[async_trait]
impl MetricRepo for RedisStore {
    #[instrument(skip(self, metric), fields(backend = "redis", metric_kind = %metric.kind))]
    async fn set_metric(&self, metric: &Metric) -> StoreResult<()> {
        self.set_entity(METRIC_PREFIX, metric.key().as_str(), metric)
            .await
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn del_metric(&self, key: &MetricKey) -> StoreResult<()> {
        self.del_key(self.key(METRIC_PREFIX, key.as_str())).await
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn get_metric(&self, key: &MetricKey) -> StoreResult<Option<Metric>> {
        self.get_entity(METRIC_PREFIX, key.as_str()).await
    }

    async fn metric_exists(&self, key: &MetricKey) -> StoreResult<bool> {
        self.key_exists(self.key(METRIC_PREFIX, key.as_str())).await
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn metrics(&self) -> StoreResult<HashMap<MetricKey, Metric>> {
        self.list_entities(METRIC_PREFIX, MetricKey::from_raw)
            .await
    }

    async fn metrics_count(&self) -> StoreResult<u64> {
        Ok(self.metrics().await?.len() as u64)
    }
}

#[async_trait]
impl TaskQueue for RedisStore {
    #[instrument(skip(self), fields(backend = "redis"))]
    async fn set_keepalive(&self, controller_id: &str, ttl: Duration) -> StoreResult<bool> {
        let ttl_ms = u64::try_from(ttl.min(MAX_KEEPALIVE_TTL).as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        let mut conn = self.conn.clone();
        let created: i64 = SET_KEEPALIVE
            .key(self.keepalive_key(controller_id))
            .arg(ttl_ms)
            .invoke_async(&mut conn)
            .await?;
        Ok(created == 1)
    }

    async fn keepalive_exists(&self, controller_id: &str) -> StoreResult<bool> {
        self.key_exists(self.keepalive_key(controller_id)).await
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn queue_task(
        &self,
        task_type: TaskType,
        work_id: &str,
        controller_id: &str,
    ) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let claimed: i64 = QUEUE_TASK
            .key(self.queue_key(task_type, work_id))
            .arg(controller_id)
            .arg(self.prefix_of(KEEPALIVE_PREFIX))
            .invoke_async(&mut conn)
            .await?;
        Ok(claimed == 1)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn unqueue_task(&self, task_type: TaskType, work_id: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(self.queue_key(task_type, work_id))
            .ignore()
            .cmd("INCR")
            .arg(self.executed_count_key())
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn currently_queued_tasks_count(&self) -> StoreResult<u64> {
        Ok(self.scan_keys(TASK_PREFIX).await?.len() as u64)
    }

    async fn executed_tasks_count(&self) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        let count: Option<u64> = redis::cmd("GET")
            .arg(self.executed_count_key())
            .query_async(&mut conn)
            .await?;
        Ok(count.unwrap_or(0))
    }
}

#[async_trait]
impl Store for RedisStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn health_check(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
