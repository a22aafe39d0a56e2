//! Common test utilities for store backends.

use pipewarden_store::{LocalStore, RedisStore, Store};
use std::sync::Arc;
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use uuid::Uuid;

/// Environment variable pointing Redis-backed tests at an existing server
/// instead of a container.
pub const REDIS_URL_ENV: &str = "PIPEWARDEN_TEST_REDIS_URL";

/// Stable prefix for container startup failures. Only these cause a skip.
pub const REDIS_CONTAINER_START_ERR_PREFIX: &str = "redis-container-start:";

const REDIS_PORT: u16 = 6379;

/// Redis test store isolated under a random key namespace.
#[allow(dead_code)]
pub struct TestRedis {
    pub store: RedisStore,
    pub url: String,
    pub namespace: String,
    _container: Option<ContainerAsync<Redis>>,
}

#[allow(dead_code)]
impl TestRedis {
    /// Start a Redis container, or use `PIPEWARDEN_TEST_REDIS_URL` when set.
    pub async fn new() -> Result<Self, String> {
        let (url, container) = match std::env::var(REDIS_URL_ENV)
            .ok()
            .filter(|u| !u.is_empty())
        {
            Some(url) => (url, None),
            None => {
                let container = Redis::default()
                    .with_tag("7-alpine")
                    .start()
                    .await
                    .map_err(|e| {
                        format!(
                            "{} Failed to start Redis container: {e}",
                            REDIS_CONTAINER_START_ERR_PREFIX
                        )
                    })?;
                let host = container
                    .get_host()
                    .await
                    .map_err(|e| format!("Failed to get container host: {e}"))?;
                let port = container
                    .get_host_port_ipv4(REDIS_PORT)
                    .await
                    .map_err(|e| format!("Failed to get container port: {e}"))?;
                (format!("redis://{host}:{port}"), Some(container))
            }
        };

        let namespace = format!("pipewarden-test-{}:", Uuid::new_v4());
        let store = RedisStore::connect(&url)
            .await
            .map_err(|e| format!("Failed to connect to {url}: {e}"))?;

        Ok(Self {
            store: store.with_namespace(namespace.clone()),
            url,
            namespace,
            _container: container,
        })
    }

    /// Like [`TestRedis::new`], but returns `None` when `SKIP_REDIS_TESTS` is
    /// set or Docker is unavailable.
    ///
    /// Connection or protocol errors after the server is up still panic.
    pub async fn start_or_skip() -> Option<Self> {
        if std::env::var("SKIP_REDIS_TESTS").is_ok() {
            return None;
        }
        match Self::new().await {
            Ok(redis) => Some(redis),
            Err(msg) if msg.contains(REDIS_CONTAINER_START_ERR_PREFIX) => {
                eprintln!("Skipping Redis test (Docker unavailable): {msg}");
                None
            }
            Err(msg) => panic!("Redis test setup failed: {msg}"),
        }
    }

    pub fn store(&self) -> Arc<dyn Store> {
        Arc::new(self.store.clone())
    }

    /// Raw connection for inspecting keys directly.
    pub async fn raw_connection(&self) -> redis::aio::MultiplexedConnection {
        redis::Client::open(self.url.as_str())
            .expect("Failed to open Redis client")
            .get_multiplexed_async_connection()
            .await
            .expect("Failed to connect to Redis")
    }

    /// Delete every key under this test's namespace.
    pub async fn cleanup(&self) {
        let mut conn = self.raw_connection().await;
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(format!("{}*", self.namespace))
            .query_async(&mut conn)
            .await
            .expect("Failed to list test keys");
        if !keys.is_empty() {
            let _: i64 = redis::cmd("DEL")
                .arg(keys)
                .query_async(&mut conn)
                .await
                .expect("Failed to delete test keys");
        }
    }
}

/// Run a test against the in-process backend, then Redis (requires Docker
/// or `PIPEWARDEN_TEST_REDIS_URL`).
#[allow(dead_code)]
pub async fn run_store_test_both<F, Fut>(test_fn: F)
where
    F: Fn(Arc<dyn Store>) -> Fut + Clone,
    Fut: std::future::Future<Output = ()>,
{
    test_fn.clone()(Arc::new(LocalStore::new())).await;

    if let Some(redis) = TestRedis::start_or_skip().await {
        test_fn(redis.store()).await;
        redis.cleanup().await;
    }
}
