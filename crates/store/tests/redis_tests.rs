//! Redis backend specifics: key layout, lease expiry and tolerant listing.
//!
//! Each test starts its own Redis container and requires Docker. Set
//! `PIPEWARDEN_TEST_REDIS_URL` to use an existing server instead, or
//! `SKIP_REDIS_TESTS=1` to skip.

mod common;

use common::TestRedis;
use pipewarden_core::{Project, TaskType};
use pipewarden_store::{MAX_KEEPALIVE_TTL, ProjectRepo, Store, TaskQueue};
use std::time::Duration;

macro_rules! redis_or_skip {
    () => {
        match TestRedis::start_or_skip().await {
            Some(redis) => redis,
            None => return,
        }
    };
}

#[tokio::test]
async fn test_keepalive_key_layout() {
    let redis = redis_or_skip!();
    let mut conn = redis.raw_connection().await;

    redis
        .store
        .set_keepalive("foo", Duration::from_secs(10))
        .await
        .unwrap();

    let ttl_ms: i64 = redis::cmd("PTTL")
        .arg(format!("{}keepalive:foo", redis.namespace))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert!(ttl_ms > 0 && ttl_ms <= 10_000, "unexpected ttl {ttl_ms}");

    redis.cleanup().await;
}

#[tokio::test]
async fn test_task_key_layout() {
    let redis = redis_or_skip!();
    let mut conn = redis.raw_connection().await;

    redis
        .store
        .set_keepalive("c1", Duration::from_secs(10))
        .await
        .unwrap();
    assert!(
        redis
            .store
            .queue_task(TaskType::GarbageCollectEnvironments, "foo", "c1")
            .await
            .unwrap()
    );

    let owner: Option<String> = redis::cmd("GET")
        .arg(format!(
            "{}task:GarbageCollectEnvironments:foo",
            redis.namespace
        ))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(owner.as_deref(), Some("c1"));

    redis
        .store
        .unqueue_task(TaskType::GarbageCollectEnvironments, "foo")
        .await
        .unwrap();
    let executed: Option<u64> = redis::cmd("GET")
        .arg(format!("{}tasks_executed_count", redis.namespace))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(executed, Some(1));

    redis.cleanup().await;
}

#[tokio::test]
async fn test_expired_owner_task_is_stolen() {
    let redis = redis_or_skip!();
    let store = &redis.store;
    let short = Duration::from_millis(500);
    let long = Duration::from_secs(10);

    assert!(store.set_keepalive("c1", short).await.unwrap());
    store.set_keepalive("c2", long).await.unwrap();
    assert!(
        store
            .queue_task(TaskType::PullRefMetrics, "foo", "c1")
            .await
            .unwrap()
    );
    assert!(
        !store
            .queue_task(TaskType::PullRefMetrics, "foo", "c2")
            .await
            .unwrap()
    );

    tokio::time::sleep(Duration::from_millis(800)).await;

    assert!(!store.keepalive_exists("c1").await.unwrap());
    assert!(
        store
            .queue_task(TaskType::PullRefMetrics, "foo", "c2")
            .await
            .unwrap()
    );
    assert!(store.set_keepalive("c1", short).await.unwrap());
    assert!(
        !store
            .queue_task(TaskType::PullRefMetrics, "foo", "c1")
            .await
            .unwrap()
    );

    redis.cleanup().await;
}

#[tokio::test]
async fn test_listing_skips_undecodable_entries() {
    let redis = redis_or_skip!();
    let mut conn = redis.raw_connection().await;

    let project = Project::new("foo/bar");
    redis.store.set_project(&project).await.unwrap();
    let _: () = redis::cmd("SET")
        .arg(format!("{}project:broken", redis.namespace))
        .arg("not json")
        .query_async(&mut conn)
        .await
        .unwrap();

    let projects = redis.store.projects().await.unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects.get(&project.key()), Some(&project));
    assert_eq!(redis.store.projects_count().await.unwrap(), 1);

    redis.cleanup().await;
}

#[tokio::test]
async fn test_oversized_keepalive_ttl_is_clamped() {
    let redis = redis_or_skip!();
    let mut conn = redis.raw_connection().await;

    assert!(redis.store.set_keepalive("foo", Duration::MAX).await.unwrap());
    assert!(!redis.store.set_keepalive("foo", Duration::MAX).await.unwrap());

    let ttl_ms: i64 = redis::cmd("PTTL")
        .arg(format!("{}keepalive:foo", redis.namespace))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert!(ttl_ms > 0);
    assert!(ttl_ms as u128 <= MAX_KEEPALIVE_TTL.as_millis());

    redis.cleanup().await;
}

#[tokio::test]
async fn test_health_check_pings_server() {
    let redis = redis_or_skip!();
    assert_eq!(redis.store.backend_name(), "redis");
    redis.store.health_check().await.unwrap();
}
