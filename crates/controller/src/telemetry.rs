//! Internal Prometheus gauges describing the store.
//!
//! The gauges live in a dedicated registry. Exposing it over HTTP is left to
//! the embedding server; [`encode_text`] renders it in the text format.

use pipewarden_store::{
    EnvironmentRepo, MetricRepo, ProjectRepo, RefRepo, Store, StoreResult, TaskQueue,
};
use prometheus::{Encoder, IntGauge, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Registry holding the internal gauges.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static PROJECTS_COUNT: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("pipewarden_projects_count", "Number of projects in the store")
        .expect("metric creation failed")
});

pub static ENVIRONMENTS_COUNT: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "pipewarden_environments_count",
        "Number of environments in the store",
    )
    .expect("metric creation failed")
});

pub static REFS_COUNT: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("pipewarden_refs_count", "Number of refs in the store")
        .expect("metric creation failed")
});

pub static METRICS_COUNT: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("pipewarden_metrics_count", "Number of metrics in the store")
        .expect("metric creation failed")
});

pub static CURRENTLY_QUEUED_TASKS_COUNT: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "pipewarden_currently_queued_tasks_count",
        "Number of tasks currently claimed by a controller",
    )
    .expect("metric creation failed")
});

pub static EXECUTED_TASKS_COUNT: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "pipewarden_executed_tasks_count",
        "Number of tasks executed since the store was created",
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register the gauges with [`REGISTRY`]. Later calls are no-ops.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        for gauge in [
            &*PROJECTS_COUNT,
            &*ENVIRONMENTS_COUNT,
            &*REFS_COUNT,
            &*METRICS_COUNT,
            &*CURRENTLY_QUEUED_TASKS_COUNT,
            &*EXECUTED_TASKS_COUNT,
        ] {
            REGISTRY
                .register(Box::new(gauge.clone()))
                .expect("metric registration failed");
        }
    });
}

fn as_gauge_value(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// Set every gauge from the store's current counters.
pub async fn refresh(store: &dyn Store) -> StoreResult<()> {
    PROJECTS_COUNT.set(as_gauge_value(store.projects_count().await?));
    ENVIRONMENTS_COUNT.set(as_gauge_value(store.environments_count().await?));
    REFS_COUNT.set(as_gauge_value(store.refs_count().await?));
    METRICS_COUNT.set(as_gauge_value(store.metrics_count().await?));
    CURRENTLY_QUEUED_TASKS_COUNT.set(as_gauge_value(
        store.currently_queued_tasks_count().await?,
    ));
    EXECUTED_TASKS_COUNT.set(as_gauge_value(store.executed_tasks_count().await?));
    Ok(())
}

/// Render [`REGISTRY`] in the Prometheus text exposition format.
pub fn encode_text() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
