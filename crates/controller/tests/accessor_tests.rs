//! Lock-protected metric accessors.

mod common;

use common::{FlakyStore, test_controller, test_controller_with};
use pipewarden_controller::OfflineProjectLister;
use pipewarden_core::metric::labels;
use pipewarden_core::{Config, Metric, MetricKind};
use pipewarden_store::MetricRepo;
use std::sync::Arc;

fn coverage(value: f64) -> Metric {
    let mut metric = Metric::new(
        MetricKind::Coverage,
        labels([("project", "foo/bar"), ("kind", "branch"), ("ref", "main")]),
    );
    metric.value = value;
    metric
}

#[tokio::test]
async fn test_get_replaces_caller_value_when_found() {
    let controller = test_controller(Config::default());
    controller.store_set_metric(&coverage(87.5)).await;

    let mut metric = coverage(0.0);
    controller.store_get_metric(&mut metric).await;
    assert_eq!(metric.value, 87.5);
}

#[tokio::test]
async fn test_get_leaves_caller_value_untouched_after_delete() {
    let controller = test_controller(Config::default());
    let stored = coverage(87.5);
    controller.store_set_metric(&stored).await;
    controller.store_del_metric(&stored).await;
    assert!(!controller.store().metric_exists(&stored.key()).await.unwrap());

    let mut metric = coverage(12.0);
    controller.store_get_metric(&mut metric).await;
    assert_eq!(metric.value, 12.0);
}

#[tokio::test]
async fn test_store_errors_are_swallowed() {
    let controller = test_controller_with(
        Config::default(),
        Arc::new(FlakyStore::new()),
        Arc::new(OfflineProjectLister),
    );
    let stored = coverage(87.5);
    controller.store_set_metric(&stored).await;

    let mut metric = coverage(12.0);
    controller.store_get_metric(&mut metric).await;
    assert_eq!(metric.value, 12.0);

    controller.store_del_metric(&stored).await;
    assert!(controller.store().metric_exists(&stored.key()).await.unwrap());
}
