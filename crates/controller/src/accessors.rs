//! Metric accessors for the collection pipeline.
//!
//! Pulling logic reads and writes individual metrics through these instead
//! of the store directly, so every access happens under the configuration
//! read guard. Store failures are logged and swallowed: a metric that cannot
//! be read or written must not take the pipeline down.

use crate::controller::Controller;
use pipewarden_core::Metric;
use pipewarden_store::MetricRepo;

impl Controller {
    /// Replace `metric` with its stored version, if there is one.
    ///
    /// On a miss or a store error `metric` is left as the caller passed it.
    pub async fn store_get_metric(&self, metric: &mut Metric) {
        let _current = self.config.read().await;

        match self.store.get_metric(&metric.key()).await {
            Ok(Some(stored)) => *metric = stored,
            Ok(None) => {}
            Err(e) => {
                tracing::error!(
                    metric_kind = %metric.kind,
                    metric_labels = ?metric.labels,
                    error = %e,
                    "Reading metric from the store failed"
                );
            }
        }
    }

    pub async fn store_set_metric(&self, metric: &Metric) {
        let _current = self.config.read().await;

        if let Err(e) = self.store.set_metric(metric).await {
            tracing::error!(
                metric_kind = %metric.kind,
                metric_labels = ?metric.labels,
                error = %e,
                "Writing metric in the store failed"
            );
        }
    }

    pub async fn store_del_metric(&self, metric: &Metric) {
        let _current = self.config.read().await;

        if let Err(e) = self.store.del_metric(&metric.key()).await {
            tracing::error!(
                metric_kind = %metric.kind,
                metric_labels = ?metric.labels,
                error = %e,
                "Deleting metric from the store failed"
            );
        }
    }
}
