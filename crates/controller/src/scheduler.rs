//! Keepalive renewal and task claiming.
//!
//! A controller may only claim work while its keepalive lease is live, so
//! [`Controller::keepalive`] must succeed once before any loop is started.
//! Claiming fails closed: when the queue cannot be reached the task is
//! treated as owned elsewhere and skipped.

use crate::controller::Controller;
use crate::error::GcError;
use crate::gc::{GcPass, GcStats};
use crate::telemetry;
use pipewarden_core::TaskType;
use pipewarden_core::config::GcSchedule;
use pipewarden_store::{StoreResult, TaskQueue};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Work id used for tasks with a single instance per deployment.
pub const SINGLETON_WORK_ID: &str = "_";

/// How often the internal gauges are refreshed from the store.
pub const TELEMETRY_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

impl Controller {
    /// Create or renew this controller's keepalive lease.
    ///
    /// Returns `true` when the lease was created rather than renewed.
    pub async fn keepalive(&self) -> StoreResult<bool> {
        let ttl = self.config.read().await.config.controller.keepalive_ttl();
        let created = self.store.set_keepalive(&self.id, ttl).await?;
        if created {
            tracing::info!(
                controller_id = %self.id,
                ttl_secs = ttl.as_secs(),
                "Controller keepalive created"
            );
        }
        Ok(created)
    }

    /// Try to claim `(task_type, work_id)` for this controller.
    ///
    /// Any store error counts as "not claimed".
    pub async fn claim(&self, task_type: TaskType, work_id: &str) -> bool {
        match self.store.queue_task(task_type, work_id, &self.id).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::debug!(
                    task_type = %task_type,
                    work_id,
                    "Task already claimed by another live controller"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    task_type = %task_type,
                    work_id,
                    error = %e,
                    "Failed to queue task, treating it as not claimed"
                );
                false
            }
        }
    }

    /// Release a claim and count the task as executed.
    pub async fn release(&self, task_type: TaskType, work_id: &str) {
        if let Err(e) = self.store.unqueue_task(task_type, work_id).await {
            tracing::error!(
                task_type = %task_type,
                work_id,
                error = %e,
                "Failed to unqueue task"
            );
        }
    }

    /// Run `task` if `(task_type, work_id)` can be claimed, then release it.
    ///
    /// Returns `None` without running `task` when the claim fails.
    pub async fn run_task<F, Fut, T>(&self, task_type: TaskType, work_id: &str, task: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.claim(task_type, work_id).await {
            return None;
        }

        let output = task().await;
        self.release(task_type, work_id).await;
        Some(output)
    }

    /// Claim and run one reconciliation pass.
    ///
    /// Returns `None` when another controller holds the pass.
    pub async fn run_garbage_collection(
        &self,
        pass: GcPass,
    ) -> Option<Result<GcStats, GcError>> {
        let result = self
            .run_task(pass.task_type(), SINGLETON_WORK_ID, || pass.run(self))
            .await?;

        match &result {
            Ok(stats) => tracing::info!(
                pass = %pass,
                deleted = stats.deleted,
                refreshed = stats.refreshed,
                "Garbage collection pass completed"
            ),
            Err(e) => tracing::error!(
                pass = %pass,
                error = %e,
                "Garbage collection pass failed"
            ),
        }
        Some(result)
    }

    /// Renew the keepalive lease every `keepalive_interval_secs`.
    pub fn spawn_keepalive_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let interval = controller
                    .config
                    .read()
                    .await
                    .config
                    .controller
                    .keepalive_interval();
                tokio::time::sleep(interval).await;

                if let Err(e) = controller.keepalive().await {
                    tracing::error!(
                        controller_id = %controller.id,
                        error = %e,
                        "Failed to renew controller keepalive"
                    );
                }
            }
        })
    }

    /// Run `pass` according to `schedule`.
    ///
    /// Returns `None` when the pass neither runs on init nor on a schedule.
    pub fn spawn_gc_loop(
        self: &Arc<Self>,
        pass: GcPass,
        schedule: &GcSchedule,
    ) -> Option<JoinHandle<()>> {
        if !schedule.on_init && !schedule.scheduled {
            tracing::info!(pass = %pass, "Garbage collection disabled");
            return None;
        }

        let controller = Arc::clone(self);
        let schedule = schedule.clone();
        Some(tokio::spawn(async move {
            if schedule.on_init {
                controller.run_garbage_collection(pass).await;
            }
            if !schedule.scheduled {
                return;
            }

            tracing::info!(
                pass = %pass,
                interval_secs = schedule.interval_secs,
                "Scheduled garbage collection enabled"
            );
            let mut ticker = tokio::time::interval(schedule.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                controller.run_garbage_collection(pass).await;
            }
        }))
    }

    /// Refresh the internal gauges every [`TELEMETRY_REFRESH_INTERVAL`].
    pub fn spawn_telemetry_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TELEMETRY_REFRESH_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = telemetry::refresh(controller.store.as_ref()).await {
                    tracing::warn!(error = %e, "Failed to refresh internal metrics");
                }
            }
        })
    }
}
