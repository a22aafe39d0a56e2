//! Core domain types for pipewarden.
//!
//! This crate defines the data model every other crate stores and reconciles:
//! - Projects, environments, refs and metrics, with their canonical keys
//! - Task types leased through the store's queue
//! - Configuration consumed by the controller

pub mod config;
pub mod environment;
pub mod error;
pub mod key;
pub mod metric;
pub mod project;
pub mod refs;
pub mod task;

pub use config::{Config, ProjectPull, StoreConfig, Wildcard};
pub use environment::{Environment, EnvironmentSettings};
pub use error::{Error, Result};
pub use key::{EnvironmentKey, MetricKey, ProjectKey, RefKey};
pub use metric::{Labels, Metric, MetricKind};
pub use project::Project;
pub use refs::{Ref, RefKind, RefSettings};
pub use task::{TaskType, task_key};
