//! Controller side of pipewarden.
//!
//! This crate provides everything a running controller does against the
//! store:
//! - The versioned configuration handle and its reload path
//! - The four reconciliation passes (projects, environments, refs, metrics)
//! - Lock-protected metric accessors for the collection pipeline
//! - Keepalive renewal and fail-closed task claiming
//! - Internal Prometheus gauges

pub mod accessors;
pub mod config;
pub mod controller;
pub mod error;
pub mod gc;
pub mod lister;
pub mod scheduler;
pub mod telemetry;

pub use config::{ConfigHandle, VersionedConfig, load_config};
pub use controller::Controller;
pub use error::{ConfigError, GcError};
pub use gc::{GcPass, GcStats};
pub use lister::{ListerError, OfflineProjectLister, ProjectLister};
