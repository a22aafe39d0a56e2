//! pipewarden controller binary.

use anyhow::{Context, Result};
use clap::Parser;
use pipewarden_controller::{
    ConfigHandle, Controller, GcPass, OfflineProjectLister, load_config, telemetry,
};
use pipewarden_core::config::{LogConfig, LogFormat};
use pipewarden_store::Store;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// pipewarden - store reconciliation and task coordination for CI metrics controllers
#[derive(Parser, Debug)]
#[command(name = "pipewardend")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "PIPEWARDEN_CONFIG",
        default_value = "config/pipewarden.toml"
    )]
    config: PathBuf,
}

fn init_tracing(log: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let registry = tracing_subscriber::registry().with(filter);
    match log.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging is configured from the file, so load it first.
    let config = load_config(&args.config).context("failed to load configuration")?;
    init_tracing(&config.log);

    tracing::info!("pipewarden v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config_path = %args.config.display(),
        projects = config.projects.len(),
        wildcards = config.wildcards.len(),
        "Configuration loaded"
    );

    telemetry::register_metrics();

    let store = pipewarden_store::from_config(&config.store)
        .await
        .context("failed to initialize store")?;
    store
        .health_check()
        .await
        .context("store health check failed")?;
    tracing::info!(backend = store.backend_name(), "Store connectivity verified");

    let garbage_collect = config.garbage_collect.clone();
    let controller = Arc::new(Controller::new(
        store,
        ConfigHandle::new(config),
        Arc::new(OfflineProjectLister),
    ));

    // Claims are only safe once our own lease exists.
    controller
        .keepalive()
        .await
        .context("failed to register controller keepalive")?;
    tracing::info!(controller_id = %controller.id(), "Controller registered");

    let mut handles = vec![
        controller.spawn_keepalive_loop(),
        controller.spawn_telemetry_loop(),
    ];
    for pass in GcPass::ALL {
        let schedule = match pass {
            GcPass::Projects => &garbage_collect.projects,
            GcPass::Environments => &garbage_collect.environments,
            GcPass::Refs => &garbage_collect.refs,
            GcPass::Metrics => &garbage_collect.metrics,
        };
        handles.extend(controller.spawn_gc_loop(pass, schedule));
    }

    run_until_shutdown(&controller, &args.config).await?;

    tracing::info!("Shutting down");
    for handle in handles {
        handle.abort();
    }
    Ok(())
}

/// Reload configuration from `path`, keeping the current one on failure.
async fn reload_config(controller: &Controller, path: &Path) {
    let config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Configuration reload failed, keeping current configuration");
            return;
        }
    };

    if let Err(e) = controller.config().reload(config).await {
        tracing::error!(error = %e, "Configuration reload rejected");
    }
}

/// Wait for ctrl-c. On Unix, SIGHUP reloads the configuration meanwhile.
#[cfg(unix)]
async fn run_until_shutdown(controller: &Controller, config_path: &Path) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for shutdown signal")?;
                return Ok(());
            }
            _ = hangup.recv() => {
                tracing::info!("SIGHUP received, reloading configuration");
                reload_config(controller, config_path).await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn run_until_shutdown(_controller: &Controller, _config_path: &Path) -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")
}
