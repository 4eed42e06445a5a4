//! cream-sessiond - desktop session daemon.
//!
//! Tracks user activity (active/idle), launches session modules and autostart
//! applications, and exposes the session over `DBus`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cream_sessiond::activity::ActivityMonitor;
use cream_sessiond::config::Config;
use cream_sessiond::crash::LogPresenter;
use cream_sessiond::idle::X11IdleSource;
use cream_sessiond::ipc;
use cream_sessiond::launch::{ConfigAutostart, ConfigModules};
use cream_sessiond::power::UPowerManager;
use cream_sessiond::session::{SessionController, SessionHandles};
use cream_sessiond::supervisor::ProcessSupervisor;

/// Desktop session daemon.
///
/// Tracks user activity and supervises the session's long-running processes.
#[derive(Parser, Debug)]
#[command(name = "cream-sessiond")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Do not launch the autostart entries (modules still run).
    #[arg(long)]
    skip_autostart: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("cream-sessiond v{} starting", env!("CARGO_PKG_VERSION"));

    let config =
        Config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;

    // Startup precondition: without an idle source there is no session state.
    let provider = X11IdleSource::open().context("Failed to open idle source")?;

    let cancel = CancellationToken::new();

    let (supervisor, exit_rx) = ProcessSupervisor::new();
    let (mut controller, handles) = SessionController::new(
        supervisor,
        exit_rx,
        Arc::new(UPowerManager),
        Arc::new(LogPresenter),
    );
    let SessionHandles {
        status,
        commands,
        activity_events,
        notifications,
    } = handles;

    // Start sampling before any children launch, so status is live from the
    // first moment the session is up.
    let monitor = ActivityMonitor::new(
        provider,
        config.idle_time_seconds,
        config.active_poll(),
        config.idle_poll(),
    );
    monitor.spawn(activity_events, cancel.clone());

    // Two-phase launch: modules first, then autostart.
    controller.launch_modules(&ConfigModules::from_config(&config));
    if args.skip_autostart {
        info!("skipping autostart entries");
    } else {
        controller.launch_autostart(&ConfigAutostart::from_config(&config));
    }

    let _conn = ipc::serve(status, commands, notifications, cancel.clone())
        .await
        .context("Failed to register session IPC object")?;

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            shutdown.cancel();
        }
    });

    controller.run(cancel).await;
    Ok(())
}

/// Initialize logging with the specified level.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(format!("cream_sessiond={level}"))
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}
