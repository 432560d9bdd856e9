//! # Innkeep Daemon
//!
//! Runs the reservation core's background work next to the web layer.
//!
//! ## Usage
//! ```bash
//! innkeep                          # platform config dir, then INNKEEP_* env
//! innkeep --config ./innkeep.toml
//! innkeep --once                   # a single auto-confirm pass, then exit
//! RUST_LOG=innkeep_engine=debug innkeep
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use innkeep_db::{Database, DbConfig};
use innkeep_engine::{AutoConfirmScheduler, BookingService, HotelConfig, SystemClock};

struct Args {
    config: Option<PathBuf>,
    once: bool,
}

fn parse_args() -> Option<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config: None,
        once: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--once" => parsed.once = true,
            "--help" | "-h" => {
                println!("Innkeep reservation daemon");
                println!();
                println!("Usage: innkeep [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("      --once           Run one auto-confirm pass and exit");
                println!("  -h, --help           Show this help message");
                return None;
            }
            other => eprintln!("Ignoring unknown argument: {}", other),
        }
        i += 1;
    }

    Some(parsed)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Some(args) = parse_args() else {
        return Ok(());
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Innkeep daemon...");

    let config = HotelConfig::load(args.config)?;
    let db_path = config.database_path();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let db = Database::new(
        DbConfig::new(&db_path)
            .max_connections(config.database.max_connections)
            .busy_timeout(Duration::from_millis(config.database.busy_timeout_ms)),
    )
    .await?;

    let config = config.with_settings(&db.settings().all().await?)?;
    info!(
        db = %db_path.display(),
        deposit_percent = config.deposit.percent,
        session_ttl_secs = config.payment.session_ttl_secs,
        grace_minutes = config.scheduler.auto_confirm_grace_minutes,
        "Configuration loaded"
    );

    let backlog = db.events().count_pending().await?;
    if backlog > 0 {
        warn!(backlog, "Booking events waiting for delivery");
    }

    let settings = config.scheduler.clone();
    let service = BookingService::new(db.clone(), Arc::new(config), Arc::new(SystemClock));
    let (scheduler, handle) = AutoConfirmScheduler::new(service, settings.clone());

    if args.once {
        let report = scheduler.run_once().await?;
        info!(?report, "Auto-confirm pass complete");
    } else if settings.enabled {
        let task = tokio::spawn(scheduler.run());
        shutdown_signal().await;
        handle.shutdown().await;
        if let Err(e) = task.await {
            error!(error = %e, "Scheduler task ended abnormally");
        }
    } else {
        warn!("Auto-confirm scheduler disabled; waiting for shutdown");
        shutdown_signal().await;
    }

    db.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping...");
}
