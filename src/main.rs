//! phovault daemon.
//!
//! Opens every owner library found under the data directory and runs their
//! maintenance jobs until interrupted.
//!
//! ## Usage
//!
//! ```bash
//! phovault              # Run in foreground until Ctrl-C
//! phovault --once       # Rebuild, sweep orphans and flush every library, then exit
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use phovault::{logging, Config, LibraryManager, MaintenanceJob};

/// How often idle libraries are looked for.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct Args {
    config_path: Option<PathBuf>,
    once: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--once" | "-1" => {
                parsed.once = true;
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("phovault {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"phovault - personal photo library storage daemon

USAGE:
    phovault [OPTIONS]

OPTIONS:
    --once, -1          Rebuild, sweep orphans and flush every library, then exit
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PHOVAULT_CONFIG     Path to config file (overrides default location)
    PHOVAULT_LOG        Log filter (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/phovault/config.toml"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    if let Err(e) = logging::init(None) {
        eprintln!("Warning: logging unavailable: {:#}", e);
    }

    let config = Config::load(args.config_path.as_deref()).context("Failed to load config")?;
    info!(data_dir = ?config.storage.data_dir, "phovault starting");

    let manager = Arc::new(LibraryManager::new(config).context("Failed to open data directory")?);
    let owners = manager.open_all();
    info!(count = owners.len(), "Libraries opened");

    if args.once {
        run_once(&manager, &owners).await;
        manager.shutdown().await;
    } else {
        let reaper = manager.spawn_idle_reaper(IDLE_CHECK_INTERVAL);
        let icon_sweeper = manager.spawn_icon_sweeper();
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        info!("Shutdown requested");
        manager.shutdown().await;
        let _ = reaper.await;
        if let Some(sweeper) = icon_sweeper {
            let _ = sweeper.await;
        }
    }

    info!("phovault stopped");
    Ok(())
}

async fn run_once(manager: &Arc<LibraryManager>, owners: &[i64]) {
    for &owner in owners {
        let library = match manager.get_or_open(owner) {
            Ok(library) => library,
            Err(e) => {
                error!(owner, error = %e, "Failed to open library");
                continue;
            }
        };

        let maintenance = Arc::clone(library.maintenance());
        let result = tokio::task::spawn_blocking(move || -> phovault::Result<()> {
            maintenance.run_once(MaintenanceJob::Rebuild)?;
            maintenance.run_once(MaintenanceJob::OrphanSweep)?;
            maintenance.run_once(MaintenanceJob::Flush)
        })
        .await;

        match result {
            Ok(Ok(())) => {
                if let Err(e) = library.refresh_collections() {
                    error!(owner, error = %e, "Collection refresh failed");
                }
                let status = library.index_status();
                info!(owner, assets = status.asset_count, "Library maintained");
            }
            Ok(Err(e)) => error!(owner, error = %e, "Maintenance failed"),
            Err(e) => error!(owner, error = %e, "Maintenance task panicked"),
        }
    }
}
