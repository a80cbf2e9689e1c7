//! # Pirate Radio
//!
//! Broadcast a folder of music over FM from a Raspberry Pi.

mod cli;
mod config;
mod console;

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::Args;
use config::FileConfig;
use console::{ConsoleObserver, OperatorCommand};
use pirate_station::RadioStation;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str =
    "pirate_radio=info,pirate_station=info,pirate_catalog=info,pirate_pipeline=warn";

/// How long to wait for the final status line after stopping.
const STOPPED_NOTICE_TIMEOUT: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let launch = FileConfig::discover(args.config.as_deref())?.into_launch(&args)?;

    // Initialize logging
    let default_filter = launch
        .log_level
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    info!("Starting Pirate Radio v{}", env!("CARGO_PKG_VERSION"));

    if !is_root() {
        println!("⚠ Warning: the transmitter needs GPIO access, run with sudo");
    }

    if !launch.directory.is_dir() {
        bail!(
            "Directory not found: {}. Create it and add some music files.",
            launch.directory.display()
        );
    }

    println!(
        "{}",
        console::banner(
            launch.settings.transmitter.frequency,
            &launch.directory,
            launch.mode
        )
    );

    let station = Arc::new(
        RadioStation::new(&launch.directory, launch.mode, launch.settings)
            .context("Failed to create radio station")?,
    );
    let observer = Arc::new(ConsoleObserver::default());
    let stopped = observer.stopped_signal();
    station.set_observer(&observer);

    station.start().context("Failed to start broadcast")?;
    println!("📡 On air! Press Ctrl+C to stop.");
    println!("   Commands: n=next, p=previous, s=shuffle, q=quit\n");

    let mut commands = spawn_command_reader()?;
    let mut stdin_open = true;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            command = commands.recv(), if stdin_open => match command {
                Some(OperatorCommand::Next) => {
                    station.next_track();
                }
                Some(OperatorCommand::Previous) => {
                    station.previous_track();
                }
                Some(OperatorCommand::ToggleShuffle) => {
                    let mode = station.toggle_shuffle();
                    println!("🔀 Mode: {mode}");
                }
                Some(OperatorCommand::Quit) => break,
                None => {
                    debug!("Standard input closed, waiting for a signal");
                    stdin_open = false;
                }
            },
            () = &mut shutdown => {
                println!();
                break;
            }
        }
    }

    println!("⏹ Stopping broadcast...");
    let stopping = Arc::clone(&station);
    tokio::task::spawn_blocking(move || stopping.stop())
        .await
        .context("Station shutdown failed")?;

    if tokio::time::timeout(STOPPED_NOTICE_TIMEOUT, stopped.notified())
        .await
        .is_err()
    {
        debug!("No stop notification received");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Read operator commands from stdin on a dedicated thread.
///
/// A blocking read cannot be cancelled, so the thread is left behind at exit
/// rather than joined.
fn spawn_command_reader() -> Result<mpsc::Receiver<OperatorCommand>> {
    let (tx, rx) = mpsc::channel(8);
    std::thread::Builder::new()
        .name("operator-input".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match OperatorCommand::parse(&line) {
                    Some(command) => {
                        if tx.blocking_send(command).is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => println!("Unknown command: {}", line.trim()),
                }
            }
        })
        .context("Failed to spawn input reader")?;
    Ok(rx)
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C"),
        () = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
const fn is_root() -> bool {
    true
}
