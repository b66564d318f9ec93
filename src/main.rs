//! `st24` command-line front end.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use st24_control::config::St24Config;
use st24_control::St24Controller;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// ST24 antenna positioner control
#[derive(Parser, Debug)]
#[command(version, about = "ST24 antenna positioner control", long_about = None)]
struct Args {
    /// Configuration file (default: config/st24.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List serial devices that could be an ST24
    Ports,

    /// Run the poll sequence and print the telemetry as JSON
    Poll {
        /// Serial device to open
        #[arg(short, long)]
        port: String,
        /// Baud rate (defaults to the configured one)
        #[arg(short, long)]
        baud: Option<u32>,
        /// Keep polling until Ctrl-C
        #[arg(short, long)]
        watch: bool,
        /// Interval between polls in watch mode
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Send one command and print the lines received afterwards
    Send {
        /// Serial device to open
        #[arg(short, long)]
        port: String,
        /// Baud rate (defaults to the configured one)
        #[arg(short, long)]
        baud: Option<u32>,
        /// How long to print received lines
        #[arg(long, default_value_t = 1000)]
        listen_ms: u64,
        /// Command text, the line terminator is added when missing
        cmd: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => St24Config::load_from(path),
        None => St24Config::load(),
    }
    .context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.application.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let controller =
        St24Controller::with_serial_catalog(config).context("Failed to set up device catalog")?;

    match args.command {
        Commands::Ports => {
            let ports = controller.list_candidate_devices()?;
            println!("{}", serde_json::to_string(&ports)?);
        }
        Commands::Poll {
            port,
            baud,
            watch,
            interval_ms,
        } => {
            controller
                .open_connection(&port, baud)
                .await
                .with_context(|| format!("Failed to open {port}"))?;

            if watch {
                let interval = interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| controller.config().poll.interval());
                watch_polls(Arc::new(controller), interval).await?;
            } else {
                let result = controller.run_poll().await;
                println!("{}", serde_json::to_string(&result)?);
                controller.close_connection().await;
            }
        }
        Commands::Send {
            port,
            baud,
            listen_ms,
            cmd,
        } => {
            controller
                .open_connection(&port, baud)
                .await
                .with_context(|| format!("Failed to open {port}"))?;

            let mut lines = controller.subscribe_lines().await?;
            let ack = controller.send_raw(&cmd).await?;
            println!("{}", serde_json::to_string(&ack)?);

            let listen = tokio::time::sleep(Duration::from_millis(listen_ms));
            tokio::pin!(listen);
            loop {
                tokio::select! {
                    line = lines.next_line() => match line {
                        Some(line) => println!("{line}"),
                        None => break,
                    },
                    _ = &mut listen => break,
                }
            }
            controller.close_connection().await;
        }
    }

    Ok(())
}

/// Trigger a poll every `interval` until Ctrl-C. A trigger that finds the
/// previous poll still running is skipped.
async fn watch_polls(controller: Arc<St24Controller>, interval: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_ms = interval.as_millis() as u64, "polling, Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let controller = controller.clone();
                tokio::spawn(async move {
                    let result = controller.run_poll().await;
                    if result.busy {
                        return;
                    }
                    if !result.connected {
                        warn!("link lost");
                    }
                    match serde_json::to_string(&result) {
                        Ok(json) => println!("{json}"),
                        Err(e) => warn!(error = %e, "failed to encode poll result"),
                    }
                });
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    controller.close_connection().await;
    Ok(())
}
