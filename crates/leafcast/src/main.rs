//! Leafcast - Ambient colour streaming to panel light fixtures
//!
//! Command line front end for the cinema mode bridge.

#![warn(missing_docs)]

mod logging_setup;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use leafcast_control::cinema::{CinemaMode, PanelTopology, SessionState, ZoneMapping};
use leafcast_control::FixtureClient;
use leafcast_core::{LeafcastConfig, DEFAULT_FIXTURE_PORT};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Stream ambient screen colours to a multi-panel light fixture
#[derive(Parser, Debug)]
#[command(name = "leafcast", version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run cinema mode until Ctrl-C
    Run,

    /// Request a new auth token; hold the fixture's power button first
    Pair {
        /// Fixture host name or IP address
        address: String,

        /// Fixture REST API port
        #[arg(long, default_value_t = DEFAULT_FIXTURE_PORT)]
        port: u16,

        /// Seconds to keep polling while pairing is not enabled
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },

    /// Print the panel topology and the zone to panel mapping
    Panels,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => LeafcastConfig::load_from(path)?,
        None => LeafcastConfig::load()?,
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    let _log_guard = logging_setup::init(&config.logging)?;

    match cli.command {
        Command::Run => run(&config).await,
        Command::Pair {
            address,
            port,
            timeout,
        } => pair(&address, port, Duration::from_secs(timeout)).await,
        Command::Panels => panels(&config).await,
    }
}

async fn run(config: &LeafcastConfig) -> Result<()> {
    let cinema = CinemaMode::from_config(config)
        .context("Fixture is not configured; run `leafcast pair <address>` first")?;

    let session = match cinema.start_cinema_mode().await {
        Ok(session) => session,
        Err(e) if e.is_retryable() => {
            return Err(anyhow::Error::new(e).context("Cinema mode could not start; retry shortly"))
        }
        Err(e) => return Err(e.into()),
    };
    let status = cinema.status();
    match status.listen_addr {
        Some(addr) => println!(
            "Cinema mode {} listening on {} for {}-byte datagrams",
            session,
            addr,
            config.cinema.frame_len()
        ),
        None => println!("Cinema mode {} started", session),
    }
    println!("Press Ctrl-C to stop");

    let mut state = cinema.controller().subscribe();
    let ended_early = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for Ctrl-C")?;
            info!("Ctrl-C received");
            false
        }
        res = state.wait_for(|s| *s == SessionState::Idle) => res.is_ok(),
    };

    cinema.stop_cinema_mode().await;

    let status = cinema.status();
    println!(
        "Received {} frames, dispatched {}, dropped {} ({} panel writes)",
        status.frames_received, status.frames_dispatched, status.frames_dropped, status.panel_writes
    );

    if ended_early {
        let reason = status
            .last_error
            .unwrap_or_else(|| "unknown error".to_string());
        bail!("Cinema mode {} ended: {}", session, reason);
    }
    Ok(())
}

async fn pair(address: &str, port: u16, timeout: Duration) -> Result<()> {
    println!("Hold the fixture's power button for 5-7 seconds until the LEDs flash");

    let token = FixtureClient::wait_for_auth_token(address, port, timeout)
        .await
        .with_context(|| format!("Pairing with {} failed", address))?;

    println!("Paired. Add this to your config file:\n");
    println!("[fixture]");
    println!("address = \"{}\"", address);
    println!("port = {}", port);
    println!("auth_token = \"{}\"", token);
    Ok(())
}

async fn panels(config: &LeafcastConfig) -> Result<()> {
    let client = FixtureClient::new(config.fixture.clone())
        .context("Fixture is not configured; run `leafcast pair <address>` first")?;

    match client.device_info().await {
        Ok(info) => println!(
            "{} ({}, firmware {})",
            info.name, info.model, info.firmware_version
        ),
        Err(e) => warn!("Could not read device info: {}", e),
    }

    let topology = PanelTopology::resolve(&client).await?;
    println!(
        "{} panels, lower anchor {}, upper anchor {}",
        topology.panels().len(),
        topology.lower_anchor(),
        topology.upper_anchor()
    );

    let mapping = ZoneMapping::build(&topology);
    for (zone, targets) in mapping.iter() {
        let ids: Vec<String> = targets.iter().map(ToString::to_string).collect();
        println!("  zone {:>2} -> {}", zone, ids.join(", "));
    }

    if mapping.zone_count() != config.cinema.zone_count {
        println!(
            "Warning: configured for {} zones but the ring has {}; set cinema.zone_count = {} before `run`",
            config.cinema.zone_count,
            mapping.zone_count(),
            mapping.zone_count()
        );
    }
    Ok(())
}
