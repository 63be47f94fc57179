//! Bond auction simulator.
//!
//! Replays a market scenario against an in-process auction engine over
//! simulated time and prints the resulting price path as JSON.

mod scenario;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bond_auction::AuctionEvent;
use bond_core::config::AuctioneerConfig;
use bond_core::types::MarketId;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use crate::scenario::{format_timestamp, PricePoint, Scenario};

/// Bond auction simulator.
#[derive(Parser, Debug)]
#[command(name = "bond-sim", version, about = "Replay bond market scenarios over simulated time")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Engine configuration file (TOML, JSON or YAML). `BOND_*` environment
    /// variables override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay every purchase and print the price path.
    Simulate {
        /// Scenario file (JSON).
        scenario: PathBuf,

        /// Write the path here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Include the engine's event journal.
        #[arg(long)]
        events: bool,
    },
    /// Replay every purchase, then quote the market.
    Quote {
        /// Scenario file (JSON).
        scenario: PathBuf,

        /// Seconds after the last purchase to quote at.
        #[arg(long, default_value_t = 0)]
        at: u64,
    },
}

#[derive(Serialize)]
struct SimulationReport<'a> {
    market: MarketId,
    path: &'a [PricePoint],
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<&'a [AuctionEvent]>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    let config = load_config(args.config.as_deref())?;
    let wall_clock = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();

    match args.command {
        Command::Simulate {
            scenario,
            output,
            events,
        } => {
            let replay = Scenario::load(&scenario)?.replay(config, wall_clock)?;
            info!(
                market = %replay.market,
                points = replay.path.len(),
                end = %format_timestamp(replay.clock),
                "sim: replay finished"
            );
            let report = SimulationReport {
                market: replay.market,
                path: &replay.path,
                events: events.then(|| replay.events()),
            };
            let json = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{json}"),
            }
        }
        Command::Quote { scenario, at } => {
            let replay = Scenario::load(&scenario)?.replay(config, wall_clock)?;
            let quote = replay.quote(at)?;
            println!("{}", serde_json::to_string_pretty(&quote)?);
        }
    }
    Ok(())
}

/// Layer an optional config file under `BOND_`-prefixed environment variables.
fn load_config(path: Option<&Path>) -> Result<AuctioneerConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    let config: AuctioneerConfig = builder
        .add_source(config::Environment::with_prefix("BOND").try_parsing(true))
        .build()
        .context("failed to load configuration")?
        .try_deserialize()
        .context("invalid configuration")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Initialize the tracing subscriber. Logs go to stderr so stdout stays JSON.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
