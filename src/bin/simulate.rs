//! Transfer Simulation Binary
//!
//! Runs the supervisor and the terminal progress view against synthetic
//! transfers of random size and speed, without touching the network. Useful
//! for trying the quit key, resizing, and signal-driven shutdown.
//!
//! Run with: `cargo run --bin simulate -- --count 8`

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::prelude::*;
use tracing::{error, info, warn};

use lbdl::app::{SimulatedEngine, Supervisor, SupervisorConfig, TerminalDisplay};
use lbdl::cli::{executable_dir, init_logging};
use lbdl::constants::simulation;
use lbdl::errors::{AppError, Result};

/// Configuration for the simulation
#[derive(Parser, Debug, Clone)]
#[command(name = "simulate", about = "Watch synthetic transfers in the lbdl progress view")]
struct SimulationArgs {
    /// Number of transfers to generate
    #[arg(short = 'n', long, default_value_t = simulation::DEFAULT_TRANSFER_COUNT)]
    count: usize,

    /// Smallest transfer size in bytes
    #[arg(long, default_value_t = simulation::DEFAULT_SIZE / 8)]
    min_size: u64,

    /// Largest transfer size in bytes
    #[arg(long, default_value_t = simulation::DEFAULT_SIZE)]
    max_size: u64,

    /// Fastest transfer rate in bytes per second
    #[arg(long, default_value_t = simulation::DEFAULT_RATE)]
    max_rate: u64,

    /// Progress poll period in milliseconds
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,

    /// Stay open after every transfer has finished
    #[arg(long)]
    keep_open: bool,

    /// Log file path
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

impl SimulationArgs {
    fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(AppError::generic("Transfer count must be greater than 0"));
        }
        if self.min_size == 0 || self.min_size > self.max_size {
            return Err(AppError::generic(
                "Sizes must satisfy 0 < --min-size <= --max-size",
            ));
        }
        if self.tick_ms == 0 {
            return Err(AppError::generic("--tick-ms must be greater than 0"));
        }
        if self.max_rate == 0 {
            return Err(AppError::generic("--max-rate must be greater than 0"));
        }
        Ok(())
    }

    fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Generate synthetic locators for the simulated engine
fn generate_locators(args: &SimulationArgs) -> Vec<String> {
    let mut rng = thread_rng();
    let kinds = ["iso", "tar.gz", "zip", "img", "deb"];
    let min_rate = (args.max_rate / 10).max(1);

    (0..args.count)
        .map(|i| {
            let name = format!("file-{:02}.{}", i + 1, kinds[rng.gen_range(0..kinds.len())]);
            let size = rng.gen_range(args.min_size..=args.max_size);
            let rate = rng.gen_range(min_rate..=args.max_rate);
            SimulatedEngine::locator(&name, size, rate)
        })
        .collect()
}

/// Main simulation function
async fn run_simulation() -> Result<()> {
    let args = SimulationArgs::parse();
    args.validate()?;

    let log_file = args
        .log_file
        .clone()
        .unwrap_or_else(|| executable_dir().join("simulate.log"));
    init_logging("debug", &log_file)?;

    info!(
        "Starting simulation with {} transfers, polling every {:?}",
        args.count,
        args.tick()
    );

    let engine = Arc::new(SimulatedEngine::new());
    let config = SupervisorConfig::default()
        .with_tick_interval(args.tick())
        .with_exit_on_completion(!args.keep_open);
    let mut supervisor = Supervisor::new(config, engine, TerminalDisplay::default());

    for locator in generate_locators(&args) {
        if let Err(e) = supervisor.register_locator(&locator).await {
            warn!("Skipping {}: {}", locator, e);
        }
    }

    let report = supervisor.run().await?;

    println!(
        "Simulation stopped ({}) after {:.1?}: {} of {} transfers complete, {} polls",
        report.shutdown.origin, report.elapsed, report.complete, report.transfers, report.ticks
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run_simulation().await {
        error!("Simulation failed: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
