//! lbdl CLI application
//!
//! Downloads every transfer named in the descriptor directory and the
//! locator list while showing one progress gauge per transfer.

use std::process;

use tracing::{error, info};

use lbdl::cli::{handle_run, init_logging, Cli};
use lbdl::config::AppConfig;
use lbdl::errors::Result;

#[tokio::main]
async fn main() {
    match run().await {
        // exit without waiting on transfer tasks the engine already cancelled
        Ok(()) => process::exit(0),
        Err(e) => {
            error!("Fatal ({}): {}", e.category(), e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    let config = AppConfig::load(cli.global.config.as_deref()).await?;
    let paths = cli.resolve_paths(&config.paths);

    let level = cli
        .log_level()
        .map(|level| level.to_string().to_lowercase())
        .unwrap_or_else(|| config.logging.level.clone());
    let log_file = init_logging(&level, &paths.log_file)?;

    info!(
        "lbdl v{} starting, logging to {}",
        env!("CARGO_PKG_VERSION"),
        log_file.display()
    );
    handle_run(&paths, config).await
}
