//! Command handler for the lbdl binary
//!
//! Wires the resolved configuration into an HTTP engine, the terminal
//! display and the supervisor, registers every discovered source and runs
//! the live view until shutdown.

use std::sync::Arc;

use tracing::info;

use crate::app::{HttpEngine, Supervisor, TerminalDisplay, TransferSources};
use crate::cli::RunPaths;
use crate::config::AppConfig;
use crate::errors::Result;

/// Run the transfer supervisor
///
/// # Errors
///
/// Returns an error when the engine cannot be built, a source location
/// cannot be read, no transfer could be registered, or the terminal cannot
/// host the live view.
pub async fn handle_run(paths: &RunPaths, config: AppConfig) -> Result<()> {
    info!("Downloading to {}", paths.download_dir.display());

    let engine_config = config
        .engine
        .with_download_dir(paths.download_dir.clone());
    let engine = Arc::new(HttpEngine::new(engine_config)?);

    let sources = TransferSources::discover(&paths.descriptor_dir, &paths.locator_list).await?;

    let mut supervisor = Supervisor::new(config.supervisor, engine, TerminalDisplay::default());
    supervisor.register_sources(&sources).await;

    let report = supervisor.run().await?;

    println!(
        "Stopped ({}): {} of {} transfers complete",
        report.shutdown.origin, report.complete, report.transfers
    );

    Ok(())
}
