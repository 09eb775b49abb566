//! Core application logic for lbdl
//!
//! This module contains the transfer supervisor, the engines it drives, the
//! terminal display it renders to, and transfer source discovery.
//!
//! # Examples
//!
//! ```rust,no_run
//! use lbdl::app::{HttpEngine, EngineConfig, Supervisor, SupervisorConfig, TerminalDisplay, TransferSources};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Arc::new(HttpEngine::new(EngineConfig::default())?);
//! let sources = TransferSources::discover(Path::new("transfers"), Path::new("locators.list")).await?;
//!
//! let mut supervisor = Supervisor::new(SupervisorConfig::default(), engine, TerminalDisplay::default());
//! supervisor.register_sources(&sources).await;
//! supervisor.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod display;
pub mod engine;
pub mod sources;
pub mod supervisor;

// Re-export main public API
pub use display::{
    DisplaySurface, GaugeWidget, InputEvent, InputEvents, KeyInput, TerminalDisplay, Widget,
};
pub use engine::{
    EngineConfig, HttpEngine, HttpTransfer, SimulatedEngine, SimulatedTransfer,
    TransferDescriptor, TransferEngine,
};
pub use sources::TransferSources;
pub use supervisor::{
    ShutdownCoordinator, ShutdownHandle, ShutdownOrigin, ShutdownReport, Supervisor,
    SupervisorConfig, SupervisorReport, TickSummary, TransferRegistry,
};
