//! lbdl Library
//!
//! Supervises a batch of file transfers: registers them with a transfer
//! engine, shows one live progress gauge per transfer in the terminal, and
//! shuts everything down exactly once when the user quits, a termination
//! signal arrives, or every transfer has finished.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
