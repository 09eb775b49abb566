//! Command-line interface components
//!
//! Argument parsing, logging setup and the run command used by the `lbdl`
//! binary.

pub mod args;
pub mod commands;
pub mod logging;

pub use args::{executable_dir, Cli, GlobalArgs, PathArgs, RunPaths};
pub use commands::handle_run;
pub use logging::init_logging;
