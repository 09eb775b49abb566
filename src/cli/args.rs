//! Command-line argument parsing for lbdl
//!
//! Paths not given on the command line come from the configuration file,
//! and failing that resolve next to the executable.

use std::path::{Path, PathBuf};

use clap::{Args, Parser};

use crate::config::PathsConfig;
use crate::constants::sources;

/// lbdl - watch a batch of downloads in the terminal
#[derive(Parser, Debug)]
#[command(
    name = "lbdl",
    version,
    about = "Download a batch of files and watch their progress in the terminal",
    long_about = "Registers every transfer named in the descriptor directory and the locator list,
shows one progress gauge per transfer, and exits when all transfers finish, when Q is
pressed, or when a termination signal arrives."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Transfer source and output locations
    #[command(flatten)]
    pub paths: PathArgs,
}

/// Logging and configuration options
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Very verbose logging (trace level)
    #[arg(long)]
    pub very_verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with_all = ["verbose", "very_verbose"])]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log file path; the terminal is taken by the progress view
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

/// Transfer source and output locations
#[derive(Args, Debug, Clone, Default)]
pub struct PathArgs {
    /// Directory downloads are written to [default: <exe dir>/downloads]
    #[arg(short, long, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// File listing one locator per line [default: <exe dir>/locators.list]
    #[arg(short = 'm', long, value_name = "FILE")]
    pub locator_list: Option<PathBuf>,

    /// Directory of .transfer descriptors [default: <exe dir>/transfers]
    #[arg(short = 't', long, value_name = "DIR")]
    pub descriptor_dir: Option<PathBuf>,
}

/// Fully resolved locations for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub download_dir: PathBuf,
    pub descriptor_dir: PathBuf,
    pub locator_list: PathBuf,
    pub log_file: PathBuf,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log level forced by the verbosity flags, if any
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::TRACE)
        } else if self.global.verbose {
            Some(tracing::Level::DEBUG)
        } else {
            None
        }
    }

    /// Resolve every location: command line, then config file, then the
    /// executable's directory
    pub fn resolve_paths(&self, config: &PathsConfig) -> RunPaths {
        self.resolve_paths_in(config, &executable_dir())
    }

    fn resolve_paths_in(&self, config: &PathsConfig, base: &Path) -> RunPaths {
        let pick = |cli: &Option<PathBuf>, file: &Option<PathBuf>, default: &str| {
            cli.clone()
                .or_else(|| file.clone())
                .unwrap_or_else(|| base.join(default))
        };

        RunPaths {
            download_dir: pick(
                &self.paths.download_dir,
                &config.download_dir,
                sources::DEFAULT_DOWNLOAD_DIR,
            ),
            descriptor_dir: pick(
                &self.paths.descriptor_dir,
                &config.descriptor_dir,
                sources::DEFAULT_DESCRIPTOR_DIR,
            ),
            locator_list: pick(
                &self.paths.locator_list,
                &config.locator_list,
                sources::DEFAULT_LOCATOR_LIST,
            ),
            log_file: pick(
                &self.global.log_file,
                &config.log_file,
                sources::DEFAULT_LOG_FILE,
            ),
        }
    }
}

/// Directory holding the running executable, or `.` when unknown
pub fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
