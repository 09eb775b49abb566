//! Error types for lbdl
//!
//! Errors are grouped by the component that raises them. The supervisor
//! classifies them into startup-fatal conditions (no display, no transfers),
//! skippable registration failures and transient poll failures; only the
//! first kind ever reaches the binary's exit path.

use std::path::PathBuf;
use thiserror::Error;

/// Transfer engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// HTTP request failed
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// I/O error while reading a descriptor or writing a download
    #[error("File I/O error")]
    Io(#[from] std::io::Error),

    /// Locator could not be parsed or uses an unsupported scheme
    #[error("Invalid locator: {locator} - {reason}")]
    InvalidLocator { locator: String, reason: String },

    /// Descriptor file could not be parsed
    #[error("Invalid descriptor {path}")]
    InvalidDescriptor {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Server answered the metadata request with an error status
    #[error("Server error: HTTP {status} for {url}")]
    ServerError { url: String, status: u16 },

    /// Total size is not known yet, so missing bytes cannot be reported
    #[error("Transfer size not yet known: {name}")]
    SizeUnknown { name: String },

    /// Handle does not belong to this engine
    #[error("Unknown transfer handle: {id}")]
    UnknownTransfer { id: usize },

    /// Engine has been closed and accepts no new transfers
    #[error("Transfer engine is closed")]
    Closed,
}

impl EngineError {
    /// Whether a progress query failing with this error should simply be
    /// retried on the next tick
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::SizeUnknown { .. })
    }
}

/// Display surface errors
#[derive(Error, Debug)]
pub enum DisplayError {
    /// Standard output is not attached to a terminal
    #[error("Standard output is not a terminal")]
    NotATerminal,

    /// Terminal I/O failed
    #[error("Terminal output error")]
    Terminal(#[from] std::io::Error),

    /// Render or event call before `init`
    #[error("Display surface is not initialized")]
    NotInitialized,

    /// Input event stream was already handed out
    #[error("Input event stream already taken")]
    EventsTaken,
}

/// Transfer source discovery errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Failed to read the descriptor directory
    #[error("Failed to read descriptor directory: {path}")]
    DescriptorDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read the locator list file
    #[error("Failed to read locator list: {path}")]
    LocatorList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read
    #[error("Failed to read configuration file: {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Supervisor errors
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// No transfer source could be registered
    #[error("No transfer descriptors or locators found")]
    NoTransfers,

    /// Display surface failed to initialize
    #[error("Failed to initialize display: {0}")]
    DisplayInit(#[source] DisplayError),

    /// OS signal handlers could not be installed
    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    /// Supervisor configuration rejected
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Display error
    #[error(transparent)]
    Display(#[from] DisplayError),

    /// Source discovery error
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Supervisor error
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Whether the error aborts the process before the event loop starts
    pub fn is_fatal(&self) -> bool {
        match self {
            AppError::Supervisor(SupervisorError::NoTransfers)
            | AppError::Supervisor(SupervisorError::DisplayInit(_))
            | AppError::Supervisor(SupervisorError::Signal(_))
            | AppError::Supervisor(SupervisorError::Config(_))
            | AppError::Display(DisplayError::NotATerminal)
            | AppError::Config(_) => true,

            AppError::Engine(_) | AppError::Source(_) => false,

            _ => true,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Engine(_) => "engine",
            AppError::Display(_) => "display",
            AppError::Source(_) => "source",
            AppError::Config(_) => "config",
            AppError::Supervisor(_) => "supervisor",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Engine result type alias
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Display result type alias
pub type DisplayResult<T> = std::result::Result<T, DisplayError>;

/// Source discovery result type alias
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Supervisor result type alias
pub type SupervisorResult<T> = std::result::Result<T, SupervisorError>;
