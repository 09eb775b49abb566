//! Application constants for lbdl
//!
//! Constants are grouped by the component that consumes them.

use std::time::Duration;

/// Supervisor and event loop constants
pub mod supervisor {
    use super::Duration;

    /// Period between progress polls
    pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

    /// Capacity of the shutdown request slot
    pub const SHUTDOWN_SLOT_CAPACITY: usize = 1;

    /// Banner shown above the transfer gauges
    pub const BANNER_TEXT: &str = "Welcome to lbdl - press Q to quit";
}

/// Display layout and input constants
pub mod display {
    use super::Duration;

    /// Width of every widget in terminal columns
    pub const WIDGET_WIDTH: u16 = 80;

    /// Height of the banner widget in rows
    pub const BANNER_HEIGHT: u16 = 3;

    /// Height of each transfer gauge in rows
    pub const GAUGE_HEIGHT: u16 = 3;

    /// How long the input reader blocks before checking for shutdown
    pub const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Buffered input events between the reader thread and the event loop
    pub const INPUT_CHANNEL_CAPACITY: usize = 64;
}

/// Transfer source discovery constants
pub mod sources {
    /// File name suffix identifying transfer descriptor files
    pub const DESCRIPTOR_EXTENSION: &str = ".transfer";

    /// Default download directory name, relative to the executable
    pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";

    /// Default locator list file name, relative to the executable
    pub const DEFAULT_LOCATOR_LIST: &str = "locators.list";

    /// Default descriptor directory name, relative to the executable
    pub const DEFAULT_DESCRIPTOR_DIR: &str = "transfers";

    /// Default log file name, relative to the executable
    pub const DEFAULT_LOG_FILE: &str = "lbdl.log";

    /// Comment prefix in locator lists
    pub const LOCATOR_COMMENT_PREFIX: char = '#';
}

/// HTTP engine constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("lbdl/", env!("CARGO_PKG_VERSION"));

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// TCP keep-alive interval
    pub const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Suffix appended to in-flight download files
    pub const PARTIAL_FILE_SUFFIX: &str = ".part";

    /// Name used when a locator has no usable path segment
    pub const FALLBACK_FILE_NAME: &str = "download";
}

/// Simulated engine constants
pub mod simulation {
    use super::Duration;

    /// URL scheme accepted by the simulated engine
    pub const SCHEME: &str = "sim";

    /// Transfer size when the locator does not name one
    pub const DEFAULT_SIZE: u64 = 64 * 1024 * 1024;

    /// Transfer rate when the locator does not name one (bytes per second)
    pub const DEFAULT_RATE: u64 = 4 * 1024 * 1024;

    /// Stand-in finish time for transfers too slow to ever complete
    pub const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    /// Number of synthetic transfers started by the simulate binary
    pub const DEFAULT_TRANSFER_COUNT: usize = 5;
}

/// Configuration file locations
pub mod config {
    /// Project-local configuration file
    pub const LOCAL_CONFIG_FILE: &str = "lbdl.toml";

    /// Directory under the user config dir
    pub const CONFIG_DIR_NAME: &str = "lbdl";

    /// File name under the user config dir
    pub const CONFIG_FILE_NAME: &str = "config.toml";
}

pub use supervisor::TICK_INTERVAL;
