//! Transfer engine capability surface
//!
//! The supervisor never speaks a download protocol itself. It registers
//! transfer sources with a [`TransferEngine`], reads byte counts from the
//! handles the engine hands back, and asks the engine to close at shutdown.
//!
//! Two engines ship with the crate:
//!
//! - [`HttpEngine`] streams `http`/`https` locators to the download directory
//! - [`SimulatedEngine`] fabricates progress for `sim://` locators, for demos
//!   and tests that must not touch the network
//!
//! # Descriptors
//!
//! A descriptor file is a small TOML document naming one transfer:
//!
//! ```toml
//! url = "https://example.com/archive.tar.gz"
//! name = "archive.tar.gz"   # optional
//! ```

pub mod http;
pub mod simulated;

use std::future::Future;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};

pub use http::{EngineConfig, HttpEngine, HttpTransfer};
pub use simulated::{SimulatedEngine, SimulatedTransfer};

/// Capability the supervisor requires from a transfer engine
///
/// Progress queries must not block: they are called from the event loop on
/// every tick. Registration may wait until transfer metadata is available
/// but never until the data itself has arrived.
pub trait TransferEngine: Send + Sync + 'static {
    /// Opaque reference to one registered transfer
    type Handle: Clone + Send + Sync + 'static;

    /// Register a transfer described by a descriptor file
    fn add_from_descriptor(
        &self,
        path: &Path,
    ) -> impl Future<Output = EngineResult<Self::Handle>> + Send;

    /// Register a transfer from a locator string
    fn add_from_locator(
        &self,
        locator: &str,
    ) -> impl Future<Output = EngineResult<Self::Handle>> + Send;

    /// Bytes already received for a transfer
    fn bytes_completed(&self, handle: &Self::Handle) -> EngineResult<u64>;

    /// Bytes still to be received for a transfer
    fn bytes_missing(&self, handle: &Self::Handle) -> EngineResult<u64>;

    /// Display label for a transfer
    fn name(&self, handle: &Self::Handle) -> String;

    /// Resolve once every registered transfer has finished
    ///
    /// Returns `true` on natural completion and `false` when the engine was
    /// closed first.
    fn wait_all_complete(&self) -> impl Future<Output = bool> + Send;

    /// Release all engine resources. Calling it again has no effect.
    fn close(&self);
}

/// Contents of a transfer descriptor file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDescriptor {
    /// Locator of the transfer
    pub url: String,
    /// Display and file name; derived from the locator when absent
    #[serde(default)]
    pub name: Option<String>,
}

impl TransferDescriptor {
    /// Read and parse a descriptor file
    pub async fn load(path: &Path) -> EngineResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content).map_err(|source| EngineError::InvalidDescriptor {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse descriptor TOML content
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Derive a file name from the last non-empty path segment of a URL
pub fn file_name_from_url(url: &url::Url) -> Option<String> {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|s| s.to_string())
}
