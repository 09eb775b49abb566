//! Transfer source discovery
//!
//! Two places can name transfers: a directory of `.transfer` descriptor
//! files and a plain-text locator list with one locator per line. Either
//! may be absent; a missing source contributes nothing.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::constants::sources;
use crate::errors::{SourceError, SourceResult};

/// Everything found to register, descriptors first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSources {
    /// Descriptor files, sorted by file name
    pub descriptors: Vec<PathBuf>,
    /// Locators in file order
    pub locators: Vec<String>,
}

impl TransferSources {
    /// Scan the descriptor directory and read the locator list
    pub async fn discover(descriptor_dir: &Path, locator_list: &Path) -> SourceResult<Self> {
        let descriptors = discover_descriptors(descriptor_dir).await?;
        let locators = read_locator_list(locator_list).await?;

        info!(
            "Found {} descriptors and {} locators",
            descriptors.len(),
            locators.len()
        );

        Ok(Self {
            descriptors,
            locators,
        })
    }

    /// Total number of sources
    pub fn len(&self) -> usize {
        self.descriptors.len() + self.locators.len()
    }

    /// Whether nothing was found
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// List descriptor files in `dir`, sorted by name
pub async fn discover_descriptors(dir: &Path) -> SourceResult<Vec<PathBuf>> {
    let descriptor_error = |source: std::io::Error| SourceError::DescriptorDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Descriptor directory not found: {}", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(descriptor_error(e)),
    };

    let mut descriptors = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(descriptor_error)? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_descriptor = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(is_descriptor_name)
            .unwrap_or(false);

        if is_descriptor {
            descriptors.push(path);
        } else {
            debug!("Ignoring {}", path.display());
        }
    }

    descriptors.sort();
    Ok(descriptors)
}

/// Read the locator list at `path`
pub async fn read_locator_list(path: &Path) -> SourceResult<Vec<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(parse_locator_list(&content)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Locator list not found: {}", path.display());
            Ok(Vec::new())
        }
        Err(source) => Err(SourceError::LocatorList {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// One locator per line; blank lines and `#` comments are skipped
pub fn parse_locator_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(sources::LOCATOR_COMMENT_PREFIX))
        .map(str::to_string)
        .collect()
}

fn is_descriptor_name(name: &str) -> bool {
    name.len() > sources::DESCRIPTOR_EXTENSION.len() && name.ends_with(sources::DESCRIPTOR_EXTENSION)
}
