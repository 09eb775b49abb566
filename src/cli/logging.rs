//! Logging setup shared by the binaries
//!
//! The terminal belongs to the progress view while it runs, so log output
//! goes to a file instead of stderr.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, EnvFilter};

use crate::constants::sources;
use crate::errors::{AppError, Result};

/// Install the global subscriber writing to `log_file`
///
/// `RUST_LOG` directives are honoured; `level` applies to this crate. When
/// `log_file` cannot be opened (an executable installed in a read-only
/// directory, say) the log goes to the user's local data directory, then the
/// temp directory. Returns the path actually written to.
pub fn init_logging(level: &str, log_file: &Path) -> Result<PathBuf> {
    let directive: Directive = format!("lbdl={}", level)
        .parse()
        .map_err(|e| AppError::generic(format!("Invalid log level '{}': {}", level, e)))?;
    let filter = EnvFilter::from_default_env().add_directive(directive);

    let (file, used) = open_first_writable(&log_file_candidates(log_file))?;

    fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| AppError::generic(format!("Failed to initialize logging: {}", e)))?;

    if used != log_file {
        warn!(
            "Cannot write {}, logging to {} instead",
            log_file.display(),
            used.display()
        );
    }
    Ok(used)
}

/// `log_file` followed by the fallback locations, same file name in each
fn log_file_candidates(log_file: &Path) -> Vec<PathBuf> {
    let file_name = log_file
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| sources::DEFAULT_LOG_FILE.into());

    let mut candidates = vec![log_file.to_path_buf()];
    if let Some(data_dir) = dirs::data_local_dir() {
        candidates.push(data_dir.join("lbdl").join(&file_name));
    }
    candidates.push(std::env::temp_dir().join(file_name));
    candidates
}

/// Open the first candidate that can be appended to; on total failure the
/// error for the first candidate is returned
fn open_first_writable(candidates: &[PathBuf]) -> io::Result<(File, PathBuf)> {
    let mut first_error = None;
    for path in candidates {
        match open_for_append(path) {
            Ok(file) => return Ok((file, path.clone())),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    Err(first_error
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no log file location")))
}

fn open_for_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
