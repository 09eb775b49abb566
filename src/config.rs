//! Configuration management for lbdl
//!
//! Every setting has a default, so the program runs without a configuration
//! file. When one exists it is read from the first of:
//!
//! 1. the path given with `--config`
//! 2. `./lbdl.toml`
//! 3. `<user config dir>/lbdl/config.toml`
//!
//! Command-line arguments override the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::{EngineConfig, SupervisorConfig};
use crate::constants::config;
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Event loop and live view settings
    pub supervisor: SupervisorConfig,
    /// HTTP engine settings
    pub engine: EngineConfig,
    /// Source and output locations
    pub paths: PathsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Locations of transfer sources and outputs
///
/// Unset entries fall back to the directory holding the executable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where downloads are written
    pub download_dir: Option<PathBuf>,
    /// Directory scanned for `.transfer` descriptors
    pub descriptor_dir: Option<PathBuf>,
    /// File listing one locator per line
    pub locator_list: Option<PathBuf>,
    /// Log file
    pub log_file: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration, falling back to defaults when no file exists
    ///
    /// An explicitly named file must exist.
    pub async fn load(config_file_override: Option<&Path>) -> ConfigResult<Self> {
        let path = match config_file_override {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file(),
        };

        let config = match path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check values that cannot be expressed in the types
    pub fn validate(&self) -> ConfigResult<()> {
        self.supervisor.validate()?;

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: self.logging.level.clone(),
                reason: "Expected one of trace, debug, info, warn, error".to_string(),
            });
        }

        Ok(())
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(config::LOCAL_CONFIG_FILE);
        let user = dirs::config_dir()
            .map(|dir| dir.join(config::CONFIG_DIR_NAME).join(config::CONFIG_FILE_NAME));

        let found = std::iter::once(local)
            .chain(user)
            .find(|path| path.exists());

        if let Some(path) = &found {
            debug!("Found config file: {}", path.display());
        }
        found
    }

    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config = Self::parse(&content)?;
        debug!("Loaded configuration from: {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.supervisor.tick_interval, Duration::from_secs(1));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.paths, PathsConfig::default());
        assert!(config.validate().is_ok());
    }

    /// Test a partial config file keeps defaults for the rest
    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = AppConfig::parse(
            r#"
[supervisor]
tick_interval = "500ms"

[engine]
connect_timeout = "5s"
tcp_keepalive = "10s"

[paths]
locator_list = "/srv/lbdl/locators.list"
"#,
        )
        .unwrap();

        assert_eq!(config.supervisor.tick_interval, Duration::from_millis(500));
        assert!(config.supervisor.handle_signals);
        assert_eq!(config.engine.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.engine.tcp_keepalive, Some(Duration::from_secs(10)));
        assert!(config.engine.tcp_nodelay);
        assert_eq!(
            config.paths.locator_list,
            Some(PathBuf::from("/srv/lbdl/locators.list"))
        );
        assert_eq!(config.paths.download_dir, None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_toml_is_a_format_error() {
        let result = AppConfig::parse("[supervisor\ntick_interval = 1");
        assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));
    }

    #[test]
    fn test_bad_values_are_rejected() {
        let config = AppConfig::parse("[supervisor]\ntick_interval = \"0s\"").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        let config = AppConfig::parse("[logging]\nlevel = \"loud\"").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "logging.level"
        ));
    }

    /// Test an explicitly named missing file is an error
    #[tokio::test]
    async fn test_config_loading_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let result = AppConfig::load(Some(&config_path)).await;
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_config_loading_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("lbdl.toml");
        tokio::fs::write(
            &config_path,
            "[supervisor]\nbanner = \"mirror sync\"\n\n[logging]\nlevel = \"debug\"\n",
        )
        .await
        .unwrap();

        let config = AppConfig::load(Some(&config_path)).await.unwrap();
        assert_eq!(config.supervisor.banner, "mirror sync");
        assert_eq!(config.logging.level, "debug");
    }
}
