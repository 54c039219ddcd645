//! Configuration management for modfolder

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Overrides the log file location
pub const LOG_FILE_ENV: &str = "MODFOLDER_LOG_FILE";

/// Namespace parent the folder is attached under ("This PC")
pub const DEFAULT_NAMESPACE_PARENT: &str = "::{20D04FE0-3AEA-1069-A2D8-08002B30309D}";

pub const DEFAULT_DISPLAY_NAME: &str = "Explorer Modules";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `tracing` filter directive, e.g. `info` or `modfolder=trace`
    pub log_filter: String,
    pub log_file: Option<PathBuf>,
    /// Reference drops attempted before an unload gives up
    pub unload_attempt_limit: usize,
    /// Show a dialog when a dropped module fails to load
    pub error_dialogs: bool,
    pub namespace_parent: String,
    pub display_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            log_file: None,
            unload_attempt_limit: crate::inventory::DEFAULT_UNLOAD_ATTEMPT_LIMIT,
            error_dialogs: true,
            namespace_parent: DEFAULT_NAMESPACE_PARENT.to_string(),
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".into()))?
            .join("modfolder");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a file, or defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Log file to write to: environment override, then config, then the
    /// temp directory
    pub fn log_path(&self) -> PathBuf {
        std::env::var_os(LOG_FILE_ENV)
            .map(PathBuf::from)
            .or_else(|| self.log_file.clone())
            .unwrap_or_else(|| std::env::temp_dir().join("modfolder.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.unload_attempt_limit, 100);
        assert!(config.error_dialogs);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            log_filter: "modfolder=trace".to_string(),
            log_file: Some(PathBuf::from("/tmp/folder.log")),
            unload_attempt_limit: 7,
            error_dialogs: false,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "display_name = \"Modules\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.display_name, "Modules");
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.namespace_parent, DEFAULT_NAMESPACE_PARENT);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "unload_attempt_limit = \"lots\"").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_log_path_from_config() {
        let config = Config {
            log_file: Some(PathBuf::from("/var/log/mf.log")),
            ..Config::default()
        };
        if std::env::var_os(LOG_FILE_ENV).is_none() {
            assert_eq!(config.log_path(), PathBuf::from("/var/log/mf.log"));
        }
    }
}
