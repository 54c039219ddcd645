//! Configuration command handlers
//!
//! Handles the `config` subcommand for showing and changing settings shared
//! by the CLI and the shell server.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use modfolder::Config;

/// Values to change; `None` leaves a setting alone
#[derive(Debug, Default)]
pub struct ConfigUpdate {
    pub log_filter: Option<String>,
    pub log_file: Option<PathBuf>,
    pub unload_attempt_limit: Option<usize>,
    pub error_dialogs: Option<bool>,
    pub display_name: Option<String>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.log_filter.is_none()
            && self.log_file.is_none()
            && self.unload_attempt_limit.is_none()
            && self.error_dialogs.is_none()
            && self.display_name.is_none()
    }

    /// Apply the update, returning whether anything changed
    pub fn apply(self, config: &mut Config) -> bool {
        let before = config.clone();
        if let Some(filter) = self.log_filter {
            config.log_filter = filter;
        }
        if let Some(path) = self.log_file {
            config.log_file = Some(path);
        }
        if let Some(limit) = self.unload_attempt_limit {
            config.unload_attempt_limit = limit.max(1);
        }
        if let Some(enabled) = self.error_dialogs {
            config.error_dialogs = enabled;
        }
        if let Some(name) = self.display_name {
            config.display_name = name;
        }
        *config != before
    }
}

/// Handle the config command
pub fn handle(mut config: Config, update: ConfigUpdate, show: bool) -> Result<()> {
    if update.is_empty() {
        if !show {
            show_usage();
        }
    } else {
        let path = Config::config_path().context("No configuration directory")?;
        if save_update(&mut config, update, &path)? {
            println!("Config saved to: {}", path.display());
        } else {
            println!("Configuration unchanged");
        }
    }

    if show {
        show_config(&config)?;
    }
    Ok(())
}

/// Apply `update` and write the result to `path` if anything changed
fn save_update(config: &mut Config, update: ConfigUpdate, path: &Path) -> Result<bool> {
    if !update.apply(config) {
        return Ok(false);
    }
    config
        .save_to(path)
        .with_context(|| format!("Failed to save configuration to {}", path.display()))?;
    Ok(true)
}

/// Display current configuration
fn show_config(config: &Config) -> Result<()> {
    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
    println!("Log file: {}", config.log_path().display());
    println!();
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn show_usage() {
    println!("Usage: modfolder config --show");
    println!("   or: modfolder config --log-filter debug --error-dialogs false");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_usage_does_not_panic() {
        show_usage();
    }

    #[test]
    fn test_apply_update() {
        let mut config = Config::default();
        let update = ConfigUpdate {
            log_filter: Some("modfolder=trace".into()),
            unload_attempt_limit: Some(0),
            error_dialogs: Some(false),
            ..Default::default()
        };
        assert!(update.apply(&mut config));
        assert_eq!(config.log_filter, "modfolder=trace");
        assert_eq!(config.unload_attempt_limit, 1);
        assert!(!config.error_dialogs);
    }

    #[test]
    fn test_apply_same_values_is_unchanged() {
        let mut config = Config::default();
        let update = ConfigUpdate {
            display_name: Some(config.display_name.clone()),
            ..Default::default()
        };
        assert!(!update.is_empty());
        assert!(!update.apply(&mut config));
    }

    #[test]
    fn test_show_config() {
        assert!(show_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_saved_update_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modfolder").join("config.toml");

        let mut config = Config::default();
        let update = ConfigUpdate {
            display_name: Some("Loaded Modules".into()),
            unload_attempt_limit: Some(7),
            ..Default::default()
        };
        assert!(save_update(&mut config, update, &path).unwrap());

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
        assert_eq!(reloaded.display_name, "Loaded Modules");
        assert_eq!(reloaded.unload_attempt_limit, 7);
    }

    #[test]
    fn test_unchanged_update_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        let update = ConfigUpdate {
            error_dialogs: Some(config.error_dialogs),
            ..Default::default()
        };
        assert!(!save_update(&mut config, update, &path).unwrap());
        assert!(!path.exists());
    }
}
