//! Tracing subscriber setup
//!
//! The in-process server has no console, so it logs to a file; the CLI logs
//! to stderr. Either way the filter comes from `MODFOLDER_LOG` when set,
//! otherwise from the configuration.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::Result;

/// Filter override read before the configured filter
pub const LOG_ENV: &str = "MODFOLDER_LOG";

/// Filter from the environment, falling back to `fallback`
pub fn filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Append plain-text log lines to `path`. A subscriber that is already
/// installed is left in place.
pub fn init_file(path: &Path, filter_directive: &str) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let _ = tracing_subscriber::registry()
        .with(filter(filter_directive))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_thread_ids(true)
                .with_writer(Mutex::new(file)),
        )
        .try_init();
    Ok(())
}

/// Log to stderr
pub fn init_stderr(filter_directive: &str) {
    let _ = tracing_subscriber::registry()
        .with(filter(filter_directive))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// File logging as configured for the in-process server
pub fn init_from_config(config: &Config) -> Result<()> {
    init_file(&config.log_path(), &config.log_filter)
}
