//! Core CLI definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "modfolder")]
#[command(about = "Inspect the modules view outside of the shell", long_about = None)]
pub struct Cli {
    /// Log filter, overriding the configured one (e.g. `debug`)
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the modules mapped into this process
    #[command(visible_alias = "ls")]
    Modules {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load modules that are not loaded yet
    Load {
        /// Module paths
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// List the modules afterwards
        #[arg(short, long)]
        list: bool,
    },

    /// Drop every reference to the module mapped at an address
    Unload {
        /// Base address (hex, with or without 0x)
        address: String,

        /// Maximum reference drops (defaults to the configured limit)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Item identifier operations (encode, decode)
    #[command(visible_alias = "p")]
    Pidl {
        #[command(subcommand)]
        command: PidlCommand,
    },

    /// Register the shell server DLL for the current user
    Register {
        /// Path to modfolder_shell.dll
        dll: PathBuf,
    },

    /// Remove the shell server's registration
    Unregister {
        /// Path to modfolder_shell.dll
        dll: PathBuf,
    },

    /// Show or change configuration
    #[command(visible_alias = "c")]
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Set the log filter
        #[arg(long)]
        log_filter: Option<String>,

        /// Set the log file
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Set the unload attempt limit
        #[arg(long)]
        unload_attempt_limit: Option<usize>,

        /// Enable or disable load failure dialogs
        #[arg(long)]
        error_dialogs: Option<bool>,

        /// Set the folder's display name
        #[arg(long)]
        display_name: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PidlCommand {
    /// Encode a module record as an item identifier (hex)
    Encode {
        /// Module path
        #[arg(long)]
        path: String,

        /// Base address (hex, with or without 0x)
        #[arg(long)]
        base: String,

        /// Image size (decimal, or hex with 0x)
        #[arg(long)]
        size: String,
    },

    /// Decode an item identifier (hex) back to its module record
    Decode {
        /// Identifier bytes as hex
        hex: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
