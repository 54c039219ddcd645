mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use modfolder::Config;
use tracing::warn;

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    modfolder::logging::init_stderr(cli.log.as_deref().unwrap_or(&config.log_filter));
    if let Some(e) = config_error {
        warn!("Using default configuration: {}", e);
    }

    match cli.command {
        Commands::Modules { json } => {
            commands::modules::list(json)?;
        }

        Commands::Load { paths, list } => {
            commands::modules::load(&paths, list)?;
        }

        Commands::Unload { address, limit } => {
            commands::modules::unload(&address, limit.unwrap_or(config.unload_attempt_limit))?;
        }

        Commands::Pidl { command } => match command {
            PidlCommand::Encode { path, base, size } => {
                commands::pidl::encode(&path, &base, &size)?;
            }
            PidlCommand::Decode { hex, json } => {
                commands::pidl::decode(&hex, json)?;
            }
        },

        Commands::Register { dll } => {
            commands::server::register(&dll)?;
        }

        Commands::Unregister { dll } => {
            commands::server::unregister(&dll)?;
        }

        Commands::Config {
            show,
            log_filter,
            log_file,
            unload_attempt_limit,
            error_dialogs,
            display_name,
        } => {
            let update = commands::configure::ConfigUpdate {
                log_filter,
                log_file,
                unload_attempt_limit,
                error_dialogs,
                display_name,
            };
            commands::configure::handle(config, update, show)?;
        }
    }

    Ok(())
}
