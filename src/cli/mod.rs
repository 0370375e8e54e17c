//! Command-line interface for seismo-rs
//!
//! Parsing, configuration merging and one handler per command.

pub mod config_merger;
pub mod executor;
pub mod handlers;
pub mod parser;
pub mod validation;

pub use config_merger::ConfigurationMerger;
pub use executor::execute_command;
pub use parser::{Cli, Commands, Environment, EventsCommand, LogLevel, NotificationsCommand};

use crate::config::settings::Settings;
use crate::logger::init_logger;

/// Load files and environment, then apply CLI overrides and validate.
///
/// # Errors
/// Returns error if configuration loading, merging, or validation fails
pub fn load_and_merge_config(cli: &Cli) -> anyhow::Result<Settings> {
    let merger =
        ConfigurationMerger::from_config_path(cli.config.as_deref(), cli.env.map(Into::into))
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    merger
        .merge_cli_args(cli)
        .map_err(|e| anyhow::anyhow!("Configuration merge error: {}", e))
}

/// Initialize the global subscriber from the `[logger]` section
pub fn init_logger_from_settings(settings: &Settings) -> anyhow::Result<()> {
    let logger_config = settings
        .logger
        .clone()
        .into_logger_config()
        .map_err(|e| anyhow::anyhow!("Logger configuration error: {}", e))?;

    init_logger(logger_config)
}
