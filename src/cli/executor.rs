//! Dispatches a parsed command to its handler

use super::handlers::{
    CycleCommandHandler, EventsCommandHandler, IngestCommandHandler, MigrateCommandHandler,
    NotificationsCommandHandler, RunCommandHandler,
};
use super::parser::{Cli, Commands};
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};

/// Execute a CLI command with the given settings
///
/// # Errors
/// Returns argument validation errors and errors from command handlers
pub async fn execute_command(cli: &Cli, settings: Settings) -> AppResult<()> {
    validate_command_args(cli)?;

    match &cli.command {
        None => RunCommandHandler::new(settings).execute(false).await,
        Some(Commands::Run { dry_run, .. }) => {
            RunCommandHandler::new(settings).execute(*dry_run).await
        }
        Some(Commands::Cycle) => CycleCommandHandler::new(settings).execute().await,
        Some(Commands::Ingest) => IngestCommandHandler::new(settings).execute().await,
        Some(Commands::Migrate { dry_run, rollback }) => {
            MigrateCommandHandler::new(settings)
                .execute(*dry_run, *rollback)
                .await
        }
        Some(Commands::Events { query }) => {
            EventsCommandHandler::new(settings).execute(query).await
        }
        Some(Commands::Notifications { action }) => {
            NotificationsCommandHandler::new(settings)
                .execute(action)
                .await
        }
    }
}

fn validate_command_args(cli: &Cli) -> AppResult<()> {
    cli.validate().map_err(|reason| AppError::Validation {
        field: "cli_arguments".to_string(),
        reason,
    })?;

    if let Some(Commands::Migrate {
        dry_run,
        rollback: Some(steps),
    }) = &cli.command
    {
        if *dry_run {
            return Err(AppError::Validation {
                field: "cli_arguments".to_string(),
                reason: "--dry-run and --rollback cannot be combined".to_string(),
            });
        }
        if *steps > 50 {
            eprintln!(
                "Warning: Rolling back {} migrations is a large operation. Consider using smaller steps.",
                steps
            );
        }
    }

    Ok(())
}
