//! Command handlers for CLI operations
//!
//! Each handler owns the merged settings and wires only what its command
//! needs.

pub mod cycle;
pub mod events;
pub mod migrate;
pub mod notifications;
pub mod run;

pub use cycle::{CycleCommandHandler, IngestCommandHandler};
pub use events::EventsCommandHandler;
pub use migrate::{MigrateCommandHandler, apply_pending_migrations};
pub use notifications::NotificationsCommandHandler;
pub use run::RunCommandHandler;

use std::sync::Arc;

use serde::Serialize;

use crate::config::settings::Settings;
use crate::db::establish_async_connection_pool;
use crate::error::{AppError, AppResult};
use crate::repositories::Repositories;
use crate::services::AlertCycle;
use crate::services::notifications::WhatsAppChannel;
use crate::storage::StoragePorts;

async fn connect(settings: &Settings) -> AppResult<Repositories> {
    let pool = establish_async_connection_pool(&settings.database).await?;
    tracing::debug!(max_connections = settings.database.max_connections, "Database pool ready");
    Ok(Repositories::new(pool))
}

/// Production cycle over Postgres and the WhatsApp channel
async fn build_cycle(settings: &Settings) -> AppResult<AlertCycle> {
    let repos = connect(settings).await?;
    let channel = Arc::new(WhatsAppChannel::new(settings.channel.clone()));
    AlertCycle::from_settings(settings, StoragePorts::from_repositories(repos), channel)
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(|e| AppError::Internal {
        source: anyhow::Error::from(e),
    })?;
    println!("{}", rendered);
    Ok(())
}
