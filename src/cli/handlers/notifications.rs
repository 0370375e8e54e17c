//! Delivery audit commands

use std::path::Path;
use std::sync::Arc;

use crate::cli::parser::NotificationsCommand;
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::services::notifications::apply_status_payload;
use crate::storage::NotificationStore;

use super::{connect, print_json};

pub struct NotificationsCommandHandler {
    config: Settings,
}

impl NotificationsCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(&self, command: &NotificationsCommand) -> AppResult<()> {
        match command {
            NotificationsCommand::ApplyStatus { file } => {
                let body = read_payload(file).await?;
                let repos = connect(&self.config).await?;
                let store: Arc<dyn NotificationStore> = Arc::new(repos.notifications);

                let report = apply_status_payload(&store, &body).await?;
                tracing::info!(applied = report.applied, unknown = report.unknown, "Status payload applied");
                print_json(&report)
            }
            NotificationsCommand::Failures { event } => {
                let repos = connect(&self.config).await?;
                let failures = repos.notifications.failures_for_event(*event).await?;
                if failures.is_empty() {
                    eprintln!("No failed deliveries recorded for event {}", event);
                }
                print_json(&failures)
            }
        }
    }
}

async fn read_payload(path: &Path) -> AppResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::BadRequest {
            message: format!("Cannot read status payload '{}': {}", path.display(), e),
        })
}
