//! Migrate command handler
//!
//! `MigrationHarness` needs a synchronous `PgConnection`, so every operation
//! runs on a blocking thread.

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_migrations::MigrationHarness;

use crate::config::DatabaseConfig;
use crate::config::settings::Settings;
use crate::db::MIGRATIONS;
use crate::error::{AppError, AppResult};

pub struct MigrateCommandHandler {
    config: Settings,
}

impl MigrateCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// # Errors
    /// - Database connection errors
    /// - Migration execution errors
    /// - Rollback steps outside the applied history
    pub async fn execute(&self, dry_run: bool, rollback: Option<u32>) -> AppResult<()> {
        self.config.database.validate()?;

        if dry_run {
            return self.show_pending_migrations().await;
        }

        match rollback {
            Some(steps) => self.rollback_migrations(steps).await,
            None => {
                println!("Running database migrations...");
                let applied = apply_pending_migrations(&self.config.database).await?;
                if applied.is_empty() {
                    println!("✓ No migrations to apply - database is already up to date");
                } else {
                    println!("✓ Applied {} migration(s):", applied.len());
                    for migration in &applied {
                        println!("  - {}", migration);
                    }
                }
                Ok(())
            }
        }
    }

    async fn show_pending_migrations(&self) -> AppResult<()> {
        println!("Checking for pending migrations...");

        let pending: Vec<String> =
            with_connection(&self.config.database, "check pending migrations", |conn| {
                conn.pending_migrations(MIGRATIONS)
                    .map(|pending| pending.iter().map(|m| m.name().to_string()).collect())
            })
            .await?;

        if pending.is_empty() {
            println!("✓ No pending migrations found - database is up to date");
        } else {
            println!("Found {} pending migration(s):", pending.len());
            for name in &pending {
                println!("  - {}", name);
            }
            println!("\nRun without --dry-run to apply these migrations");
        }

        Ok(())
    }

    async fn rollback_migrations(&self, steps: u32) -> AppResult<()> {
        if steps == 0 {
            return Err(AppError::Validation {
                field: "rollback_steps".to_string(),
                reason: "Number of rollback steps must be greater than 0".to_string(),
            });
        }

        println!("Rolling back {} migration(s)...", steps);

        let applied = with_connection(&self.config.database, "get applied migrations", |conn| {
            conn.applied_migrations().map(|versions| versions.len())
        })
        .await?;

        if applied < steps as usize {
            return Err(AppError::Validation {
                field: "rollback_steps".to_string(),
                reason: format!(
                    "Cannot rollback {} migrations - only {} applied migrations available",
                    steps, applied
                ),
            });
        }

        let reverted: Vec<String> =
            with_connection(&self.config.database, "revert migration", move |conn| {
                let mut reverted = Vec::with_capacity(steps as usize);
                for _ in 0..steps {
                    reverted.push(conn.revert_last_migration(MIGRATIONS)?.to_string());
                }
                Ok(reverted)
            })
            .await?;

        println!("✓ Rolled back {} migration(s):", reverted.len());
        for version in &reverted {
            println!("  - {}", version);
        }

        Ok(())
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}

/// Apply every pending migration, returning the applied versions.
///
/// Shared by `migrate` and by `run` when `database.auto_migrate` is set.
pub async fn apply_pending_migrations(config: &DatabaseConfig) -> AppResult<Vec<String>> {
    let applied = with_connection(config, "run pending migrations", |conn| {
        conn.run_pending_migrations(MIGRATIONS)
            .map(|versions| versions.iter().map(|v| v.to_string()).collect::<Vec<_>>())
    })
    .await?;

    tracing::info!(count = applied.len(), "Database migrations applied");
    Ok(applied)
}

type HarnessError = Box<dyn std::error::Error + Send + Sync>;

async fn with_connection<T, F>(
    config: &DatabaseConfig,
    operation: &'static str,
    work: F,
) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, HarnessError> + Send + 'static,
{
    let database_url = config.url.clone();

    tokio::task::spawn_blocking(move || {
        let mut conn = PgConnection::establish(&database_url).map_err(|e| AppError::Database {
            operation: format!("establish connection to {}", operation),
            source: anyhow::anyhow!("Connection error: {}", e),
        })?;

        work(&mut conn).map_err(|e| AppError::Database {
            operation: operation.to_string(),
            source: anyhow::anyhow!("Migration error: {}", e),
        })
    })
    .await
    .map_err(|e| AppError::Internal {
        source: anyhow::Error::from(e),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Settings {
        let mut config = Settings::default();
        config.database.url = "postgres://localhost/test".to_string();
        config
    }

    #[test]
    fn test_migrate_handler_new() {
        let config = create_valid_config();
        let handler = MigrateCommandHandler::new(config.clone());
        assert_eq!(handler.config(), &config);
    }

    #[tokio::test]
    async fn test_migrate_handler_zero_rollback_steps() {
        let handler = MigrateCommandHandler::new(create_valid_config());

        let result = handler.execute(false, Some(0)).await;

        match result {
            Err(AppError::Validation { field, reason }) => {
                assert_eq!(field, "rollback_steps");
                assert!(reason.contains("must be greater than 0"));
            }
            other => panic!("Expected validation error for zero rollback steps, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_migrate_handler_rejects_missing_database_url() {
        let handler = MigrateCommandHandler::new(Settings::default());
        let result = handler.execute(true, None).await;
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }
}
