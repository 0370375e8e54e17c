//! `run` command: the long-lived scheduler process

use std::sync::Arc;
use std::time::Duration;

use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::jobs::tasks::PollCycleTask;
use crate::jobs::{JobExecutor, JobScheduler, JobTask, Trigger};

use super::{apply_pending_migrations, build_cycle};

pub struct RunCommandHandler {
    config: Settings,
}

impl RunCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Run until Ctrl-C, or validate and exit when `dry_run` is set.
    pub async fn execute(&self, dry_run: bool) -> AppResult<()> {
        if dry_run {
            return self.validate_only();
        }

        if self.config.database.auto_migrate {
            apply_pending_migrations(&self.config.database).await?;
        }

        let cycle = Arc::new(build_cycle(&self.config).await?);
        let task: Arc<dyn JobTask> = Arc::new(PollCycleTask::new(cycle));
        let job_name = PollCycleTask::task_type();

        let executor =
            JobExecutor::new(Duration::from_secs(self.config.scheduler.cycle_timeout_seconds));
        let scheduler = JobScheduler::new(executor).await?;
        scheduler
            .schedule(job_name, Trigger::from_config(&self.config.scheduler), task.clone())
            .await?;
        scheduler.start().await?;

        tracing::info!(
            poll = %self.config.alerting.poll_name,
            rehearsal = self.config.channel.rehearsal,
            "Scheduler started"
        );

        if self.config.scheduler.run_on_start {
            scheduler.run_now(job_name, task);
        }

        tokio::signal::ctrl_c().await.map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })?;

        tracing::info!("Shutdown signal received, stopping scheduler");
        scheduler.stop().await
    }

    /// Validate configuration without connecting anywhere
    pub fn validate_only(&self) -> AppResult<()> {
        self.config.validate()?;
        self.config.channel.validate_credentials()?;

        let trigger = match Trigger::from_config(&self.config.scheduler) {
            Trigger::Interval(every) => format!("every {}s", every.as_secs()),
            Trigger::Cron(expr) => format!("cron '{}'", expr),
        };

        println!("✓ Configuration is valid");
        println!("✓ Poll '{}' scheduled {}", self.config.alerting.poll_name, trigger);
        println!(
            "✓ Primary feed {} ({:?})",
            self.config.feeds.primary.label(),
            self.config.feeds.priority
        );
        println!(
            "✓ Sending to {}{}",
            self.config.channel.effective_base_url(),
            if self.config.channel.rehearsal { " (rehearsal)" } else { "" }
        );
        println!("Dry run completed successfully");
        Ok(())
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}
