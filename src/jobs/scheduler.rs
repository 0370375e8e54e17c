use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler as TokioCronScheduler};

use crate::config::SchedulerConfig;
use crate::error::{AppError, AppResult};
use crate::jobs::error::JobError;
use crate::jobs::executor::JobExecutor;
use crate::jobs::types::JobTask;

/// When a job fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Interval(Duration),
    /// Cron expression with a leading seconds field
    Cron(String),
}

impl Trigger {
    /// Cron wins over the interval when both are set
    pub fn from_config(config: &SchedulerConfig) -> Self {
        match &config.cron {
            Some(expr) => Trigger::Cron(expr.clone()),
            None => Trigger::Interval(Duration::from_secs(config.interval_seconds)),
        }
    }
}

/// Wrapper around tokio-cron-scheduler that routes every run through the
/// shared executor
pub struct JobScheduler {
    scheduler: Arc<Mutex<TokioCronScheduler>>,
    executor: Arc<JobExecutor>,
}

impl JobScheduler {
    pub async fn new(executor: JobExecutor) -> AppResult<Self> {
        let scheduler = TokioCronScheduler::new()
            .await
            .map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })?;

        Ok(Self {
            scheduler: Arc::new(Mutex::new(scheduler)),
            executor: Arc::new(executor),
        })
    }

    pub async fn start(&self) -> AppResult<()> {
        self.scheduler
            .lock()
            .await
            .start()
            .await
            .map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })?;
        Ok(())
    }

    /// Stop the scheduler gracefully
    pub async fn stop(&self) -> AppResult<()> {
        self.scheduler
            .lock()
            .await
            .shutdown()
            .await
            .map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })?;
        Ok(())
    }

    /// Run `task` once right away, outside the schedule but under the same
    /// skip-if-running guard.
    pub fn run_now(&self, job_name: &str, task: Arc<dyn JobTask>) {
        let executor = Arc::clone(&self.executor);
        let job_name = job_name.to_string();
        tokio::spawn(async move {
            executor.run_logged(&job_name, task).await;
        });
    }

    pub async fn schedule(
        &self,
        job_name: &str,
        trigger: Trigger,
        task: Arc<dyn JobTask>,
    ) -> AppResult<()> {
        let executor = Arc::clone(&self.executor);
        let name = job_name.to_string();

        let run = move |_uuid, _lock| {
            let executor = Arc::clone(&executor);
            let task = Arc::clone(&task);
            let name = name.clone();
            Box::pin(async move {
                executor.run_logged(&name, task).await;
            }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        };

        let job = match &trigger {
            Trigger::Interval(every) => Job::new_repeated_async(*every, run)
                .map_err(|e| JobError::Scheduler(e.to_string()))?,
            Trigger::Cron(expr) => Job::new_async(expr.as_str(), run)
                .map_err(|e| JobError::InvalidCronExpression(format!("{}: {}", expr, e)))?,
        };

        self.scheduler
            .lock()
            .await
            .add(job)
            .await
            .map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })?;

        tracing::info!(job = job_name, trigger = ?trigger, "Job scheduled");
        Ok(())
    }
}
