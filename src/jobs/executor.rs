use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::jobs::error::{JobError, JobResult};
use crate::jobs::types::{JobContext, JobStatus, JobTask};

/// Job names with a run in flight
#[derive(Clone, Default)]
pub struct ConcurrencyTracker {
    running: Arc<RwLock<HashSet<String>>>,
}

impl ConcurrencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `job_name` as running; false if it already is.
    pub async fn try_acquire(&self, job_name: &str) -> bool {
        self.running.write().await.insert(job_name.to_string())
    }

    pub async fn release(&self, job_name: &str) {
        self.running.write().await.remove(job_name);
    }

    pub async fn is_running(&self, job_name: &str) -> bool {
        self.running.read().await.contains(job_name)
    }
}

/// Runs tasks with a timeout and a skip-if-running guard
#[derive(Clone)]
pub struct JobExecutor {
    concurrency: ConcurrencyTracker,
    timeout: Duration,
}

impl JobExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            concurrency: ConcurrencyTracker::new(),
            timeout,
        }
    }

    /// Run `task` once under `job_name`.
    ///
    /// A trigger that arrives while the previous run is still in flight is
    /// refused with `JobError::AlreadyRunning`.
    pub async fn execute_job(&self, job_name: &str, task: Arc<dyn JobTask>) -> JobResult<()> {
        if !self.concurrency.try_acquire(job_name).await {
            return Err(JobError::AlreadyRunning(job_name.to_string()));
        }

        let result = self.execute_once(job_name, task).await;
        self.concurrency.release(job_name).await;

        result
    }

    /// Log the outcome of `execute_job` and reduce it to a status.
    pub async fn run_logged(&self, job_name: &str, task: Arc<dyn JobTask>) -> JobStatus {
        match self.execute_job(job_name, task).await {
            Ok(()) => JobStatus::Success,
            Err(JobError::AlreadyRunning(_)) => {
                tracing::warn!(job = job_name, "Previous run still in flight, trigger skipped");
                JobStatus::Skipped
            }
            Err(e @ JobError::Timeout(_)) => {
                tracing::error!(job = job_name, error = %e, "Job timed out");
                JobStatus::Timeout
            }
            Err(e) => {
                tracing::error!(job = job_name, error = %e, "Job execution failed");
                JobStatus::Failed
            }
        }
    }

    async fn execute_once(&self, job_name: &str, task: Arc<dyn JobTask>) -> JobResult<()> {
        let execution_id = Uuid::new_v4();
        let start_time = Instant::now();
        let cancellation_token = CancellationToken::new();

        let ctx = JobContext {
            execution_id,
            job_name: job_name.to_string(),
            cancellation_token: cancellation_token.clone(),
        };

        tracing::debug!(
            job = job_name,
            %execution_id,
            description = task.description().as_deref().unwrap_or_default(),
            "Job started"
        );

        let run = AssertUnwindSafe(task.execute(ctx)).catch_unwind();
        let result = tokio::time::timeout(self.timeout, run).await;
        let duration_ms = start_time.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(Ok(()))) => {
                tracing::info!(job = job_name, %execution_id, duration_ms, "Job completed");
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(JobError::ExecutionFailed(e.to_string())),
            Ok(Err(panic)) => Err(JobError::Panicked(panic_message(panic.as_ref()))),
            Err(_) => {
                cancellation_token.cancel();
                Err(JobError::Timeout(self.timeout.as_secs()))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
