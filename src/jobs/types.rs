use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AppResult;

/// Handed to every run; one per execution
#[derive(Clone)]
pub struct JobContext {
    pub execution_id: Uuid,
    pub job_name: String,
    /// Cancelled when the run exceeds its timeout
    pub cancellation_token: CancellationToken,
}

/// Final status of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Failed,
    Timeout,
    /// The previous run of the same job was still in flight
    Skipped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Timeout => "timeout",
            JobStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of scheduled work, run by [`crate::jobs::JobExecutor`]
#[async_trait]
pub trait JobTask: Send + Sync {
    /// Doubles as the job name in the scheduler and in run guards
    fn task_type() -> &'static str
    where
        Self: Sized;

    async fn execute(&self, ctx: JobContext) -> AppResult<()>;

    fn description(&self) -> Option<String> {
        None
    }
}
