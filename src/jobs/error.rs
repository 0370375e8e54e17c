use thiserror::Error;

use crate::error::AppError;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Job execution timeout after {0}s")]
    Timeout(u64),

    #[error("Job panicked: {0}")]
    Panicked(String),

    /// Skip-if-running refused the trigger
    #[error("Previous run of {0} still in flight")]
    AlreadyRunning(String),

    #[error("Invalid cron expression: {0}")]
    InvalidCronExpression(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::InvalidCronExpression(_) => AppError::Configuration {
                key: "scheduler.cron".to_string(),
                source: anyhow::Error::new(err),
            },
            other => AppError::Internal {
                source: anyhow::Error::new(other),
            },
        }
    }
}

pub type JobResult<T> = Result<T, JobError>;
