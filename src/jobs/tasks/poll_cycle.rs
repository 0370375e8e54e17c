use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AppError, AppResult};
use crate::jobs::types::{JobContext, JobTask};
use crate::services::{AlertCycle, CycleOutcome};

/// Scheduled dispatch cycle
pub struct PollCycleTask {
    cycle: Arc<AlertCycle>,
}

impl PollCycleTask {
    pub fn new(cycle: Arc<AlertCycle>) -> Self {
        Self { cycle }
    }
}

#[async_trait]
impl JobTask for PollCycleTask {
    fn task_type() -> &'static str
    where
        Self: Sized,
    {
        "poll_cycle"
    }

    async fn execute(&self, ctx: JobContext) -> AppResult<()> {
        let outcome = tokio::select! {
            outcome = self.cycle.run() => outcome,
            _ = ctx.cancellation_token.cancelled() => {
                tracing::warn!(execution_id = %ctx.execution_id, "Cycle cancelled");
                return Ok(());
            }
        };

        match outcome {
            CycleOutcome::Failed { error } => Err(AppError::Internal {
                source: anyhow::anyhow!(error),
            }),
            _ => Ok(()),
        }
    }

    fn description(&self) -> Option<String> {
        Some("Fetch feeds, gate the strongest new event and dispatch alerts".to_string())
    }
}
