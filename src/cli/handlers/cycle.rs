//! One-shot `cycle` and `ingest` commands

use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::services::{CycleOutcome, IngestionReport};

use super::{build_cycle, print_json};

pub struct CycleCommandHandler {
    config: Settings,
}

impl CycleCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Runs one cycle and prints its outcome as JSON.
    ///
    /// A failed cycle is still printed, then reported as an error so the
    /// process exits non-zero.
    pub async fn execute(&self) -> AppResult<()> {
        let cycle = build_cycle(&self.config).await?;
        let outcome = cycle.run().await;
        print_json(&outcome)?;

        match outcome {
            CycleOutcome::Failed { error } => Err(AppError::Internal {
                source: anyhow::anyhow!(error),
            }),
            _ => Ok(()),
        }
    }
}

pub struct IngestCommandHandler {
    config: Settings,
}

impl IngestCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(&self) -> AppResult<()> {
        let cycle = build_cycle(&self.config).await?;
        let report = cycle.ingest_only().await?;

        summarize(&report);
        print_json(&report)
    }
}

fn summarize(report: &IngestionReport) {
    for batch in &report.batches {
        eprintln!(
            "{}: fetched {}, inserted {}, duplicates {}, skipped {}, failed {}",
            batch.source.label(),
            batch.fetched,
            batch.inserted.len(),
            batch.duplicates,
            batch.skipped,
            batch.failed
        );
    }
    eprintln!("✓ {} new event(s) stored", report.inserted_count());
}
