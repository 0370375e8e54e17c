//! Service layer: ingestion, alerting and delivery.
//!
//! Services talk to storage only through the [`crate::storage`] ports, so
//! the same wiring runs against Postgres or the in-memory store.

pub mod alerting;
mod cycle;
mod ingestion;
pub mod notifications;

#[cfg(test)]
pub(crate) mod tests;

pub use cycle::{AlertCycle, CycleOutcome};
pub use ingestion::{BatchRole, FeedCoordinator, IngestionBatch, IngestionReport};
