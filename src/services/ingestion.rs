//! Feed coordination and persistence.
//!
//! Sources are fetched one after the other, primary first. Every fetched
//! record is checked against the stored history by its natural key and
//! inserted when new; only newly inserted rows are reported. A row the store
//! refuses is counted and left for the next run to retry.

use std::sync::Arc;

use jiff::tz::Offset;
use serde::Serialize;

use crate::config::{FeedsConfig, PriorityMode};
use crate::error::{AppError, AppResult};
use crate::external::feeds::{AfadFeed, FeedBatch, FeedProvider, FeedQuery, KandilliFeed};
use crate::models::{EarthquakeEvent, FeedSource, NewEarthquake};
use crate::storage::EarthquakeStore;

/// Whether a batch may trigger an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchRole {
    Actionable,
    /// Persisted for the record only
    HistoryOnly,
}

/// Result of one source in one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionBatch {
    pub source: FeedSource,
    pub role: BatchRole,
    /// Rows inserted by this run
    pub inserted: Vec<EarthquakeEvent>,
    /// Records returned by the feed at or above the floor
    pub fetched: usize,
    /// Records already stored
    pub duplicates: usize,
    /// Records the feed returned but could not be normalized
    pub skipped: usize,
    /// Records the store failed to check or insert
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestionReport {
    pub batches: Vec<IngestionBatch>,
}

impl IngestionReport {
    /// Newly inserted events that may trigger an alert
    pub fn actionable(&self) -> impl Iterator<Item = &EarthquakeEvent> {
        self.batches
            .iter()
            .filter(|b| b.role == BatchRole::Actionable)
            .flat_map(|b| b.inserted.iter())
    }

    pub fn inserted_count(&self) -> usize {
        self.batches.iter().map(|b| b.inserted.len()).sum()
    }
}

pub struct FeedCoordinator {
    primary: Arc<dyn FeedProvider>,
    secondary: Arc<dyn FeedProvider>,
    store: Arc<dyn EarthquakeStore>,
    mode: PriorityMode,
    floor_margin: f64,
    calendar_offset: Offset,
}

impl FeedCoordinator {
    pub fn new(
        primary: Arc<dyn FeedProvider>,
        secondary: Arc<dyn FeedProvider>,
        store: Arc<dyn EarthquakeStore>,
        mode: PriorityMode,
        floor_margin: f64,
        calendar_offset: Offset,
    ) -> Self {
        Self {
            primary,
            secondary,
            store,
            mode,
            floor_margin,
            calendar_offset,
        }
    }

    /// Build the production coordinator with both HTTP feeds.
    pub fn from_config(config: &FeedsConfig, store: Arc<dyn EarthquakeStore>) -> AppResult<Self> {
        let afad: Arc<dyn FeedProvider> = Arc::new(AfadFeed::new(config.afad.clone())?);
        let kandilli: Arc<dyn FeedProvider> = Arc::new(KandilliFeed::new(config.kandilli.clone())?);
        let (primary, secondary) = match config.primary {
            FeedSource::Afad => (afad, kandilli),
            FeedSource::Kandilli => (kandilli, afad),
        };

        let calendar_offset = Offset::from_hours(config.calendar_offset_hours).map_err(|e| {
            AppError::Validation {
                field: "feeds.calendar_offset_hours".to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self::new(
            primary,
            secondary,
            store,
            config.priority,
            config.floor_margin,
            calendar_offset,
        ))
    }

    /// Fetch and persist new events for a poll threshold of `min_magnitude`.
    ///
    /// Fails only when no source produced a batch.
    pub async fn run(&self, min_magnitude: f64) -> AppResult<IngestionReport> {
        let query = FeedQuery::with_floor(min_magnitude - self.floor_margin);
        let mut report = IngestionReport::default();

        let primary = self.fetch(self.primary.as_ref(), &query).await;
        let primary_failed = primary.is_err();

        let secondary_role = match self.mode {
            PriorityMode::AlwaysBoth => BatchRole::Actionable,
            PriorityMode::PrimaryWithFailover if primary_failed => BatchRole::Actionable,
            PriorityMode::PrimaryWithFailover => BatchRole::HistoryOnly,
        };

        let primary_error = match primary {
            Ok(batch) => {
                report
                    .batches
                    .push(self.persist(self.primary.source(), BatchRole::Actionable, batch).await);
                None
            }
            Err(e) => {
                tracing::warn!(
                    source = %self.primary.source(),
                    error = %e,
                    "Primary feed failed"
                );
                Some(e)
            }
        };

        match self.fetch(self.secondary.as_ref(), &query).await {
            Ok(batch) => report
                .batches
                .push(self.persist(self.secondary.source(), secondary_role, batch).await),
            Err(e) => match primary_error {
                Some(primary_error) => {
                    tracing::error!(
                        source = %self.secondary.source(),
                        error = %e,
                        "Secondary feed failed too"
                    );
                    return Err(AppError::ExternalApi {
                        platform: "feeds".to_string(),
                        message: format!(
                            "all feeds failed ({}: {}; {}: {})",
                            self.primary.source(),
                            primary_error,
                            self.secondary.source(),
                            e
                        ),
                        source: Some(anyhow::Error::new(e)),
                    });
                }
                None => {
                    tracing::warn!(
                        source = %self.secondary.source(),
                        error = %e,
                        "Secondary feed failed"
                    );
                }
            },
        }

        Ok(report)
    }

    async fn fetch(&self, feed: &dyn FeedProvider, query: &FeedQuery) -> AppResult<FeedBatch> {
        let batch = feed.fetch(query).await?;
        if batch.skipped > 0 {
            tracing::warn!(source = %feed.source(), skipped = batch.skipped, "Feed records skipped");
        }
        Ok(batch)
    }

    async fn persist(
        &self,
        source: FeedSource,
        role: BatchRole,
        batch: FeedBatch,
    ) -> IngestionBatch {
        let mut result = IngestionBatch {
            source,
            role,
            inserted: Vec::new(),
            fetched: batch.events.len(),
            duplicates: 0,
            skipped: batch.skipped,
            failed: 0,
        };

        for event in batch.events {
            let timestamp = event.timestamp;
            match self.store.exists(&event.key()).await {
                Ok(true) => {
                    result.duplicates += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(%source, %timestamp, error = %e, "Duplicate check failed");
                    result.failed += 1;
                    continue;
                }
            }

            match self
                .store
                .insert(NewEarthquake::from_parsed(event, self.calendar_offset))
                .await
            {
                Ok(Some(inserted)) => result.inserted.push(inserted),
                // Lost a race with another writer for the same key
                Ok(None) | Err(AppError::Duplicate { .. }) => result.duplicates += 1,
                Err(e) => {
                    tracing::warn!(%source, %timestamp, error = %e, "Event insert failed");
                    result.failed += 1;
                }
            }
        }

        tracing::info!(
            %source,
            role = ?role,
            fetched = result.fetched,
            inserted = result.inserted.len(),
            duplicates = result.duplicates,
            failed = result.failed,
            "Batch persisted"
        );
        result
    }
}
