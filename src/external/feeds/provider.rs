use async_trait::async_trait;
use jiff::Timestamp;

use crate::error::AppResult;
use crate::models::{FeedSource, ParsedEvent};

/// Filters passed to a feed. Unset fields fall back to the feed's defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedQuery {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    /// Events below this magnitude are dropped
    pub min_magnitude: Option<f64>,
    pub max_magnitude: Option<f64>,
    pub limit: Option<u32>,
}

impl FeedQuery {
    /// Query holding only a magnitude floor.
    pub fn with_floor(floor: f64) -> Self {
        Self {
            min_magnitude: Some(floor),
            ..Default::default()
        }
    }

    pub fn floor(&self) -> f64 {
        self.min_magnitude.unwrap_or(0.0)
    }
}

/// Records a feed produced in one fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedBatch {
    pub events: Vec<ParsedEvent>,
    /// Records that were present but could not be used
    pub skipped: usize,
}

/// Upstream seismic feed.
///
/// `Err` means the whole source is unusable for this cycle
/// ([`AppError::Network`](crate::error::AppError::Network) or
/// [`AppError::Parse`](crate::error::AppError::Parse)). Problems with
/// individual records are logged and counted in [`FeedBatch::skipped`].
#[async_trait]
pub trait FeedProvider: Send + Sync {
    fn source(&self) -> FeedSource;

    async fn fetch(&self, query: &FeedQuery) -> AppResult<FeedBatch>;
}
