//! Storage ports used by the ingestion and dispatch services.

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{
    DeliveryStatus, EarthquakeEvent, EarthquakeSearch, EarthquakeStats, EventKey,
    FailedNotificationRecord, NewEarthquake, NewFailedNotification, NewNotification,
    NotificationRecord, Poll, Recipient, RecipientGroup,
};

/// Persisted event history, written only by the feed coordinator.
#[async_trait]
pub trait EarthquakeStore: Send + Sync {
    /// Whether an event with the same timestamp and coordinates is stored.
    async fn exists(&self, key: &EventKey) -> AppResult<bool>;

    /// Insert a new event.
    ///
    /// Returns `None` when the natural key is already taken, including when a
    /// concurrent writer won the race after `exists` returned false.
    async fn insert(&self, new: NewEarthquake) -> AppResult<Option<EarthquakeEvent>>;

    async fn find_by_id(&self, id: i64) -> AppResult<Option<EarthquakeEvent>>;
}

/// Read-side queries over the event history. Results are newest first.
#[async_trait]
pub trait EarthquakeQueries: Send + Sync {
    async fn latest(&self, limit: i64) -> AppResult<Vec<EarthquakeEvent>>;

    /// `date` is a `YYYY-MM-DD` calendar date
    async fn by_date(&self, date: &str, limit: i64) -> AppResult<Vec<EarthquakeEvent>>;

    async fn by_week(&self, year: i32, week: i32, limit: i64) -> AppResult<Vec<EarthquakeEvent>>;

    async fn by_month(&self, year: i32, month: i32, limit: i64)
    -> AppResult<Vec<EarthquakeEvent>>;

    async fn search(&self, filter: &EarthquakeSearch) -> AppResult<Vec<EarthquakeEvent>>;

    async fn stats(&self) -> AppResult<EarthquakeStats>;
}

/// Delivery audit trail.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn record_sent(&self, new: NewNotification) -> AppResult<NotificationRecord>;

    async fn record_failed(
        &self,
        new: NewFailedNotification,
    ) -> AppResult<FailedNotificationRecord>;

    /// Most recently created notification across all polls.
    async fn latest_sent(&self) -> AppResult<Option<NotificationRecord>>;

    /// Apply a status update reported by the channel.
    ///
    /// Returns false when no notification carries `message_id`.
    async fn apply_delivery_status(
        &self,
        message_id: &str,
        status: &DeliveryStatus,
    ) -> AppResult<bool>;
}

/// Poll configuration and subscriber membership. Read-only here.
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    async fn find_poll(&self, name: &str) -> AppResult<Option<Poll>>;

    /// Active groups subscribed to the poll.
    async fn groups_for_poll(&self, poll_id: i32) -> AppResult<Vec<RecipientGroup>>;

    /// Active recipients belonging to the group.
    async fn active_members(&self, group_id: i32) -> AppResult<Vec<Recipient>>;
}
