//! Notification repository for async database operations.
//!
//! Provides operations for the notifications and failed_notifications tables.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use jiff_diesel::ToDiesel;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::models::{
    DeliveryStatus, FailedNotificationRecord, FailureReason, NewFailedNotification,
    NewNotification, NotificationRecord,
};
use crate::storage::NotificationStore;

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationRow {
    pub message_id: String,
    pub recipient_id: i32,
    pub earthquake_id: i64,
    pub poll_name: String,
    pub is_read: bool,
    pub message: Option<String>,
    pub created_at: jiff_diesel::Timestamp,
    pub updated_at: jiff_diesel::Timestamp,
}

impl From<NotificationRow> for NotificationRecord {
    fn from(row: NotificationRow) -> Self {
        Self {
            message_id: row.message_id,
            recipient_id: row.recipient_id,
            earthquake_id: row.earthquake_id,
            poll_name: row.poll_name,
            is_read: row.is_read,
            message: row.message,
            created_at: row.created_at.to_jiff(),
            updated_at: row.updated_at.to_jiff(),
        }
    }
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = crate::schema::notifications)]
pub struct NewNotificationRow {
    pub message_id: String,
    pub recipient_id: i32,
    pub earthquake_id: i64,
    pub poll_name: String,
}

impl From<NewNotification> for NewNotificationRow {
    fn from(new: NewNotification) -> Self {
        Self {
            message_id: new.message_id,
            recipient_id: new.recipient_id,
            earthquake_id: new.earthquake_id,
            poll_name: new.poll_name,
        }
    }
}

/// Partial update applied by a delivery-status callback; `None` fields are left alone
#[derive(Debug, AsChangeset, Clone)]
#[diesel(table_name = crate::schema::notifications)]
pub struct NotificationStatusChange {
    pub is_read: Option<bool>,
    pub message: Option<String>,
    pub updated_at: jiff_diesel::Timestamp,
}

impl NotificationStatusChange {
    pub fn from_status(status: &DeliveryStatus, now: jiff::Timestamp) -> Self {
        let (is_read, message) = match status {
            DeliveryStatus::Delivered | DeliveryStatus::Failed => (None, None),
            DeliveryStatus::Read => (Some(true), None),
            DeliveryStatus::Replied(text) => (Some(true), Some(text.clone())),
        };
        Self {
            is_read,
            message,
            updated_at: now.to_diesel(),
        }
    }
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::failed_notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FailedNotificationRow {
    pub id: i64,
    pub recipient_id: i32,
    pub earthquake_id: i64,
    pub reason: String,
    pub detail: String,
    pub created_at: jiff_diesel::Timestamp,
}

impl TryFrom<FailedNotificationRow> for FailedNotificationRecord {
    type Error = AppError;

    fn try_from(row: FailedNotificationRow) -> Result<Self, Self::Error> {
        let reason = row
            .reason
            .parse::<FailureReason>()
            .map_err(|reason| AppError::Validation {
                field: "failed_notifications.reason".to_string(),
                reason,
            })?;

        Ok(Self {
            id: row.id,
            recipient_id: row.recipient_id,
            earthquake_id: row.earthquake_id,
            reason,
            detail: row.detail,
            created_at: row.created_at.to_jiff(),
        })
    }
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = crate::schema::failed_notifications)]
pub struct NewFailedNotificationRow {
    pub recipient_id: i32,
    pub earthquake_id: i64,
    pub reason: String,
    pub detail: String,
}

impl From<NewFailedNotification> for NewFailedNotificationRow {
    fn from(new: NewFailedNotification) -> Self {
        Self {
            recipient_id: new.recipient_id,
            earthquake_id: new.earthquake_id,
            reason: new.reason.as_str().to_string(),
            detail: new.detail,
        }
    }
}

/// Notification repository
#[derive(Clone)]
pub struct NotificationRepository {
    pool: AsyncDbPool,
}

impl NotificationRepository {
    /// Creates a new NotificationRepository with the given connection pool.
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    /// Failures recorded for one event, oldest first
    pub async fn failures_for_event(&self, event_id: i64) -> AppResult<Vec<FailedNotificationRecord>> {
        use crate::schema::failed_notifications::dsl::*;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        failed_notifications
            .filter(earthquake_id.eq(event_id))
            .order(id.asc())
            .select(FailedNotificationRow::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)?
            .into_iter()
            .map(FailedNotificationRecord::try_from)
            .collect()
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn record_sent(&self, new: NewNotification) -> AppResult<NotificationRecord> {
        use crate::schema::notifications::dsl::*;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        diesel::insert_into(notifications)
            .values(NewNotificationRow::from(new))
            .returning(NotificationRow::as_returning())
            .get_result(&mut conn)
            .await
            .map(NotificationRecord::from)
            .map_err(AppError::from)
    }

    async fn record_failed(
        &self,
        new: NewFailedNotification,
    ) -> AppResult<FailedNotificationRecord> {
        use crate::schema::failed_notifications::dsl::*;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        let row = diesel::insert_into(failed_notifications)
            .values(NewFailedNotificationRow::from(new))
            .returning(FailedNotificationRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(AppError::from)?;

        FailedNotificationRecord::try_from(row)
    }

    async fn latest_sent(&self) -> AppResult<Option<NotificationRecord>> {
        use crate::schema::notifications::dsl::*;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        notifications
            .order(created_at.desc())
            .select(NotificationRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map(|row| row.map(NotificationRecord::from))
            .map_err(AppError::from)
    }

    async fn apply_delivery_status(
        &self,
        target_message_id: &str,
        status: &DeliveryStatus,
    ) -> AppResult<bool> {
        use crate::schema::notifications::dsl::*;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        let changed = diesel::update(notifications.find(target_message_id))
            .set(NotificationStatusChange::from_status(status, jiff::Timestamp::now()))
            .execute(&mut conn)
            .await
            .map_err(AppError::from)?;

        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_change_for_reply_marks_read() {
        let now: jiff::Timestamp = "2025-05-13T06:10:00Z".parse().unwrap();

        let change = NotificationStatusChange::from_status(&DeliveryStatus::Replied("iyiyim".into()), now);
        assert_eq!(change.is_read, Some(true));
        assert_eq!(change.message.as_deref(), Some("iyiyim"));

        let change = NotificationStatusChange::from_status(&DeliveryStatus::Delivered, now);
        assert_eq!(change.is_read, None);
        assert_eq!(change.message, None);
        assert_eq!(change.updated_at.to_jiff(), now);
    }

    #[test]
    fn test_failed_row_reason_round_trips_through_text() {
        let new = NewFailedNotification {
            recipient_id: 3,
            earthquake_id: 9,
            reason: FailureReason::ConfirmationUnparsable,
            detail: "{}".into(),
        };
        let row = NewFailedNotificationRow::from(new);
        assert_eq!(row.reason, "confirmation_unparsable");
        assert_eq!(
            row.reason.parse::<FailureReason>().unwrap(),
            FailureReason::ConfirmationUnparsable
        );
    }
}
