//! Subscriber directory repository.
//!
//! Read-only view over polls, recipient groups and their members. The
//! tables are maintained by the dashboard.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::models::{Poll, Recipient, RecipientGroup};
use crate::schema::{group_members, group_polls, polls, recipient_groups, recipients};
use crate::storage::SubscriberDirectory;

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = polls)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PollRow {
    pub id: i32,
    pub name: String,
    pub channel_type: String,
    pub min_magnitude: f64,
    pub created_at: jiff_diesel::Timestamp,
}

impl From<PollRow> for Poll {
    fn from(row: PollRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            channel_type: row.channel_type,
            min_magnitude: row.min_magnitude,
            created_at: row.created_at.to_jiff(),
        }
    }
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = recipient_groups)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RecipientGroupRow {
    pub id: i32,
    pub name: String,
    pub active: bool,
}

impl From<RecipientGroupRow> for RecipientGroup {
    fn from(row: RecipientGroupRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            active: row.active,
        }
    }
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = recipients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RecipientRow {
    pub id: i32,
    pub name: String,
    pub address: String,
    pub active: bool,
}

impl From<RecipientRow> for Recipient {
    fn from(row: RecipientRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            address: row.address,
            active: row.active,
        }
    }
}

/// Subscriber repository
#[derive(Clone)]
pub struct SubscriberRepository {
    pool: AsyncDbPool,
}

impl SubscriberRepository {
    /// Creates a new SubscriberRepository with the given connection pool.
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberDirectory for SubscriberRepository {
    async fn find_poll(&self, poll_name: &str) -> AppResult<Option<Poll>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        polls::table
            .filter(polls::name.eq(poll_name))
            .select(PollRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map(|row| row.map(Poll::from))
            .map_err(AppError::from)
    }

    async fn groups_for_poll(&self, poll_id: i32) -> AppResult<Vec<RecipientGroup>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        let rows = recipient_groups::table
            .inner_join(group_polls::table)
            .filter(group_polls::poll_id.eq(poll_id))
            .filter(recipient_groups::active.eq(true))
            .order(recipient_groups::id.asc())
            .select(RecipientGroupRow::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)?;

        Ok(rows.into_iter().map(RecipientGroup::from).collect())
    }

    async fn active_members(&self, group_id: i32) -> AppResult<Vec<Recipient>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        let rows = recipients::table
            .inner_join(group_members::table)
            .filter(group_members::group_id.eq(group_id))
            .filter(recipients::active.eq(true))
            .order(recipients::id.asc())
            .select(RecipientRow::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)?;

        Ok(rows.into_iter().map(Recipient::from).collect())
    }
}
