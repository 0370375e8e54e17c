//! Earthquake repository for async database operations.
//!
//! Provides the dedup-insert used by ingestion and the read-side queries
//! behind the `events` subcommands.

use async_trait::async_trait;
use diesel::dsl::{avg, count_star, max, min};
use diesel::prelude::*;
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use jiff_diesel::ToDiesel;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::models::{
    EarthquakeEvent, EarthquakeSearch, EarthquakeStats, EventKey, FeedSource, MagnitudeBuckets,
    NewEarthquake,
};
use crate::storage::{EarthquakeQueries, EarthquakeStore};

/// Row of the `earthquakes` table
#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::earthquakes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EarthquakeRow {
    pub id: i64,
    pub source: String,
    pub ts: jiff_diesel::Timestamp,
    pub event_date: String,
    pub event_time: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
    pub md: Option<f64>,
    pub ml: Option<f64>,
    pub mw: Option<f64>,
    pub magnitude: f64,
    pub location: String,
    pub quality: String,
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub week: i32,
    pub created_at: jiff_diesel::Timestamp,
}

impl TryFrom<EarthquakeRow> for EarthquakeEvent {
    type Error = AppError;

    fn try_from(row: EarthquakeRow) -> Result<Self, Self::Error> {
        let source = row
            .source
            .parse::<FeedSource>()
            .map_err(|reason| AppError::Validation {
                field: "earthquakes.source".to_string(),
                reason,
            })?;

        Ok(EarthquakeEvent {
            id: row.id,
            source,
            timestamp: row.ts.to_jiff(),
            event_date: row.event_date,
            event_time: row.event_time,
            latitude: row.latitude,
            longitude: row.longitude,
            depth: row.depth,
            md: row.md,
            ml: row.ml,
            mw: row.mw,
            magnitude: row.magnitude,
            location: row.location,
            quality: row.quality,
            year: row.year,
            month: row.month,
            day: row.day,
            week: row.week,
            created_at: row.created_at.to_jiff(),
        })
    }
}

/// Insert payload for the `earthquakes` table; `created_at` is set by the database
#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = crate::schema::earthquakes)]
pub struct NewEarthquakeRow {
    pub source: String,
    pub ts: jiff_diesel::Timestamp,
    pub event_date: String,
    pub event_time: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
    pub md: Option<f64>,
    pub ml: Option<f64>,
    pub mw: Option<f64>,
    pub magnitude: f64,
    pub location: String,
    pub quality: String,
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub week: i32,
}

impl From<NewEarthquake> for NewEarthquakeRow {
    fn from(new: NewEarthquake) -> Self {
        let NewEarthquake { event, calendar } = new;
        Self {
            source: event.source.as_str().to_string(),
            ts: event.timestamp.to_diesel(),
            event_date: calendar.event_date,
            event_time: calendar.event_time,
            latitude: event.latitude,
            longitude: event.longitude,
            depth: event.depth,
            md: event.md,
            ml: event.ml,
            mw: event.mw,
            magnitude: event.magnitude,
            location: event.location,
            quality: event.quality,
            year: calendar.year,
            month: calendar.month,
            day: calendar.day,
            week: calendar.week,
        }
    }
}

fn into_events(rows: Vec<EarthquakeRow>) -> AppResult<Vec<EarthquakeEvent>> {
    rows.into_iter().map(EarthquakeEvent::try_from).collect()
}

/// Earthquake repository
#[derive(Clone)]
pub struct EarthquakeRepository {
    pool: AsyncDbPool,
}

impl EarthquakeRepository {
    /// Creates a new EarthquakeRepository with the given connection pool.
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> AppResult<PooledConnection<'_, AsyncPgConnection>> {
        self.pool.get().await.map_err(|e| AppError::ConnectionPool {
            source: anyhow::Error::from(e),
        })
    }
}

#[async_trait]
impl EarthquakeStore for EarthquakeRepository {
    async fn exists(&self, key: &EventKey) -> AppResult<bool> {
        use crate::schema::earthquakes::dsl::*;
        let mut conn = self.connection().await?;

        diesel::select(diesel::dsl::exists(
            earthquakes
                .filter(ts.eq(key.timestamp.to_diesel()))
                .filter(latitude.eq(key.latitude))
                .filter(longitude.eq(key.longitude)),
        ))
        .get_result::<bool>(&mut conn)
        .await
        .map_err(AppError::from)
    }

    async fn insert(&self, new: NewEarthquake) -> AppResult<Option<EarthquakeEvent>> {
        use crate::schema::earthquakes::dsl::*;
        let mut conn = self.connection().await?;

        // A concurrent writer may take the key between exists() and here
        let row = diesel::insert_into(earthquakes)
            .values(NewEarthquakeRow::from(new))
            .on_conflict((ts, latitude, longitude))
            .do_nothing()
            .returning(EarthquakeRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(AppError::from)?;

        row.map(EarthquakeEvent::try_from).transpose()
    }

    async fn find_by_id(&self, event_id: i64) -> AppResult<Option<EarthquakeEvent>> {
        use crate::schema::earthquakes::dsl::*;
        let mut conn = self.connection().await?;

        earthquakes
            .find(event_id)
            .select(EarthquakeRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(AppError::from)?
            .map(EarthquakeEvent::try_from)
            .transpose()
    }
}

#[async_trait]
impl EarthquakeQueries for EarthquakeRepository {
    async fn latest(&self, max_rows: i64) -> AppResult<Vec<EarthquakeEvent>> {
        use crate::schema::earthquakes::dsl::*;
        let mut conn = self.connection().await?;

        let rows = earthquakes
            .order(ts.desc())
            .limit(max_rows)
            .select(EarthquakeRow::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)?;

        into_events(rows)
    }

    async fn by_date(&self, date: &str, max_rows: i64) -> AppResult<Vec<EarthquakeEvent>> {
        use crate::schema::earthquakes::dsl::*;
        let mut conn = self.connection().await?;

        let rows = earthquakes
            .filter(event_date.eq(date))
            .order(ts.desc())
            .limit(max_rows)
            .select(EarthquakeRow::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)?;

        into_events(rows)
    }

    async fn by_week(
        &self,
        target_year: i32,
        target_week: i32,
        max_rows: i64,
    ) -> AppResult<Vec<EarthquakeEvent>> {
        use crate::schema::earthquakes::dsl::*;
        let mut conn = self.connection().await?;

        let rows = earthquakes
            .filter(year.eq(target_year))
            .filter(week.eq(target_week))
            .order(ts.desc())
            .limit(max_rows)
            .select(EarthquakeRow::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)?;

        into_events(rows)
    }

    async fn by_month(
        &self,
        target_year: i32,
        target_month: i32,
        max_rows: i64,
    ) -> AppResult<Vec<EarthquakeEvent>> {
        use crate::schema::earthquakes::dsl::*;
        let mut conn = self.connection().await?;

        let rows = earthquakes
            .filter(year.eq(target_year))
            .filter(month.eq(target_month))
            .order(ts.desc())
            .limit(max_rows)
            .select(EarthquakeRow::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)?;

        into_events(rows)
    }

    async fn search(&self, filter: &EarthquakeSearch) -> AppResult<Vec<EarthquakeEvent>> {
        use crate::schema::earthquakes::dsl::*;
        let mut conn = self.connection().await?;

        let mut query = earthquakes.into_boxed();
        if let Some(min_mag) = filter.min_magnitude {
            query = query.filter(magnitude.ge(min_mag));
        }
        if let Some(max_mag) = filter.max_magnitude {
            query = query.filter(magnitude.le(max_mag));
        }
        if let Some(start) = &filter.start_date {
            query = query.filter(event_date.ge(start.clone()));
        }
        if let Some(end) = &filter.end_date {
            query = query.filter(event_date.le(end.clone()));
        }
        if let Some(keyword) = &filter.location {
            query = query.filter(location.ilike(format!("%{}%", keyword)));
        }

        let rows = query
            .order(ts.desc())
            .limit(filter.limit)
            .select(EarthquakeRow::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)?;

        into_events(rows)
    }

    async fn stats(&self) -> AppResult<EarthquakeStats> {
        use crate::schema::earthquakes::dsl::*;
        let mut conn = self.connection().await?;

        let (total, average_magnitude, max_magnitude, first_date, last_date) = earthquakes
            .select((
                count_star(),
                avg(magnitude),
                max(magnitude),
                min(event_date),
                max(event_date),
            ))
            .get_result::<(i64, Option<f64>, Option<f64>, Option<String>, Option<String>)>(
                &mut conn,
            )
            .await
            .map_err(AppError::from)?;

        let major = earthquakes
            .filter(magnitude.ge(5.0))
            .count()
            .get_result::<i64>(&mut conn)
            .await
            .map_err(AppError::from)?;
        let moderate = earthquakes
            .filter(magnitude.ge(4.0).and(magnitude.lt(5.0)))
            .count()
            .get_result::<i64>(&mut conn)
            .await
            .map_err(AppError::from)?;
        let minor = earthquakes
            .filter(magnitude.ge(3.0).and(magnitude.lt(4.0)))
            .count()
            .get_result::<i64>(&mut conn)
            .await
            .map_err(AppError::from)?;

        let latest = earthquakes
            .order(ts.desc())
            .select(EarthquakeRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(AppError::from)?
            .map(EarthquakeEvent::try_from)
            .transpose()?;

        Ok(EarthquakeStats {
            total,
            average_magnitude,
            max_magnitude,
            buckets: MagnitudeBuckets {
                major,
                moderate,
                minor,
                micro: total - major - moderate - minor,
            },
            first_date,
            last_date,
            latest,
        })
    }
}
