//! `events` query command

use serde_json::Value;

use crate::cli::parser::EventsCommand;
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::models::EarthquakeSearch;
use crate::storage::EarthquakeQueries;

use super::{connect, print_json};

pub struct EventsCommandHandler {
    config: Settings,
}

impl EventsCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(&self, command: &EventsCommand) -> AppResult<()> {
        let repos = connect(&self.config).await?;
        let result = run_query(&repos.earthquakes, command).await?;
        print_json(&result)
    }
}

pub(crate) async fn run_query(
    queries: &dyn EarthquakeQueries,
    command: &EventsCommand,
) -> AppResult<Value> {
    let events = match command {
        EventsCommand::Latest { limit } => queries.latest(*limit).await?,
        EventsCommand::Day { date, limit } => queries.by_date(date, *limit).await?,
        EventsCommand::Week { year, week, limit } => queries.by_week(*year, *week, *limit).await?,
        EventsCommand::Month { year, month, limit } => {
            queries.by_month(*year, *month, *limit).await?
        }
        EventsCommand::Search {
            min_magnitude,
            max_magnitude,
            start_date,
            end_date,
            location,
            limit,
        } => {
            let filter = EarthquakeSearch {
                min_magnitude: *min_magnitude,
                max_magnitude: *max_magnitude,
                start_date: start_date.clone(),
                end_date: end_date.clone(),
                location: location.clone(),
                limit: *limit,
            };
            queries.search(&filter).await?
        }
        EventsCommand::Stats => return to_value(&queries.stats().await?),
    };

    tracing::debug!(count = events.len(), "Events query finished");
    to_value(&events)
}

fn to_value<T: serde::Serialize>(value: &T) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal {
        source: anyhow::Error::from(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeedSource, NewEarthquake};
    use crate::services::tests::parsed;
    use crate::storage::{EarthquakeStore, MemoryStore};
    use jiff::tz::Offset;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (ts, magnitude, lon) in [
            ("2025-05-13T06:05:56Z", 4.1, 27.9),
            ("2025-05-13T09:00:00Z", 2.4, 28.1),
            ("2025-06-02T12:30:00Z", 5.0, 29.4),
        ] {
            let event = parsed(FeedSource::Afad, ts, magnitude, lon);
            store
                .insert(NewEarthquake::from_parsed(event, Offset::constant(3)))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_latest_is_newest_first() {
        let store = seeded().await;
        let value = run_query(&store, &EventsCommand::Latest { limit: 2 }).await.unwrap();

        let events = value.as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["magnitude"], 5.0);
    }

    #[tokio::test]
    async fn test_day_and_month_queries() {
        let store = seeded().await;

        let day = run_query(
            &store,
            &EventsCommand::Day {
                date: "2025-05-13".to_string(),
                limit: 10,
            },
        )
        .await
        .unwrap();
        assert_eq!(day.as_array().unwrap().len(), 2);

        let june = run_query(
            &store,
            &EventsCommand::Month {
                year: 2025,
                month: 6,
                limit: 10,
            },
        )
        .await
        .unwrap();
        assert_eq!(june.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_and_stats() {
        let store = seeded().await;

        let strong = run_query(
            &store,
            &EventsCommand::Search {
                min_magnitude: Some(4.0),
                max_magnitude: None,
                start_date: None,
                end_date: None,
                location: None,
                limit: 10,
            },
        )
        .await
        .unwrap();
        assert_eq!(strong.as_array().unwrap().len(), 2);

        let stats = run_query(&store, &EventsCommand::Stats).await.unwrap();
        assert_eq!(stats["total"], 3);
        assert_eq!(stats["max_magnitude"], 5.0);
    }
}
