use std::time::Duration;

use async_trait::async_trait;
use jiff::civil::DateTime;
use jiff::tz::{Offset, TimeZone};
use jiff::{SignedDuration, Timestamp};
use serde_json::Value;

use super::types::AfadRecord;
use crate::config::AfadFeedConfig;
use crate::error::{AppError, AppResult};
use crate::external::client::HTTP_CLIENT;
use crate::external::feeds::provider::{FeedBatch, FeedProvider, FeedQuery};
use crate::models::{FeedSource, ParsedEvent, display_magnitude};

const FEED: &str = "afad";

const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// JSON REST feed client.
pub struct AfadFeed {
    config: AfadFeedConfig,
    naive_offset: Offset,
}

impl AfadFeed {
    pub fn new(config: AfadFeedConfig) -> AppResult<Self> {
        let naive_offset = Offset::from_hours(config.naive_offset_hours).map_err(|e| {
            AppError::Validation {
                field: "feeds.afad.naive_offset_hours".to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            config,
            naive_offset,
        })
    }

    fn network_error(message: impl Into<String>, source: Option<anyhow::Error>) -> AppError {
        AppError::Network {
            feed: FEED.into(),
            message: message.into(),
            source,
        }
    }

    /// Request URL with the window anchored to `now` unless the query sets it.
    pub fn request_url(&self, query: &FeedQuery, now: Timestamp) -> AppResult<reqwest::Url> {
        let end = query.end.unwrap_or(now);
        let start = query.start.unwrap_or_else(|| {
            end - SignedDuration::from_hours(i64::from(self.config.window_hours))
        });
        let limit = query.limit.unwrap_or(self.config.limit);

        let mut params = vec![
            ("start", start.strftime(QUERY_TIME_FORMAT).to_string()),
            ("end", end.strftime(QUERY_TIME_FORMAT).to_string()),
        ];
        if let Some(min) = query.min_magnitude {
            params.push(("minmag", min.to_string()));
        }
        if let Some(max) = query.max_magnitude {
            params.push(("maxmag", max.to_string()));
        }
        params.push(("limit", limit.to_string()));
        params.push(("orderby", "timedesc".to_string()));

        reqwest::Url::parse_with_params(&self.config.url, &params).map_err(|e| {
            AppError::Validation {
                field: "feeds.afad.url".to_string(),
                reason: e.to_string(),
            }
        })
    }

    async fn get_body(&self, url: reqwest::Url) -> AppResult<Vec<u8>> {
        let resp = HTTP_CLIENT
            .get(url)
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .send()
            .await
            .map_err(|e| Self::network_error(format!("request failed: {}", e), Some(e.into())))?
            .error_for_status()
            .map_err(|e| Self::network_error(format!("HTTP error: {}", e), Some(e.into())))?;

        resp.bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| Self::network_error(format!("reading body failed: {}", e), Some(e.into())))
    }
}

#[async_trait]
impl FeedProvider for AfadFeed {
    fn source(&self) -> FeedSource {
        FeedSource::Afad
    }

    async fn fetch(&self, query: &FeedQuery) -> AppResult<FeedBatch> {
        let url = self.request_url(query, Timestamp::now())?;
        tracing::debug!(feed = FEED, url = %url, "Fetching feed");

        let body = self.get_body(url).await?;
        let batch = parse_batch(&body, self.naive_offset, query.floor())?;

        tracing::info!(
            feed = FEED,
            events = batch.events.len(),
            skipped = batch.skipped,
            "Feed fetched"
        );
        Ok(batch)
    }
}

/// Parse a response body into normalized events at or above `floor`.
///
/// Only a body that is not JSON at all is an error. A JSON value of an
/// unexpected shape yields an empty batch.
pub fn parse_batch(body: &[u8], naive_offset: Offset, floor: f64) -> AppResult<FeedBatch> {
    let value: Value = serde_json::from_slice(body).map_err(|e| AppError::Parse {
        feed: FEED.into(),
        message: format!("response is not JSON: {}", e),
    })?;

    let Some(items) = records_of(value) else {
        tracing::warn!(feed = FEED, "Unexpected response shape, treating as empty");
        return Ok(FeedBatch::default());
    };

    let mut batch = FeedBatch::default();
    for item in items {
        let record = match serde_json::from_value::<AfadRecord>(item) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(feed = FEED, error = %e, "Skipping unreadable record");
                batch.skipped += 1;
                continue;
            }
        };

        match normalize(&record, naive_offset) {
            Ok(event) if event.magnitude >= floor => batch.events.push(event),
            Ok(_) => {}
            Err(reason) => {
                tracing::warn!(
                    feed = FEED,
                    event_id = record.event_id.as_deref().unwrap_or("-"),
                    reason = %reason,
                    "Skipping record"
                );
                batch.skipped += 1;
            }
        }
    }

    Ok(batch)
}

/// Bare array, `{"result": [...]}` or `{"data": [...]}`
fn records_of(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove("result").or_else(|| map.remove("data")) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn normalize(record: &AfadRecord, naive_offset: Offset) -> Result<ParsedEvent, String> {
    let date = record.date.as_deref().ok_or("missing date")?;
    let timestamp = parse_timestamp(date, naive_offset)?;

    let (latitude, longitude) = match (record.latitude, record.longitude) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err("missing coordinates".to_string()),
    };

    let (mut md, mut ml, mut mw) = (None, None, None);
    let reading = record.magnitude.filter(|m| m.is_finite());
    match record.magnitude_type.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("md") => md = reading,
        Some("mw") => mw = reading,
        _ => ml = reading,
    }
    let magnitude = display_magnitude(md, ml, mw).ok_or("no magnitude reading")?;

    let location = record
        .location
        .clone()
        .or_else(|| match (&record.district, &record.province) {
            (Some(district), Some(province)) => Some(format!("{} ({})", district, province)),
            (None, Some(province)) => Some(province.clone()),
            (Some(district), None) => Some(district.clone()),
            (None, None) => None,
        })
        .unwrap_or_default();

    let quality = if record.is_event_update.unwrap_or(false) {
        "REVIZE"
    } else {
        "İlksel"
    };

    Ok(ParsedEvent {
        source: FeedSource::Afad,
        timestamp,
        latitude,
        longitude,
        depth: record.depth.unwrap_or(0.0),
        md,
        ml,
        mw,
        magnitude,
        location,
        quality: quality.to_string(),
    })
}

/// Explicit offsets are honored; naive values are taken at `naive_offset`.
fn parse_timestamp(raw: &str, naive_offset: Offset) -> Result<Timestamp, String> {
    let normalized = raw.trim().replacen(' ', "T", 1);
    if let Ok(ts) = normalized.parse::<Timestamp>() {
        return Ok(ts);
    }

    let naive: DateTime = normalized
        .parse()
        .map_err(|e| format!("unparsable date '{}': {}", raw, e))?;
    naive
        .to_zoned(TimeZone::fixed(naive_offset))
        .map(|zoned| zoned.timestamp())
        .map_err(|e| format!("date '{}' out of range: {}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const UTC: Offset = Offset::constant(0);

    fn body(json: &str) -> Vec<u8> {
        json.as_bytes().to_vec()
    }

    #[test]
    fn test_every_valid_record_is_returned() {
        let json = r#"[
            {"eventID": "1", "date": "2025-05-13T06:05:56", "latitude": "38.1", "longitude": "27.2",
             "depth": "7.0", "type": "ML", "magnitude": "2.9", "location": "Sındırgı (Balıkesir)"},
            {"eventID": "2", "date": "2025-05-13T07:00:00", "latitude": 39.0, "longitude": 28.0,
             "depth": 10, "type": "Mw", "magnitude": 4.1, "location": "Simav (Kütahya)"},
            {"eventID": "3", "date": "2025-05-13T08:00:00", "latitude": 40.0, "longitude": 29.0,
             "depth": 5, "type": "MD", "magnitude": "1.9", "location": "Marmara Denizi"}
        ]"#;
        let batch = parse_batch(&body(json), UTC, 0.0).unwrap();

        assert_eq!(batch.events.len(), 3);
        assert_eq!(batch.skipped, 0);
        assert_eq!(batch.events[0].ml, Some(2.9));
        assert_eq!(batch.events[1].mw, Some(4.1));
        assert_eq!(batch.events[2].md, Some(1.9));
        assert_eq!(batch.events[1].timestamp.to_string(), "2025-05-13T07:00:00Z");
    }

    #[test]
    fn test_wrapped_shapes_are_accepted() {
        let record = r#"{"date": "2025-05-13T06:05:56", "latitude": 38.1, "longitude": 27.2, "magnitude": 3.0}"#;
        for json in [format!(r#"{{"result": [{}]}}"#, record), format!(r#"{{"data": [{}]}}"#, record)] {
            let batch = parse_batch(json.as_bytes(), UTC, 0.0).unwrap();
            assert_eq!(batch.events.len(), 1);
            assert_eq!(batch.events[0].ml, Some(3.0));
        }
    }

    #[test]
    fn test_unexpected_shape_is_empty_batch() {
        let batch = parse_batch(&body(r#"{"status": "ok", "count": 0}"#), UTC, 0.0).unwrap();
        assert!(batch.events.is_empty());

        let batch = parse_batch(&body("42"), UTC, 0.0).unwrap();
        assert!(batch.events.is_empty());
    }

    #[test]
    fn test_non_json_body_is_parse_error() {
        let result = parse_batch(&body("<html>Service Unavailable</html>"), UTC, 0.0);
        assert!(matches!(result, Err(AppError::Parse { feed, .. }) if feed == "afad"));
    }

    #[test]
    fn test_bad_records_are_skipped_individually() {
        let json = r#"[
            {"date": "not a date", "latitude": 38.1, "longitude": 27.2, "magnitude": 3.0},
            {"latitude": 38.1, "longitude": 27.2, "magnitude": 3.0},
            {"date": "2025-05-13T06:05:56", "latitude": 38.1, "longitude": 27.2},
            {"date": "2025-05-13T06:05:56", "latitude": 38.1, "longitude": 27.2, "magnitude": "much"},
            {"date": "2025-05-13T06:05:56", "latitude": 38.1, "longitude": 27.2, "magnitude": 3.3}
        ]"#;
        let batch = parse_batch(&body(json), UTC, 0.0).unwrap();

        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.skipped, 4);
        assert_eq!(batch.events[0].magnitude, 3.3);
    }

    #[test]
    fn test_floor_filters_events() {
        let json = r#"[
            {"date": "2025-05-13T06:05:56", "latitude": 38.1, "longitude": 27.2, "magnitude": 1.1},
            {"date": "2025-05-13T06:06:56", "latitude": 38.1, "longitude": 27.2, "magnitude": 1.2}
        ]"#;
        let batch = parse_batch(&body(json), UTC, 1.2).unwrap();
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.skipped, 0);
    }

    #[test]
    fn test_timestamp_offsets() {
        let plus_three = Offset::constant(3);
        assert_eq!(
            parse_timestamp("2025-05-13T09:05:56", plus_three).unwrap().to_string(),
            "2025-05-13T06:05:56Z"
        );
        assert_eq!(
            parse_timestamp("2025-05-13 06:05:56", UTC).unwrap().to_string(),
            "2025-05-13T06:05:56Z"
        );
        // Explicit offsets win over the configured one
        assert_eq!(
            parse_timestamp("2025-05-13T09:05:56+03:00", UTC).unwrap().to_string(),
            "2025-05-13T06:05:56Z"
        );
        assert_eq!(
            parse_timestamp("2025-05-13T06:05:56Z", plus_three).unwrap().to_string(),
            "2025-05-13T06:05:56Z"
        );
    }

    #[test]
    fn test_request_url_defaults_to_trailing_window() {
        let feed = AfadFeed::new(AfadFeedConfig::default()).unwrap();
        let now: Timestamp = "2025-05-13T12:00:00Z".parse().unwrap();
        let url = feed.request_url(&FeedQuery::with_floor(1.2), now).unwrap();
        let query = url.query().unwrap();

        assert!(query.contains("start=2025-05-12T12%3A00%3A00"));
        assert!(query.contains("end=2025-05-13T12%3A00%3A00"));
        assert!(query.contains("minmag=1.2"));
        assert!(query.contains("limit=100"));
        assert!(!query.contains("maxmag"));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_fetch_live_feed() {
        let feed = AfadFeed::new(AfadFeedConfig::default()).unwrap();
        let batch = feed.fetch(&FeedQuery::with_floor(0.0)).await.unwrap();
        assert!(batch.events.iter().all(|e| e.source == FeedSource::Afad));
    }
}
