//! Seismic event models shared by the feed adapters, storage and alerting.

use std::str::FromStr;

use jiff::Timestamp;
use jiff::tz::{Offset, TimeZone};
use serde::{Deserialize, Serialize};

/// Upstream feed an event was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    /// JSON REST feed
    #[default]
    Afad,
    /// Legacy `<pre>` text table
    Kandilli,
}

impl FeedSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedSource::Afad => "afad",
            FeedSource::Kandilli => "kandilli",
        }
    }

    /// Tag appended to alert texts
    pub fn label(&self) -> &'static str {
        match self {
            FeedSource::Afad => "AFAD",
            FeedSource::Kandilli => "KOERI",
        }
    }

    pub fn other(&self) -> FeedSource {
        match self {
            FeedSource::Afad => FeedSource::Kandilli,
            FeedSource::Kandilli => FeedSource::Afad,
        }
    }
}

impl FromStr for FeedSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "afad" => Ok(FeedSource::Afad),
            "kandilli" | "koeri" => Ok(FeedSource::Kandilli),
            _ => Err(format!("Unknown feed source '{}'", s)),
        }
    }
}

impl std::fmt::Display for FeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Largest of the reported readings, ignoring missing ones.
pub fn display_magnitude(md: Option<f64>, ml: Option<f64>, mw: Option<f64>) -> Option<f64> {
    [md, ml, mw]
        .into_iter()
        .flatten()
        .filter(|m| m.is_finite())
        .max_by(|a, b| a.total_cmp(b))
}

/// Normalized record produced by a feed adapter, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedEvent {
    pub source: FeedSource,
    /// UTC instant
    pub timestamp: Timestamp,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
    pub md: Option<f64>,
    pub ml: Option<f64>,
    pub mw: Option<f64>,
    pub magnitude: f64,
    pub location: String,
    pub quality: String,
}

impl ParsedEvent {
    pub fn key(&self) -> EventKey {
        EventKey {
            timestamp: self.timestamp,
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Natural identity of an event across feeds and cycles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventKey {
    pub timestamp: Timestamp,
    pub latitude: f64,
    pub longitude: f64,
}

/// Date columns derived from the timestamp in the configured calendar offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarFields {
    /// `YYYY-MM-DD`
    pub event_date: String,
    /// `HH:MM:SS`
    pub event_time: String,
    pub year: i32,
    pub month: i32,
    pub day: i32,
    /// ISO 8601 week number
    pub week: i32,
}

impl CalendarFields {
    pub fn compute(timestamp: Timestamp, offset: Offset) -> Self {
        let zoned = timestamp.to_zoned(TimeZone::fixed(offset));
        let date = zoned.date();

        Self {
            event_date: zoned.strftime("%Y-%m-%d").to_string(),
            event_time: zoned.strftime("%H:%M:%S").to_string(),
            year: i32::from(date.year()),
            month: i32::from(date.month()),
            day: i32::from(date.day()),
            week: i32::from(date.iso_week_date().week()),
        }
    }
}

/// Insert payload: a parsed event plus its calendar columns.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEarthquake {
    pub event: ParsedEvent,
    pub calendar: CalendarFields,
}

impl NewEarthquake {
    pub fn from_parsed(event: ParsedEvent, calendar_offset: Offset) -> Self {
        let calendar = CalendarFields::compute(event.timestamp, calendar_offset);
        Self { event, calendar }
    }
}

/// Persisted event. Immutable after insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EarthquakeEvent {
    pub id: i64,
    pub source: FeedSource,
    pub timestamp: Timestamp,
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
    pub created_at: Timestamp,
}

impl EarthquakeEvent {
    pub fn from_new(id: i64, new: NewEarthquake, created_at: Timestamp) -> Self {
        let NewEarthquake { event, calendar } = new;
        Self {
            id,
            source: event.source,
            timestamp: event.timestamp,
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
            created_at,
        }
    }

    pub fn key(&self) -> EventKey {
        EventKey {
            timestamp: self.timestamp,
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Event counts per magnitude class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MagnitudeBuckets {
    /// 5.0 and above
    pub major: i64,
    /// 4.0 up to 5.0
    pub moderate: i64,
    /// 3.0 up to 4.0
    pub minor: i64,
    /// Below 3.0
    pub micro: i64,
}

impl MagnitudeBuckets {
    pub fn record(&mut self, magnitude: f64) {
        match magnitude {
            m if m >= 5.0 => self.major += 1,
            m if m >= 4.0 => self.moderate += 1,
            m if m >= 3.0 => self.minor += 1,
            _ => self.micro += 1,
        }
    }
}

/// Aggregates returned by the `stats` query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EarthquakeStats {
    pub total: i64,
    pub average_magnitude: Option<f64>,
    pub max_magnitude: Option<f64>,
    pub buckets: MagnitudeBuckets,
    /// Calendar date range covered by stored events
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub latest: Option<EarthquakeEvent>,
}

impl EarthquakeStats {
    pub fn from_events(events: &[EarthquakeEvent]) -> Self {
        let mut buckets = MagnitudeBuckets::default();
        let mut sum = 0.0;
        for event in events {
            buckets.record(event.magnitude);
            sum += event.magnitude;
        }

        let total = events.len() as i64;
        Self {
            total,
            average_magnitude: (total > 0).then(|| sum / total as f64),
            max_magnitude: events
                .iter()
                .map(|e| e.magnitude)
                .max_by(|a, b| a.total_cmp(b)),
            buckets,
            first_date: events.iter().map(|e| e.event_date.clone()).min(),
            last_date: events.iter().map(|e| e.event_date.clone()).max(),
            latest: events.iter().max_by_key(|e| e.timestamp).cloned(),
        }
    }
}

/// Filters accepted by the `search` query. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EarthquakeSearch {
    pub min_magnitude: Option<f64>,
    pub max_magnitude: Option<f64>,
    /// Inclusive `YYYY-MM-DD` bounds on the calendar date
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Case-insensitive substring of the location
    pub location: Option<String>,
    pub limit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_magnitude_takes_max_reading() {
        assert_eq!(display_magnitude(Some(1.2), Some(1.4), None), Some(1.4));
        assert_eq!(display_magnitude(None, None, Some(4.8)), Some(4.8));
        assert_eq!(display_magnitude(None, None, None), None);
        assert_eq!(display_magnitude(Some(f64::NAN), Some(2.0), None), Some(2.0));
    }

    #[test]
    fn test_calendar_fields_in_turkey_offset() {
        // 2025-05-13 06:05:56 UTC is 09:05:56 at +03:00
        let ts: Timestamp = "2025-05-13T06:05:56Z".parse().unwrap();
        let fields = CalendarFields::compute(ts, Offset::constant(3));

        assert_eq!(fields.event_date, "2025-05-13");
        assert_eq!(fields.event_time, "09:05:56");
        assert_eq!((fields.year, fields.month, fields.day), (2025, 5, 13));
        assert_eq!(fields.week, 20);
    }

    #[test]
    fn test_calendar_fields_cross_midnight() {
        let ts: Timestamp = "2024-12-31T22:30:00Z".parse().unwrap();
        let fields = CalendarFields::compute(ts, Offset::constant(3));

        assert_eq!(fields.event_date, "2025-01-01");
        assert_eq!(fields.year, 2025);
        assert_eq!(fields.week, 1);
    }

    #[test]
    fn test_stats_from_events() {
        let ts: Timestamp = "2025-05-13T06:05:56Z".parse().unwrap();
        let make = |id: i64, magnitude: f64, hours: i64| {
            let event = ParsedEvent {
                source: FeedSource::Afad,
                timestamp: ts + jiff::SignedDuration::from_hours(hours),
                latitude: 38.0,
                longitude: 27.0 + id as f64,
                depth: 7.0,
                md: None,
                ml: Some(magnitude),
                mw: None,
                magnitude,
                location: "IZMIR".into(),
                quality: "Ilksel".into(),
            };
            EarthquakeEvent::from_new(id, NewEarthquake::from_parsed(event, Offset::constant(3)), ts)
        };

        let stats = EarthquakeStats::from_events(&[make(1, 2.0, 0), make(2, 5.2, 48), make(3, 3.5, 24)]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.max_magnitude, Some(5.2));
        assert_eq!(stats.buckets, MagnitudeBuckets { major: 1, moderate: 0, minor: 1, micro: 1 });
        assert_eq!(stats.first_date.as_deref(), Some("2025-05-13"));
        assert_eq!(stats.last_date.as_deref(), Some("2025-05-15"));
        assert_eq!(stats.latest.map(|e| e.id), Some(2));

        let empty = EarthquakeStats::from_events(&[]);
        assert_eq!(empty.total, 0);
        assert!(empty.average_magnitude.is_none());
    }

    #[test]
    fn test_feed_source_parsing() {
        assert_eq!("KOERI".parse::<FeedSource>().unwrap(), FeedSource::Kandilli);
        assert_eq!(FeedSource::Afad.other(), FeedSource::Kandilli);
        assert!("usgs".parse::<FeedSource>().is_err());
    }
}
