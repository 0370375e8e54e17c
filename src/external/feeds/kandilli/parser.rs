//! Parser for the legacy fixed-layout earthquake list.
//!
//! The page wraps one `<pre>` block. Inside it, a header row starting with
//! `Tarih Saat Enlem` and a dashed divider precede the data rows:
//!
//! ```text
//! 2025.05.13 09:05:56  36.9173   27.6803        8.9      -.-  1.4  -.-   GOKOVA KORFEZI (EGE DENIZI)      İlksel
//! ```
//!
//! Columns are separated by two or more spaces. `-.-` marks a magnitude
//! scale that was not reported.

use std::sync::LazyLock;

use jiff::civil::DateTime;
use jiff::tz::{Offset, TimeZone};
use regex::Regex;
use thiserror::Error;

use super::glyph::remap_glyphs;
use crate::error::{AppError, AppResult};
use crate::models::{FeedSource, ParsedEvent, display_magnitude};

static PRE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<pre>(.*?)</pre>").expect("valid <pre> regex"));

static TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Tarih\s+Saat\s+Enlem.*?Çözüm Niteliği\s*\n-+\s+-+\s+(.*?)(?:\n\s*\n|\z)")
        .expect("valid table regex")
});

/// Looser match for pages whose header row has been reworded
static TABLE_FALLBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Tarih.*?-+\s+-+\s+(.*?)(?:\n\s*\n|\z)").expect("valid fallback table regex")
});

static COLUMN_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid separator regex"));

const MIN_COLUMNS: usize = 9;

const NOT_REPORTED: &str = "-.-";

const DATETIME_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

/// Outcome of parsing one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableParse {
    pub events: Vec<ParsedEvent>,
    /// Rows that could not be parsed
    pub malformed: usize,
    /// Rows parsed but dropped by the magnitude floor
    pub below_floor: usize,
}

/// Why a single row was rejected.
#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("expected at least {MIN_COLUMNS} columns, found {0}")]
    TooFewColumns(usize),

    #[error("invalid date/time '{0}'")]
    InvalidDateTime(String),

    #[error("invalid {column} value '{value}'")]
    InvalidNumber { column: &'static str, value: String },

    #[error("location '{0}' is cut off")]
    SplitLocation(String),

    #[error("no magnitude reported")]
    NoMagnitude,
}

fn parse_error(message: impl Into<String>) -> AppError {
    AppError::Parse {
        feed: FeedSource::Kandilli.as_str().into(),
        message: message.into(),
    }
}

/// Parse a decoded page into events at or above `floor`.
///
/// Fails only when the `<pre>` block or the table inside it cannot be
/// located. Bad rows are logged and counted.
pub fn parse_page(page: &str, floor: f64, naive_offset: Offset) -> AppResult<TableParse> {
    let pre = PRE_BLOCK
        .captures(page)
        .and_then(|c| c.get(1))
        .ok_or_else(|| parse_error("no <pre> block in page"))?
        .as_str();

    let table = TABLE
        .captures(pre)
        .or_else(|| TABLE_FALLBACK.captures(pre))
        .and_then(|c| c.get(1))
        .ok_or_else(|| parse_error("no data table inside <pre> block"))?
        .as_str();

    let tz = TimeZone::fixed(naive_offset);
    let mut result = TableParse::default();

    for line in table.lines().map(str::trim) {
        if line.is_empty() || line.contains("------") || line.contains("Tarih") {
            continue;
        }

        match parse_row(line, &tz) {
            Ok(event) if event.magnitude >= floor => result.events.push(event),
            Ok(_) => result.below_floor += 1,
            Err(e) => {
                tracing::warn!(feed = "kandilli", line, error = %e, "Skipping row");
                result.malformed += 1;
            }
        }
    }

    Ok(result)
}

/// Parse one data row; `tz` is the zone the table's naive times are in.
pub fn parse_row(line: &str, tz: &TimeZone) -> Result<ParsedEvent, RowError> {
    let columns: Vec<&str> = COLUMN_SEPARATOR.split(line.trim()).collect();
    if columns.len() < MIN_COLUMNS {
        return Err(RowError::TooFewColumns(columns.len()));
    }

    let timestamp = DateTime::strptime(DATETIME_FORMAT, columns[0])
        .and_then(|dt| dt.to_zoned(tz.clone()))
        .map(|zoned| zoned.timestamp())
        .map_err(|_| RowError::InvalidDateTime(columns[0].to_string()))?;

    let latitude = number("latitude", columns[1])?;
    let longitude = number("longitude", columns[2])?;
    let depth = number("depth", columns[3])?;
    let md = reading("MD", columns[4])?;
    let ml = reading("ML", columns[5])?;
    let mw = reading("Mw", columns[6])?;

    let location = columns[7];
    if location.matches('(').count() > location.matches(')').count() {
        return Err(RowError::SplitLocation(location.to_string()));
    }
    let quality = columns[columns.len() - 1];

    let magnitude = display_magnitude(md, ml, mw).ok_or(RowError::NoMagnitude)?;

    Ok(ParsedEvent {
        source: FeedSource::Kandilli,
        timestamp,
        latitude,
        longitude,
        depth,
        md,
        ml,
        mw,
        magnitude,
        location: remap_glyphs(location.trim()),
        quality: remap_glyphs(quality.trim()),
    })
}

fn number(column: &'static str, value: &str) -> Result<f64, RowError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RowError::InvalidNumber {
            column,
            value: value.to_string(),
        })
}

fn reading(column: &'static str, value: &str) -> Result<Option<f64>, RowError> {
    if value == NOT_REPORTED {
        Ok(None)
    } else {
        number(column, value).map(Some)
    }
}
