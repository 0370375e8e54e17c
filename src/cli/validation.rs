//! CLI argument validation functions
//!
//! Value parsers for arguments clap cannot check on its own.

use std::fs;
use std::path::PathBuf;

use jiff::civil::Date;

/// Upper bound for `--limit` on event queries
pub const MAX_QUERY_LIMIT: i64 = 5000;

/// Validate that a file path is accessible (exists and is readable)
pub fn validate_config_file_path(path_str: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(format!("Configuration file does not exist: '{}'", path_str));
    }

    if !path.is_file() {
        return Err(format!("Configuration path is not a file: '{}'", path_str));
    }

    match fs::File::open(&path) {
        Ok(_) => Ok(path),
        Err(e) => Err(format!("Cannot read configuration file '{}': {}", path_str, e)),
    }
}

/// Validate rollback steps is a positive number
pub fn validate_rollback_steps(steps_str: &str) -> Result<u32, String> {
    let steps: u32 = steps_str.parse().map_err(|_| {
        format!("Rollback steps must be a valid positive number, got: '{}'", steps_str)
    })?;

    if steps == 0 {
        return Err("Rollback steps must be greater than 0".to_string());
    }

    if steps > 100 {
        return Err("Rollback steps cannot exceed 100".to_string());
    }

    Ok(steps)
}

pub fn validate_limit(limit_str: &str) -> Result<i64, String> {
    let limit: i64 = limit_str
        .parse()
        .map_err(|_| format!("Limit must be a number, got: '{}'", limit_str))?;

    if !(1..=MAX_QUERY_LIMIT).contains(&limit) {
        return Err(format!("Limit must be between 1 and {}", MAX_QUERY_LIMIT));
    }

    Ok(limit)
}

/// Accepts `YYYY-MM-DD` only; the normalized string is returned
pub fn validate_date(date_str: &str) -> Result<String, String> {
    let date: Date = date_str
        .trim()
        .parse()
        .map_err(|_| format!("Date must be YYYY-MM-DD, got: '{}'", date_str))?;
    Ok(date.to_string())
}

pub fn validate_week(week_str: &str) -> Result<i32, String> {
    parse_in_range(week_str, "Week", 1, 53)
}

pub fn validate_month(month_str: &str) -> Result<i32, String> {
    parse_in_range(month_str, "Month", 1, 12)
}

pub fn validate_magnitude(magnitude_str: &str) -> Result<f64, String> {
    let magnitude: f64 = magnitude_str
        .parse()
        .map_err(|_| format!("Magnitude must be a number, got: '{}'", magnitude_str))?;

    if !magnitude.is_finite() || !(0.0..=10.0).contains(&magnitude) {
        return Err(format!("Magnitude must be between 0 and 10, got: {}", magnitude_str));
    }

    Ok(magnitude)
}

fn parse_in_range(value: &str, what: &str, min: i32, max: i32) -> Result<i32, String> {
    let parsed: i32 = value
        .parse()
        .map_err(|_| format!("{} must be a number, got: '{}'", what, value))?;

    if !(min..=max).contains(&parsed) {
        return Err(format!("{} must be between {} and {}", what, min, max));
    }

    Ok(parsed)
}
