use std::sync::LazyLock;

use crate::error::AppError;
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use regex::Regex;

/// Matches the `DETAIL: Key (col_a, col_b)=(val_a, val_b)` part of a Postgres message.
static KEY_DETAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Key \((?P<field>[^)]+)\)=\((?P<value>.*?)\)").expect("key detail regex is valid")
});

/// Utility for converting database errors to structured AppError variants.
pub struct DatabaseErrorConverter;

impl DatabaseErrorConverter {
    /// Converts a Diesel error to an appropriate AppError variant.
    ///
    /// # Arguments
    /// * `error` - The Diesel error to convert
    /// * `operation` - Description of the database operation that failed
    pub fn convert_diesel_error(error: DieselError, operation: &str) -> AppError {
        match error {
            DieselError::DatabaseError(kind, info) => {
                Self::convert_database_error(kind, info.as_ref(), operation)
            }
            DieselError::NotFound => AppError::NotFound {
                entity: "resource".to_string(),
                field: "id".to_string(),
                value: "unknown".to_string(),
            },
            other => AppError::Database {
                operation: operation.to_string(),
                source: anyhow::Error::from(other),
            },
        }
    }

    fn convert_database_error(
        kind: DatabaseErrorKind,
        info: &(dyn DatabaseErrorInformation + Send + Sync),
        operation: &str,
    ) -> AppError {
        match kind {
            DatabaseErrorKind::UniqueViolation => {
                let entity = info
                    .table_name()
                    .map(str::to_string)
                    .or_else(|| Self::entity_from_constraint(info.constraint_name()))
                    .unwrap_or_else(|| "resource".to_string());
                let text = info.details().unwrap_or_else(|| info.message());
                let (field, value) = Self::extract_key_value(text)
                    .or_else(|| Self::extract_key_value(info.message()))
                    .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));

                AppError::Duplicate {
                    entity,
                    field,
                    value,
                }
            }
            DatabaseErrorKind::NotNullViolation => AppError::Validation {
                field: info.column_name().unwrap_or("unknown").to_string(),
                reason: "Field is required".to_string(),
            },
            _ => AppError::Database {
                operation: operation.to_string(),
                source: anyhow::Error::msg(format!("Database error: {}", info.message())),
            },
        }
    }

    /// `earthquakes_ts_latitude_longitude_key` -> `earthquakes`
    fn entity_from_constraint(constraint: Option<&str>) -> Option<String> {
        constraint
            .and_then(|name| name.split('_').next())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn extract_key_value(text: &str) -> Option<(String, String)> {
        KEY_DETAIL
            .captures(text)
            .map(|caps| (caps["field"].to_string(), caps["value"].to_string()))
    }
}
