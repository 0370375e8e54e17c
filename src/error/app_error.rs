use crate::config::error::ConfigError;
use crate::error::DatabaseErrorConverter;
use thiserror::Error;

/// Application-wide error type that represents all possible errors in the system.
///
/// Feed failures are split into `Network` (transport, timeout, non-2xx) and
/// `Parse` (the payload as a whole is unusable). Both count as a total
/// failure of the source that produced them.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error with entity, field, and value information
    #[error("Resource not found: {entity} with {field}={value}")]
    NotFound {
        entity: String,
        field: String,
        value: String,
    },

    /// Duplicate entry error for unique constraint violations
    #[error("Duplicate entry: {entity}.{field} = '{value}' already exists")]
    Duplicate {
        entity: String,
        field: String,
        value: String,
    },

    /// Validation error with field-specific details
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Bad request error with descriptive message
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// Upstream feed could not be reached or answered with a non-success status
    #[error("Network error from {feed}: {message}")]
    Network {
        feed: String,
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Upstream payload could not be parsed at all
    #[error("Parse error from {feed}: {message}")]
    Parse { feed: String, message: String },

    /// Outbound API call failed in a way the caller must see
    #[error("External API error from {platform}: {message}")]
    ExternalApi {
        platform: String,
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Database operation error with operation context
    #[error("Database operation failed: {operation}")]
    Database {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration error with key information
    #[error("Configuration error: {key}")]
    Configuration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Connection pool error
    #[error("Connection pool error")]
    ConnectionPool {
        #[source]
        source: anyhow::Error,
    },

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// Whether this error means the whole feed is unusable for the current cycle.
    pub fn is_feed_failure(&self) -> bool {
        matches!(self, AppError::Network { .. } | AppError::Parse { .. })
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(error: diesel::result::Error) -> Self {
        DatabaseErrorConverter::convert_diesel_error(error, "database operation")
    }
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        let key = match &error {
            ConfigError::ValidationError { field, .. } => field.clone(),
            _ => "settings".to_string(),
        };
        AppError::Configuration {
            key,
            source: anyhow::Error::from(error),
        }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_failure_classification() {
        let network = AppError::Network {
            feed: "afad".into(),
            message: "timeout".into(),
            source: None,
        };
        let parse = AppError::Parse {
            feed: "kandilli".into(),
            message: "no <pre> block".into(),
        };
        let validation = AppError::Validation {
            field: "poll".into(),
            reason: "missing".into(),
        };

        assert!(network.is_feed_failure());
        assert!(parse.is_feed_failure());
        assert!(!validation.is_feed_failure());
    }

    #[test]
    fn test_config_error_keeps_field_as_key() {
        let err: AppError = ConfigError::validation("channel.number_id", "must be set").into();
        match err {
            AppError::Configuration { key, .. } => assert_eq!(key, "channel.number_id"),
            other => panic!("Expected Configuration error, got: {:?}", other),
        }
    }

    #[test]
    fn test_display_includes_feed_name() {
        let err = AppError::Parse {
            feed: "kandilli".into(),
            message: "divider not found".into(),
        };
        assert_eq!(err.to_string(), "Parse error from kandilli: divider not found");
    }
}
