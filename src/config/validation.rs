//! Configuration validation logic

use tokio_cron_scheduler::Job;

use crate::config::error::ConfigError;
use crate::config::settings::{
    AlertingConfig, ChannelConfig, DatabaseConfig, FeedsConfig, FileSettings, LoggerSettings,
    SchedulerConfig, Settings,
};

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

/// Offsets outside this range do not exist on Earth.
const OFFSET_RANGE: std::ops::RangeInclusive<i8> = -12..=14;

/// One week.
const MAX_COOLDOWN_MINUTES: u64 = 7 * 24 * 60;

impl DatabaseConfig {
    /// Validate database configuration
    ///
    /// # Validation Rules
    /// - URL must not be empty and must use a postgres scheme
    /// - Connection counts must be positive with min <= max
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::validation(
                "database.url",
                "Database URL is required. Please specify a valid database connection string.",
            ));
        }

        if !(self.url.starts_with("postgres://") || self.url.starts_with("postgresql://")) {
            return Err(ConfigError::validation(
                "database.url",
                "Invalid database URL format. Expected format: postgres://[user:password@]host[:port]/database",
            ));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::validation(
                "database.max_connections",
                "Max connections must be greater than 0.",
            ));
        }

        if self.min_connections == 0 {
            return Err(ConfigError::validation(
                "database.min_connections",
                "Min connections must be greater than 0.",
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::validation(
                "database.min_connections",
                format!(
                    "Min connections ({}) cannot exceed max connections ({}).",
                    self.min_connections, self.max_connections
                ),
            ));
        }

        Ok(())
    }
}

impl FileSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::validation(
                "logger.file.format",
                format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            ));
        }

        Ok(())
    }
}

impl LoggerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::validation(
                "logger.level",
                format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }

        if !self.console.enabled && !self.file.enabled {
            return Err(ConfigError::validation(
                "logger",
                "At least one output (console or file) must be enabled.",
            ));
        }

        self.file.validate()
    }
}

impl SchedulerConfig {
    /// Validate scheduler configuration
    ///
    /// A cron expression, when given, must be accepted by tokio-cron-scheduler.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(expr) = &self.cron {
            Job::new_async(expr.as_str(), |_uuid, _lock| Box::pin(async {})).map_err(|e| {
                ConfigError::validation(
                    "scheduler.cron",
                    format!("Invalid cron expression '{}': {}", expr, e),
                )
            })?;
        } else if self.interval_seconds == 0 {
            return Err(ConfigError::validation(
                "scheduler.interval_seconds",
                "Interval must be greater than 0 seconds when no cron expression is set.",
            ));
        }

        if self.cycle_timeout_seconds == 0 {
            return Err(ConfigError::validation(
                "scheduler.cycle_timeout_seconds",
                "Cycle timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl FeedsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.floor_margin.is_finite() || self.floor_margin < 0.0 {
            return Err(ConfigError::validation(
                "feeds.floor_margin",
                "Floor margin must be a non-negative number.",
            ));
        }

        for (field, offset) in [
            ("feeds.calendar_offset_hours", self.calendar_offset_hours),
            ("feeds.afad.naive_offset_hours", self.afad.naive_offset_hours),
            ("feeds.kandilli.naive_offset_hours", self.kandilli.naive_offset_hours),
        ] {
            if !OFFSET_RANGE.contains(&offset) {
                return Err(ConfigError::validation(
                    field,
                    format!("Offset {} is outside -12..=14 hours.", offset),
                ));
            }
        }

        if self.afad.url.is_empty() || self.kandilli.url.is_empty() {
            return Err(ConfigError::validation(
                "feeds.url",
                "Both feed URLs must be set.",
            ));
        }

        if self.afad.window_hours == 0 {
            return Err(ConfigError::validation(
                "feeds.afad.window_hours",
                "Window must cover at least one hour.",
            ));
        }

        if self.afad.timeout_seconds == 0 || self.kandilli.timeout_seconds == 0 {
            return Err(ConfigError::validation(
                "feeds.timeout_seconds",
                "Feed timeouts must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl AlertingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_name.trim().is_empty() {
            return Err(ConfigError::validation(
                "alerting.poll_name",
                "Poll name is required.",
            ));
        }

        if self.cooldown_minutes > MAX_COOLDOWN_MINUTES {
            return Err(ConfigError::validation(
                "alerting.cooldown_minutes",
                format!("Cooldown must not exceed {} minutes.", MAX_COOLDOWN_MINUTES),
            ));
        }
        Ok(())
    }
}

impl ChannelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rehearsal && self.rehearsal_base_url.is_empty() {
            return Err(ConfigError::validation(
                "channel.rehearsal_base_url",
                "Rehearsal mode requires a rehearsal base URL.",
            ));
        }

        if self.template_name.is_empty() {
            return Err(ConfigError::validation(
                "channel.template_name",
                "Template name is required.",
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigError::validation(
                "channel.timeout_seconds",
                "Channel timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }

    /// Checked only by commands that send; rehearsal sends need no credentials.
    pub fn validate_credentials(&self) -> Result<(), ConfigError> {
        if self.rehearsal {
            return Ok(());
        }

        if self.number_id.is_empty() {
            return Err(ConfigError::validation(
                "channel.number_id",
                "Sender number id is required. Set SEISMO_CHANNEL__NUMBER_ID.",
            ));
        }

        if self.api_token.is_empty() {
            return Err(ConfigError::validation(
                "channel.api_token",
                "API token is required. Set SEISMO_CHANNEL__API_TOKEN.",
            ));
        }

        Ok(())
    }
}

impl Settings {
    /// Returns the first validation error encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.logger.validate()?;
        self.scheduler.validate()?;
        self.feeds.validate()?;
        self.alerting.validate()?;
        self.channel.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.database.url = "postgres://localhost/seismo".to_string();
        settings.channel.number_id = "1234567890".to_string();
        settings.channel.api_token = "token".to_string();
        settings
    }

    #[test]
    fn test_valid_settings_pass() {
        assert!(valid_settings().validate().is_ok());
    }

    #[test]
    fn test_alerting_cooldown_upper_bound() {
        let mut settings = valid_settings();
        settings.alerting.cooldown_minutes = MAX_COOLDOWN_MINUTES;
        assert!(settings.validate().is_ok());

        settings.alerting.cooldown_minutes = 200_000_000_000_000_000;
        let err = settings.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationError { field, .. } if field == "alerting.cooldown_minutes"
        ));
    }

    #[test]
    fn test_database_rejects_non_postgres_scheme() {
        let config = DatabaseConfig {
            url: "mysql://localhost/seismo".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { field, .. } if field == "database.url"));
    }

    #[test]
    fn test_database_min_exceeds_max() {
        let config = DatabaseConfig {
            url: "postgres://localhost/seismo".to_string(),
            max_connections: 2,
            min_connections: 5,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::ValidationError { field, .. } if field == "database.min_connections")
        );
    }

    #[test]
    fn test_scheduler_accepts_cron_expression() {
        let config = SchedulerConfig {
            cron: Some("0 */5 * * * *".to_string()),
            interval_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scheduler_rejects_bad_cron() {
        let config = SchedulerConfig {
            cron: Some("every five minutes".to_string()),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { field, .. } if field == "scheduler.cron"));
    }

    #[test]
    fn test_scheduler_zero_interval_without_cron() {
        let config = SchedulerConfig {
            interval_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_feeds_negative_margin() {
        let config = FeedsConfig {
            floor_margin: -0.1,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::ValidationError { field, .. } if field == "feeds.floor_margin")
        );
    }

    #[test]
    fn test_feeds_offset_out_of_range() {
        let mut config = FeedsConfig::default();
        config.kandilli.naive_offset_hours = 20;
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::ValidationError { field, .. } if field == "feeds.kandilli.naive_offset_hours")
        );
    }

    #[test]
    fn test_channel_requires_credentials_outside_rehearsal() {
        let config = ChannelConfig::default();
        assert!(config.validate().is_ok());
        let err = config.validate_credentials().unwrap_err();
        assert!(
            matches!(err, ConfigError::ValidationError { field, .. } if field == "channel.number_id")
        );
    }

    #[test]
    fn test_channel_rehearsal_skips_credentials() {
        let config = ChannelConfig {
            rehearsal: true,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert!(config.validate_credentials().is_ok());
    }

    #[test]
    fn test_logger_needs_one_output() {
        let mut settings = valid_settings();
        settings.logger.console.enabled = false;
        settings.logger.file.enabled = false;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { field, .. } if field == "logger"));
    }

    #[test]
    fn test_logger_invalid_level() {
        let settings = LoggerSettings {
            level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
