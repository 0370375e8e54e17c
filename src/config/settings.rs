//! Configuration settings structures for seismo-rs
//!
//! Every section deserializes with defaults so a partial `default.toml`
//! (or none of a section at all) still yields a runnable configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};
use crate::models::FeedSource;

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "seismo-rs".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/seismo.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_interval_seconds() -> u64 {
    3600
}

fn default_cycle_timeout_seconds() -> u64 {
    300
}

fn default_floor_margin() -> f64 {
    0.5
}

fn default_calendar_offset_hours() -> i8 {
    3
}

fn default_afad_url() -> String {
    "https://deprem.afad.gov.tr/apiv2/event/filter".to_string()
}

fn default_window_hours() -> u32 {
    24
}

fn default_afad_limit() -> u32 {
    100
}

fn default_feed_timeout() -> u64 {
    30
}

fn default_kandilli_url() -> String {
    "http://www.koeri.boun.edu.tr/scripts/lst1.asp".to_string()
}

fn default_kandilli_offset_hours() -> i8 {
    3
}

fn default_poll_name() -> String {
    "deprem".to_string()
}

fn default_cooldown_minutes() -> u64 {
    30
}

fn default_api_base_url() -> String {
    "https://graph.facebook.com/v18.0".to_string()
}

fn default_template_name() -> String {
    "deprem".to_string()
}

fn default_template_language() -> String {
    "tr".to_string()
}

fn default_send_interval_ms() -> u64 {
    1000
}

fn default_rehearsal_base_url() -> String {
    "http://127.0.0.1:8089/v18.0".to_string()
}

// ============================================================================
// Application Configuration
// ============================================================================

/// Application basic information configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Application version
    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Database Configuration
// ============================================================================

/// Diesel database connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[serde(default)]
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,

    /// Whether to automatically run pending migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout: default_connection_timeout(),
            auto_migrate: false,
        }
    }
}

// ============================================================================
// Logger Settings
// ============================================================================

/// Console output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            colored: default_true(),
        }
    }
}

/// File output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: String,

    /// Append to an existing file instead of truncating it
    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: default_true(),
            format: default_log_format(),
        }
    }
}

/// Logger configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Convert the file representation into the runtime LoggerConfig
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let file = self.file.into_file_config()?;

        LoggerConfig::new(console, file, self.level)
            .map_err(|e| ConfigError::validation("logger".to_string(), e.to_string()))
    }
}

impl FileSettings {
    /// Convert FileSettings to FileConfig
    pub fn into_file_config(self) -> Result<FileConfig, ConfigError> {
        let format = self.format.parse::<LogFormat>().map_err(|e| {
            ConfigError::validation("logger.file.format".to_string(), e.to_string())
        })?;

        FileConfig::new(self.enabled, PathBuf::from(self.path), self.append, format)
            .map_err(|e| ConfigError::validation("logger.file".to_string(), e.to_string()))
    }
}

// ============================================================================
// Scheduler Configuration
// ============================================================================

/// Dispatch cycle scheduling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Fixed interval between cycles, used when `cron` is not set
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Optional cron expression (seconds field first) that replaces the interval
    #[serde(default)]
    pub cron: Option<String>,

    /// Upper bound on a single cycle
    #[serde(default = "default_cycle_timeout_seconds")]
    pub cycle_timeout_seconds: u64,

    /// Run one cycle immediately when the scheduler starts
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            cron: None,
            cycle_timeout_seconds: default_cycle_timeout_seconds(),
            run_on_start: default_true(),
        }
    }
}

// ============================================================================
// Feed Configuration
// ============================================================================

/// How the two sources are combined in one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriorityMode {
    /// Primary is actionable; the other source is fetched for history, or
    /// promoted to actionable when the primary fails outright.
    #[default]
    PrimaryWithFailover,
    /// Both sources are fetched and both contribute actionable events.
    AlwaysBoth,
}

/// JSON REST feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AfadFeedConfig {
    #[serde(default = "default_afad_url")]
    pub url: String,

    /// Trailing window anchored to "now"
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,

    #[serde(default = "default_afad_limit")]
    pub limit: u32,

    #[serde(default = "default_feed_timeout")]
    pub timeout_seconds: u64,

    /// Offset applied to timestamps that carry none
    #[serde(default)]
    pub naive_offset_hours: i8,
}

impl Default for AfadFeedConfig {
    fn default() -> Self {
        Self {
            url: default_afad_url(),
            window_hours: default_window_hours(),
            limit: default_afad_limit(),
            timeout_seconds: default_feed_timeout(),
            naive_offset_hours: 0,
        }
    }
}

/// Legacy text-table feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KandilliFeedConfig {
    #[serde(default = "default_kandilli_url")]
    pub url: String,

    #[serde(default = "default_feed_timeout")]
    pub timeout_seconds: u64,

    /// The table is published in local Türkiye time
    #[serde(default = "default_kandilli_offset_hours")]
    pub naive_offset_hours: i8,

    /// Where to write the decoded page when it cannot be parsed
    #[serde(default)]
    pub debug_dump_path: Option<String>,
}

impl Default for KandilliFeedConfig {
    fn default() -> Self {
        Self {
            url: default_kandilli_url(),
            timeout_seconds: default_feed_timeout(),
            naive_offset_hours: default_kandilli_offset_hours(),
            debug_dump_path: None,
        }
    }
}

/// Feed ingestion configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedsConfig {
    #[serde(default)]
    pub priority: PriorityMode,

    #[serde(default)]
    pub primary: FeedSource,

    /// Fetch floor is the poll threshold minus this margin
    #[serde(default = "default_floor_margin")]
    pub floor_margin: f64,

    /// Offset used for the stored date, time and week columns
    #[serde(default = "default_calendar_offset_hours")]
    pub calendar_offset_hours: i8,

    #[serde(default)]
    pub afad: AfadFeedConfig,

    #[serde(default)]
    pub kandilli: KandilliFeedConfig,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            priority: PriorityMode::default(),
            primary: FeedSource::default(),
            floor_margin: default_floor_margin(),
            calendar_offset_hours: default_calendar_offset_hours(),
            afad: AfadFeedConfig::default(),
            kandilli: KandilliFeedConfig::default(),
        }
    }
}

// ============================================================================
// Alerting Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertingConfig {
    /// Poll whose threshold and subscribers drive the cycle
    #[serde(default = "default_poll_name")]
    pub poll_name: String,

    /// Minimum time between consecutive alert bursts
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            poll_name: default_poll_name(),
            cooldown_minutes: default_cooldown_minutes(),
        }
    }
}

// ============================================================================
// Messaging Channel Configuration
// ============================================================================

/// WhatsApp Cloud API credentials and pacing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Sender phone number id
    #[serde(default)]
    pub number_id: String,

    #[serde(default)]
    pub api_token: String,

    #[serde(default = "default_template_name")]
    pub template_name: String,

    #[serde(default = "default_template_language")]
    pub template_language: String,

    /// Fixed delay between consecutive sends
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,

    #[serde(default = "default_feed_timeout")]
    pub timeout_seconds: u64,

    /// Redirect every send to `rehearsal_base_url`
    #[serde(default)]
    pub rehearsal: bool,

    #[serde(default = "default_rehearsal_base_url")]
    pub rehearsal_base_url: String,
}

impl ChannelConfig {
    /// Base URL sends actually go to
    pub fn effective_base_url(&self) -> &str {
        if self.rehearsal {
            &self.rehearsal_base_url
        } else {
            &self.api_base_url
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            number_id: String::new(),
            api_token: String::new(),
            template_name: default_template_name(),
            template_language: default_template_language(),
            send_interval_ms: default_send_interval_ms(),
            timeout_seconds: default_feed_timeout(),
            rehearsal: false,
            rehearsal_base_url: default_rehearsal_base_url(),
        }
    }
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logger: LoggerSettings,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub feeds: FeedsConfig,

    #[serde(default)]
    pub alerting: AlertingConfig,

    #[serde(default)]
    pub channel: ChannelConfig,
}
