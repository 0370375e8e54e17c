//! CLI argument parsing with clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::build;

/// Earthquake alert dispatcher
#[derive(Parser, Debug)]
#[command(name = "seismo-rs")]
#[command(about = "Ingests national seismic feeds and sends WhatsApp alerts")]
#[command(long_about = "
seismo-rs polls the AFAD and KOERI earthquake feeds, stores every new event
and alerts the subscribers of a poll when the strongest new event crosses the
poll's magnitude threshold.

EXAMPLES:
    # Run the scheduler (default command)
    seismo-rs

    # Validate configuration and channel credentials without starting
    seismo-rs run --dry-run

    # Run one cycle now against the rehearsal endpoint
    seismo-rs --rehearsal cycle

    # Fetch and store events without alerting
    seismo-rs ingest

    # Query stored events
    seismo-rs events latest --limit 20
    seismo-rs events day 2025-05-13
    seismo-rs events search --min-magnitude 4 --location sındırgı

    # Apply a delivery-status webhook payload
    seismo-rs notifications apply-status --file payload.json

    # Database migrations
    seismo-rs migrate
    seismo-rs migrate --dry-run
    seismo-rs migrate --rollback 1
")]
#[command(version = build::CLAP_LONG_VERSION)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Load this single TOML file instead of the layered configuration
    /// directory. Environment variables still override it.
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Available values: development (dev), production (prod), test
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Send every message to the rehearsal endpoint instead of the real API
    #[arg(long)]
    pub rehearsal: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the cycle scheduler (default)
    Run {
        /// Log level override for this process
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,

        /// Validate configuration and exit
        #[arg(long)]
        dry_run: bool,
    },

    /// Run one dispatch cycle now and print its outcome
    Cycle,

    /// Fetch and store new events without alerting
    Ingest,

    /// Database migration operations
    ///
    /// Examples:
    ///   seismo-rs migrate                    # Apply all pending migrations
    ///   seismo-rs migrate --dry-run          # Show pending migrations without applying
    ///   seismo-rs migrate --rollback 3       # Rollback the last 3 migrations
    Migrate {
        /// Show pending migrations without applying
        #[arg(long, conflicts_with = "rollback")]
        dry_run: bool,

        /// Number of migrations to rollback
        #[arg(long, value_name = "STEPS", conflicts_with = "dry_run", value_parser = super::validation::validate_rollback_steps)]
        rollback: Option<u32>,
    },

    /// Query stored events
    Events {
        #[command(subcommand)]
        query: EventsCommand,
    },

    /// Delivery audit operations
    Notifications {
        #[command(subcommand)]
        action: NotificationsCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum EventsCommand {
    /// Most recent events
    Latest {
        #[arg(long, default_value_t = 50, value_parser = super::validation::validate_limit)]
        limit: i64,
    },

    /// Events of one calendar day
    Day {
        /// Date as YYYY-MM-DD
        #[arg(value_parser = super::validation::validate_date)]
        date: String,

        #[arg(long, default_value_t = 500, value_parser = super::validation::validate_limit)]
        limit: i64,
    },

    /// Events of one ISO week
    Week {
        year: i32,

        #[arg(value_parser = super::validation::validate_week)]
        week: i32,

        #[arg(long, default_value_t = 500, value_parser = super::validation::validate_limit)]
        limit: i64,
    },

    /// Events of one month
    Month {
        year: i32,

        #[arg(value_parser = super::validation::validate_month)]
        month: i32,

        #[arg(long, default_value_t = 1000, value_parser = super::validation::validate_limit)]
        limit: i64,
    },

    /// Filter by magnitude, date range and location
    Search {
        #[arg(long, value_parser = super::validation::validate_magnitude)]
        min_magnitude: Option<f64>,

        #[arg(long, value_parser = super::validation::validate_magnitude)]
        max_magnitude: Option<f64>,

        /// First day, YYYY-MM-DD
        #[arg(long, value_parser = super::validation::validate_date)]
        start_date: Option<String>,

        /// Last day, YYYY-MM-DD
        #[arg(long, value_parser = super::validation::validate_date)]
        end_date: Option<String>,

        /// Case-insensitive substring of the location
        #[arg(long)]
        location: Option<String>,

        #[arg(long, default_value_t = 100, value_parser = super::validation::validate_limit)]
        limit: i64,
    },

    /// Summary statistics over the whole history
    Stats,
}

#[derive(Subcommand, Debug)]
pub enum NotificationsCommand {
    /// Apply a delivery-status webhook payload from a file
    ApplyStatus {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },

    /// Failed deliveries recorded for one event
    Failures {
        #[arg(long, value_name = "EVENT_ID")]
        event: i64,
    },
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "production", alias = "prod")]
    Production,
    #[value(name = "test")]
    Test,
}

/// Log level options
#[derive(ValueEnum, Clone, Debug)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn", alias = "warning")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl Cli {
    /// Checks clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if let Some(Commands::Events {
            query:
                EventsCommand::Search {
                    min_magnitude: Some(min),
                    max_magnitude: Some(max),
                    ..
                },
        }) = &self.command
            && min > max
        {
            return Err(format!(
                "--min-magnitude ({}) cannot exceed --max-magnitude ({})",
                min, max
            ));
        }

        if let Some(Commands::Events {
            query:
                EventsCommand::Search {
                    start_date: Some(start),
                    end_date: Some(end),
                    ..
                },
        }) = &self.command
            && start > end
        {
            return Err(format!(
                "--start-date ({}) cannot be after --end-date ({})",
                start, end
            ));
        }

        Ok(())
    }

    /// Whether the command sends messages and therefore needs channel credentials
    pub fn sends_messages(&self) -> bool {
        matches!(self.command, None | Some(Commands::Run { .. }) | Some(Commands::Cycle))
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => "error".to_string(),
            LogLevel::Warn => "warn".to_string(),
            LogLevel::Info => "info".to_string(),
            LogLevel::Debug => "debug".to_string(),
            LogLevel::Trace => "trace".to_string(),
        }
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Production => crate::config::Environment::Production,
            Environment::Test => crate::config::Environment::Test,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["seismo-rs", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_default_behavior() {
        let cli = Cli::try_parse_from(["seismo-rs"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.rehearsal);
        assert!(cli.sends_messages());
    }

    #[test]
    fn test_run_dry_run() {
        let cli = Cli::try_parse_from(["seismo-rs", "--rehearsal", "run", "--dry-run"]).unwrap();
        assert!(cli.rehearsal);
        assert!(matches!(cli.command, Some(Commands::Run { dry_run: true, .. })));
    }

    #[test]
    fn test_events_subcommands() {
        let cli = Cli::try_parse_from(["seismo-rs", "events", "week", "2025", "20"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Events {
                query: EventsCommand::Week { year: 2025, week: 20, limit: 500 }
            })
        ));
        assert!(!cli.sends_messages());

        let result = Cli::try_parse_from(["seismo-rs", "events", "month", "2025", "13"]);
        assert!(result.is_err());

        let result = Cli::try_parse_from(["seismo-rs", "events", "day", "13.05.2025"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_search_ranges_are_checked() {
        let cli = Cli::try_parse_from([
            "seismo-rs",
            "events",
            "search",
            "--min-magnitude",
            "5",
            "--max-magnitude",
            "4",
        ])
        .unwrap();
        assert!(cli.validate().is_err());

        let cli = Cli::try_parse_from([
            "seismo-rs",
            "events",
            "search",
            "--start-date",
            "2025-05-01",
            "--end-date",
            "2025-05-31",
            "--location",
            "ege",
        ])
        .unwrap();
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_notifications_commands() {
        let cli = Cli::try_parse_from(["seismo-rs", "notifications", "failures", "--event", "42"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Notifications {
                action: NotificationsCommand::Failures { event: 42 }
            })
        ));
    }

    #[test]
    fn test_conflicting_verbose_quiet() {
        let err = Cli::try_parse_from(["seismo-rs", "--verbose", "--quiet"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
