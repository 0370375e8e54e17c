//! Logger built on `tracing-subscriber`
//!
//! - Console output on stderr with color control
//! - Optional file output in Full, Compact or JSON format

pub mod config;
pub mod error;


pub use config::*;
pub use error::LoggerError;

use std::fs::{File, OpenOptions};
use std::io::{IsTerminal, Stderr};
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber described by `config`.
pub fn init_logger(config: LoggerConfig) -> anyhow::Result<()> {
    config.validate()?;

    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let writer = if config.file.enabled {
        Some(open_log_file(&config.file)?)
    } else {
        None
    };

    let registry = tracing_subscriber::registry().with(filter);

    // The file layer must come before the console layer or span fields pick up
    // ANSI codes (tokio-rs/tracing#1817).
    let result = match (writer, config.file.format) {
        (None, _) => registry.with(console_layer(&config.console)).try_init(),
        (Some(writer), LogFormat::Full) => registry
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(writer),
            )
            .with(console_layer(&config.console))
            .try_init(),
        (Some(writer), LogFormat::Compact) => registry
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .compact()
                    .with_writer(writer),
            )
            .with(console_layer(&config.console))
            .try_init(),
        (Some(writer), LogFormat::Json) => registry
            .with(fmt::layer().with_ansi(false).json().with_writer(writer))
            .with(console_layer(&config.console))
            .try_init(),
    };

    result.map_err(|e| LoggerError::AlreadyInitialized(e.to_string()))?;
    Ok(())
}

type ConsoleLayer<S> = fmt::Layer<S, DefaultFields, Format, fn() -> Stderr>;

/// Console logs go to stderr; stdout carries command output.
fn console_layer<S>(console: &ConsoleConfig) -> Option<ConsoleLayer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let use_ansi = console.colored && std::io::stderr().is_terminal();
    console.enabled.then(|| {
        fmt::layer()
            .with_ansi(use_ansi)
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr as fn() -> Stderr)
    })
}

/// Open (and create the directory for) the configured log file.
pub(crate) fn open_log_file(config: &FileConfig) -> Result<Mutex<File>, LoggerError> {
    if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LoggerError::file_open(parent, e))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(config.append)
        .truncate(!config.append)
        .open(&config.path)
        .map_err(|e| LoggerError::file_open(&config.path, e))?;

    Ok(Mutex::new(file))
}
