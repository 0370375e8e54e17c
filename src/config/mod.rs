//! Configuration management for seismo-rs
//!
//! # Configuration Priority (lowest to highest)
//! 1. `default.toml` - Base default configuration
//! 2. `{environment}.toml` - Environment-specific configuration
//! 3. `local.toml` - Local overrides (not committed to version control)
//! 4. `SEISMO_*` environment variables
//! 5. Command line flags, applied by the CLI after loading

pub mod environment;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use environment::Environment;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use settings::{
    AfadFeedConfig, AlertingConfig, ChannelConfig, DatabaseConfig, FeedsConfig,
    KandilliFeedConfig, PriorityMode, SchedulerConfig, Settings,
};
