//! # Cellar Log
//!
//! Subscriber setup for the `tracing` events emitted across cellar.
//!
//! ```no_run
//! use cellar_log::Config;
//!
//! let _guard = cellar_log::init(Config::from_env())?;
//! tracing::info!(pools = 3, "Ready");
//! # Ok::<(), cellar_log::LogError>(())
//! ```

mod builder;
mod config;
mod core;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{
    Config, DisplayConfig, ENV_COLORS, ENV_FORMAT, ENV_LEVEL, Format, WriterConfig,
};
pub use crate::core::{LogError, LogResult};

/// Install a global subscriber built from `config`.
///
/// Fails with [`LogError::Init`] when a global subscriber is already set.
pub fn init(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}

/// Install a subscriber for the current thread until the guard is dropped
pub fn init_scoped(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build_scoped()
}
