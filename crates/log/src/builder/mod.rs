//! Logger builder implementation
//!
//! - `format`: format layer creation

mod format;

use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::core::{LogError, LogResult};

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Guard that keeps the logger alive
///
/// For a scoped logger, dropping the guard restores the previous subscriber
/// of the thread. A global logger stays installed for the process.
#[derive(Debug)]
#[must_use = "dropping the guard uninstalls a scoped logger"]
pub struct LoggerGuard {
    scope: Option<tracing::subscriber::DefaultGuard>,
}

impl LoggerGuard {
    /// Whether this guard belongs to a thread-scoped logger
    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// The configuration to build from
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build and install the logger as the global default
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Filter string cannot be parsed
    /// - A global subscriber is already installed
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = self.filter()?;
        Registry::default()
            .with(format::fmt_layer(&self.config))
            .with(filter)
            .try_init()
            .map_err(|e| LogError::Init(e.to_string()))?;
        Ok(LoggerGuard { scope: None })
    }

    /// Build and install the logger for the current thread only
    ///
    /// # Errors
    ///
    /// Returns error if the filter string cannot be parsed
    pub fn build_scoped(self) -> LogResult<LoggerGuard> {
        let filter = self.filter()?;
        let scope = Registry::default()
            .with(format::fmt_layer(&self.config))
            .with(filter)
            .set_default();
        Ok(LoggerGuard { scope: Some(scope) })
    }

    fn filter(&self) -> LogResult<EnvFilter> {
        EnvFilter::try_new(&self.config.level)
            .map_err(|e| LogError::Filter(format!("{}: {}", &self.config.level, e)))
    }
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;
    use crate::config::Format;

    #[test]
    fn invalid_filter_is_reported() {
        let config = Config {
            level: "cellar_resource=loud".to_string(),
            ..Config::test()
        };
        let err = LoggerBuilder::from_config(config).build_scoped().unwrap_err();
        assert!(matches!(
            err,
            LogError::Filter(ref msg) if msg.starts_with("cellar_resource=loud")
        ));
    }

    #[test]
    fn scoped_logger_applies_its_filter() {
        let config = Config {
            level: "warn".to_string(),
            ..Config::test()
        };
        let guard = LoggerBuilder::from_config(config).build_scoped().unwrap();
        assert!(guard.is_scoped());
        assert!(tracing::enabled!(Level::WARN));
        assert!(!tracing::enabled!(Level::DEBUG));
    }

    #[test]
    fn every_format_builds() {
        for format in [Format::Pretty, Format::Compact, Format::Json] {
            let config = Config {
                format,
                ..Config::test()
            };
            let _guard = LoggerBuilder::from_config(config).build_scoped().unwrap();
            tracing::info!(%format, "Logger built");
        }
    }

    #[test]
    fn second_global_init_is_an_error() {
        let first = LoggerBuilder::from_config(Config::test()).build().unwrap();
        assert!(!first.is_scoped());

        let second = LoggerBuilder::from_config(Config::test()).build();
        assert!(matches!(second, Err(LogError::Init(_))));
    }
}
