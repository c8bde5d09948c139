//! Error types

/// Logging setup failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    /// The level filter could not be parsed
    #[error("invalid log filter: {0}")]
    Filter(String),

    /// A configuration value was not recognised
    #[error("invalid log configuration: {0}")]
    Config(String),

    /// The subscriber could not be installed
    #[error("failed to install subscriber: {0}")]
    Init(String),
}

/// Result alias for logging setup
pub type LogResult<T> = Result<T, LogError>;
