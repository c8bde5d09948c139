//! Error types for the asset cache and object pools
use thiserror::Error;

/// Result type for cache and pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Routine, recoverable failures reported by the cache, pools and registry.
///
/// None of these indicate a broken invariant; callers treat an absent asset
/// or instance as "unavailable this frame" and carry on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Nothing is registered (or loaded) under the key
    #[error("Nothing registered under key '{key}'")]
    NotFound {
        /// The missing key
        key: String,
    },

    /// A pool is already registered under the key
    #[error("Key '{key}' is already registered")]
    AlreadyExists {
        /// The duplicate key
        key: String,
    },

    /// The instance is not in the pool's active set
    #[error("Instance {instance} is not active in pool '{key}'")]
    InvalidMembership {
        /// The pool key
        key: String,
        /// The instance identity
        instance: String,
    },

    /// The loader reported a failure for the key
    #[error("Failed to load '{key}': {reason}")]
    LoadFailed {
        /// The asset key
        key: String,
        /// The failure reason
        reason: String,
    },

    /// A pool was requested without a factory or prefab
    #[error("Pool '{key}' cannot be created without a factory")]
    MissingFactory {
        /// The pool key
        key: String,
    },

    /// The key is empty or otherwise unusable
    #[error("Invalid key: {reason}")]
    InvalidKey {
        /// Why the key was rejected
        reason: String,
    },

    /// The registered pool holds a different instance type
    #[error("Pool '{key}' holds `{actual}`, but `{expected}` was requested")]
    TypeMismatch {
        /// The pool key
        key: String,
        /// The requested instance type
        expected: &'static str,
        /// The instance type the pool was created with
        actual: &'static str,
    },

    /// The pending entry was invalidated before its load completed
    #[error("Load of '{key}' was invalidated before it completed")]
    Cancelled {
        /// The asset key
        key: String,
    },

    /// Runtime configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },
}

impl Error {
    /// Create a not-found error
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create an already-exists error
    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    /// Create a membership error for an instance the pool does not hold as active
    pub fn invalid_membership(key: impl Into<String>, instance: impl ToString) -> Self {
        Self::InvalidMembership {
            key: key.into(),
            instance: instance.to_string(),
        }
    }

    /// Create a load failure
    pub fn load_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LoadFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing-factory error
    pub fn missing_factory(key: impl Into<String>) -> Self {
        Self::MissingFactory { key: key.into() }
    }

    /// Create an invalid-key error
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(key: impl Into<String>) -> Self {
        Self::Cancelled { key: key.into() }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Check if retrying the same operation later may succeed.
    ///
    /// Failed and invalidated loads are never cached, so a new request
    /// issues a fresh load.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LoadFailed { .. } | Self::Cancelled { .. })
    }

    /// Get the cache or pool key associated with this error (if any)
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::InvalidKey { .. } | Self::Configuration { .. } => None,
            Self::NotFound { key }
            | Self::AlreadyExists { key }
            | Self::InvalidMembership { key, .. }
            | Self::LoadFailed { key, .. }
            | Self::MissingFactory { key }
            | Self::TypeMismatch { key, .. }
            | Self::Cancelled { key } => Some(key),
        }
    }
}

/// Reject keys that can never name an asset or pool.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::invalid_key("key must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_failures_are_retryable() {
        assert!(Error::load_failed("sword.prefab", "io").is_retryable());
        assert!(Error::cancelled("sword.prefab").is_retryable());
        assert!(!Error::not_found("sword.prefab").is_retryable());
        assert!(!Error::already_exists("bullet").is_retryable());
    }

    #[test]
    fn key_is_exposed_for_keyed_errors() {
        assert_eq!(Error::not_found("bullet").key(), Some("bullet"));
        assert_eq!(
            Error::invalid_membership("bullet", "1234").key(),
            Some("bullet")
        );
        assert_eq!(Error::invalid_key("empty").key(), None);
        assert_eq!(Error::configuration("bad").key(), None);
    }

    #[test]
    fn display_names_the_key() {
        let err = Error::TypeMismatch {
            key: "bullet".into(),
            expected: "Emitter",
            actual: "Projectile",
        };
        assert_eq!(
            err.to_string(),
            "Pool 'bullet' holds `Projectile`, but `Emitter` was requested"
        );
    }

    #[test]
    fn blank_keys_are_rejected() {
        assert!(validate_key("").is_err());
        assert!(validate_key("   ").is_err());
        assert!(validate_key("ui/popup").is_ok());
    }
}
