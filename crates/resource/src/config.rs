//! Runtime configuration for the cache and the pool registry
//!
//! Configuration is plain TOML with a default for every field:
//!
//! ```toml
//! [cache]
//! warn_on_duplicate = true
//!
//! [pool]
//! default_preload = 4
//! auto_create = true
//! max_inactive = 64
//! ```
//!
//! Environment overrides are applied on top with
//! [`RuntimeConfig::with_env_overrides`].

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Overrides `pool.default_preload`
pub const ENV_DEFAULT_PRELOAD: &str = "CELLAR_POOL_DEFAULT_PRELOAD";
/// Overrides `pool.auto_create`
pub const ENV_AUTO_CREATE: &str = "CELLAR_POOL_AUTO_CREATE";
/// Overrides `pool.max_inactive`; `none` removes the cap
pub const ENV_MAX_INACTIVE: &str = "CELLAR_POOL_MAX_INACTIVE";

/// Top-level configuration shared by the cache and the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Asset cache settings
    pub cache: CacheConfig,
    /// Pool registry settings
    pub pool: PoolConfig,
}

/// Asset cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Log duplicate load completions at warn level instead of debug
    pub warn_on_duplicate: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            warn_on_duplicate: true,
        }
    }
}

/// Pool registry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Instances preloaded into pools the registry creates on demand
    pub default_preload: usize,
    /// Whether `get_or_create` may register a missing pool
    pub auto_create: bool,
    /// Upper bound on retained inactive instances per pool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_inactive: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            default_preload: 0,
            auto_create: true,
            max_inactive: None,
        }
    }
}

impl PoolConfig {
    /// Validate the pool settings
    pub fn validate(&self) -> Result<()> {
        if self.max_inactive == Some(0) {
            return Err(Error::configuration(
                "pool.max_inactive must be at least 1 (omit it for no cap)",
            ));
        }
        Ok(())
    }
}

impl RuntimeConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| Error::configuration(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "Loaded runtime configuration");
        Ok(config)
    }

    /// Apply `CELLAR_POOL_*` environment overrides and re-validate
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup and re-validate
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_DEFAULT_PRELOAD) {
            self.pool.default_preload = parse_var(ENV_DEFAULT_PRELOAD, &raw)?;
        }
        if let Some(raw) = lookup(ENV_AUTO_CREATE) {
            self.pool.auto_create = parse_bool(ENV_AUTO_CREATE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_INACTIVE) {
            self.pool.max_inactive = match raw.trim().to_ascii_lowercase().as_str() {
                "" | "none" => None,
                _ => Some(parse_var(ENV_MAX_INACTIVE, &raw)?),
            };
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::configuration(format!("cannot serialize configuration: {e}")))
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::configuration(format!("{name}={raw:?}: {e}")))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::configuration(format!(
            "{name}={raw:?}: expected a boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = RuntimeConfig::default();
        assert!(config.cache.warn_on_duplicate);
        assert_eq!(config.pool.default_preload, 0);
        assert!(config.pool.auto_create);
        assert_eq!(config.pool.max_inactive, None);
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = RuntimeConfig::from_toml_str("[pool]\ndefault_preload = 3\n").unwrap();
        assert_eq!(config.pool.default_preload, 3);
        assert!(config.pool.auto_create);
        assert!(config.cache.warn_on_duplicate);
    }

    #[test]
    fn zero_max_inactive_is_rejected() {
        let err = RuntimeConfig::from_toml_str("[pool]\nmax_inactive = 0\n").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = RuntimeConfig::from_toml_str("[pool]\npreload = 3\n").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn overrides_replace_file_values() {
        let config = RuntimeConfig::from_toml_str("[pool]\ndefault_preload = 3\n")
            .unwrap()
            .with_overrides(vars(&[
                (ENV_DEFAULT_PRELOAD, "8"),
                (ENV_AUTO_CREATE, "off"),
                (ENV_MAX_INACTIVE, "16"),
            ]))
            .unwrap();
        assert_eq!(
            config.pool,
            PoolConfig {
                default_preload: 8,
                auto_create: false,
                max_inactive: Some(16),
            }
        );
    }

    #[rstest]
    #[case("none", None)]
    #[case("", None)]
    #[case(" 12 ", Some(12))]
    fn max_inactive_override_accepts_none(#[case] raw: &str, #[case] expected: Option<usize>) {
        let config = RuntimeConfig {
            pool: PoolConfig {
                max_inactive: Some(4),
                ..PoolConfig::default()
            },
            ..RuntimeConfig::default()
        }
        .with_overrides(vars(&[(ENV_MAX_INACTIVE, raw)]))
        .unwrap();
        assert_eq!(config.pool.max_inactive, expected);
    }

    #[rstest]
    #[case(ENV_DEFAULT_PRELOAD, "many")]
    #[case(ENV_AUTO_CREATE, "perhaps")]
    #[case(ENV_MAX_INACTIVE, "0")]
    fn malformed_overrides_are_configuration_errors(#[case] name: &str, #[case] raw: &str) {
        let err = RuntimeConfig::default()
            .with_overrides(vars(&[(name, raw)]))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }), "{err}");
    }

    #[test]
    fn toml_output_parses_back() {
        let config = RuntimeConfig {
            pool: PoolConfig {
                default_preload: 2,
                auto_create: false,
                max_inactive: Some(10),
            },
            ..RuntimeConfig::default()
        };
        let rendered = config.to_toml_string().unwrap();
        assert_eq!(RuntimeConfig::from_toml_str(&rendered).unwrap(), config);
    }
}
