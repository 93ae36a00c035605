//! Identity configuration
//!
//! Loaded from TOML, then overridden from `KEYSTONE_*` environment variables,
//! then validated. All fields are optional in the file.
//!
//! ```toml
//! default_key_type = 1
//! default_keys_required = 1
//! log_level = "info"
//! ```

use crate::errors::{IdentityError, IdentityResult};
use crate::purpose::KeyType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "KEYSTONE_";

/// Tunables for a single identity instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    /// Key type installed by `initialize`
    pub default_key_type: KeyType,
    /// Approval count for purposes without an explicit threshold
    pub default_keys_required: u32,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            default_key_type: KeyType::ECDSA,
            default_keys_required: 1,
            log_level: "info".to_string(),
        }
    }
}

impl IdentityConfig {
    /// Parse a TOML document and validate it
    pub fn from_toml_str(content: &str) -> IdentityResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> IdentityResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IdentityError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Merge with `KEYSTONE_*` process environment variables
    pub fn merge_with_env(&mut self) -> IdentityResult<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Merge with explicit `KEYSTONE_*` variables, ignoring unrelated ones
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> IdentityResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();
            match name {
                "DEFAULT_KEY_TYPE" => self.default_key_type = KeyType(parse_number(name, value)?),
                "DEFAULT_KEYS_REQUIRED" => {
                    self.default_keys_required = parse_number(name, value)?;
                }
                "LOG" => self.log_level = value.to_string(),
                _ => {}
            }
        }
        self.validate()
    }

    /// Validate the configuration
    pub fn validate(&self) -> IdentityResult<()> {
        if self.default_key_type == KeyType::NONE {
            return Err(IdentityError::config("default_key_type must be non-zero"));
        }
        if self.default_keys_required == 0 {
            return Err(IdentityError::config(
                "default_keys_required must be at least 1",
            ));
        }
        if self.log_level.trim().is_empty() {
            return Err(IdentityError::config("log_level must not be empty"));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> IdentityResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| IdentityError::config(format!("{ENV_PREFIX}{name}={value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = IdentityConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_key_type, KeyType::ECDSA);
        assert_eq!(config.default_keys_required, 1);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = IdentityConfig::from_toml_str("default_keys_required = 3").unwrap();
        assert_eq!(config.default_keys_required, 3);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_rejects_zero_threshold_and_unknown_fields() {
        assert_matches!(
            IdentityConfig::from_toml_str("default_keys_required = 0"),
            Err(IdentityError::Config { .. })
        );
        assert_matches!(
            IdentityConfig::from_toml_str("bogus = true"),
            Err(IdentityError::Config { .. })
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut config = IdentityConfig::default();
        config
            .merge_with_vars([
                ("KEYSTONE_DEFAULT_KEY_TYPE", "2"),
                ("KEYSTONE_LOG", "debug"),
                ("PATH", "/usr/bin"),
            ])
            .unwrap();
        assert_eq!(config.default_key_type, KeyType::RSA);
        assert_eq!(config.log_level, "debug");

        let err = config
            .merge_with_vars([("KEYSTONE_DEFAULT_KEYS_REQUIRED", "many")])
            .unwrap_err();
        assert_eq!(err.code(), "config");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level = \"warn\"").unwrap();
        let config = IdentityConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.log_level, "warn");

        let missing = IdentityConfig::load_from_file(Path::new("/nonexistent/keystone.toml"));
        assert_matches!(missing, Err(IdentityError::Config { .. }));
    }
}
