//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! Searched in order:
//! 1. `$STAMPWORK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/stampwork/config.toml`
//! 3. `~/.stampwork/config.toml` (canonical write location)
//!
//! # Validation
//!
//! Values are validated after parsing. Unknown keys are rejected at parse
//! time.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::{Precedence, Status, TIME_CANCELED, TIME_UNCOMMITTED};

/// Top-level configuration file.
///
/// # Example
///
/// ```toml
/// [coordinate]
/// precedence = "path"
/// allowed_states = ["active"]
/// default_path = "development"
/// module_priority = ["module/core"]
///
/// [commit]
/// clock = "fixed"
/// fixed_time = 1700000000000
/// drop_empty_comments = true
///
/// [cache]
/// capacity = 4096
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StampworkConfig {
    /// Defaults for coordinates built from configuration
    pub coordinate: Option<CoordinateDefaults>,

    /// Commit clock and comment handling
    pub commit: Option<CommitDefaults>,

    /// Resolution cache sizing
    pub cache: Option<CacheDefaults>,
}

impl StampworkConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(coordinate) = &self.coordinate {
            coordinate.validate()?;
        }
        if let Some(commit) = &self.commit {
            commit.validate()?;
        }
        if let Some(cache) = &self.cache {
            cache.validate()?;
        }
        Ok(())
    }
}

/// Default stamp coordinate settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinateDefaults {
    /// "path" or "time"
    pub precedence: Option<Precedence>,

    /// Statuses a default coordinate admits
    pub allowed_states: Option<BTreeSet<Status>>,

    /// Which standard path to position on
    pub default_path: Option<String>,

    /// Well-known module names, highest priority first
    pub module_priority: Option<Vec<String>>,
}

impl CoordinateDefaults {
    /// Standard path names a default coordinate may use.
    pub const VALID_PATHS: &'static [&'static str] = &["development", "master"];

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(states) = &self.allowed_states {
            if states.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "coordinate.allowed_states cannot be empty".to_string(),
                ));
            }
        }

        if let Some(path) = &self.default_path {
            if !Self::VALID_PATHS.contains(&path.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid default path '{}', must be one of: {}",
                    path,
                    Self::VALID_PATHS.join(", ")
                )));
            }
        }

        if let Some(modules) = &self.module_priority {
            if modules.iter().any(|m| m.trim().is_empty()) {
                return Err(ConfigError::InvalidValue(
                    "coordinate.module_priority cannot contain empty names".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Where commit times come from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// Current wall-clock time
    #[default]
    Wall,
    /// Always `commit.fixed_time`
    Fixed,
}

/// Commit settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CommitDefaults {
    /// Clock used by `commit`
    pub clock: Option<ClockMode>,

    /// Epoch millis used when `clock = "fixed"`
    pub fixed_time: Option<i64>,

    /// Treat blank comments as absent
    pub drop_empty_comments: Option<bool>,
}

impl CommitDefaults {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock == Some(ClockMode::Fixed) && self.fixed_time.is_none() {
            return Err(ConfigError::InvalidValue(
                "commit.clock = \"fixed\" requires commit.fixed_time".to_string(),
            ));
        }
        if let Some(time) = self.fixed_time {
            if time == TIME_UNCOMMITTED || time == TIME_CANCELED {
                return Err(ConfigError::InvalidValue(format!(
                    "commit.fixed_time {} is a reserved sentinel",
                    time
                )));
            }
        }
        Ok(())
    }
}

/// Resolution cache settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheDefaults {
    /// Maximum number of memoized resolutions
    pub capacity: Option<usize>,
}

impl CacheDefaults {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == Some(0) {
            return Err(ConfigError::InvalidValue(
                "cache.capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(StampworkConfig::default().validate().is_ok());
    }

    #[test]
    fn parses_full_file() {
        let config: StampworkConfig = toml::from_str(
            r#"
            [coordinate]
            precedence = "time"
            allowed_states = ["active", "inactive"]
            default_path = "master"
            module_priority = ["module/core"]

            [commit]
            clock = "fixed"
            fixed_time = 1000
            drop_empty_comments = false

            [cache]
            capacity = 16
            "#,
        )
        .unwrap();

        let coordinate = config.coordinate.as_ref().unwrap();
        assert_eq!(coordinate.precedence, Some(Precedence::Time));
        assert_eq!(
            coordinate.allowed_states,
            Some(BTreeSet::from([Status::Active, Status::Inactive]))
        );
        assert_eq!(config.commit.as_ref().unwrap().clock, Some(ClockMode::Fixed));
        assert_eq!(config.cache.as_ref().unwrap().capacity, Some(16));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_status_rejected_at_parse() {
        let parsed: Result<StampworkConfig, _> = toml::from_str(
            r#"
            [coordinate]
            allowed_states = ["retired"]
            "#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn empty_states_rejected() {
        let config = StampworkConfig {
            coordinate: Some(CoordinateDefaults {
                allowed_states: Some(BTreeSet::new()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_path_rejected() {
        let config = StampworkConfig {
            coordinate: Some(CoordinateDefaults {
                default_path: Some("feature".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn fixed_clock_requires_time() {
        let config = StampworkConfig {
            commit: Some(CommitDefaults {
                clock: Some(ClockMode::Fixed),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn sentinel_fixed_time_rejected() {
        let commit = CommitDefaults {
            clock: Some(ClockMode::Fixed),
            fixed_time: Some(i64::MAX),
            drop_empty_comments: None,
        };
        assert!(commit.validate().is_err());
    }

    #[test]
    fn zero_capacity_rejected() {
        let cache = CacheDefaults { capacity: Some(0) };
        assert!(cache.validate().is_err());
    }

    #[test]
    fn roundtrip() {
        let config = StampworkConfig {
            coordinate: Some(CoordinateDefaults {
                precedence: Some(Precedence::Path),
                allowed_states: Some(BTreeSet::from([Status::Active])),
                default_path: Some("development".to_string()),
                module_priority: Some(vec!["module/core".to_string()]),
            }),
            commit: Some(CommitDefaults {
                clock: Some(ClockMode::Wall),
                fixed_time: None,
                drop_empty_comments: Some(true),
            }),
            cache: Some(CacheDefaults { capacity: Some(8) }),
        };
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: StampworkConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }
}
