//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Values resolve in this order (later overrides earlier):
//! 1. Default values
//! 2. The config file
//! 3. Explicit arguments to constructors (not handled here)
//!
//! # Locations
//!
//! Searched in order:
//! 1. `$STAMPWORK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/stampwork/config.toml`
//! 3. `~/.stampwork/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use stampwork::core::config::Config;
//!
//! let result = Config::load().unwrap();
//! for warning in &result.warnings {
//!     eprintln!("{}: {}", warning.path.display(), warning.message);
//! }
//! let config = result.config;
//! println!("precedence: {:?}", config.precedence());
//! println!("cache capacity: {}", config.cache_capacity());
//! ```

pub mod schema;

pub use schema::{CacheDefaults, ClockMode, CommitDefaults, CoordinateDefaults, StampworkConfig};

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{Precedence, Status};

/// Default resolution cache capacity.
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The file that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Loaded configuration with defaults applied by the accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents
    pub file: StampworkConfig,
    /// Path the file was loaded from, if any
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Wrap an in-memory configuration.
    pub fn new(file: StampworkConfig) -> Self {
        Self {
            file,
            loaded_from: None,
        }
    }

    /// Load configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated. A missing file is not an error (defaults are used).
    pub fn load() -> Result<ConfigLoadResult, ConfigError> {
        match Self::locate() {
            Some(path) => Self::load_from(&path),
            None => Ok(ConfigLoadResult {
                config: Config::default(),
                warnings: Vec::new(),
            }),
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<ConfigLoadResult, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: StampworkConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        file.validate()?;

        let warnings = Self::collect_warnings(&file, path);
        for warning in &warnings {
            tracing::warn!(path = %warning.path.display(), "{}", warning.message);
        }
        tracing::debug!(path = %path.display(), "loaded config");

        Ok(ConfigLoadResult {
            config: Config {
                file,
                loaded_from: Some(path.to_path_buf()),
            },
            warnings,
        })
    }

    fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("STAMPWORK_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("stampwork/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".stampwork/config.toml"))
            .filter(|path| path.exists())
    }

    fn collect_warnings(file: &StampworkConfig, path: &Path) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if let Some(commit) = &file.commit {
            if commit.fixed_time.is_some() && commit.clock != Some(ClockMode::Fixed) {
                warnings.push(ConfigWarning {
                    message: "commit.fixed_time is ignored unless commit.clock = \"fixed\""
                        .to_string(),
                    path: path.to_path_buf(),
                });
            }
        }

        if let Some(states) = file.coordinate.as_ref().and_then(|c| c.allowed_states.as_ref()) {
            if !states.contains(&Status::Active) {
                warnings.push(ConfigWarning {
                    message: "coordinate.allowed_states excludes active; default coordinates \
                              will not see current content"
                        .to_string(),
                    path: path.to_path_buf(),
                });
            }
        }

        warnings
    }

    /// Canonical config file location: `~/.stampwork/config.toml`.
    pub fn canonical_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".stampwork/config.toml"))
    }

    /// Write this configuration to `path`.
    ///
    /// Creates parent directories if needed and replaces the file by
    /// rename, so readers never see a partial file.
    pub fn write_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.file.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents = toml::to_string_pretty(&self.file)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;
        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;
        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    // =========================================================================
    // Accessors with defaults
    // =========================================================================

    fn coordinate(&self) -> Option<&CoordinateDefaults> {
        self.file.coordinate.as_ref()
    }

    fn commit(&self) -> Option<&CommitDefaults> {
        self.file.commit.as_ref()
    }

    /// Precedence for default coordinates. Defaults to `Path`.
    pub fn precedence(&self) -> Precedence {
        self.coordinate()
            .and_then(|c| c.precedence)
            .unwrap_or(Precedence::Path)
    }

    /// Allowed states for default coordinates. Defaults to active and
    /// inactive.
    pub fn allowed_states(&self) -> BTreeSet<Status> {
        self.coordinate()
            .and_then(|c| c.allowed_states.clone())
            .unwrap_or_else(|| BTreeSet::from([Status::Active, Status::Inactive]))
    }

    /// Standard path to position on. Defaults to "development".
    pub fn default_path(&self) -> &str {
        self.coordinate()
            .and_then(|c| c.default_path.as_deref())
            .unwrap_or("development")
    }

    /// Module priority by well-known name. Defaults to empty.
    pub fn module_priority(&self) -> &[String] {
        self.coordinate()
            .and_then(|c| c.module_priority.as_deref())
            .unwrap_or(&[])
    }

    /// Clock mode for commits. Defaults to `Wall`.
    pub fn clock_mode(&self) -> ClockMode {
        self.commit().and_then(|c| c.clock).unwrap_or_default()
    }

    /// Fixed commit time, if configured.
    pub fn fixed_time(&self) -> Option<i64> {
        self.commit().and_then(|c| c.fixed_time)
    }

    /// Whether blank commit comments are dropped. Defaults to `true`.
    pub fn drop_empty_comments(&self) -> bool {
        self.commit()
            .and_then(|c| c.drop_empty_comments)
            .unwrap_or(true)
    }

    /// Resolution cache capacity. Defaults to [`DEFAULT_CACHE_CAPACITY`].
    pub fn cache_capacity(&self) -> usize {
        self.file
            .cache
            .as_ref()
            .and_then(|c| c.capacity)
            .unwrap_or(DEFAULT_CACHE_CAPACITY)
    }

    /// File the configuration was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}
