//! Embedded resolution configuration
//!
//! Read from a standalone TOML file, from the `[embed]` table of a
//! `raya.toml` manifest, and from `RAYA_EMBED_*` environment variables.
//!
//! ```toml
//! [embed]
//! max-depth = 8
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Default nesting limit below a loaded module
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Largest accepted nesting limit
pub const MAX_DEPTH_LIMIT: usize = 256;

/// Environment variable overriding `max_depth`
pub const MAX_DEPTH_ENV: &str = "RAYA_EMBED_MAX_DEPTH";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Environment variable holds an unusable value
    #[error("Invalid value {value:?} for {var}")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Value found
        value: String,
    },

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Configuration of the resolution engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct EmbedConfig {
    /// How many levels of nested bundles below a loaded module are searched.
    /// A module embedded directly in a loaded module is at depth 1.
    pub max_depth: usize,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// A manifest only contributes its `[embed]` table
#[derive(Deserialize)]
struct ManifestSection {
    #[serde(default)]
    embed: Option<EmbedConfig>,
}

impl EmbedConfig {
    /// Parse a standalone configuration file's contents
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: EmbedConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read the `[embed]` table of a `raya.toml` manifest
    ///
    /// A manifest without the table yields the defaults.
    pub fn from_manifest_str(content: &str) -> Result<Self, ConfigError> {
        let section: ManifestSection = toml::from_str(content)?;
        let config = section.embed.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; `raya.toml` is read as a manifest
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        if path.file_name().is_some_and(|name| name == "raya.toml") {
            Self::from_manifest_str(&content)
        } else {
            Self::from_str(&content)
        }
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    /// Like [`EmbedConfig::from_env`], but falls back to the defaults when
    /// the environment holds an invalid value
    pub fn from_env_or_default() -> Self {
        Self::from_env().unwrap_or_else(|e| {
            warn!(error = %e, "ignoring embedded resolution settings from environment");
            Self::default()
        })
    }

    /// Apply overrides from the process environment
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides looked up through `lookup`
    pub fn with_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(MAX_DEPTH_ENV) {
            self.max_depth = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: MAX_DEPTH_ENV,
                value: value.clone(),
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 || self.max_depth > MAX_DEPTH_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "max-depth must be between 1 and {}, got {}",
                MAX_DEPTH_LIMIT, self.max_depth
            )));
        }
        Ok(())
    }
}
