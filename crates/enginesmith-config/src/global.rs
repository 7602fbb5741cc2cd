//! Global Configuration (~/.enginesmith/config.toml)
//!
//! Per-user defaults shared by every project: the usual engine root and
//! toolchain locations.

use crate::project::ToolchainSection;
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.enginesmith/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Toolchain defaults, overridden by the project's `[toolchain]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<ToolchainSection>,
}

/// Default settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Engine root used when a project does not name one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_root: Option<PathBuf>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(root) = self.default_engine_root() {
            if root.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "defaults.engine_root".to_string(),
                    reason: "path cannot be empty".to_string(),
                });
            }
        }

        match &self.toolchain {
            Some(toolchain) => toolchain.validate(),
            None => Ok(()),
        }
    }

    /// Get the global config file path (~/.enginesmith/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".enginesmith").join("config.toml"))
    }

    /// Get the default engine root
    pub fn default_engine_root(&self) -> Option<&Path> {
        self.defaults.as_ref().and_then(|d| d.engine_root.as_deref())
    }

    /// Merge another global config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &GlobalConfig) {
        if other.defaults.is_some() {
            self.defaults = other.defaults.clone();
        }
        if other.toolchain.is_some() {
            self.toolchain = other.toolchain.clone();
        }
    }
}
