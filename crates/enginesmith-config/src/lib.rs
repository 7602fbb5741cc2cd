//! Enginesmith configuration system
//!
//! Provides configuration management for engine builds including:
//! - Project configuration (enginesmith.toml)
//! - Global user configuration (~/.enginesmith/config.toml)
//! - Environment variable overrides
//! - Resolution into an [`enginesmith_build::EngineConfig`]
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.enginesmith/config.toml)
//! 2. Project config (enginesmith.toml, found by walking up)
//! 3. Environment variables (ENGINESMITH_*, GYP_MSVS_OVERRIDE_PATH)
//! 4. CLI flags
//!
//! # Example
//!
//! ```no_run
//! use enginesmith_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! let engine = config.engine_config().unwrap();
//! ```

pub mod global;
pub mod loader;
pub mod project;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Missing required setting '{field}': {hint}")]
    MissingField { field: String, hint: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Name of the project configuration file
pub const PROJECT_FILE: &str = "enginesmith.toml";

// Re-export main types
pub use global::GlobalConfig;
pub use loader::{CliOverrides, Config, ConfigLoader};
pub use project::{ProjectConfig, ToolchainSection};
