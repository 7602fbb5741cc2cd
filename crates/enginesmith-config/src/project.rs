//! Project Configuration (enginesmith.toml)
//!
//! Handles project-level configuration stored in `enginesmith.toml`. The
//! directory holding the file is the work directory: relative paths in the
//! file are resolved against it.

use crate::{ConfigError, ConfigResult};
use enginesmith_build::Toolchain;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project configuration from enginesmith.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Engine checkout settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineSection>,

    /// Directory layout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<PathsSection>,

    /// External tool overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<ToolchainSection>,

    /// Relink settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relink: Option<RelinkSection>,
}

/// `[engine]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// Directory receiving depot_tools and the engine checkout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Engine revision (default: flutter-1.17-candidate.5)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    /// Engine repository for the gclient solution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution_url: Option<String>,

    /// depot_tools repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depot_tools_url: Option<String>,
}

/// `[paths]`, relative to the work directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct PathsSection {
    /// Patch files (default: "patches")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patches: Option<PathBuf>,

    /// Native runner project (default: "..")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<PathBuf>,

    /// Plugin folders (default: "../../com.unity.uiwidgets/Runtime/Plugins")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins: Option<PathBuf>,
}

/// `[toolchain]`, shared by project and global config
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ToolchainSection {
    /// Visual Studio installation (windows)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_studio: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ninja: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gclient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mono: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_runner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xcode_select: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ld: Option<String>,
}

/// `[relink]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RelinkSection {
    /// Plugin library base name (default: "libUIWidgets")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
}

impl ProjectConfig {
    /// Load project configuration from a file
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

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(engine) = &self.engine {
            non_empty("engine.revision", engine.revision.as_deref())?;
            non_empty("engine.solution_url", engine.solution_url.as_deref())?;
            non_empty("engine.depot_tools_url", engine.depot_tools_url.as_deref())?;
        }

        if let Some(toolchain) = &self.toolchain {
            toolchain.validate()?;
        }

        if let Some(name) = self.relink.as_ref().and_then(|r| r.library_name.as_deref()) {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(ConfigError::InvalidValue {
                    field: "relink.library_name".to_string(),
                    reason: format!("'{}' must be a plain file name", name),
                });
            }
        }

        Ok(())
    }

    /// Get the engine root, if present
    pub fn engine_root(&self) -> Option<&Path> {
        self.engine.as_ref().and_then(|e| e.root.as_deref())
    }

    /// Get the engine revision, if present
    pub fn revision(&self) -> Option<&str> {
        self.engine.as_ref().and_then(|e| e.revision.as_deref())
    }

    /// Get the relink library name, if present
    pub fn library_name(&self) -> Option<&str> {
        self.relink.as_ref().and_then(|r| r.library_name.as_deref())
    }

    /// Mutable `[engine]` section, created on demand
    pub fn engine_mut(&mut self) -> &mut EngineSection {
        self.engine.get_or_insert_with(EngineSection::default)
    }

    /// Mutable `[toolchain]` section, created on demand
    pub fn toolchain_mut(&mut self) -> &mut ToolchainSection {
        self.toolchain.get_or_insert_with(ToolchainSection::default)
    }
}

impl ToolchainSection {
    pub fn validate(&self) -> ConfigResult<()> {
        let programs = [
            ("toolchain.python", &self.python),
            ("toolchain.ninja", &self.ninja),
            ("toolchain.git", &self.git),
            ("toolchain.gclient", &self.gclient),
            ("toolchain.patch", &self.patch),
            ("toolchain.mono", &self.mono),
            ("toolchain.native_runner", &self.native_runner),
            ("toolchain.nm", &self.nm),
            ("toolchain.xcode_select", &self.xcode_select),
            ("toolchain.ld", &self.ld),
        ];
        for (field, value) in programs {
            non_empty(field, value.as_deref())?;
        }
        Ok(())
    }

    /// Fill unset values from `lower`
    pub fn or(&self, lower: &ToolchainSection) -> ToolchainSection {
        ToolchainSection {
            visual_studio: self.visual_studio.clone().or_else(|| lower.visual_studio.clone()),
            python: self.python.clone().or_else(|| lower.python.clone()),
            ninja: self.ninja.clone().or_else(|| lower.ninja.clone()),
            git: self.git.clone().or_else(|| lower.git.clone()),
            gclient: self.gclient.clone().or_else(|| lower.gclient.clone()),
            patch: self.patch.clone().or_else(|| lower.patch.clone()),
            mono: self.mono.clone().or_else(|| lower.mono.clone()),
            native_runner: self.native_runner.clone().or_else(|| lower.native_runner.clone()),
            nm: self.nm.clone().or_else(|| lower.nm.clone()),
            xcode_select: self.xcode_select.clone().or_else(|| lower.xcode_select.clone()),
            ld: self.ld.clone().or_else(|| lower.ld.clone()),
        }
    }

    /// Program names, defaults for anything unset
    pub fn to_toolchain(&self) -> Toolchain {
        let defaults = Toolchain::default();
        let pick = |value: &Option<String>, default: String| value.clone().unwrap_or(default);
        Toolchain {
            python: pick(&self.python, defaults.python),
            ninja: pick(&self.ninja, defaults.ninja),
            git: pick(&self.git, defaults.git),
            gclient: pick(&self.gclient, defaults.gclient),
            patch: pick(&self.patch, defaults.patch),
            mono: pick(&self.mono, defaults.mono),
            native_runner: pick(&self.native_runner, defaults.native_runner),
            nm: pick(&self.nm, defaults.nm),
            xcode_select: pick(&self.xcode_select, defaults.xcode_select),
            ld: pick(&self.ld, defaults.ld),
        }
    }
}

fn non_empty(field: &str, value: Option<&str>) -> ConfigResult<()> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "value cannot be empty".to_string(),
        }),
        _ => Ok(()),
    }
}
