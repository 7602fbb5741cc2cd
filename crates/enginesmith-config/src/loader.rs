//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::GlobalConfig;
use crate::project::{ProjectConfig, ToolchainSection};
use crate::{ConfigError, ConfigResult, PROJECT_FILE};
use enginesmith_build::{
    EngineConfig, DEFAULT_DEPOT_TOOLS_URL, DEFAULT_LIBRARY_NAME, DEFAULT_REVISION,
    DEFAULT_SOLUTION_URL,
};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.enginesmith/config.toml) - lowest priority
/// 2. Project config (enginesmith.toml) - overrides global
/// 3. Environment variables (ENGINESMITH_*, GYP_MSVS_OVERRIDE_PATH) - overrides project
/// 4. CLI flags - highest priority, see [`Config::apply_cli`]
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration, environment overrides applied
    pub project: ProjectConfig,

    /// Global configuration
    pub global: GlobalConfig,

    /// Directory where enginesmith.toml was found
    pub project_root: Option<PathBuf>,

    /// Base for relative paths: the project root, or the start directory
    pub work_dir: PathBuf,
}

/// Values given on the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub engine_root: Option<PathBuf>,
    pub visual_studio: Option<PathBuf>,
    pub revision: Option<String>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use an explicit global config file instead of ~/.enginesmith/config.toml
    pub fn with_global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find enginesmith.toml, then loads the
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;
        let global_config = self.load_global_config()?;
        let project_config = self.apply_env_overrides(project_config)?;

        let work_dir = project_root
            .clone()
            .unwrap_or_else(|| start_dir.to_path_buf());

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
            work_dir,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let global_config = self.load_global_config()?;
        let project_config = self.apply_env_overrides(project_config)?;

        let project_root = config_path.parent().map(|p| p.to_path_buf());
        let work_dir = project_root.clone().unwrap_or_else(|| PathBuf::from("."));

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
            work_dir,
        })
    }

    /// Find project configuration by walking up directory tree
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_FILE);

            if config_path.is_file() {
                debug!(path = %config_path.display(), "found project config");
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Load global configuration; a missing file or home directory yields defaults
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        if self.global_config_path.is_none() {
            match GlobalConfig::global_config_path() {
                Ok(path) => self.global_config_path = Some(path),
                Err(ConfigError::HomeNotFound) => return Ok(GlobalConfig::default()),
                Err(e) => return Err(e),
            }
        }

        match &self.global_config_path {
            Some(path) if path.exists() => GlobalConfig::load_from_file(path),
            _ => Ok(GlobalConfig::default()),
        }
    }

    /// Apply environment variable overrides to project config
    fn apply_env_overrides(&self, mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if let Some(root) = non_empty_var("ENGINESMITH_ENGINE_ROOT") {
            config.engine_mut().root = Some(PathBuf::from(root));
        }

        if let Some(revision) = non_empty_var("ENGINESMITH_REVISION") {
            config.engine_mut().revision = Some(revision);
        }

        // The generator's own variable wins over ours when both are set
        let visual_studio = non_empty_var("GYP_MSVS_OVERRIDE_PATH")
            .or_else(|| non_empty_var("ENGINESMITH_VISUAL_STUDIO"));
        if let Some(path) = visual_studio {
            config.toolchain_mut().visual_studio = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Get the global configuration directory (~/.enginesmith)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".enginesmith"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Apply command-line values on top of everything else
    pub fn apply_cli(&mut self, overrides: &CliOverrides) {
        if let Some(root) = &overrides.engine_root {
            self.project.engine_mut().root = Some(root.clone());
        }
        if let Some(revision) = &overrides.revision {
            self.project.engine_mut().revision = Some(revision.clone());
        }
        if let Some(vs) = &overrides.visual_studio {
            self.project.toolchain_mut().visual_studio = Some(vs.clone());
        }
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if this is a project (has enginesmith.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }

    /// Effective engine root (project > global)
    pub fn engine_root(&self) -> Option<PathBuf> {
        self.project
            .engine_root()
            .or_else(|| self.global.default_engine_root())
            .map(|root| self.resolve(root))
    }

    /// Effective toolchain section (project > global)
    pub fn toolchain(&self) -> ToolchainSection {
        let project = self.project.toolchain.clone().unwrap_or_default();
        match &self.global.toolchain {
            Some(global) => project.or(global),
            None => project,
        }
    }

    /// Resolve everything into the value the pipeline consumes
    pub fn engine_config(&self) -> ConfigResult<EngineConfig> {
        let engine_root = self.engine_root().ok_or_else(|| ConfigError::MissingField {
            field: "engine.root".to_string(),
            hint: "set it in enginesmith.toml, ENGINESMITH_ENGINE_ROOT or --engine-root"
                .to_string(),
        })?;

        let mut config = EngineConfig::new(engine_root, self.work_dir.clone());

        let engine = self.project.engine.clone().unwrap_or_default();
        config.revision = engine.revision.unwrap_or_else(|| DEFAULT_REVISION.to_string());
        config.solution_url = engine
            .solution_url
            .unwrap_or_else(|| DEFAULT_SOLUTION_URL.to_string());
        config.depot_tools_url = engine
            .depot_tools_url
            .unwrap_or_else(|| DEFAULT_DEPOT_TOOLS_URL.to_string());

        if let Some(paths) = &self.project.paths {
            if let Some(patches) = &paths.patches {
                config.patches_dir = self.resolve(patches);
            }
            if let Some(native) = &paths.native {
                config.native_dir = self.resolve(native);
            }
            if let Some(plugins) = &paths.plugins {
                config.plugins_dir = self.resolve(plugins);
            }
        }

        let toolchain = self.toolchain();
        config.visual_studio = toolchain.visual_studio.as_deref().map(|p| self.resolve(p));
        config.toolchain = toolchain.to_toolchain();
        config.library_name = self
            .project
            .library_name()
            .unwrap_or(DEFAULT_LIBRARY_NAME)
            .to_string();

        Ok(config)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir.join(path)
        }
    }
}
