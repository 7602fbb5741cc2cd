pub mod build;
pub mod extract;
pub mod patch;
pub mod plan;

use anyhow::{Context, Result};
use clap::Args;
use enginesmith_build::{Architecture, BuildTarget, EngineConfig, Platform, RuntimeMode};
use enginesmith_config::{CliOverrides, ConfigLoader};
use std::path::PathBuf;

/// Target selection shared by commands that build or describe a target
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Target platform (android, ios, mac, windows)
    #[arg(long, short = 'p')]
    pub platform: Platform,
    /// Runtime mode (debug, release)
    #[arg(long, short = 'm')]
    pub mode: RuntimeMode,
    /// CPU architecture; arm64 applies to android
    #[arg(long, default_value = "default")]
    pub arch: Architecture,
    /// Embed bitcode (ios only)
    #[arg(long)]
    pub bitcode: bool,
}

impl TargetArgs {
    /// Build and validate the target
    pub fn target(&self) -> Result<BuildTarget> {
        let target = BuildTarget::new(self.platform, self.mode)
            .with_architecture(self.arch)
            .with_bitcode(self.bitcode);
        target.validate()?;
        Ok(target)
    }
}

/// Configuration overrides shared by commands that touch the engine checkout
#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// Directory receiving depot_tools and the engine checkout
    #[arg(long)]
    pub engine_root: Option<PathBuf>,
    /// Visual Studio installation (windows)
    #[arg(long)]
    pub visual_studio: Option<PathBuf>,
    /// Engine revision to check out
    #[arg(long)]
    pub revision: Option<String>,
    /// Project configuration file (default: enginesmith.toml found upwards)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
}

impl EngineArgs {
    /// Resolve the engine configuration: global < project < env < flags
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut loader = ConfigLoader::new();
        let mut config = match &self.config {
            Some(path) => loader
                .load_from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => {
                let cwd = std::env::current_dir().context("Failed to read current directory")?;
                loader
                    .load_from_directory(&cwd)
                    .context("Failed to load configuration")?
            }
        };

        config.apply_cli(&CliOverrides {
            engine_root: self.engine_root.clone(),
            visual_studio: self.visual_studio.clone(),
            revision: self.revision.clone(),
        });

        Ok(config.engine_config()?)
    }
}
