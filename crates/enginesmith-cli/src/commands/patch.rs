//! Patch command - apply or revert the pinned source patches by hand

use super::EngineArgs;
use anyhow::{Context, Result};
use enginesmith_build::{
    EngineConfig, PatchSet, Platform, RealFileSystem, SystemProcessRunner,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchAction {
    Apply,
    Revert,
}

/// Patch command arguments
pub struct PatchArgs {
    pub platform: Platform,
    pub engine: EngineArgs,
    pub keep_going: bool,
}

/// Run the patch command
pub fn run(action: PatchAction, args: PatchArgs) -> Result<()> {
    let config = args.engine.engine_config()?;
    let source_root = source_root(&config);
    let runner = SystemProcessRunner;
    let mut set = PatchSet::for_platform(args.platform);

    match action {
        PatchAction::Apply => {
            set.apply_all(
                &RealFileSystem,
                &runner,
                &config,
                &source_root,
                args.keep_going,
            )
            .with_context(|| {
                format!(
                    "Patching stopped after {} of {} patches",
                    set.applied_count(),
                    set.patches.len()
                )
            })?;
            info!(count = set.applied_count(), "patches applied");
            println!("Applied {} patches to {}", set.applied_count(), source_root.display());
        }
        PatchAction::Revert => {
            // No record survives between runs; revert the whole platform set
            set.assume_applied();
            let reverted = set
                .revert_all(&runner, &config, &source_root, args.keep_going)
                .context("Failed to revert patches")?;
            println!("Reverted {} patches in {}", reverted, source_root.display());
        }
    }

    Ok(())
}

/// `FLUTTER_ROOT_PATH` when set, otherwise the checkout under the engine root
fn source_root(config: &EngineConfig) -> PathBuf {
    std::env::var("FLUTTER_ROOT_PATH")
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| config.default_source_root())
}
