//! Version-pinned source patches
//!
//! Each patch is copied from the patches directory into the directory it
//! modifies and applied there with `patch -p<strip> -N < <file>`. A
//! [`PatchSet`] tracks which records were applied so that exactly those
//! are reverted, newest first.

use crate::engine::EngineConfig;
use crate::error::{BuildError, BuildResult};
use crate::fs::FileSystem;
use crate::process::{run_checked, Invocation, ProcessRunner};
use crate::target::Platform;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use Platform::{Android, Ios, Mac, Windows};

/// Lifecycle of a patch within one build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchState {
    Pending,
    Applied,
    Reverted,
}

/// A source patch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// File relative to the patches directory
    pub file: PathBuf,
    /// Directory, relative to the source root, the patch applies in
    pub target_dir: PathBuf,
    /// Leading path components stripped (`-p`)
    pub strip: u8,
    pub platforms: Vec<Platform>,
    pub state: PatchState,
}

impl Patch {
    pub fn new(file: &str, target_dir: &str, strip: u8, platforms: &[Platform]) -> Self {
        Self {
            file: PathBuf::from(file),
            target_dir: PathBuf::from(target_dir),
            strip,
            platforms: platforms.to_vec(),
            state: PatchState::Pending,
        }
    }

    /// File name of the patch as it lands in the target directory
    pub fn name(&self) -> String {
        self.file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn applies_to(&self, platform: Platform) -> bool {
        self.platforms.contains(&platform)
    }

    /// Absolute directory the patch is applied in
    pub fn apply_dir(&self, source_root: &Path) -> PathBuf {
        source_root.join(&self.target_dir)
    }

    fn invocation(&self, program: &str, source_root: &Path, reverse: bool) -> Invocation {
        let dir = self.apply_dir(source_root);
        let flag = if reverse { "-R" } else { "-N" };
        Invocation::new(program)
            .arg(format!("-p{}", self.strip))
            .arg(flag)
            .stdin_file(dir.join(self.name()))
            .cwd(dir)
    }
}

/// The pinned patch table
pub fn pinned_patches() -> Vec<Patch> {
    vec![
        Patch::new("skia.patch", "third_party/skia", 1, &[Android, Ios, Mac, Windows]),
        Patch::new("BUILD.gn.patch", "flutter/third_party/txt", 0, &[Ios, Mac, Windows]),
        Patch::new("find_sdk.patch", "build/mac", 0, &[Ios, Mac, Android]),
        Patch::new("wuffs-v0.2.c.patch", "third_party/wuffs/release/c", 0, &[Ios]),
        Patch::new("android/BUILD.gn.patch", "flutter/third_party/txt", 0, &[Android]),
        Patch::new(
            "android/BUILD_2.gn.patch",
            "build/secondary/third_party/libcxxabi",
            0,
            &[Android],
        ),
        Patch::new("windows/BUILD.gn.patch", "third_party/angle", 0, &[Windows]),
        Patch::new(
            "windows/cpp.patch",
            "third_party/angle/src/libANGLE/renderer/d3d/d3d11",
            0,
            &[Windows],
        ),
        Patch::new("windows/BUILD_2.gn.patch", "third_party/skia", 0, &[Windows]),
    ]
}

/// Patches selected for one platform, with their state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSet {
    pub platform: Platform,
    pub patches: Vec<Patch>,
}

impl PatchSet {
    /// Select the pinned patches for `platform`, in table order
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            patches: pinned_patches()
                .into_iter()
                .filter(|patch| patch.applies_to(platform))
                .collect(),
        }
    }

    pub fn applied_count(&self) -> usize {
        self.patches
            .iter()
            .filter(|p| p.state == PatchState::Applied)
            .count()
    }

    pub fn has_applied(&self) -> bool {
        self.applied_count() > 0
    }

    /// Mark every patch as applied without running anything
    ///
    /// Used by `patch revert` to undo patches applied by an earlier run.
    pub fn assume_applied(&mut self) {
        for patch in &mut self.patches {
            patch.state = PatchState::Applied;
        }
    }

    /// Copy each patch into its directory and apply it
    ///
    /// Stops at the first failure; patches applied up to that point stay
    /// marked and can be reverted.
    pub fn apply_all(
        &mut self,
        fs: &dyn FileSystem,
        runner: &dyn ProcessRunner,
        config: &EngineConfig,
        source_root: &Path,
        keep_going: bool,
    ) -> BuildResult<()> {
        for patch in &mut self.patches {
            if patch.state == PatchState::Applied {
                return Err(BuildError::PatchAlreadyApplied { name: patch.name() });
            }

            let source = config.patch_file(&patch.file);
            if !fs.is_file(&source) {
                return Err(BuildError::PatchNotFound(source));
            }
            let dir = patch.apply_dir(source_root);
            fs.create_dir_all(&dir)?;
            fs.copy(&source, &dir.join(patch.name()))?;

            info!(patch = %patch.file.display(), dir = %dir.display(), "applying patch");
            let invocation = patch.invocation(&config.toolchain.patch, source_root, false);
            run_checked(runner, &invocation, keep_going)?;
            patch.state = PatchState::Applied;
        }
        Ok(())
    }

    /// Revert every applied patch in reverse order
    ///
    /// Pending and already reverted patches are skipped. Returns the number
    /// of patches reverted.
    pub fn revert_all(
        &mut self,
        runner: &dyn ProcessRunner,
        config: &EngineConfig,
        source_root: &Path,
        keep_going: bool,
    ) -> BuildResult<usize> {
        let mut reverted = 0;
        for patch in self.patches.iter_mut().rev() {
            if patch.state != PatchState::Applied {
                debug!(patch = %patch.file.display(), state = ?patch.state, "nothing to revert");
                continue;
            }

            info!(patch = %patch.file.display(), "reverting patch");
            let invocation = patch.invocation(&config.toolchain.patch, source_root, true);
            run_checked(runner, &invocation, keep_going)?;
            patch.state = PatchState::Reverted;
            reverted += 1;
        }
        Ok(reverted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_per_platform() {
        let names = |p: Platform| -> Vec<String> {
            PatchSet::for_platform(p)
                .patches
                .iter()
                .map(|patch| patch.file.display().to_string())
                .collect()
        };

        assert_eq!(
            names(Platform::Ios),
            vec!["skia.patch", "BUILD.gn.patch", "find_sdk.patch", "wuffs-v0.2.c.patch"]
        );
        assert_eq!(
            names(Platform::Mac),
            vec!["skia.patch", "BUILD.gn.patch", "find_sdk.patch"]
        );
        assert_eq!(names(Platform::Android).len(), 4);
        assert_eq!(names(Platform::Windows).len(), 5);
    }

    #[test]
    fn test_invocation_flags() {
        let patch = Patch::new("skia.patch", "third_party/skia", 1, &[Mac]);
        let inv = patch.invocation("patch", Path::new("/src"), false);

        assert_eq!(inv.args, vec!["-p1", "-N"]);
        assert_eq!(inv.cwd, Some(PathBuf::from("/src/third_party/skia")));
        assert_eq!(inv.stdin, Some(PathBuf::from("/src/third_party/skia/skia.patch")));

        let inv = patch.invocation("patch", Path::new("/src"), true);
        assert_eq!(inv.args, vec!["-p1", "-R"]);
    }

    #[test]
    fn test_nested_patch_name() {
        let patch = Patch::new("windows/cpp.patch", "third_party/angle", 0, &[Windows]);
        assert_eq!(patch.name(), "cpp.patch");
    }
}
