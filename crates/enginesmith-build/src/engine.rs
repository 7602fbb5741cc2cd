//! Resolved engine build configuration
//!
//! [`EngineConfig`] is the explicit value handed to every step of the
//! pipeline. It is normally produced by `enginesmith-config`, but can be
//! built directly with [`EngineConfig::new`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine revision checked out by default
pub const DEFAULT_REVISION: &str = "flutter-1.17-candidate.5";

/// Engine repository used in the `.gclient` solution
pub const DEFAULT_SOLUTION_URL: &str = "git@github.com:flutter/engine.git";

/// Chromium depot_tools repository
pub const DEFAULT_DEPOT_TOOLS_URL: &str =
    "https://chromium.googlesource.com/chromium/tools/depot_tools.git";

/// Base name of the plugin library produced by the native runner
pub const DEFAULT_LIBRARY_NAME: &str = "libUIWidgets";

/// Program names used for external tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    pub python: String,
    pub ninja: String,
    pub git: String,
    pub gclient: String,
    pub patch: String,
    /// Host for the native runner outside windows
    pub mono: String,
    /// Native build runner executable, relative to the native directory
    pub native_runner: String,
    pub nm: String,
    pub xcode_select: String,
    /// Linker used to embed `icudtl.dat` on windows
    pub ld: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            ninja: "ninja".to_string(),
            git: "git".to_string(),
            gclient: "gclient".to_string(),
            patch: "patch".to_string(),
            mono: "mono".to_string(),
            native_runner: "bee.exe".to_string(),
            nm: "nm".to_string(),
            xcode_select: "xcode-select".to_string(),
            ld: "ld".to_string(),
        }
    }
}

/// Everything the pipeline needs to know besides the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding `depot_tools/` and `engine/`
    pub engine_root: PathBuf,
    /// Directory holding `enginesmith.toml`; `bitcode.conf` is written here
    pub work_dir: PathBuf,
    pub revision: String,
    pub solution_url: String,
    pub depot_tools_url: String,
    /// Directory containing the `.patch` files
    pub patches_dir: PathBuf,
    /// Directory of the native runner project (`bee.exe`, `artifacts/`)
    pub native_dir: PathBuf,
    /// Root of the per-platform plugin folders
    pub plugins_dir: PathBuf,
    /// Visual Studio install used by the generator on windows
    pub visual_studio: Option<PathBuf>,
    pub library_name: String,
    pub toolchain: Toolchain,
}

impl EngineConfig {
    /// Configuration with the conventional layout around `work_dir`
    pub fn new(engine_root: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        Self {
            engine_root: engine_root.into(),
            patches_dir: work_dir.join("patches"),
            native_dir: work_dir.join(".."),
            plugins_dir: work_dir.join("../../com.unity.uiwidgets/Runtime/Plugins"),
            work_dir,
            revision: DEFAULT_REVISION.to_string(),
            solution_url: DEFAULT_SOLUTION_URL.to_string(),
            depot_tools_url: DEFAULT_DEPOT_TOOLS_URL.to_string(),
            visual_studio: None,
            library_name: DEFAULT_LIBRARY_NAME.to_string(),
            toolchain: Toolchain::default(),
        }
    }

    pub fn with_native_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.native_dir = dir.into();
        self
    }

    pub fn with_plugins_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugins_dir = dir.into();
        self
    }

    pub fn with_visual_studio(mut self, dir: impl Into<PathBuf>) -> Self {
        self.visual_studio = Some(dir.into());
        self
    }

    pub fn depot_tools_dir(&self) -> PathBuf {
        self.engine_root.join("depot_tools")
    }

    /// Directory holding the `.gclient` file
    pub fn checkout_dir(&self) -> PathBuf {
        self.engine_root.join("engine")
    }

    /// Default engine source root (`FLUTTER_ROOT_PATH`)
    pub fn default_source_root(&self) -> PathBuf {
        self.checkout_dir().join("src")
    }

    /// Build graph written by the native runner
    pub fn graph_path(&self) -> PathBuf {
        self.native_dir.join("artifacts").join("tundra.dag.json")
    }

    pub fn bitcode_conf_path(&self) -> PathBuf {
        self.work_dir.join("bitcode.conf")
    }

    pub fn patch_file(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.patches_dir.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conventional_layout() {
        let config = EngineConfig::new("/engine", "/repo/engine");

        assert_eq!(config.patches_dir, PathBuf::from("/repo/engine/patches"));
        assert_eq!(config.native_dir, PathBuf::from("/repo/engine/.."));
        assert_eq!(config.default_source_root(), PathBuf::from("/engine/engine/src"));
        assert_eq!(
            config.graph_path(),
            PathBuf::from("/repo/engine/../artifacts/tundra.dag.json")
        );
        assert_eq!(config.revision, DEFAULT_REVISION);
        assert_eq!(config.toolchain.native_runner, "bee.exe");
    }
}
