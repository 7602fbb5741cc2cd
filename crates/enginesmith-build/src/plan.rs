//! Settings derived from a build target
//!
//! [`BuildPlan`] replaces the ad-hoc global state the build steps used to
//! share: generator flags, output directories, ninja targets, the native
//! runner target, plugin destination and the build-graph label prefixes.

use crate::error::BuildResult;
use crate::target::{BuildTarget, Platform};
use serde::{Deserialize, Serialize};

/// Ninja target built for every platform
pub const TXT_TARGET: &str = "flutter/third_party/txt:txt_lib";

/// Extra ninja targets for windows (ANGLE)
pub const ANGLE_TARGETS: [&str; 2] = ["third_party/angle:angle_lib", "third_party/angle:libEGL_static"];

/// Label prefix of the iOS library nodes in the build graph
pub const IOS_LIBRARY_PREFIX: &str = "Lib_iOS_arm64";

/// Derived build settings for one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub target: BuildTarget,
    /// Arguments for `flutter/tools/gn`
    pub gn_flags: Vec<String>,
    /// Directory under `<source_root>/out`
    pub output_dir: String,
    pub ninja_targets: Vec<String>,
    /// Target passed to the native runner
    pub native_target: String,
    /// Whether the native runner is hosted by mono
    pub native_via_mono: bool,
    /// Directory under the native dir the runner writes to
    pub native_output_dir: String,
    /// Folder under the plugins dir receiving the artifacts
    pub plugin_destination: String,
    /// Build-graph prefix of the library nodes feeding the iOS prelink
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_prefix: Option<String>,
    /// Build-graph prefix of the Android link nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_prefix: Option<String>,
}

impl BuildPlan {
    /// Derive the plan for a validated target
    pub fn new(target: BuildTarget) -> BuildResult<Self> {
        target.validate()?;

        let android_arm64 = target.is_android_arm64();
        let mode = target.mode.name();

        Ok(Self {
            target,
            gn_flags: gn_flags(&target),
            output_dir: output_dir(&target),
            ninja_targets: ninja_targets(target.platform),
            native_target: native_target(&target),
            native_via_mono: target.platform != Platform::Windows,
            native_output_dir: if android_arm64 {
                format!("build_{mode}_arm64")
            } else {
                format!("build_{mode}")
            },
            plugin_destination: plugin_destination(&target).to_string(),
            library_prefix: (target.platform == Platform::Ios)
                .then(|| IOS_LIBRARY_PREFIX.to_string()),
            link_prefix: (target.platform == Platform::Android).then(|| {
                if android_arm64 {
                    "Link_Android_arm64".to_string()
                } else {
                    "Link_Android_arm32".to_string()
                }
            }),
        })
    }

    /// Mode substring searched for in build-graph labels
    pub fn graph_mode(&self) -> &'static str {
        self.target.mode.name()
    }

    /// Architecture token used in Android artifact paths
    pub fn android_arch_token(&self) -> &'static str {
        if self.target.is_android_arm64() {
            "arm64"
        } else {
            "arm32"
        }
    }

    /// Both stale native output directories, removed before each run
    pub fn stale_native_outputs(&self) -> [String; 2] {
        let mode = self.target.mode.name();
        [format!("build_{mode}"), format!("build_{mode}_arm64")]
    }
}

fn gn_flags(target: &BuildTarget) -> Vec<String> {
    let mut flags = Vec::new();

    if target.platform.is_mobile() {
        flags.push(format!("--{}", target.platform.name()));
    }
    flags.push(format!("--runtime-mode={}", target.mode));
    if target.is_android_arm64() {
        flags.push("--android-cpu=arm64".to_string());
    }
    if target.platform == Platform::Ios && target.bitcode {
        flags.push("--bitcode".to_string());
    }
    if !target.mode.is_release() {
        flags.push("--unoptimized".to_string());
    }

    flags
}

fn output_dir(target: &BuildTarget) -> String {
    let prefix = match target.platform {
        Platform::Mac | Platform::Windows => "host",
        Platform::Android => "android",
        Platform::Ios => "ios",
    };
    let mode = if target.mode.is_release() {
        "release"
    } else {
        "debug_unopt"
    };
    let suffix = if target.is_android_arm64() { "_arm64" } else { "" };
    format!("{prefix}_{mode}{suffix}")
}

fn ninja_targets(platform: Platform) -> Vec<String> {
    let mut targets = vec![TXT_TARGET.to_string()];
    if platform == Platform::Windows {
        targets.extend(ANGLE_TARGETS.iter().map(|t| t.to_string()));
    }
    targets
}

fn native_target(target: &BuildTarget) -> String {
    let platform = match target.platform {
        Platform::Windows => "win",
        other => other.name(),
    };
    let mut name = format!("{platform}_{}", target.mode);
    if target.is_android_arm64() {
        name.push_str("_arm64");
    }
    name
}

fn plugin_destination(target: &BuildTarget) -> &'static str {
    match target.platform {
        Platform::Windows => "x86_64",
        Platform::Mac => "osx",
        Platform::Android if target.architecture.is_arm64() => "android/arm64",
        Platform::Android => "android",
        Platform::Ios => "ios",
    }
}
