//! Build target selection
//!
//! A build target is the combination of platform, CPU architecture, runtime
//! mode and the iOS bitcode switch. Everything else the pipeline needs is
//! derived from it by [`crate::plan::BuildPlan`].

use crate::error::{BuildError, BuildResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Mac,
    Windows,
}

impl Platform {
    /// Get platform name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Mac => "mac",
            Self::Windows => "windows",
        }
    }

    /// All supported platforms
    pub fn all() -> [Platform; 4] {
        [Self::Android, Self::Ios, Self::Mac, Self::Windows]
    }

    /// Mobile platforms are cross-compiled and pass their name to the generator
    pub fn is_mobile(&self) -> bool {
        matches!(self, Self::Android | Self::Ios)
    }

    /// Separator used when joining PATH entries on this platform's host
    pub fn path_separator(&self) -> char {
        match self {
            Self::Windows => ';',
            _ => ':',
        }
    }
}

impl FromStr for Platform {
    type Err = BuildError;

    fn from_str(s: &str) -> BuildResult<Self> {
        match s.to_lowercase().as_str() {
            "android" => Ok(Self::Android),
            "ios" => Ok(Self::Ios),
            "mac" | "macos" | "osx" => Ok(Self::Mac),
            "windows" | "win" => Ok(Self::Windows),
            other => Err(BuildError::unknown("platform", other)),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// CPU architecture selection
///
/// `Default` is the platform's historical default: 32-bit ARM on Android,
/// the host architecture on desktop. iOS always builds arm64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    #[default]
    Default,
    Arm64,
}

impl Architecture {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Arm64 => "arm64",
        }
    }

    pub fn is_arm64(&self) -> bool {
        matches!(self, Self::Arm64)
    }
}

impl FromStr for Architecture {
    type Err = BuildError;

    fn from_str(s: &str) -> BuildResult<Self> {
        match s.to_lowercase().as_str() {
            "" | "default" | "arm" | "arm32" => Ok(Self::Default),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            other => Err(BuildError::unknown("architecture", other)),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Engine runtime mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Debug,
    Release,
}

impl RuntimeMode {
    /// Get mode name, also the substring searched for in build-graph labels
    pub fn name(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    pub fn is_release(&self) -> bool {
        matches!(self, Self::Release)
    }
}

impl FromStr for RuntimeMode {
    type Err = BuildError;

    fn from_str(s: &str) -> BuildResult<Self> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "release" => Ok(Self::Release),
            other => Err(BuildError::unknown("runtime mode", other)),
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A fully specified build target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildTarget {
    pub platform: Platform,
    #[serde(default)]
    pub architecture: Architecture,
    pub mode: RuntimeMode,
    /// Embed bitcode (iOS only)
    #[serde(default)]
    pub bitcode: bool,
}

impl BuildTarget {
    /// Create a target with the default architecture and no bitcode
    pub fn new(platform: Platform, mode: RuntimeMode) -> Self {
        Self {
            platform,
            architecture: Architecture::Default,
            mode,
            bitcode: false,
        }
    }

    /// Set the architecture
    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    /// Enable or disable bitcode
    pub fn with_bitcode(mut self, bitcode: bool) -> Self {
        self.bitcode = bitcode;
        self
    }

    /// Whether an Android build targets arm64
    pub fn is_android_arm64(&self) -> bool {
        self.platform == Platform::Android && self.architecture.is_arm64()
    }

    /// Validate the target combination
    pub fn validate(&self) -> BuildResult<()> {
        if self.bitcode && self.platform != Platform::Ios {
            return Err(BuildError::InvalidTarget(format!(
                "bitcode can only be enabled for ios, not {}",
                self.platform
            )));
        }

        if self.architecture.is_arm64()
            && !matches!(self.platform, Platform::Android | Platform::Ios)
        {
            return Err(BuildError::InvalidTarget(format!(
                "arm64 is only selectable for android, not {}",
                self.platform
            )));
        }

        Ok(())
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.platform, self.mode)?;
        if self.is_android_arm64() {
            write!(f, "-arm64")?;
        }
        if self.bitcode {
            write!(f, "+bitcode")?;
        }
        Ok(())
    }
}
