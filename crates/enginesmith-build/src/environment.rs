//! Child-process environment
//!
//! The environment is computed once from the caller's variables and passed
//! to each invocation. The orchestrator's own environment is never touched.

use crate::engine::EngineConfig;
use crate::error::{BuildError, BuildResult};
use crate::process::Invocation;
use crate::target::{BuildTarget, Platform};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

pub const FLUTTER_ROOT_PATH: &str = "FLUTTER_ROOT_PATH";
pub const PATH: &str = "PATH";
pub const GYP_MSVS_OVERRIDE_PATH: &str = "GYP_MSVS_OVERRIDE_PATH";
pub const SDKROOT: &str = "SDKROOT";

/// Environment overrides for the build's child processes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEnvironment {
    /// Engine source root (`FLUTTER_ROOT_PATH`)
    pub source_root: PathBuf,
    /// Variables set on every invocation
    pub vars: BTreeMap<String, String>,
}

impl BuildEnvironment {
    /// Resolve the environment for `target` from the caller's variables
    ///
    /// Windows builds need a Visual Studio path, either configured or already
    /// present as `GYP_MSVS_OVERRIDE_PATH`.
    pub fn resolve(
        config: &EngineConfig,
        target: &BuildTarget,
        process_env: &BTreeMap<String, String>,
    ) -> BuildResult<Self> {
        let mut vars = BTreeMap::new();

        let source_root = match process_env.get(FLUTTER_ROOT_PATH) {
            Some(existing) if !existing.is_empty() => {
                debug!(source_root = %existing, "FLUTTER_ROOT_PATH already set");
                PathBuf::from(existing)
            }
            _ => config.default_source_root(),
        };
        vars.insert(
            FLUTTER_ROOT_PATH.to_string(),
            source_root.display().to_string(),
        );

        let current_path = process_env.get(PATH).cloned().unwrap_or_default();
        vars.insert(
            PATH.to_string(),
            with_depot_tools(config, target.platform, &current_path),
        );

        if target.platform == Platform::Windows {
            match (&config.visual_studio, process_env.get(GYP_MSVS_OVERRIDE_PATH)) {
                (Some(vs), _) => {
                    vars.insert(GYP_MSVS_OVERRIDE_PATH.to_string(), vs.display().to_string());
                }
                (None, Some(existing)) if !existing.is_empty() => {}
                _ => {
                    return Err(BuildError::MissingConfig(
                        "a Visual Studio path is required for windows builds \
                         (--visual-studio or GYP_MSVS_OVERRIDE_PATH)"
                            .to_string(),
                    ))
                }
            }
        }

        Ok(Self { source_root, vars })
    }

    /// Apply the variables to an invocation
    pub fn apply(&self, invocation: Invocation) -> Invocation {
        invocation.envs(&self.vars)
    }

    /// Apply the variables for the native runner, which must not see `SDKROOT`
    pub fn apply_native(&self, invocation: Invocation) -> Invocation {
        self.apply(invocation).env_remove(SDKROOT)
    }
}

fn with_depot_tools(config: &EngineConfig, platform: Platform, current: &str) -> String {
    let already_present = current
        .split([';', ':'])
        .any(|entry| entry.trim_end_matches(['/', '\\']).ends_with("depot_tools"));
    if already_present {
        debug!("depot_tools already on PATH");
        return current.to_string();
    }

    let depot_tools = config.depot_tools_dir().display().to_string();
    if current.is_empty() {
        depot_tools
    } else {
        format!("{depot_tools}{}{current}", platform.path_separator())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::RuntimeMode;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_source_root_and_path() {
        let config = EngineConfig::new("/eng", "/work");
        let target = BuildTarget::new(Platform::Mac, RuntimeMode::Release);

        let resolved = BuildEnvironment::resolve(&config, &target, &env(&[("PATH", "/usr/bin")])).unwrap();
        assert_eq!(resolved.source_root, PathBuf::from("/eng/engine/src"));
        assert_eq!(resolved.vars[PATH], "/eng/depot_tools:/usr/bin");
    }

    #[test]
    fn test_existing_flutter_root_kept() {
        let config = EngineConfig::new("/eng", "/work");
        let target = BuildTarget::new(Platform::Ios, RuntimeMode::Debug);

        let resolved =
            BuildEnvironment::resolve(&config, &target, &env(&[("FLUTTER_ROOT_PATH", "/custom/src")])).unwrap();
        assert_eq!(resolved.source_root, PathBuf::from("/custom/src"));
    }

    #[test]
    fn test_depot_tools_not_duplicated() {
        let config = EngineConfig::new("/eng", "/work");
        let target = BuildTarget::new(Platform::Android, RuntimeMode::Release);

        let resolved =
            BuildEnvironment::resolve(&config, &target, &env(&[("PATH", "/opt/depot_tools:/usr/bin")])).unwrap();
        assert_eq!(resolved.vars[PATH], "/opt/depot_tools:/usr/bin");
    }

    #[test]
    fn test_windows_uses_semicolon() {
        let config = EngineConfig::new("C:/eng", "C:/work").with_visual_studio("C:/VS");
        let target = BuildTarget::new(Platform::Windows, RuntimeMode::Release);

        let resolved = BuildEnvironment::resolve(&config, &target, &env(&[("PATH", "C:/bin")])).unwrap();
        assert!(resolved.vars[PATH].starts_with("C:/eng/depot_tools;"));
        assert_eq!(resolved.vars[GYP_MSVS_OVERRIDE_PATH], "C:/VS");
    }

    #[test]
    fn test_windows_without_visual_studio_is_fatal() {
        let config = EngineConfig::new("C:/eng", "C:/work");
        let target = BuildTarget::new(Platform::Windows, RuntimeMode::Release);

        let err = BuildEnvironment::resolve(&config, &target, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, BuildError::MissingConfig(_)));
    }

    #[test]
    fn test_windows_accepts_inherited_override() {
        let config = EngineConfig::new("C:/eng", "C:/work");
        let target = BuildTarget::new(Platform::Windows, RuntimeMode::Debug);

        let resolved =
            BuildEnvironment::resolve(&config, &target, &env(&[("GYP_MSVS_OVERRIDE_PATH", "C:/VS2017")])).unwrap();
        assert!(!resolved.vars.contains_key(GYP_MSVS_OVERRIDE_PATH));
    }

    #[test]
    fn test_native_invocation_drops_sdkroot() {
        let config = EngineConfig::new("/eng", "/work");
        let target = BuildTarget::new(Platform::Ios, RuntimeMode::Release);
        let resolved = BuildEnvironment::resolve(&config, &target, &BTreeMap::new()).unwrap();

        let inv = resolved.apply_native(Invocation::new("mono"));
        assert_eq!(inv.env_remove, vec![SDKROOT.to_string()]);
        assert!(inv.env.contains_key(FLUTTER_ROOT_PATH));
    }
}
