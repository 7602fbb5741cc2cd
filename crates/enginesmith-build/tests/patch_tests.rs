//! Source patch application tests

use enginesmith_build::{
    BuildError, EngineConfig, FileSystem, MemoryFileSystem, PatchSet, PatchState, Platform,
    RecordingProcessRunner,
};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};

const SOURCE_ROOT: &str = "/eng/engine/src";

fn config() -> EngineConfig {
    EngineConfig::new("/eng", "/work")
}

fn seeded_fs(set: &PatchSet) -> MemoryFileSystem {
    let fs = MemoryFileSystem::new();
    for patch in &set.patches {
        fs.add_file(Path::new("/work/patches").join(&patch.file), "--- a\n+++ b\n");
    }
    fs
}

#[test]
fn test_apply_copies_and_runs_patch() {
    let mut set = PatchSet::for_platform(Platform::Mac);
    let fs = seeded_fs(&set);
    let runner = RecordingProcessRunner::new();

    set.apply_all(&fs, &runner, &config(), Path::new(SOURCE_ROOT), false)
        .unwrap();

    assert!(set.patches.iter().all(|p| p.state == PatchState::Applied));
    assert!(fs.is_file(Path::new("/eng/engine/src/third_party/skia/skia.patch")));
    assert!(fs.is_file(Path::new("/eng/engine/src/build/mac/find_sdk.patch")));

    assert_eq!(
        runner.command_lines(),
        vec![
            "patch -p1 -N < /eng/engine/src/third_party/skia/skia.patch",
            "patch -p0 -N < /eng/engine/src/flutter/third_party/txt/BUILD.gn.patch",
            "patch -p0 -N < /eng/engine/src/build/mac/find_sdk.patch",
        ]
    );
    let first = &runner.invocations()[0];
    assert_eq!(first.cwd, Some(PathBuf::from("/eng/engine/src/third_party/skia")));
}

#[test]
fn test_windows_nested_patch_lands_under_plain_name() {
    let mut set = PatchSet::for_platform(Platform::Windows);
    let fs = seeded_fs(&set);
    let runner = RecordingProcessRunner::new();

    set.apply_all(&fs, &runner, &config(), Path::new(SOURCE_ROOT), false)
        .unwrap();

    assert!(fs.is_file(Path::new(
        "/eng/engine/src/third_party/angle/src/libANGLE/renderer/d3d/d3d11/cpp.patch"
    )));
    assert!(fs.is_file(Path::new("/eng/engine/src/third_party/skia/BUILD_2.gn.patch")));
}

#[test]
fn test_revert_in_reverse_order() {
    let mut set = PatchSet::for_platform(Platform::Ios);
    let fs = seeded_fs(&set);
    let runner = RecordingProcessRunner::new();
    let config = config();

    set.apply_all(&fs, &runner, &config, Path::new(SOURCE_ROOT), false)
        .unwrap();
    let reverted = set
        .revert_all(&runner, &config, Path::new(SOURCE_ROOT), false)
        .unwrap();

    assert_eq!(reverted, 4);
    assert!(set.patches.iter().all(|p| p.state == PatchState::Reverted));

    let reverts: Vec<String> = runner
        .command_lines()
        .into_iter()
        .filter(|line| line.contains(" -R "))
        .collect();
    assert_eq!(
        reverts,
        vec![
            "patch -p0 -R < /eng/engine/src/third_party/wuffs/release/c/wuffs-v0.2.c.patch",
            "patch -p0 -R < /eng/engine/src/build/mac/find_sdk.patch",
            "patch -p0 -R < /eng/engine/src/flutter/third_party/txt/BUILD.gn.patch",
            "patch -p1 -R < /eng/engine/src/third_party/skia/skia.patch",
        ]
    );
}

#[test]
fn test_revert_pending_is_noop() {
    let mut set = PatchSet::for_platform(Platform::Android);
    let runner = RecordingProcessRunner::new();

    let reverted = set
        .revert_all(&runner, &config(), Path::new(SOURCE_ROOT), false)
        .unwrap();

    assert_eq!(reverted, 0);
    assert!(runner.invocations().is_empty());
    assert!(set.patches.iter().all(|p| p.state == PatchState::Pending));
}

#[test]
fn test_apply_twice_is_an_error() {
    let mut set = PatchSet::for_platform(Platform::Mac);
    let fs = seeded_fs(&set);
    let runner = RecordingProcessRunner::new();
    let config = config();

    set.apply_all(&fs, &runner, &config, Path::new(SOURCE_ROOT), false)
        .unwrap();
    let err = set
        .apply_all(&fs, &runner, &config, Path::new(SOURCE_ROOT), false)
        .unwrap_err();

    assert!(matches!(err, BuildError::PatchAlreadyApplied { ref name } if name == "skia.patch"));
}

#[test]
fn test_partial_apply_reverts_only_applied() {
    let mut set = PatchSet::for_platform(Platform::Mac);
    let fs = seeded_fs(&set);
    let runner = RecordingProcessRunner::new();
    runner.respond("patch", enginesmith_build::ProcessOutput::success(""));
    runner.fail("patch", 1);
    let config = config();

    let err = set
        .apply_all(&fs, &runner, &config, Path::new(SOURCE_ROOT), false)
        .unwrap_err();
    assert!(matches!(err, BuildError::CommandFailed { exit_code: 1, .. }));
    assert_eq!(set.applied_count(), 1);

    let reverted = set
        .revert_all(&runner, &config, Path::new(SOURCE_ROOT), false)
        .unwrap();
    assert_eq!(reverted, 1);
    assert_eq!(set.patches[0].state, PatchState::Reverted);
    assert_eq!(set.patches[1].state, PatchState::Pending);
}

#[test]
fn test_missing_patch_file() {
    let mut set = PatchSet::for_platform(Platform::Mac);
    let fs = MemoryFileSystem::new();
    let runner = RecordingProcessRunner::new();

    let err = set
        .apply_all(&fs, &runner, &config(), Path::new(SOURCE_ROOT), false)
        .unwrap_err();

    assert!(matches!(err, BuildError::PatchNotFound(path) if path == Path::new("/work/patches/skia.patch")));
    assert!(runner.invocations().is_empty());
}

#[test]
fn test_assume_applied_reverts_everything() {
    let mut set = PatchSet::for_platform(Platform::Windows);
    set.assume_applied();
    let runner = RecordingProcessRunner::new();

    let reverted = set
        .revert_all(&runner, &config(), Path::new(SOURCE_ROOT), false)
        .unwrap();
    assert_eq!(reverted, 5);
}
