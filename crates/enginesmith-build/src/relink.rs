//! Manual re-link of the plugin library
//!
//! The native runner's own link output is not shippable as is on mobile:
//!
//! * iOS: the library objects and the engine's `libtxt_lib.a` are merged
//!   into one relocatable object with the engine's symbols hidden, then
//!   packed into a static archive.
//! * Android: the link is re-run from the runner's response file with the
//!   ICF iteration flag removed.
//!
//! Both locate their inputs through the build graph. When the graph or the
//! inputs are missing the step is skipped with a warning.

use crate::artifacts::copy_artifacts;
use crate::context::StepContext;
use crate::edits::strip_icf_iterations;
use crate::error::{BuildError, BuildResult};
use crate::graph::{extract_object_files, extract_response_file};
use crate::process::Invocation;
use crate::target::Platform;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Symbols of `libtxt_lib.a`, hidden in the merged object
pub const SYMBOL_LIST: &str = "third.symbol";

const XCODE_TOOLCHAIN_BIN: &str = "Toolchains/XcodeDefault.xctoolchain/usr/bin";
const IPHONE_SDK: &str = "Platforms/iPhoneOS.platform/Developer/SDKs/iPhoneOS.sdk";
const NDK_CLANG: &str =
    "artifacts/Stevedore/android-ndk-mac/toolchains/llvm/prebuilt/darwin-x86_64/bin/clang++";
const ENGINE_CLANG: &str = "buildtools/mac-x64/clang/bin/clang++";

/// Result of a relink step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RelinkOutcome {
    /// The platform or mode has no relink step
    NotApplicable,
    /// Inputs were missing; nothing was linked
    Skipped { reason: String },
    /// The library was linked and copied to the plugin folder
    Linked { artifact: PathBuf },
}

/// Run the relink step for the context's target
pub fn relink(ctx: &StepContext<'_>) -> BuildResult<RelinkOutcome> {
    match ctx.plan.target.platform {
        Platform::Ios => prelink_ios(ctx),
        Platform::Android if ctx.plan.target.mode.is_release() => relink_android(ctx),
        _ => Ok(RelinkOutcome::NotApplicable),
    }
}

/// `<source_root>/out/<dir>/obj/flutter/third_party/txt/libtxt_lib.a`
pub fn libtxt_archive(ctx: &StepContext<'_>) -> PathBuf {
    ctx.out_dir()
        .join("obj/flutter/third_party/txt")
        .join("libtxt_lib.a")
}

/// Merge the iOS library objects into `<lib>.a`
pub fn prelink_ios(ctx: &StepContext<'_>) -> BuildResult<RelinkOutcome> {
    let prefix = ctx
        .plan
        .library_prefix
        .as_deref()
        .ok_or_else(|| BuildError::InvalidTarget("prelink is only defined for ios".to_string()))?;

    let objects = extract_object_files(ctx.fs, &ctx.config.graph_path(), prefix, ctx.plan.graph_mode())
        .unwrap_or_default();
    if objects.is_empty() {
        warn!(prefix, "prelink object files not found, skipping prelink");
        return Ok(RelinkOutcome::Skipped {
            reason: "prelink object files not found".to_string(),
        });
    }
    info!(objects = objects.len(), "prelinking library");

    let native_dir = &ctx.config.native_dir;
    let libtxt = libtxt_archive(ctx);
    let lib = &ctx.config.library_name;
    let object_file = format!("{lib}.o");
    let archive = format!("{lib}.a");

    let symbols = ctx.run(
        Invocation::new(&ctx.config.toolchain.nm)
            .arg("-j")
            .path_arg(&libtxt)
            .cwd(native_dir),
    )?;
    ctx.fs.write(&native_dir.join(SYMBOL_LIST), &symbols.stdout)?;

    let xcode = xcode_path(ctx)?;
    let bin = xcode.join(XCODE_TOOLCHAIN_BIN);

    let mut ld = Invocation::new(bin.join("ld").display().to_string())
        .args(["-r", "-arch", "arm64"]);
    if ctx.plan.target.bitcode {
        ld = ld.args(["-bitcode_bundle", "-bitcode_verify"]);
    }
    let ld = ld
        .arg("-syslibroot")
        .path_arg(xcode.join(IPHONE_SDK))
        .args(["-unexported_symbols_list", SYMBOL_LIST])
        .args(objects)
        .path_arg(&libtxt)
        .args(["-o", object_file.as_str()])
        .cwd(native_dir);
    ctx.run(ld)?;

    ctx.run(
        Invocation::new(bin.join("libtool").display().to_string())
            .args(["-arch_only", "arm64", "-static", object_file.as_str(), "-o", archive.as_str()])
            .cwd(native_dir),
    )?;

    if ctx.plan.target.mode.is_release() {
        ctx.run(
            Invocation::new(bin.join("strip").display().to_string())
                .args(["-x", archive.as_str()])
                .cwd(native_dir),
        )?;
    }

    let built = native_dir.join(&archive);
    copy_artifacts(ctx.fs, &built, &ctx.plugin_dir())?;
    Ok(RelinkOutcome::Linked {
        artifact: ctx.plugin_dir().join(&archive),
    })
}

fn xcode_path(ctx: &StepContext<'_>) -> BuildResult<PathBuf> {
    let output = ctx.run(Invocation::new(&ctx.config.toolchain.xcode_select).arg("-p"))?;
    let path = output.stdout.trim();
    if path.is_empty() {
        return Err(BuildError::MissingConfig(
            "xcode-select did not report a developer directory".to_string(),
        ));
    }
    Ok(PathBuf::from(path))
}

/// Re-run the Android link from the runner's response file
pub fn relink_android(ctx: &StepContext<'_>) -> BuildResult<RelinkOutcome> {
    let prefix = ctx
        .plan
        .link_prefix
        .as_deref()
        .ok_or_else(|| BuildError::InvalidTarget("relink is only defined for android".to_string()))?;

    let Some(rsp) = extract_response_file(ctx.fs, &ctx.config.graph_path(), prefix, ctx.plan.graph_mode())
    else {
        warn!(prefix, "response file not found, skipping relink");
        return Ok(RelinkOutcome::Skipped {
            reason: "response file not found".to_string(),
        });
    };

    let native_dir = &ctx.config.native_dir;
    let rsp_path = native_dir.join(&rsp);
    backup_and_patch_response_file(ctx, &rsp_path)?;
    info!(rsp = %rsp, "relinking library");

    let response_arg = format!("@{rsp}");
    ctx.run(
        Invocation::new(native_dir.join(NDK_CLANG).display().to_string())
            .arg(response_arg.as_str())
            .cwd(native_dir),
    )?;
    ctx.run(
        Invocation::new(ctx.source_root().join(ENGINE_CLANG).display().to_string())
            .arg(response_arg.as_str())
            .cwd(native_dir),
    )?;

    let lib = &ctx.config.library_name;
    let built = native_dir
        .join("artifacts")
        .join(lib)
        .join(format!("release_Android_{}", ctx.plan.android_arch_token()))
        .join(format!("{lib}.so"));
    copy_artifacts(ctx.fs, &built, &ctx.plugin_dir())?;
    Ok(RelinkOutcome::Linked {
        artifact: ctx.plugin_dir().join(format!("{lib}.so")),
    })
}

fn backup_and_patch_response_file(ctx: &StepContext<'_>, rsp_path: &Path) -> BuildResult<()> {
    let backup = ctx.config.native_dir.join("artifacts/rsp/backup");
    copy_artifacts(ctx.fs, rsp_path, &backup)?;

    let content = ctx.fs.read_to_string(rsp_path)?;
    ctx.fs.write(rsp_path, &strip_icf_iterations(&content))
}

/// Convert `icudtl.dat` into `icudtl.o` in the native directory (Android)
///
/// Runs the engine's `objcopy.py` with the NDK objcopy for the target ABI.
pub fn android_icu_object(ctx: &StepContext<'_>) -> BuildResult<()> {
    let source_root = ctx.source_root();
    let (toolchain, tool_prefix, arch) = if ctx.plan.target.is_android_arm64() {
        ("aarch64-linux-android-4.9", "aarch64-linux-android", "arm64")
    } else {
        ("arm-linux-androideabi-4.9", "arm-linux-androideabi", "arm")
    };
    let objcopy = source_root
        .join("third_party/android_tools/ndk/toolchains")
        .join(toolchain)
        .join("prebuilt/darwin-x86_64/bin")
        .join(format!("{tool_prefix}-objcopy"));

    ctx.run(
        Invocation::new(&ctx.config.toolchain.python)
            .path_arg(source_root.join("flutter/sky/tools/objcopy.py"))
            .arg("--objcopy")
            .path_arg(objcopy)
            .arg("--input")
            .path_arg(icu_data_dir(source_root).join("icudtl.dat"))
            .args(["--output", "icudtl.o", "--arch", arch])
            .cwd(&ctx.config.native_dir),
    )?;
    Ok(())
}

/// Link `icudtl.dat` into `icudtl.o` next to it (windows)
pub fn windows_icu_object(ctx: &StepContext<'_>) -> BuildResult<()> {
    ctx.run(
        Invocation::new(&ctx.config.toolchain.ld)
            .args(["-r", "-b", "binary", "-o", "icudtl.o", "icudtl.dat"])
            .cwd(icu_data_dir(ctx.source_root())),
    )?;
    Ok(())
}

fn icu_data_dir(source_root: &Path) -> PathBuf {
    source_root.join("third_party/icu/flutter")
}
