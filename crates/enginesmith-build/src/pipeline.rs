//! Staged engine build
//!
//! A [`Pipeline`] runs the stages in [`Stage::all`] order for one target.
//! Configuration problems are reported before any process is started. When
//! a stage fails, the revert stage still runs so the engine checkout is not
//! left patched.

use crate::artifacts::copy_artifacts;
use crate::context::StepContext;
use crate::edits::edit_gn_args;
use crate::engine::EngineConfig;
use crate::environment::BuildEnvironment;
use crate::error::{BuildError, BuildResult};
use crate::fs::FileSystem;
use crate::patch::PatchSet;
use crate::plan::BuildPlan;
use crate::process::{Invocation, ProcessRunner};
use crate::relink::{android_icu_object, relink, windows_icu_object, RelinkOutcome};
use crate::target::{BuildTarget, Platform};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Create the engine root and write `bitcode.conf`
    Prepare,
    /// Clone depot_tools
    FetchTools,
    /// Sync the engine checkout at the pinned revision
    FetchEngine,
    /// Apply source patches
    Patch,
    /// Run the gn generator and edit `args.gn`
    Generate,
    /// Run ninja
    Compile,
    /// Run the native build runner
    Native,
    /// Copy the native output into the plugin folder
    Package,
    /// iOS prelink / Android relink
    Relink,
    /// Revert patches and remove `bitcode.conf`
    Revert,
}

impl Stage {
    /// Get stage name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::FetchTools => "fetch-tools",
            Self::FetchEngine => "fetch-engine",
            Self::Patch => "patch",
            Self::Generate => "generate",
            Self::Compile => "compile",
            Self::Native => "native",
            Self::Package => "package",
            Self::Relink => "relink",
            Self::Revert => "revert",
        }
    }

    /// Get all stages in execution order
    pub fn all() -> [Stage; 10] {
        [
            Self::Prepare,
            Self::FetchTools,
            Self::FetchEngine,
            Self::Patch,
            Self::Generate,
            Self::Compile,
            Self::Native,
            Self::Package,
            Self::Relink,
            Self::Revert,
        ]
    }

    /// Stages that need network access
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::FetchTools | Self::FetchEngine)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pipeline switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Skip `fetch-tools` and `fetch-engine`
    pub skip_fetch: bool,
    /// Log non-zero tool exits instead of failing
    pub keep_going: bool,
    /// Run the revert stage
    pub revert: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            skip_fetch: false,
            keep_going: false,
            revert: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Completed,
    Skipped,
    Failed,
}

/// Outcome of one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Summary of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub target: BuildTarget,
    pub plan: BuildPlan,
    pub stages: Vec<StageReport>,
    /// Files copied into the plugin folder
    pub artifacts_copied: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relink: Option<RelinkOutcome>,
    pub patches_reverted: usize,
}

impl PipelineReport {
    fn new(plan: BuildPlan) -> Self {
        Self {
            target: plan.target,
            plan,
            stages: Vec::new(),
            artifacts_copied: 0,
            relink: None,
            patches_reverted: 0,
        }
    }

    /// Report for `stage`, if it ran
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|report| report.stage == stage)
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|report| report.duration).sum()
    }

    pub fn succeeded(&self) -> bool {
        !self
            .stages
            .iter()
            .any(|report| report.status == StageStatus::Failed)
    }
}

/// Contents of the `.gclient` file for the engine checkout
pub fn gclient_solution(solution_url: &str) -> String {
    format!(
        r#"
solutions = [
{{
    "managed": False,
    "name": "src/flutter",
    "url": "{solution_url}",
    "custom_deps": {{}},
    "deps_file": "DEPS",
    "safesync_url": "",
}},
]
"#
    )
}

/// Outcome of a stage body
enum StageOutcome {
    Completed,
    Skipped(String),
}

/// Engine build for one target
pub struct Pipeline<'a> {
    config: &'a EngineConfig,
    target: BuildTarget,
    fs: &'a dyn FileSystem,
    runner: &'a dyn ProcessRunner,
    options: PipelineOptions,
    process_env: BTreeMap<String, String>,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline using the current process environment
    pub fn new(
        config: &'a EngineConfig,
        target: BuildTarget,
        fs: &'a dyn FileSystem,
        runner: &'a dyn ProcessRunner,
    ) -> Self {
        Self {
            config,
            target,
            fs,
            runner,
            options: PipelineOptions::default(),
            process_env: std::env::vars().collect(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the environment the build environment is resolved from
    pub fn with_process_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.process_env = env;
        self
    }

    /// Run every stage
    ///
    /// Returns the first stage error, after the revert stage has run.
    pub fn run(&self) -> BuildResult<PipelineReport> {
        let plan = BuildPlan::new(self.target)?;
        let env = BuildEnvironment::resolve(self.config, &self.target, &self.process_env)?;
        let ctx = StepContext {
            config: self.config,
            plan: &plan,
            env: &env,
            fs: self.fs,
            runner: self.runner,
            keep_going: self.options.keep_going,
        };

        info!(target = %self.target, source_root = %env.source_root.display(), "starting engine build");

        let mut report = PipelineReport::new(plan.clone());
        let mut patches = PatchSet::for_platform(self.target.platform);
        let mut failure = None;

        for stage in Stage::all() {
            if stage == Stage::Revert {
                break;
            }
            if stage.is_fetch() && self.options.skip_fetch {
                report.stages.push(skipped(stage, "fetch disabled"));
                continue;
            }

            let start = Instant::now();
            info!(stage = stage.name(), "stage started");
            let result = self.run_stage(stage, &ctx, &mut patches, &mut report);
            let duration = start.elapsed();

            match result {
                Ok(StageOutcome::Completed) => report.stages.push(StageReport {
                    stage,
                    status: StageStatus::Completed,
                    duration,
                    detail: None,
                }),
                Ok(StageOutcome::Skipped(reason)) => {
                    info!(stage = stage.name(), reason = %reason, "stage skipped");
                    report.stages.push(StageReport {
                        duration,
                        ..skipped(stage, &reason)
                    });
                }
                Err(err) => {
                    error!(stage = stage.name(), error = %err, "stage failed");
                    report.stages.push(StageReport {
                        stage,
                        status: StageStatus::Failed,
                        duration,
                        detail: Some(err.to_string()),
                    });
                    failure = Some(err.in_stage(stage.name()));
                    break;
                }
            }
        }

        self.finish(&ctx, &mut patches, &mut report, &mut failure);

        match failure {
            Some(err) => Err(err),
            None => {
                info!(
                    target = %self.target,
                    artifacts = report.artifacts_copied,
                    elapsed_ms = report.total_duration().as_millis() as u64,
                    "engine build finished"
                );
                Ok(report)
            }
        }
    }

    fn finish(
        &self,
        ctx: &StepContext<'_>,
        patches: &mut PatchSet,
        report: &mut PipelineReport,
        failure: &mut Option<BuildError>,
    ) {
        if !self.options.revert {
            if patches.has_applied() {
                warn!(applied = patches.applied_count(), "leaving patches applied");
            }
            report.stages.push(skipped(Stage::Revert, "revert disabled"));
            return;
        }

        let start = Instant::now();
        let result = self.run_stage(Stage::Revert, ctx, patches, report);
        let duration = start.elapsed();
        match result {
            Ok(_) => {
                report.stages.push(StageReport {
                    stage: Stage::Revert,
                    status: StageStatus::Completed,
                    duration,
                    detail: None,
                });
            }
            Err(err) => {
                error!(stage = Stage::Revert.name(), error = %err, "stage failed");
                report.stages.push(StageReport {
                    stage: Stage::Revert,
                    status: StageStatus::Failed,
                    duration,
                    detail: Some(err.to_string()),
                });
                if failure.is_none() {
                    *failure = Some(err.in_stage(Stage::Revert.name()));
                }
            }
        }
    }

    fn run_stage(
        &self,
        stage: Stage,
        ctx: &StepContext<'_>,
        patches: &mut PatchSet,
        report: &mut PipelineReport,
    ) -> BuildResult<StageOutcome> {
        match stage {
            Stage::Prepare => self.prepare(),
            Stage::FetchTools => self.fetch_tools(ctx),
            Stage::FetchEngine => self.fetch_engine(ctx),
            Stage::Patch => {
                patches.apply_all(
                    self.fs,
                    self.runner,
                    self.config,
                    ctx.source_root(),
                    self.options.keep_going,
                )?;
                Ok(StageOutcome::Completed)
            }
            Stage::Generate => self.generate(ctx),
            Stage::Compile => self.compile(ctx),
            Stage::Native => self.native(ctx),
            Stage::Package => {
                let source = self.config.native_dir.join(&ctx.plan.native_output_dir);
                report.artifacts_copied += copy_artifacts(self.fs, &source, &ctx.plugin_dir())?;
                Ok(StageOutcome::Completed)
            }
            Stage::Relink => {
                let outcome = relink(ctx)?;
                let result = match &outcome {
                    RelinkOutcome::NotApplicable => {
                        StageOutcome::Skipped(format!("no relink for {}", self.target))
                    }
                    RelinkOutcome::Skipped { reason } => StageOutcome::Skipped(reason.clone()),
                    RelinkOutcome::Linked { .. } => {
                        report.artifacts_copied += 1;
                        StageOutcome::Completed
                    }
                };
                report.relink = Some(outcome);
                Ok(result)
            }
            Stage::Revert => {
                report.patches_reverted = self.revert(ctx, patches)?;
                Ok(StageOutcome::Completed)
            }
        }
    }

    fn prepare(&self) -> BuildResult<StageOutcome> {
        self.fs.create_dir_all(&self.config.engine_root)?;
        if self.target.platform == Platform::Ios {
            let value = if self.target.bitcode { "true" } else { "false" };
            self.fs.write(&self.config.bitcode_conf_path(), value)?;
        }
        Ok(StageOutcome::Completed)
    }

    fn fetch_tools(&self, ctx: &StepContext<'_>) -> BuildResult<StageOutcome> {
        let depot_tools = self.config.depot_tools_dir();
        if self.fs.exists(&depot_tools.join(".git")) {
            return Ok(StageOutcome::Skipped(
                "depot_tools already installed".to_string(),
            ));
        }

        let toolchain = &self.config.toolchain;
        ctx.run(
            Invocation::new(&toolchain.git)
                .args(["clone", self.config.depot_tools_url.as_str()])
                .cwd(&self.config.engine_root),
        )?;
        ctx.run(
            Invocation::new(&toolchain.gclient)
                .arg("sync")
                .cwd(&self.config.engine_root),
        )?;
        Ok(StageOutcome::Completed)
    }

    fn fetch_engine(&self, ctx: &StepContext<'_>) -> BuildResult<StageOutcome> {
        let checkout = self.config.checkout_dir();
        self.fs.create_dir_all(&checkout)?;
        self.fs.write(
            &checkout.join(".gclient"),
            &gclient_solution(&self.config.solution_url),
        )?;

        let toolchain = &self.config.toolchain;
        let flutter_dir = ctx.source_root().join("flutter");
        ctx.run(Invocation::new(&toolchain.gclient).arg("sync").cwd(&checkout))?;
        ctx.run(
            Invocation::new(&toolchain.git)
                .args(["checkout", self.config.revision.as_str()])
                .cwd(&flutter_dir),
        )?;
        ctx.run(
            Invocation::new(&toolchain.gclient)
                .args(["sync", "-D"])
                .cwd(&flutter_dir),
        )?;
        Ok(StageOutcome::Completed)
    }

    fn generate(&self, ctx: &StepContext<'_>) -> BuildResult<StageOutcome> {
        ctx.run(
            Invocation::new(&self.config.toolchain.python)
                .arg("./flutter/tools/gn")
                .args(ctx.plan.gn_flags.iter().cloned())
                .cwd(ctx.source_root()),
        )?;

        if self.target.platform != Platform::Android {
            let args_path = ctx.out_dir().join("args.gn");
            let content = self.fs.read_to_string(&args_path)?;
            self.fs
                .write(&args_path, &edit_gn_args(&content, self.target.platform))?;
        }
        Ok(StageOutcome::Completed)
    }

    fn compile(&self, ctx: &StepContext<'_>) -> BuildResult<StageOutcome> {
        let out = format!("out/{}", ctx.plan.output_dir);
        for target in &ctx.plan.ninja_targets {
            ctx.run(
                Invocation::new(&self.config.toolchain.ninja)
                    .args(["-C", out.as_str(), target.as_str()])
                    .cwd(ctx.source_root()),
            )?;
        }
        if self.target.platform == Platform::Windows {
            windows_icu_object(ctx)?;
        }
        Ok(StageOutcome::Completed)
    }

    fn native(&self, ctx: &StepContext<'_>) -> BuildResult<StageOutcome> {
        let native_dir = &self.config.native_dir;
        for stale in ctx.plan.stale_native_outputs() {
            let dir = native_dir.join(stale);
            if self.fs.exists(&dir) {
                self.fs.remove_dir_all(&dir)?;
            }
        }

        if self.target.platform == Platform::Android {
            android_icu_object(ctx)?;
        }

        let runner = &self.config.toolchain.native_runner;
        let invocation = if ctx.plan.native_via_mono {
            Invocation::new(&self.config.toolchain.mono).arg(runner.as_str())
        } else {
            Invocation::new(native_dir.join(runner).display().to_string())
        };
        ctx.run_native(
            invocation
                .arg(ctx.plan.native_target.as_str())
                .cwd(native_dir),
        )?;
        Ok(StageOutcome::Completed)
    }

    fn revert(&self, ctx: &StepContext<'_>, patches: &mut PatchSet) -> BuildResult<usize> {
        let reverted = patches.revert_all(
            self.runner,
            self.config,
            ctx.source_root(),
            self.options.keep_going,
        )?;

        let bitcode_conf = self.config.bitcode_conf_path();
        if self.fs.exists(&bitcode_conf) {
            self.fs.remove_file(&bitcode_conf)?;
        }
        Ok(reverted)
    }
}

fn skipped(stage: Stage, reason: &str) -> StageReport {
    StageReport {
        stage,
        status: StageStatus::Skipped,
        duration: Duration::ZERO,
        detail: Some(reason.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let names: Vec<&str> = Stage::all().iter().map(Stage::name).collect();
        assert_eq!(
            names,
            vec![
                "prepare",
                "fetch-tools",
                "fetch-engine",
                "patch",
                "generate",
                "compile",
                "native",
                "package",
                "relink",
                "revert"
            ]
        );
        assert_eq!(Stage::all().last(), Some(&Stage::Revert));
    }

    #[test]
    fn test_default_options_revert() {
        let options = PipelineOptions::default();
        assert!(options.revert);
        assert!(!options.skip_fetch);
        assert!(!options.keep_going);
    }

    #[test]
    fn test_gclient_solution() {
        let content = gclient_solution("git@github.com:flutter/engine.git");
        assert!(content.contains(r#""name": "src/flutter","#));
        assert!(content.contains(r#""url": "git@github.com:flutter/engine.git","#));
        assert!(content.contains(r#""managed": False,"#));
        assert!(content.contains(r#""deps_file": "DEPS","#));
    }
}
