//! Shared state for the build steps

use crate::engine::EngineConfig;
use crate::environment::BuildEnvironment;
use crate::error::BuildResult;
use crate::fs::FileSystem;
use crate::plan::BuildPlan;
use crate::process::{run_checked, Invocation, ProcessOutput, ProcessRunner};
use std::path::{Path, PathBuf};

/// Everything a build step reads, borrowed for the duration of a run
pub struct StepContext<'a> {
    pub config: &'a EngineConfig,
    pub plan: &'a BuildPlan,
    pub env: &'a BuildEnvironment,
    pub fs: &'a dyn FileSystem,
    pub runner: &'a dyn ProcessRunner,
    /// Log non-zero exits instead of failing
    pub keep_going: bool,
}

impl<'a> StepContext<'a> {
    /// Engine source root
    pub fn source_root(&self) -> &Path {
        &self.env.source_root
    }

    /// `<source_root>/out/<output_dir>`
    pub fn out_dir(&self) -> PathBuf {
        self.source_root().join("out").join(&self.plan.output_dir)
    }

    /// Plugin folder for this target
    pub fn plugin_dir(&self) -> PathBuf {
        self.config.plugins_dir.join(&self.plan.plugin_destination)
    }

    /// Run with the build environment applied
    pub fn run(&self, invocation: Invocation) -> BuildResult<ProcessOutput> {
        let invocation = self.env.apply(invocation);
        run_checked(self.runner, &invocation, self.keep_going)
    }

    /// Run the native runner's invocation (no `SDKROOT`)
    pub fn run_native(&self, invocation: Invocation) -> BuildResult<ProcessOutput> {
        let invocation = self.env.apply_native(invocation);
        run_checked(self.runner, &invocation, self.keep_going)
    }
}
