//! Build command - run the full engine and plugin pipeline for one target

use super::{EngineArgs, TargetArgs};
use anyhow::{Context, Result};
use colored::Colorize;
use enginesmith_build::{
    Pipeline, PipelineOptions, PipelineReport, RealFileSystem, RelinkOutcome, StageStatus,
    SystemProcessRunner,
};
use tracing::info;

/// Build command arguments
pub struct BuildArgs {
    pub target: TargetArgs,
    pub engine: EngineArgs,
    /// Skip cloning depot_tools and syncing the engine
    pub skip_fetch: bool,
    /// Log failing tools and continue
    pub keep_going: bool,
    /// Leave patches applied after the build
    pub no_revert: bool,
    pub json: bool,
}

/// Run the build command
pub fn run(args: BuildArgs) -> Result<()> {
    let target = args.target.target()?;
    let config = args.engine.engine_config()?;

    let options = PipelineOptions {
        skip_fetch: args.skip_fetch,
        keep_going: args.keep_going,
        revert: !args.no_revert,
    };
    info!(%target, engine_root = %config.engine_root.display(), "starting build");

    let fs = RealFileSystem;
    let runner = SystemProcessRunner;
    let report = Pipeline::new(&config, target, &fs, &runner)
        .with_options(options)
        .run()
        .with_context(|| format!("Build for {} failed", target))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

fn print_summary(report: &PipelineReport) {
    println!("\n{}", "=".repeat(60));
    println!(
        "Build {} succeeded in {:.2}s",
        report.target,
        report.total_duration().as_secs_f64()
    );
    println!("{}", "=".repeat(60));

    for stage in &report.stages {
        let status = match stage.status {
            StageStatus::Completed => "ok".green(),
            StageStatus::Skipped => "skipped".yellow(),
            StageStatus::Failed => "failed".red(),
        };
        let detail = stage.detail.as_deref().unwrap_or("");
        println!(
            "  {:<13} {:<8} {:>8.2}s  {}",
            stage.stage.name(),
            status,
            stage.duration.as_secs_f64(),
            detail
        );
    }

    println!("  Output:    out/{}", report.plan.output_dir);
    println!("  Artifacts: {} copied to {}", report.artifacts_copied, report.plan.plugin_destination);
    match &report.relink {
        Some(RelinkOutcome::Linked { artifact }) => {
            println!("  Relinked:  {}", artifact.display())
        }
        Some(RelinkOutcome::Skipped { reason }) => {
            println!("  Relink:    {} ({})", "skipped".yellow(), reason)
        }
        _ => {}
    }
    if report.patches_reverted > 0 {
        println!("  Reverted:  {} patches", report.patches_reverted);
    }
    println!("{}", "=".repeat(60));
}
