//! Plan command - print the settings derived from a target

use super::TargetArgs;
use anyhow::Result;
use enginesmith_build::BuildPlan;

/// Print the build plan for a target as JSON
pub fn run(args: &TargetArgs) -> Result<()> {
    let plan = BuildPlan::new(args.target()?)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
