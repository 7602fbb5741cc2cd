use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use enginesmith_build::Platform;
use std::io;
use std::path::PathBuf;

mod commands;
mod config;
mod logging;

use commands::{EngineArgs, TargetArgs};

/// Build orchestration for the rendering engine and its native plugin.
///
/// Fetches the engine sources, applies pinned patches, drives the engine's
/// generator and ninja, builds the native plugin and copies the results
/// into the plugin folders.
///
/// EXAMPLES:
///     enginesmith build -p mac -m release          Build the mac plugin
///     enginesmith build -p android -m release --arch arm64
///     enginesmith plan -p ios -m debug --bitcode   Show derived settings
///     enginesmith extract objects tundra.dag.json --prefix Lib_iOS_arm64 --mode release
///     enginesmith patch revert -p windows          Undo patches by hand
///
/// ENVIRONMENT VARIABLES:
///     ENGINESMITH_ENGINE_ROOT    Engine root when not configured
///     ENGINESMITH_REVISION       Engine revision override
///     ENGINESMITH_VISUAL_STUDIO  Visual Studio path (windows)
///     ENGINESMITH_LOG            Log level (trace, debug, info, warn, error)
///     ENGINESMITH_LOG_JSON       Set to '1' for JSON logs
///     ENGINESMITH_JSON           Set to '1' for JSON output by default
///     RUST_LOG                   Fine-grained log filtering
#[derive(Parser)]
#[command(name = "enginesmith")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level
    #[arg(long, global = true, env = "ENGINESMITH_LOG", default_value = "info")]
    log_level: String,

    /// Write logs as JSON
    #[arg(
        long,
        global = true,
        env = "ENGINESMITH_LOG_JSON",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the engine and the native plugin for one target
    ///
    /// Runs every stage: prepare, fetch-tools, fetch-engine, patch,
    /// generate, compile, native, package, relink and revert. Patches are
    /// reverted even when a stage fails.
    ///
    /// EXAMPLES:
    ///     enginesmith build -p windows -m release --visual-studio "C:/VS/2017/Community"
    ///     enginesmith build -p ios -m release --bitcode
    ///     enginesmith build -p mac -m debug --skip-fetch --no-revert
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        engine: EngineArgs,
        /// Skip cloning depot_tools and syncing the engine
        #[arg(long)]
        skip_fetch: bool,
        /// Log failing tools and continue
        #[arg(long, short = 'k')]
        keep_going: bool,
        /// Leave patches applied after the build
        #[arg(long)]
        no_revert: bool,
        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the settings derived from a target as JSON
    ///
    /// EXAMPLES:
    ///     enginesmith plan -p android -m release --arch arm64
    Plan {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Query a build-graph document
    ///
    /// Exits with status 1 when nothing matches or the document cannot be read.
    Extract {
        #[command(subcommand)]
        what: ExtractCommand,
    },

    /// Apply or revert the pinned source patches
    Patch {
        #[command(subcommand)]
        action: PatchCommand,
    },

    /// Generate shell completions
    ///
    /// EXAMPLES:
    ///     enginesmith completions bash > ~/.local/share/bash-completion/completions/enginesmith
    ///     enginesmith completions zsh > ~/.zfunc/_enginesmith
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args, Debug)]
struct GraphQuery {
    /// Build-graph document (tundra.dag.json)
    graph: PathBuf,
    /// Annotation prefix of the nodes to select
    #[arg(long)]
    prefix: String,
    /// Mode substring the annotation must contain
    #[arg(long)]
    mode: String,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum ExtractCommand {
    /// Object files named in the selected nodes' actions
    Objects(GraphQuery),
    /// First response file among the selected nodes' inputs
    Rsp(GraphQuery),
}

#[derive(clap::Args, Debug)]
struct PatchTarget {
    /// Platform whose patches to use
    #[arg(long, short = 'p')]
    platform: Platform,
    #[command(flatten)]
    engine: EngineArgs,
    /// Log failing patches and continue
    #[arg(long, short = 'k')]
    keep_going: bool,
}

#[derive(Subcommand)]
enum PatchCommand {
    /// Apply the platform's patches to the engine sources
    Apply(PatchTarget),
    /// Revert the platform's patches
    Revert(PatchTarget),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cli_config = config::Config::from_env();

    logging::init_logging(logging::LoggingConfig {
        level: logging::parse_level(&cli.log_level),
        use_json: cli.log_json,
        ..Default::default()
    });
    if cli_config.no_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Build {
            target,
            engine,
            skip_fetch,
            keep_going,
            no_revert,
            json,
        } => commands::build::run(commands::build::BuildArgs {
            target,
            engine,
            skip_fetch,
            keep_going,
            no_revert,
            json: json || cli_config.default_json,
        }),
        Commands::Plan { target } => commands::plan::run(&target),
        Commands::Extract { what } => {
            let (artifact, query) = match what {
                ExtractCommand::Objects(query) => (commands::extract::Artifact::Objects, query),
                ExtractCommand::Rsp(query) => (commands::extract::Artifact::ResponseFile, query),
            };
            commands::extract::run(
                artifact,
                commands::extract::ExtractArgs {
                    graph: query.graph,
                    prefix: query.prefix,
                    mode: query.mode,
                    json: query.json || cli_config.default_json,
                },
            )
        }
        Commands::Patch { action } => {
            let (action, target) = match action {
                PatchCommand::Apply(target) => (commands::patch::PatchAction::Apply, target),
                PatchCommand::Revert(target) => (commands::patch::PatchAction::Revert, target),
            };
            commands::patch::run(
                action,
                commands::patch::PatchArgs {
                    platform: target.platform,
                    engine: target.engine,
                    keep_going: target.keep_going,
                },
            )
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}
