//! Extract command - query a build-graph document
//!
//! Prints object files (one per line) or the response file for the nodes
//! whose annotation starts with a prefix and mentions a mode. Finding
//! nothing is an error so scripts can test the exit status.

use anyhow::{bail, Result};
use enginesmith_build::{extract_object_files, extract_response_file, RealFileSystem};
use std::path::PathBuf;

/// What to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Objects,
    ResponseFile,
}

/// Extract command arguments
pub struct ExtractArgs {
    pub graph: PathBuf,
    pub prefix: String,
    pub mode: String,
    pub json: bool,
}

/// Run the extract command
pub fn run(artifact: Artifact, args: ExtractArgs) -> Result<()> {
    let fs = RealFileSystem;

    match artifact {
        Artifact::Objects => {
            let objects = extract_object_files(&fs, &args.graph, &args.prefix, &args.mode)
                .unwrap_or_default();
            if objects.is_empty() {
                bail!(
                    "no object files found for '{}' ({}) in {}",
                    args.prefix,
                    args.mode,
                    args.graph.display()
                );
            }

            if args.json {
                println!("{}", serde_json::to_string_pretty(&objects)?);
            } else {
                for object in &objects {
                    println!("{}", object);
                }
            }
        }
        Artifact::ResponseFile => {
            let Some(rsp) = extract_response_file(&fs, &args.graph, &args.prefix, &args.mode)
            else {
                bail!(
                    "no response file found for '{}' ({}) in {}",
                    args.prefix,
                    args.mode,
                    args.graph.display()
                );
            };

            if args.json {
                println!("{}", serde_json::json!({ "response_file": rsp }));
            } else {
                println!("{}", rsp);
            }
        }
    }

    Ok(())
}
