//! Engine plugin build orchestration
//!
//! Provides the pieces needed to build the rendering engine and the native
//! plugin library on top of it:
//! - Build-graph artifact extraction (object files, response files)
//! - Target model and derived build plan
//! - Process and filesystem capabilities with in-memory fakes
//! - Version-pinned source patches
//! - iOS prelink and Android relink
//! - The staged build pipeline

pub mod artifacts;
pub mod context;
pub mod edits;
pub mod engine;
pub mod environment;
pub mod error;
pub mod fs;
pub mod graph;
pub mod patch;
pub mod pipeline;
pub mod plan;
pub mod process;
pub mod relink;
pub mod target;

// Re-export main types
pub use artifacts::copy_artifacts;
pub use context::StepContext;
pub use edits::{edit_gn_args, strip_icf_iterations};
pub use engine::{
    EngineConfig, Toolchain, DEFAULT_DEPOT_TOOLS_URL, DEFAULT_LIBRARY_NAME, DEFAULT_REVISION,
    DEFAULT_SOLUTION_URL,
};
pub use environment::BuildEnvironment;
pub use error::{BuildError, BuildResult};
pub use fs::{FileSystem, MemoryFileSystem, RealFileSystem};
pub use graph::{
    count_matching_nodes, extract_object_files, extract_response_file, find_object_files,
    find_response_file, load_document, BuildGraphDocument, BuildGraphNode,
};
pub use patch::{pinned_patches, Patch, PatchSet, PatchState};
pub use pipeline::{
    Pipeline, PipelineOptions, PipelineReport, Stage, StageReport, StageStatus,
};
pub use plan::BuildPlan;
pub use process::{
    run_checked, Invocation, ProcessOutput, ProcessRunner, RecordingProcessRunner,
    SystemProcessRunner,
};
pub use relink::RelinkOutcome;
pub use target::{Architecture, BuildTarget, Platform, RuntimeMode};
