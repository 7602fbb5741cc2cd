/// Build orchestration error types
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    #[error("Invalid build target: {0}")]
    InvalidTarget(String),

    #[error("Unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },

    #[error("Build graph not found at {0}")]
    GraphNotFound(PathBuf),

    #[error("Failed to parse build graph at {path}: {error}")]
    GraphParseError { path: PathBuf, error: String },

    #[error("Failed to start '{program}': {error}")]
    CommandSpawnError { program: String, error: String },

    #[error("'{program}' exited with code {exit_code}\n{output}")]
    CommandFailed {
        program: String,
        exit_code: i32,
        output: String,
    },

    #[error("Patch '{name}' is already applied")]
    PatchAlreadyApplied { name: String },

    #[error("Patch file not found: {0}")]
    PatchNotFound(PathBuf),

    #[error("Stage '{stage}' failed: {error}")]
    StageFailed {
        stage: &'static str,
        #[source]
        error: Box<BuildError>,
    },

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a graph parse error
    pub fn graph_parse(path: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self::GraphParseError {
            path: path.into(),
            error: error.to_string(),
        }
    }

    /// Create a process spawn error
    pub fn spawn(program: impl Into<String>, error: impl ToString) -> Self {
        Self::CommandSpawnError {
            program: program.into(),
            error: error.to_string(),
        }
    }

    /// Create an unknown-value error (platform, mode, architecture, ...)
    pub fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownValue {
            kind,
            value: value.into(),
        }
    }

    /// Wrap an error with the pipeline stage it occurred in
    pub fn in_stage(self, stage: &'static str) -> Self {
        match self {
            already @ Self::StageFailed { .. } => already,
            other => Self::StageFailed {
                stage,
                error: Box::new(other),
            },
        }
    }
}
