//! Error types for mediastage-av.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while staging files or running an external tool.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The external binary could not be started.
    #[error("failed to spawn {program}: {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The deadline elapsed before the process finished.
    #[error("wait time exceeded after {}ms", elapsed.as_millis())]
    WaitTimeExceeded { elapsed: std::time::Duration },

    /// The process finished but did not produce the expected output file.
    #[error("output file not found: {}", path.display())]
    OutputMissing { path: PathBuf },

    /// The template references the input placeholder but no input was given.
    #[error("command references INPUT but no input was supplied")]
    MissingInput,

    /// The command template is malformed.
    #[error("invalid command template: {0}")]
    InvalidTemplate(String),

    /// Refused to touch a path outside the scratch directory.
    #[error("not a scratch path: {}", path.display())]
    OutsideScratch { path: PathBuf },

    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a spawn failure error.
    pub fn spawn_failure(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::SpawnFailure {
            program: program.into(),
            source,
        }
    }

    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create an output missing error.
    pub fn output_missing(path: impl Into<PathBuf>) -> Self {
        Self::OutputMissing { path: path.into() }
    }

    /// Create an outside-scratch error.
    pub fn outside_scratch(path: impl Into<PathBuf>) -> Self {
        Self::OutsideScratch { path: path.into() }
    }

    /// Stable name of the failure, used when errors cross a process boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::SpawnFailure { .. } => "SpawnFailure",
            Error::WaitTimeExceeded { .. } => "WaitTimeExceeded",
            Error::OutputMissing { .. } => "OutputMissing",
            Error::MissingInput => "MissingInput",
            Error::InvalidTemplate(_) => "InvalidTemplate",
            Error::OutsideScratch { .. } => "OutsideScratch",
            Error::ToolNotFound { .. } => "ToolNotFound",
            Error::InvalidInput(_) => "InvalidInput",
            Error::Io(_) => "Io",
        }
    }
}
