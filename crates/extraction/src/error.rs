//! Error types for the extraction crate.

use std::path::PathBuf;

use block_netcdf::NetCdfError;
use thiserror::Error;

/// Errors that can occur while extracting and reassembling block output.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// A parameter required for the requested kind or stage is missing or invalid.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error(
        "No source blocks found for the run (x blocks: {nx} matching `{x_pattern}`, y blocks: {ny} matching `{y_pattern}`)"
    )]
    NoBlocksFound {
        x_pattern: String,
        y_pattern: String,
        nx: usize,
        ny: usize,
    },

    #[error(
        "The variable `{name}` wasn't found in `{}`, the following variables are available: {}",
        .path.display(),
        .available.join(", ")
    )]
    VariableNotFound {
        name: String,
        path: PathBuf,
        available: Vec<String>,
    },

    #[error(transparent)]
    ExternalTool(#[from] ExternalToolError),

    /// Geometry check failed before or after a merge.
    #[error("Shape mismatch: {detail}, expected {expected:?} but got {actual:?}{}", format_files(.files))]
    ShapeMismatch {
        detail: String,
        expected: (usize, usize),
        actual: (usize, usize),
        files: Vec<(PathBuf, String)>,
    },

    /// A merged output does not keep the reference block's dimension order.
    #[error(
        "Dimension order of `{}` is ({}), expected ({})",
        .path.display(),
        .actual.join(", "),
        .expected.join(", ")
    )]
    DimensionOrder {
        path: PathBuf,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// A source block implied by the discovered grid is absent.
    #[error("Missing input `{}`", .0.display())]
    MissingInput(PathBuf),

    #[error("NetCDF error: {0}")]
    NetCdf(NetCdfError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<NetCdfError> for ExtractionError {
    fn from(err: NetCdfError) -> Self {
        match err {
            NetCdfError::VariableNotFound {
                name,
                path,
                available,
            } => Self::VariableNotFound {
                name,
                path,
                available,
            },
            other => Self::NetCdf(other),
        }
    }
}

fn format_files(files: &[(PathBuf, String)]) -> String {
    files
        .iter()
        .map(|(path, shape)| format!("\n  {}: {}", path.display(), shape))
        .collect()
}

/// Failures of the external command-line tool.
#[derive(Error, Debug)]
pub enum ExternalToolError {
    #[error("External tool `{}` was not found", .0.display())]
    ToolNotFound(PathBuf),

    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Nonzero exit, annotated when the exit was caused by a fatal signal.
    #[error(
        "`{command}` exited with code {exit_code}{}\nstderr:\n{stderr}",
        .signal.as_ref().map(|s| format!(" ({})", s)).unwrap_or_default()
    )]
    Failed {
        command: String,
        exit_code: i32,
        stderr: String,
        signal: Option<String>,
    },

    #[error("`{}` supports none of the concatenation operators: {}", .program.display(), .operators.join(", "))]
    UnsupportedOperator {
        program: PathBuf,
        operators: Vec<String>,
    },
}

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;
