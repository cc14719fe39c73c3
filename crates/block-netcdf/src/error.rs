//! Error types for NetCDF block operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for NetCDF block operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF block access and array operations.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error reported by the NetCDF library
    #[error("NetCDF error on `{}`: {message}", .path.display())]
    Library { path: PathBuf, message: String },

    /// The requested variable is not in the file
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

    /// Missing required dimension, coordinate or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Index outside of a dimension's extent
    #[error("index {index} is out of range for dimension `{dim}` of length {len}")]
    IndexOutOfRange { dim: String, index: usize, len: usize },

    /// Fields that cannot be combined (different dimensions, extents or overlapping values)
    #[error("incompatible fields: {0}")]
    Incompatible(String),

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}

impl NetCdfError {
    pub(crate) fn library(path: impl Into<PathBuf>, err: netcdf::Error) -> Self {
        Self::Library {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
