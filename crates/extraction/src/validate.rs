//! Geometry checks shared by both backends.
//!
//! With `(b_nx, b_ny)` the horizontal extent of block `(0, 0)` and `(nx, ny)`
//! the discovered grid:
//!
//! - an x-strip (fixed `i`, all `j`) spans `(b_nx, b_ny·ny)`
//! - a y-strip (fixed `j`, all `i`) spans `(b_nx·nx, b_ny)`
//! - the full domain spans `(b_nx·nx, b_ny·ny)`

use std::path::{Path, PathBuf};

use block_netcdf::{read_shape, FieldShape, HorizontalAxis};

use crate::discovery::BlockGrid;
use crate::error::{ExtractionError, Result};

/// Horizontal extent of a strip along `dim`.
pub fn strip_extent(block: (usize, usize), dim: HorizontalAxis, grid: BlockGrid) -> (usize, usize) {
    match dim {
        HorizontalAxis::X => (block.0, block.1 * grid.ny),
        HorizontalAxis::Y => (block.0 * grid.nx, block.1),
    }
}

/// Horizontal extent of the full domain.
pub fn domain_extent(block: (usize, usize), grid: BlockGrid) -> (usize, usize) {
    (block.0 * grid.nx, block.1 * grid.ny)
}

/// Header shape and horizontal extent of `var_name` in `path`.
pub fn extent_of(path: &Path, var_name: &str) -> Result<(FieldShape, (usize, usize))> {
    let shape = read_shape(path, var_name)?;
    let extent = shape.horizontal_extent()?;
    Ok((shape, extent))
}

/// Require a merged result to have exactly `expected` extent.
pub fn check_extent(shape: &FieldShape, path: &Path, expected: (usize, usize), detail: &str) -> Result<()> {
    let actual = shape.horizontal_extent()?;
    if actual != expected {
        return Err(ExtractionError::ShapeMismatch {
            detail: detail.to_string(),
            expected,
            actual,
            files: vec![(path.to_path_buf(), shape.to_string())],
        });
    }
    Ok(())
}

/// Require `shape` to have exactly the dimensions of `reference`, in order.
pub fn check_dimension_order(shape: &FieldShape, path: &Path, reference: &FieldShape) -> Result<()> {
    if shape.dim_names() != reference.dim_names() {
        return Err(dimension_order_error(shape, path, reference));
    }
    Ok(())
}

pub(crate) fn dimension_order_error(shape: &FieldShape, path: &Path, reference: &FieldShape) -> ExtractionError {
    let names = |s: &FieldShape| -> Vec<String> { s.dim_names().into_iter().map(String::from).collect() };
    ExtractionError::DimensionOrder {
        path: path.to_path_buf(),
        expected: names(reference),
        actual: names(shape),
    }
}

/// Like [`check_extent`], but on mismatch also lists the shapes of the
/// inputs the result was assembled from.
pub fn check_assembled(
    shape: &FieldShape,
    output: &Path,
    expected: (usize, usize),
    detail: &str,
    inputs: &[PathBuf],
    var_name: &str,
) -> Result<()> {
    match check_extent(shape, output, expected, detail) {
        Err(ExtractionError::ShapeMismatch {
            detail,
            expected,
            actual,
            mut files,
        }) => {
            files.extend(inputs.iter().filter_map(|path| {
                read_shape(path, var_name)
                    .ok()
                    .map(|shape| (path.clone(), shape.to_string()))
            }));
            Err(ExtractionError::ShapeMismatch {
                detail,
                expected,
                actual,
                files,
            })
        }
        other => other,
    }
}

/// Require every input file to have `expected` extent along the given axes.
///
/// `axes` selects which components of the extent are compared; the others
/// are allowed to vary. All offending files are reported together.
pub fn check_members(
    paths: &[PathBuf],
    var_name: &str,
    expected: (usize, usize),
    axes: &[HorizontalAxis],
    detail: &str,
) -> Result<()> {
    let mut offending = Vec::new();
    let mut first_actual = None;

    for path in paths {
        let (shape, actual) = extent_of(path, var_name)?;
        let differs = axes.iter().any(|axis| match axis {
            HorizontalAxis::X => actual.0 != expected.0,
            HorizontalAxis::Y => actual.1 != expected.1,
        });
        if differs {
            first_actual.get_or_insert(actual);
            offending.push((path.clone(), shape.to_string()));
        }
    }

    match first_actual {
        Some(actual) => Err(ExtractionError::ShapeMismatch {
            detail: detail.to_string(),
            expected,
            actual,
            files: offending,
        }),
        None => Ok(()),
    }
}
