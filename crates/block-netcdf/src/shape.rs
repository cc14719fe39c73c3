//! Header-level description of a variable: its dimension names and extents.

use std::fmt;

use crate::axis::HorizontalAxis;
use crate::error::{NetCdfError, NetCdfResult};

/// Dimension names and lengths of one variable, in storage order.
///
/// Reading a `FieldShape` from a file only touches the header, so it is the
/// cheap way to validate geometry before (or after) a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldShape {
    name: String,
    dims: Vec<(String, usize)>,
}

impl FieldShape {
    pub fn new(name: impl Into<String>, dims: Vec<(String, usize)>) -> Self {
        Self {
            name: name.into(),
            dims,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[(String, usize)] {
        &self.dims
    }

    pub fn dim_names(&self) -> Vec<&str> {
        self.dims.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Length of the named dimension, if the variable has it.
    pub fn len_of(&self, dim: &str) -> Option<usize> {
        self.dims
            .iter()
            .find(|(name, _)| name == dim)
            .map(|(_, len)| *len)
    }

    /// First dimension of this variable that lies along `axis`.
    pub fn dimension_for(&self, axis: HorizontalAxis) -> Option<&str> {
        self.dims
            .iter()
            .map(|(name, _)| name.as_str())
            .find(|name| HorizontalAxis::of_dimension(name) == Some(axis))
    }

    pub fn axis_len(&self, axis: HorizontalAxis) -> Option<usize> {
        self.dimension_for(axis).and_then(|dim| self.len_of(dim))
    }

    /// Extent along (x, y).
    pub fn horizontal_extent(&self) -> NetCdfResult<(usize, usize)> {
        let nx = self.axis_len(HorizontalAxis::X).ok_or_else(|| {
            NetCdfError::MissingData(format!("x dimension of `{}` ({})", self.name, self))
        })?;
        let ny = self.axis_len(HorizontalAxis::Y).ok_or_else(|| {
            NetCdfError::MissingData(format!("y dimension of `{}` ({})", self.name, self))
        })?;
        Ok((nx, ny))
    }
}

impl fmt::Display for FieldShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (n, (dim, len)) in self.dims.iter().enumerate() {
            if n > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", dim, len)?;
        }
        f.write_str(")")
    }
}
