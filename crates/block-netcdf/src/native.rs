//! Native NetCDF access using the netcdf library.
//!
//! Block files are opened with the netcdf library (which wraps HDF5), so no
//! external process is involved. Reads convert every numeric variable to
//! `f64`; writes produce NetCDF-4 files with `f64` variables, one coordinate
//! variable per dimension that has coordinates, and the data variable.

use std::path::{Path, PathBuf};
use std::sync::Once;

use ndarray::{ArrayD, IxDyn};
use tracing::debug;

use crate::error::{NetCdfError, NetCdfResult};
use crate::field::{AttrValue, Coordinate, Field};
use crate::shape::FieldShape;

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose error messages to stderr even when errors
/// are handled gracefully by the Rust code (e.g., when checking for optional
/// attributes that don't exist). This creates confusing log spam like:
///
/// ```text
/// HDF5-DIAG: Error detected in HDF5 (1.10.8) thread 3:
///   #003: ../../../src/H5Adense.c line 397 in H5A__dense_open(): can't locate attribute in name index
/// ```
///
/// This function disables that output by calling H5Eset_auto2 with null handlers.
/// It only needs to be called once per process, but is safe to call multiple times.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and we're passing null pointers
        // to disable error output, which is a documented valid use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// An open, read-only NetCDF block file.
pub struct BlockFile {
    path: PathBuf,
    file: netcdf::File,
}

impl BlockFile {
    /// Open a NetCDF file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> NetCdfResult<Self> {
        silence_hdf5_errors();

        let path = path.as_ref().to_path_buf();
        let file = netcdf::open(&path).map_err(|e| NetCdfError::library(&path, e))?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimension_names(&self) -> Vec<String> {
        self.file.dimensions().map(|d| d.name()).collect()
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.file.variables().map(|v| v.name()).collect()
    }

    /// Variables that are not coordinate variables of a dimension.
    pub fn data_variable_names(&self) -> Vec<String> {
        let dims = self.dimension_names();
        self.variable_names()
            .into_iter()
            .filter(|name| !dims.contains(name))
            .collect()
    }

    fn variable(&self, name: &str) -> NetCdfResult<netcdf::Variable<'_>> {
        self.file
            .variable(name)
            .ok_or_else(|| NetCdfError::VariableNotFound {
                name: name.to_string(),
                path: self.path.clone(),
                available: self.data_variable_names(),
            })
    }

    /// Dimension names and lengths of a variable, read from the header only.
    pub fn shape_of(&self, name: &str) -> NetCdfResult<FieldShape> {
        let var = self.variable(name)?;
        let dims = var
            .dimensions()
            .iter()
            .map(|d| (d.name(), d.len()))
            .collect();
        Ok(FieldShape::new(name, dims))
    }

    /// Values of the coordinate variable for `dim`, if the file has one.
    pub fn coordinate(&self, dim: &str) -> NetCdfResult<Option<Coordinate>> {
        let Some(var) = self.file.variable(dim) else {
            return Ok(None);
        };
        let dims = var.dimensions();
        if dims.len() != 1 || dims[0].name() != dim {
            return Ok(None);
        }

        let values: Vec<f64> = var.get_values(..).map_err(|e| {
            NetCdfError::InvalidFormat(format!(
                "Failed to read coordinate `{}` from `{}`: {}",
                dim,
                self.path.display(),
                e
            ))
        })?;
        Ok(Some(Coordinate {
            values,
            attributes: read_attributes(&var),
        }))
    }

    /// Read a whole variable, with coordinates for every dimension that has them.
    pub fn read_field(&self, name: &str) -> NetCdfResult<Field> {
        let var = self.variable(name)?;
        let dims: Vec<(String, usize)> = var
            .dimensions()
            .iter()
            .map(|d| (d.name(), d.len()))
            .collect();

        let values: Vec<f64> = var.get_values(..).map_err(|e| {
            NetCdfError::InvalidFormat(format!(
                "Failed to read `{}` from `{}`: {}",
                name,
                self.path.display(),
                e
            ))
        })?;
        let shape: Vec<usize> = dims.iter().map(|(_, len)| *len).collect();
        let data = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| NetCdfError::InvalidFormat(format!("`{}` has inconsistent shape: {}", name, e)))?;

        let mut field = Field::new(name, dims.iter().map(|(d, _)| d.clone()).collect(), data)?
            .with_attributes(read_attributes(&var));
        for (dim, _) in &dims {
            if let Some(coordinate) = self.coordinate(dim)? {
                field = field.with_coordinate(dim, coordinate)?;
            }
        }

        debug!(
            path = %self.path.display(),
            variable = name,
            shape = %field.shape_info(),
            "Read field"
        );
        Ok(field)
    }
}

/// Read one variable from a file.
pub fn read_field<P: AsRef<Path>>(path: P, name: &str) -> NetCdfResult<Field> {
    BlockFile::open(path)?.read_field(name)
}

/// Read the dimension names and extents of one variable.
pub fn read_shape<P: AsRef<Path>>(path: P, name: &str) -> NetCdfResult<FieldShape> {
    BlockFile::open(path)?.shape_of(name)
}

/// Write a field to a new NetCDF-4 file, replacing any existing file.
pub fn write_field<P: AsRef<Path>>(field: &Field, path: P) -> NetCdfResult<()> {
    silence_hdf5_errors();

    let path = path.as_ref();
    let lib_err = |e: netcdf::Error| NetCdfError::library(path, e);

    let mut file = netcdf::create(path).map_err(lib_err)?;
    for (dim, len) in field.dims().iter().zip(field.shape()) {
        file.add_dimension(dim, *len).map_err(lib_err)?;
    }

    for dim in field.dims() {
        if let Some(coordinate) = field.coordinate(dim) {
            let mut var = file.add_variable::<f64>(dim, &[dim.as_str()]).map_err(lib_err)?;
            put_attributes(&mut var, &coordinate.attributes).map_err(lib_err)?;
            var.put_values(&coordinate.values, ..).map_err(lib_err)?;
        }
    }

    let dims: Vec<&str> = field.dims().iter().map(String::as_str).collect();
    let mut var = file.add_variable::<f64>(field.name(), &dims).map_err(lib_err)?;
    put_attributes(&mut var, field.attributes()).map_err(lib_err)?;
    var.put_values(&field.values(), ..).map_err(lib_err)?;

    debug!(
        path = %path.display(),
        shape = %field.shape_info(),
        "Wrote field"
    );
    Ok(())
}

// =============================================================================
// Internal helpers
// =============================================================================

fn read_attributes(var: &netcdf::Variable) -> Vec<(String, AttrValue)> {
    var.attributes()
        .filter_map(|attr| {
            let value = attr.value().ok().and_then(convert_attribute)?;
            Some((attr.name().to_string(), value))
        })
        .collect()
}

/// Map a library attribute onto [`AttrValue`]; types we cannot represent are dropped.
fn convert_attribute(value: netcdf::AttributeValue) -> Option<AttrValue> {
    use netcdf::AttributeValue as V;

    let number = match value {
        V::Str(s) => return Some(AttrValue::Text(s)),
        V::Doubles(v) => return Some(AttrValue::Numbers(v)),
        V::Floats(v) => return Some(AttrValue::Numbers(v.into_iter().map(f64::from).collect())),
        V::Ints(v) => return Some(AttrValue::Numbers(v.into_iter().map(f64::from).collect())),
        V::Double(v) => v,
        V::Float(v) => f64::from(v),
        V::Int(v) => f64::from(v),
        V::Uint(v) => f64::from(v),
        V::Short(v) => f64::from(v),
        V::Ushort(v) => f64::from(v),
        V::Schar(v) => f64::from(v),
        V::Uchar(v) => f64::from(v),
        V::Longlong(v) => v as f64,
        V::Ulonglong(v) => v as f64,
        _ => return None,
    };
    Some(AttrValue::Number(number))
}

fn put_attributes(
    var: &mut netcdf::VariableMut,
    attributes: &[(String, AttrValue)],
) -> Result<(), netcdf::Error> {
    for (name, value) in attributes {
        match value {
            AttrValue::Text(s) => var.put_attribute(name, s.as_str())?,
            AttrValue::Number(v) => var.put_attribute(name, *v)?,
            AttrValue::Numbers(v) => var.put_attribute(name, v.clone())?,
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_attribute_numbers() {
        assert_eq!(
            convert_attribute(netcdf::AttributeValue::Float(2.5)),
            Some(AttrValue::Number(2.5))
        );
        assert_eq!(
            convert_attribute(netcdf::AttributeValue::Str("m/s".to_string())),
            Some(AttrValue::Text("m/s".to_string()))
        );
        assert_eq!(
            convert_attribute(netcdf::AttributeValue::Shorts(vec![1, 2])),
            None
        );
    }

    #[test]
    fn test_open_missing_file() {
        let result = BlockFile::open("/nonexistent/block.nc");
        assert!(matches!(result, Err(NetCdfError::Library { .. })));
    }
}
