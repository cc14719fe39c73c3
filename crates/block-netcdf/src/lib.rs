//! NetCDF access for per-process LES output blocks.
//!
//! The LES writes one NetCDF file per horizontal sub-domain. This crate reads
//! single variables out of those files into a small labelled-array model
//! ([`Field`]: named dimensions, 1-D dimension coordinates, attributes and
//! `ndarray` data) and provides the operations needed to stitch blocks back
//! together:
//!
//! - [`Field::select_index`] keeps one time slice as a singleton dimension
//! - [`Field::expand_dims`] lifts per-block scalars onto the horizontal grid
//! - [`Field::concat`] joins fields end-to-end along one dimension
//! - [`Field::merge`] combines scattered blocks by coordinate union
//! - [`Field::transpose`] restores a reference dimension order
//!
//! # Implementation Notes
//!
//! Reading and writing go through the `netcdf` crate (libnetcdf + HDF5).
//! All numeric data is handled as `f64`; written files store `f64`
//! variables regardless of the source type.

pub mod axis;
pub mod error;
pub mod field;
pub mod native;
pub mod shape;

pub use axis::HorizontalAxis;
pub use error::{NetCdfError, NetCdfResult};
pub use field::{AttrValue, Coordinate, Field};
pub use native::{read_field, read_shape, silence_hdf5_errors, write_field, BlockFile};
pub use shape::FieldShape;
