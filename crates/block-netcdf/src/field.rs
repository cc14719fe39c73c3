//! Labelled n-dimensional fields and the operations used to reassemble blocks.
//!
//! A [`Field`] is one variable with named dimensions, optional 1-D coordinate
//! values per dimension and a flat list of attributes. It supports exactly the
//! operations the block pipeline needs: positional selection that keeps a
//! singleton dimension, insertion of new leading dimensions, transposition,
//! concatenation along one dimension and an outer-join merge on coordinate
//! values.

use std::collections::BTreeMap;

use ndarray::{ArrayD, Axis, IxDyn, Slice};

use crate::axis::HorizontalAxis;
use crate::error::{NetCdfError, NetCdfResult};
use crate::shape::FieldShape;

/// A variable or file attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Number(f64),
    Numbers(Vec<f64>),
}

/// Values along one dimension plus the coordinate variable's attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Coordinate {
    pub values: Vec<f64>,
    pub attributes: Vec<(String, AttrValue)>,
}

impl Coordinate {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            attributes: Vec::new(),
        }
    }

    /// Arithmetic mean of the coordinate values (`NaN` when empty).
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }
}

/// A named variable with labelled dimensions.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    dims: Vec<String>,
    data: ArrayD<f64>,
    coords: BTreeMap<String, Coordinate>,
    attributes: Vec<(String, AttrValue)>,
}

impl Field {
    /// Create a field; `dims` must name every axis of `data` exactly once.
    pub fn new(name: impl Into<String>, dims: Vec<String>, data: ArrayD<f64>) -> NetCdfResult<Self> {
        let name = name.into();
        if dims.len() != data.ndim() {
            return Err(NetCdfError::InvalidFormat(format!(
                "`{}` has {} dimension names for {}-dimensional data",
                name,
                dims.len(),
                data.ndim()
            )));
        }
        for (n, dim) in dims.iter().enumerate() {
            if dims[..n].contains(dim) {
                return Err(NetCdfError::InvalidFormat(format!(
                    "`{}` repeats dimension `{}`",
                    name, dim
                )));
            }
        }
        Ok(Self {
            name,
            dims,
            data,
            coords: BTreeMap::new(),
            attributes: Vec::new(),
        })
    }

    /// Attach coordinate values to one of the field's dimensions.
    pub fn with_coordinate(mut self, dim: &str, coordinate: Coordinate) -> NetCdfResult<Self> {
        let len = self
            .len_of(dim)
            .ok_or_else(|| NetCdfError::MissingData(format!("dimension `{}` on `{}`", dim, self.name)))?;
        if coordinate.values.len() != len {
            return Err(NetCdfError::InvalidFormat(format!(
                "coordinate `{}` has {} values but the dimension has length {}",
                dim,
                coordinate.values.len(),
                len
            )));
        }
        self.coords.insert(dim.to_string(), coordinate);
        Ok(self)
    }

    pub fn with_attributes(mut self, attributes: Vec<(String, AttrValue)>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn attributes(&self) -> &[(String, AttrValue)] {
        &self.attributes
    }

    pub fn coordinate(&self, dim: &str) -> Option<&Coordinate> {
        self.coords.get(dim)
    }

    /// Values in logical (row-major) order regardless of memory layout.
    pub fn values(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    pub fn len_of(&self, dim: &str) -> Option<usize> {
        self.axis_index(dim).map(|axis| self.data.len_of(Axis(axis)))
    }

    /// First dimension of this field lying along `axis`.
    pub fn dimension_for(&self, axis: HorizontalAxis) -> Option<&str> {
        self.dims
            .iter()
            .map(String::as_str)
            .find(|dim| HorizontalAxis::of_dimension(dim) == Some(axis))
    }

    /// `true` when the field has no horizontal dimension at all, as for
    /// per-block scalar diagnostics.
    pub fn is_horizontally_scalar(&self) -> bool {
        HorizontalAxis::ALL
            .iter()
            .all(|axis| self.dimension_for(*axis).is_none())
    }

    pub fn shape_info(&self) -> FieldShape {
        FieldShape::new(
            self.name.clone(),
            self.dims
                .iter()
                .cloned()
                .zip(self.data.shape().iter().copied())
                .collect(),
        )
    }

    fn axis_index(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    fn require_axis(&self, dim: &str) -> NetCdfResult<usize> {
        self.axis_index(dim).ok_or_else(|| {
            NetCdfError::MissingData(format!(
                "dimension `{}` on `{}` (dimensions: {})",
                dim,
                self.name,
                self.dims.join(", ")
            ))
        })
    }

    /// Select one position along `dim`, keeping it as a dimension of length 1.
    pub fn select_index(&self, dim: &str, index: usize) -> NetCdfResult<Field> {
        let axis = self.require_axis(dim)?;
        let len = self.data.len_of(Axis(axis));
        if index >= len {
            return Err(NetCdfError::IndexOutOfRange {
                dim: dim.to_string(),
                index,
                len,
            });
        }

        let data = self
            .data
            .slice_axis(Axis(axis), Slice::from(index..index + 1))
            .to_owned();
        let mut coords = self.coords.clone();
        if let Some(coord) = coords.get_mut(dim) {
            coord.values = vec![coord.values[index]];
        }

        Ok(Field {
            name: self.name.clone(),
            dims: self.dims.clone(),
            data,
            coords,
            attributes: self.attributes.clone(),
        })
    }

    /// Insert new leading dimensions of length 1, in the order given.
    pub fn expand_dims(&self, new_dims: Vec<(String, Coordinate)>) -> NetCdfResult<Field> {
        let mut field = self.clone();
        for (dim, coordinate) in new_dims.into_iter().rev() {
            if field.dims.contains(&dim) {
                return Err(NetCdfError::Incompatible(format!(
                    "`{}` already has a dimension `{}`",
                    field.name, dim
                )));
            }
            if coordinate.values.len() != 1 {
                return Err(NetCdfError::InvalidFormat(format!(
                    "expanded dimension `{}` needs exactly one coordinate value, got {}",
                    dim,
                    coordinate.values.len()
                )));
            }
            field.data = field.data.insert_axis(Axis(0));
            field.dims.insert(0, dim.clone());
            field.coords.insert(dim, coordinate);
        }
        Ok(field)
    }

    /// Reorder dimensions to `order`, which must be a permutation of `dims()`.
    pub fn transpose<S: AsRef<str>>(&self, order: &[S]) -> NetCdfResult<Field> {
        if order.len() != self.dims.len() {
            return Err(self.transpose_error(order));
        }
        let mut permutation = Vec::with_capacity(order.len());
        for dim in order {
            let axis = self
                .axis_index(dim.as_ref())
                .ok_or_else(|| self.transpose_error(order))?;
            if permutation.contains(&axis) {
                return Err(self.transpose_error(order));
            }
            permutation.push(axis);
        }

        let data = self
            .data
            .clone()
            .permuted_axes(permutation)
            .as_standard_layout()
            .into_owned();

        Ok(Field {
            name: self.name.clone(),
            dims: order.iter().map(|d| d.as_ref().to_string()).collect(),
            data,
            coords: self.coords.clone(),
            attributes: self.attributes.clone(),
        })
    }

    fn transpose_error<S: AsRef<str>>(&self, order: &[S]) -> NetCdfError {
        NetCdfError::Incompatible(format!(
            "cannot order dimensions ({}) of `{}` as ({})",
            self.dims.join(", "),
            self.name,
            order.iter().map(|d| d.as_ref()).collect::<Vec<_>>().join(", ")
        ))
    }

    /// Concatenate fields along `dim`.
    ///
    /// Every field is first brought into the dimension order of the first one;
    /// all other dimensions must agree in length. Coordinates along `dim` are
    /// concatenated, all other coordinates are taken from the first field.
    pub fn concat(fields: &[Field], dim: &str) -> NetCdfResult<Field> {
        let first = fields
            .first()
            .ok_or_else(|| NetCdfError::Incompatible("nothing to concatenate".to_string()))?;
        let axis = first.require_axis(dim)?;

        let aligned = fields
            .iter()
            .map(|f| f.transpose(first.dims.as_slice()))
            .collect::<NetCdfResult<Vec<_>>>()?;

        for field in &aligned {
            for (k, other) in first.dims.iter().enumerate() {
                if k != axis && field.data.len_of(Axis(k)) != first.data.len_of(Axis(k)) {
                    return Err(NetCdfError::Incompatible(format!(
                        "cannot concatenate along `{}`: `{}` has length {} but {} in the first field",
                        dim,
                        other,
                        field.data.len_of(Axis(k)),
                        first.data.len_of(Axis(k))
                    )));
                }
            }
        }

        let views: Vec<_> = aligned.iter().map(|f| f.data.view()).collect();
        let data = ndarray::concatenate(Axis(axis), &views)
            .map_err(|e| NetCdfError::Incompatible(format!("concatenation along `{}`: {}", dim, e)))?;

        let mut coords = first.coords.clone();
        if first.coords.contains_key(dim) {
            let mut values = Vec::with_capacity(data.len_of(Axis(axis)));
            for field in &aligned {
                let coord = field.coords.get(dim).ok_or_else(|| {
                    NetCdfError::Incompatible(format!(
                        "one of the fields has no `{}` coordinate to concatenate",
                        dim
                    ))
                })?;
                values.extend_from_slice(&coord.values);
            }
            if let Some(coord) = coords.get_mut(dim) {
                coord.values = values;
            }
        }

        Ok(Field {
            name: first.name.clone(),
            dims: first.dims.clone(),
            data,
            coords,
            attributes: first.attributes.clone(),
        })
    }

    /// Outer-join merge of fields on their coordinate values.
    ///
    /// The result spans the sorted union of coordinate values along every
    /// dimension that has coordinates; dimensions without coordinates must
    /// have the same length everywhere. Positions no field covers are `NaN`.
    /// Two fields disagreeing on a value at the same position is an error.
    pub fn merge(fields: &[Field]) -> NetCdfResult<Field> {
        let first = fields
            .first()
            .ok_or_else(|| NetCdfError::Incompatible("nothing to merge".to_string()))?;
        let aligned = fields
            .iter()
            .map(|f| f.transpose(first.dims.as_slice()))
            .collect::<NetCdfResult<Vec<_>>>()?;

        let mut merged_coords = first.coords.clone();
        let mut shape = Vec::with_capacity(first.dims.len());
        for (axis, dim) in first.dims.iter().enumerate() {
            if first.coords.contains_key(dim) {
                let mut union = Vec::new();
                for field in &aligned {
                    let coord = field.coords.get(dim).ok_or_else(|| {
                        NetCdfError::Incompatible(format!(
                            "cannot merge on `{}`: one of the fields has no coordinate values",
                            dim
                        ))
                    })?;
                    union.extend_from_slice(&coord.values);
                }
                union.sort_by(f64::total_cmp);
                union.dedup_by(|a, b| a.total_cmp(b).is_eq());
                shape.push(union.len());
                if let Some(coord) = merged_coords.get_mut(dim) {
                    coord.values = union;
                }
            } else {
                let len = first.data.len_of(Axis(axis));
                if aligned.iter().any(|f| f.data.len_of(Axis(axis)) != len) {
                    return Err(NetCdfError::Incompatible(format!(
                        "cannot merge on `{}`: no coordinate values and lengths differ",
                        dim
                    )));
                }
                shape.push(len);
            }
        }

        let mut data = ArrayD::from_elem(IxDyn(&shape), f64::NAN);
        let mut target = vec![0usize; shape.len()];
        for field in &aligned {
            let positions = first
                .dims
                .iter()
                .enumerate()
                .map(|(axis, dim)| match (field.coords.get(dim), merged_coords.get(dim)) {
                    (Some(own), Some(merged)) => own
                        .values
                        .iter()
                        .map(|v| {
                            merged
                                .values
                                .binary_search_by(|probe| probe.total_cmp(v))
                                .unwrap_or_default()
                        })
                        .collect::<Vec<_>>(),
                    _ => (0..field.data.len_of(Axis(axis))).collect(),
                })
                .collect::<Vec<_>>();

            for (index, &value) in field.data.indexed_iter() {
                for (axis, slot) in target.iter_mut().enumerate() {
                    *slot = positions[axis][index[axis]];
                }
                let cell = &mut data[&target[..]];
                if value.is_nan() {
                    continue;
                }
                if !cell.is_nan() && *cell != value {
                    return Err(NetCdfError::Incompatible(format!(
                        "conflicting values for `{}` at {:?}: {} and {}",
                        first.name, target, cell, value
                    )));
                }
                *cell = value;
            }
        }

        Ok(Field {
            name: first.name.clone(),
            dims: first.dims.clone(),
            data,
            coords: merged_coords,
            attributes: first.attributes.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    /// A (time, xt, yt) block whose values encode global (t, x, y) indices.
    fn block(x0: usize, y0: usize, nx: usize, ny: usize, nt: usize) -> Field {
        let data = Array::from_shape_fn((nt, nx, ny), |(t, x, y)| {
            (t * 10_000 + (x0 + x) * 100 + (y0 + y)) as f64
        })
        .into_dyn();
        Field::new(
            "q",
            vec!["time".into(), "xt".into(), "yt".into()],
            data,
        )
        .unwrap()
        .with_coordinate("time", Coordinate::new((0..nt).map(|t| t as f64 * 60.0).collect()))
        .unwrap()
        .with_coordinate("xt", Coordinate::new((x0..x0 + nx).map(|x| x as f64 + 0.5).collect()))
        .unwrap()
        .with_coordinate("yt", Coordinate::new((y0..y0 + ny).map(|y| y as f64 + 0.5).collect()))
        .unwrap()
    }

    #[test]
    fn test_new_rejects_mismatched_dims() {
        let data = ArrayD::zeros(IxDyn(&[2, 3]));
        assert!(Field::new("a", vec!["x".into()], data.clone()).is_err());
        assert!(Field::new("a", vec!["x".into(), "x".into()], data).is_err());
    }

    #[test]
    fn test_select_index_keeps_singleton() {
        let field = block(0, 0, 2, 3, 4);
        let selected = field.select_index("time", 2).unwrap();
        assert_eq!(selected.shape(), &[1, 2, 3]);
        assert_eq!(selected.coordinate("time").unwrap().values, vec![120.0]);
        assert_eq!(selected.data()[[0, 1, 2]], 20_000.0 + 100.0 + 2.0);
    }

    #[test]
    fn test_select_index_out_of_range() {
        let field = block(0, 0, 2, 2, 2);
        assert!(matches!(
            field.select_index("time", 2),
            Err(NetCdfError::IndexOutOfRange { index: 2, len: 2, .. })
        ));
    }

    #[test]
    fn test_expand_dims_prepends_in_order() {
        let scalar = Field::new(
            "lcl",
            vec!["time".into()],
            Array::from_vec(vec![500.0, 510.0]).into_dyn(),
        )
        .unwrap();
        assert!(scalar.is_horizontally_scalar());

        let expanded = scalar
            .expand_dims(vec![
                ("xt".to_string(), Coordinate::new(vec![25.0])),
                ("yt".to_string(), Coordinate::new(vec![75.0])),
            ])
            .unwrap();
        assert_eq!(expanded.dims(), &["xt", "yt", "time"]);
        assert_eq!(expanded.shape(), &[1, 1, 2]);
        assert_eq!(expanded.coordinate("yt").unwrap().values, vec![75.0]);
        assert!(!expanded.is_horizontally_scalar());
    }

    #[test]
    fn test_transpose_reorders_values() {
        let field = block(0, 0, 2, 3, 1);
        let t = field.transpose(&["yt", "time", "xt"]).unwrap();
        assert_eq!(t.shape(), &[3, 1, 2]);
        assert_eq!(t.data()[[2, 0, 1]], field.data()[[0, 1, 2]]);
        assert!(field.transpose(&["yt", "xt"]).is_err());
        assert!(field.transpose(&["yt", "yt", "xt"]).is_err());
    }

    #[test]
    fn test_concat_along_y() {
        let strip = Field::concat(&[block(0, 0, 2, 3, 1), block(0, 3, 2, 3, 1)], "yt").unwrap();
        assert_eq!(strip.shape(), &[1, 2, 6]);
        assert_eq!(
            strip.coordinate("yt").unwrap().values,
            vec![0.5, 1.5, 2.5, 3.5, 4.5, 5.5]
        );
        assert_eq!(strip.data()[[0, 1, 4]], 104.0);
    }

    #[test]
    fn test_concat_rejects_mismatched_extent() {
        let result = Field::concat(&[block(0, 0, 2, 3, 1), block(0, 3, 3, 3, 1)], "yt");
        assert!(matches!(result, Err(NetCdfError::Incompatible(_))));
    }

    #[test]
    fn test_merge_equals_concatenation() {
        let blocks = vec![
            block(2, 3, 2, 3, 2),
            block(0, 0, 2, 3, 2),
            block(0, 3, 2, 3, 2),
            block(2, 0, 2, 3, 2),
        ];
        let merged = Field::merge(&blocks).unwrap();
        assert_eq!(merged.shape(), &[2, 4, 6]);

        let strips = vec![
            Field::concat(&[block(0, 0, 2, 3, 2), block(0, 3, 2, 3, 2)], "yt").unwrap(),
            Field::concat(&[block(2, 0, 2, 3, 2), block(2, 3, 2, 3, 2)], "yt").unwrap(),
        ];
        let concatenated = Field::concat(&strips, "xt").unwrap();
        assert_eq!(merged.values(), concatenated.values());
        assert_eq!(
            merged.coordinate("xt").unwrap().values,
            concatenated.coordinate("xt").unwrap().values
        );
    }

    #[test]
    fn test_merge_leaves_gaps_as_nan() {
        let merged = Field::merge(&[block(0, 0, 1, 1, 1), block(2, 0, 1, 1, 1)]).unwrap();
        assert_eq!(merged.shape(), &[1, 2, 1]);
        assert!(merged.values().iter().all(|v| !v.is_nan()));

        let sparse = Field::merge(&[block(0, 0, 1, 1, 1), block(1, 1, 1, 1, 1)]).unwrap();
        assert_eq!(sparse.shape(), &[1, 2, 2]);
        assert_eq!(sparse.values().iter().filter(|v| v.is_nan()).count(), 2);
    }

    #[test]
    fn test_merge_rejects_conflicting_overlap() {
        let a = block(0, 0, 2, 2, 1);
        let b = Field::new("q", a.dims().to_vec(), a.data().mapv(|v| v + 1.0))
            .unwrap()
            .with_coordinate("time", a.coordinate("time").unwrap().clone())
            .unwrap()
            .with_coordinate("xt", a.coordinate("xt").unwrap().clone())
            .unwrap()
            .with_coordinate("yt", a.coordinate("yt").unwrap().clone())
            .unwrap();
        assert!(matches!(
            Field::merge(&[a, b]),
            Err(NetCdfError::Incompatible(_))
        ));
    }
}
