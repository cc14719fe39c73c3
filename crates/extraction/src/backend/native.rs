//! In-process backend built on [`block_netcdf::Field`].

use std::path::{Path, PathBuf};

use block_netcdf::{read_field, write_field, BlockFile, Coordinate, Field, HorizontalAxis, NetCdfError};
use tracing::debug;

use super::{Backend, BlockExtraction, DomainAssembly, StripAssembly, TIME_DIM};
use crate::artifact::StagedArtifact;
use crate::error::Result;
use crate::naming::OutputKind;
use crate::validate::{check_assembled, check_members, domain_extent, extent_of, strip_extent};

/// Reads blocks with the netcdf library and does all array work in memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NativeBackend;

impl Backend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn extract_variable(&self, request: &BlockExtraction) -> Result<()> {
        let block = BlockFile::open(&request.source)?;
        let mut field = block.read_field(&request.var_name)?;

        // Select by position; the singleton time dimension stays.
        if let Some(tn) = request.tn {
            field = field.select_index(TIME_DIM, tn)?;
        }
        if request.kind == OutputKind::TwoD && field.is_horizontally_scalar() {
            field = lift_to_block_centre(&block, &field)?;
        }

        write_artifact(&field, &request.output)
    }

    fn assemble_strip(&self, request: &StripAssembly) -> Result<()> {
        let var = &request.var_name;
        let (_, block) = extent_of(&request.reference, var)?;
        let expected = strip_extent(block, request.dim, request.grid);
        check_members(
            &request.members,
            var,
            block,
            &HorizontalAxis::ALL,
            "strip member does not match the reference block",
        )?;

        let fields = read_all(&request.members, var)?;
        let along = request.dim.ortho();
        let strip = Field::concat(&fields, concat_dimension(&fields, along)?)?;

        check_assembled(
            &strip.shape_info(),
            &request.output,
            expected,
            "assembled strip has the wrong horizontal extent",
            &request.members,
            var,
        )?;
        write_artifact(&strip, &request.output)
    }

    fn assemble_domain(&self, request: &DomainAssembly) -> Result<()> {
        let var = &request.var_name;
        let (reference, block) = extent_of(&request.reference, var)?;
        let expected = domain_extent(block, request.grid);

        let merged = match request.mode.strip_axis() {
            None => {
                check_members(
                    &request.inputs,
                    var,
                    block,
                    &HorizontalAxis::ALL,
                    "block does not match the reference block",
                )?;
                Field::merge(&read_all(&request.inputs, var)?)?
            }
            Some(dim) => {
                check_members(
                    &request.inputs,
                    var,
                    strip_extent(block, dim, request.grid),
                    &HorizontalAxis::ALL,
                    "strip has the wrong horizontal extent",
                )?;
                let strips = read_all(&request.inputs, var)?;
                Field::concat(&strips, concat_dimension(&strips, dim)?)?
            }
        };
        let domain = merged.transpose(reference.dim_names().as_slice())?;

        check_assembled(
            &domain.shape_info(),
            &request.output,
            expected,
            "full domain has the wrong horizontal extent",
            &request.inputs,
            var,
        )?;
        write_artifact(&domain, &request.output)
    }
}

/// Give a per-block scalar the block's centre position as two singleton
/// horizontal dimensions, so it lines up with gridded variables.
pub(super) fn lift_to_block_centre(block: &BlockFile, field: &Field) -> Result<Field> {
    let mut centre = Vec::with_capacity(2);
    for axis in HorizontalAxis::ALL {
        let dim = axis.centre_dimension();
        let coordinate = block.coordinate(dim)?.ok_or_else(|| {
            NetCdfError::MissingData(format!(
                "coordinate `{}` in `{}` to place per-block `{}`",
                dim,
                block.path().display(),
                field.name()
            ))
        })?;
        let mean = coordinate.mean();
        centre.push((
            dim.to_string(),
            Coordinate {
                values: vec![mean],
                attributes: coordinate.attributes,
            },
        ));
    }
    debug!(variable = field.name(), path = %block.path().display(), "Placing per-block scalar at block centre");
    Ok(field.expand_dims(centre)?)
}

fn read_all(paths: &[PathBuf], var_name: &str) -> Result<Vec<Field>> {
    paths
        .iter()
        .map(|path| read_field(path, var_name).map_err(Into::into))
        .collect()
}

/// Dimension of the first field lying along `axis` (`xt`/`xm`, `yt`/`ym`).
fn concat_dimension(fields: &[Field], axis: HorizontalAxis) -> Result<&str> {
    let first = fields
        .first()
        .ok_or_else(|| NetCdfError::Incompatible("nothing to concatenate".to_string()))?;
    Ok(first.dimension_for(axis).ok_or_else(|| {
        NetCdfError::MissingData(format!(
            "{} dimension of `{}` (dimensions: {})",
            axis,
            first.name(),
            first.dims().join(", ")
        ))
    })?)
}

fn write_artifact(field: &Field, output: &Path) -> Result<()> {
    let staged = StagedArtifact::new(output)?;
    write_field(field, staged.path())?;
    staged.persist()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::BlockGrid;
    use test_utils::LesRun;

    #[test]
    fn test_extract_keeps_singleton_time() {
        let dir = tempfile::tempdir().unwrap();
        let run = LesRun::new("rico", 1, 1, 4, 3);
        let paths = run.write_3d(dir.path());
        let output = dir.path().join("out/w.nc");

        NativeBackend
            .extract_variable(&BlockExtraction {
                source: paths[0].clone(),
                var_name: "w".to_string(),
                tn: Some(1),
                kind: OutputKind::ThreeD,
                output: output.clone(),
            })
            .unwrap();

        let field = read_field(&output, "w").unwrap();
        assert_eq!(field.dims(), &["time", "xt", "yt", "zm"]);
        assert_eq!(field.shape(), &[1, 4, 3, 3]);
    }

    #[test]
    fn test_extract_out_of_range_timestep() {
        let dir = tempfile::tempdir().unwrap();
        let run = LesRun::new("rico", 1, 1, 2, 2).with_timesteps(2);
        let paths = run.write_3d(dir.path());
        let output = dir.path().join("w.nc");

        let err = NativeBackend
            .extract_variable(&BlockExtraction {
                source: paths[0].clone(),
                var_name: "w".to_string(),
                tn: Some(5),
                kind: OutputKind::ThreeD,
                output: output.clone(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(!output.exists());
    }

    #[test]
    fn test_strip_rejects_member_of_wrong_width() {
        let dir = tempfile::tempdir().unwrap();
        let run = LesRun::new("rico", 1, 2, 4, 3);
        let a = dir.path().join("a.nc");
        let b = dir.path().join("b.nc");
        run.write_3d_block(&a, 0, 0);
        run.write_3d_block_sized(&b, 0, 1, 2, 3);

        let err = NativeBackend
            .assemble_strip(&StripAssembly {
                var_name: "w".to_string(),
                dim: HorizontalAxis::X,
                members: vec![a.clone(), b.clone()],
                reference: a,
                grid: BlockGrid { nx: 1, ny: 2 },
                output: dir.path().join("strip.nc"),
            })
            .unwrap_err();
        match err {
            crate::ExtractionError::ShapeMismatch { files, .. } => {
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].0, b);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_strip_rejects_member_short_along_strip() {
        let dir = tempfile::tempdir().unwrap();
        let run = LesRun::new("rico", 1, 2, 4, 3);
        let a = dir.path().join("a.nc");
        let b = dir.path().join("b.nc");
        run.write_3d_block(&a, 0, 0);
        run.write_3d_block_sized(&b, 0, 1, 4, 2);
        let output = dir.path().join("strip.nc");

        let err = NativeBackend
            .assemble_strip(&StripAssembly {
                var_name: "w".to_string(),
                dim: HorizontalAxis::X,
                members: vec![a.clone(), b.clone()],
                reference: a,
                grid: BlockGrid { nx: 1, ny: 2 },
                output: output.clone(),
            })
            .unwrap_err();
        match err {
            crate::ExtractionError::ShapeMismatch {
                expected,
                actual,
                files,
                ..
            } => {
                // Rejected against the block, not the merged strip
                assert_eq!(expected, (4, 3));
                assert_eq!(actual, (4, 2));
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].0, b);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!output.exists());
    }

    #[test]
    fn test_scalar_is_placed_at_block_centre_for_2d_only() {
        let dir = tempfile::tempdir().unwrap();
        let run = LesRun::new("rico", 2, 2, 4, 4);
        let source = dir.path().join("block.nc");
        run.write_2d_block(&source, 1, 0);

        let extract = |kind: OutputKind, name: &str| {
            let output = dir.path().join(name);
            NativeBackend
                .extract_variable(&BlockExtraction {
                    source: source.clone(),
                    var_name: "lcl".to_string(),
                    tn: None,
                    kind,
                    output: output.clone(),
                })
                .unwrap();
            read_field(&output, "lcl").unwrap()
        };

        let lifted = extract(OutputKind::TwoD, "lcl_2d.nc");
        assert!(!lifted.is_horizontally_scalar());
        assert_eq!(lifted.len_of("xt"), Some(1));
        assert_eq!(lifted.len_of("yt"), Some(1));

        let kept = extract(OutputKind::ThreeD, "lcl_3d.nc");
        assert!(kept.is_horizontally_scalar());
        assert_eq!(kept.dims(), &["time"]);
    }
}
