//! Backend that drives the external `cdo` tool.

use std::path::PathBuf;

use block_netcdf::{read_field, read_shape, write_field, BlockFile, FieldShape, HorizontalAxis};
use tracing::{debug, warn};

use super::native::lift_to_block_centre;
use super::{Backend, BlockExtraction, DomainAssembly, StripAssembly};
use crate::artifact::StagedArtifact;
use crate::cdo::{concat_args, select_args, CdoTool};
use crate::error::{ExtractionError, Result};
use crate::naming::OutputKind;
use crate::validate::{
    check_assembled, check_dimension_order, check_members, dimension_order_error, domain_extent, extent_of,
    strip_extent,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CdoBackend {
    tool: CdoTool,
}

impl CdoBackend {
    pub fn new(tool: CdoTool) -> Self {
        Self { tool }
    }

    pub fn tool(&self) -> &CdoTool {
        &self.tool
    }

    /// Bring a merged output into the reference block's dimension order and
    /// validate it; an invalid one is removed before the error is returned.
    fn finish(
        &self,
        staged: StagedArtifact,
        var_name: &str,
        reference: &FieldShape,
        expected: (usize, usize),
        detail: &str,
        inputs: &[PathBuf],
    ) -> Result<()> {
        let checked = restore_dimension_order(&staged, var_name, reference).and_then(|()| {
            let shape = read_shape(staged.path(), var_name)?;
            check_dimension_order(&shape, staged.target(), reference)?;
            check_assembled(&shape, staged.target(), expected, detail, inputs, var_name)
        });

        if let Err(err) = checked {
            warn!(
                path = %staged.target().display(),
                error = %err,
                "Removing invalid output of external tool"
            );
            staged.discard()?;
            return Err(err);
        }
        staged.persist()?;
        Ok(())
    }
}

/// The tool may reorder dimensions; transpose back when the dimensions are
/// the reference's in another order.
fn restore_dimension_order(staged: &StagedArtifact, var_name: &str, reference: &FieldShape) -> Result<()> {
    let merged = read_shape(staged.path(), var_name)?;
    if merged.dim_names() == reference.dim_names() {
        return Ok(());
    }
    debug!(from = %merged, to = %reference, "Restoring reference dimension order");
    let field = read_field(staged.path(), var_name)?
        .transpose(reference.dim_names().as_slice())
        .map_err(|_| dimension_order_error(&merged, staged.target(), reference))?;
    write_field(&field, staged.path())?;
    Ok(())
}

impl Backend for CdoBackend {
    fn name(&self) -> &'static str {
        "cdo"
    }

    fn extract_variable(&self, request: &BlockExtraction) -> Result<()> {
        // Read the header first so a missing variable is reported the same way
        // as by the native backend.
        let source_shape = read_shape(&request.source, &request.var_name)?;

        let staged = StagedArtifact::new(&request.output)?;
        self.tool.run(&select_args(
            &request.var_name,
            request.tn,
            &request.source,
            staged.path(),
        ))?;

        let scalar = HorizontalAxis::ALL
            .iter()
            .all(|axis| source_shape.dimension_for(*axis).is_none());
        if scalar && request.kind == OutputKind::TwoD {
            let block = BlockFile::open(&request.source)?;
            let field = read_field(staged.path(), &request.var_name)?;
            let lifted = lift_to_block_centre(&block, &field)?;
            write_field(&lifted, staged.path())?;
        }

        staged.persist()?;
        Ok(())
    }

    fn assemble_strip(&self, request: &StripAssembly) -> Result<()> {
        let var = &request.var_name;
        let (reference, block) = extent_of(&request.reference, var)?;
        let expected = strip_extent(block, request.dim, request.grid);
        check_members(
            &request.members,
            var,
            block,
            &HorizontalAxis::ALL,
            "strip member does not match the reference block",
        )?;

        let operator = self.tool.concat_operator()?;
        let staged = StagedArtifact::new(&request.output)?;
        self.tool.run(&concat_args(
            operator,
            request.dim == HorizontalAxis::X,
            &request.members,
            staged.path(),
        ))?;

        self.finish(
            staged,
            var,
            &reference,
            expected,
            "assembled strip has the wrong horizontal extent",
            &request.members,
        )
    }

    fn assemble_domain(&self, request: &DomainAssembly) -> Result<()> {
        let Some(dim) = request.mode.strip_axis() else {
            return Err(ExtractionError::NotImplemented(
                "merging blocks directly is only supported by the native backend, use x_strips or y_strips with the external tool"
                    .to_string(),
            ));
        };

        let var = &request.var_name;
        let (reference, block) = extent_of(&request.reference, var)?;
        let expected = domain_extent(block, request.grid);
        check_members(
            &request.inputs,
            var,
            strip_extent(block, dim, request.grid),
            &HorizontalAxis::ALL,
            "strip has the wrong horizontal extent",
        )?;

        let operator = self.tool.concat_operator()?;
        let staged = StagedArtifact::new(&request.output)?;
        self.tool.run(&concat_args(
            operator,
            dim == HorizontalAxis::Y,
            &request.inputs,
            staged.path(),
        ))?;

        self.finish(
            staged,
            var,
            &reference,
            expected,
            "full domain has the wrong horizontal extent",
            &request.inputs,
        )
    }
}
