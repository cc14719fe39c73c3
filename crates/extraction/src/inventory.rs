//! Summary of what a run directory contains.

use std::path::PathBuf;

use block_netcdf::BlockFile;
use serde::Serialize;
use tracing::warn;

use crate::discovery::{discover_grid, BlockGrid};
use crate::error::Result;
use crate::naming::{OutputKind, Run};

#[derive(Debug, Clone, Serialize)]
pub struct RunInventory {
    pub file_prefix: String,
    pub kind: OutputKind,
    pub grid: BlockGrid,
    /// Source files implied by the grid that do not exist.
    pub missing_blocks: Vec<PathBuf>,
    /// Data variables of block `(0, 0)`.
    pub variables: Vec<String>,
    /// Horizontal extent of one block, from the first gridded variable.
    pub block_extent: Option<(usize, usize)>,
}

impl RunInventory {
    pub fn is_complete(&self) -> bool {
        self.missing_blocks.is_empty()
    }
}

/// Discover the block grid of `run` and describe its reference block.
pub fn inventory(run: &Run) -> Result<RunInventory> {
    let grid = discover_grid(run)?;

    let mut missing_blocks = Vec::new();
    for (i, j) in grid.blocks() {
        let path = run.source_block(i, j)?;
        if !path.exists() {
            missing_blocks.push(path);
        }
    }
    if !missing_blocks.is_empty() {
        warn!(
            prefix = %run.file_prefix,
            missing = missing_blocks.len(),
            "Run has gaps in its block grid"
        );
    }

    let reference = BlockFile::open(run.source_block(0, 0)?)?;
    let variables = reference.data_variable_names();
    let block_extent = variables.iter().find_map(|name| {
        reference
            .shape_of(name)
            .ok()
            .and_then(|shape| shape.horizontal_extent().ok())
    });

    Ok(RunInventory {
        file_prefix: run.file_prefix.clone(),
        kind: run.kind,
        grid,
        missing_blocks,
        variables,
        block_extent,
    })
}
