//! The three kinds of extraction task and how they depend on each other.
//!
//! ```text
//! AssembleDomain(blocks)   -> ExtractVariable(i, j) for every block
//! AssembleDomain(x_strips) -> AssembleStrip(x, i) for every i, ExtractVariable(0, 0)
//! AssembleDomain(y_strips) -> AssembleStrip(y, j) for every j, ExtractVariable(0, 0)
//! AssembleStrip(x, i)      -> ExtractVariable(i, j) for every j, ExtractVariable(0, 0)
//! AssembleStrip(y, j)      -> ExtractVariable(i, j) for every i, ExtractVariable(0, 0)
//! ```
//!
//! Every task is identified by all of its parameters. Tasks are only built
//! through their constructors, which resolve the output path up front, so a
//! constructed task always has a valid artifact name.

use std::fmt;
use std::path::{Path, PathBuf};

use block_netcdf::HorizontalAxis;

use crate::backend::{AggregationMode, BackendKind, BlockExtraction, DomainAssembly, StripAssembly};
use crate::discovery::BlockGrid;
use crate::error::{ExtractionError, Result};
use crate::executor::GraphTask;
use crate::naming::{resolve, NameParams, OutputKind, Run, Stage};

/// What is being extracted from a run, and how.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selection {
    pub run: Run,
    pub var_name: String,
    /// Zero-based timestep, 3D only.
    pub tn: Option<usize>,
    pub dest_path: PathBuf,
    pub backend: BackendKind,
}

impl Selection {
    fn name_params(&self) -> NameParams {
        self.run
            .name_params()
            .dest(self.dest_path.clone())
            .var(self.var_name.clone())
            .tn(self.tn)
    }

    fn kind(&self) -> OutputKind {
        self.run.kind
    }
}

/// Extract the selection from block `(i, j)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtractVariable {
    selection: Selection,
    i: usize,
    j: usize,
    source: PathBuf,
    output: PathBuf,
}

impl ExtractVariable {
    pub fn new(selection: Selection, i: usize, j: usize) -> Result<Self> {
        let params = selection.name_params().block(i, j);
        let source = resolve(Stage::SourceBlock, selection.kind(), &params)?;
        let output = resolve(Stage::BlockVariable, selection.kind(), &params)?;
        Ok(Self {
            selection,
            i,
            j,
            source,
            output,
        })
    }

    pub fn block(&self) -> (usize, usize) {
        (self.i, self.j)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    fn run(&self) -> Result<()> {
        if !self.source.exists() {
            return Err(ExtractionError::MissingInput(self.source.clone()));
        }
        self.selection
            .backend
            .strategy()
            .extract_variable(&BlockExtraction {
                source: self.source.clone(),
                var_name: self.selection.var_name.clone(),
                tn: self.selection.tn,
                kind: self.selection.kind(),
                output: self.output.clone(),
            })
    }
}

/// Concatenate all blocks with block index `idx` along `dim`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssembleStrip {
    selection: Selection,
    dim: HorizontalAxis,
    idx: usize,
    grid: BlockGrid,
    members: Vec<ExtractVariable>,
    reference: ExtractVariable,
    output: PathBuf,
}

impl AssembleStrip {
    pub fn new(selection: Selection, dim: HorizontalAxis, idx: usize, grid: BlockGrid) -> Result<Self> {
        let blocks: Vec<(usize, usize)> = match dim {
            HorizontalAxis::X => (0..grid.ny).map(|j| (idx, j)).collect(),
            HorizontalAxis::Y => (0..grid.nx).map(|i| (i, idx)).collect(),
        };
        let members = blocks
            .into_iter()
            .map(|(i, j)| ExtractVariable::new(selection.clone(), i, j))
            .collect::<Result<Vec<_>>>()?;
        let reference = ExtractVariable::new(selection.clone(), 0, 0)?;
        let output = resolve(
            Stage::StripVariable,
            selection.kind(),
            &selection.name_params().strip(dim, idx),
        )?;
        Ok(Self {
            selection,
            dim,
            idx,
            grid,
            members,
            reference,
            output,
        })
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    fn run(&self) -> Result<()> {
        self.selection
            .backend
            .strategy()
            .assemble_strip(&StripAssembly {
                var_name: self.selection.var_name.clone(),
                dim: self.dim,
                members: self.members.iter().map(|m| m.output.clone()).collect(),
                reference: self.reference.output.clone(),
                grid: self.grid,
                output: self.output.clone(),
            })
    }
}

/// Put the full domain together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssembleDomain {
    selection: Selection,
    mode: AggregationMode,
    grid: BlockGrid,
    inputs: Vec<Task>,
    reference: ExtractVariable,
    output: PathBuf,
}

impl AssembleDomain {
    pub fn new(selection: Selection, mode: AggregationMode, grid: BlockGrid) -> Result<Self> {
        let inputs = match mode.strip_axis() {
            None => grid
                .blocks()
                .map(|(i, j)| ExtractVariable::new(selection.clone(), i, j).map(Task::Extract))
                .collect::<Result<Vec<_>>>()?,
            Some(dim) => {
                let count = match dim {
                    HorizontalAxis::X => grid.nx,
                    HorizontalAxis::Y => grid.ny,
                };
                (0..count)
                    .map(|idx| AssembleStrip::new(selection.clone(), dim, idx, grid).map(Task::Strip))
                    .collect::<Result<Vec<_>>>()?
            }
        };
        let reference = ExtractVariable::new(selection.clone(), 0, 0)?;
        let output = resolve(Stage::FullDomain, selection.kind(), &selection.name_params())?;
        Ok(Self {
            selection,
            mode,
            grid,
            inputs,
            reference,
            output,
        })
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    fn run(&self) -> Result<()> {
        self.selection
            .backend
            .strategy()
            .assemble_domain(&DomainAssembly {
                var_name: self.selection.var_name.clone(),
                mode: self.mode,
                inputs: self.inputs.iter().map(GraphTask::output).collect(),
                reference: self.reference.output.clone(),
                grid: self.grid,
                output: self.output.clone(),
            })
    }
}

/// Any extraction task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Task {
    Extract(ExtractVariable),
    Strip(AssembleStrip),
    Domain(AssembleDomain),
}

impl GraphTask for Task {
    type Error = ExtractionError;

    fn requires(&self) -> Vec<Self> {
        match self {
            Self::Extract(_) => Vec::new(),
            Self::Strip(strip) => std::iter::once(Task::Extract(strip.reference.clone()))
                .chain(strip.members.iter().cloned().map(Task::Extract))
                .collect(),
            Self::Domain(domain) => std::iter::once(Task::Extract(domain.reference.clone()))
                .chain(domain.inputs.iter().cloned())
                .collect(),
        }
    }

    fn output(&self) -> PathBuf {
        match self {
            Self::Extract(task) => task.output.clone(),
            Self::Strip(task) => task.output.clone(),
            Self::Domain(task) => task.output.clone(),
        }
    }

    fn run(&self) -> Result<()> {
        match self {
            Self::Extract(task) => task.run(),
            Self::Strip(task) => task.run(),
            Self::Domain(task) => task.run(),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, selection) = match self {
            Self::Extract(t) => ("ExtractVariable", &t.selection),
            Self::Strip(t) => ("AssembleStrip", &t.selection),
            Self::Domain(t) => ("AssembleDomain", &t.selection),
        };
        write!(
            f,
            "{}({}, {}",
            name, selection.run.file_prefix, selection.var_name
        )?;
        if let Some(tn) = selection.tn {
            write!(f, ", tn={}", tn)?;
        }
        match self {
            Self::Extract(t) => write!(f, ", block=({}, {})", t.i, t.j)?,
            Self::Strip(t) => write!(f, ", {}={}", t.dim, t.idx)?,
            Self::Domain(t) => write!(f, ", mode={}", t.mode)?,
        }
        write!(f, ", {})", selection.backend.strategy().name())
    }
}
