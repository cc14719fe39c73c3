//! Reassembly of per-block LES output into full-domain NetCDF fields.
//!
//! A UCLALES run writes one NetCDF file per horizontal block. This crate
//! extracts a single variable (and for 3D output a single timestep) from
//! every block and stitches the pieces back into one full-domain file.
//!
//! # Architecture
//!
//! Work is expressed as a graph of three task kinds ([`tasks`]): extracting
//! from one block, assembling a strip of blocks and assembling the domain.
//! Every task writes exactly one artifact at a path derived from its
//! parameters ([`naming`]) and is skipped when that artifact already exists,
//! so an interrupted extraction resumes where it stopped.
//!
//! Tasks delegate the actual array work to a [`backend::Backend`]: either
//! in-process through `block-netcdf`, or by driving the external `cdo` tool.
//! Both produce identical artifacts.
//!
//! ```ignore
//! use extraction::{ExtractRequest, Extractor, ExtractorSettings};
//!
//! let request = ExtractRequest::three_d("rico", "w", 0)
//!     .with_source("/data/rico")
//!     .with_dest("/data/rico/extracted")
//!     .with_external_tool(false);
//! let extraction = Extractor::new(ExtractorSettings::from_env())?.extract(&request)?;
//! ```

pub mod artifact;
pub mod backend;
pub mod cdo;
pub mod config;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod inventory;
pub mod naming;
pub mod pipeline;
pub mod tasks;
pub mod validate;

// Re-exports
pub use backend::{AggregationMode, Backend, BackendKind, CdoBackend, NativeBackend};
pub use cdo::CdoTool;
pub use config::ExtractorSettings;
pub use discovery::{discover_grid, BlockGrid};
pub use error::{ExternalToolError, ExtractionError, Result};
pub use executor::{ExecutionReport, Executor, GraphTask, TaskGraph, TaskState};
pub use inventory::{inventory, RunInventory};
pub use naming::{resolve, NameParams, OutputKind, Run, Stage};
pub use pipeline::{extract, ExtractRequest, Extraction, Extractor};
pub use tasks::Task;
