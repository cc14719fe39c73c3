//! The two interchangeable ways of producing artifacts.
//!
//! [`NativeBackend`] works in-process on [`block_netcdf::Field`]s;
//! [`CdoBackend`] drives the external `cdo` tool. Both produce the same
//! artifacts: identical dimension order and values, validated the same way.

mod external;
mod native;

use std::path::PathBuf;

use block_netcdf::HorizontalAxis;
use serde::{Deserialize, Serialize};

pub use external::CdoBackend;
pub use native::NativeBackend;

use crate::discovery::BlockGrid;
use crate::error::Result;
use crate::naming::OutputKind;

/// Name of the time dimension in LES output.
pub const TIME_DIM: &str = "time";

/// How the full domain is put together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Merge every block directly.
    Blocks,
    /// Concatenate strips of fixed `i` along x.
    XStrips,
    /// Concatenate strips of fixed `j` along y.
    #[default]
    YStrips,
}

impl AggregationMode {
    /// The strip axis, `None` in blocks mode.
    pub fn strip_axis(self) -> Option<HorizontalAxis> {
        match self {
            Self::Blocks => None,
            Self::XStrips => Some(HorizontalAxis::X),
            Self::YStrips => Some(HorizontalAxis::Y),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::XStrips => "x_strips",
            Self::YStrips => "y_strips",
        }
    }
}

impl std::fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AggregationMode {
    type Err = crate::error::ExtractionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "blocks" => Ok(Self::Blocks),
            "x_strips" => Ok(Self::XStrips),
            "y_strips" => Ok(Self::YStrips),
            other => Err(crate::error::ExtractionError::Configuration(format!(
                "unknown aggregation mode `{}` (expected `blocks`, `x_strips` or `y_strips`)",
                other
            ))),
        }
    }
}

/// Extract one variable (and for 3D one timestep) from one source block.
#[derive(Debug, Clone)]
pub struct BlockExtraction {
    pub source: PathBuf,
    pub var_name: String,
    pub tn: Option<usize>,
    /// Per-block scalars are placed at the block centre for 2D output only.
    pub kind: OutputKind,
    pub output: PathBuf,
}

/// Concatenate the block artifacts of one strip.
#[derive(Debug, Clone)]
pub struct StripAssembly {
    pub var_name: String,
    /// Axis whose block index is fixed; members vary along the other one.
    pub dim: HorizontalAxis,
    /// Block artifacts in order along the varying axis.
    pub members: Vec<PathBuf>,
    /// Block `(0, 0)` artifact, the shape reference.
    pub reference: PathBuf,
    pub grid: BlockGrid,
    pub output: PathBuf,
}

/// Put the full domain together from blocks or strips.
#[derive(Debug, Clone)]
pub struct DomainAssembly {
    pub var_name: String,
    pub mode: AggregationMode,
    /// Block artifacts (blocks mode) or strip artifacts in index order.
    pub inputs: Vec<PathBuf>,
    /// Block `(0, 0)` artifact, the shape and dimension-order reference.
    pub reference: PathBuf,
    pub grid: BlockGrid,
    pub output: PathBuf,
}

/// One strategy for producing artifacts.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract_variable(&self, request: &BlockExtraction) -> Result<()>;

    fn assemble_strip(&self, request: &StripAssembly) -> Result<()>;

    fn assemble_domain(&self, request: &DomainAssembly) -> Result<()>;
}

/// The backend chosen for a request; part of every task's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Native,
    External(CdoBackend),
}

static NATIVE: NativeBackend = NativeBackend;

impl BackendKind {
    pub fn strategy(&self) -> &dyn Backend {
        match self {
            Self::Native => &NATIVE,
            Self::External(backend) => backend,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }
}
