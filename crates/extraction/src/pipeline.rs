//! Pipeline entry point: from a request to a full-domain artifact.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::{AggregationMode, BackendKind, CdoBackend};
use crate::config::ExtractorSettings;
use crate::discovery::{discover_grid, BlockGrid};
use crate::error::{ExtractionError, Result};
use crate::executor::{ExecutionReport, Executor, ExecutorError, TaskGraph};
use crate::naming::{OutputKind, Run};
use crate::tasks::{AssembleDomain, Selection, Task};

fn current_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

/// One variable (and for 3D one timestep) to reassemble from a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub file_prefix: String,

    #[serde(default = "current_dir")]
    pub source_path: PathBuf,

    pub var_name: String,

    pub kind: OutputKind,

    /// Cross-section orientation, required for 2D.
    #[serde(default)]
    pub orientation: Option<String>,

    /// Zero-based timestep, required for 3D and ignored for 2D.
    #[serde(default)]
    pub tn: Option<usize>,

    #[serde(default)]
    pub mode: AggregationMode,

    #[serde(default = "default_true")]
    pub use_external_tool: bool,

    #[serde(default = "current_dir")]
    pub dest_path: PathBuf,
}

impl ExtractRequest {
    /// A 3D request for timestep `tn` with default paths and mode.
    pub fn three_d(file_prefix: impl Into<String>, var_name: impl Into<String>, tn: usize) -> Self {
        Self {
            file_prefix: file_prefix.into(),
            source_path: current_dir(),
            var_name: var_name.into(),
            kind: OutputKind::ThreeD,
            orientation: None,
            tn: Some(tn),
            mode: AggregationMode::default(),
            use_external_tool: true,
            dest_path: current_dir(),
        }
    }

    /// A 2D cross-section request with default paths and mode.
    pub fn two_d(
        file_prefix: impl Into<String>,
        var_name: impl Into<String>,
        orientation: impl Into<String>,
    ) -> Self {
        Self {
            kind: OutputKind::TwoD,
            orientation: Some(orientation.into()),
            tn: None,
            ..Self::three_d(file_prefix, var_name, 0)
        }
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = path.into();
        self
    }

    pub fn with_dest(mut self, path: impl Into<PathBuf>) -> Self {
        self.dest_path = path.into();
        self
    }

    pub fn with_mode(mut self, mode: AggregationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_external_tool(mut self, enabled: bool) -> Self {
        self.use_external_tool = enabled;
        self
    }

    /// Check the request without touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.mode == AggregationMode::Blocks && self.use_external_tool {
            return Err(ExtractionError::NotImplemented(
                "mode `blocks` is only supported without the external tool, use `x_strips` or `y_strips` or disable `use_external_tool`"
                    .to_string(),
            ));
        }
        if self.file_prefix.is_empty() {
            return Err(ExtractionError::Configuration(
                "`file_prefix` must not be empty".to_string(),
            ));
        }
        if self.var_name.is_empty() {
            return Err(ExtractionError::Configuration(
                "`var_name` must not be empty".to_string(),
            ));
        }
        match self.kind {
            OutputKind::ThreeD if self.tn.is_none() => Err(ExtractionError::Configuration(format!(
                "`tn` must be given for 3D output (extracting `{}` from `{}`)",
                self.var_name, self.file_prefix
            ))),
            OutputKind::TwoD if self.orientation.is_none() => {
                Err(ExtractionError::Configuration(format!(
                    "`orientation` must be given for 2D output (extracting `{}` from `{}`)",
                    self.var_name, self.file_prefix
                )))
            }
            _ => Ok(()),
        }
    }

    /// The run this request reads from.
    pub fn run(&self) -> Run {
        let run = Run::new(&self.file_prefix, &self.source_path, self.kind);
        match (self.kind, &self.orientation) {
            (OutputKind::TwoD, Some(orientation)) => run.with_orientation(orientation),
            _ => run,
        }
    }

    /// Timestep as used for naming and selection; 2D output keeps all time.
    pub fn timestep(&self) -> Option<usize> {
        match self.kind {
            OutputKind::ThreeD => self.tn,
            OutputKind::TwoD => None,
        }
    }
}

/// Outcome of a successful extraction.
#[derive(Debug)]
pub struct Extraction {
    /// Full-domain artifact of each request, in request order.
    pub outputs: Vec<PathBuf>,
    pub report: ExecutionReport<Task>,
}

impl Extraction {
    /// Artifact of a single-request extraction.
    pub fn output(&self) -> Option<&Path> {
        self.outputs.first().map(PathBuf::as_path)
    }
}

/// Turns requests into task graphs and runs them.
#[derive(Debug, Clone)]
pub struct Extractor {
    settings: ExtractorSettings,
    executor: Executor,
}

impl Extractor {
    pub fn new(settings: ExtractorSettings) -> Result<Self> {
        settings.validate().map_err(ExtractionError::Configuration)?;
        Ok(Self {
            executor: Executor::new(settings.workers),
            settings,
        })
    }

    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    /// Reassemble the variable described by `request`.
    pub fn extract(&self, request: &ExtractRequest) -> Result<Extraction> {
        self.extract_all(std::slice::from_ref(request))
    }

    /// Reassemble several requests as one task graph, so shared prerequisites
    /// run once.
    pub fn extract_all(&self, requests: &[ExtractRequest]) -> Result<Extraction> {
        for request in requests {
            request.validate()?;
        }

        let started = Instant::now();
        let roots = self.plan(requests)?;
        let outputs: Vec<PathBuf> = roots.iter().map(|root| root.output().to_path_buf()).collect();
        let roots: Vec<Task> = roots.into_iter().map(Task::Domain).collect();

        let graph = TaskGraph::build(&roots).map_err(from_executor)?;
        debug!(tasks = graph.len(), requests = requests.len(), "Task graph built");

        let report = self
            .executor
            .run(graph)
            .map_err(from_executor)?
            .into_result()
            .map_err(from_executor)?;

        info!(
            outputs = outputs.len(),
            executed = report.executed,
            skipped = report.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Extraction complete"
        );
        Ok(Extraction { outputs, report })
    }

    /// Root task of each request. The block grid is discovered once per run.
    fn plan(&self, requests: &[ExtractRequest]) -> Result<Vec<AssembleDomain>> {
        let mut grids: HashMap<Run, BlockGrid> = HashMap::new();
        let mut roots = Vec::with_capacity(requests.len());

        for request in requests {
            let run = request.run();
            let grid = match grids.get(&run) {
                Some(grid) => *grid,
                None => {
                    let grid = discover_grid(&run)?;
                    grids.insert(run.clone(), grid);
                    grid
                }
            };
            info!(
                prefix = %run.file_prefix,
                variable = %request.var_name,
                kind = %run.kind,
                mode = %request.mode,
                nx = grid.nx,
                ny = grid.ny,
                external = request.use_external_tool,
                "Planning extraction"
            );

            let selection = Selection {
                run,
                var_name: request.var_name.clone(),
                tn: request.timestep(),
                dest_path: request.dest_path.clone(),
                backend: self.backend_for(request),
            };
            roots.push(AssembleDomain::new(selection, request.mode, grid)?);
        }
        Ok(roots)
    }

    fn backend_for(&self, request: &ExtractRequest) -> BackendKind {
        if request.use_external_tool {
            BackendKind::External(CdoBackend::new(self.settings.cdo_tool()))
        } else {
            BackendKind::Native
        }
    }
}

impl Default for Extractor {
    fn default() -> Self {
        let settings = ExtractorSettings::default();
        Self {
            executor: Executor::new(settings.workers),
            settings,
        }
    }
}

/// Reassemble one request with settings taken from the environment and
/// return the full-domain artifact.
pub fn extract(request: &ExtractRequest) -> Result<PathBuf> {
    let extraction = Extractor::new(ExtractorSettings::from_env())?.extract(request)?;
    extraction
        .outputs
        .into_iter()
        .next()
        .ok_or_else(|| ExtractionError::Configuration("no output was planned".to_string()))
}

fn from_executor(err: ExecutorError<ExtractionError>) -> ExtractionError {
    match err {
        ExecutorError::Task { source, .. } => source,
        ExecutorError::WorkerPool(err) => ExtractionError::WorkerPool(err),
        other @ (ExecutorError::Cycle(_) | ExecutorError::Collision { .. }) => {
            ExtractionError::Configuration(other.to_string())
        }
    }
}
