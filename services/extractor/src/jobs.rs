//! YAML job files for the `batch` subcommand.
//!
//! ```yaml
//! workers: 8
//! cdo_program: ~/opt/cdo/bin/cdo
//! requests:
//!   - file_prefix: rico
//!     source_path: ${RUN_DIR}
//!     dest_path: ${RUN_DIR}/extracted
//!     var_name: w
//!     kind: 3d
//!     tn: 0
//!   - file_prefix: rico
//!     source_path: ${RUN_DIR}
//!     var_name: lwp
//!     kind: 2d
//!     orientation: xy
//!     use_external_tool: false
//! ```
//!
//! `${VAR}` and `~` are expanded before parsing.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use extraction::{ExtractRequest, ExtractorSettings};

use crate::cli::expand_path;

#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    #[serde(default)]
    pub workers: Option<usize>,

    #[serde(default)]
    pub cdo_program: Option<String>,

    pub requests: Vec<ExtractRequest>,
}

impl JobFile {
    /// Load a job file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read job file {:?}", path.as_ref()))?;
        Self::parse(&content).with_context(|| format!("Invalid job file {:?}", path.as_ref()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let expanded = shellexpand::full(content).context("Failed to expand variables")?;
        let mut job: JobFile = serde_yaml::from_str(&expanded).context("Failed to parse job YAML")?;

        if job.requests.is_empty() {
            bail!("job file lists no requests");
        }
        job.cdo_program = job
            .cdo_program
            .map(|program| shellexpand::tilde(&program).into_owned());
        for request in &mut job.requests {
            request.source_path = expand_path(&request.source_path);
            request.dest_path = expand_path(&request.dest_path);
        }
        Ok(job)
    }

    /// Apply the job's overrides on top of `settings`.
    pub fn apply(&self, settings: &mut ExtractorSettings) {
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
        if let Some(program) = &self.cdo_program {
            settings.cdo_program = program.clone();
        }
    }
}
