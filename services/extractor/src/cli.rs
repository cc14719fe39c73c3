//! Command-line arguments.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};

use extraction::{AggregationMode, ExtractRequest, ExtractorSettings, OutputKind, Run};

#[derive(Parser, Debug)]
#[command(name = "extractor")]
#[command(about = "Reassemble per-block UCLALES output into full-domain NetCDF files")]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Number of worker threads (default: available parallelism)
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// External tool program
    #[arg(long, global = true)]
    pub cdo: Option<String>,

    /// Log the external tool's output at debug instead of info
    #[arg(long, global = true)]
    pub quiet_tool: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract variables from one run
    Extract(ExtractArgs),

    /// Run the requests listed in a YAML job file
    Batch {
        /// Job file path
        file: PathBuf,
    },

    /// Describe the block grid and variables of a run
    Inventory(RunArgs),
}

/// Identity of a run on disk.
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// File prefix of the run, e.g. `rico`
    #[arg(long)]
    pub prefix: String,

    /// Directory holding the block files
    #[arg(long, default_value = ".")]
    pub source: PathBuf,

    /// Output kind: 3d or 2d
    #[arg(long, default_value = "3d", value_parser = parse_kind)]
    pub kind: OutputKind,

    /// Cross-section orientation (2D only), e.g. `xy`
    #[arg(long)]
    pub orientation: Option<String>,
}

impl RunArgs {
    pub fn run(&self) -> Result<Run> {
        let run = Run::new(&self.prefix, expand_path(&self.source), self.kind);
        match (self.kind, &self.orientation) {
            (OutputKind::TwoD, Some(orientation)) => Ok(run.with_orientation(orientation)),
            (OutputKind::TwoD, None) => bail!("--orientation is required for 2D output"),
            (OutputKind::ThreeD, _) => Ok(run),
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Variable to extract; may be repeated
    #[arg(long = "var", required = true)]
    pub vars: Vec<String>,

    /// Zero-based timestep (3D only); may be repeated
    #[arg(long = "tn")]
    pub timesteps: Vec<usize>,

    /// How the full domain is assembled: blocks, x_strips or y_strips
    #[arg(long, default_value = "y_strips", value_parser = parse_mode)]
    pub mode: AggregationMode,

    /// Use the in-process backend instead of the external tool
    #[arg(long)]
    pub native: bool,

    /// Destination directory
    #[arg(long, default_value = ".")]
    pub dest: PathBuf,
}

impl ExtractArgs {
    /// One request per variable, and for 3D per variable and timestep.
    pub fn requests(&self) -> Vec<ExtractRequest> {
        let timesteps: Vec<Option<usize>> = match self.run.kind {
            OutputKind::ThreeD if !self.timesteps.is_empty() => {
                self.timesteps.iter().copied().map(Some).collect()
            }
            _ => vec![None],
        };

        let mut requests = Vec::with_capacity(self.vars.len() * timesteps.len());
        for var in &self.vars {
            for tn in &timesteps {
                requests.push(ExtractRequest {
                    file_prefix: self.run.prefix.clone(),
                    source_path: expand_path(&self.run.source),
                    var_name: var.clone(),
                    kind: self.run.kind,
                    orientation: self.run.orientation.clone(),
                    tn: *tn,
                    mode: self.mode,
                    use_external_tool: !self.native,
                    dest_path: expand_path(&self.dest),
                });
            }
        }
        requests
    }
}

impl Args {
    /// Settings from the environment, overridden by flags.
    pub fn settings(&self) -> ExtractorSettings {
        let mut settings = ExtractorSettings::from_env();
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
        if let Some(cdo) = &self.cdo {
            settings.cdo_program = shellexpand::tilde(cdo).into_owned();
        }
        if self.quiet_tool {
            settings.forward_tool_output = false;
        }
        settings
    }
}

/// Expand a leading `~` in `path`.
pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

fn parse_kind(s: &str) -> Result<OutputKind, String> {
    s.parse().map_err(|e: extraction::ExtractionError| e.to_string())
}

fn parse_mode(s: &str) -> Result<AggregationMode, String> {
    s.parse().map_err(|e: extraction::ExtractionError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("extractor").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_extract_cartesian_product() {
        let args = parse(&[
            "extract", "--prefix", "rico", "--var", "w", "--var", "q", "--tn", "0", "--tn", "3",
        ]);
        let Command::Extract(extract) = args.command else {
            panic!("expected extract");
        };
        let requests = extract.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[1].var_name, "w");
        assert_eq!(requests[1].tn, Some(3));
        assert_eq!(requests[2].var_name, "q");
        assert!(requests.iter().all(|r| r.use_external_tool));
        assert!(requests.iter().all(|r| r.mode == AggregationMode::YStrips));
    }

    #[test]
    fn test_extract_2d_ignores_timesteps() {
        let args = parse(&[
            "extract", "--prefix", "rico", "--kind", "2d", "--orientation", "xy", "--var", "lwp",
            "--tn", "2", "--mode", "blocks", "--native",
        ]);
        let Command::Extract(extract) = args.command else {
            panic!("expected extract");
        };
        let requests = extract.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tn, None);
        assert_eq!(requests[0].kind, OutputKind::TwoD);
        assert_eq!(requests[0].mode, AggregationMode::Blocks);
        assert!(!requests[0].use_external_tool);
        assert!(requests[0].validate().is_ok());
    }

    #[test]
    fn test_3d_without_timestep_fails_validation() {
        let args = parse(&["extract", "--prefix", "rico", "--var", "w"]);
        let Command::Extract(extract) = args.command else {
            panic!("expected extract");
        };
        let requests = extract.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].validate().is_err());
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let result = Args::try_parse_from([
            "extractor", "extract", "--prefix", "rico", "--var", "w", "--mode", "diagonal",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_override_settings() {
        let args = parse(&["--workers", "3", "--cdo", "/opt/cdo", "--quiet-tool", "inventory", "--prefix", "rico"]);
        let settings = args.settings();
        assert_eq!(settings.workers, 3);
        assert_eq!(settings.cdo_program, "/opt/cdo");
        assert!(!settings.forward_tool_output);
    }

    #[test]
    fn test_inventory_2d_needs_orientation() {
        let args = parse(&["inventory", "--prefix", "rico", "--kind", "2d"]);
        let Command::Inventory(run) = args.command else {
            panic!("expected inventory");
        };
        assert!(run.run().is_err());
    }
}
