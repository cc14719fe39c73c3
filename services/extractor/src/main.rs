//! LES block extractor.
//!
//! Reassembles per-block UCLALES NetCDF output into full-domain files.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use extraction::{inventory, ExtractRequest, Extractor, ExtractorSettings};
use extractor::{logging, Args, Command, JobFile};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init_tracing(&args.log_level, args.log_format)?;

    let mut settings = args.settings();

    match &args.command {
        Command::Extract(extract) => run_requests(settings, &extract.requests()),
        Command::Batch { file } => {
            let job = JobFile::load(file)?;
            job.apply(&mut settings);
            info!(file = %file.display(), requests = job.requests.len(), "Loaded job file");
            run_requests(settings, &job.requests)
        }
        Command::Inventory(run) => {
            let inventory = inventory(&run.run()?)?;
            println!("{}", serde_json::to_string_pretty(&inventory)?);
            Ok(())
        }
    }
}

fn run_requests(settings: ExtractorSettings, requests: &[ExtractRequest]) -> Result<()> {
    info!(
        workers = settings.workers,
        cdo = %settings.cdo_program,
        requests = requests.len(),
        "Starting extraction"
    );
    let extractor = Extractor::new(settings)?;
    let extraction = extractor
        .extract_all(requests)
        .context("Extraction failed")?;

    for output in &extraction.outputs {
        println!("{}", output.display());
    }
    Ok(())
}
