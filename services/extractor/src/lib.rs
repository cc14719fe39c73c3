//! Command-line front end for the `extraction` crate.
//!
//! Exposes argument parsing, job files and logging setup so they can be
//! tested without spawning the binary.

pub mod cli;
pub mod jobs;
pub mod logging;

pub use cli::{Args, Command, ExtractArgs, LogFormat, RunArgs};
pub use jobs::JobFile;
