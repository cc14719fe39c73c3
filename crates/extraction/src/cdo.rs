//! Invocation of the external `cdo` command-line tool.
//!
//! Every call streams the tool's stdout into the log as it arrives and keeps
//! stderr for the error report. Exits caused by fatal signals are annotated,
//! since those point at the environment (HDF5 builds, thread safety of the
//! NetCDF library) rather than at the request.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ExternalToolError;

/// Concatenation operators in order of preference. Older releases only ship
/// `collgrid`; newer ones also have `gather`.
pub const CONCAT_OPERATORS: [&str; 2] = ["gather", "collgrid"];

// ============================================================================
// Capability cache
// ============================================================================

/// Probe results, keyed by (program, operator). Lives for the whole process.
static OPERATOR_CACHE: Lazy<RwLock<HashMap<(PathBuf, String), bool>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Handle on one installation of the tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CdoTool {
    program: PathBuf,
    /// Forward stdout lines at `info` rather than `debug`.
    forward_output: bool,
}

impl Default for CdoTool {
    fn default() -> Self {
        Self::new("cdo")
    }
}

impl CdoTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            forward_output: true,
        }
    }

    pub fn with_output_forwarding(mut self, forward: bool) -> Self {
        self.forward_output = forward;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the tool with `args`, streaming stdout to the log.
    pub fn run<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<(), ExternalToolError> {
        let command = self.command_line(args);
        info!(command = %command, "Running external tool");

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(&command, e))?;

        // Drain stderr on its own thread so neither pipe can fill up and stall the tool.
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        // A failed read still waits for the child and the stderr thread.
        let mut read_error = None;
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).split(b'\n') {
                match line {
                    Ok(line) => self.forward_line(&String::from_utf8_lossy(&line)),
                    Err(e) => {
                        read_error = Some(e);
                        break;
                    }
                }
            }
        }

        let status = child.wait().map_err(|e| ExternalToolError::Spawn {
            command: command.clone(),
            source: e,
        })?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        if let Some(e) = read_error {
            return Err(ExternalToolError::Spawn { command, source: e });
        }

        if !status.success() {
            let exit_code = exit_code(status);
            let signal = signal_annotation(exit_code);
            if let Some(annotation) = &signal {
                warn!(command = %command, exit_code, "External tool died: {}", annotation);
            }
            return Err(ExternalToolError::Failed {
                command,
                exit_code,
                stderr: stderr.trim_end().to_string(),
                signal,
            });
        }

        if !stderr.trim().is_empty() {
            debug!(target: "extraction::cdo", stderr = %stderr.trim_end(), "External tool diagnostics");
        }
        Ok(())
    }

    /// Whether this installation knows `operator`.
    ///
    /// The answer is memoized for the life of the process. A missing program
    /// is an error, not an unsupported operator.
    pub fn has_operator(&self, operator: &str) -> Result<bool, ExternalToolError> {
        let key = (self.program.clone(), operator.to_string());
        {
            let cache = OPERATOR_CACHE.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(known) = cache.get(&key) {
                return Ok(*known);
            }
        }

        let command = self.command_line(&[operator]);
        let output = Command::new(&self.program)
            .arg(operator)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(&command, e))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let supported = !(text.contains(&format!(">{}<", operator)) && text.contains("not found"));
        debug!(program = %self.program.display(), operator, supported, "Probed external tool");

        let mut cache = OPERATOR_CACHE.write().unwrap_or_else(PoisonError::into_inner);
        Ok(*cache.entry(key).or_insert(supported))
    }

    /// The preferred concatenation operator this installation supports.
    pub fn concat_operator(&self) -> Result<&'static str, ExternalToolError> {
        for operator in CONCAT_OPERATORS {
            if self.has_operator(operator)? {
                return Ok(operator);
            }
        }
        Err(ExternalToolError::UnsupportedOperator {
            program: self.program.clone(),
            operators: CONCAT_OPERATORS.iter().map(|op| op.to_string()).collect(),
        })
    }

    fn forward_line(&self, line: &str) {
        let line = line.trim_end_matches('\r');
        if self.forward_output {
            info!(target: "extraction::cdo", "{}", line);
        } else {
            debug!(target: "extraction::cdo", "{}", line);
        }
    }

    fn command_line<S: AsRef<OsStr>>(&self, args: &[S]) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(args.iter().map(|a| a.as_ref().to_string_lossy().into_owned()));
        parts.join(" ")
    }

    fn spawn_error(&self, command: &str, err: std::io::Error) -> ExternalToolError {
        if err.kind() == std::io::ErrorKind::NotFound {
            ExternalToolError::ToolNotFound(self.program.clone())
        } else {
            ExternalToolError::Spawn {
                command: command.to_string(),
                source: err,
            }
        }
    }
}

/// Arguments selecting one variable (and for 3D output one timestep) from `input`.
///
/// `tn` is zero-based; the tool counts timesteps from one. Chained selection
/// against NetCDF-4 input is not thread safe in the tool, so 3D selection runs
/// with `-L` (serialised library access).
pub fn select_args(var_name: &str, tn: Option<usize>, input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(5);
    match tn {
        Some(tn) => {
            args.push("-L".into());
            args.push(format!("selname,{}", var_name).into());
            args.push(format!("-seltimestep,{}", tn + 1).into());
        }
        None => args.push(format!("selname,{}", var_name).into()),
    }
    args.push(input.into());
    args.push(output.into());
    args
}

/// Arguments concatenating `inputs` into `output` with a gather/collect operator.
///
/// `keep_ortho` appends `,1`, which stops the tool from collapsing the other
/// horizontal dimension.
pub fn concat_args<P: AsRef<Path>>(operator: &str, keep_ortho: bool, inputs: &[P], output: &Path) -> Vec<OsString> {
    let operator = if keep_ortho {
        format!("{},1", operator)
    } else {
        operator.to_string()
    };
    std::iter::once(OsString::from(operator))
        .chain(inputs.iter().map(|p| p.as_ref().as_os_str().to_os_string()))
        .chain(std::iter::once(output.as_os_str().to_os_string()))
        .collect()
}

/// Exit code as a shell would report it; death by signal `N` is `-N`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// Describe exits that correspond to a fatal signal.
///
/// Both direct deaths (`-N`) and shell-reported ones (`128 + N`) are recognised.
pub fn signal_annotation(exit_code: i32) -> Option<String> {
    let signal = if exit_code < 0 {
        -exit_code
    } else if exit_code > 128 && exit_code < 128 + 64 {
        exit_code - 128
    } else {
        return None;
    };
    fatal_signal_name(signal).map(str::to_string)
}

#[cfg(unix)]
fn fatal_signal_name(signal: i32) -> Option<&'static str> {
    match signal {
        libc::SIGSEGV => Some("the utility segfaulted"),
        libc::SIGBUS => Some("the utility hit a bus error"),
        libc::SIGABRT => Some("the utility aborted"),
        libc::SIGILL => Some("the utility executed an illegal instruction"),
        libc::SIGFPE => Some("the utility hit a floating point exception"),
        libc::SIGKILL => Some("the utility was killed"),
        _ => None,
    }
}

#[cfg(not(unix))]
fn fatal_signal_name(_signal: i32) -> Option<&'static str> {
    None
}
