//! Discovery of the block grid a run was written on.
//!
//! The number of blocks along each axis is not stored anywhere; it is implied
//! by which source files exist. Along x we count files matching the source
//! block name with `i` wildcarded and `j = 0`, along y the transpose.

use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ExtractionError, Result};
use crate::naming::Run;

/// Placeholder index substituted into the source name before wildcarding.
const PLACEHOLDER: usize = 9999;

/// Number of blocks along each horizontal axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct BlockGrid {
    pub nx: usize,
    pub ny: usize,
}

impl BlockGrid {
    /// All block indices, `i` outermost.
    pub fn blocks(self) -> impl Iterator<Item = (usize, usize)> {
        (0..self.nx).flat_map(move |i| (0..self.ny).map(move |j| (i, j)))
    }

    pub fn len(self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

/// Wildcard patterns (`?` matches one character) for blocks along x and y.
pub fn block_patterns(run: &Run) -> Result<(String, String)> {
    let wildcard = |i: usize, j: usize| -> Result<String> {
        let path = run.source_block(i, j)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().replace(&PLACEHOLDER.to_string(), "????"))
            .unwrap_or_default();
        Ok(run.source_path.join(name).to_string_lossy().into_owned())
    };
    Ok((wildcard(PLACEHOLDER, 0)?, wildcard(0, PLACEHOLDER)?))
}

/// Count the blocks of `run` along x and y.
///
/// The source directory is scanned on every call.
pub fn discover_grid(run: &Run) -> Result<BlockGrid> {
    let (x_pattern, y_pattern) = block_patterns(run)?;
    let nx = count_matches(&run.source_path, &x_pattern)?;
    let ny = count_matches(&run.source_path, &y_pattern)?;

    if nx == 0 || ny == 0 {
        return Err(ExtractionError::NoBlocksFound {
            x_pattern,
            y_pattern,
            nx,
            ny,
        });
    }

    debug!(
        prefix = %run.file_prefix,
        source = %run.source_path.display(),
        nx,
        ny,
        "Discovered block grid"
    );
    Ok(BlockGrid { nx, ny })
}

fn count_matches(dir: &Path, pattern: &str) -> Result<usize> {
    let name_pattern = Path::new(pattern)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !dir.is_dir() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            ExtractionError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            )
        })?;
        // Resolves symlinks, so a run directory of links to the real output counts.
        if !entry.path().is_file() {
            continue;
        }
        if wildcard_match(&name_pattern, &entry.file_name().to_string_lossy()) {
            count += 1;
        }
    }
    Ok(count)
}

/// Match `name` against `pattern`, where `?` matches exactly one character.
fn wildcard_match(pattern: &str, name: &str) -> bool {
    pattern.chars().count() == name.chars().count()
        && pattern
            .chars()
            .zip(name.chars())
            .all(|(p, c)| p == '?' || p == c)
}
