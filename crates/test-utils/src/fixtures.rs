//! Common test fixtures: fake external tools and canned run identities.

use std::path::{Path, PathBuf};

/// Run prefixes used across the test suite.
pub mod runs {
    /// Prefix of the default synthetic run
    pub const PREFIX: &str = "rico";

    /// Orientation of the 2D cross-section files
    pub const ORIENTATION: &str = "xy";
}

/// Shell bodies for fake external tools.
///
/// Each is the body of a `/bin/sh` script; `$@` is the argument list the
/// tool was invoked with.
pub mod scripts {
    /// Succeeds, printing progress lines on stdout.
    pub const CHATTY: &str = "echo \"processing $1\"\necho \"done\"\nexit 0";

    /// Prints bytes that are not UTF-8, then fails.
    pub const BINARY_OUTPUT_FAILS: &str = "printf 'grid \\377\\376\\n'\necho \"cdo: bad stream\" >&2\nexit 3";

    /// Fails with a plain nonzero exit code and an error message on stderr.
    pub const FAILS: &str = "echo \"cdo: something went wrong\" >&2\nexit 3";

    /// Dies from a segmentation fault.
    pub const SEGFAULT: &str = "echo \"about to crash\" >&2\nkill -SEGV $$";

    /// Reports every operator as unknown, like a tool built without them.
    pub const NO_OPERATORS: &str =
        "echo \"cdo (Abort): Operator >$1< not found!\" >&2\nexit 1";

    /// Knows `collgrid` but not `gather`.
    pub const COLLGRID_ONLY: &str = "case \"$1\" in\n  gather) echo \"cdo (Abort): Operator >gather< not found!\" >&2; exit 1 ;;\n  *) echo \"cdo    $1 (Abort): Too few streams specified!\" >&2; exit 1 ;;\nesac";

    /// Knows every operator.
    pub const ALL_OPERATORS: &str =
        "echo \"cdo    $1 (Abort): Too few streams specified!\" >&2\nexit 1";

    /// Knows every operator, but "concatenates" by copying its first input.
    pub const COPIES_FIRST_INPUT: &str = "if [ $# -lt 3 ]; then echo \"cdo    $1 (Abort): Too few streams specified!\" >&2; exit 1; fi\nfor last; do :; done\ncp \"$2\" \"$last\"";
}

/// Writes an executable `/bin/sh` script called `name` into `dir`.
#[cfg(unix)]
pub fn write_fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write fake tool");
    let mut permissions = std::fs::metadata(&path)
        .expect("Failed to stat fake tool")
        .permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).expect("Failed to make fake tool executable");
    path
}
