//! Horizontal mesh axes and the mapping from dimension names onto them.
//!
//! The LES writes cell-centre (`xt`, `yt`) and cell-face (`xm`, `ym`)
//! variants of each horizontal coordinate. Tools that rewrite files may also
//! emit bare `x`/`y`. All of these resolve to the same [`HorizontalAxis`].

use std::fmt;
use std::str::FromStr;

use crate::error::NetCdfError;

/// One of the two horizontal axes of the block grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HorizontalAxis {
    X,
    Y,
}

impl HorizontalAxis {
    pub const ALL: [HorizontalAxis; 2] = [HorizontalAxis::X, HorizontalAxis::Y];

    /// Resolve a dimension name (`xt`, `xm`, `x`, `yt`, ...) onto its axis.
    pub fn of_dimension(name: &str) -> Option<Self> {
        let base = name
            .strip_suffix('t')
            .or_else(|| name.strip_suffix('m'))
            .unwrap_or(name);
        match base {
            "x" => Some(Self::X),
            "y" => Some(Self::Y),
            _ => None,
        }
    }

    /// The other horizontal axis.
    pub fn ortho(self) -> Self {
        match self {
            Self::X => Self::Y,
            Self::Y => Self::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
        }
    }

    /// Name of the cell-centre dimension for this axis.
    pub fn centre_dimension(self) -> &'static str {
        match self {
            Self::X => "xt",
            Self::Y => "yt",
        }
    }
}

impl fmt::Display for HorizontalAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HorizontalAxis {
    type Err = NetCdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" => Ok(Self::X),
            "y" => Ok(Self::Y),
            other => Err(NetCdfError::InvalidFormat(format!(
                "`{}` is not a horizontal axis (expected `x` or `y`)",
                other
            ))),
        }
    }
}
