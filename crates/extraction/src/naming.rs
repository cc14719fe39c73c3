//! Canonical file names for every artifact of an extraction.
//!
//! Each artifact is identified by a stage and the output kind:
//!
//! | stage            | 3D                                      | 2D                                          |
//! |------------------|-----------------------------------------|---------------------------------------------|
//! | `source_block`   | `{prefix}.{i:04}{j:04}.nc`              | `{prefix}.out.{o}.{i:04}.{j:04}.nc`         |
//! | `block_variable` | `{prefix}.{i:04}{j:04}.{var}.tn{tn}.nc` | `{prefix}.out.{o}.{i:04}.{j:04}.{var}.nc`   |
//! | `strip_variable` | `{prefix}.{dim}.{idx:04}.{var}.tn{tn}.nc` | `{prefix}.out.{o}.{dim}.{idx:04}.{var}.nc` |
//! | `full_domain`    | `{prefix}.{var}.tn{tn}.nc`              | `{prefix}.out.{o}.{var}.nc`                 |
//!
//! Source blocks live in the run's source directory, intermediates under
//! `<dest>/partials/<kind>/` and the full-domain artifact directly in `<dest>`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use block_netcdf::HorizontalAxis;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractionError, Result};

/// Volumetric (3D) output or 2D cross-sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputKind {
    #[serde(rename = "3d")]
    ThreeD,
    #[serde(rename = "2d")]
    TwoD,
}

impl OutputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThreeD => "3d",
            Self::TwoD => "2d",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputKind {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "3d" => Ok(Self::ThreeD),
            "2d" => Ok(Self::TwoD),
            other => Err(ExtractionError::Configuration(format!(
                "unknown output kind `{}` (expected `3d` or `2d`)",
                other
            ))),
        }
    }
}

/// Pipeline stage an artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    SourceBlock,
    BlockVariable,
    StripVariable,
    FullDomain,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourceBlock => "source_block",
            Self::BlockVariable => "block_variable",
            Self::StripVariable => "strip_variable",
            Self::FullDomain => "full_domain",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values substituted into artifact names. Which ones are required depends
/// on the stage and kind being resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameParams {
    pub file_prefix: String,
    pub source_path: Option<PathBuf>,
    pub dest_path: Option<PathBuf>,
    pub i: Option<usize>,
    pub j: Option<usize>,
    pub var_name: Option<String>,
    pub tn: Option<usize>,
    pub orientation: Option<String>,
    pub dim: Option<HorizontalAxis>,
    pub idx: Option<usize>,
}

impl NameParams {
    pub fn new(file_prefix: impl Into<String>) -> Self {
        Self {
            file_prefix: file_prefix.into(),
            ..Self::default()
        }
    }

    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn dest(mut self, path: impl Into<PathBuf>) -> Self {
        self.dest_path = Some(path.into());
        self
    }

    pub fn block(mut self, i: usize, j: usize) -> Self {
        self.i = Some(i);
        self.j = Some(j);
        self
    }

    pub fn var(mut self, name: impl Into<String>) -> Self {
        self.var_name = Some(name.into());
        self
    }

    pub fn tn(mut self, tn: Option<usize>) -> Self {
        self.tn = tn;
        self
    }

    pub fn orientation(mut self, orientation: Option<String>) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn strip(mut self, dim: HorizontalAxis, idx: usize) -> Self {
        self.dim = Some(dim);
        self.idx = Some(idx);
        self
    }

    fn provided(&self) -> String {
        let mut names = vec!["file_prefix"];
        let optional = [
            ("source_path", self.source_path.is_some()),
            ("dest_path", self.dest_path.is_some()),
            ("i", self.i.is_some()),
            ("j", self.j.is_some()),
            ("var_name", self.var_name.is_some()),
            ("tn", self.tn.is_some()),
            ("orientation", self.orientation.is_some()),
            ("dim", self.dim.is_some()),
            ("idx", self.idx.is_some()),
        ];
        names.extend(optional.iter().filter(|(_, set)| *set).map(|(name, _)| *name));
        names.join(", ")
    }

    fn require<'a, T>(&self, value: Option<&'a T>, name: &str, stage: Stage) -> Result<&'a T>
    where
        T: ?Sized,
    {
        value.ok_or_else(|| {
            ExtractionError::Configuration(format!(
                "missing parameter `{}` for the `{}` name, the provided parameters are: {}",
                name,
                stage,
                self.provided()
            ))
        })
    }

    fn copied(&self, value: Option<usize>, name: &str, stage: Stage) -> Result<usize> {
        self.require(value.as_ref(), name, stage).copied()
    }
}

/// Identity of one simulation run's output on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Run {
    pub file_prefix: String,
    pub source_path: PathBuf,
    pub kind: OutputKind,
    /// Cross-section orientation, 2D only.
    pub orientation: Option<String>,
}

impl Run {
    pub fn new(file_prefix: impl Into<String>, source_path: impl Into<PathBuf>, kind: OutputKind) -> Self {
        Self {
            file_prefix: file_prefix.into(),
            source_path: source_path.into(),
            kind,
            orientation: None,
        }
    }

    pub fn with_orientation(mut self, orientation: impl Into<String>) -> Self {
        self.orientation = Some(orientation.into());
        self
    }

    /// Name parameters common to every artifact of this run.
    pub fn name_params(&self) -> NameParams {
        NameParams::new(self.file_prefix.clone())
            .source(self.source_path.clone())
            .orientation(self.orientation.clone())
    }

    /// Path of source block `(i, j)`.
    pub fn source_block(&self, i: usize, j: usize) -> Result<PathBuf> {
        resolve(Stage::SourceBlock, self.kind, &self.name_params().block(i, j))
    }
}

/// Directory holding the intermediates of `kind` under `dest`.
pub fn partials_dir(dest: &Path, kind: OutputKind) -> PathBuf {
    dest.join("partials").join(kind.as_str())
}

/// Resolve the canonical path of an artifact.
pub fn resolve(stage: Stage, kind: OutputKind, params: &NameParams) -> Result<PathBuf> {
    let prefix = &params.file_prefix;

    let name = match kind {
        OutputKind::ThreeD => {
            let tn = match stage {
                Stage::SourceBlock => None,
                _ => Some(params.tn.ok_or_else(|| {
                    ExtractionError::Configuration(format!(
                        "`tn` must be given for 3D output (resolving the `{}` name, the provided parameters are: {})",
                        stage,
                        params.provided()
                    ))
                })?),
            };
            match stage {
                Stage::SourceBlock => format!(
                    "{}.{:04}{:04}.nc",
                    prefix,
                    params.copied(params.i, "i", stage)?,
                    params.copied(params.j, "j", stage)?
                ),
                Stage::BlockVariable => format!(
                    "{}.{:04}{:04}.{}.tn{}.nc",
                    prefix,
                    params.copied(params.i, "i", stage)?,
                    params.copied(params.j, "j", stage)?,
                    params.require(params.var_name.as_deref(), "var_name", stage)?,
                    tn.unwrap_or_default()
                ),
                Stage::StripVariable => format!(
                    "{}.{}.{:04}.{}.tn{}.nc",
                    prefix,
                    params.require(params.dim.as_ref(), "dim", stage)?,
                    params.copied(params.idx, "idx", stage)?,
                    params.require(params.var_name.as_deref(), "var_name", stage)?,
                    tn.unwrap_or_default()
                ),
                Stage::FullDomain => format!(
                    "{}.{}.tn{}.nc",
                    prefix,
                    params.require(params.var_name.as_deref(), "var_name", stage)?,
                    tn.unwrap_or_default()
                ),
            }
        }
        OutputKind::TwoD => {
            let orientation = params.orientation.as_deref().ok_or_else(|| {
                ExtractionError::Configuration(format!(
                    "`orientation` must be given for 2D output (resolving the `{}` name, the provided parameters are: {})",
                    stage,
                    params.provided()
                ))
            })?;
            match stage {
                Stage::SourceBlock => format!(
                    "{}.out.{}.{:04}.{:04}.nc",
                    prefix,
                    orientation,
                    params.copied(params.i, "i", stage)?,
                    params.copied(params.j, "j", stage)?
                ),
                Stage::BlockVariable => format!(
                    "{}.out.{}.{:04}.{:04}.{}.nc",
                    prefix,
                    orientation,
                    params.copied(params.i, "i", stage)?,
                    params.copied(params.j, "j", stage)?,
                    params.require(params.var_name.as_deref(), "var_name", stage)?
                ),
                Stage::StripVariable => format!(
                    "{}.out.{}.{}.{:04}.{}.nc",
                    prefix,
                    orientation,
                    params.require(params.dim.as_ref(), "dim", stage)?,
                    params.copied(params.idx, "idx", stage)?,
                    params.require(params.var_name.as_deref(), "var_name", stage)?
                ),
                Stage::FullDomain => format!(
                    "{}.out.{}.{}.nc",
                    prefix,
                    orientation,
                    params.require(params.var_name.as_deref(), "var_name", stage)?
                ),
            }
        }
    };

    let dir = match stage {
        Stage::SourceBlock => params
            .require(params.source_path.as_ref(), "source_path", stage)?
            .clone(),
        Stage::BlockVariable | Stage::StripVariable => partials_dir(
            params.require(params.dest_path.as_ref(), "dest_path", stage)?,
            kind,
        ),
        Stage::FullDomain => params
            .require(params.dest_path.as_ref(), "dest_path", stage)?
            .clone(),
    };

    Ok(dir.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> NameParams {
        NameParams::new("rico").source("/src").dest("/out")
    }

    #[test]
    fn test_3d_names() {
        let p = params().block(1, 12).var("w").tn(Some(3));
        assert_eq!(
            resolve(Stage::SourceBlock, OutputKind::ThreeD, &p).unwrap(),
            PathBuf::from("/src/rico.00010012.nc")
        );
        assert_eq!(
            resolve(Stage::BlockVariable, OutputKind::ThreeD, &p).unwrap(),
            PathBuf::from("/out/partials/3d/rico.00010012.w.tn3.nc")
        );
        assert_eq!(
            resolve(Stage::FullDomain, OutputKind::ThreeD, &p).unwrap(),
            PathBuf::from("/out/rico.w.tn3.nc")
        );

        let strip = p.strip(HorizontalAxis::X, 2);
        assert_eq!(
            resolve(Stage::StripVariable, OutputKind::ThreeD, &strip).unwrap(),
            PathBuf::from("/out/partials/3d/rico.x.0002.w.tn3.nc")
        );
    }

    #[test]
    fn test_2d_names() {
        let p = params()
            .block(0, 3)
            .var("lwp")
            .orientation(Some("xy".to_string()));
        assert_eq!(
            resolve(Stage::SourceBlock, OutputKind::TwoD, &p).unwrap(),
            PathBuf::from("/src/rico.out.xy.0000.0003.nc")
        );
        assert_eq!(
            resolve(Stage::BlockVariable, OutputKind::TwoD, &p).unwrap(),
            PathBuf::from("/out/partials/2d/rico.out.xy.0000.0003.lwp.nc")
        );
        assert_eq!(
            resolve(Stage::StripVariable, OutputKind::TwoD, &p.clone().strip(HorizontalAxis::Y, 1)).unwrap(),
            PathBuf::from("/out/partials/2d/rico.out.xy.y.0001.lwp.nc")
        );
        assert_eq!(
            resolve(Stage::FullDomain, OutputKind::TwoD, &p).unwrap(),
            PathBuf::from("/out/rico.out.xy.lwp.nc")
        );
    }

    #[test]
    fn test_source_block_does_not_need_tn() {
        let p = params().block(0, 0);
        assert!(resolve(Stage::SourceBlock, OutputKind::ThreeD, &p).is_ok());
    }

    #[test]
    fn test_missing_tn_is_configuration_error() {
        let p = params().block(0, 0).var("w");
        let err = resolve(Stage::BlockVariable, OutputKind::ThreeD, &p).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, ExtractionError::Configuration(_)));
        assert!(message.contains("`tn` must be given for 3D output"));
        assert!(message.contains("file_prefix, source_path, dest_path, i, j, var_name"));
    }

    #[test]
    fn test_missing_orientation_is_configuration_error() {
        let p = params().block(0, 0);
        let err = resolve(Stage::SourceBlock, OutputKind::TwoD, &p).unwrap_err();
        assert!(err
            .to_string()
            .contains("`orientation` must be given for 2D output"));
    }

    #[test]
    fn test_missing_parameter_is_named() {
        let p = params().var("w").tn(Some(0));
        let err = resolve(Stage::StripVariable, OutputKind::ThreeD, &p).unwrap_err();
        assert!(err.to_string().contains("missing parameter `dim`"));
    }

    #[test]
    fn test_run_source_block() {
        let run = Run::new("rico", "/src", OutputKind::TwoD).with_orientation("xz");
        assert_eq!(
            run.source_block(2, 1).unwrap(),
            PathBuf::from("/src/rico.out.xz.0002.0001.nc")
        );
        assert!(Run::new("rico", "/src", OutputKind::TwoD).source_block(0, 0).is_err());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("3D".parse::<OutputKind>().unwrap(), OutputKind::ThreeD);
        assert!("4d".parse::<OutputKind>().is_err());
        let kind: OutputKind = serde_json::from_str("\"2d\"").unwrap();
        assert_eq!(kind, OutputKind::TwoD);
    }
}
