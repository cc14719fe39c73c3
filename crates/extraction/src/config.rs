//! Process-level settings for the extractor.

use serde::{Deserialize, Serialize};

use crate::cdo::CdoTool;

/// Settings shared by every request an [`crate::Extractor`] runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorSettings {
    /// Number of worker threads tasks are scheduled on.
    pub workers: usize,

    /// External tool program, looked up on `PATH` unless it contains a separator.
    pub cdo_program: String,

    /// Forward the external tool's stdout to the log as it arrives.
    pub forward_tool_output: bool,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            cdo_program: "cdo".to_string(),
            forward_tool_output: true,
        }
    }
}

impl ExtractorSettings {
    /// Load settings from environment variables.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(val) = std::env::var("EXTRACT_WORKERS") {
            if let Ok(workers) = val.parse() {
                settings.workers = workers;
            }
        }

        if let Ok(val) = std::env::var("CDO_BIN") {
            settings.cdo_program = val;
        }

        if let Ok(val) = std::env::var("EXTRACT_TOOL_OUTPUT") {
            settings.forward_tool_output = val.to_lowercase() == "true" || val == "1";
        }

        settings
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be > 0".to_string());
        }

        if self.cdo_program.trim().is_empty() {
            return Err("cdo_program must not be empty".to_string());
        }

        Ok(())
    }

    /// The external tool as configured.
    pub fn cdo_tool(&self) -> CdoTool {
        CdoTool::new(&self.cdo_program).with_output_forwarding(self.forward_tool_output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = ExtractorSettings::default();
        assert!(settings.workers > 0);
        assert_eq!(settings.cdo_program, "cdo");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let mut settings = ExtractorSettings {
            workers: 0,
            ..Default::default()
        };
        assert!(settings.validate().unwrap_err().contains("workers"));

        settings.workers = 2;
        settings.cdo_program = "  ".to_string();
        assert!(settings.validate().unwrap_err().contains("cdo_program"));
    }

    #[test]
    fn test_cdo_tool() {
        let settings = ExtractorSettings {
            workers: 1,
            cdo_program: "/opt/cdo/bin/cdo".to_string(),
            forward_tool_output: false,
        };
        let tool = settings.cdo_tool();
        assert_eq!(tool.program(), std::path::Path::new("/opt/cdo/bin/cdo"));
    }
}
