//! Service configuration
//!
//! Loaded from a JSON file, then overridden by `CR_REPORTER` and `CR_DEBUG`.

use crate::error::CrError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const REPORTER_ENV: &str = "CR_REPORTER";
pub const DEBUG_ENV: &str = "CR_DEBUG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrConfig {
    pub measure_report: MeasureReportConfig,
    pub evaluation: EvaluationConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureReportConfig {
    /// Organization reference stamped on care-gaps reports; required by `$care-gaps`
    pub reporter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Log every expression outcome at debug level
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Share translated libraries across requests
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl CrConfig {
    pub fn from_json(json: &str) -> Result<Self, CrError> {
        serde_json::from_str(json)
            .map_err(|e| CrError::Configuration(format!("Invalid configuration: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self, CrError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CrError::Configuration(format!(
                "Failed to read configuration {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    /// File configuration (or defaults) with environment overrides applied
    pub fn load(path: Option<&Path>) -> Result<Self, CrError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_overrides(
            std::env::var(REPORTER_ENV).ok(),
            std::env::var(DEBUG_ENV).ok(),
        )
    }

    /// Apply override values as read from the environment
    pub fn with_overrides(
        mut self,
        reporter: Option<String>,
        debug: Option<String>,
    ) -> Result<Self, CrError> {
        if let Some(reporter) = reporter.filter(|r| !r.trim().is_empty()) {
            self.measure_report.reporter = Some(reporter);
        }
        if let Some(debug) = debug {
            self.evaluation.debug = match debug.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(CrError::Configuration(format!(
                        "{} must be a boolean, found {}",
                        DEBUG_ENV, other
                    )));
                }
            };
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = CrConfig::from_json("{}").unwrap();
        assert_eq!(config, CrConfig::default());
        assert!(config.cache.enabled);
        assert!(!config.evaluation.debug);
        assert_eq!(config.measure_report.reporter, None);
    }

    #[rstest]
    #[case("true", true)]
    #[case("1", true)]
    #[case("off", false)]
    fn test_debug_override(#[case] value: &str, #[case] expected: bool) {
        let config = CrConfig::default()
            .with_overrides(None, Some(value.to_string()))
            .unwrap();
        assert_eq!(config.evaluation.debug, expected);
    }

    #[test]
    fn test_invalid_override() {
        let result = CrConfig::default().with_overrides(None, Some("sometimes".to_string()));
        assert!(matches!(result, Err(CrError::Configuration(_))));
    }
}
