//! Options shared by every subcommand: data files, configuration and output

use super::output::{self, OutputFormat};
use crate::config::CrConfig;
use crate::service::CrService;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use octofhir_cr_model::InMemoryStore;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct SessionConfig {
    /// Resource or bundle files loaded into the store
    pub data: Vec<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub verbose: bool,
    pub output_format: Option<String>,
    pub output_file: Option<PathBuf>,
}

impl SessionConfig {
    /// Service over an in-memory store holding every data file
    pub fn service(&self) -> Result<CrService> {
        let config = CrConfig::load(self.config_file.as_deref())
            .context("Failed to load configuration")?;

        let store = InMemoryStore::new();
        for path in &self.data {
            let json = read_json(path)?;
            let count = store
                .load(&json)
                .with_context(|| format!("Failed to load data file: {}", path.display()))?;
            if self.verbose {
                eprintln!("Loaded {} resource(s) from {}", count, path.display());
            }
        }
        Ok(CrService::new(Arc::new(store), config))
    }

    /// Print or write an operation result
    pub fn emit(&self, value: &Value) -> Result<()> {
        let format = self
            .output_format
            .as_deref()
            .map(OutputFormat::parse)
            .unwrap_or(OutputFormat::JsonPretty);
        let content = output::format_json(value, format)?;
        output::write_output(&content, self.output_file.as_deref())
    }
}

/// Read and parse a JSON file
pub fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON file: {}", path.display()))
}

/// Parse `name=value` parameters; values are read as JSON when they parse
pub fn parse_parameters(params: &[String]) -> Result<IndexMap<String, Value>> {
    let mut result = IndexMap::new();

    for param in params {
        let Some((name, value)) = param.split_once('=') else {
            anyhow::bail!("Invalid parameter format: '{}'. Expected 'name=value'", param);
        };
        let value = value.trim();
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
        result.insert(name.trim().to_string(), value);
    }

    Ok(result)
}
