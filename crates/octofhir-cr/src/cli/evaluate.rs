//! `evaluate` command: run every expression of a library

use super::session::{SessionConfig, parse_parameters, read_json};
use crate::service::EvaluateRequest;
use anyhow::Result;
use std::path::PathBuf;

/// Configuration for the evaluate command
pub struct EvaluateConfig {
    pub library: String,
    pub patient: Option<String>,
    pub context: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub product_line: Option<String>,
    pub params: Vec<String>,
    pub full: bool,
    pub additional_data: Option<PathBuf>,
    pub session: SessionConfig,
}

pub async fn run(config: EvaluateConfig) -> Result<()> {
    let service = config.session.service()?;

    let parameters = parse_parameters(&config.params)?;
    let request = EvaluateRequest {
        library: config.library,
        patient_id: config.patient,
        context: config.context,
        period_start: config.period_start,
        period_end: config.period_end,
        product_line: config.product_line,
        parameters,
        execution_results: config.full.then(|| "Full".to_string()),
        additional_data: config.additional_data.as_deref().map(read_json).transpose()?,
        ..EvaluateRequest::default()
    };
    if config.session.verbose {
        eprintln!("Evaluating Library/{}", request.library);
    }

    let results = service.evaluate(&request).await?;
    config.session.emit(&serde_json::to_value(results)?)
}
