//! `evaluate-measure` command

use super::session::{SessionConfig, read_json};
use anyhow::Result;
use octofhir_cr_measure::MeasureRequest;
use std::path::PathBuf;

/// Configuration for the evaluate-measure command
pub struct MeasureConfig {
    pub measure: String,
    pub subject: Option<String>,
    pub report_type: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub product_line: Option<String>,
    pub last_received_on: Option<String>,
    pub additional_data: Option<PathBuf>,
    pub session: SessionConfig,
}

pub async fn run(config: MeasureConfig) -> Result<()> {
    let service = config.session.service()?;

    let request = MeasureRequest {
        measure: config.measure,
        subject: config.subject,
        report_type: config.report_type,
        period_start: config.period_start,
        period_end: config.period_end,
        product_line: config.product_line,
        last_received_on: config.last_received_on,
        additional_data: config.additional_data.as_deref().map(read_json).transpose()?,
        ..MeasureRequest::default()
    };
    if config.session.verbose {
        eprintln!("Evaluating {}", request.measure);
    }

    let report = service.evaluate_measure(&request).await?;
    config.session.emit(&serde_json::to_value(report)?)
}
