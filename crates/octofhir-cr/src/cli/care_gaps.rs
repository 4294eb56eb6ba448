//! `care-gaps` command

use super::session::SessionConfig;
use anyhow::Result;
use octofhir_cr_measure::CareGapsRequest;
use serde_json::Value;

/// Configuration for the care-gaps command
pub struct CareGapsConfig {
    pub period_start: String,
    pub period_end: String,
    pub subject: Option<String>,
    pub practitioner: Option<String>,
    pub organization: Option<String>,
    pub status: Vec<String>,
    pub measure_id: Vec<String>,
    pub measure_url: Vec<String>,
    pub session: SessionConfig,
}

pub async fn run(config: CareGapsConfig) -> Result<()> {
    let service = config.session.service()?;

    let request = CareGapsRequest {
        period_start: Some(config.period_start),
        period_end: Some(config.period_end),
        subject: config.subject,
        practitioner: config.practitioner,
        organization: config.organization,
        status: config.status,
        measure_id: config.measure_id,
        measure_url: config.measure_url,
        ..CareGapsRequest::default()
    };

    let reports = service.care_gaps(&request).await?;
    if config.session.verbose {
        eprintln!("{} subject(s) with reportable gaps", reports.len());
    }

    let bundles = reports
        .into_iter()
        .map(|report| serde_json::to_value(report.bundle))
        .collect::<Result<Vec<_>, _>>()?;
    config.session.emit(&Value::Array(bundles))
}
