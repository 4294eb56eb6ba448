//! `$care-gaps`: per-subject documents of detected care gaps
//!
//! For each subject, every requested measure is evaluated into an individual
//! report. Reports without groups are not reportable and are skipped; the
//! others are classified into a gap status and, when the status is requested,
//! become a detected issue, a composition section and a finalized report in
//! the subject's document bundle. Subjects without any qualifying report are
//! left out of the result.

mod documents;
mod request;

pub use request::CareGapsRequest;

use crate::error::CareGapsError;
use crate::evaluator::{MeasureEvaluator, MeasureRequest};
use crate::gap_status::{GapStatus, gap_status};
use crate::subject::Subject;
use futures::future::join_all;
use octofhir_cr_model::fhir::{Bundle, Measure};
use serde::Serialize;

/// Document bundle of one subject
#[derive(Debug, Clone, Serialize)]
pub struct CareGapsReport {
    /// `Patient/<id>`
    pub subject: String,
    pub bundle: Bundle,
}

/// Computes care-gaps documents
pub struct CareGapsAggregator {
    evaluator: MeasureEvaluator,
    reporter: Option<String>,
}

impl CareGapsAggregator {
    /// `reporter` is the organization reference stamped on every report
    pub fn new(evaluator: MeasureEvaluator, reporter: Option<String>) -> Self {
        Self {
            evaluator,
            reporter,
        }
    }

    pub async fn compute(&self, request: &CareGapsRequest) -> Result<Vec<CareGapsReport>, CareGapsError> {
        let reporter = self.validate_configuration()?;
        let statuses = request.validate()?;

        let measures = ensure_measures(self.resolve_measures(request).await?);

        let subject = match request.subject.as_deref() {
            Some(subject) => Subject::parse(subject)?,
            None => {
                return Err(CareGapsError::Unsupported(
                    "Non subject parameters have not been implemented.".to_string(),
                ));
            }
        };
        let patients = subject.patient_ids(self.evaluator.store().as_ref()).await?;
        log::debug!(
            "care gaps for {} patient(s) and {} measure(s)",
            patients.len(),
            measures.len()
        );

        let reports = join_all(
            patients
                .iter()
                .map(|patient| self.patient_report(patient, request, &statuses, &measures, reporter)),
        )
        .await;
        reports.into_iter().filter_map(Result::transpose).collect()
    }

    fn validate_configuration(&self) -> Result<&str, CareGapsError> {
        self.reporter
            .as_deref()
            .filter(|reporter| !reporter.trim().is_empty())
            .ok_or_else(|| {
                CareGapsError::Configuration(
                    "The measure_report.reporter setting is required for the $care-gaps operation."
                        .to_string(),
                )
            })
    }

    async fn resolve_measures(&self, request: &CareGapsRequest) -> Result<Vec<Measure>, CareGapsError> {
        if !request.measure_identifier.is_empty() {
            return Err(CareGapsError::Unsupported(
                "Resolving measures by identifier has not been implemented.".to_string(),
            ));
        }
        let mut measures = Vec::new();
        for reference in request.measure_id.iter().chain(&request.measure_url) {
            measures.push(self.evaluator.resolve_measure(reference).await?);
        }
        Ok(measures)
    }

    async fn patient_report(
        &self,
        patient: &str,
        request: &CareGapsRequest,
        statuses: &[GapStatus],
        measures: &[Measure],
        reporter: &str,
    ) -> Result<Option<CareGapsReport>, CareGapsError> {
        let subject = format!("Patient/{}", patient);
        let mut composition =
            documents::composition(&subject, reporter, request.organization.as_deref());
        let mut issues = Vec::new();
        let mut reports = Vec::new();

        for measure in measures {
            let measure_request = MeasureRequest {
                measure: measure.reference(),
                period_start: request.period_start.clone(),
                period_end: request.period_end.clone(),
                report_type: Some("subject".to_string()),
                subject: Some(subject.clone()),
                ..MeasureRequest::default()
            };
            let mut report = self.evaluator.evaluate(measure, &measure_request).await?;
            if report.group.is_empty() {
                log::info!(
                    "Report does not include a group so skipping. Subject: {} Measure: {}",
                    subject,
                    measure.reference()
                );
                continue;
            }

            let status = gap_status(measure, &report);
            if !statuses.contains(&status) {
                continue;
            }

            let issue = documents::detected_issue(&subject, measure, status);
            composition
                .section
                .push(documents::section(measure, &issue, status));
            documents::finalize_report(&mut report, measure, reporter);
            issues.push(issue);
            reports.push(report);
        }

        if reports.is_empty() {
            return Ok(None);
        }
        Ok(Some(CareGapsReport {
            bundle: documents::document(&composition, &issues, &reports)?,
            subject,
        }))
    }
}

/// Measures usable for gap reporting: those declaring both a scoring and an
/// improvement notation
fn ensure_measures(measures: Vec<Measure>) -> Vec<Measure> {
    measures
        .into_iter()
        .filter(|measure| {
            if measure.scoring.is_none() {
                log::info!(
                    "Measure does not specify a scoring so skipping: {}.",
                    measure.reference()
                );
                return false;
            }
            if measure.improvement_notation.is_none() {
                log::info!(
                    "Measure does not specify an improvement notation so skipping: {}.",
                    measure.reference()
                );
                return false;
            }
            true
        })
        .collect()
}
