//! `$care-gaps` request parameters and their validation

use crate::error::CareGapsError;
use crate::gap_status::GapStatus;
use octofhir_cr_eval::measurement_period;
use serde::Deserialize;

/// Parameters of `$care-gaps`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CareGapsRequest {
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    /// Measure topics; accepted but not used for filtering
    pub topic: Vec<String>,
    /// `Patient/<id>` or `Group/<id>`
    pub subject: Option<String>,
    pub practitioner: Option<String>,
    pub organization: Option<String>,
    /// Gap statuses to report
    pub status: Vec<String>,
    pub measure_id: Vec<String>,
    pub measure_identifier: Vec<String>,
    pub measure_url: Vec<String>,
    /// Programs; accepted but not used for filtering
    pub program: Vec<String>,
}

impl CareGapsRequest {
    /// Check the request and return the requested statuses.
    ///
    /// Runs before any measure is resolved or evaluated.
    pub fn validate(&self) -> Result<Vec<GapStatus>, CareGapsError> {
        let (Some(start), Some(end)) = (self.period_start.as_deref(), self.period_end.as_deref())
        else {
            return Err(CareGapsError::validation(
                "Parameters 'periodStart' and 'periodEnd' are required",
            ));
        };
        measurement_period(start, end).map_err(|e| CareGapsError::validation(e.to_string()))?;

        if let Some(subject) = self.subject.as_deref() {
            if !is_patient_or_group(subject) {
                return Err(CareGapsError::validation(format!(
                    "Parameter 'subject' must be a Patient or Group reference: {}",
                    subject
                )));
            }
            if self.organization.is_some() || self.practitioner.is_some() {
                return Err(CareGapsError::validation(
                    "Parameter 'subject' cannot be used with 'organization' or 'practitioner'",
                ));
            }
        }
        if self.practitioner.is_some() && self.organization.is_none() {
            return Err(CareGapsError::validation(
                "Parameter 'practitioner' requires 'organization'",
            ));
        }
        if self.subject.is_none() && self.organization.is_none() {
            return Err(CareGapsError::validation(
                "Either 'subject' or 'organization' is required",
            ));
        }

        if self.status.is_empty() {
            return Err(CareGapsError::validation(
                "Parameter 'status' must be given at least once",
            ));
        }
        let statuses = self
            .status
            .iter()
            .map(|s| {
                s.parse::<GapStatus>().map_err(|_| {
                    CareGapsError::validation(format!(
                        "Parameter 'status' must be one of open-gap, closed-gap or not-applicable: {}",
                        s
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if self.measure_id.is_empty()
            && self.measure_identifier.is_empty()
            && self.measure_url.is_empty()
        {
            return Err(CareGapsError::validation(
                "One of 'measureId', 'measureIdentifier' or 'measureUrl' is required",
            ));
        }
        Ok(statuses)
    }
}

fn is_patient_or_group(reference: &str) -> bool {
    match reference.split_once('/') {
        Some(("Patient" | "Group", id)) => !id.is_empty() && !id.contains('/'),
        _ => false,
    }
}
