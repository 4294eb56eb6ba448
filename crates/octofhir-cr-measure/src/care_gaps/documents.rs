//! Builders for the resources of a care-gaps document

use crate::constants::{Profile, codes, extensions};
use crate::evaluator::now;
use crate::gap_status::GapStatus;
use octofhir_cr_model::fhir::{
    Bundle, BundleEntry, CodeableConcept, Coding, Composition, CompositionSection, DetectedIssue,
    DetectedIssueEvidence, Extension, Measure, MeasureReport, Narrative, Reference, systems,
};
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Empty gaps-in-care composition for one subject
pub(crate) fn composition(subject: &str, reporter: &str, organization: Option<&str>) -> Composition {
    Composition {
        resource_type: "Composition".to_string(),
        id: new_id(),
        meta: Profile::Composition.meta(),
        status: "final".to_string(),
        composition_type: CodeableConcept::from_coding(Coding::new(
            systems::LOINC,
            codes::GAPS_IN_CARE_REPORT,
            Some("Gaps in care report"),
        )),
        subject: Reference::to(subject),
        date: now(),
        author: vec![Reference::to(reporter)],
        custodian: organization.map(Reference::to),
        title: format!(
            "Care Gap Report for {}",
            subject.rsplit('/').next().unwrap_or(subject)
        ),
        section: Vec::new(),
    }
}

pub(crate) fn detected_issue(subject: &str, measure: &Measure, status: GapStatus) -> DetectedIssue {
    DetectedIssue {
        resource_type: "DetectedIssue".to_string(),
        id: new_id(),
        meta: Profile::DetectedIssue.meta(),
        modifier_extension: vec![Extension::codeable_concept(
            extensions::GAP_STATUS,
            CodeableConcept::from_coding(Coding::new(
                codes::GAP_STATUS_SYSTEM,
                status.code(),
                Some("Gap Status"),
            )),
        )],
        status: "final".to_string(),
        code: CodeableConcept::from_coding(Coding::new(
            systems::V3_ACT_CODE,
            codes::CARE_GAP,
            Some("Care Gaps"),
        )),
        patient: Reference::to(subject),
        evidence: vec![DetectedIssueEvidence {
            detail: vec![Reference::to(
                measure.url.clone().unwrap_or_else(|| measure.reference()),
            )],
        }],
    }
}

/// Composition section reporting one measure's gap
pub(crate) fn section(measure: &Measure, issue: &DetectedIssue, status: GapStatus) -> CompositionSection {
    CompositionSection {
        title: measure
            .title
            .clone()
            .or_else(|| measure.url.clone())
            .unwrap_or_else(|| measure.reference()),
        focus: Reference::to(measure.reference()),
        text: Narrative::generated(status.narrative()),
        entry: vec![Reference::to(format!("DetectedIssue/{}", issue.id))],
    }
}

/// Stamp an individual report for inclusion in a care-gaps document
pub(crate) fn finalize_report(report: &mut MeasureReport, measure: &Measure, reporter: &str) {
    report.id = Some(new_id());
    report.date = Some(now());
    report.improvement_notation = measure.improvement_notation.clone();
    report.reporter = Some(Reference::to(reporter));
    report.meta = Some(Profile::MeasureReport.meta());
}

/// Document bundle: the composition, then detected issues, then reports
pub(crate) fn document(
    composition: &Composition,
    issues: &[DetectedIssue],
    reports: &[MeasureReport],
) -> Result<Bundle, serde_json::Error> {
    let mut bundle = Bundle::new("document");
    bundle.id = Some(new_id());
    bundle.meta = Some(Profile::Bundle.meta());
    bundle.timestamp = Some(now());

    let mut resources = vec![serde_json::to_value(composition)?];
    for issue in issues {
        resources.push(serde_json::to_value(issue)?);
    }
    for report in reports {
        resources.push(serde_json::to_value(report)?);
    }
    bundle.entry = resources
        .into_iter()
        .map(|resource| BundleEntry {
            full_url: None,
            resource,
        })
        .collect();
    Ok(bundle)
}
