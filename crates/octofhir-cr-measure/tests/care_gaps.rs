//! Care-Gaps Tests
//!
//! End-to-end `$care-gaps` over the screening measures.

mod common;

use common::*;
use octofhir_cr_measure::{CareGapsAggregator, CareGapsError, CareGapsRequest, Profile};
use pretty_assertions::assert_eq;
use serde_json::Value as JsonValue;

fn request(subject: &str, status: &[&str], measures: &[&str]) -> CareGapsRequest {
    CareGapsRequest {
        period_start: Some("2019-01-01".to_string()),
        period_end: Some("2019-12-31".to_string()),
        subject: Some(subject.to_string()),
        status: status.iter().map(|s| s.to_string()).collect(),
        measure_id: measures.iter().map(|s| s.to_string()).collect(),
        ..CareGapsRequest::default()
    }
}

fn aggregator() -> CareGapsAggregator {
    CareGapsAggregator::new(evaluator(), Some(REPORTER.to_string()))
}

fn resources_of<'a>(bundle: &'a JsonValue, resource_type: &str) -> Vec<&'a JsonValue> {
    bundle["entry"]
        .as_array()
        .into_iter()
        .flatten()
        .map(|entry| &entry["resource"])
        .filter(|r| r["resourceType"] == resource_type)
        .collect()
}

#[tokio::test]
async fn test_open_gap_for_patient_outside_numerator() {
    let reports = aggregator()
        .compute(&request("Patient/456", &["open-gap"], &["screening"]))
        .await
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].subject, "Patient/456");
    let bundle = serde_json::to_value(&reports[0].bundle).unwrap();
    assert_eq!(bundle["type"], "document");
    assert_eq!(bundle["meta"]["profile"][0], Profile::Bundle.url());

    let issues = resources_of(&bundle, "DetectedIssue");
    assert_eq!(issues.len(), 1);
    assert_eq!(
        issues[0]["modifierExtension"][0]["valueCodeableConcept"]["coding"][0]["code"],
        "open-gap"
    );
    assert_eq!(issues[0]["patient"]["reference"], "Patient/456");

    let compositions = resources_of(&bundle, "Composition");
    assert_eq!(compositions[0]["title"], "Care Gap Report for 456");
    let section = &compositions[0]["section"][0];
    assert_eq!(section["focus"]["reference"], "Measure/screening");
    assert_eq!(
        section["entry"][0]["reference"],
        format!("DetectedIssue/{}", issues[0]["id"].as_str().unwrap())
    );
    assert!(section["text"]["div"].as_str().unwrap().contains("Issues detected."));

    let measure_reports = resources_of(&bundle, "MeasureReport");
    assert_eq!(measure_reports.len(), 1);
    assert_eq!(measure_reports[0]["reporter"]["reference"], REPORTER);
    assert_eq!(measure_reports[0]["meta"]["profile"][0], Profile::MeasureReport.url());
    assert!(measure_reports[0]["id"].is_string());
}

#[tokio::test]
async fn test_status_filter_drops_subject() {
    // 123 is in the numerator of an increase measure: closed gap
    let reports = aggregator()
        .compute(&request("Patient/123", &["open-gap"], &["screening"]))
        .await
        .unwrap();
    assert!(reports.is_empty());
}

#[tokio::test]
async fn test_group_keeps_member_order_and_statuses() {
    let reports = aggregator()
        .compute(&request(
            "Group/cohort",
            &["open-gap", "closed-gap"],
            &["screening", "screening-decrease"],
        ))
        .await
        .unwrap();

    let subjects: Vec<_> = reports.iter().map(|r| r.subject.as_str()).collect();
    assert_eq!(subjects, vec!["Patient/123", "Patient/456"]);

    let statuses = |index: usize| -> Vec<String> {
        let bundle = serde_json::to_value(&reports[index].bundle).unwrap();
        resources_of(&bundle, "DetectedIssue")
            .iter()
            .map(|issue| {
                issue["modifierExtension"][0]["valueCodeableConcept"]["coding"][0]["code"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    };
    assert_eq!(statuses(0), vec!["closed-gap", "open-gap"]);
    assert_eq!(statuses(1), vec!["open-gap", "closed-gap"]);
}

#[tokio::test]
async fn test_unscored_measure_is_skipped() {
    let reports = aggregator()
        .compute(&request(
            "Patient/456",
            &["open-gap", "closed-gap"],
            &["screening-unscored"],
        ))
        .await
        .unwrap();
    assert!(reports.is_empty());
}

#[tokio::test]
async fn test_subject_without_groups_is_skipped() {
    let reports = aggregator()
        .compute(&request("Patient/999", &["open-gap", "closed-gap"], &["screening"]))
        .await
        .unwrap();
    assert!(reports.is_empty());
}

#[tokio::test]
async fn test_reporter_is_required() {
    let aggregator = CareGapsAggregator::new(evaluator(), None);
    let result = aggregator
        .compute(&request("Patient/456", &["open-gap"], &["screening"]))
        .await;
    assert!(matches!(result, Err(CareGapsError::Configuration(_))));
}

#[tokio::test]
async fn test_organization_selector_is_unsupported() {
    let request = CareGapsRequest {
        subject: None,
        organization: Some("Organization/1".to_string()),
        ..request("Patient/456", &["open-gap"], &["screening"])
    };
    let result = aggregator().compute(&request).await;
    assert!(matches!(result, Err(CareGapsError::Unsupported(_))));
}

#[tokio::test]
async fn test_validation_runs_before_resolution() {
    let result = aggregator()
        .compute(&request("Patient/456", &[], &["does-not-exist"]))
        .await;
    assert!(matches!(result, Err(CareGapsError::Validation(_))));
}
