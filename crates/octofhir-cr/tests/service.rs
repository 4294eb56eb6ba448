mod common;

use common::{REPORTER, screening_elm, service, store};
use octofhir_cr::eval::library_resource;
use octofhir_cr::service::EvaluateRequest;
use octofhir_cr::{CrConfig, CrError, CrService};
use pretty_assertions::assert_eq;
use serde_json::{Value as JsonValue, json};

fn names(results: &JsonValue) -> Vec<&str> {
    results
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_dispatch_evaluate() {
    let service = service();
    let results = service
        .dispatch("$evaluate", json!({"library": "Library/screening-lib", "patientId": "123"}))
        .await
        .unwrap();

    assert_eq!(
        names(&results),
        vec!["Initial Population", "Denominator", "Numerator", "Greeting"]
    );
    assert_eq!(
        results[2],
        json!({"name": "Numerator", "value": "true", "resultType": "Boolean"})
    );
    assert_eq!(results[3]["value"], "hello");
    assert_eq!(results[3]["resultType"], "String");
}

#[tokio::test]
async fn test_dispatch_evaluate_summarizes_resource_list() {
    let service = service();
    let results = service
        .dispatch("$evaluate", json!({"library": "test-lib", "patientId": "123"}))
        .await
        .unwrap();

    assert_eq!(
        results,
        json!([{"name": "Count", "value": "Observation/obs-1", "resultType": "List"}])
    );

    let other = service
        .dispatch("$evaluate", json!({"library": "test-lib", "patientId": "456"}))
        .await
        .unwrap();
    assert_eq!(other[0]["value"], "Observation/obs-2");
}

#[tokio::test]
async fn test_dispatch_accepts_bare_operation_name() {
    let service = service();
    let with_prefix = service
        .dispatch("$evaluate", json!({"library": "screening-lib", "patientId": "456"}))
        .await
        .unwrap();
    let without = service
        .dispatch("evaluate", json!({"library": "screening-lib", "patientId": "456"}))
        .await
        .unwrap();
    assert_eq!(with_prefix, without);
    assert_eq!(without[2]["value"], "false");
}

#[tokio::test]
async fn test_dispatch_unknown_operation() {
    let error = service().dispatch("$apply", json!({})).await.unwrap_err();
    assert!(matches!(error, CrError::UnsupportedOperation(_)));
    assert_eq!(error.category(), "UnsupportedOperation");
}

#[tokio::test]
async fn test_dispatch_rejects_malformed_parameters() {
    let error = service()
        .dispatch("$evaluate-measure", json!({"measure": 42}))
        .await
        .unwrap_err();
    assert_eq!(error.category(), "ValidationError");
}

#[tokio::test]
async fn test_evaluate_unknown_library() {
    let error = service()
        .evaluate(&EvaluateRequest::new("missing").with_patient("123"))
        .await
        .unwrap_err();
    assert_eq!(error.category(), "ResolutionError");
    assert_eq!(error.to_string(), "Could not resolve library id missing");
}

#[tokio::test]
async fn test_evaluate_patient_context_requires_subject() {
    let request = EvaluateRequest {
        context: Some("Patient".to_string()),
        ..EvaluateRequest::new("screening-lib")
    };
    let error = service().evaluate(&request).await.unwrap_err();
    assert_eq!(error.category(), "ValidationError");
}

#[tokio::test]
async fn test_embedded_library_shadows_stored_logic() {
    let service = service();
    let inline = library_resource("screening-lib", "Screening", Some("1.0.0"), &screening_elm("inline"));
    let request = EvaluateRequest {
        additional_data: Some(json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [{"resource": inline}]
        })),
        ..EvaluateRequest::new("screening-lib").with_patient("123")
    };

    let shadowed = service.evaluate(&request).await.unwrap();
    assert_eq!(shadowed[3].value.as_ref().and_then(|v| v.as_text()), Some("inline"));

    let stored = service
        .evaluate(&EvaluateRequest::new("screening-lib").with_patient("123"))
        .await
        .unwrap();
    assert_eq!(stored[3].value.as_ref().and_then(|v| v.as_text()), Some("hello"));
}

#[tokio::test]
async fn test_dispatch_evaluate_measure() {
    let report = service()
        .dispatch(
            "$evaluate-measure",
            json!({
                "measure": "Measure/screening",
                "subject": "Patient/123",
                "reportType": "subject",
                "periodStart": "2024",
                "periodEnd": "2024"
            }),
        )
        .await
        .unwrap();

    assert_eq!(report["resourceType"], "MeasureReport");
    assert_eq!(report["type"], "individual");
    assert_eq!(report["measure"], "http://example.org/Measure/screening|1.0.0");
    assert_eq!(report["subject"]["reference"], "Patient/123");

    let group = &report["group"][0];
    let counts: Vec<u64> = group["population"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["count"].as_u64().unwrap())
        .collect();
    assert_eq!(counts, vec![1, 1, 1]);
    assert_eq!(group["measureScore"]["value"], 1.0);
}

#[tokio::test]
async fn test_dispatch_care_gaps() {
    let result = service()
        .dispatch(
            "$care-gaps",
            json!({
                "periodStart": "2024-01-01",
                "periodEnd": "2024-12-31",
                "subject": "Group/cohort",
                "status": ["open-gap"],
                "measureId": ["screening"]
            }),
        )
        .await
        .unwrap();

    assert_eq!(result["resourceType"], "Parameters");
    assert!(
        result["id"]
            .as_str()
            .unwrap()
            .starts_with("care-gaps-report-")
    );

    let parameters = result["parameter"].as_array().unwrap();
    assert_eq!(parameters.len(), 1);
    assert_eq!(parameters[0]["name"], "return");

    let bundle = &parameters[0]["resource"];
    assert_eq!(bundle["type"], "document");
    let composition = &bundle["entry"][0]["resource"];
    assert_eq!(composition["resourceType"], "Composition");
    assert_eq!(composition["subject"]["reference"], "Patient/456");
    assert_eq!(composition["author"][0]["reference"], REPORTER);
}

#[tokio::test]
async fn test_care_gaps_requires_reporter() {
    let service = CrService::new(store(), CrConfig::default());
    let request = json!({
        "periodStart": "2024",
        "periodEnd": "2024",
        "subject": "Patient/123",
        "status": ["closed-gap"],
        "measureId": ["screening"]
    });
    let error = service.dispatch("$care-gaps", request).await.unwrap_err();
    assert_eq!(error.category(), "ConfigurationError");
}

#[tokio::test]
async fn test_shared_cache_across_requests() {
    let service = service();
    let request = EvaluateRequest::new("screening-lib").with_patient("123");
    service.evaluate(&request).await.unwrap();
    service.evaluate(&request).await.unwrap();

    let stats = service.cache().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn test_disabled_cache_is_request_scoped() {
    let mut config = common::config();
    config.cache.enabled = false;
    let service = CrService::new(store(), config);

    let request = EvaluateRequest::new("screening-lib").with_patient("123");
    service.evaluate(&request).await.unwrap();
    service.evaluate(&request).await.unwrap();

    let stats = service.cache().stats();
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.entries, 0);
}
