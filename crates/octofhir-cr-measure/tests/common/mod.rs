//! Shared fixtures for measure and care-gaps tests
//!
//! Patients:
//! - `123`: diabetic, two observations (the exclusion criteria fails)
//! - `456`: no diabetes, no observations
//!
//! Measures over the `Screening` library:
//! - `screening`: proportion, improvement increase
//! - `screening-decrease`: proportion, improvement decrease
//! - `screening-unscored`: no scoring

#![allow(dead_code)]

use octofhir_cr_eval::{LibraryCache, library_resource};
use octofhir_cr_measure::MeasureEvaluator;
use octofhir_cr_model::InMemoryStore;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

pub const DIABETES_VS: &str = "http://example.org/ValueSet/diabetes";
pub const LIBRARY_URL: &str = "http://example.org/Library/Screening";
pub const MEASURE_URL: &str = "http://example.org/Measure/screening";
pub const REPORTER: &str = "Organization/reporter";

fn retrieve(data_type: &str) -> JsonValue {
    json!({"type": "Retrieve", "dataType": format!("{{http://hl7.org/fhir}}{}", data_type)})
}

pub fn screening_elm() -> String {
    json!({
        "library": {
            "identifier": {"id": "Screening", "version": "1.0.0"},
            "parameters": {"def": [{"name": "Measurement Period"}]},
            "valueSets": {"def": [{"name": "Diabetes", "id": DIABETES_VS}]},
            "statements": {"def": [
                {"name": "Initial Population", "context": "Patient", "expression": {
                    "type": "Exists", "operand": retrieve("Patient")
                }},
                {"name": "Denominator", "context": "Patient", "expression": {
                    "type": "ExpressionRef", "name": "Initial Population"
                }},
                {"name": "Denominator Exclusion", "context": "Patient", "expression": {
                    "type": "SingletonFrom", "operand": retrieve("Observation")
                }},
                {"name": "Numerator", "context": "Patient", "expression": {
                    "type": "Exists", "operand": {
                        "type": "Retrieve",
                        "dataType": "{http://hl7.org/fhir}Condition",
                        "codeProperty": "code",
                        "codes": {"type": "ValueSetRef", "name": "Diabetes"}
                    }
                }}
            ]}
        }
    })
    .to_string()
}

fn population(code: &str, expression: &str) -> JsonValue {
    json!({
        "code": {"coding": [{
            "system": "http://terminology.hl7.org/CodeSystem/measure-population",
            "code": code
        }]},
        "criteria": {"language": "text/cql-identifier", "expression": expression}
    })
}

pub fn measure(id: &str, scoring: Option<&str>, notation: Option<&str>) -> JsonValue {
    let mut measure = json!({
        "resourceType": "Measure",
        "id": id,
        "url": format!("http://example.org/Measure/{}", id),
        "version": "1.0.0",
        "title": format!("Measure {}", id),
        "library": [format!("{}|1.0.0", LIBRARY_URL)],
        "group": [{
            "id": "main",
            "population": [
                population("initial-population", "Initial Population"),
                population("denominator", "Denominator"),
                population("denominator-exclusion", "Denominator Exclusion"),
                population("numerator", "Numerator")
            ]
        }]
    });
    if let Some(scoring) = scoring {
        measure["scoring"] = json!({"coding": [{
            "system": "http://terminology.hl7.org/CodeSystem/measure-scoring",
            "code": scoring
        }]});
    }
    if let Some(notation) = notation {
        measure["improvementNotation"] = json!({"coding": [{
            "system": "http://terminology.hl7.org/CodeSystem/measure-improvement-notation",
            "code": notation
        }]});
    }
    measure
}

pub fn clinical_data() -> Vec<JsonValue> {
    vec![
        json!({"resourceType": "Patient", "id": "123"}),
        json!({"resourceType": "Patient", "id": "456"}),
        json!({"resourceType": "Condition", "id": "dm", "subject": {"reference": "Patient/123"},
            "code": {"coding": [{"system": "http://snomed.info/sct", "code": "44054006"}]}}),
        json!({"resourceType": "Condition", "id": "htn", "subject": {"reference": "Patient/456"},
            "code": {"coding": [{"system": "http://snomed.info/sct", "code": "38341003"}]}}),
        json!({"resourceType": "Observation", "id": "o1", "subject": {"reference": "Patient/123"}}),
        json!({"resourceType": "Observation", "id": "o2", "subject": {"reference": "Patient/123"}}),
        json!({"resourceType": "Group", "id": "cohort", "member": [
            {"entity": {"reference": "Patient/123"}},
            {"entity": {"reference": "Patient/456"}}
        ]}),
    ]
}

pub fn store() -> Arc<InMemoryStore> {
    let store = InMemoryStore::new();
    store
        .insert(library_resource("screening-lib", "Screening", Some("1.0.0"), &screening_elm()))
        .unwrap();
    store
        .insert(json!({
            "resourceType": "ValueSet",
            "id": "diabetes",
            "url": DIABETES_VS,
            "compose": {"include": [{"system": "http://snomed.info/sct", "concept": [{"code": "44054006"}]}]}
        }))
        .unwrap();
    store.insert(measure("screening", Some("proportion"), Some("increase"))).unwrap();
    store.insert(measure("screening-decrease", Some("proportion"), Some("decrease"))).unwrap();
    store.insert(measure("screening-unscored", None, Some("increase"))).unwrap();
    for resource in clinical_data() {
        store.insert(resource).unwrap();
    }
    Arc::new(store)
}

pub fn evaluator() -> MeasureEvaluator {
    MeasureEvaluator::new(store(), Arc::new(LibraryCache::new()))
}
