//! Shared fixtures for the operation service tests
//!
//! Patient `123` is diabetic, patient `456` is not. The `screening` measure
//! counts diabetics in its numerator with an increase improvement notation,
//! so `123` has a closed gap and `456` an open one. The `test-lib` library
//! retrieves observations, three of which belong to `123`.

#![allow(dead_code)]

use octofhir_cr::{CrConfig, CrService};
use octofhir_cr_eval::library_resource;
use octofhir_cr_model::InMemoryStore;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

pub const DIABETES_VS: &str = "http://example.org/ValueSet/diabetes";
pub const LIBRARY_URL: &str = "http://example.org/Library/Screening";
pub const REPORTER: &str = "Organization/reporter";

fn retrieve(data_type: &str) -> JsonValue {
    json!({"type": "Retrieve", "dataType": format!("{{http://hl7.org/fhir}}{}", data_type)})
}

fn statement(name: &str, expression: JsonValue) -> JsonValue {
    json!({"name": name, "context": "Patient", "expression": expression})
}

pub fn screening_elm(greeting: &str) -> String {
    json!({
        "library": {
            "identifier": {"id": "Screening", "version": "1.0.0"},
            "parameters": {"def": [{"name": "Measurement Period"}]},
            "valueSets": {"def": [{"name": "Diabetes", "id": DIABETES_VS}]},
            "statements": {"def": [
                statement("Initial Population", json!({"type": "Exists", "operand": retrieve("Patient")})),
                statement("Denominator", json!({"type": "ExpressionRef", "name": "Initial Population"})),
                statement("Numerator", json!({"type": "Exists", "operand": {
                    "type": "Retrieve",
                    "dataType": "{http://hl7.org/fhir}Condition",
                    "codeProperty": "code",
                    "codes": {"type": "ValueSetRef", "name": "Diabetes"}
                }})),
                {"name": "Greeting", "expression": {
                    "type": "Literal",
                    "valueType": "{urn:hl7-org:elm-types:r1}String",
                    "value": greeting
                }}
            ]}
        }
    })
    .to_string()
}

pub fn observation_elm() -> String {
    json!({
        "library": {
            "identifier": {"id": "Test", "version": "1.0.0"},
            "statements": {"def": [statement("Count", retrieve("Observation"))]}
        }
    })
    .to_string()
}

fn observation(id: &str, patient: &str) -> JsonValue {
    json!({
        "resourceType": "Observation",
        "id": id,
        "status": "final",
        "subject": {"reference": format!("Patient/{}", patient)}
    })
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

pub fn measure() -> JsonValue {
    json!({
        "resourceType": "Measure",
        "id": "screening",
        "url": "http://example.org/Measure/screening",
        "version": "1.0.0",
        "title": "Diabetes screening",
        "library": [format!("{}|1.0.0", LIBRARY_URL)],
        "scoring": {"coding": [{
            "system": "http://terminology.hl7.org/CodeSystem/measure-scoring",
            "code": "proportion"
        }]},
        "improvementNotation": {"coding": [{
            "system": "http://terminology.hl7.org/CodeSystem/measure-improvement-notation",
            "code": "increase"
        }]},
        "group": [{
            "id": "main",
            "population": [
                population("initial-population", "Initial Population"),
                population("denominator", "Denominator"),
                population("numerator", "Numerator")
            ]
        }]
    })
}

pub fn store() -> Arc<InMemoryStore> {
    let store = InMemoryStore::new();
    let resources = vec![
        library_resource("screening-lib", "Screening", Some("1.0.0"), &screening_elm("hello")),
        json!({
            "resourceType": "ValueSet",
            "id": "diabetes",
            "url": DIABETES_VS,
            "compose": {"include": [{"system": "http://snomed.info/sct", "concept": [{"code": "44054006"}]}]}
        }),
        measure(),
        json!({"resourceType": "Patient", "id": "123"}),
        json!({"resourceType": "Patient", "id": "456"}),
        json!({"resourceType": "Condition", "id": "dm", "subject": {"reference": "Patient/123"},
            "code": {"coding": [{"system": "http://snomed.info/sct", "code": "44054006"}]}}),
        library_resource("test-lib", "Test", Some("1.0.0"), &observation_elm()),
        observation("obs-1", "123"),
        observation("obs-2", "456"),
        observation("obs-3", "123"),
        observation("obs-4", "123"),
        json!({"resourceType": "Group", "id": "cohort", "member": [
            {"entity": {"reference": "Patient/123"}},
            {"entity": {"reference": "Patient/456"}}
        ]}),
    ];
    for resource in resources {
        store.insert(resource).unwrap();
    }
    Arc::new(store)
}

pub fn config() -> CrConfig {
    CrConfig::default()
        .with_overrides(Some(REPORTER.to_string()), None)
        .unwrap()
}

pub fn service() -> CrService {
    CrService::new(store(), config())
}
