//! Shared fixtures for evaluation tests
//!
//! - An ELM library exercising retrieves, references and parameters
//! - A store holding the library, a value set and one patient's records

#![allow(dead_code)]

use octofhir_cr_eval::library_resource;
use octofhir_cr_model::InMemoryStore;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

pub const DIABETES_VS: &str = "http://example.org/ValueSet/diabetes";

pub fn literal(value_type: &str, value: &str) -> JsonValue {
    json!({"type": "Literal", "valueType": format!("{{urn:hl7-org:elm-types:r1}}{}", value_type), "value": value})
}

pub fn retrieve(data_type: &str) -> JsonValue {
    json!({"type": "Retrieve", "dataType": format!("{{http://hl7.org/fhir}}{}", data_type)})
}

pub fn expression_ref(name: &str) -> JsonValue {
    json!({"type": "ExpressionRef", "name": name})
}

/// ELM library `Screening` with the given version
pub fn screening_elm(version: &str) -> String {
    json!({
        "library": {
            "identifier": {"id": "Screening", "version": version},
            "parameters": {"def": [{"name": "Measurement Period"}]},
            "valueSets": {"def": [{"name": "Diabetes", "id": DIABETES_VS}]},
            "statements": {"def": [
                {"name": "Patient", "context": "Patient", "expression": {
                    "type": "SingletonFrom", "operand": retrieve("Patient")
                }},
                {"name": "Diabetes Conditions", "context": "Patient", "expression": {
                    "type": "Retrieve",
                    "dataType": "{http://hl7.org/fhir}Condition",
                    "codeProperty": "code",
                    "codes": {"type": "ValueSetRef", "name": "Diabetes"}
                }},
                {"name": "Has Diabetes", "context": "Patient", "expression": {
                    "type": "Exists", "operand": expression_ref("Diabetes Conditions")
                }},
                {"name": "Observation Count", "context": "Patient", "expression": {
                    "type": "Count", "source": retrieve("Observation")
                }},
                {"name": "Only Observation", "context": "Patient", "expression": {
                    "type": "SingletonFrom", "operand": retrieve("Observation")
                }},
                {"name": "Period Start", "context": "Patient", "expression": {
                    "type": "Start", "operand": {"type": "ParameterRef", "name": "Measurement Period"}
                }},
                {"name": "Ratio", "context": "Patient", "expression": {
                    "type": "Divide", "operand": [literal("Integer", "1"), literal("Integer", "4")]
                }},
                {"name": "Greeting", "context": "Patient", "expression": literal("String", "hello")}
            ]}
        }
    })
    .to_string()
}

pub fn patient_records(id: &str) -> Vec<JsonValue> {
    let subject = json!({"reference": format!("Patient/{}", id)});
    vec![
        json!({"resourceType": "Patient", "id": id, "gender": "female"}),
        json!({"resourceType": "Condition", "id": format!("{}-dm", id), "subject": subject,
            "code": {"coding": [{"system": "http://snomed.info/sct", "code": "44054006"}]}}),
        json!({"resourceType": "Condition", "id": format!("{}-htn", id), "subject": subject,
            "code": {"coding": [{"system": "http://snomed.info/sct", "code": "38341003"}]}}),
        json!({"resourceType": "Observation", "id": format!("{}-o1", id), "subject": subject, "status": "final"}),
        json!({"resourceType": "Observation", "id": format!("{}-o2", id), "subject": subject, "status": "final"}),
    ]
}

pub fn diabetes_value_set() -> JsonValue {
    json!({
        "resourceType": "ValueSet",
        "id": "diabetes",
        "url": DIABETES_VS,
        "compose": {"include": [{"system": "http://snomed.info/sct", "concept": [{"code": "44054006"}]}]}
    })
}

/// Store with the `Screening` library, the value set and patient `123`
pub fn store() -> Arc<InMemoryStore> {
    let store = InMemoryStore::new();
    store
        .insert(library_resource("screening", "Screening", Some("1.0.0"), &screening_elm("1.0.0")))
        .unwrap();
    store.insert(diabetes_value_set()).unwrap();
    for record in patient_records("123") {
        store.insert(record).unwrap();
    }
    Arc::new(store)
}

pub fn bundle(resources: Vec<JsonValue>) -> JsonValue {
    json!({
        "resourceType": "Bundle",
        "type": "collection",
        "entry": resources.into_iter().map(|r| json!({"resource": r})).collect::<Vec<_>>()
    })
}
