//! Data source over resources embedded in a request

use super::filter_by_value_set;
use async_trait::async_trait;
use octofhir_cr_model::{
    DataSource, DataSourceError, RetrieveRequest, TerminologyProvider, references_subject,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Retrieves from an in-request dataset (a bundle or a single resource)
pub struct BundleDataSource {
    resources: Vec<JsonValue>,
    terminology: Arc<dyn TerminologyProvider>,
}

impl BundleDataSource {
    pub fn new(data: &JsonValue, terminology: Arc<dyn TerminologyProvider>) -> Self {
        let mut resources = Vec::new();
        flatten(data, &mut resources);
        Self {
            resources,
            terminology,
        }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

fn flatten(json: &JsonValue, out: &mut Vec<JsonValue>) {
    match json.get("resourceType").and_then(JsonValue::as_str) {
        Some("Bundle") => {
            for resource in json
                .get("entry")
                .and_then(JsonValue::as_array)
                .into_iter()
                .flatten()
                .filter_map(|e| e.get("resource"))
            {
                flatten(resource, out);
            }
        }
        Some(_) => out.push(json.clone()),
        None => {}
    }
}

#[async_trait]
impl DataSource for BundleDataSource {
    async fn retrieve(&self, request: &RetrieveRequest) -> Result<Vec<JsonValue>, DataSourceError> {
        let subject = request.subject_reference();
        let records: Vec<JsonValue> = self
            .resources
            .iter()
            .filter(|r| r.get("resourceType").and_then(JsonValue::as_str) == Some(request.data_type.as_str()))
            .filter(|r| {
                subject
                    .as_deref()
                    .is_none_or(|s| references_subject(&request.data_type, r, s))
            })
            .cloned()
            .collect();
        filter_by_value_set(records, request, self.terminology.as_ref(), false).await
    }

    fn describe(&self) -> String {
        format!("embedded bundle ({} resources)", self.resources.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::testing::FixedTerminology;
    use octofhir_cr_model::Code;
    use serde_json::json;

    #[tokio::test]
    async fn test_retrieve_from_embedded_bundle() {
        let data = json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [
                {"resource": {"resourceType": "Patient", "id": "123"}},
                {"resource": {"resourceType": "Encounter", "id": "e1", "subject": {"reference": "Patient/123"},
                    "type": [{"coding": [{"system": "http://snomed.info/sct", "code": "185349003"}]}]}},
                {"resource": {"resourceType": "Encounter", "id": "e2", "subject": {"reference": "Patient/123"},
                    "type": [{"coding": [{"system": "http://snomed.info/sct", "code": "0000"}]}]}},
                {"resource": {"resourceType": "Encounter", "id": "e3", "subject": {"reference": "Patient/999"}}}
            ]
        });
        let terminology = Arc::new(FixedTerminology {
            url: "http://example.org/ValueSet/office-visit".to_string(),
            codes: vec![Code::new("http://snomed.info/sct", "185349003")],
        });
        let source = BundleDataSource::new(&data, terminology);
        assert_eq!(source.len(), 4);

        let all = source
            .retrieve(&RetrieveRequest::new("Encounter").with_context("Patient", Some("123".into())))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let filtered = source
            .retrieve(
                &RetrieveRequest::new("Encounter")
                    .with_context("Patient", Some("123".into()))
                    .with_value_set("type", "http://example.org/ValueSet/office-visit"),
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0]["id"], "e1");

        let patient = source
            .retrieve(&RetrieveRequest::new("Patient").with_context("Patient", Some("123".into())))
            .await
            .unwrap();
        assert_eq!(patient.len(), 1);
    }
}
