//! Data source and terminology provider backed by the resource store

use super::filter_by_value_set;
use async_trait::async_trait;
use octofhir_cr_model::{
    Code, DataSource, DataSourceError, ResourceStore, RetrieveRequest, SearchParams,
    TerminologyError, TerminologyProvider,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Retrieves clinical records from the local resource store
pub struct StoreDataSource {
    store: Arc<dyn ResourceStore>,
    terminology: Arc<dyn TerminologyProvider>,
    expand_value_sets: bool,
}

impl StoreDataSource {
    pub fn new(store: Arc<dyn ResourceStore>, terminology: Arc<dyn TerminologyProvider>) -> Self {
        Self {
            store,
            terminology,
            expand_value_sets: false,
        }
    }

    /// Match value sets locally against a full expansion
    pub fn with_expand_value_sets(mut self, expand: bool) -> Self {
        self.expand_value_sets = expand;
        self
    }

    pub fn expands_value_sets(&self) -> bool {
        self.expand_value_sets
    }
}

#[async_trait]
impl DataSource for StoreDataSource {
    async fn retrieve(&self, request: &RetrieveRequest) -> Result<Vec<JsonValue>, DataSourceError> {
        let params = match request.subject_reference() {
            Some(subject) => SearchParams::by_subject(subject),
            None => SearchParams::default(),
        };
        let records = self.store.search(&request.data_type, &params).await?;
        filter_by_value_set(
            records,
            request,
            self.terminology.as_ref(),
            self.expand_value_sets,
        )
        .await
    }

    fn describe(&self) -> String {
        "store".to_string()
    }
}

/// Value set membership from ValueSet resources in the resource store.
///
/// Codes come from the stored expansion (`expansion.contains`, nested
/// entries included) or, without one, from `compose.include[].concept`.
pub struct StoreTerminologyProvider {
    store: Arc<dyn ResourceStore>,
}

impl StoreTerminologyProvider {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TerminologyProvider for StoreTerminologyProvider {
    async fn in_value_set(&self, code: &Code, value_set: &str) -> Result<bool, TerminologyError> {
        let codes = self.expand(value_set).await?;
        Ok(codes.iter().any(|c| c.matches(code)))
    }

    async fn expand(&self, value_set: &str) -> Result<Vec<Code>, TerminologyError> {
        let (url, version) = octofhir_cr_model::split_canonical(value_set);
        let found = self
            .store
            .search("ValueSet", &SearchParams::by_url(url, version))
            .await?;
        let resource = found
            .first()
            .ok_or_else(|| TerminologyError::ValueSetNotFound(value_set.to_string()))?;
        Ok(value_set_codes(resource))
    }

    fn describe(&self) -> String {
        "store terminology".to_string()
    }
}

/// Codes listed by a ValueSet resource
pub(crate) fn value_set_codes(value_set: &JsonValue) -> Vec<Code> {
    let mut codes = Vec::new();
    if let Some(contains) = value_set
        .get("expansion")
        .and_then(|e| e.get("contains"))
        .and_then(JsonValue::as_array)
    {
        collect_contains(contains, &mut codes);
        return codes;
    }

    for include in value_set
        .get("compose")
        .and_then(|c| c.get("include"))
        .and_then(JsonValue::as_array)
        .into_iter()
        .flatten()
    {
        let system = include.get("system").and_then(JsonValue::as_str);
        for concept in include
            .get("concept")
            .and_then(JsonValue::as_array)
            .into_iter()
            .flatten()
        {
            if let Some(code) = concept.get("code").and_then(JsonValue::as_str) {
                codes.push(Code {
                    code: code.to_string(),
                    system: system.map(str::to_string),
                    version: None,
                    display: concept
                        .get("display")
                        .and_then(JsonValue::as_str)
                        .map(str::to_string),
                });
            }
        }
    }
    codes
}

fn collect_contains(contains: &[JsonValue], out: &mut Vec<Code>) {
    for entry in contains {
        if let Some(code) = entry.get("code").and_then(JsonValue::as_str) {
            let text = |key: &str| entry.get(key).and_then(JsonValue::as_str).map(str::to_string);
            out.push(Code {
                code: code.to_string(),
                system: text("system"),
                version: text("version"),
                display: text("display"),
            });
        }
        if let Some(nested) = entry.get("contains").and_then(JsonValue::as_array) {
            collect_contains(nested, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_cr_model::InMemoryStore;
    use serde_json::json;

    const DIABETES: &str = "http://example.org/ValueSet/diabetes";

    fn store() -> Arc<InMemoryStore> {
        let bundle = json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [
                {"resource": {
                    "resourceType": "ValueSet", "id": "diabetes", "url": DIABETES,
                    "compose": {"include": [{
                        "system": "http://snomed.info/sct",
                        "concept": [{"code": "44054006"}, {"code": "73211009"}]
                    }]}
                }},
                {"resource": {
                    "resourceType": "ValueSet", "id": "expanded", "url": "http://example.org/ValueSet/expanded",
                    "expansion": {"contains": [
                        {"system": "http://loinc.org", "code": "4548-4", "contains": [
                            {"system": "http://loinc.org", "code": "17856-6"}
                        ]}
                    ]}
                }},
                {"resource": {
                    "resourceType": "Condition", "id": "c1",
                    "subject": {"reference": "Patient/123"},
                    "code": {"coding": [{"system": "http://snomed.info/sct", "code": "44054006"}]}
                }},
                {"resource": {
                    "resourceType": "Condition", "id": "c2",
                    "subject": {"reference": "Patient/123"},
                    "code": {"coding": [{"system": "http://snomed.info/sct", "code": "38341003"}]}
                }},
                {"resource": {
                    "resourceType": "Condition", "id": "c3",
                    "subject": {"reference": "Patient/456"},
                    "code": {"coding": [{"system": "http://snomed.info/sct", "code": "44054006"}]}
                }}
            ]
        });
        Arc::new(InMemoryStore::from_json(&bundle).unwrap())
    }

    #[tokio::test]
    async fn test_terminology_from_compose_and_expansion() {
        let terminology = StoreTerminologyProvider::new(store());

        let member = Code::new("http://snomed.info/sct", "73211009");
        assert!(terminology.in_value_set(&member, DIABETES).await.unwrap());

        let nested = terminology
            .expand("http://example.org/ValueSet/expanded")
            .await
            .unwrap();
        assert_eq!(nested.len(), 2);

        let missing = terminology.expand("http://example.org/ValueSet/none").await;
        assert!(matches!(missing, Err(TerminologyError::ValueSetNotFound(_))));
    }

    #[tokio::test]
    async fn test_retrieve_filters_by_subject_and_value_set() {
        let store = store();
        let terminology = Arc::new(StoreTerminologyProvider::new(store.clone()));

        for expand in [false, true] {
            let source = StoreDataSource::new(store.clone(), terminology.clone())
                .with_expand_value_sets(expand);
            let request = RetrieveRequest::new("Condition")
                .with_context("Patient", Some("123".to_string()))
                .with_value_set("code", DIABETES);

            let records = source.retrieve(&request).await.unwrap();
            let ids: Vec<_> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
            assert_eq!(ids, vec!["c1"]);
        }
    }

    #[tokio::test]
    async fn test_unknown_value_set_is_an_error() {
        let store = store();
        let source = StoreDataSource::new(store.clone(), Arc::new(StoreTerminologyProvider::new(store)));
        let request = RetrieveRequest::new("Condition")
            .with_value_set("code", "http://example.org/ValueSet/unknown");

        let result = source.retrieve(&request).await;
        assert!(matches!(result, Err(DataSourceError::Terminology(_))));
    }
}
