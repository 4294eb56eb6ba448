//! Resource store seam and in-memory implementation

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;

/// Resource store error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Resource not found: {resource_type}/{id}")]
    NotFound { resource_type: String, id: String },

    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Search criteria understood by every store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pub id: Option<String>,
    /// Exact, case-insensitive match on `name`
    pub name: Option<String>,
    pub url: Option<String>,
    pub version: Option<String>,
    /// Subject reference such as `Patient/123`
    pub subject: Option<String>,
}

impl SearchParams {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn by_url(url: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            url: Some(url.into()),
            version: version.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn by_subject(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::default()
        }
    }

    /// Whether a resource satisfies every populated criterion
    pub fn matches(&self, resource_type: &str, resource: &JsonValue) -> bool {
        let text = |key: &str| resource.get(key).and_then(JsonValue::as_str);
        if let Some(id) = &self.id {
            if text("id") != Some(id.as_str()) {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if !text("name").is_some_and(|n| n.eq_ignore_ascii_case(name)) {
                return false;
            }
        }
        if let Some(url) = &self.url {
            if text("url") != Some(url.as_str()) {
                return false;
            }
        }
        if let Some(version) = &self.version {
            if text("version") != Some(version.as_str()) {
                return false;
            }
        }
        if let Some(subject) = &self.subject {
            if !references_subject(resource_type, resource, subject) {
                return false;
            }
        }
        true
    }
}

/// Storage of clinical and knowledge resources
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Read a resource by type and logical id
    async fn read(&self, resource_type: &str, id: &str) -> Result<JsonValue, StoreError>;

    /// Search resources of a type
    async fn search(
        &self,
        resource_type: &str,
        params: &SearchParams,
    ) -> Result<Vec<JsonValue>, StoreError>;
}

/// Whether a resource belongs to the given subject reference (`Type/id`).
///
/// The subject resource itself matches, as do resources pointing at it via
/// `subject` or `patient`.
pub fn references_subject(resource_type: &str, resource: &JsonValue, subject: &str) -> bool {
    let (subject_type, subject_id) = match subject.split_once('/') {
        Some(parts) => parts,
        None => ("Patient", subject),
    };
    if resource_type == subject_type {
        return resource.get("id").and_then(JsonValue::as_str) == Some(subject_id);
    }
    let expected = format!("{}/{}", subject_type, subject_id);
    ["subject", "patient"].iter().any(|element| {
        resource
            .get(element)
            .and_then(|r| r.get("reference"))
            .and_then(JsonValue::as_str)
            .is_some_and(|r| r == expected || r.ends_with(&format!("/{}", expected)))
    })
}

/// In-memory store keyed by resource type then id
#[derive(Default)]
pub struct InMemoryStore {
    resources: RwLock<IndexMap<String, IndexMap<String, JsonValue>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a resource or a bundle of resources
    pub fn from_json(json: &JsonValue) -> Result<Self, StoreError> {
        let store = Self::new();
        store.load(json)?;
        Ok(store)
    }

    /// Insert a resource, or every entry of a bundle
    pub fn load(&self, json: &JsonValue) -> Result<usize, StoreError> {
        if json.get("resourceType").and_then(JsonValue::as_str) == Some("Bundle") {
            let mut count = 0;
            if let Some(entries) = json.get("entry").and_then(JsonValue::as_array) {
                for entry in entries {
                    if let Some(resource) = entry.get("resource") {
                        count += self.load(resource)?;
                    }
                }
            }
            return Ok(count);
        }
        self.insert(json.clone())?;
        Ok(1)
    }

    /// Insert or replace a single resource
    pub fn insert(&self, resource: JsonValue) -> Result<(), StoreError> {
        let resource_type = resource
            .get("resourceType")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| StoreError::InvalidResource("missing resourceType".to_string()))?
            .to_string();
        let id = resource
            .get("id")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| {
                StoreError::InvalidResource(format!("{} without id", resource_type))
            })?
            .to_string();

        log::trace!("store insert {}/{}", resource_type, id);
        self.resources
            .write()
            .entry(resource_type)
            .or_default()
            .insert(id, resource);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.resources.read().values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn read(&self, resource_type: &str, id: &str) -> Result<JsonValue, StoreError> {
        self.resources
            .read()
            .get(resource_type)
            .and_then(|by_id| by_id.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            })
    }

    async fn search(
        &self,
        resource_type: &str,
        params: &SearchParams,
    ) -> Result<Vec<JsonValue>, StoreError> {
        Ok(self
            .resources
            .read()
            .get(resource_type)
            .map(|by_id| {
                by_id
                    .values()
                    .filter(|r| params.matches(resource_type, r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle() -> JsonValue {
        json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [
                {"resource": {"resourceType": "Patient", "id": "123"}},
                {"resource": {"resourceType": "Condition", "id": "c1", "subject": {"reference": "Patient/123"}}},
                {"resource": {"resourceType": "Condition", "id": "c2", "subject": {"reference": "Patient/456"}}},
                {"resource": {"resourceType": "Library", "id": "lib", "name": "Test", "version": "1.0.0"}}
            ]
        })
    }

    #[tokio::test]
    async fn test_load_bundle_and_read() {
        let store = InMemoryStore::from_json(&bundle()).unwrap();
        assert_eq!(store.len(), 4);

        let patient = store.read("Patient", "123").await.unwrap();
        assert_eq!(patient["id"], "123");

        let missing = store.read("Patient", "nope").await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_search_by_subject_and_name() {
        let store = InMemoryStore::from_json(&bundle()).unwrap();

        let conditions = store
            .search("Condition", &SearchParams::by_subject("Patient/123"))
            .await
            .unwrap();
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0]["id"], "c1");

        let libraries = store
            .search("Library", &SearchParams::by_name("test"))
            .await
            .unwrap();
        assert_eq!(libraries.len(), 1);
    }

    #[test]
    fn test_insert_requires_id() {
        let store = InMemoryStore::new();
        let result = store.insert(json!({"resourceType": "Patient"}));
        assert!(matches!(result, Err(StoreError::InvalidResource(_))));
    }
}
