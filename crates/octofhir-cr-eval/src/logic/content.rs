//! Logic content providers
//!
//! A content provider maps a [`LibraryIdentifier`] to ELM JSON source text.
//! Providers are consulted in the caller's order; the first one with content
//! wins.

use crate::error::LibraryError;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use octofhir_cr_model::fhir::{Attachment, Library};
use octofhir_cr_model::{
    LibraryIdentifier, ResourceStore, SearchParams, select_from_list,
};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

/// Content type of the executable form carried by Library resources
pub const ELM_JSON_CONTENT_TYPE: &str = "application/elm+json";

/// Source of logic library content
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// ELM JSON for the identifier, or `None` when this provider has no content
    async fn fetch(&self, identifier: &LibraryIdentifier) -> Result<Option<String>, LibraryError>;
}

/// Content from Library resources embedded in a request bundle
pub struct BundleContentProvider {
    libraries: Vec<Library>,
}

impl BundleContentProvider {
    /// Collect the Library entries of a bundle (or a single Library resource)
    pub fn from_json(json: &JsonValue) -> Self {
        let mut libraries = Vec::new();
        collect_libraries(json, &mut libraries);
        Self { libraries }
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

fn collect_libraries(json: &JsonValue, out: &mut Vec<Library>) {
    match json.get("resourceType").and_then(JsonValue::as_str) {
        Some("Bundle") => {
            for resource in json
                .get("entry")
                .and_then(JsonValue::as_array)
                .into_iter()
                .flatten()
                .filter_map(|entry| entry.get("resource"))
            {
                collect_libraries(resource, out);
            }
        }
        Some("Library") => match serde_json::from_value::<Library>(json.clone()) {
            Ok(library) => out.push(library),
            Err(e) => log::warn!("skipping unreadable embedded Library: {}", e),
        },
        _ => {}
    }
}

#[async_trait]
impl ContentProvider for BundleContentProvider {
    async fn fetch(&self, identifier: &LibraryIdentifier) -> Result<Option<String>, LibraryError> {
        let candidates: Vec<&Library> = self
            .libraries
            .iter()
            .filter(|l| {
                l.name
                    .as_deref()
                    .is_some_and(|n| n.eq_ignore_ascii_case(&identifier.name))
            })
            .collect();
        match select_from_list(&candidates, identifier.version.as_deref(), |l| {
            l.version.as_deref()
        }) {
            Some(library) => elm_content(library, identifier),
            None => Ok(None),
        }
    }
}

/// Content from Library resources held in the resource store
pub struct StoreContentProvider {
    store: Arc<dyn ResourceStore>,
}

impl StoreContentProvider {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ContentProvider for StoreContentProvider {
    async fn fetch(&self, identifier: &LibraryIdentifier) -> Result<Option<String>, LibraryError> {
        let found = self
            .store
            .search("Library", &SearchParams::by_name(&identifier.name))
            .await
            .map_err(|e| LibraryError::Content {
                identifier: identifier.clone(),
                message: e.to_string(),
            })?;

        let mut libraries = Vec::with_capacity(found.len());
        for resource in found {
            let library: Library =
                serde_json::from_value(resource).map_err(|e| LibraryError::Content {
                    identifier: identifier.clone(),
                    message: e.to_string(),
                })?;
            libraries.push(library);
        }

        match select_from_list(&libraries, identifier.version.as_deref(), |l| {
            l.version.as_deref()
        }) {
            Some(library) => elm_content(library, identifier),
            None => Ok(None),
        }
    }
}

/// Decode the ELM JSON attachment of a Library, if it has one
fn elm_content(
    library: &Library,
    identifier: &LibraryIdentifier,
) -> Result<Option<String>, LibraryError> {
    let Some(data) = library
        .content
        .iter()
        .find(|a| a.content_type.as_deref() == Some(ELM_JSON_CONTENT_TYPE))
        .and_then(|a| a.data.as_deref())
    else {
        log::debug!(
            "library {} has no {} content",
            identifier,
            ELM_JSON_CONTENT_TYPE
        );
        return Ok(None);
    };

    let content_error = |message: String| LibraryError::Content {
        identifier: identifier.clone(),
        message,
    };
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| content_error(format!("invalid base64 content: {}", e)))?;
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|e| content_error(format!("content is not UTF-8: {}", e)))
}

/// Build a Library resource carrying the given ELM JSON as its content
pub fn library_resource(id: &str, name: &str, version: Option<&str>, elm_json: &str) -> JsonValue {
    let library = Library {
        id: Some(id.to_string()),
        url: Some(format!("http://example.org/Library/{}", name)),
        name: Some(name.to_string()),
        version: version.map(str::to_string),
        content: vec![Attachment {
            content_type: Some(ELM_JSON_CONTENT_TYPE.to_string()),
            data: Some(STANDARD.encode(elm_json)),
        }],
    };
    let mut json = json!({"resourceType": "Library"});
    if let (Some(target), Ok(JsonValue::Object(fields))) =
        (json.as_object_mut(), serde_json::to_value(library))
    {
        target.extend(fields);
    }
    json
}
