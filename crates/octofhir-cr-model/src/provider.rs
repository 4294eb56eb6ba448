//! Data source and terminology provider traits

use crate::store::StoreError;
use crate::value::Code;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Parameters of a single retrieve
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrieveRequest {
    /// Resource type to retrieve (e.g., "Condition", "Observation")
    pub data_type: String,
    /// Context type the retrieve is bound to (e.g., "Patient")
    pub context_type: Option<String>,
    /// Context value (e.g., the patient id)
    pub context_id: Option<String>,
    /// Path of the coded element used for terminology filtering
    pub code_path: Option<String>,
    /// Value set url the coded element must be a member of
    pub value_set: Option<String>,
}

impl RetrieveRequest {
    pub fn new(data_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context_type: impl Into<String>, context_id: Option<String>) -> Self {
        self.context_type = Some(context_type.into());
        self.context_id = context_id;
        self
    }

    pub fn with_value_set(mut self, code_path: impl Into<String>, value_set: impl Into<String>) -> Self {
        self.code_path = Some(code_path.into());
        self.value_set = Some(value_set.into());
        self
    }

    /// Subject reference (`Patient/123`) when bound to a subject context
    pub fn subject_reference(&self) -> Option<String> {
        match (&self.context_type, &self.context_id) {
            (Some(context), Some(id)) if context != "Unfiltered" && context != "Unspecified" => {
                Some(format!("{}/{}", context, id))
            }
            _ => None,
        }
    }
}

/// Source of clinical records for retrieves
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Retrieve the records matching the request
    async fn retrieve(&self, request: &RetrieveRequest) -> Result<Vec<JsonValue>, DataSourceError>;

    /// Short description used in logs
    fn describe(&self) -> String;
}

/// Value set membership and expansion
#[async_trait]
pub trait TerminologyProvider: Send + Sync {
    /// Whether `code` is a member of the value set identified by `value_set`
    async fn in_value_set(&self, code: &Code, value_set: &str) -> Result<bool, TerminologyError>;

    /// All codes of the value set
    async fn expand(&self, value_set: &str) -> Result<Vec<Code>, TerminologyError>;

    /// Short description used in logs
    fn describe(&self) -> String;
}

/// Data source error
#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    #[error("Retrieve failed: {0}")]
    RetrieveFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Terminology error: {0}")]
    Terminology(#[from] TerminologyError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Terminology error
#[derive(Debug, thiserror::Error)]
pub enum TerminologyError {
    #[error("Value set not found: {0}")]
    ValueSetNotFound(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid terminology response: {0}")]
    InvalidResponse(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_reference() {
        let request = RetrieveRequest::new("Condition").with_context("Patient", Some("123".into()));
        assert_eq!(request.subject_reference().as_deref(), Some("Patient/123"));

        let unfiltered = RetrieveRequest::new("Condition").with_context("Unfiltered", Some("x".into()));
        assert_eq!(unfiltered.subject_reference(), None);
    }
}
