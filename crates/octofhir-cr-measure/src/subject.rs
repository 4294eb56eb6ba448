//! Subject selection for measure and care-gaps evaluation

use crate::error::MeasureError;
use octofhir_cr_model::fhir::Group;
use octofhir_cr_model::{ResourceStore, SearchParams, StoreError};
use serde_json::Value as JsonValue;
use std::fmt;

/// Subject of an evaluation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Patient(String),
    Group(String),
}

impl Subject {
    /// Parse `Patient/<id>`, `Group/<id>` or a bare patient id
    pub fn parse(reference: &str) -> Result<Self, MeasureError> {
        let reference = reference.trim();
        let (resource_type, id) = reference.split_once('/').unwrap_or(("Patient", reference));
        if id.is_empty() || id.contains('/') {
            return Err(MeasureError::validation(format!(
                "Invalid subject reference: {}",
                reference
            )));
        }
        match resource_type {
            "Patient" => Ok(Self::Patient(id.to_string())),
            "Group" => Ok(Self::Group(id.to_string())),
            other => Err(MeasureError::validation(format!(
                "Subject must be a Patient or Group reference, found {}",
                other
            ))),
        }
    }

    pub fn reference(&self) -> String {
        self.to_string()
    }

    /// Ids of the patients this subject stands for.
    ///
    /// Inactive and non-patient group members are skipped.
    pub async fn patient_ids(&self, store: &dyn ResourceStore) -> Result<Vec<String>, MeasureError> {
        match self {
            Self::Patient(id) => Ok(vec![id.clone()]),
            Self::Group(id) => {
                let json = match store.read("Group", id).await {
                    Ok(json) => json,
                    Err(StoreError::NotFound { .. }) => {
                        return Err(MeasureError::NotFound(self.reference()));
                    }
                    Err(e) => return Err(e.into()),
                };
                let group: Group =
                    serde_json::from_value(json).map_err(|e| MeasureError::InvalidResource {
                        reference: self.reference(),
                        message: e.to_string(),
                    })?;
                Ok(group
                    .member
                    .iter()
                    .filter(|member| member.inactive != Some(true))
                    .filter_map(|member| member.entity.reference.as_deref())
                    .filter_map(|reference| reference.strip_prefix("Patient/"))
                    .map(str::to_string)
                    .collect())
            }
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patient(id) => write!(f, "Patient/{}", id),
            Self::Group(id) => write!(f, "Group/{}", id),
        }
    }
}

/// Ids of every patient in the store
pub async fn all_patient_ids(store: &dyn ResourceStore) -> Result<Vec<String>, MeasureError> {
    Ok(store
        .search("Patient", &SearchParams::default())
        .await?
        .iter()
        .filter_map(|patient| patient.get("id").and_then(JsonValue::as_str))
        .map(str::to_string)
        .collect())
}
