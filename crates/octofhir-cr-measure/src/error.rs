//! Measure and care-gaps errors

use octofhir_cr_eval::{ComposeError, EvaluateError, LibraryError};
use octofhir_cr_model::StoreError;
use thiserror::Error;

/// Failure of a measure evaluation request
#[derive(Debug, Error)]
pub enum MeasureError {
    /// Request parameters are malformed or contradictory
    #[error("{0}")]
    Validation(String),

    /// A referenced measure, library or group does not exist
    #[error("Could not resolve {0}")]
    NotFound(String),

    /// A resource exists but cannot be used
    #[error("Invalid {reference}: {message}")]
    InvalidResource { reference: String, message: String },

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MeasureError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<EvaluateError> for MeasureError {
    fn from(error: EvaluateError) -> Self {
        match error {
            EvaluateError::Validation(message) => Self::Validation(message),
            EvaluateError::Library(error) => Self::Library(error),
        }
    }
}

/// Failure of a care-gaps request
#[derive(Debug, Error)]
pub enum CareGapsError {
    /// Request parameters are malformed or contradictory
    #[error("{0}")]
    Validation(String),

    /// Required server configuration is missing
    #[error("{0}")]
    Configuration(String),

    /// A request shape that is accepted but not implemented
    #[error("{0}")]
    Unsupported(String),

    #[error(transparent)]
    Measure(#[from] MeasureError),

    #[error("Failed to render care-gaps document: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CareGapsError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
