//! Operation-level errors

use octofhir_cr_eval::{ComposeError, EvaluateError, LibraryError};
use octofhir_cr_measure::{CareGapsError, MeasureError};
use octofhir_cr_model::StoreError;
use thiserror::Error;

/// Failure of a whole operation
#[derive(Debug, Error)]
pub enum CrError {
    /// Malformed or contradictory request parameters
    #[error("{0}")]
    Validation(String),

    /// A referenced library, measure or subject does not exist
    #[error("{0}")]
    Resolution(String),

    /// Logic content could not be translated
    #[error("{0}")]
    Translation(String),

    /// Unknown operation, or a request shape that is not implemented
    #[error("{0}")]
    UnsupportedOperation(String),

    /// Missing or invalid server configuration
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Internal(String),
}

impl CrError {
    /// Kind name of the failure
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Resolution(_) => "ResolutionError",
            Self::Translation(_) => "TranslationError",
            Self::UnsupportedOperation(_) => "UnsupportedOperation",
            Self::Configuration(_) => "ConfigurationError",
            Self::Internal(_) => "InternalError",
        }
    }
}

impl From<LibraryError> for CrError {
    fn from(error: LibraryError) -> Self {
        match error {
            LibraryError::Translation { .. } => Self::Translation(error.to_string()),
            LibraryError::NotFound(_) | LibraryError::Content { .. } => {
                Self::Resolution(error.to_string())
            }
        }
    }
}

impl From<EvaluateError> for CrError {
    fn from(error: EvaluateError) -> Self {
        match error {
            EvaluateError::Validation(message) => Self::Validation(message),
            EvaluateError::Library(error) => error.into(),
        }
    }
}

impl From<ComposeError> for CrError {
    fn from(error: ComposeError) -> Self {
        Self::Validation(error.to_string())
    }
}

impl From<StoreError> for CrError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { .. } => Self::Resolution(error.to_string()),
            _ => Self::Internal(error.to_string()),
        }
    }
}

impl From<MeasureError> for CrError {
    fn from(error: MeasureError) -> Self {
        match error {
            MeasureError::Validation(message) => Self::Validation(message),
            MeasureError::NotFound(_) | MeasureError::InvalidResource { .. } => {
                Self::Resolution(error.to_string())
            }
            MeasureError::Library(error) => error.into(),
            MeasureError::Compose(error) => error.into(),
            MeasureError::Store(error) => error.into(),
        }
    }
}

impl From<CareGapsError> for CrError {
    fn from(error: CareGapsError) -> Self {
        match error {
            CareGapsError::Validation(message) => Self::Validation(message),
            CareGapsError::Configuration(message) => Self::Configuration(message),
            CareGapsError::Unsupported(message) => Self::UnsupportedOperation(message),
            CareGapsError::Measure(error) => error.into(),
            CareGapsError::Serialization(error) => Self::Internal(error.to_string()),
        }
    }
}
