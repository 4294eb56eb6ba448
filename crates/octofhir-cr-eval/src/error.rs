//! Errors raised while loading and evaluating logic

use octofhir_cr_model::{DataSourceError, LibraryIdentifier, TerminologyError};
use thiserror::Error;

/// Result type for expression evaluation
pub type EvalResult<T> = Result<T, EvalError>;

/// Runtime failure of a single expression.
///
/// These are recovered per expression and reported inline.
#[derive(Debug, Error, Clone)]
pub enum EvalError {
    /// Type mismatch error
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Invalid operand error
    #[error("Invalid operand for {operator}: {message}")]
    InvalidOperand { operator: String, message: String },

    /// More than one element where a singleton was required
    #[error("Expected a list with at most one element, but found {count}")]
    SingletonCardinality { count: usize },

    /// Arithmetic overflow
    #[error("Arithmetic overflow in {operation}")]
    Overflow { operation: String },

    /// Undefined expression reference
    #[error("Undefined expression: {name}")]
    UndefinedExpression { name: String },

    /// Undefined alias (query scope)
    #[error("Undefined alias: {name}")]
    UndefinedAlias { name: String },

    /// Value set not declared by the library
    #[error("Value set not found: {name}")]
    ValueSetNotFound { name: String },

    /// Terminology service error
    #[error("Terminology service error: {message}")]
    TerminologyError { message: String },

    /// Data provider error
    #[error("Data provider error: {message}")]
    DataProviderError { message: String },

    /// Internal error; message may be empty
    #[error("{message}")]
    Internal { message: String },
}

impl EvalError {
    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an invalid operand error
    pub fn invalid_operand(operator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOperand {
            operator: operator.into(),
            message: message.into(),
        }
    }

    /// Create an overflow error
    pub fn overflow(operation: impl Into<String>) -> Self {
        Self::Overflow {
            operation: operation.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Category name of the failure
    pub fn category(&self) -> &'static str {
        match self {
            Self::TypeMismatch { .. } => "TypeMismatch",
            Self::InvalidOperand { .. } => "InvalidOperand",
            Self::SingletonCardinality { .. } => "SingletonCardinality",
            Self::Overflow { .. } => "Overflow",
            Self::UndefinedExpression { .. } => "UndefinedExpression",
            Self::UndefinedAlias { .. } => "UndefinedAlias",
            Self::ValueSetNotFound { .. } => "ValueSetNotFound",
            Self::TerminologyError { .. } => "TerminologyError",
            Self::DataProviderError { .. } => "DataProviderError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// Message text, falling back to the category name when empty
    pub fn report(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            self.category().to_string()
        } else {
            message
        }
    }
}

impl From<DataSourceError> for EvalError {
    fn from(error: DataSourceError) -> Self {
        Self::DataProviderError {
            message: error.to_string(),
        }
    }
}

impl From<TerminologyError> for EvalError {
    fn from(error: TerminologyError) -> Self {
        Self::TerminologyError {
            message: error.to_string(),
        }
    }
}

/// Failure to obtain an executable library
#[derive(Debug, Error, Clone)]
pub enum LibraryError {
    /// No content provider knows the identifier
    #[error("Could not resolve library {0}")]
    NotFound(LibraryIdentifier),

    /// The source was found but failed to translate
    #[error("Failed to translate library {identifier}: {message}")]
    Translation {
        identifier: LibraryIdentifier,
        message: String,
    },

    /// A content provider failed or returned unreadable content
    #[error("Invalid content for library {identifier}: {message}")]
    Content {
        identifier: LibraryIdentifier,
        message: String,
    },
}

/// Failure of a whole evaluation request
#[derive(Debug, Error, Clone)]
pub enum EvaluateError {
    /// Request parameters are malformed or contradictory
    #[error("{0}")]
    Validation(String),

    /// The library could not be resolved or translated
    #[error(transparent)]
    Library(#[from] LibraryError),
}

impl EvaluateError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_falls_back_to_category() {
        let empty = EvalError::internal("");
        assert_eq!(empty.report(), "InternalError");

        let mismatch = EvalError::type_mismatch("Integer", "String");
        assert_eq!(mismatch.report(), "Type mismatch: expected Integer, found String");
    }
}
