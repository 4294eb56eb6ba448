//! Library evaluation with per-expression failure isolation

use crate::classify::ExpressionResult;
use crate::context::{EvaluationContext, ParameterSet};
use crate::engine::ExpressionEngine;
use crate::error::{EvalError, EvaluateError, LibraryError};
use crate::logic::{CompiledLibrary, ContentProvider, LibraryCache};
use crate::retrieve::ComposedProviders;
use indexmap::IndexMap;
use octofhir_cr_model::{LibraryIdentifier, Value};
use std::sync::Arc;

/// Outcome of one named expression
#[derive(Debug, Clone)]
pub enum ExpressionOutcome {
    Value(Value),
    Error(EvalError),
}

impl ExpressionOutcome {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&EvalError> {
        match self {
            Self::Value(_) => None,
            Self::Error(error) => Some(error),
        }
    }

    /// Classified, serializable form
    pub fn to_result(&self, name: &str, summary: bool) -> ExpressionResult {
        match self {
            Self::Value(value) => ExpressionResult::success(name, value, summary),
            Self::Error(error) => ExpressionResult::failure(name, error.report()),
        }
    }
}

impl From<Result<Value, EvalError>> for ExpressionOutcome {
    fn from(result: Result<Value, EvalError>) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(error) => Self::Error(error),
        }
    }
}

/// Evaluates libraries against the providers composed for one request
pub struct LibraryEvaluator {
    cache: Arc<LibraryCache>,
    content: Vec<Arc<dyn ContentProvider>>,
    providers: ComposedProviders,
}

impl LibraryEvaluator {
    /// `content` is consulted in order when a library is not yet cached
    pub fn new(
        cache: Arc<LibraryCache>,
        content: Vec<Arc<dyn ContentProvider>>,
        providers: ComposedProviders,
    ) -> Self {
        Self {
            cache,
            content,
            providers,
        }
    }

    pub fn providers(&self) -> &ComposedProviders {
        &self.providers
    }

    pub fn cache(&self) -> &LibraryCache {
        &self.cache
    }

    /// Resolve a library through the cache
    pub async fn resolve(
        &self,
        identifier: &LibraryIdentifier,
    ) -> Result<Arc<CompiledLibrary>, LibraryError> {
        self.cache.resolve(identifier, &self.content).await
    }

    /// Evaluate every definition of a library.
    ///
    /// Request-level problems (invalid context, unresolvable or untranslatable
    /// library) fail the whole call; a failing expression only fails its own
    /// entry.
    pub async fn evaluate(
        &self,
        identifier: &LibraryIdentifier,
        context: &EvaluationContext,
        parameters: &ParameterSet,
        debug: bool,
    ) -> Result<IndexMap<String, ExpressionOutcome>, EvaluateError> {
        context.validate()?;
        let library = self.resolve(identifier).await?;
        Ok(self
            .evaluate_library(&library, context, parameters, debug)
            .await)
    }

    /// Evaluate every definition of an already resolved library
    pub async fn evaluate_library(
        &self,
        library: &CompiledLibrary,
        context: &EvaluationContext,
        parameters: &ParameterSet,
        debug: bool,
    ) -> IndexMap<String, ExpressionOutcome> {
        let engine = ExpressionEngine::new(
            library,
            context,
            parameters,
            self.providers.data.as_ref(),
            self.providers.terminology.as_ref(),
        );

        let mut results = IndexMap::new();
        for definition in library.definitions() {
            let outcome = ExpressionOutcome::from(engine.evaluate_definition(&definition.name).await);
            if debug {
                match &outcome {
                    ExpressionOutcome::Value(value) => {
                        log::debug!("{} = {}", definition.name, value)
                    }
                    ExpressionOutcome::Error(error) => {
                        log::debug!("{} failed: {}", definition.name, error.report())
                    }
                }
            }
            results.insert(definition.name.clone(), outcome);
        }
        results
    }

    /// Evaluate selected definitions only, in the given order
    pub async fn evaluate_expressions(
        &self,
        library: &CompiledLibrary,
        names: &[&str],
        context: &EvaluationContext,
        parameters: &ParameterSet,
    ) -> IndexMap<String, ExpressionOutcome> {
        let engine = ExpressionEngine::new(
            library,
            context,
            parameters,
            self.providers.data.as_ref(),
            self.providers.terminology.as_ref(),
        );
        let mut results = IndexMap::new();
        for name in names {
            let outcome = ExpressionOutcome::from(engine.evaluate_definition(name).await);
            results.insert((*name).to_string(), outcome);
        }
        results
    }
}
