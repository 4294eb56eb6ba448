//! Clinical logic evaluation pipeline
//!
//! This crate loads executable logic, caches it, and evaluates it against
//! clinical data drawn from prioritized data sources:
//!
//! - **Retrieval**: store, embedded-bundle and remote REST data sources,
//!   composed into a priority-fallback retriever, plus terminology providers
//! - **Logic**: content providers, translation of ELM JSON into an executable
//!   library, and a process-wide library cache
//! - **Evaluation**: per-expression evaluation with failure isolation
//! - **Classification**: typed, serializable expression results
//!
//! # Example
//!
//! ```ignore
//! use octofhir_cr_eval::{LibraryCache, LibraryEvaluator, EvaluationContext};
//!
//! let cache = Arc::new(LibraryCache::new());
//! let evaluator = LibraryEvaluator::new(cache, providers, composed);
//! let results = evaluator
//!     .evaluate(&id, &EvaluationContext::patient("123"), &params, false)
//!     .await?;
//! ```

pub mod classify;
pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod logic;
pub mod operators;
pub mod retrieve;

pub use classify::{Classification, ClassifiedValue, ExpressionResult, classify};
pub use context::{
    EvaluationContext, MEASUREMENT_PERIOD, PRODUCT_LINE, ParameterSet, measurement_period,
    resolve_request_date,
};
pub use engine::ExpressionEngine;
pub use error::{EvalError, EvalResult, EvaluateError, LibraryError};
pub use evaluator::{ExpressionOutcome, LibraryEvaluator};
pub use logic::{
    BundleContentProvider, CacheStats, CompiledLibrary, ContentProvider, ELM_JSON_CONTENT_TYPE,
    LibraryCache, StoreContentProvider, TranslationError, library_resource, translate,
};
pub use retrieve::{
    BundleDataSource, ComposeError, ComposedProviders, FhirClient, PriorityRetriever,
    RemoteTerminologyProvider, RestDataSource, RetrievalComposer, RetrievalOptions, SourceKind,
    StoreDataSource, StoreTerminologyProvider,
};
