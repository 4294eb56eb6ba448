//! Operation service and name-keyed dispatch
//!
//! Every operation is reachable as a typed method and through
//! [`CrService::dispatch`], which takes the operation name (with or without
//! the leading `$`) and JSON parameters.

use crate::config::CrConfig;
use crate::error::CrError;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use octofhir_cr_eval::{
    BundleContentProvider, ContentProvider, EvaluationContext, ExpressionResult, LibraryCache,
    LibraryEvaluator, ParameterSet, RetrievalComposer, RetrievalOptions, StoreContentProvider,
};
use octofhir_cr_measure::{
    CareGapsAggregator, CareGapsReport, CareGapsRequest, MeasureEvaluator, MeasureRequest,
};
use octofhir_cr_model::fhir::{Endpoint, MeasureReport};
use octofhir_cr_model::{LibraryIdentifier, ResourceStore, StoreError, Value};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub const EVALUATE: &str = "$evaluate";
pub const EVALUATE_MEASURE: &str = "$evaluate-measure";
pub const CARE_GAPS: &str = "$care-gaps";

type Handler = for<'a> fn(&'a CrService, JsonValue) -> BoxFuture<'a, Result<JsonValue, CrError>>;

/// `$evaluate` request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluateRequest {
    /// Library id, optionally prefixed with `Library/`
    pub library: String,
    pub patient_id: Option<String>,
    /// Context type used without a patient; `Unspecified` when absent
    pub context: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub product_line: Option<String>,
    /// Named parameter values
    pub parameters: IndexMap<String, JsonValue>,
    /// `Summary` (default) renders resources as references, `Full` inline
    pub execution_results: Option<String>,
    /// Bundle or resource; Library entries shadow stored logic
    pub additional_data: Option<JsonValue>,
    pub terminology_endpoint: Option<Endpoint>,
    pub data_endpoint: Option<Endpoint>,
}

impl EvaluateRequest {
    pub fn new(library: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            ..Self::default()
        }
    }

    pub fn with_patient(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    fn summary(&self) -> bool {
        !self
            .execution_results
            .as_deref()
            .is_some_and(|mode| mode.eq_ignore_ascii_case("full"))
    }

    fn context(&self) -> EvaluationContext {
        match &self.patient_id {
            Some(patient) => {
                EvaluationContext::patient(patient.strip_prefix("Patient/").unwrap_or(patient))
            }
            None => EvaluationContext {
                context_type: self
                    .context
                    .clone()
                    .unwrap_or_else(|| "Unspecified".to_string()),
                context_id: None,
            },
        }
    }
}

/// Clinical reasoning operations over one resource store
pub struct CrService {
    store: Arc<dyn ResourceStore>,
    cache: Arc<LibraryCache>,
    config: CrConfig,
    handlers: HashMap<&'static str, Handler>,
}

impl CrService {
    pub fn new(store: Arc<dyn ResourceStore>, config: CrConfig) -> Self {
        let mut handlers: HashMap<&'static str, Handler> = HashMap::new();
        handlers.insert(EVALUATE, evaluate_handler);
        handlers.insert(EVALUATE_MEASURE, evaluate_measure_handler);
        handlers.insert(CARE_GAPS, care_gaps_handler);

        Self {
            store,
            cache: Arc::new(LibraryCache::new()),
            config,
            handlers,
        }
    }

    pub fn config(&self) -> &CrConfig {
        &self.config
    }

    /// Process-wide library cache
    pub fn cache(&self) -> &Arc<LibraryCache> {
        &self.cache
    }

    /// Names of the registered operations, sorted
    pub fn operations(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Run an operation by name
    pub async fn dispatch(&self, operation: &str, params: JsonValue) -> Result<JsonValue, CrError> {
        let name = format!("${}", operation.trim_start_matches('$'));
        let handler = self.handlers.get(name.as_str()).ok_or_else(|| {
            CrError::UnsupportedOperation(format!("Unknown operation: {}", operation))
        })?;
        log::debug!("dispatching {}", name);
        handler(self, params).await
    }

    /// `$evaluate`: every expression of a library, in definition order
    pub async fn evaluate(&self, request: &EvaluateRequest) -> Result<Vec<ExpressionResult>, CrError> {
        let id = request
            .library
            .strip_prefix("Library/")
            .unwrap_or(&request.library);
        if id.trim().is_empty() {
            return Err(CrError::Validation("Parameter 'library' is required".to_string()));
        }

        let library = self.library_by_id(id, request.additional_data.as_ref()).await?;
        let text = |key: &str| library.get(key).and_then(JsonValue::as_str);
        let name = text("name").ok_or_else(|| {
            CrError::Resolution(format!("Library/{} does not declare a name", id))
        })?;
        let identifier = LibraryIdentifier::new(name, text("version"));

        let named = request
            .parameters
            .iter()
            .map(|(name, value)| (name.clone(), Value::from_json(value)))
            .collect();
        let parameters = ParameterSet::from_named(named)
            .with_period(request.period_start.as_deref(), request.period_end.as_deref())?
            .with_product_line(request.product_line.as_deref());

        let evaluator = self.library_evaluator(request)?;
        let outcomes = evaluator
            .evaluate(
                &identifier,
                &request.context(),
                &parameters,
                self.config.evaluation.debug,
            )
            .await?;

        let summary = request.summary();
        Ok(outcomes
            .iter()
            .map(|(name, outcome)| outcome.to_result(name, summary))
            .collect())
    }

    /// `$evaluate-measure`
    pub async fn evaluate_measure(&self, request: &MeasureRequest) -> Result<MeasureReport, CrError> {
        Ok(self.measure_evaluator().evaluate_measure(request).await?)
    }

    /// `$care-gaps`: one document bundle per subject with reportable gaps
    pub async fn care_gaps(&self, request: &CareGapsRequest) -> Result<Vec<CareGapsReport>, CrError> {
        let aggregator = CareGapsAggregator::new(
            self.measure_evaluator(),
            self.config.measure_report.reporter.clone(),
        );
        Ok(aggregator.compute(request).await?)
    }

    fn request_cache(&self) -> Arc<LibraryCache> {
        if self.config.cache.enabled {
            Arc::clone(&self.cache)
        } else {
            Arc::new(LibraryCache::new())
        }
    }

    fn measure_evaluator(&self) -> MeasureEvaluator {
        MeasureEvaluator::new(Arc::clone(&self.store), self.request_cache())
            .with_debug(self.config.evaluation.debug)
    }

    fn library_evaluator(&self, request: &EvaluateRequest) -> Result<LibraryEvaluator, CrError> {
        let options = RetrievalOptions {
            terminology_endpoint: request.terminology_endpoint.clone(),
            data_endpoint: request.data_endpoint.clone(),
            data: request.additional_data.clone(),
        };
        let providers = RetrievalComposer::new(Arc::clone(&self.store)).compose(&options)?;
        let stored: Arc<dyn ContentProvider> =
            Arc::new(StoreContentProvider::new(Arc::clone(&self.store)));

        let embedded = request
            .additional_data
            .as_ref()
            .map(BundleContentProvider::from_json)
            .filter(|provider| !provider.is_empty());
        Ok(match embedded {
            Some(embedded) => LibraryEvaluator::new(
                Arc::new(LibraryCache::new()),
                vec![Arc::new(embedded), stored],
                providers,
            ),
            None => LibraryEvaluator::new(self.request_cache(), vec![stored], providers),
        })
    }

    /// Library resource by id; an embedded Library with the id wins
    async fn library_by_id(&self, id: &str, data: Option<&JsonValue>) -> Result<JsonValue, CrError> {
        if let Some(library) = data.and_then(|data| embedded_library(data, id)) {
            return Ok(library.clone());
        }
        match self.store.read("Library", id).await {
            Ok(library) => Ok(library),
            Err(StoreError::NotFound { .. }) => {
                Err(CrError::Resolution(format!("Could not resolve library id {}", id)))
            }
            Err(error) => Err(error.into()),
        }
    }
}

fn embedded_library<'a>(data: &'a JsonValue, id: &str) -> Option<&'a JsonValue> {
    let is_match = |resource: &JsonValue| {
        resource.get("resourceType").and_then(JsonValue::as_str) == Some("Library")
            && resource.get("id").and_then(JsonValue::as_str) == Some(id)
    };
    match data.get("entry").and_then(JsonValue::as_array) {
        Some(entries) => entries
            .iter()
            .filter_map(|entry| entry.get("resource"))
            .find(|resource| is_match(resource)),
        None => Some(data).filter(|resource| is_match(resource)),
    }
}

fn parse_params<T: DeserializeOwned>(operation: &str, params: JsonValue) -> Result<T, CrError> {
    serde_json::from_value(params)
        .map_err(|e| CrError::Validation(format!("Invalid parameters for {}: {}", operation, e)))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<JsonValue, CrError> {
    serde_json::to_value(value).map_err(|e| CrError::Internal(e.to_string()))
}

fn evaluate_handler(service: &CrService, params: JsonValue) -> BoxFuture<'_, Result<JsonValue, CrError>> {
    Box::pin(async move {
        let request: EvaluateRequest = parse_params(EVALUATE, params)?;
        let results = service.evaluate(&request).await?;
        to_json(&results)
    })
}

fn evaluate_measure_handler(
    service: &CrService,
    params: JsonValue,
) -> BoxFuture<'_, Result<JsonValue, CrError>> {
    Box::pin(async move {
        let request: MeasureRequest = parse_params(EVALUATE_MEASURE, params)?;
        let report = service.evaluate_measure(&request).await?;
        to_json(&report)
    })
}

fn care_gaps_handler(service: &CrService, params: JsonValue) -> BoxFuture<'_, Result<JsonValue, CrError>> {
    Box::pin(async move {
        let request: CareGapsRequest = parse_params(CARE_GAPS, params)?;
        let reports = service.care_gaps(&request).await?;
        care_gaps_parameters(&reports)
    })
}

/// Parameters resource with one `return` entry per subject document
fn care_gaps_parameters(reports: &[CareGapsReport]) -> Result<JsonValue, CrError> {
    let parameter = reports
        .iter()
        .map(|report| -> Result<JsonValue, CrError> {
            Ok(json!({"name": "return", "resource": to_json(&report.bundle)?}))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({
        "resourceType": "Parameters",
        "id": format!("care-gaps-report-{}", Uuid::new_v4()),
        "parameter": parameter,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_cr_model::InMemoryStore;

    #[test]
    fn test_embedded_library_lookup() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {"resourceType": "Patient", "id": "lib"}},
                {"resource": {"resourceType": "Library", "id": "lib", "name": "Inline"}}
            ]
        });
        let found = embedded_library(&bundle, "lib").unwrap();
        assert_eq!(found["name"], "Inline");
        assert!(embedded_library(&bundle, "other").is_none());

        let single = json!({"resourceType": "Library", "id": "lib"});
        assert!(embedded_library(&single, "lib").is_some());
    }

    #[test]
    fn test_request_context_and_mode() {
        let request = EvaluateRequest::new("lib").with_patient("Patient/123");
        assert_eq!(request.context(), EvaluationContext::patient("123"));
        assert!(request.summary());

        let full = EvaluateRequest {
            execution_results: Some("Full".to_string()),
            ..EvaluateRequest::new("lib")
        };
        assert!(!full.summary());
        assert_eq!(full.context().context_type, "Unspecified");
    }

    #[test]
    fn test_registered_operations() {
        let service = CrService::new(Arc::new(InMemoryStore::new()), CrConfig::default());
        assert_eq!(
            service.operations(),
            vec![CARE_GAPS, EVALUATE, EVALUATE_MEASURE]
        );
    }
}
