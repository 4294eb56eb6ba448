//! Data retrieval: data sources, terminology providers and their composition

pub mod bundle;
pub mod composer;
pub mod priority;
pub mod remote;
pub mod store;

pub use bundle::BundleDataSource;
pub use composer::{ComposeError, ComposedProviders, RetrievalComposer, RetrievalOptions, SourceKind};
pub use priority::PriorityRetriever;
pub use remote::{ClientError, FhirClient, RemoteTerminologyProvider, RestDataSource};
pub use store::{StoreDataSource, StoreTerminologyProvider};

use octofhir_cr_model::{
    Code, DataSourceError, RetrieveRequest, TerminologyProvider, Value,
};
use serde_json::Value as JsonValue;

/// Keep the records whose coded element is in the request's value set.
///
/// With `expand` set the value set is expanded once and matched locally;
/// otherwise each code is checked with the terminology provider.
pub(crate) async fn filter_by_value_set(
    records: Vec<JsonValue>,
    request: &RetrieveRequest,
    terminology: &dyn TerminologyProvider,
    expand: bool,
) -> Result<Vec<JsonValue>, DataSourceError> {
    let Some(value_set) = request.value_set.as_deref() else {
        return Ok(records);
    };
    let code_path = request.code_path.as_deref().unwrap_or("code");

    let expansion: Option<Vec<Code>> = if expand {
        Some(terminology.expand(value_set).await?)
    } else {
        None
    };

    let mut kept = Vec::with_capacity(records.len());
    for record in records {
        let codes = Value::from_json(&record).property(code_path).codes();
        let mut member = false;
        for code in &codes {
            member = match &expansion {
                Some(expanded) => expanded.iter().any(|c| c.matches(code)),
                None => terminology.in_value_set(code, value_set).await?,
            };
            if member {
                break;
            }
        }
        if member {
            kept.push(record);
        }
    }
    Ok(kept)
}
