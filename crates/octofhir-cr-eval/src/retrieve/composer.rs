//! Composition of data sources and terminology for one request

use super::bundle::BundleDataSource;
use super::priority::PriorityRetriever;
use super::remote::{ClientError, FhirClient, RemoteTerminologyProvider, RestDataSource};
use super::store::{StoreDataSource, StoreTerminologyProvider};
use octofhir_cr_model::fhir::Endpoint;
use octofhir_cr_model::{DataSource, ResourceStore, TerminologyProvider};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Failure to build the providers for a request
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("Invalid endpoint {address}: {source}")]
    InvalidEndpoint {
        address: String,
        #[source]
        source: ClientError,
    },
}

/// Request inputs that select data and terminology sources
#[derive(Debug, Clone, Default)]
pub struct RetrievalOptions {
    pub terminology_endpoint: Option<Endpoint>,
    pub data_endpoint: Option<Endpoint>,
    /// Dataset embedded in the request (bundle or single resource)
    pub data: Option<JsonValue>,
}

/// Kind of a composed source, in retrieval order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Store,
    Remote(String),
    Embedded,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store => write!(f, "store"),
            Self::Remote(address) => write!(f, "remote({})", address),
            Self::Embedded => write!(f, "embedded"),
        }
    }
}

/// Providers built for one request
#[derive(Clone)]
pub struct ComposedProviders {
    pub data: Arc<dyn DataSource>,
    pub terminology: Arc<dyn TerminologyProvider>,
    pub terminology_source: SourceKind,
    /// Data sources in retrieval order
    pub sources: Vec<SourceKind>,
    /// Whether the primary source matches value sets by expansion
    pub expand_value_sets: bool,
}

impl fmt::Debug for ComposedProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedProviders")
            .field("data", &self.data.describe())
            .field("terminology", &self.terminology.describe())
            .field("sources", &self.sources)
            .field("expand_value_sets", &self.expand_value_sets)
            .finish()
    }
}

/// Builds the retriever and terminology provider for a request
pub struct RetrievalComposer {
    store: Arc<dyn ResourceStore>,
}

impl RetrievalComposer {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Compose providers from the request's endpoints and embedded data.
    ///
    /// Remote clients are built once per distinct address.
    pub fn compose(&self, options: &RetrievalOptions) -> Result<ComposedProviders, ComposeError> {
        let mut clients: HashMap<String, Arc<FhirClient>> = HashMap::new();
        let mut client_for = |endpoint: &Endpoint| -> Result<Arc<FhirClient>, ComposeError> {
            if let Some(client) = clients.get(&endpoint.address) {
                return Ok(Arc::clone(client));
            }
            let client = Arc::new(FhirClient::new(endpoint).map_err(|source| {
                ComposeError::InvalidEndpoint {
                    address: endpoint.address.clone(),
                    source,
                }
            })?);
            clients.insert(endpoint.address.clone(), Arc::clone(&client));
            Ok(client)
        };

        let (terminology, terminology_source): (Arc<dyn TerminologyProvider>, SourceKind) =
            match &options.terminology_endpoint {
                Some(endpoint) => (
                    Arc::new(RemoteTerminologyProvider::new(client_for(endpoint)?)),
                    SourceKind::Remote(endpoint.address.clone()),
                ),
                None => (
                    Arc::new(StoreTerminologyProvider::new(Arc::clone(&self.store))),
                    SourceKind::Store,
                ),
            };

        let expand_value_sets = match (&options.terminology_endpoint, &options.data_endpoint) {
            (Some(_), None) => true,
            (Some(terminology), Some(data)) => terminology.address != data.address,
            (None, _) => false,
        };

        let (primary, primary_kind): (Arc<dyn DataSource>, SourceKind) = match &options.data_endpoint {
            Some(endpoint) => (
                Arc::new(
                    RestDataSource::new(client_for(endpoint)?, Arc::clone(&terminology))
                        .with_expand_value_sets(expand_value_sets),
                ),
                SourceKind::Remote(endpoint.address.clone()),
            ),
            None => (
                Arc::new(
                    StoreDataSource::new(Arc::clone(&self.store), Arc::clone(&terminology))
                        .with_expand_value_sets(expand_value_sets),
                ),
                SourceKind::Store,
            ),
        };

        let (data, sources): (Arc<dyn DataSource>, Vec<SourceKind>) = match &options.data {
            Some(embedded) => {
                let bundle: Arc<dyn DataSource> =
                    Arc::new(BundleDataSource::new(embedded, Arc::clone(&terminology)));
                (
                    Arc::new(PriorityRetriever::new(vec![primary, bundle])),
                    vec![primary_kind, SourceKind::Embedded],
                )
            }
            None => (primary, vec![primary_kind]),
        };

        log::debug!(
            "composed retrieval: data={} terminology={} expand_value_sets={}",
            data.describe(),
            terminology_source,
            expand_value_sets
        );

        Ok(ComposedProviders {
            data,
            terminology,
            terminology_source,
            sources,
            expand_value_sets,
        })
    }
}
