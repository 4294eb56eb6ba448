//! Remote FHIR REST data source and terminology provider

use super::store::value_set_codes;
use async_trait::async_trait;
use octofhir_cr_model::fhir::Endpoint;
use octofhir_cr_model::{
    Code, DataSource, DataSourceError, RetrieveRequest, TerminologyError, TerminologyProvider,
};
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

const FHIR_JSON: &str = "application/fhir+json";

/// Remote call failure
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid endpoint header '{0}'")]
    InvalidHeader(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Unexpected response body: {0}")]
    InvalidBody(String),
}

/// Minimal FHIR REST client bound to one endpoint address.
///
/// Endpoint headers (`Name: value`) are sent with every request.
#[derive(Debug, Clone)]
pub struct FhirClient {
    http: reqwest::Client,
    base_url: String,
}

impl FhirClient {
    pub fn new(endpoint: &Endpoint) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(FHIR_JSON));
        for header in &endpoint.header {
            let (name, value) = header
                .split_once(':')
                .ok_or_else(|| ClientError::InvalidHeader(header.clone()))?;
            let name = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|_| ClientError::InvalidHeader(header.clone()))?;
            let value = HeaderValue::from_str(value.trim())
                .map_err(|_| ClientError::InvalidHeader(header.clone()))?;
            headers.insert(name, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self {
            http,
            base_url: endpoint.address.trim_end_matches('/').to_string(),
        })
    }

    pub fn address(&self) -> &str {
        &self.base_url
    }

    /// Search a resource type, following `next` links across pages
    pub async fn search(
        &self,
        resource_type: &str,
        query: &[(String, String)],
    ) -> Result<Vec<JsonValue>, ClientError> {
        let url = format!("{}/{}", self.base_url, resource_type);
        let mut page = self.send(self.http.get(&url).query(query), &url).await?;
        let mut resources = Vec::new();

        loop {
            resources.extend(
                page.get("entry")
                    .and_then(JsonValue::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(|e| e.get("resource"))
                    .cloned(),
            );
            let next = page
                .get("link")
                .and_then(JsonValue::as_array)
                .into_iter()
                .flatten()
                .find(|l| l.get("relation").and_then(JsonValue::as_str) == Some("next"))
                .and_then(|l| l.get("url"))
                .and_then(JsonValue::as_str)
                .map(str::to_string);
            match next {
                Some(next) => page = self.send(self.http.get(&next), &next).await?,
                None => break,
            }
        }
        Ok(resources)
    }

    /// POST a Parameters resource to a type-level operation
    pub async fn operation(
        &self,
        path: &str,
        parameters: &JsonValue,
    ) -> Result<JsonValue, ClientError> {
        let url = format!("{}/{}", self.base_url, path);
        let request = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, FHIR_JSON)
            .json(parameters);
        self.send(request, &url).await
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<JsonValue, ClientError> {
        log::debug!("FHIR request {}", url);
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json().await?)
    }
}

/// Retrieves clinical records from a remote FHIR server
pub struct RestDataSource {
    client: Arc<FhirClient>,
    terminology: Arc<dyn TerminologyProvider>,
    expand_value_sets: bool,
}

impl RestDataSource {
    pub fn new(client: Arc<FhirClient>, terminology: Arc<dyn TerminologyProvider>) -> Self {
        Self {
            client,
            terminology,
            expand_value_sets: false,
        }
    }

    /// Send expanded code lists instead of `:in` value set filters
    pub fn with_expand_value_sets(mut self, expand: bool) -> Self {
        self.expand_value_sets = expand;
        self
    }

    pub fn expands_value_sets(&self) -> bool {
        self.expand_value_sets
    }

    async fn search_query(
        &self,
        request: &RetrieveRequest,
    ) -> Result<Option<Vec<(String, String)>>, DataSourceError> {
        let mut query = Vec::new();
        if let (Some(context), Some(id)) = (&request.context_type, &request.context_id) {
            if request.subject_reference().is_some() {
                if *context == request.data_type {
                    query.push(("_id".to_string(), id.clone()));
                } else {
                    query.push(("subject".to_string(), format!("{}/{}", context, id)));
                }
            }
        }

        if let Some(value_set) = &request.value_set {
            let param = request.code_path.clone().unwrap_or_else(|| "code".to_string());
            if self.expand_value_sets {
                let codes = self.terminology.expand(value_set).await?;
                if codes.is_empty() {
                    return Ok(None);
                }
                let tokens: Vec<String> = codes.iter().map(Code::to_string).collect();
                query.push((param, tokens.join(",")));
            } else {
                query.push((format!("{}:in", param), value_set.clone()));
            }
        }
        Ok(Some(query))
    }
}

#[async_trait]
impl DataSource for RestDataSource {
    async fn retrieve(&self, request: &RetrieveRequest) -> Result<Vec<JsonValue>, DataSourceError> {
        let Some(query) = self.search_query(request).await? else {
            return Ok(Vec::new());
        };
        self.client
            .search(&request.data_type, &query)
            .await
            .map_err(|e| DataSourceError::NetworkError(e.to_string()))
    }

    fn describe(&self) -> String {
        format!("rest({})", self.client.address())
    }
}

/// Terminology operations against a remote terminology server
pub struct RemoteTerminologyProvider {
    client: Arc<FhirClient>,
}

impl RemoteTerminologyProvider {
    pub fn new(client: Arc<FhirClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TerminologyProvider for RemoteTerminologyProvider {
    async fn in_value_set(&self, code: &Code, value_set: &str) -> Result<bool, TerminologyError> {
        let mut parameter = vec![
            json!({"name": "url", "valueUri": value_set}),
            json!({"name": "code", "valueCode": code.code}),
        ];
        if let Some(system) = &code.system {
            parameter.push(json!({"name": "system", "valueUri": system}));
        }
        let parameters = json!({"resourceType": "Parameters", "parameter": parameter});

        let response = self
            .client
            .operation("ValueSet/$validate-code", &parameters)
            .await
            .map_err(|e| TerminologyError::NetworkError(e.to_string()))?;
        validate_code_result(&response)
    }

    async fn expand(&self, value_set: &str) -> Result<Vec<Code>, TerminologyError> {
        let parameters = json!({
            "resourceType": "Parameters",
            "parameter": [{"name": "url", "valueUri": value_set}]
        });
        let expansion = self
            .client
            .operation("ValueSet/$expand", &parameters)
            .await
            .map_err(|e| match e {
                ClientError::Status { status: 404, .. } => {
                    TerminologyError::ValueSetNotFound(value_set.to_string())
                }
                other => TerminologyError::NetworkError(other.to_string()),
            })?;
        if expansion.get("resourceType").and_then(JsonValue::as_str) != Some("ValueSet") {
            return Err(TerminologyError::InvalidResponse(
                "$expand did not return a ValueSet".to_string(),
            ));
        }
        Ok(value_set_codes(&expansion))
    }

    fn describe(&self) -> String {
        format!("remote terminology({})", self.client.address())
    }
}

/// `result` parameter of a `$validate-code` response
fn validate_code_result(parameters: &JsonValue) -> Result<bool, TerminologyError> {
    parameters
        .get("parameter")
        .and_then(JsonValue::as_array)
        .into_iter()
        .flatten()
        .find(|p| p.get("name").and_then(JsonValue::as_str) == Some("result"))
        .and_then(|p| p.get("valueBoolean"))
        .and_then(JsonValue::as_bool)
        .ok_or_else(|| {
            TerminologyError::InvalidResponse("$validate-code response has no result".to_string())
        })
}
