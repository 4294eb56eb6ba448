//! Priority-fallback composition of data sources

use async_trait::async_trait;
use octofhir_cr_model::{DataSource, DataSourceError, RetrieveRequest};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Data source consulting its members in a fixed order.
///
/// The first member returning a non-empty result wins. When every member is
/// empty the result is empty. A member error stops the retrieve.
pub struct PriorityRetriever {
    sources: Vec<Arc<dyn DataSource>>,
}

impl PriorityRetriever {
    pub fn new(sources: Vec<Arc<dyn DataSource>>) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> &[Arc<dyn DataSource>] {
        &self.sources
    }
}

#[async_trait]
impl DataSource for PriorityRetriever {
    async fn retrieve(&self, request: &RetrieveRequest) -> Result<Vec<JsonValue>, DataSourceError> {
        for source in &self.sources {
            let records = source.retrieve(request).await?;
            if !records.is_empty() {
                log::trace!(
                    "{} served {} {} record(s)",
                    source.describe(),
                    records.len(),
                    request.data_type
                );
                return Ok(records);
            }
        }
        Ok(Vec::new())
    }

    fn describe(&self) -> String {
        let members: Vec<String> = self.sources.iter().map(|s| s.describe()).collect();
        format!("priority[{}]", members.join(", "))
    }
}
