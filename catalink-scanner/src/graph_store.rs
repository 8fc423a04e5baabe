use crate::error::{CrawlError, Result};
use crate::sparql::{
    BindingsResponse, SPARQL_QUERY_CONTENT_TYPE, SPARQL_RESULTS_JSON, SPARQL_UPDATE_CONTENT_TYPE,
    Triple,
};
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, warn};

/// HTTP access to the central triple store.
#[derive(Debug, Clone)]
pub struct GraphStoreClient {
    client: Client,
    read_url: String,
    insert_url: String,
}

impl GraphStoreClient {
    pub fn new(client: Client, read_url: impl Into<String>, insert_url: impl Into<String>) -> Self {
        Self {
            client,
            read_url: read_url.into(),
            insert_url: insert_url.into(),
        }
    }

    pub fn insert_url(&self) -> &str {
        &self.insert_url
    }

    /// Insert one triple with `INSERT DATA`. Duplicate inserts are harmless.
    pub async fn insert_triple(&self, triple: &Triple) -> Result<()> {
        let update = triple.insert_data();
        let response = self
            .client
            .post(&self.insert_url)
            .header(CONTENT_TYPE, SPARQL_UPDATE_CONTENT_TYPE)
            .body(update.clone())
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(CrawlError::Ingestion { status, body });
        }

        debug!("INSERT {} {}", self.insert_url, update);
        Ok(())
    }

    /// Check whether the exact triple is already stored in any named graph.
    ///
    /// Failures to read or decode the answer count as "not present".
    pub async fn triple_exists(&self, triple: &Triple) -> Result<bool> {
        let query = triple.exists_query();
        let response = self
            .client
            .post(&self.read_url)
            .header(CONTENT_TYPE, SPARQL_QUERY_CONTENT_TYPE)
            .header(ACCEPT, SPARQL_RESULTS_JSON)
            .body(query.clone())
            .send()
            .await?;

        match response.json::<BindingsResponse>().await {
            Ok(parsed) => Ok(!parsed.results.bindings.is_empty()),
            Err(e) => {
                warn!("Existence check failed for {}: {}", query, e);
                Ok(false)
            }
        }
    }
}
