//! Elasticsearch client and the `SearchIndex` seam
//!
//! The sync engine talks to the target cluster exclusively through the
//! `SearchIndex` trait, so tests can substitute an in-memory index
//! (`crate::testing::MemoryIndex`) for the HTTP client.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;

/// A document body as stored in (and read back from) the index.
pub type Document = serde_json::Map<String, Value>;

/// Operations the sync engine needs from the target indexing cluster.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Check whether an index exists.
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Create an index.
    async fn create_index(&self, index: &str) -> Result<()>;

    /// Fetch a document by id, scoped to one index.
    /// Returns None when the document does not exist.
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Document>>;

    /// Create a document by id with the given body.
    async fn create_document(&self, index: &str, id: &str, body: &Document) -> Result<()>;

    /// Partial-update (merge) a document by id with the given body.
    async fn update_document(&self, index: &str, id: &str, body: &Document) -> Result<()>;

    /// Current count of in-flight administrative tasks across all nodes.
    async fn pending_tasks(&self) -> Result<usize>;
}

/// HTTP client for an Elasticsearch cluster.
///
/// Endpoints are tried in order; a transport failure fails over to the
/// next endpoint, an HTTP error status does not.
pub struct EsClient {
    http: reqwest::Client,
    endpoints: Vec<String>,
    auth: Option<(String, String)>,
}

impl EsClient {
    pub fn new(endpoints: Vec<String>, auth: Option<(String, String)>) -> Result<Self> {
        if endpoints.is_empty() {
            bail!("At least one Elasticsearch endpoint is required");
        }
        let endpoints = endpoints
            .into_iter()
            .map(|e| e.trim_end_matches('/').to_string())
            .collect();
        Ok(Self {
            http: reqwest::Client::new(),
            endpoints,
            auth,
        })
    }

    pub fn from_config(es: &crate::config::EsConfig) -> Result<Self> {
        let auth = match (&es.username, &es.password) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some((user.clone(), pass.clone()))
            }
            _ => None,
        };
        Self::new(es.urls.clone(), auth)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let mut last_err = None;
        for endpoint in &self.endpoints {
            let url = format!("{endpoint}{path}");
            let mut request = self.http.request(method.clone(), &url);
            if let Some((user, pass)) = &self.auth {
                request = request.basic_auth(user, Some(pass));
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            match request.send().await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::warn!("Request to {url} failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) => Err(anyhow::Error::new(e).context("All Elasticsearch endpoints unreachable")),
            None => Err(anyhow!("No Elasticsearch endpoints configured")),
        }
    }
}

#[async_trait]
impl SearchIndex for EsClient {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self.send(Method::HEAD, &format!("/{index}"), None).await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => bail!("Index existence check for `{index}` failed: {status}"),
        }
    }

    async fn create_index(&self, index: &str) -> Result<()> {
        let response = self.send(Method::PUT, &format!("/{index}"), None).await?;
        let status = response.status();
        if !status.is_success() {
            bail!("Creating index `{index}` failed: {status}");
        }
        Ok(())
    }

    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Document>> {
        let response = self
            .send(Method::GET, &format!("/{index}/_doc/{id}"), None)
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: Value = response.json().await?;
                let source = body
                    .get("_source")
                    .and_then(|v| v.as_object())
                    .cloned()
                    .ok_or_else(|| {
                        anyhow!("Document `{id}` in `{index}` has no _source in response")
                    })?;
                Ok(Some(source))
            }
            status => bail!("Lookup of `{id}` in `{index}` failed: {status}"),
        }
    }

    async fn create_document(&self, index: &str, id: &str, body: &Document) -> Result<()> {
        let response = self
            .send(
                Method::PUT,
                &format!("/{index}/_doc/{id}"),
                Some(&Value::Object(body.clone())),
            )
            .await?;
        let status = response.status();
        if !status.is_success() {
            bail!("Indexing `{id}` into `{index}` failed: {status}");
        }
        Ok(())
    }

    async fn update_document(&self, index: &str, id: &str, body: &Document) -> Result<()> {
        let merge = serde_json::json!({ "doc": body });
        let response = self
            .send(Method::POST, &format!("/{index}/_update/{id}"), Some(&merge))
            .await?;
        let status = response.status();
        if !status.is_success() {
            bail!("Updating `{id}` in `{index}` failed: {status}");
        }
        Ok(())
    }

    async fn pending_tasks(&self) -> Result<usize> {
        let response = self.send(Method::GET, "/_tasks", None).await?;
        let status = response.status();
        if !status.is_success() {
            bail!("Cluster task status query failed: {status}");
        }
        let body: Value = response.json().await?;

        let mut count = 0;
        if let Some(nodes) = body.get("nodes").and_then(|v| v.as_object()) {
            for node in nodes.values() {
                if let Some(tasks) = node.get("tasks").and_then(|v| v.as_object()) {
                    count += tasks.len();
                }
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_are_normalized() {
        let client = EsClient::new(
            vec!["http://es1:9200/".to_string(), "http://es2:9200".to_string()],
            None,
        )
        .unwrap();
        assert_eq!(client.endpoints, vec!["http://es1:9200", "http://es2:9200"]);
    }

    #[test]
    fn test_empty_endpoint_list_is_rejected() {
        assert!(EsClient::new(Vec::new(), None).is_err());
    }

    #[test]
    fn test_auth_requires_both_credentials() {
        let es = crate::config::EsConfig {
            urls: vec!["http://localhost:9200".to_string()],
            username: Some("elastic".to_string()),
            password: None,
            index_prefix: String::new(),
        };
        let client = EsClient::from_config(&es).unwrap();
        assert!(client.auth.is_none());
    }
}
