use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::{DocumentPath, DocumentStore, StoreConfig};

/// Hosted realtime database reached over its REST interface: every path is addressed as
/// `{endpoint}/{path}.json`, authenticated with `?auth={access_key}`.
pub struct RemoteDocumentStore {
    http: Client,
    endpoint: Url,
    access_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

impl RemoteDocumentStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(http: Client, config: &StoreConfig) -> Result<Self> {
        Ok(Self {
            http,
            endpoint: config.resolved_endpoint()?,
            access_key: config.access_key().map(str::to_string),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// `{endpoint}/{collection}[/{key}].json`, each segment percent-encoded so that keys
    /// holding `?`, `%` or spaces address exactly one document.
    fn url_for(&self, path: &DocumentPath) -> Result<Url> {
        let mut segments = vec![path.collection_name()];
        segments.extend(path.key());
        self.url_for_segments(&segments)
    }

    fn url_for_segments(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow!("store endpoint {} cannot hold a path", self.endpoint))?;
            path.pop_if_empty();
            match segments.split_last() {
                Some((last, parents)) => {
                    path.extend(parents);
                    path.push(&format!("{last}.json"));
                }
                None => {
                    path.push(".json");
                }
            }
        }
        if let Some(key) = &self.access_key {
            url.query_pairs_mut().append_pair("auth", key);
        }
        Ok(url)
    }

    fn request(&self, method: Method, path: &DocumentPath) -> Result<RequestBuilder> {
        let url = self.url_for(path)?;
        debug!(%method, %path, "remote store request");
        Ok(self.http.request(method, url))
    }

    async fn send(&self, request: RequestBuilder, path: &DocumentPath) -> Result<Response> {
        request
            .send()
            .await
            .with_context(|| format!("remote store unreachable for '{path}'"))?
            .error_for_status()
            .with_context(|| format!("remote store rejected request for '{path}'"))
    }
}

#[async_trait]
impl DocumentStore for RemoteDocumentStore {
    fn backend_name(&self) -> &'static str {
        "remote"
    }

    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>> {
        let value: Value = self
            .send(self.request(Method::GET, path)?, path)
            .await?
            .json()
            .await
            .with_context(|| format!("remote store returned malformed json for '{path}'"))?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn set(&self, path: &DocumentPath, value: Value) -> Result<()> {
        let request = if value.is_null() {
            self.request(Method::DELETE, path)?
        } else {
            self.request(Method::PUT, path)?.json(&value)
        };
        self.send(request, path).await?;
        Ok(())
    }

    async fn update(&self, path: &DocumentPath, fields: Map<String, Value>) -> Result<()> {
        let request = self.request(Method::PATCH, path)?.json(&fields);
        self.send(request, path).await?;
        Ok(())
    }

    async fn remove(&self, path: &DocumentPath) -> Result<()> {
        self.send(self.request(Method::DELETE, path)?, path).await?;
        Ok(())
    }

    async fn push(&self, collection: &str, value: Value) -> Result<String> {
        let path = DocumentPath::collection(collection)?;
        let request = self.request(Method::POST, &path)?.json(&value);
        let response: PushResponse = self
            .send(request, &path)
            .await?
            .json()
            .await
            .with_context(|| format!("remote store did not return a key for '{path}'"))?;
        Ok(response.name)
    }

    async fn health_check(&self) -> Result<()> {
        let mut url = self.url_for_segments(&[])?;
        url.query_pairs_mut().append_pair("shallow", "true");
        self.http
            .get(url)
            .send()
            .await
            .context("remote store unreachable")?
            .error_for_status()
            .context("remote store health probe failed")?;
        Ok(())
    }
}
