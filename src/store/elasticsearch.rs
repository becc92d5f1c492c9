//! Elasticsearch-compatible HTTP store.

use super::{Document, DocumentStore, SearchQuery, StoreError};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

/// Upper bound on hits returned by a single search
const SEARCH_SIZE: usize = 10_000;

#[derive(Deserialize)]
struct GetResponse {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: Value,
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: Value,
}

#[derive(Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

/// Store talking to a cluster over its REST API
pub struct ElasticsearchStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ElasticsearchStore {
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("index-migrate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(method = %method, url = %url, "Cluster request");

        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("ApiKey {}", key)),
            None => builder,
        }
    }

    /// Turn non-success statuses into errors, keeping the response body
    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Like `check`, but reports a 404 as a missing index
    async fn check_index(response: Response, index: &str) -> Result<Response, StoreError> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::IndexNotFound(index.to_string()));
        }
        Self::check(response).await
    }
}

#[async_trait]
impl DocumentStore for ElasticsearchStore {
    #[instrument(skip(self))]
    async fn index_exists(&self, index: &str) -> Result<bool, StoreError> {
        let response = self.request(Method::HEAD, index).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            _ => Self::check(response).await.map(|_| true),
        }
    }

    #[instrument(skip(self, body))]
    async fn create_index(&self, index: &str, body: Value) -> Result<(), StoreError> {
        let response = self.request(Method::PUT, index).json(&body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_index(&self, index: &str) -> Result<(), StoreError> {
        let response = self.request(Method::DELETE, index).send().await?;
        Self::check_index(response, index).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn put_alias(&self, index: &str, alias: &str) -> Result<(), StoreError> {
        let path = format!("{}/_alias/{}", index, alias);
        let response = self.request(Method::PUT, &path).send().await?;
        Self::check_index(response, index).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_alias(&self, index: &str, alias: &str) -> Result<(), StoreError> {
        let path = format!("{}/_alias/{}", index, alias);
        let response = self.request(Method::DELETE, &path).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::AliasNotFound {
                index: index.to_string(),
                alias: alias.to_string(),
            });
        }
        Self::check(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn reindex(&self, source: &str, dest: &str) -> Result<(), StoreError> {
        let body = json!({ "source": { "index": source }, "dest": { "index": dest } });
        let response = self
            .request(Method::POST, "_reindex?refresh=true")
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let path = format!("{}/_doc/{}", index, id);
        let response = self.request(Method::GET, &path).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let found: GetResponse = Self::check(response).await?.json().await?;
        Ok(Some(Document {
            id: found.id,
            source: found.source,
        }))
    }

    #[instrument(skip(self, source))]
    async fn index_document(
        &self,
        index: &str,
        id: &str,
        source: Value,
    ) -> Result<(), StoreError> {
        let path = format!("{}/_doc/{}?refresh=wait_for", index, id);
        let response = self.request(Method::PUT, &path).json(&source).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    #[instrument(skip(self, partial))]
    async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: Value,
    ) -> Result<(), StoreError> {
        let path = format!("{}/_update/{}?refresh=wait_for", index, id);
        let response = self
            .request(Method::POST, &path)
            .json(&json!({ "doc": partial }))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::DocumentNotFound {
                index: index.to_string(),
                id: id.to_string(),
            });
        }
        Self::check(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn count(&self, index: &str, query: &SearchQuery) -> Result<u64, StoreError> {
        let path = format!("{}/_count", index);
        let response = self
            .request(Method::POST, &path)
            .json(&json!({ "query": query.to_dsl() }))
            .send()
            .await?;
        let counted: CountResponse = Self::check_index(response, index).await?.json().await?;
        Ok(counted.count)
    }

    #[instrument(skip(self))]
    async fn search(&self, index: &str, query: &SearchQuery) -> Result<Vec<Document>, StoreError> {
        let path = format!("{}/_search", index);
        let response = self
            .request(Method::POST, &path)
            .json(&json!({ "query": query.to_dsl(), "size": SEARCH_SIZE }))
            .send()
            .await?;
        let found: SearchResponse = Self::check_index(response, index).await?.json().await?;

        Ok(found
            .hits
            .hits
            .into_iter()
            .map(|hit| Document {
                id: hit.id,
                source: hit.source,
            })
            .collect())
    }
}
