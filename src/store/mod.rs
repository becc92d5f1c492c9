//! Document store abstraction over the search cluster.
//!
//! The migration engine only needs a handful of index, alias and document
//! primitives. `DocumentStore` captures them so the execution log and the
//! migrations themselves can run against a real cluster
//! (`ElasticsearchStore`) or entirely in-process (`MemoryStore`).

mod elasticsearch;
mod memory;

pub use elasticsearch::ElasticsearchStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cluster responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("Alias {alias} is not bound to index {index}")]
    AliasNotFound { index: String, alias: String },

    #[error("Alias {0} points to more than one index")]
    AmbiguousAlias(String),

    #[error("Document {id} not found in {index}")]
    DocumentNotFound { index: String, id: String },
}

/// A stored document and its id
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub source: Value,
}

/// Queries understood by every store
#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery {
    /// Every document
    MatchAll,
    /// Documents whose id is one of the given values
    Ids(Vec<String>),
    /// Documents where the (dotted) field holds exactly this value.
    /// Arrays along the path match if any element matches.
    Term { field: String, value: String },
}

impl SearchQuery {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        SearchQuery::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Query DSL body for this query
    pub fn to_dsl(&self) -> Value {
        match self {
            SearchQuery::MatchAll => serde_json::json!({ "match_all": {} }),
            SearchQuery::Ids(ids) => serde_json::json!({ "ids": { "values": ids } }),
            SearchQuery::Term { field, value } => {
                serde_json::json!({ "term": { field.as_str(): { "value": value } } })
            }
        }
    }
}

/// Index, alias and document primitives of a search cluster.
///
/// Index arguments may name either a concrete index or an alias bound to
/// exactly one index.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<bool, StoreError>;

    /// Create an index with the given settings/mappings body
    async fn create_index(&self, index: &str, body: Value) -> Result<(), StoreError>;

    async fn delete_index(&self, index: &str) -> Result<(), StoreError>;

    async fn put_alias(&self, index: &str, alias: &str) -> Result<(), StoreError>;

    async fn delete_alias(&self, index: &str, alias: &str) -> Result<(), StoreError>;

    /// Copy every document of `source` into `dest`
    async fn reindex(&self, source: &str, dest: &str) -> Result<(), StoreError>;

    /// Fetch a document; a missing document (or index) is `None`
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Create or replace a document
    async fn index_document(&self, index: &str, id: &str, source: Value)
        -> Result<(), StoreError>;

    /// Merge the top-level fields of `partial` into an existing document
    async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: Value,
    ) -> Result<(), StoreError>;

    async fn count(&self, index: &str, query: &SearchQuery) -> Result<u64, StoreError>;

    async fn search(&self, index: &str, query: &SearchQuery) -> Result<Vec<Document>, StoreError>;
}
