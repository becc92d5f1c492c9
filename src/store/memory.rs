//! In-process document store.
//!
//! Used when history should not outlive the process and as a dry-run target
//! when no cluster is configured.

use super::{Document, DocumentStore, SearchQuery, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct IndexData {
    body: Value,
    documents: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
struct State {
    indices: BTreeMap<String, IndexData>,
    /// alias -> bound indices
    aliases: HashMap<String, BTreeSet<String>>,
}

impl State {
    /// Resolve an index or alias to the concrete index it names
    fn resolve(&self, name: &str) -> Result<Option<String>, StoreError> {
        if self.indices.contains_key(name) {
            return Ok(Some(name.to_string()));
        }

        match self.aliases.get(name) {
            Some(bound) if bound.len() == 1 => Ok(bound.iter().next().cloned()),
            Some(bound) if bound.len() > 1 => Err(StoreError::AmbiguousAlias(name.to_string())),
            _ => Ok(None),
        }
    }

    fn require(&self, name: &str) -> Result<String, StoreError> {
        self.resolve(name)?
            .ok_or_else(|| StoreError::IndexNotFound(name.to_string()))
    }
}

/// Document store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body the index was created with
    pub async fn index_body(&self, index: &str) -> Option<Value> {
        let state = self.state.read().await;
        let name = state.resolve(index).ok()??;
        state.indices.get(&name).map(|data| data.body.clone())
    }

    /// Concrete indices an alias is bound to
    pub async fn alias_targets(&self, alias: &str) -> Vec<String> {
        let state = self.state.read().await;
        state
            .aliases
            .get(alias)
            .map(|bound| bound.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Names of every concrete index
    pub async fn indices(&self) -> Vec<String> {
        self.state.read().await.indices.keys().cloned().collect()
    }
}

/// Collect every value reachable through a dotted path, flattening arrays.
fn values_at<'a>(value: &'a Value, path: &[&str], out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                values_at(item, path, out);
            }
        }
        _ => match path.split_first() {
            None => out.push(value),
            Some((head, rest)) => {
                if let Some(child) = value.get(*head) {
                    values_at(child, rest, out);
                }
            }
        },
    }
}

fn matches(query: &SearchQuery, id: &str, source: &Value) -> bool {
    match query {
        SearchQuery::MatchAll => true,
        SearchQuery::Ids(ids) => ids.iter().any(|candidate| candidate == id),
        SearchQuery::Term { field, value } => {
            let path: Vec<&str> = field.split('.').collect();
            let mut found = Vec::new();
            values_at(source, &path, &mut found);
            found.iter().any(|v| match v {
                Value::String(s) => s == value,
                other => other.to_string() == *value,
            })
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn index_exists(&self, index: &str) -> Result<bool, StoreError> {
        let state = self.state.read().await;
        Ok(state.indices.contains_key(index) || state.aliases.contains_key(index))
    }

    async fn create_index(&self, index: &str, body: Value) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.indices.contains_key(index) || state.aliases.contains_key(index) {
            return Err(StoreError::IndexAlreadyExists(index.to_string()));
        }

        debug!(index = %index, "Creating index");
        state.indices.insert(
            index.to_string(),
            IndexData {
                body,
                documents: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.indices.remove(index).is_none() {
            return Err(StoreError::IndexNotFound(index.to_string()));
        }

        for bound in state.aliases.values_mut() {
            bound.remove(index);
        }
        state.aliases.retain(|_, bound| !bound.is_empty());
        debug!(index = %index, "Deleted index");
        Ok(())
    }

    async fn put_alias(&self, index: &str, alias: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.indices.contains_key(index) {
            return Err(StoreError::IndexNotFound(index.to_string()));
        }

        state
            .aliases
            .entry(alias.to_string())
            .or_default()
            .insert(index.to_string());
        Ok(())
    }

    async fn delete_alias(&self, index: &str, alias: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let removed = state
            .aliases
            .get_mut(alias)
            .map(|bound| bound.remove(index))
            .unwrap_or(false);

        if !removed {
            return Err(StoreError::AliasNotFound {
                index: index.to_string(),
                alias: alias.to_string(),
            });
        }

        state.aliases.retain(|_, bound| !bound.is_empty());
        Ok(())
    }

    async fn reindex(&self, source: &str, dest: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let source_name = state.require(source)?;
        let documents = state
            .indices
            .get(&source_name)
            .map(|data| data.documents.clone())
            .unwrap_or_default();

        let dest_name = state.resolve(dest)?.unwrap_or_else(|| dest.to_string());
        let target = state.indices.entry(dest_name).or_default();
        target.documents.extend(documents);
        Ok(())
    }

    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let state = self.state.read().await;
        let Some(name) = state.resolve(index)? else {
            return Ok(None);
        };

        Ok(state
            .indices
            .get(&name)
            .and_then(|data| data.documents.get(id))
            .map(|source| Document {
                id: id.to_string(),
                source: source.clone(),
            }))
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        source: Value,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let name = state.resolve(index)?.unwrap_or_else(|| index.to_string());
        state
            .indices
            .entry(name)
            .or_default()
            .documents
            .insert(id.to_string(), source);
        Ok(())
    }

    async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: Value,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let name = state.require(index)?;
        let document = state
            .indices
            .get_mut(&name)
            .and_then(|data| data.documents.get_mut(id))
            .ok_or_else(|| StoreError::DocumentNotFound {
                index: index.to_string(),
                id: id.to_string(),
            })?;

        match (document, partial) {
            (Value::Object(existing), Value::Object(fields)) => {
                for (key, value) in fields {
                    existing.insert(key, value);
                }
            }
            (document, replacement) => *document = replacement,
        }
        Ok(())
    }

    async fn count(&self, index: &str, query: &SearchQuery) -> Result<u64, StoreError> {
        Ok(self.search(index, query).await?.len() as u64)
    }

    async fn search(&self, index: &str, query: &SearchQuery) -> Result<Vec<Document>, StoreError> {
        let state = self.state.read().await;
        let name = state.require(index)?;

        Ok(state
            .indices
            .get(&name)
            .map(|data| {
                data.documents
                    .iter()
                    .filter(|(id, source)| matches(query, id, source))
                    .map(|(id, source)| Document {
                        id: id.clone(),
                        source: source.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
