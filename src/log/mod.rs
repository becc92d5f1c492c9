//! Execution log.
//!
//! The log records which migrations ran for each index family, under which
//! release tag and when. It is stored in the metadata index as one document
//! per family, keyed by the family alias:
//!
//! ```json
//! { "alias": "app-users",
//!   "migrations": [{ "name": "users-migration-v1.0.0", "appVersion": "3.1.0",
//!                    "createdAt": "2024-01-01T00:00:00Z" }] }
//! ```
//!
//! `append` and `remove` are read-then-write with no version check: two
//! processes updating the same family at once can lose one of the updates.
//! Only one orchestrator may run against a family at a time.

mod types;

pub use types::{LogDocument, LogEntry, LogItem};

use crate::store::{DocumentStore, SearchQuery, StoreError};
use crate::utils::now_iso;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing argument: {0}")]
    MissingArgument(String),
}

/// Durable record of executed migrations
#[derive(Clone)]
pub struct ExecutionLog {
    store: Arc<dyn DocumentStore>,
    metadata_alias: String,
}

impl ExecutionLog {
    /// Create a log kept in the index (or alias) `metadata_alias` of `store`
    pub fn new(store: Arc<dyn DocumentStore>, metadata_alias: impl Into<String>) -> Self {
        Self {
            store,
            metadata_alias: metadata_alias.into(),
        }
    }

    pub fn metadata_alias(&self) -> &str {
        &self.metadata_alias
    }

    /// Whether the family has a log document
    pub async fn exists(&self, alias: &str) -> Result<bool, LogError> {
        let count = self
            .store
            .count(&self.metadata_alias, &SearchQuery::Ids(vec![alias.to_string()]))
            .await?;
        Ok(count != 0)
    }

    /// The family's history; `None` when nothing has run for it yet
    pub async fn get(&self, alias: &str) -> Result<Option<LogEntry>, LogError> {
        match self.store.get_document(&self.metadata_alias, alias).await? {
            Some(document) => {
                let body: LogDocument = serde_json::from_value(document.source)?;
                Ok(Some(LogEntry::from_document(document.id, body)))
            }
            None => Ok(None),
        }
    }

    /// Record a migration as executed for the family
    pub async fn append(
        &self,
        alias: &str,
        migration_name: &str,
        release_tag: Option<&str>,
    ) -> Result<(), LogError> {
        let item = LogItem {
            name: migration_name.to_string(),
            app_version: release_tag.unwrap_or_default().to_string(),
            created_at: now_iso(),
        };

        if !self.exists(alias).await? {
            debug!(alias = %alias, migration = %migration_name, "Creating log document");
            let document = LogDocument {
                alias: alias.to_string(),
                migrations: vec![item],
            };
            self.store
                .index_document(&self.metadata_alias, alias, serde_json::to_value(&document)?)
                .await?;
            return Ok(());
        }

        let mut migrations = self
            .get(alias)
            .await?
            .map(|entry| entry.migrations)
            .unwrap_or_default();
        migrations.push(item);

        debug!(alias = %alias, migration = %migration_name, "Appending to log document");
        self.write_migrations(alias, migrations).await
    }

    /// Drop every record of a migration from the family's history
    pub async fn remove(&self, alias: &str, migration_name: &str) -> Result<(), LogError> {
        let Some(entry) = self.get(alias).await? else {
            debug!(alias = %alias, "No log document, nothing to remove");
            return Ok(());
        };

        let migrations: Vec<LogItem> = entry
            .migrations
            .into_iter()
            .filter(|item| item.name != migration_name)
            .collect();

        debug!(alias = %alias, migration = %migration_name, "Removing from log document");
        self.write_migrations(alias, migrations).await
    }

    /// Every family's history
    pub async fn list_all(&self) -> Result<Vec<LogEntry>, LogError> {
        self.search(&SearchQuery::MatchAll).await
    }

    /// Names of every executed migration across all families
    pub async fn executed(&self) -> Result<Vec<String>, LogError> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .flat_map(|entry| entry.migrations.into_iter().map(|item| item.name))
            .collect())
    }

    /// Histories holding migrations run under `release_tag`, narrowed to
    /// those migrations
    pub async fn list_by_release_tag(&self, release_tag: &str) -> Result<Vec<LogEntry>, LogError> {
        if release_tag.is_empty() {
            return Err(LogError::MissingArgument("appVersion".to_string()));
        }

        let query = SearchQuery::term("migrations.appVersion", release_tag);
        let mut entries = self.search(&query).await?;
        for entry in &mut entries {
            entry.migrations.retain(|item| item.app_version == release_tag);
        }
        entries.retain(|entry| !entry.migrations.is_empty());
        Ok(entries)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<LogEntry>, LogError> {
        self.store
            .search(&self.metadata_alias, query)
            .await?
            .into_iter()
            .map(|document| {
                let body: LogDocument = serde_json::from_value(document.source)?;
                Ok(LogEntry::from_document(document.id, body))
            })
            .collect()
    }

    async fn write_migrations(&self, alias: &str, migrations: Vec<LogItem>) -> Result<(), LogError> {
        let partial = serde_json::json!({ "migrations": migrations });
        self.store
            .update_document(&self.metadata_alias, alias, partial)
            .await?;
        Ok(())
    }
}
