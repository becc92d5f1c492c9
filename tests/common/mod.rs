#![allow(dead_code)]

use async_trait::async_trait;
use index_migrate::config::{AliasConfig, MemoryAliasStore};
use index_migrate::migration::{
    ExecutionContext, Migration, MigrationEntry, MigrationError, MigrationExecutor,
    MigrationRegistry, MigrationSource,
};
use index_migrate::store::{DocumentStore, MemoryStore};
use index_migrate::{bootstrap, ExecutionLog};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const METADATA_ALIAS: &str = "migrations-metadata";

/// Create a temporary directory for testing
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// A call made to a recording migration
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub direction: &'static str,
    pub name: String,
    pub ctx: ExecutionContext,
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

/// Migration that records its invocations and can be told to fail
pub struct RecordingMigration {
    name: String,
    calls: CallLog,
    fail_up: bool,
}

impl RecordingMigration {
    pub fn new(name: &str, calls: &CallLog) -> Arc<dyn Migration> {
        Arc::new(Self {
            name: name.to_string(),
            calls: Arc::clone(calls),
            fail_up: false,
        })
    }

    pub fn failing(name: &str, calls: &CallLog) -> Arc<dyn Migration> {
        Arc::new(Self {
            name: name.to_string(),
            calls: Arc::clone(calls),
            fail_up: true,
        })
    }

    fn record(&self, direction: &'static str, ctx: &ExecutionContext) {
        self.calls.lock().unwrap().push(Call {
            direction,
            name: self.name.clone(),
            ctx: ctx.clone(),
        });
    }
}

#[async_trait]
impl Migration for RecordingMigration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn up(
        &self,
        ctx: &ExecutionContext,
        _store: &dyn DocumentStore,
    ) -> Result<(), MigrationError> {
        self.record("up", ctx);
        if self.fail_up {
            return Err(MigrationError::MigrationFailed(
                self.name.clone(),
                "mapping conflict".to_string(),
            ));
        }
        Ok(())
    }

    async fn down(
        &self,
        ctx: &ExecutionContext,
        _store: &dyn DocumentStore,
    ) -> Result<(), MigrationError> {
        self.record("down", ctx);
        Ok(())
    }
}

/// Source that counts how often it is listed
pub struct CountingSource {
    inner: MigrationRegistry,
    pub lists: AtomicUsize,
}

impl CountingSource {
    pub fn new(inner: MigrationRegistry) -> Self {
        Self {
            inner,
            lists: AtomicUsize::new(0),
        }
    }

    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MigrationSource for CountingSource {
    async fn list(&self) -> Result<Vec<MigrationEntry>, MigrationError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list().await
    }
}

pub fn new_calls() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Names of recorded calls in one direction, in call order
pub fn called(calls: &CallLog, direction: &str) -> Vec<String> {
    calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.direction == direction)
        .map(|c| c.name.clone())
        .collect()
}

pub fn aliases(pairs: &[(&str, &str)]) -> Arc<MemoryAliasStore> {
    let config: AliasConfig = pairs.iter().copied().collect();
    Arc::new(MemoryAliasStore::new(config))
}

/// A memory store with the metadata index already set up
pub async fn metadata_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    bootstrap::setup(store.as_ref(), METADATA_ALIAS)
        .await
        .expect("Should set up metadata index");
    store
}

pub fn executor(
    source: Arc<dyn MigrationSource>,
    aliases: Arc<MemoryAliasStore>,
    log_store: Arc<MemoryStore>,
) -> MigrationExecutor {
    MigrationExecutor::new(
        source,
        aliases,
        ExecutionLog::new(log_store, METADATA_ALIAS),
        Arc::new(MemoryStore::new()),
    )
}
