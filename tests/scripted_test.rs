mod common;

use common::{create_test_dir, metadata_store, METADATA_ALIAS};
use index_migrate::config::{AliasStore, JsonFileAliasStore};
use index_migrate::migration::{
    DownOptions, FsMigrationSource, MigrationExecutor, MigrationSource, UpOptions,
};
use index_migrate::scaffold::{create_migration, CreateMigrationOptions, ScaffoldError};
use index_migrate::store::{DocumentStore, MemoryStore};
use index_migrate::utils::get_indexes_path;
use index_migrate::version::{BumpKind, SemVer};
use index_migrate::ExecutionLog;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

async fn scaffold(root: &Path, bump: BumpKind) -> index_migrate::CreateMigrationResult {
    let aliases = JsonFileAliasStore::for_migrations_root(root);
    create_migration(
        root,
        &aliases,
        CreateMigrationOptions {
            family: "users".to_string(),
            alias: Some("app-users".to_string()),
            bump,
        },
    )
    .await
    .expect("Should create migration")
}

fn fs_executor(root: &Path, log_store: Arc<MemoryStore>, target: Arc<MemoryStore>) -> MigrationExecutor {
    MigrationExecutor::new(
        Arc::new(FsMigrationSource::new(get_indexes_path(root))),
        Arc::new(JsonFileAliasStore::for_migrations_root(root)),
        ExecutionLog::new(log_store, METADATA_ALIAS),
        target,
    )
}

#[tokio::test]
async fn test_create_migration_registers_family() {
    let temp_dir = create_test_dir();
    let root = temp_dir.path();

    let first = scaffold(root, BumpKind::Patch).await;
    assert!(first.new_family);
    assert_eq!(first.version, SemVer::new(1, 0, 0));
    assert_eq!(first.name, "users-migration-v1.0.0");
    assert!(first.path.exists());

    let config = JsonFileAliasStore::for_migrations_root(root)
        .load()
        .await
        .expect("Should load alias config");
    assert_eq!(config.alias_for("users"), Some("app-users"));

    let second = scaffold(root, BumpKind::Minor).await;
    assert!(!second.new_family);
    assert_eq!(second.version, SemVer::new(1, 1, 0));

    let listed = FsMigrationSource::new(get_indexes_path(root))
        .list()
        .await
        .expect("Should list migrations");
    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn test_create_migration_rejects_empty_family() {
    let temp_dir = create_test_dir();
    let aliases = JsonFileAliasStore::for_migrations_root(temp_dir.path());

    let result = create_migration(
        temp_dir.path(),
        &aliases,
        CreateMigrationOptions {
            family: "  ".to_string(),
            ..Default::default()
        },
    )
    .await;

    assert!(matches!(result, Err(ScaffoldError::MissingArgument(_))));
}

#[tokio::test]
async fn test_scaffolded_migrations_swap_alias() {
    let temp_dir = create_test_dir();
    let root = temp_dir.path();
    scaffold(root, BumpKind::Patch).await;

    let log_store = metadata_store().await;
    let target = Arc::new(MemoryStore::new());
    let executor = fs_executor(root, Arc::clone(&log_store), Arc::clone(&target));

    executor
        .up(UpOptions {
            release_tag: Some("1.0.0".to_string()),
            ..Default::default()
        })
        .await
        .expect("Should apply first version");
    assert_eq!(target.alias_targets("app-users").await, vec!["app-users-v1.0.0"]);

    target
        .index_document("app-users", "alice", json!({ "name": "Alice" }))
        .await
        .expect("Should index document");

    scaffold(root, BumpKind::Patch).await;
    let report = executor
        .up(UpOptions {
            release_tag: Some("1.1.0".to_string()),
            ..Default::default()
        })
        .await
        .expect("Should apply second version");
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].index_name, "app-users-v1.0.1");

    assert_eq!(target.alias_targets("app-users").await, vec!["app-users-v1.0.1"]);
    let moved = target
        .get_document("app-users-v1.0.1", "alice")
        .await
        .expect("Should read document");
    assert!(moved.is_some());

    executor
        .down(DownOptions {
            release_tag: Some("1.1.0".to_string()),
            ..Default::default()
        })
        .await
        .expect("Should revert second version");

    assert_eq!(target.alias_targets("app-users").await, vec!["app-users-v1.0.0"]);
    assert_eq!(target.indices().await, vec!["app-users-v1.0.0"]);
    assert_eq!(
        executor.pending().await.expect("Should list pending"),
        vec!["users-migration-v1.0.1"]
    );
}
