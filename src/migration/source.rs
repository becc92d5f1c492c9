//! Enumeration of available migrations.

use super::scripted::ScriptedMigration;
use super::types::{MigrationEntry, MigrationError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

/// Lists the migrations the orchestrator can run.
///
/// The order of the listing is the declaration order: families are run in
/// the order they first appear.
#[async_trait]
pub trait MigrationSource: Send + Sync {
    async fn list(&self) -> Result<Vec<MigrationEntry>, MigrationError>;
}

/// JSON migration files under `migrations/indexes/<family>/`
pub struct FsMigrationSource {
    indexes_path: PathBuf,
}

impl FsMigrationSource {
    pub fn new(indexes_path: impl Into<PathBuf>) -> Self {
        Self {
            indexes_path: indexes_path.into(),
        }
    }

    pub fn indexes_path(&self) -> &Path {
        &self.indexes_path
    }
}

#[async_trait]
impl MigrationSource for FsMigrationSource {
    async fn list(&self) -> Result<Vec<MigrationEntry>, MigrationError> {
        if !self.indexes_path.exists() {
            return Ok(Vec::new());
        }

        let paths: Vec<PathBuf> = WalkDir::new(&self.indexes_path)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect();

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let migration = ScriptedMigration::load(&path).await?;
            debug!(path = %path.display(), migration = %migration.name, "Loaded migration");
            entries.push(MigrationEntry::new(path, Arc::new(migration)));
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::fs;

    async fn write_migration(root: &Path, family: &str, file: &str, name: &str) {
        let dir = root.join(family);
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(
            dir.join(file),
            format!(r#"{{ "name": "{}", "up": [], "down": [] }}"#, name),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = FsMigrationSource::new(temp_dir.path().join("indexes"));
        assert!(source.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lists_json_files_per_family() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        write_migration(root, "users", "migration-v1.0.0-1.json", "users-migration-v1.0.0").await;
        write_migration(root, "orders", "migration-v1.0.0-2.json", "orders-migration-v1.0.0").await;
        fs::write(root.join("users").join("notes.txt"), "ignored")
            .await
            .unwrap();

        let source = FsMigrationSource::new(root);
        let entries = source.list().await.unwrap();

        let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["orders-migration-v1.0.0", "users-migration-v1.0.0"]);
        assert!(entries[1].location.ends_with("users/migration-v1.0.0-1.json"));
    }

    #[tokio::test]
    async fn test_invalid_json_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("users");
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("migration-v1.0.0-1.json"), "not json")
            .await
            .unwrap();

        let result = FsMigrationSource::new(temp_dir.path()).list().await;
        assert!(matches!(result, Err(MigrationError::JsonError(_))));
    }
}
