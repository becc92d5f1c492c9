//! Creation of new migration files.
//!
//! A new family starts at version 1.0.0 and gets its alias registered in the
//! alias mapping. An existing family gets its latest migration's version
//! bumped. The generated file is a `ScriptedMigration` skeleton that swaps
//! the family alias onto the new index.

use crate::config::{AliasStore, ConfigError};
use crate::migration::{
    parse_filename, MigrationError, MigrationRecord, ScriptedMigration, Step,
};
use crate::utils::{get_indexes_path, now_millis};
use crate::version::{BumpKind, SemVer};
use serde_json::json;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::info;

#[derive(Error, Debug)]
pub enum ScaffoldError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Migration error: {0}")]
    MigrationError(#[from] MigrationError),

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("No migration files in family {0}")]
    EmptyFamily(String),
}

/// Options for creating a migration
#[derive(Debug, Clone, Default)]
pub struct CreateMigrationOptions {
    /// Family directory name
    pub family: String,
    /// Alias of a new family; ignored for existing ones
    pub alias: Option<String>,
    /// Component to bump for an existing family
    pub bump: BumpKind,
}

/// Result of migration creation
#[derive(Debug, Clone)]
pub struct CreateMigrationResult {
    pub path: PathBuf,
    pub name: String,
    pub version: SemVer,
    /// Whether the family was created by this call
    pub new_family: bool,
}

/// Version of the most recently created migration of a family
async fn latest_version(family_path: &Path) -> Result<Option<SemVer>, ScaffoldError> {
    let mut latest: Option<(i64, SemVer)> = None;
    let mut entries = fs::read_dir(family_path).await?;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }

        let (version, created_at) = parse_filename(&entry.path())?;
        if latest.map_or(true, |(ts, _)| created_at > ts) {
            latest = Some((created_at, version));
        }
    }

    Ok(latest.map(|(_, version)| version))
}

/// Skeleton moving the family alias onto the new index
fn skeleton(name: String) -> ScriptedMigration {
    let index = "{{indexName}}".to_string();
    let previous = "{{previousIndexName}}".to_string();
    let alias = "{{alias}}".to_string();

    ScriptedMigration {
        name,
        up: vec![
            Step::CreateIndex {
                index: index.clone(),
                body: json!({ "mappings": { "properties": {} } }),
            },
            Step::Reindex {
                source: previous.clone(),
                dest: index.clone(),
            },
            Step::DeleteAlias {
                index: previous.clone(),
                alias: alias.clone(),
            },
            Step::PutAlias {
                index: index.clone(),
                alias: alias.clone(),
            },
        ],
        down: vec![
            Step::DeleteAlias {
                index: index.clone(),
                alias: alias.clone(),
            },
            Step::PutAlias {
                index: previous,
                alias,
            },
            Step::DeleteIndex { index },
        ],
    }
}

/// Create the next migration file of a family
pub async fn create_migration(
    migrations_root: &Path,
    aliases: &dyn AliasStore,
    options: CreateMigrationOptions,
) -> Result<CreateMigrationResult, ScaffoldError> {
    let family = options.family.trim();
    if family.is_empty() {
        return Err(ScaffoldError::MissingArgument("family".to_string()));
    }

    let family_path = get_indexes_path(migrations_root).join(family);
    let new_family = !family_path.exists();

    let version = if new_family {
        let alias = options
            .alias
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ScaffoldError::MissingArgument("alias".to_string()))?;

        fs::create_dir_all(&family_path).await?;

        let mut config = aliases.load().await?;
        config.set_alias(family, alias);
        aliases.save(&config).await?;
        info!(family = %family, alias = %alias, "Registered new index family");

        SemVer::new(1, 0, 0)
    } else {
        latest_version(&family_path)
            .await?
            .ok_or_else(|| ScaffoldError::EmptyFamily(family.to_string()))?
            .bump(options.bump)
    };

    let record = MigrationRecord::new(family, version, now_millis());
    let name = record.display_name();
    let path = family_path.join(format!("{}.json", record.filename()));

    let content = serde_json::to_string_pretty(&skeleton(name.clone()))?;
    fs::write(&path, content).await?;
    info!(path = %path.display(), migration = %name, "Created migration");

    Ok(CreateMigrationResult {
        path,
        name,
        version,
        new_family,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryAliasStore;

    #[test]
    fn test_skeleton_round_trips() {
        let migration = skeleton("users-migration-v1.0.0".to_string());
        let content = serde_json::to_string(&migration).unwrap();
        assert!(content.contains(r#""action":"createIndex""#));
        assert_eq!(ScriptedMigration::from_json(&content).unwrap(), migration);
    }

    #[tokio::test]
    async fn test_new_family_requires_alias() {
        let temp_dir = tempfile::tempdir().unwrap();
        let aliases = MemoryAliasStore::default();
        let result = create_migration(
            temp_dir.path(),
            &aliases,
            CreateMigrationOptions {
                family: "users".to_string(),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(ScaffoldError::MissingArgument(_))));
    }

    #[tokio::test]
    async fn test_empty_family_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join("indexes/users"))
            .await
            .unwrap();
        let aliases = MemoryAliasStore::default();
        let result = create_migration(
            temp_dir.path(),
            &aliases,
            CreateMigrationOptions {
                family: "users".to_string(),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(ScaffoldError::EmptyFamily(_))));
    }
}
