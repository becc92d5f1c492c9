//! Family to alias mapping.
//!
//! Every index family (a directory under `migrations/indexes`) must map to a
//! stable alias before its migrations can be resolved. The mapping is kept in
//! `migrations/migration.config.json`:
//!
//! ```json
//! { "alias": { "users": "app-users" } }
//! ```

use crate::utils::get_config_path;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Contents of the alias mapping file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasConfig {
    /// Map of family directory name -> alias
    #[serde(default)]
    pub alias: BTreeMap<String, String>,
}

impl AliasConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the alias registered for a family
    pub fn alias_for(&self, family: &str) -> Option<&str> {
        self.alias.get(family).map(String::as_str)
    }

    /// Register (or replace) the alias of a family
    pub fn set_alias(&mut self, family: impl Into<String>, alias: impl Into<String>) {
        self.alias.insert(family.into(), alias.into());
    }
}

impl<F: Into<String>, A: Into<String>> FromIterator<(F, A)> for AliasConfig {
    fn from_iter<I: IntoIterator<Item = (F, A)>>(iter: I) -> Self {
        Self {
            alias: iter
                .into_iter()
                .map(|(family, alias)| (family.into(), alias.into()))
                .collect(),
        }
    }
}

/// Storage for the alias mapping, injected wherever the mapping is read or written.
#[async_trait]
pub trait AliasStore: Send + Sync {
    /// Load the mapping. A missing mapping is an empty one.
    async fn load(&self) -> Result<AliasConfig, ConfigError>;

    /// Persist the whole mapping.
    async fn save(&self, config: &AliasConfig) -> Result<(), ConfigError>;
}

/// Alias mapping kept in `migration.config.json` under the migrations root
pub struct JsonFileAliasStore {
    path: PathBuf,
}

impl JsonFileAliasStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location under a migrations root
    pub fn for_migrations_root(migrations_root: &Path) -> Self {
        Self::new(get_config_path(migrations_root))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AliasStore for JsonFileAliasStore {
    async fn load(&self) -> Result<AliasConfig, ConfigError> {
        if !self.path.exists() {
            return Ok(AliasConfig::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        let config: AliasConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    async fn save(&self, config: &AliasConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write atomically using temp file + rename
        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

/// In-process alias mapping
#[derive(Default)]
pub struct MemoryAliasStore {
    config: RwLock<AliasConfig>,
}

impl MemoryAliasStore {
    pub fn new(config: AliasConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }
}

#[async_trait]
impl AliasStore for MemoryAliasStore {
    async fn load(&self) -> Result<AliasConfig, ConfigError> {
        Ok(self.config.read().await.clone())
    }

    async fn save(&self, config: &AliasConfig) -> Result<(), ConfigError> {
        *self.config.write().await = config.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_config_parse() {
        let config: AliasConfig =
            serde_json::from_str(r#"{ "alias": { "users": "app-users" } }"#).unwrap();
        assert_eq!(config.alias_for("users"), Some("app-users"));
        assert_eq!(config.alias_for("orders"), None);
    }

    #[test]
    fn test_alias_config_missing_field_is_empty() {
        let config: AliasConfig = serde_json::from_str("{}").unwrap();
        assert!(config.alias.is_empty());
    }

    #[tokio::test]
    async fn test_json_store_missing_file_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileAliasStore::for_migrations_root(temp_dir.path());
        assert_eq!(store.load().await.unwrap(), AliasConfig::new());
    }

    #[tokio::test]
    async fn test_json_store_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileAliasStore::for_migrations_root(&temp_dir.path().join("migrations"));

        let mut config = AliasConfig::new();
        config.set_alias("users", "app-users");
        store.save(&config).await.unwrap();

        assert!(store.path().exists());
        assert_eq!(store.load().await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryAliasStore::default();
        let config: AliasConfig = [("orders", "app-orders")].into_iter().collect();
        store.save(&config).await.unwrap();
        assert_eq!(store.load().await.unwrap().alias_for("orders"), Some("app-orders"));
    }
}
