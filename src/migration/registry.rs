//! Registry of migrations compiled into the program.

use super::source::MigrationSource;
use super::types::{Migration, MigrationEntry, MigrationError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Migrations registered in code.
///
/// Each migration is registered under the location it would have on disk
/// (`<family>/<name>-v<version>-<timestamp>`), which is what the resolver
/// uses to work out its family and version. Declaration order is kept.
#[derive(Default)]
pub struct MigrationRegistry {
    entries: Vec<MigrationEntry>,
}

impl MigrationRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a migration under its location.
    pub fn register(&mut self, location: impl Into<PathBuf>, migration: Arc<dyn Migration>) {
        self.entries.push(MigrationEntry::new(location, migration));
    }

    /// Builder-style `register`.
    pub fn with(mut self, location: impl Into<PathBuf>, migration: Arc<dyn Migration>) -> Self {
        self.register(location, migration);
        self
    }

    /// Names of all registered migrations, in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl MigrationSource for MigrationRegistry {
    async fn list(&self) -> Result<Vec<MigrationEntry>, MigrationError> {
        Ok(self.entries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::types::ExecutionContext;
    use crate::store::DocumentStore;

    // Mock migration for testing
    struct MockMigration {
        name: String,
    }

    #[async_trait]
    impl Migration for MockMigration {
        fn name(&self) -> &str {
            &self.name
        }

        async fn up(
            &self,
            _ctx: &ExecutionContext,
            _store: &dyn DocumentStore,
        ) -> Result<(), MigrationError> {
            Ok(())
        }

        async fn down(
            &self,
            _ctx: &ExecutionContext,
            _store: &dyn DocumentStore,
        ) -> Result<(), MigrationError> {
            Ok(())
        }
    }

    fn mock(name: &str) -> Arc<dyn Migration> {
        Arc::new(MockMigration {
            name: name.to_string(),
        })
    }

    #[test]
    fn test_empty_registry() {
        let registry = MigrationRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.names().is_empty());
    }

    #[tokio::test]
    async fn test_list_keeps_declaration_order() {
        let registry = MigrationRegistry::new()
            .with("users/migration-v1.0.0-1", mock("users-migration-v1.0.0"))
            .with("orders/migration-v1.0.0-2", mock("orders-migration-v1.0.0"))
            .with("users/migration-v1.1.0-3", mock("users-migration-v1.1.0"));

        assert_eq!(registry.len(), 3);
        let entries = registry.list().await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec![
                "users-migration-v1.0.0",
                "orders-migration-v1.0.0",
                "users-migration-v1.1.0"
            ]
        );
        assert_eq!(
            entries[1].location,
            PathBuf::from("orders/migration-v1.0.0-2")
        );
    }
}
