//! Declarative migrations stored as JSON files.
//!
//! A scripted migration lists the store operations of its `up` and `down`
//! directions. String fields are handlebars templates rendered against the
//! execution context (`{{alias}}`, `{{indexName}}`, `{{previousIndexName}}`,
//! `{{releaseTag}}`):
//!
//! ```json
//! {
//!   "name": "users-migration-v1.1.0",
//!   "up": [
//!     { "action": "createIndex", "index": "{{indexName}}", "body": { "mappings": {} } },
//!     { "action": "reindex", "source": "{{previousIndexName}}", "dest": "{{indexName}}" },
//!     { "action": "deleteAlias", "index": "{{previousIndexName}}", "alias": "{{alias}}" },
//!     { "action": "putAlias", "index": "{{indexName}}", "alias": "{{alias}}" }
//!   ],
//!   "down": [
//!     { "action": "deleteAlias", "index": "{{indexName}}", "alias": "{{alias}}" },
//!     { "action": "putAlias", "index": "{{previousIndexName}}", "alias": "{{alias}}" },
//!     { "action": "deleteIndex", "index": "{{indexName}}" }
//!   ]
//! }
//! ```
//!
//! A step whose index or alias renders empty is skipped, so the same file
//! shape works for the first version of a family, which has no previous index.

use super::types::{ExecutionContext, Migration, MigrationError};
use crate::store::DocumentStore;
use async_trait::async_trait;
use handlebars::Handlebars;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

static ENGINE: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
});

fn render(template: &str, ctx: &ExecutionContext) -> Result<String, handlebars::RenderError> {
    ENGINE.render_template(template, ctx)
}

/// One store operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Step {
    CreateIndex {
        index: String,
        #[serde(default)]
        body: Value,
    },
    DeleteIndex {
        index: String,
    },
    PutAlias {
        index: String,
        alias: String,
    },
    DeleteAlias {
        index: String,
        alias: String,
    },
    Reindex {
        source: String,
        dest: String,
    },
}

impl Step {
    /// Render every templated field against the context
    fn render(&self, ctx: &ExecutionContext) -> Result<Step, MigrationError> {
        let r = |template: &String| render(template, ctx);
        Ok(match self {
            Step::CreateIndex { index, body } => Step::CreateIndex {
                index: r(index)?,
                body: body.clone(),
            },
            Step::DeleteIndex { index } => Step::DeleteIndex { index: r(index)? },
            Step::PutAlias { index, alias } => Step::PutAlias {
                index: r(index)?,
                alias: r(alias)?,
            },
            Step::DeleteAlias { index, alias } => Step::DeleteAlias {
                index: r(index)?,
                alias: r(alias)?,
            },
            Step::Reindex { source, dest } => Step::Reindex {
                source: r(source)?,
                dest: r(dest)?,
            },
        })
    }

    fn names(&self) -> Vec<&str> {
        match self {
            Step::CreateIndex { index, .. } | Step::DeleteIndex { index } => vec![index.as_str()],
            Step::PutAlias { index, alias } | Step::DeleteAlias { index, alias } => {
                vec![index.as_str(), alias.as_str()]
            }
            Step::Reindex { source, dest } => vec![source.as_str(), dest.as_str()],
        }
    }

    async fn apply(self, store: &dyn DocumentStore) -> Result<(), MigrationError> {
        match self {
            Step::CreateIndex { index, body } => store.create_index(&index, body).await?,
            Step::DeleteIndex { index } => store.delete_index(&index).await?,
            Step::PutAlias { index, alias } => store.put_alias(&index, &alias).await?,
            Step::DeleteAlias { index, alias } => store.delete_alias(&index, &alias).await?,
            Step::Reindex { source, dest } => store.reindex(&source, &dest).await?,
        }
        Ok(())
    }
}

/// Migration loaded from a JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedMigration {
    pub name: String,
    #[serde(default)]
    pub up: Vec<Step>,
    #[serde(default)]
    pub down: Vec<Step>,
}

impl ScriptedMigration {
    pub fn from_json(content: &str) -> Result<Self, MigrationError> {
        Ok(serde_json::from_str(content)?)
    }

    pub async fn load(path: &Path) -> Result<Self, MigrationError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    async fn run(
        &self,
        steps: &[Step],
        ctx: &ExecutionContext,
        store: &dyn DocumentStore,
    ) -> Result<(), MigrationError> {
        for step in steps {
            let rendered = step.render(ctx)?;
            if rendered.names().iter().any(|name| name.is_empty()) {
                warn!(migration = %self.name, step = ?step, "Skipping step with empty target");
                continue;
            }

            info!(migration = %self.name, step = ?rendered, "Applying step");
            rendered.apply(store).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Migration for ScriptedMigration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn up(
        &self,
        ctx: &ExecutionContext,
        store: &dyn DocumentStore,
    ) -> Result<(), MigrationError> {
        self.run(&self.up, ctx, store).await
    }

    async fn down(
        &self,
        ctx: &ExecutionContext,
        store: &dyn DocumentStore,
    ) -> Result<(), MigrationError> {
        self.run(&self.down, ctx, store).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn context(previous: Option<&str>) -> ExecutionContext {
        ExecutionContext {
            alias: "users".to_string(),
            index_name: "users-v1.1.0".to_string(),
            previous_index_name: previous.map(str::to_string),
            release_tag: None,
        }
    }

    fn swap_migration() -> ScriptedMigration {
        ScriptedMigration::from_json(
            r#"{
                "name": "users-migration-v1.1.0",
                "up": [
                    { "action": "createIndex", "index": "{{indexName}}", "body": { "mappings": {} } },
                    { "action": "reindex", "source": "{{previousIndexName}}", "dest": "{{indexName}}" },
                    { "action": "deleteAlias", "index": "{{previousIndexName}}", "alias": "{{alias}}" },
                    { "action": "putAlias", "index": "{{indexName}}", "alias": "{{alias}}" }
                ],
                "down": [
                    { "action": "deleteAlias", "index": "{{indexName}}", "alias": "{{alias}}" },
                    { "action": "putAlias", "index": "{{previousIndexName}}", "alias": "{{alias}}" },
                    { "action": "deleteIndex", "index": "{{indexName}}" }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_steps() {
        let migration = swap_migration();
        assert_eq!(migration.up.len(), 4);
        assert_eq!(
            migration.down[2],
            Step::DeleteIndex {
                index: "{{indexName}}".to_string()
            }
        );
    }

    #[test]
    fn test_render_step() {
        let step = Step::Reindex {
            source: "{{previousIndexName}}".to_string(),
            dest: "{{indexName}}".to_string(),
        };
        let rendered = step.render(&context(Some("users-v1.0.0"))).unwrap();
        assert_eq!(
            rendered,
            Step::Reindex {
                source: "users-v1.0.0".to_string(),
                dest: "users-v1.1.0".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_up_and_down_swap_alias() {
        let store = MemoryStore::new();
        store.create_index("users-v1.0.0", json!({})).await.unwrap();
        store.put_alias("users-v1.0.0", "users").await.unwrap();
        store
            .index_document("users-v1.0.0", "1", json!({ "name": "ada" }))
            .await
            .unwrap();

        let migration = swap_migration();
        let ctx = context(Some("users-v1.0.0"));

        migration.up(&ctx, &store).await.unwrap();
        assert_eq!(store.alias_targets("users").await, vec!["users-v1.1.0"]);
        assert!(store
            .get_document("users", "1")
            .await
            .unwrap()
            .is_some());

        migration.down(&ctx, &store).await.unwrap();
        assert_eq!(store.alias_targets("users").await, vec!["users-v1.0.0"]);
        assert!(!store.index_exists("users-v1.1.0").await.unwrap());
    }

    #[tokio::test]
    async fn test_steps_without_previous_index_are_skipped() {
        let store = MemoryStore::new();
        let migration = swap_migration();

        migration.up(&context(None), &store).await.unwrap();

        assert_eq!(store.indices().await, vec!["users-v1.1.0"]);
        assert_eq!(store.alias_targets("users").await, vec!["users-v1.1.0"]);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = MemoryStore::new();
        let migration = ScriptedMigration {
            name: "broken".to_string(),
            up: vec![Step::DeleteIndex {
                index: "{{indexName}}".to_string(),
            }],
            down: vec![],
        };

        let result = migration.up(&context(None), &store).await;
        assert!(matches!(result, Err(MigrationError::StoreError(_))));
    }
}
