use serde::{Deserialize, Serialize};

/// One executed migration inside a family's log document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogItem {
    pub name: String,
    /// Release tag the migration ran under; empty when none was given
    #[serde(default)]
    pub app_version: String,
    pub created_at: String,
}

/// Body of a family's log document, as stored in the metadata index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDocument {
    pub alias: String,
    #[serde(default)]
    pub migrations: Vec<LogItem>,
}

/// A family's execution history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Document id (the family alias)
    pub id: String,
    pub alias: String,
    pub migrations: Vec<LogItem>,
}

impl LogEntry {
    pub fn from_document(id: String, document: LogDocument) -> Self {
        Self {
            id,
            alias: document.alias,
            migrations: document.migrations,
        }
    }

    /// Whether a migration with this name is recorded
    pub fn contains(&self, migration_name: &str) -> bool {
        self.migrations.iter().any(|item| item.name == migration_name)
    }
}
