//! Types for the migration system.

use crate::store::DocumentStore;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Error types for migration operations.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Version error: {0}")]
    VersionError(#[from] crate::version::VersionError),

    #[error("Config error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("Log error: {0}")]
    LogError(#[from] crate::log::LogError),

    #[error("Store error: {0}")]
    StoreError(#[from] crate::store::StoreError),

    #[error("Template error: {0}")]
    TemplateError(#[from] handlebars::RenderError),

    #[error("Malformed migration filename: {0}")]
    MalformedFilename(String),

    #[error("Alias is not set up for family: {0}")]
    UnknownAlias(String),

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Unknown migration: {0}")]
    UnknownMigration(String),

    #[error("Migration {0} failed: {1}")]
    MigrationFailed(String, String),
}

/// Everything a migration knows about the index it operates on.
///
/// Built right before a migration's `up`/`down` runs and dropped afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Stable alias of the family
    pub alias: String,
    /// Index this migration version targets, `{alias}-v{version}`
    pub index_name: String,
    /// Index of the closest lower version in the family, if any
    pub previous_index_name: Option<String>,
    /// Release the run is tagged with
    pub release_tag: Option<String>,
}

/// Trait for a single migration.
///
/// Migrations receive the resolved context and a store handle; they hold no
/// state of their own about where they run.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Name recorded in the execution log, conventionally
    /// `{family}-migration-v{version}`.
    fn name(&self) -> &str;

    /// Apply the migration.
    async fn up(
        &self,
        ctx: &ExecutionContext,
        store: &dyn DocumentStore,
    ) -> Result<(), MigrationError>;

    /// Revert the migration.
    async fn down(
        &self,
        ctx: &ExecutionContext,
        store: &dyn DocumentStore,
    ) -> Result<(), MigrationError>;
}

/// A migration and the location it was discovered at.
///
/// The location encodes the family (parent directory) and the version and
/// creation time (file name, `name-v{version}-{timestamp}`).
#[derive(Clone)]
pub struct MigrationEntry {
    pub location: PathBuf,
    pub migration: Arc<dyn Migration>,
}

impl MigrationEntry {
    pub fn new(location: impl Into<PathBuf>, migration: Arc<dyn Migration>) -> Self {
        Self {
            location: location.into(),
            migration,
        }
    }

    pub fn name(&self) -> &str {
        self.migration.name()
    }
}

impl fmt::Debug for MigrationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationEntry")
            .field("location", &self.location)
            .field("name", &self.name())
            .finish()
    }
}

/// Direction of migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    /// Applying migrations.
    Up,
    /// Reverting migrations.
    Down,
}

/// Lifecycle of one migration within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStatus {
    Pending,
    Running,
    Applied,
    Reverted,
    Failed,
}

impl MigrationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MigrationStatus::Applied | MigrationStatus::Reverted | MigrationStatus::Failed
        )
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MigrationStatus::Pending => "pending",
            MigrationStatus::Running => "running",
            MigrationStatus::Applied => "applied",
            MigrationStatus::Reverted => "reverted",
            MigrationStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Final state of one migration in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub name: String,
    pub index_name: String,
    pub status: MigrationStatus,
}

/// Result of an orchestrator run.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub direction: MigrationDirection,
    /// Migrations touched by the run, in execution order.
    pub outcomes: Vec<MigrationOutcome>,
}

impl MigrationReport {
    pub fn new(direction: MigrationDirection) -> Self {
        Self {
            direction,
            outcomes: Vec::new(),
        }
    }

    /// Names of the migrations that reached the given status.
    pub fn names_with(&self, status: MigrationStatus) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == status)
            .map(|o| o.name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
