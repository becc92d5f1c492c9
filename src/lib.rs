pub mod bootstrap;
pub mod config;
pub mod log;
pub mod migration;
pub mod scaffold;
pub mod store;
pub mod utils;
pub mod version;

// Re-export commonly used types
pub use bootstrap::setup;
pub use config::{AliasConfig, AliasStore, ConfigError, JsonFileAliasStore, MemoryAliasStore};
pub use log::{ExecutionLog, LogEntry, LogError, LogItem};
pub use migration::{
    DownOptions, ExecutionContext, FsMigrationSource, Migration, MigrationEntry, MigrationError,
    MigrationExecutor, MigrationRecord, MigrationRegistry, MigrationReport, MigrationResolver,
    MigrationSource, MigrationStatus, ScriptedMigration, UpOptions,
};
pub use scaffold::{create_migration, CreateMigrationOptions, CreateMigrationResult, ScaffoldError};
pub use store::{DocumentStore, ElasticsearchStore, MemoryStore, SearchQuery, StoreError};
pub use version::{compare_versions, release_identifier, BumpKind, SemVer, VersionError};
