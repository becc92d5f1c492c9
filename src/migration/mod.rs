//! Migration resolution and execution.
//!
//! # Overview
//!
//! - Migrations implement the `Migration` trait with `up()` and `down()`
//! - A `MigrationSource` lists them: in code via `MigrationRegistry`, or as
//!   JSON files via `FsMigrationSource`
//! - Each migration's location (`<family>/<name>-v<version>-<timestamp>`)
//!   is turned into an `ExecutionContext` by the `MigrationResolver`
//! - The `MigrationExecutor` applies pending migrations, re-runs or reverts
//!   a single one, and reverts everything logged under a release, keeping
//!   the execution log in step
//! - A failed migration stops the run; nothing is rolled back automatically
//!
//! # Usage
//!
//! ```ignore
//! let executor = MigrationExecutor::new(source, aliases, log, store);
//! executor.up(UpOptions { release_tag: Some("3.1.0".into()), ..Default::default() }).await?;
//! executor.down(DownOptions { release_tag: Some("3.1.0".into()), ..Default::default() }).await?;
//! ```

mod executor;
mod record;
mod registry;
mod resolver;
mod scripted;
mod source;
mod types;

pub use executor::{rollback_order, DownOptions, MigrationExecutor, RollbackCandidate, UpOptions};
pub use record::{family_of, parse_filename, MigrationRecord, FILENAME_PREFIX};
pub use registry::MigrationRegistry;
pub use resolver::MigrationResolver;
pub use scripted::{ScriptedMigration, Step};
pub use source::{FsMigrationSource, MigrationSource};
pub use types::{
    ExecutionContext, Migration, MigrationDirection, MigrationEntry, MigrationError,
    MigrationOutcome, MigrationReport, MigrationStatus,
};
