//! Migration executor for running migrations.

use super::record::MigrationRecord;
use super::resolver::MigrationResolver;
use super::source::MigrationSource;
use super::types::{
    ExecutionContext, MigrationDirection, MigrationEntry, MigrationError, MigrationOutcome,
    MigrationReport, MigrationStatus,
};
use crate::config::AliasStore;
use crate::log::ExecutionLog;
use crate::store::DocumentStore;
use crate::version::release_identifier;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument, Span};

/// Options for a forward run.
#[derive(Debug, Clone, Default)]
pub struct UpOptions {
    /// Run only this migration, even if it already ran.
    pub migration: Option<String>,
    /// Release tag recorded with every applied migration.
    pub release_tag: Option<String>,
}

/// Options for a backward run. At least one field must be set.
#[derive(Debug, Clone, Default)]
pub struct DownOptions {
    /// Revert only this migration.
    pub migration: Option<String>,
    /// Revert every migration logged under this release tag.
    pub release_tag: Option<String>,
}

/// A migration logged under a release, waiting to be reverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackCandidate {
    pub name: String,
    pub release_tag: String,
    /// Position in the ordered migration sequence
    pub position: usize,
}

/// Order migrations for a release rollback.
///
/// Newest release first (by `release_identifier`), later migrations first
/// within a release, each name once.
pub fn rollback_order(candidates: Vec<RollbackCandidate>) -> Result<Vec<String>, MigrationError> {
    let mut keyed = candidates
        .into_iter()
        .map(|c| Ok((release_identifier(&c.release_tag)?, c)))
        .collect::<Result<Vec<_>, MigrationError>>()?;

    keyed.sort_by(|(id_a, a), (id_b, b)| id_b.cmp(id_a).then(b.position.cmp(&a.position)));

    let mut seen = HashSet::new();
    Ok(keyed
        .into_iter()
        .filter(|(_, c)| seen.insert(c.name.clone()))
        .map(|(_, c)| c.name)
        .collect())
}

enum RevertTarget {
    Migration(String),
    Release(String),
}

struct PlannedMigration {
    entry: MigrationEntry,
    record: MigrationRecord,
    position: usize,
}

impl PlannedMigration {
    fn name(&self) -> &str {
        self.entry.name()
    }
}

/// The ordered migration sequence of one run.
struct Plan {
    migrations: Vec<PlannedMigration>,
}

impl Plan {
    /// Families run in the order they first appear; migrations of a family
    /// run by version.
    fn build(entries: Vec<MigrationEntry>) -> Result<Self, MigrationError> {
        let mut families: Vec<String> = Vec::new();
        let mut parsed = Vec::with_capacity(entries.len());

        for entry in entries {
            let record = MigrationRecord::from_location(&entry.location)?;
            if !families.contains(&record.family) {
                families.push(record.family.clone());
            }
            parsed.push((entry, record));
        }

        let family_rank = |family: &str| families.iter().position(|f| f == family);
        parsed.sort_by(|(_, a), (_, b)| {
            family_rank(a.family.as_str())
                .cmp(&family_rank(b.family.as_str()))
                .then(a.version.cmp(&b.version))
                .then(a.created_at.cmp(&b.created_at))
        });

        Ok(Self {
            migrations: parsed
                .into_iter()
                .enumerate()
                .map(|(position, (entry, record))| PlannedMigration {
                    entry,
                    record,
                    position,
                })
                .collect(),
        })
    }

    fn find(&self, name: &str) -> Result<&PlannedMigration, MigrationError> {
        self.migrations
            .iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| MigrationError::UnknownMigration(name.to_string()))
    }

    fn siblings(&self, family: &str) -> Vec<&Path> {
        self.migrations
            .iter()
            .filter(|m| m.record.family == family)
            .map(|m| m.entry.location.as_path())
            .collect()
    }

    fn resolve(
        &self,
        resolver: &MigrationResolver,
        planned: &PlannedMigration,
        release_tag: Option<&str>,
    ) -> Result<ExecutionContext, MigrationError> {
        resolver.resolve(
            &planned.entry.location,
            self.siblings(&planned.record.family),
            release_tag,
        )
    }
}

/// Executor for running migrations.
///
/// Runs migrations from a source strictly one after another, resolving each
/// one's execution context right before it runs and keeping the execution
/// log in step. A failing migration stops the run; nothing already applied
/// is reverted.
pub struct MigrationExecutor {
    source: Arc<dyn MigrationSource>,
    aliases: Arc<dyn AliasStore>,
    log: ExecutionLog,
    store: Arc<dyn DocumentStore>,
    span: Span,
}

impl MigrationExecutor {
    /// Create a new executor.
    ///
    /// `store` is the handle migrations run against; the log may live in a
    /// different store.
    pub fn new(
        source: Arc<dyn MigrationSource>,
        aliases: Arc<dyn AliasStore>,
        log: ExecutionLog,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            source,
            aliases,
            log,
            store,
            span: info_span!("migrations"),
        }
    }

    /// Emit the executor's events inside `span` instead of the default one.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn log(&self) -> &ExecutionLog {
        &self.log
    }

    /// Names of migrations that have not run yet, in execution order.
    pub async fn pending(&self) -> Result<Vec<String>, MigrationError> {
        let plan = self.plan().await?;
        let executed: HashSet<String> = self.log.executed().await?.into_iter().collect();
        Ok(plan
            .migrations
            .iter()
            .filter(|m| !executed.contains(m.name()))
            .map(|m| m.name().to_string())
            .collect())
    }

    /// Apply pending migrations, or re-run a single one.
    pub async fn up(&self, options: UpOptions) -> Result<MigrationReport, MigrationError> {
        self.run_up(options).instrument(self.span.clone()).await
    }

    /// Revert a single migration or everything logged under a release.
    pub async fn down(&self, options: DownOptions) -> Result<MigrationReport, MigrationError> {
        self.run_down(options).instrument(self.span.clone()).await
    }

    async fn plan(&self) -> Result<Plan, MigrationError> {
        Plan::build(self.source.list().await?)
    }

    async fn resolver(&self) -> Result<MigrationResolver, MigrationError> {
        Ok(MigrationResolver::new(self.aliases.load().await?))
    }

    async fn run_up(&self, options: UpOptions) -> Result<MigrationReport, MigrationError> {
        let release_tag = options.release_tag.as_deref().filter(|t| !t.is_empty());
        let plan = self.plan().await?;
        let resolver = self.resolver().await?;
        let executed: HashSet<String> = self.log.executed().await?.into_iter().collect();

        let selected: Vec<&PlannedMigration> = match options.migration.as_deref() {
            Some(name) => vec![plan.find(name)?],
            None => plan
                .migrations
                .iter()
                .filter(|m| !executed.contains(m.name()))
                .collect(),
        };

        // Resolve everything before the first side effect
        let contexts = selected
            .iter()
            .map(|m| plan.resolve(&resolver, m, release_tag))
            .collect::<Result<Vec<_>, _>>()?;

        let mut report = MigrationReport::new(MigrationDirection::Up);
        if selected.is_empty() {
            info!("No pending migrations");
            return Ok(report);
        }

        for planned in &selected {
            info!(migration = %planned.name(), status = %MigrationStatus::Pending, "Queued migration");
        }

        for (planned, ctx) in selected.into_iter().zip(contexts) {
            let already_logged = executed.contains(planned.name());
            report
                .outcomes
                .push(self.apply(planned, &ctx, already_logged).await?);
        }

        info!(count = report.outcomes.len(), "Migrations applied");
        Ok(report)
    }

    async fn apply(
        &self,
        planned: &PlannedMigration,
        ctx: &ExecutionContext,
        already_logged: bool,
    ) -> Result<MigrationOutcome, MigrationError> {
        let name = planned.name();
        info!(
            migration = %name,
            index = %ctx.index_name,
            status = %MigrationStatus::Running,
            "Applying migration"
        );

        if let Err(e) = planned.entry.migration.up(ctx, self.store.as_ref()).await {
            error!(migration = %name, error = %e, status = %MigrationStatus::Failed, "Migration failed");
            return Err(e);
        }

        if !already_logged {
            self.log
                .append(&ctx.alias, name, ctx.release_tag.as_deref())
                .await?;
        }

        info!(migration = %name, status = %MigrationStatus::Applied, "Migration applied");
        Ok(MigrationOutcome {
            name: name.to_string(),
            index_name: ctx.index_name.clone(),
            status: MigrationStatus::Applied,
        })
    }

    async fn run_down(&self, options: DownOptions) -> Result<MigrationReport, MigrationError> {
        let release_tag = options.release_tag.filter(|t| !t.is_empty());
        let target = match (options.migration.filter(|m| !m.is_empty()), &release_tag) {
            (Some(name), _) => RevertTarget::Migration(name),
            (None, Some(tag)) => RevertTarget::Release(tag.clone()),
            (None, None) => {
                return Err(MigrationError::MissingArgument(
                    "a migration name or a release tag is required".to_string(),
                ))
            }
        };

        let plan = self.plan().await?;
        let resolver = self.resolver().await?;

        let names = match target {
            RevertTarget::Migration(name) => vec![name],
            RevertTarget::Release(tag) => {
                let candidates = self
                    .log
                    .list_by_release_tag(&tag)
                    .await?
                    .into_iter()
                    .flat_map(|entry| entry.migrations)
                    .map(|item| {
                        Ok(RollbackCandidate {
                            position: plan.find(&item.name)?.position,
                            name: item.name,
                            release_tag: item.app_version,
                        })
                    })
                    .collect::<Result<Vec<_>, MigrationError>>()?;
                rollback_order(candidates)?
            }
        };

        // Resolve everything before the first side effect
        let targets = names
            .iter()
            .map(|name| {
                let planned = plan.find(name)?;
                let ctx = plan.resolve(&resolver, planned, release_tag.as_deref())?;
                Ok((planned, ctx))
            })
            .collect::<Result<Vec<_>, MigrationError>>()?;

        let mut report = MigrationReport::new(MigrationDirection::Down);
        if targets.is_empty() {
            info!(release = ?release_tag, "Nothing to revert");
            return Ok(report);
        }

        for (planned, ctx) in targets {
            report.outcomes.push(self.revert(planned, &ctx).await?);
        }

        info!(count = report.outcomes.len(), "Migrations reverted");
        Ok(report)
    }

    async fn revert(
        &self,
        planned: &PlannedMigration,
        ctx: &ExecutionContext,
    ) -> Result<MigrationOutcome, MigrationError> {
        let name = planned.name();
        info!(
            migration = %name,
            index = %ctx.index_name,
            status = %MigrationStatus::Running,
            "Reverting migration"
        );

        if let Err(e) = planned.entry.migration.down(ctx, self.store.as_ref()).await {
            error!(migration = %name, error = %e, status = %MigrationStatus::Failed, "Revert failed");
            return Err(e);
        }

        self.log.remove(&ctx.alias, name).await?;

        info!(migration = %name, status = %MigrationStatus::Reverted, "Migration reverted");
        Ok(MigrationOutcome {
            name: name.to_string(),
            index_name: ctx.index_name.clone(),
            status: MigrationStatus::Reverted,
        })
    }
}
