use anyhow::Context;
use clap::{Parser, Subcommand};
use index_migrate::config::JsonFileAliasStore;
use index_migrate::migration::{
    DownOptions, FsMigrationSource, MigrationError, MigrationExecutor, MigrationReport, UpOptions,
};
use index_migrate::scaffold::{create_migration, CreateMigrationOptions};
use index_migrate::store::{DocumentStore, ElasticsearchStore, MemoryStore};
use index_migrate::utils::{get_indexes_path, DEFAULT_METADATA_ALIAS, MIGRATIONS_FOLDER};
use index_migrate::version::BumpKind;
use index_migrate::{bootstrap, ExecutionLog};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Index Migrate - versioned migrations for search cluster indices
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the search cluster
    #[arg(long, env = "ELASTICSEARCH_CLUSTER_URL", global = true)]
    elasticsearch_cluster: Option<String>,

    /// API key sent as `Authorization: ApiKey <key>`
    #[arg(
        long,
        env = "ELASTICSEARCH_API_KEY",
        global = true,
        hide_env_values = true
    )]
    elasticsearch_api_key: Option<String>,

    /// Root of the migrations tree (holds `indexes/` and `migration.config.json`)
    #[arg(long, env = "MIGRATIONS_DIR", global = true, default_value = MIGRATIONS_FOLDER)]
    migrations_dir: PathBuf,

    /// Alias of the index holding the execution log
    #[arg(
        long,
        visible_alias = "migrationMetadataAlias",
        env = "MIGRATION_METADATA_ALIAS",
        global = true,
        default_value = DEFAULT_METADATA_ALIAS
    )]
    migration_metadata_alias: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations, or re-run a single one
    Up {
        /// Run only this migration (re-runs it if already applied)
        #[arg(long)]
        migration: Option<String>,

        /// Release tag recorded with the applied migrations
        #[arg(long, visible_alias = "appVersion")]
        app_version: Option<String>,

        /// Persist the execution log in the cluster
        #[arg(long)]
        save: bool,
    },

    /// Revert a single migration or everything applied under a release
    Down {
        /// Revert only this migration
        #[arg(long)]
        migration: Option<String>,

        /// Revert every migration logged under this release tag
        #[arg(long, visible_alias = "appVersion")]
        app_version: Option<String>,

        /// Use the execution log persisted in the cluster
        #[arg(long)]
        save: bool,
    },

    /// Create the execution log index and alias in the cluster
    Setup,

    /// Create the next migration file of an index family
    CreateMigration {
        /// Family directory under `indexes/`
        #[arg(long)]
        family: String,

        /// Alias of a new family
        #[arg(long)]
        alias: Option<String>,

        /// Version component to bump for an existing family
        #[arg(long, default_value = "patch")]
        bump: BumpKind,
    },
}

impl Args {
    fn cluster(&self) -> anyhow::Result<Option<Arc<ElasticsearchStore>>> {
        match &self.elasticsearch_cluster {
            Some(url) if !url.is_empty() => {
                let store = ElasticsearchStore::new(url, self.elasticsearch_api_key.clone())
                    .context("Failed to create cluster client")?;
                Ok(Some(Arc::new(store)))
            }
            _ => Ok(None),
        }
    }

    fn require_cluster(&self) -> anyhow::Result<Arc<ElasticsearchStore>> {
        self.cluster()?.ok_or_else(|| {
            MigrationError::MissingArgument("--elasticsearch-cluster".to_string()).into()
        })
    }

    /// Executor whose migrations target the cluster (or memory when none is
    /// configured) and whose log is persisted only with `save`.
    async fn executor(&self, save: bool) -> anyhow::Result<MigrationExecutor> {
        let cluster = self.cluster()?;

        let log_store: Arc<dyn DocumentStore> = if save {
            self.require_cluster()? as Arc<dyn DocumentStore>
        } else {
            let memory = Arc::new(MemoryStore::new());
            bootstrap::setup(memory.as_ref(), &self.migration_metadata_alias).await?;
            memory as Arc<dyn DocumentStore>
        };

        let target: Arc<dyn DocumentStore> = match cluster {
            Some(cluster) => cluster as Arc<dyn DocumentStore>,
            None => {
                warn!("No cluster configured, running migrations against an in-memory store");
                Arc::new(MemoryStore::new()) as Arc<dyn DocumentStore>
            }
        };

        Ok(MigrationExecutor::new(
            Arc::new(FsMigrationSource::new(get_indexes_path(&self.migrations_dir))),
            Arc::new(JsonFileAliasStore::for_migrations_root(&self.migrations_dir)),
            ExecutionLog::new(log_store, self.migration_metadata_alias.clone()),
            target,
        ))
    }
}

fn print_report(report: &MigrationReport) {
    for outcome in &report.outcomes {
        info!(
            migration = %outcome.name,
            index = %outcome.index_name,
            status = %outcome.status,
            "Done"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse CLI arguments
    let args = Args::parse();

    match &args.command {
        Command::Up {
            migration,
            app_version,
            save,
        } => {
            let executor = args.executor(*save).await?;
            let report = executor
                .up(UpOptions {
                    migration: migration.clone(),
                    release_tag: app_version.clone(),
                })
                .await?;
            print_report(&report);
        }
        Command::Down {
            migration,
            app_version,
            save,
        } => {
            let executor = args.executor(*save).await?;
            let report = executor
                .down(DownOptions {
                    migration: migration.clone(),
                    release_tag: app_version.clone(),
                })
                .await?;
            print_report(&report);
        }
        Command::Setup => {
            let cluster = args.require_cluster()?;
            bootstrap::setup(cluster.as_ref(), &args.migration_metadata_alias).await?;
            info!("Success: migration metadata ready");
        }
        Command::CreateMigration {
            family,
            alias,
            bump,
        } => {
            let aliases = JsonFileAliasStore::for_migrations_root(&args.migrations_dir);
            let created = create_migration(
                &args.migrations_dir,
                &aliases,
                CreateMigrationOptions {
                    family: family.clone(),
                    alias: alias.clone(),
                    bump: *bump,
                },
            )
            .await?;
            info!(path = %created.path.display(), version = %created.version, "Migration created");
        }
    }

    Ok(())
}
