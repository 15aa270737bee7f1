//! Migration manager.
//!
//! Owns one database connection, the local migration directory and the
//! ledger, and implements the workflows built on them: the development
//! diagnostic and `dev` loop, create-only, deploy, push, reset, and ledger
//! resolution.
//!
//! Operations that need to know what the migration history produces replay it
//! into a shadow database: a fresh in-memory database on SQLite, the
//! configured `shadow_database_url` otherwise. The shadow database is wiped
//! before every replay.

use chrono::Utc;
use oxide_schema_core::{
    build_schema_model, compare_with, generate, parse, ChangeSet, ProviderKind, SchemaModel,
};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::connection::Database;
use crate::diagnostic::{self, DevAction, MigrationStatus};
use crate::directory::{LocalMigration, MigrationDirectory};
use crate::error::{DriftReason, MigrateError, Result};
use crate::executor::MigrationExecutor;
use crate::history::AppliedMigration;
use crate::introspect::{all_table_names, introspect};

/// What [`MigrationManager::dev`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevOutcome {
    /// Pending migrations that were applied, oldest first.
    pub applied: Vec<String>,
    /// Migration created from the declaration and applied, if any.
    pub created: Option<String>,
}

/// Entry point for every migration workflow.
#[derive(Debug, Clone)]
pub struct MigrationManager {
    database: Database,
    config: EngineConfig,
    directory: MigrationDirectory,
    executor: MigrationExecutor,
}

impl MigrationManager {
    #[must_use]
    pub fn new(database: Database, config: EngineConfig) -> Self {
        let directory = MigrationDirectory::new(config.migrations_dir.clone());
        let executor = MigrationExecutor::new(database.clone());
        Self {
            database,
            config,
            directory,
            executor,
        }
    }

    /// Connects to `url` and builds a manager for it.
    ///
    /// # Errors
    ///
    /// See [`Database::connect`].
    pub async fn connect(url: &str, config: EngineConfig) -> Result<Self> {
        Ok(Self::new(Database::connect(url).await?, config))
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.database
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn directory(&self) -> &MigrationDirectory {
        &self.directory
    }

    #[must_use]
    pub const fn provider(&self) -> ProviderKind {
        self.database.provider()
    }

    /// Parses and validates a declaration for this manager's provider.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Syntax`] or [`MigrateError::Validation`], and
    /// [`MigrateError::ProviderMismatch`] if the declaration's datasource names
    /// another provider than the connection.
    pub fn load_schema(&self, source: &str) -> Result<SchemaModel> {
        let (schema, errors) = parse(source);
        if !errors.is_empty() {
            return Err(MigrateError::Syntax(errors));
        }
        let provider = self.provider();
        if let Some(declared) = ProviderKind::detect(&schema, None) {
            if declared != provider {
                return Err(MigrateError::ProviderMismatch {
                    expected: declared,
                    found: provider,
                });
            }
        }
        Ok(build_schema_model(&schema, provider.provider())?)
    }

    /// Local migrations in timestamp order.
    ///
    /// # Errors
    ///
    /// See [`MigrationDirectory::list`].
    pub fn local_migrations(&self) -> Result<Vec<LocalMigration>> {
        self.directory.list()
    }

    /// Ledger entries, creating the ledger table on first use.
    ///
    /// # Errors
    ///
    /// Returns the driver error or [`MigrateError::InvalidLedgerEntry`].
    pub async fn applied_migrations(&self) -> Result<Vec<AppliedMigration>> {
        self.executor.init().await?;
        self.executor.ledger().applied().await
    }

    /// Local migrations not yet applied, oldest first.
    ///
    /// # Errors
    ///
    /// See [`MigrationManager::local_migrations`] and
    /// [`MigrationManager::applied_migrations`].
    pub async fn pending_migrations(&self) -> Result<Vec<LocalMigration>> {
        let local = self.local_migrations()?;
        let applied = self.applied_migrations().await?;
        Ok(diagnostic::pending(&local, &applied))
    }

    /// Applies one migration and records it. A migration that is already in
    /// the ledger is skipped.
    ///
    /// # Errors
    ///
    /// See [`MigrationExecutor::apply`].
    pub async fn apply_migration(&self, migration: &LocalMigration) -> Result<()> {
        self.check_lock()?;
        self.executor.init().await?;
        if self.executor.ledger().is_applied(&migration.name).await? {
            warn!(migration = %migration.name, "migration already applied, skipping");
            return Ok(());
        }
        self.executor.apply(migration).await
    }

    /// Both histories merged, ordered by name.
    ///
    /// # Errors
    ///
    /// See [`MigrationManager::pending_migrations`].
    pub async fn status(&self) -> Result<Vec<MigrationStatus>> {
        let local = self.local_migrations()?;
        let applied = self.applied_migrations().await?;
        Ok(diagnostic::status(&local, &applied))
    }

    /// Reads the live database structure.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Introspection`].
    pub async fn introspect(&self) -> Result<SchemaModel> {
        Ok(introspect(&self.database).await?)
    }

    /// Decides what a development run should do for `desired`.
    ///
    /// # Errors
    ///
    /// Returns directory, ledger and introspection errors. Drift is not an
    /// error here; it is reported as [`DevAction::Reset`].
    pub async fn diagnose(&self, desired: &SchemaModel) -> Result<DevAction> {
        self.check_lock()?;
        let local = self.local_migrations()?;
        let applied = self.applied_migrations().await?;

        if let Some(reason) = diagnostic::history_drift(&local, &applied) {
            info!(%reason, "history drift detected");
            return Ok(DevAction::Reset { reason });
        }

        let applied_local: Vec<LocalMigration> = local
            .iter()
            .filter(|m| applied.iter().any(|a| a.name == m.name))
            .cloned()
            .collect();
        if let Some(reason) = self.structural_drift(&applied_local).await? {
            info!("schema drift detected");
            return Ok(DevAction::Reset { reason });
        }

        let pending = diagnostic::pending(&local, &applied);
        if !pending.is_empty() {
            return Ok(DevAction::Apply {
                pending: pending.into_iter().map(|m| m.name).collect(),
            });
        }

        let changes = self.diff_live(desired).await?;
        if changes.is_empty() {
            Ok(DevAction::NoChanges)
        } else {
            Ok(DevAction::Create { changes })
        }
    }

    /// Applies pending migrations, then creates and applies a migration named
    /// `name` for whatever the declaration still adds. Never resets.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Drift`] where [`diagnose`](Self::diagnose) would
    /// reset, and [`MigrateError::DestructiveChange`] if the new migration
    /// loses data and `accept_data_loss` is not set. No file is written in
    /// either case. A new migration that fails to apply is deleted again.
    pub async fn dev(&self, desired: &SchemaModel, name: &str) -> Result<DevOutcome> {
        let mut outcome = DevOutcome::default();
        let changes = match self.diagnose(desired).await? {
            DevAction::Reset { reason } => return Err(MigrateError::Drift(reason)),
            DevAction::NoChanges => {
                info!("database is in sync with the declaration");
                return Ok(outcome);
            }
            DevAction::Create { changes } => changes,
            DevAction::Apply { .. } => {
                outcome.applied = self.apply_pending().await?;
                self.diff_live(desired).await?
            }
        };
        if changes.is_empty() {
            return Ok(outcome);
        }

        self.ensure_accepted(&changes)?;
        let migration = self.write_migration(name, &changes)?;
        if let Err(e) = self.executor.apply(&migration).await {
            warn!(migration = %migration.name, "migration failed to apply; removing it");
            self.directory.remove(&migration)?;
            return Err(e);
        }
        outcome.created = Some(migration.name);
        Ok(outcome)
    }

    /// Writes a migration from the replayed history to `desired` without
    /// applying it. Returns `None` when there is nothing to write.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::ShadowDatabaseRequired`] on a server provider
    /// without a shadow database when the live database is not known to match
    /// the history.
    pub async fn create_migration(
        &self,
        desired: &SchemaModel,
        name: &str,
    ) -> Result<Option<LocalMigration>> {
        self.check_lock()?;
        let local = self.local_migrations()?;
        let baseline = match self.open_shadow().await? {
            Some(shadow) => {
                let replayed = replay(&shadow, &local).await;
                shadow.close().await;
                replayed?
            }
            None => {
                let applied = self.applied_migrations().await?;
                if diagnostic::history_drift(&local, &applied).is_some()
                    || !diagnostic::pending(&local, &applied).is_empty()
                {
                    return Err(MigrateError::ShadowDatabaseRequired {
                        operation: "create_migration",
                        provider: self.provider(),
                    });
                }
                self.introspect().await?
            }
        };

        let provider = self.provider().provider();
        let changes = compare_with(desired, &baseline, provider, &self.config.diff_options())?;
        if changes.is_empty() {
            info!("no changes; no migration written");
            return Ok(None);
        }
        let destructive = changes.destructive_changes(provider);
        if !destructive.is_empty() {
            warn!(
                count = destructive.len(),
                "new migration contains changes that can lose data"
            );
        }
        self.write_migration(name, &changes).map(Some)
    }

    /// Applies every pending migration. Returns the applied names.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Drift`] if the ledger and local history
    /// disagree; nothing is applied then.
    pub async fn deploy(&self) -> Result<Vec<String>> {
        self.check_lock()?;
        let local = self.local_migrations()?;
        let applied = self.applied_migrations().await?;
        if let Some(reason) = diagnostic::history_drift(&local, &applied) {
            return Err(MigrateError::Drift(reason));
        }
        self.apply_pending().await
    }

    /// Applies the difference between the database and `desired` directly,
    /// without writing a migration or touching the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::DestructiveChange`] if the change loses data
    /// and `accept_data_loss` is not set.
    pub async fn push(&self, desired: &SchemaModel) -> Result<ChangeSet> {
        let changes = self.diff_live(desired).await?;
        if changes.is_empty() {
            info!("database is in sync with the declaration");
            return Ok(changes);
        }
        self.ensure_accepted(&changes)?;
        let sql = generate(&changes, self.provider().provider())?;
        self.executor.run_script("push", &sql).await?;
        info!("pushed declaration to the database");
        Ok(changes)
    }

    /// Drops every table, ledger included, and applies the whole local
    /// history. Returns the applied names.
    ///
    /// # Errors
    ///
    /// Returns the first failing drop or migration.
    pub async fn reset(&self) -> Result<Vec<String>> {
        self.check_lock()?;
        let local = self.local_migrations()?;
        warn!(provider = %self.provider(), "resetting database");
        drop_all_tables(&self.database).await?;
        self.executor.init().await?;
        let mut applied = Vec::with_capacity(local.len());
        for migration in &local {
            self.executor.apply(migration).await?;
            applied.push(migration.name.clone());
        }
        Ok(applied)
    }

    /// SQL that would move the live database to `desired`. Empty when they
    /// already match.
    ///
    /// # Errors
    ///
    /// Returns introspection, diff and generation errors.
    pub async fn diff_sql(&self, desired: &SchemaModel) -> Result<String> {
        let changes = self.diff_live(desired).await?;
        Ok(generate(&changes, self.provider().provider())?)
    }

    /// Records a local migration as applied without running it.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MigrationNotFound`] if there is no such local
    /// migration and [`MigrateError::InvalidLedgerEntry`] if it is already
    /// recorded.
    pub async fn mark_applied(&self, name: &str) -> Result<()> {
        let migration = self.directory.get(name)?;
        self.executor.init().await?;
        let ledger = self.executor.ledger();
        if ledger.is_applied(name).await? {
            return Err(MigrateError::InvalidLedgerEntry {
                migration: name.to_string(),
                message: "already recorded as applied".to_string(),
            });
        }
        ledger.record_applied(name, &migration.checksum).await?;
        info!(migration = %name, "marked as applied");
        Ok(())
    }

    /// Removes a migration's ledger entry so it is pending again.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MigrationNotFound`] if it has no entry.
    pub async fn mark_rolled_back(&self, name: &str) -> Result<()> {
        self.executor.init().await?;
        self.executor.ledger().remove(name).await?;
        info!(migration = %name, "marked as rolled back");
        Ok(())
    }

    /// Every reason the database cannot be reconciled with the history, the
    /// structural check included.
    ///
    /// # Errors
    ///
    /// Returns directory, ledger and shadow database errors.
    pub async fn check_drift(&self) -> Result<Option<DriftReason>> {
        let local = self.local_migrations()?;
        let applied = self.applied_migrations().await?;
        if let Some(reason) = diagnostic::history_drift(&local, &applied) {
            return Ok(Some(reason));
        }
        let applied_local: Vec<LocalMigration> = local
            .into_iter()
            .filter(|m| applied.iter().any(|a| a.name == m.name))
            .collect();
        self.structural_drift(&applied_local).await
    }

    fn check_lock(&self) -> Result<()> {
        match self.directory.locked_provider()? {
            Some(expected) if expected != self.provider() => Err(MigrateError::ProviderMismatch {
                expected,
                found: self.provider(),
            }),
            _ => Ok(()),
        }
    }

    fn ensure_accepted(&self, changes: &ChangeSet) -> Result<()> {
        let destructive = changes.destructive_changes(self.provider().provider());
        if destructive.is_empty() {
            return Ok(());
        }
        if self.config.accept_data_loss {
            warn!(count = destructive.len(), "applying changes that can lose data");
            return Ok(());
        }
        Err(MigrateError::DestructiveChange(destructive))
    }

    async fn diff_live(&self, desired: &SchemaModel) -> Result<ChangeSet> {
        let actual = self.introspect().await?;
        let changes = compare_with(
            desired,
            &actual,
            self.provider().provider(),
            &self.config.diff_options(),
        )?;
        debug!(empty = changes.is_empty(), "compared declaration with database");
        Ok(changes)
    }

    fn write_migration(&self, name: &str, changes: &ChangeSet) -> Result<LocalMigration> {
        let sql = generate(changes, self.provider().provider())?;
        self.directory.lock(self.provider())?;
        let migration = self.directory.create(name, &sql, Utc::now())?;
        info!(migration = %migration.name, "created migration");
        Ok(migration)
    }

    async fn apply_pending(&self) -> Result<Vec<String>> {
        let pending = self.pending_migrations().await?;
        if pending.is_empty() {
            info!("no pending migrations");
        }
        let mut applied = Vec::with_capacity(pending.len());
        for migration in &pending {
            self.executor.apply(migration).await?;
            applied.push(migration.name.clone());
        }
        Ok(applied)
    }

    /// Fresh shadow database, or `None` on a server provider without one.
    async fn open_shadow(&self) -> Result<Option<Database>> {
        let provider = self.provider();
        let shadow = match (&self.config.shadow_database_url, provider) {
            (_, ProviderKind::Sqlite) => Database::sqlite_memory().await?,
            (Some(url), _) => Database::connect_as(url, provider).await?,
            (None, _) => return Ok(None),
        };
        drop_all_tables(&shadow).await?;
        Ok(Some(shadow))
    }

    async fn structural_drift(&self, applied: &[LocalMigration]) -> Result<Option<DriftReason>> {
        let Some(shadow) = self.open_shadow().await? else {
            warn!(
                provider = %self.provider(),
                "no shadow database configured; skipping schema drift check"
            );
            return Ok(None);
        };
        let expected = replay(&shadow, applied).await;
        shadow.close().await;
        let expected = expected?;

        let actual = self.introspect().await?;
        let changes = compare_with(
            &expected,
            &actual,
            self.provider().provider(),
            &self.config.diff_options(),
        )?;
        Ok((!changes.is_empty()).then(|| DriftReason::SchemaDrift {
            summary: changes.to_string(),
        }))
    }
}

/// Runs `migrations` against `shadow` and reads back the result.
async fn replay(shadow: &Database, migrations: &[LocalMigration]) -> Result<SchemaModel> {
    let executor = MigrationExecutor::new(shadow.clone());
    for migration in migrations {
        debug!(migration = %migration.name, "replaying into shadow database");
        executor.run_script(&migration.name, &migration.sql).await?;
    }
    Ok(introspect(shadow).await?)
}

async fn drop_all_tables(database: &Database) -> Result<()> {
    let tables = all_table_names(database).await?;
    if tables.is_empty() {
        return Ok(());
    }
    let kind = database.provider();
    let provider = kind.provider();
    let drops = tables.iter().map(|table| match kind {
        ProviderKind::Postgres => {
            format!("DROP TABLE IF EXISTS {} CASCADE", provider.quote_identifier(table))
        }
        ProviderKind::MySql | ProviderKind::Sqlite => {
            format!("DROP TABLE IF EXISTS {}", provider.quote_identifier(table))
        }
    });
    let statements: Vec<String> = if kind == ProviderKind::MySql {
        std::iter::once("SET FOREIGN_KEY_CHECKS = 0".to_string())
            .chain(drops)
            .chain(std::iter::once("SET FOREIGN_KEY_CHECKS = 1".to_string()))
            .collect()
    } else {
        drops.collect()
    };
    for statement in &statements {
        debug!(sql = %statement, "dropping");
        database.execute(statement).await?;
    }
    Ok(())
}
