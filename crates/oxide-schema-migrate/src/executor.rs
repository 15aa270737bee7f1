//! Migration executor.
//!
//! Runs migration scripts statement by statement. On providers with
//! transactional DDL a script is all-or-nothing; on MySQL a failure leaves the
//! statements before it applied. Either way the ledger row is only written
//! once the whole script has succeeded.

use oxide_schema_core::{split_statements, ProviderKind};
use sqlx::Row;
use tracing::{debug, info, warn};

use crate::connection::Database;
use crate::directory::LocalMigration;
use crate::error::{MigrateError, Result};
use crate::history::MigrationLedger;

/// Applies migration scripts to one database.
#[derive(Debug, Clone)]
pub struct MigrationExecutor {
    database: Database,
    ledger: MigrationLedger,
}

impl MigrationExecutor {
    #[must_use]
    pub fn new(database: Database) -> Self {
        let ledger = MigrationLedger::new(database.clone());
        Self { database, ledger }
    }

    /// Ensures the ledger table exists.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn init(&self) -> Result<()> {
        self.ledger.ensure_table().await
    }

    #[must_use]
    pub const fn ledger(&self) -> &MigrationLedger {
        &self.ledger
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.database
    }

    /// Runs `migration` and records it in the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Apply`] naming the failing statement, or
    /// [`MigrateError::ForeignKeyViolation`] if the script leaves dangling
    /// references. The ledger is untouched in both cases.
    pub async fn apply(&self, migration: &LocalMigration) -> Result<()> {
        info!(migration = %migration.name, "applying migration");
        self.run_script(&migration.name, &migration.sql).await?;
        self.ledger
            .record_applied(&migration.name, &migration.checksum)
            .await?;
        info!(migration = %migration.name, "migration applied");
        Ok(())
    }

    /// Runs a script without touching the ledger. `label` names the script in
    /// errors and logs.
    ///
    /// # Errors
    ///
    /// See [`MigrationExecutor::apply`].
    pub async fn run_script(&self, label: &str, sql: &str) -> Result<()> {
        let statements = split_statements(sql);
        if statements.is_empty() {
            debug!(migration = %label, "script has no statements");
            return Ok(());
        }
        if self.database.provider().provider().supports_transactional_ddl() {
            self.run_transactional(label, &statements).await
        } else {
            self.run_sequential(label, &statements).await
        }
    }

    async fn run_transactional(&self, label: &str, statements: &[String]) -> Result<()> {
        let check_foreign_keys = self.database.provider() == ProviderKind::Sqlite;
        let violations: Vec<String> = crate::with_pool!(&self.database, pool => {
            let mut tx = pool.begin().await?;
            for statement in statements {
                debug!(migration = %label, sql = %statement, "executing statement");
                if let Err(source) = sqlx::raw_sql(statement).execute(&mut *tx).await {
                    tx.rollback().await?;
                    return Err(apply_error(label, statement, source));
                }
            }

            let mut tables: Vec<String> = Vec::new();
            if check_foreign_keys {
                for row in sqlx::query("PRAGMA foreign_key_check").fetch_all(&mut *tx).await? {
                    let table: String = row.try_get(0)?;
                    if !tables.contains(&table) {
                        tables.push(table);
                    }
                }
            }
            if tables.is_empty() {
                tx.commit().await?;
            } else {
                tx.rollback().await?;
            }
            tables
        });

        if violations.is_empty() {
            Ok(())
        } else {
            Err(MigrateError::ForeignKeyViolation {
                migration: label.to_string(),
                tables: violations,
            })
        }
    }

    async fn run_sequential(&self, label: &str, statements: &[String]) -> Result<()> {
        for (done, statement) in statements.iter().enumerate() {
            debug!(migration = %label, sql = %statement, "executing statement");
            if let Err(source) = self.database.execute(statement).await {
                if done > 0 {
                    warn!(
                        migration = %label,
                        applied = done,
                        total = statements.len(),
                        "migration failed part-way; earlier statements remain applied"
                    );
                }
                return Err(apply_error(label, statement, source));
            }
        }
        Ok(())
    }
}

fn apply_error(label: &str, statement: &str, source: sqlx::Error) -> MigrateError {
    MigrateError::Apply {
        migration: label.to_string(),
        statement: statement.to_string(),
        source,
    }
}
