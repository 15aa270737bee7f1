//! Migration ledger.
//!
//! The `_oxide_schema_migrations` table inside the target database records
//! which migrations have been applied, with the checksum of their script at
//! the time.

use chrono::{DateTime, Utc};
use oxide_schema_core::{Provider, ProviderKind};

use crate::connection::Database;
use crate::error::{MigrateError, Result};

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "_oxide_schema_migrations";

/// A ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    /// Migration directory name.
    pub name: String,
    /// Hex SHA-256 of `migration.sql` when it was applied.
    pub checksum: String,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
}

/// Reads and writes the ledger.
#[derive(Debug, Clone)]
pub struct MigrationLedger {
    database: Database,
}

impl MigrationLedger {
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }

    fn provider(&self) -> &'static dyn Provider {
        self.database.provider().provider()
    }

    fn table(&self) -> String {
        self.provider().quote_identifier(LEDGER_TABLE)
    }

    /// Creates the ledger table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn ensure_table(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
             migration_name VARCHAR(255) NOT NULL PRIMARY KEY,\n    \
             checksum VARCHAR(64) NOT NULL,\n    \
             applied_at VARCHAR(64) NOT NULL\n)",
            self.table()
        );
        self.database.execute(&sql).await?;
        Ok(())
    }

    /// Records `name` as applied now.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn record_applied(&self, name: &str, checksum: &str) -> Result<()> {
        let provider = self.provider();
        let sql = format!(
            "INSERT INTO {} (migration_name, checksum, applied_at) VALUES ({}, {}, {})",
            self.table(),
            provider.bind_placeholder(1),
            provider.bind_placeholder(2),
            provider.bind_placeholder(3)
        );
        let applied_at = Utc::now().to_rfc3339();
        crate::with_pool!(&self.database, pool => {
            sqlx::query(&sql)
                .bind(name)
                .bind(checksum)
                .bind(&applied_at)
                .execute(pool)
                .await?;
        });
        Ok(())
    }

    /// Removes the ledger entry for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MigrationNotFound`] if there is no entry.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE migration_name = {}",
            self.table(),
            self.provider().bind_placeholder(1)
        );
        let affected = crate::with_pool!(&self.database, pool => {
            sqlx::query(&sql).bind(name).execute(pool).await?.rows_affected()
        });
        if affected == 0 {
            return Err(MigrateError::MigrationNotFound(name.to_string()));
        }
        Ok(())
    }

    /// Whether `name` has a ledger entry.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn is_applied(&self, name: &str) -> Result<bool> {
        Ok(self.applied().await?.iter().any(|m| m.name == name))
    }

    /// All ledger entries, oldest migration first.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::InvalidLedgerEntry`] if a timestamp cannot be
    /// parsed.
    pub async fn applied(&self) -> Result<Vec<AppliedMigration>> {
        let sql = format!(
            "SELECT migration_name, checksum, applied_at FROM {} ORDER BY migration_name",
            self.table()
        );
        let rows: Vec<(String, String, String)> = crate::with_pool!(&self.database, pool => {
            sqlx::query_as(&sql).fetch_all(pool).await?
        });

        rows.into_iter()
            .map(|(name, checksum, applied_at)| {
                let applied_at = parse_timestamp(&applied_at).ok_or_else(|| {
                    MigrateError::InvalidLedgerEntry {
                        migration: name.clone(),
                        message: format!("unreadable applied_at `{applied_at}`"),
                    }
                })?;
                Ok(AppliedMigration {
                    name,
                    checksum,
                    applied_at,
                })
            })
            .collect()
    }

    /// Provider of the ledger's database.
    #[must_use]
    pub fn provider_kind(&self) -> ProviderKind {
        self.database.provider()
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ledger() -> MigrationLedger {
        let database = Database::sqlite_memory()
            .await
            .expect("Failed to open in-memory SQLite database");
        let ledger = MigrationLedger::new(database);
        ledger.ensure_table().await.unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let ledger = ledger().await;
        ledger.ensure_table().await.unwrap();
        assert!(ledger.applied().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_and_list() {
        let ledger = ledger().await;
        ledger
            .record_applied("20240201000000_posts", "bbb")
            .await
            .unwrap();
        ledger
            .record_applied("20240101000000_init", "aaa")
            .await
            .unwrap();

        let applied = ledger.applied().await.unwrap();
        let names: Vec<&str> = applied.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["20240101000000_init", "20240201000000_posts"]);
        assert_eq!(applied[0].checksum, "aaa");
        assert!(ledger.is_applied("20240101000000_init").await.unwrap());
        assert!(!ledger.is_applied("20240301000000_other").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove() {
        let ledger = ledger().await;
        ledger.record_applied("20240101000000_init", "aaa").await.unwrap();
        ledger.remove("20240101000000_init").await.unwrap();
        assert!(ledger.applied().await.unwrap().is_empty());

        let err = ledger.remove("20240101000000_init").await.unwrap_err();
        assert!(matches!(err, MigrateError::MigrationNotFound(name) if name == "20240101000000_init"));
    }

    #[tokio::test]
    async fn test_duplicate_entry_is_rejected() {
        let ledger = ledger().await;
        ledger.record_applied("20240101000000_init", "aaa").await.unwrap();
        assert!(ledger.record_applied("20240101000000_init", "aaa").await.is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-01-01T10:00:00+00:00").is_some());
        assert!(parse_timestamp("2024-01-01 10:00:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
