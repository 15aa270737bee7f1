//! Local migration history on disk.
//!
//! ```text
//! migrations/
//! ├── migration_lock.toml
//! ├── 20240101000000_init/
//! │   └── migration.sql
//! └── 20240102093000_add_posts/
//!     └── migration.sql
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use oxide_schema_core::ProviderKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{MigrateError, Result};

/// Script file inside each migration directory.
pub const MIGRATION_FILE: &str = "migration.sql";

/// Provider lock file at the root of the migrations directory.
pub const LOCK_FILE: &str = "migration_lock.toml";

static MIGRATION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{14}_").expect("valid migration name pattern"));

/// A migration directory read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMigration {
    /// Directory name, `<timestamp>_<name>`.
    pub name: String,
    /// Path of the migration directory.
    pub path: PathBuf,
    /// Contents of `migration.sql`.
    pub sql: String,
    /// Hex SHA-256 of `sql`.
    pub checksum: String,
}

impl LocalMigration {
    /// The 14-digit timestamp prefix, if the name carries one.
    #[must_use]
    pub fn timestamp(&self) -> Option<&str> {
        self.name
            .get(..14)
            .filter(|prefix| prefix.bytes().all(|b| b.is_ascii_digit()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockFile {
    provider: String,
}

/// The migrations root directory.
#[derive(Debug, Clone)]
pub struct MigrationDirectory {
    root: PathBuf,
}

impl MigrationDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists migrations in timestamp order. A missing root is an empty
    /// history.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MigrationsDirUnreadable`] if the root cannot be
    /// listed and [`MigrateError::MissingMigrationFile`] if a migration
    /// directory has no script.
    pub fn list(&self) -> Result<Vec<LocalMigration>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(MigrateError::MigrationsDirUnreadable {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut migrations = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| MigrateError::MigrationsDirUnreadable {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !path.is_dir() || !MIGRATION_NAME.is_match(name) {
                continue;
            }
            let name = name.to_string();
            let script = path.join(MIGRATION_FILE);
            let sql = match fs::read_to_string(&script) {
                Ok(sql) => sql,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(MigrateError::MissingMigrationFile(path));
                }
                Err(e) => return Err(e.into()),
            };
            migrations.push(LocalMigration {
                checksum: checksum(&sql),
                name,
                path,
                sql,
            });
        }
        migrations.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(root = %self.root.display(), count = migrations.len(), "read local migrations");
        Ok(migrations)
    }

    /// Finds a migration by directory name.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MigrationNotFound`] if there is none.
    pub fn get(&self, name: &str) -> Result<LocalMigration> {
        self.list()?
            .into_iter()
            .find(|m| m.name == name)
            .ok_or_else(|| MigrateError::MigrationNotFound(name.to_string()))
    }

    /// Writes a new migration directory named after `created_at` and
    /// `description`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MigrationExists`] if the directory exists.
    pub fn create(
        &self,
        description: &str,
        sql: &str,
        created_at: DateTime<Utc>,
    ) -> Result<LocalMigration> {
        let name = format!(
            "{}_{}",
            created_at.format("%Y%m%d%H%M%S"),
            normalize_migration_name(description)
        );
        let path = self.root.join(&name);
        if path.exists() {
            return Err(MigrateError::MigrationExists(path));
        }
        fs::create_dir_all(&path)?;
        fs::write(path.join(MIGRATION_FILE), sql)?;
        debug!(migration = %name, "wrote migration");
        Ok(LocalMigration {
            checksum: checksum(sql),
            name,
            path,
            sql: sql.to_string(),
        })
    }

    /// Deletes a migration directory written by [`create`](Self::create).
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Io`] if the directory cannot be removed.
    pub fn remove(&self, migration: &LocalMigration) -> Result<()> {
        fs::remove_dir_all(&migration.path)?;
        debug!(migration = %migration.name, "removed migration");
        Ok(())
    }

    /// Provider recorded in the lock file, if the file exists.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::LockFile`] if the file cannot be parsed.
    pub fn locked_provider(&self) -> Result<Option<ProviderKind>> {
        let path = self.root.join(LOCK_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let lock: LockFile = toml::from_str(&text).map_err(|e| MigrateError::LockFile {
            path: path.clone(),
            message: e.to_string(),
        })?;
        ProviderKind::from_name(&lock.provider)
            .map(Some)
            .ok_or_else(|| MigrateError::LockFile {
                path,
                message: format!("unknown provider `{}`", lock.provider),
            })
    }

    /// Checks the lock file against `provider`, writing it when absent.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::ProviderMismatch`] if the lock names another
    /// provider.
    pub fn lock(&self, provider: ProviderKind) -> Result<()> {
        match self.locked_provider()? {
            Some(expected) if expected != provider => Err(MigrateError::ProviderMismatch {
                expected,
                found: provider,
            }),
            Some(_) => Ok(()),
            None => {
                fs::create_dir_all(&self.root)?;
                let lock = LockFile {
                    provider: provider.to_string(),
                };
                let body = toml::to_string(&lock).map_err(|e| MigrateError::LockFile {
                    path: self.root.join(LOCK_FILE),
                    message: e.to_string(),
                })?;
                let text = format!(
                    "# Written by oxide-schema. Commit this file with your migrations.\n{body}"
                );
                fs::write(self.root.join(LOCK_FILE), text)?;
                Ok(())
            }
        }
    }
}

/// Directory-name form of a migration description: lowercase ASCII
/// alphanumerics separated by single underscores.
#[must_use]
pub fn normalize_migration_name(description: &str) -> String {
    let mut name = String::with_capacity(description.len());
    for c in description.trim().chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
        } else if !name.is_empty() && !name.ends_with('_') {
            name.push('_');
        }
    }
    let name = name.trim_end_matches('_');
    if name.is_empty() {
        "migration".to_string()
    } else {
        name.to_string()
    }
}

/// Hex SHA-256 of a migration script.
#[must_use]
pub fn checksum(sql: &str) -> String {
    format!("{:x}", Sha256::digest(sql.as_bytes()))
}
