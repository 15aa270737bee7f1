//! Error types for introspection, migration history and apply workflows.

use std::fmt;
use std::path::PathBuf;

use oxide_schema_core::{
    DestructiveChange, DiffError, GenerateError, ProviderKind, SchemaError, SyntaxError,
    ValidationError,
};

/// Errors that can occur while talking to the database or the migration
/// directory.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// The declaration has syntax errors.
    #[error("{} syntax error(s) in the schema declaration:\n{}", .0.len(), bullet_list(.0))]
    Syntax(Vec<SyntaxError>),

    /// The declaration is semantically invalid.
    #[error("{} validation error(s) in the schema declaration:\n{}", .0.len(), bullet_list(.0))]
    Validation(Vec<ValidationError>),

    /// The database cannot be reached.
    #[error("cannot connect to the {provider} database: {source}")]
    Connectivity {
        /// Provider derived from the connection string.
        provider: ProviderKind,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// The catalog could not be read completely.
    #[error(transparent)]
    Introspection(#[from] IntrospectionError),

    /// The change would lose data and was not acknowledged.
    #[error(
        "the change would lose data and `accept_data_loss` is not set:\n{}",
        bullet_list(.0)
    )]
    DestructiveChange(Vec<DestructiveChange>),

    /// A statement of a migration failed. The ledger was not updated.
    #[error("migration `{migration}` failed: {source}\n  statement: {statement}")]
    Apply {
        /// Migration name.
        migration: String,
        /// Statement that failed.
        statement: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// A migration ran but left foreign keys pointing at missing rows.
    #[error("migration `{migration}` violates foreign keys in table(s): {}", .tables.join(", "))]
    ForeignKeyViolation {
        /// Migration name.
        migration: String,
        /// Tables holding violating rows.
        tables: Vec<String>,
    },

    /// Ledger, local history and database disagree.
    #[error("the database has drifted from the migration history: {0}")]
    Drift(DriftReason),

    /// Database error outside a migration script.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Error reading or writing migration files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The migrations root exists but cannot be listed.
    #[error("migrations directory `{}` cannot be read: {source}", .path.display())]
    MigrationsDirUnreadable {
        /// Root directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A migration directory has no `migration.sql`.
    #[error("migration directory `{}` has no migration.sql", .0.display())]
    MissingMigrationFile(PathBuf),

    /// A migration directory with this name already exists.
    #[error("migration already exists: {}", .0.display())]
    MigrationExists(PathBuf),

    /// No migration with this name is known.
    #[error("migration not found: {0}")]
    MigrationNotFound(String),

    /// The lock file or the declaration names another provider.
    #[error("migrations were created for {expected}, but the database is {found}")]
    ProviderMismatch {
        /// Provider recorded in the lock file.
        expected: ProviderKind,
        /// Provider of the current connection.
        found: ProviderKind,
    },

    /// `migration_lock.toml` cannot be parsed.
    #[error("invalid lock file `{}`: {message}", .path.display())]
    LockFile {
        /// Lock file path.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A ledger row holds a value that cannot be read back.
    #[error("invalid ledger entry for `{migration}`: {message}")]
    InvalidLedgerEntry {
        /// Migration name of the row.
        migration: String,
        /// What is wrong with it.
        message: String,
    },

    /// The operation needs a replay of the history but no shadow database is
    /// configured.
    #[error("{operation} needs a shadow database on {provider}; set `shadow_database_url`")]
    ShadowDatabaseRequired {
        /// Operation that needed it.
        operation: &'static str,
        /// Provider of the main connection.
        provider: ProviderKind,
    },

    /// Diffing failed.
    #[error(transparent)]
    Diff(#[from] DiffError),

    /// SQL generation failed.
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

impl From<SchemaError> for MigrateError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::Syntax(errors) => Self::Syntax(errors),
            SchemaError::Validation(errors) => Self::Validation(errors),
        }
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

/// Failure to read the database catalog.
#[derive(Debug, thiserror::Error)]
pub enum IntrospectionError {
    /// The catalog could not be queried at all.
    #[error("introspection failed while reading {what}: {source}")]
    Failed {
        /// Catalog object being read.
        what: &'static str,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// Some tables could be read, others could not. The partial result is
    /// discarded.
    #[error("introspection is incomplete; could not read table(s) {}: {source}", .tables.join(", "))]
    Partial {
        /// Tables whose catalog queries failed.
        tables: Vec<String>,
        /// First driver error.
        #[source]
        source: sqlx::Error,
    },
}

/// Why the database cannot be reconciled with the migration history.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriftReason {
    /// A ledger entry has no local migration directory.
    MissingLocally { migration: String },
    /// A migration was edited after it was applied.
    ChecksumMismatch { migration: String },
    /// A local migration sorts before the newest applied one but was never
    /// applied.
    OutOfOrder {
        migration: String,
        latest_applied: String,
    },
    /// The database structure differs from a replay of the applied
    /// migrations.
    SchemaDrift { summary: String },
}

impl fmt::Display for DriftReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingLocally { migration } => write!(
                f,
                "migration `{migration}` is recorded as applied but missing from the migrations directory"
            ),
            Self::ChecksumMismatch { migration } => {
                write!(f, "migration `{migration}` was modified after it was applied")
            }
            Self::OutOfOrder {
                migration,
                latest_applied,
            } => write!(
                f,
                "migration `{migration}` is older than the applied migration `{latest_applied}` but was never applied"
            ),
            Self::SchemaDrift { summary } => write!(
                f,
                "the database schema is not what the applied migrations produce:\n{summary}"
            ),
        }
    }
}

fn bullet_list<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}
