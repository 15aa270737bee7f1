//! Database side of the oxide-schema engine.
//!
//! `oxide-schema-migrate` connects to PostgreSQL, MySQL or SQLite and
//! provides:
//!
//! - **Introspection** - reads the live catalog into the same
//!   [`SchemaModel`](oxide_schema_core::SchemaModel) a declaration produces
//! - **Migration directory** - timestamped `migration.sql` scripts on disk
//! - **Ledger** - the `_oxide_schema_migrations` table recording applied
//!   migrations and their checksums
//! - **Executor** - runs scripts, transactionally where the provider allows
//! - **Manager** - the development diagnostic and the dev, create-only,
//!   deploy, push and reset workflows
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_schema_migrate::{DevAction, EngineConfig, MigrationManager};
//!
//! let config = EngineConfig::default().with_migrations_dir("prisma/migrations");
//! let manager = MigrationManager::connect("file:./dev.db", config).await?;
//! let desired = manager.load_schema(&std::fs::read_to_string("schema.prisma")?)?;
//!
//! match manager.diagnose(&desired).await? {
//!     DevAction::Reset { reason } => eprintln!("reset required: {reason}"),
//!     DevAction::NoChanges => {}
//!     _ => {
//!         let outcome = manager.dev(&desired, "init").await?;
//!         println!("created {:?}", outcome.created);
//!     }
//! }
//! ```
//!
//! The engine never writes to stdout; it logs through `tracing` and leaves
//! the subscriber to the caller.

pub mod config;
pub mod connection;
pub mod diagnostic;
pub mod directory;
pub mod error;
pub mod executor;
pub mod history;
pub mod introspect;
pub mod manager;

pub use config::EngineConfig;
pub use connection::Database;
pub use diagnostic::{DevAction, MigrationState, MigrationStatus};
pub use directory::{LocalMigration, MigrationDirectory};
pub use error::{DriftReason, IntrospectionError, MigrateError, Result};
pub use executor::MigrationExecutor;
pub use history::{AppliedMigration, MigrationLedger, LEDGER_TABLE};
pub use introspect::introspect;
pub use manager::{DevOutcome, MigrationManager};

/// Parses, validates and builds the desired-state model of a declaration.
///
/// # Errors
///
/// Returns [`MigrateError::Syntax`] or [`MigrateError::Validation`].
pub fn load_schema(
    source: &str,
    provider: oxide_schema_core::ProviderKind,
) -> Result<oxide_schema_core::SchemaModel> {
    Ok(oxide_schema_core::load_schema(source, provider)?)
}
