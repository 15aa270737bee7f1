//! Engine configuration.

use std::path::PathBuf;

use oxide_schema_core::DiffOptions;
use serde::Deserialize;

/// Settings for one engine run, passed explicitly to
/// [`MigrationManager`](crate::MigrationManager).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root directory holding one subdirectory per migration.
    pub migrations_dir: PathBuf,
    /// Allows changes that drop tables or columns or can fail on existing rows.
    pub accept_data_loss: bool,
    /// Scratch database used to replay the history on PostgreSQL and MySQL.
    /// SQLite always replays into an in-memory database.
    pub shadow_database_url: Option<String>,
    /// Overrides the provider's index column-order policy.
    pub index_order_significant: Option<bool>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            accept_data_loss: false,
            shadow_database_url: None,
            index_order_significant: None,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    #[must_use]
    pub const fn with_accept_data_loss(mut self, accept: bool) -> Self {
        self.accept_data_loss = accept;
        self
    }

    #[must_use]
    pub fn with_shadow_database_url(mut self, url: impl Into<String>) -> Self {
        self.shadow_database_url = Some(url.into());
        self
    }

    #[must_use]
    pub const fn with_index_order_significant(mut self, significant: bool) -> Self {
        self.index_order_significant = Some(significant);
        self
    }

    /// Diff settings derived from this configuration.
    #[must_use]
    pub const fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            index_order_significant: self.index_order_significant,
        }
    }
}
