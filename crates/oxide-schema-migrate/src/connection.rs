//! Database connections.
//!
//! Every command holds one pool with a single connection. The pool type
//! depends on the provider, so code that works the same on all three uses
//! [`with_pool!`](crate::with_pool) to run one body against whichever pool is
//! open.

use std::str::FromStr;
use std::time::Duration;

use oxide_schema_core::ProviderKind;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::error::{MigrateError, Result};

/// Runs `$body` with `$pool` bound to the open pool, whatever its driver.
#[macro_export]
macro_rules! with_pool {
    ($database:expr, $pool:ident => $body:expr) => {
        match $database {
            $crate::Database::Sqlite($pool) => $body,
            $crate::Database::Postgres($pool) => $body,
            $crate::Database::MySql($pool) => $body,
        }
    };
}

/// An open connection to one of the supported databases.
#[derive(Debug, Clone)]
pub enum Database {
    Sqlite(SqlitePool),
    Postgres(PgPool),
    MySql(MySqlPool),
}

impl Database {
    /// Connects to `url`, deriving the provider from its scheme.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Connectivity`] if the database cannot be
    /// reached and [`MigrateError::Database`] if the URL has an unknown scheme.
    pub async fn connect(url: &str) -> Result<Self> {
        let provider = ProviderKind::from_url(url).ok_or_else(|| {
            MigrateError::Database(sqlx::Error::Configuration(
                format!("unrecognised connection string scheme in `{}`", redact(url)).into(),
            ))
        })?;
        Self::connect_as(url, provider).await
    }

    /// Connects to `url` as `provider`.
    ///
    /// # Errors
    ///
    /// See [`Database::connect`].
    pub async fn connect_as(url: &str, provider: ProviderKind) -> Result<Self> {
        debug!(provider = %provider, url = %redact(url), "connecting");
        let connectivity = |source| MigrateError::Connectivity { provider, source };
        let database = match provider {
            ProviderKind::Sqlite => {
                let options = sqlite_options(url).map_err(connectivity)?;
                let pool = SqlitePoolOptions::new()
                    .max_connections(1)
                    // An in-memory database lives as long as its connection.
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(options)
                    .await
                    .map_err(connectivity)?;
                Self::Sqlite(pool)
            }
            ProviderKind::Postgres => Self::Postgres(
                PgPoolOptions::new()
                    .max_connections(1)
                    .acquire_timeout(Duration::from_secs(30))
                    .connect(url)
                    .await
                    .map_err(connectivity)?,
            ),
            ProviderKind::MySql => Self::MySql(
                MySqlPoolOptions::new()
                    .max_connections(1)
                    .acquire_timeout(Duration::from_secs(30))
                    .connect(url)
                    .await
                    .map_err(connectivity)?,
            ),
        };
        Ok(database)
    }

    /// Opens a fresh in-memory SQLite database.
    ///
    /// # Errors
    ///
    /// See [`Database::connect`].
    pub async fn sqlite_memory() -> Result<Self> {
        Self::connect_as("sqlite::memory:", ProviderKind::Sqlite).await
    }

    /// Provider of this connection.
    #[must_use]
    pub const fn provider(&self) -> ProviderKind {
        match self {
            Self::Sqlite(_) => ProviderKind::Sqlite,
            Self::Postgres(_) => ProviderKind::Postgres,
            Self::MySql(_) => ProviderKind::MySql,
        }
    }

    /// Executes one statement outside any transaction.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn execute(&self, sql: &str) -> std::result::Result<(), sqlx::Error> {
        with_pool!(self, pool => {
            sqlx::raw_sql(sql).execute(pool).await?;
        });
        Ok(())
    }

    /// Closes the pool.
    pub async fn close(&self) {
        with_pool!(self, pool => pool.close().await);
    }
}

/// SQLite options for `sqlite:`, `sqlite://` and `file:` URLs. Foreign key
/// enforcement stays off on migration connections: table rebuilds drop
/// referenced tables, and enforcement would run their delete actions.
fn sqlite_options(url: &str) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    let options = match url.strip_prefix("file:") {
        Some(path) => {
            let path = path.split('?').next().unwrap_or(path);
            SqliteConnectOptions::new().filename(path)
        }
        None => SqliteConnectOptions::from_str(url)?,
    };
    Ok(options.create_if_missing(true).foreign_keys(false))
}

/// Connection string with any password replaced.
pub(crate) fn redact(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.split_once('@') {
        Some((credentials, host)) => match credentials.split_once(':') {
            Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
            None => url.to_string(),
        },
        None => url.to_string(),
    }
}
