//! Live database introspection.
//!
//! Each provider module reads its catalog with the queries its
//! [`Provider`](oxide_schema_core::Provider) declares and turns the rows into
//! the same canonical model the declaration produces: types go through
//! `normalize_type`, defaults through `parse_default`, and indexes through
//! [`TableInfo::push_index`] so single-column unique indexes fold the same way.
//!
//! A failed per-table query aborts the whole read; a partial model is never
//! returned.

mod mysql;
mod postgres;
mod sqlite;

use std::sync::LazyLock;

use oxide_schema_core::{
    ForeignKeyInfo, IndexColumn, IndexInfo, ReferentialAction, SchemaModel, TableInfo,
};
use regex::Regex;
use tracing::debug;

use crate::connection::Database;
use crate::error::IntrospectionError;
use crate::history::LEDGER_TABLE;

static INDEX_EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(\w+)\s*\(\s*\(?\s*[`"]?(\w+)[`"]?\s*\)?(?:::[\w ]+)?\s*\)\s*$"#)
        .expect("valid index expression pattern")
});

/// Reads the structure of every user table.
///
/// # Errors
///
/// Returns [`IntrospectionError::Failed`] if the table list cannot be read and
/// [`IntrospectionError::Partial`] if any table's definition cannot.
pub async fn introspect(database: &Database) -> Result<SchemaModel, IntrospectionError> {
    let schema = match database {
        Database::Sqlite(pool) => sqlite::introspect(pool).await?,
        Database::Postgres(pool) => postgres::introspect(pool).await?,
        Database::MySql(pool) => mysql::introspect(pool).await?,
    };
    debug!(
        provider = %database.provider(),
        tables = schema.tables.len(),
        "introspected database"
    );
    Ok(schema)
}

/// Every base table, including the ledger.
///
/// # Errors
///
/// Returns [`IntrospectionError::Failed`] if the catalog cannot be read.
pub async fn all_table_names(database: &Database) -> Result<Vec<String>, IntrospectionError> {
    let query = database.provider().provider().introspection_queries().tables;
    let names: Vec<String> = crate::with_pool!(database, pool => {
        sqlx::query_scalar(query)
            .fetch_all(pool)
            .await
            .map_err(|source| IntrospectionError::Failed { what: "tables", source })?
    });
    Ok(names)
}

/// Whether a table belongs to the engine rather than the user schema.
pub(crate) fn is_internal_table(name: &str) -> bool {
    name == LEDGER_TABLE
}

/// Collects per-table failures so that one bad table fails the whole read
/// with every offending name.
#[derive(Default)]
pub(crate) struct TableFailures {
    tables: Vec<String>,
    first: Option<sqlx::Error>,
}

impl TableFailures {
    pub fn record(&mut self, table: &str, error: sqlx::Error) {
        tracing::warn!(table = %table, error = %error, "cannot read table definition");
        self.tables.push(table.to_string());
        self.first.get_or_insert(error);
    }

    pub fn finish(self) -> Result<(), IntrospectionError> {
        match self.first {
            Some(source) => Err(IntrospectionError::Partial {
                tables: self.tables,
                source,
            }),
            None => Ok(()),
        }
    }
}

/// One catalog row of an index, in key order.
pub(crate) struct IndexRow {
    pub name: String,
    pub unique: bool,
    pub column: IndexColumn,
}

/// Groups consecutive rows of the same index.
pub(crate) fn group_indexes(rows: Vec<IndexRow>) -> Vec<IndexInfo> {
    let mut indexes: Vec<IndexInfo> = Vec::new();
    for row in rows {
        match indexes.last_mut() {
            Some(index) if index.name == row.name => index.columns.push(row.column),
            _ => indexes.push(IndexInfo {
                name: row.name,
                columns: vec![row.column],
                unique: row.unique,
            }),
        }
    }
    indexes
}

/// One catalog row of a foreign key, in key order.
pub(crate) struct ForeignKeyRow {
    pub name: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

/// Groups consecutive rows of the same constraint.
pub(crate) fn group_foreign_keys(rows: Vec<ForeignKeyRow>) -> Vec<ForeignKeyInfo> {
    let mut foreign_keys: Vec<ForeignKeyInfo> = Vec::new();
    for row in rows {
        match foreign_keys.last_mut() {
            Some(fk) if fk.name == row.name => {
                fk.columns.push(row.column);
                fk.referenced_columns.push(row.referenced_column);
            }
            _ => foreign_keys.push(ForeignKeyInfo {
                name: row.name,
                columns: vec![row.column],
                referenced_table: row.referenced_table,
                referenced_columns: vec![row.referenced_column],
                on_delete: row.on_delete,
                on_update: row.on_update,
            }),
        }
    }
    foreign_keys
}

/// Adds indexes after the columns and primary key are known.
pub(crate) fn attach_indexes(table: &mut TableInfo, indexes: Vec<IndexInfo>) {
    for index in indexes {
        table.push_index(index);
    }
}

/// Parses a single-column function index entry such as `lower(email)`,
/// `lower((email)::text)` or ``lower(`email`)``.
pub(crate) fn parse_index_expression(expression: &str) -> Option<IndexColumn> {
    let captures = INDEX_EXPRESSION.captures(expression)?;
    Some(IndexColumn::new(&captures[2]).wrapped(captures[1].to_ascii_lowercase()))
}
