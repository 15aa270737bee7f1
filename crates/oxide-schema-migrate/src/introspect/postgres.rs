//! PostgreSQL catalog reader (`pg_catalog`, current schema only).

use oxide_schema_core::provider::PostgresProvider;
use oxide_schema_core::{
    ColumnInfo, DefaultValue, IndexColumn, Provider, ReferentialAction, SchemaModel, TableInfo,
};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use super::{
    attach_indexes, group_foreign_keys, group_indexes, is_internal_table,
    parse_index_expression, ForeignKeyRow, IndexRow, TableFailures,
};
use crate::error::IntrospectionError;

pub(super) async fn introspect(pool: &PgPool) -> Result<SchemaModel, IntrospectionError> {
    let provider = PostgresProvider;
    let tables: Vec<String> = sqlx::query_scalar(provider.introspection_queries().tables)
        .fetch_all(pool)
        .await
        .map_err(|source| IntrospectionError::Failed {
            what: "tables",
            source,
        })?;

    let mut schema = SchemaModel::new();
    let mut failures = TableFailures::default();
    for name in tables {
        if is_internal_table(&name) {
            continue;
        }
        match read_table(pool, &provider, &name).await {
            Ok(table) => schema.add_table(table),
            Err(e) => failures.record(&name, e),
        }
    }
    failures.finish()?;
    Ok(schema)
}

async fn read_table(
    pool: &PgPool,
    provider: &PostgresProvider,
    name: &str,
) -> Result<TableInfo, sqlx::Error> {
    let queries = provider.introspection_queries();
    let mut table = TableInfo::new(name);

    for row in sqlx::query(queries.columns).bind(name).fetch_all(pool).await? {
        table.columns.push(column(provider, &row)?);
    }

    let mut index_rows = Vec::new();
    for row in sqlx::query(queries.indexes).bind(name).fetch_all(pool).await? {
        if row.try_get::<bool, _>("is_primary")? {
            continue;
        }
        let index_name: String = row.try_get("index_name")?;
        let column = match row.try_get::<Option<String>, _>("column_name")? {
            Some(column) => IndexColumn::new(column),
            None => {
                let expression: String = row.try_get("expression")?;
                match parse_index_expression(&expression) {
                    Some(column) => column,
                    None => {
                        tracing::warn!(
                            index = %index_name,
                            expression = %expression,
                            "skipping index entry with an unsupported expression"
                        );
                        continue;
                    }
                }
            }
        };
        let column = if row.try_get::<bool, _>("is_descending")? {
            column.descending()
        } else {
            column
        };
        index_rows.push(IndexRow {
            name: index_name,
            unique: row.try_get("is_unique")?,
            column,
        });
    }

    let mut fk_rows = Vec::new();
    for row in sqlx::query(queries.foreign_keys).bind(name).fetch_all(pool).await? {
        fk_rows.push(ForeignKeyRow {
            name: row.try_get("constraint_name")?,
            column: row.try_get("column_name")?,
            referenced_table: row.try_get("referenced_table")?,
            referenced_column: row.try_get("referenced_column")?,
            on_delete: action_code(&row.try_get::<String, _>("on_delete")?),
            on_update: action_code(&row.try_get::<String, _>("on_update")?),
        });
    }
    table.foreign_keys = group_foreign_keys(fk_rows);

    attach_indexes(&mut table, group_indexes(index_rows));
    Ok(table)
}

fn column(provider: &PostgresProvider, row: &PgRow) -> Result<ColumnInfo, sqlx::Error> {
    let name: String = row.try_get("column_name")?;
    let sql_type = provider.normalize_type(&row.try_get::<String, _>("data_type")?);
    let mut column = ColumnInfo::new(name, sql_type);
    column.nullable = row.try_get("is_nullable")?;
    if row.try_get::<bool, _>("is_primary")? {
        column = column.primary_key();
    }

    let identity: String = row.try_get("identity")?;
    column.default = if identity.is_empty() {
        row.try_get::<Option<String>, _>("column_default")?
            .and_then(|raw| provider.parse_default(&raw, &column.sql_type))
    } else {
        Some(DefaultValue::Autoincrement)
    };
    Ok(column)
}

/// Decodes `pg_constraint.confdeltype` / `confupdtype`.
fn action_code(code: &str) -> ReferentialAction {
    match code {
        "c" => ReferentialAction::Cascade,
        "r" => ReferentialAction::Restrict,
        "n" => ReferentialAction::SetNull,
        "d" => ReferentialAction::SetDefault,
        _ => ReferentialAction::NoAction,
    }
}
