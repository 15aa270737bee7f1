//! MySQL catalog reader (`information_schema`, current database only).

use oxide_schema_core::provider::MySqlProvider;
use oxide_schema_core::{
    ColumnInfo, DefaultValue, IndexColumn, Provider, ReferentialAction, SchemaModel, TableInfo,
};
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::Row;

use super::{
    attach_indexes, group_foreign_keys, group_indexes, is_internal_table, ForeignKeyRow,
    IndexRow, TableFailures,
};
use crate::error::IntrospectionError;

pub(super) async fn introspect(pool: &MySqlPool) -> Result<SchemaModel, IntrospectionError> {
    let provider = MySqlProvider;
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
    pool: &MySqlPool,
    provider: &MySqlProvider,
    name: &str,
) -> Result<TableInfo, sqlx::Error> {
    let queries = provider.introspection_queries();
    let mut table = TableInfo::new(name);

    for row in sqlx::query(queries.columns).bind(name).fetch_all(pool).await? {
        table.columns.push(column(provider, &row)?);
    }

    let mut fk_rows = Vec::new();
    for row in sqlx::query(queries.foreign_keys).bind(name).fetch_all(pool).await? {
        fk_rows.push(ForeignKeyRow {
            name: row.try_get("constraint_name")?,
            column: row.try_get("column_name")?,
            referenced_table: row.try_get("referenced_table")?,
            referenced_column: row.try_get("referenced_column")?,
            on_delete: action(&row.try_get::<String, _>("on_delete")?),
            on_update: action(&row.try_get::<String, _>("on_update")?),
        });
    }
    table.foreign_keys = group_foreign_keys(fk_rows);

    let mut index_rows = Vec::new();
    for row in sqlx::query(queries.indexes).bind(name).fetch_all(pool).await? {
        let index_name: String = row.try_get("index_name")?;
        let unique = row.try_get::<i64, _>("non_unique")? == 0;
        if index_name == "PRIMARY" {
            continue;
        }
        // InnoDB backs every foreign key with an index of the same name.
        if !unique && table.foreign_keys.iter().any(|fk| fk.name == index_name) {
            continue;
        }
        let Some(column) = row.try_get::<Option<String>, _>("column_name")? else {
            tracing::warn!(index = %index_name, "skipping functional index entry");
            continue;
        };
        let column = IndexColumn::new(column);
        let descending = row.try_get::<Option<String>, _>("collation")?.as_deref() == Some("D");
        index_rows.push(IndexRow {
            name: index_name,
            unique,
            column: if descending { column.descending() } else { column },
        });
    }

    attach_indexes(&mut table, group_indexes(index_rows));
    Ok(table)
}

fn column(provider: &MySqlProvider, row: &MySqlRow) -> Result<ColumnInfo, sqlx::Error> {
    let name: String = row.try_get("column_name")?;
    let sql_type = provider.normalize_type(&row.try_get::<String, _>("column_type")?);
    let mut column = ColumnInfo::new(name, sql_type);
    column.nullable = row.try_get::<String, _>("is_nullable")? == "YES";
    if row.try_get::<Option<String>, _>("column_key")?.as_deref() == Some("PRI") {
        column = column.primary_key();
    }

    let extra = row
        .try_get::<Option<String>, _>("extra")?
        .unwrap_or_default()
        .to_ascii_lowercase();
    column.default = if extra.contains("auto_increment") {
        Some(DefaultValue::Autoincrement)
    } else {
        row.try_get::<Option<String>, _>("column_default")?
            .and_then(|raw| provider.parse_default(&raw, &column.sql_type))
    };
    Ok(column)
}

fn action(rule: &str) -> ReferentialAction {
    ReferentialAction::from_sql(rule).unwrap_or(ReferentialAction::NoAction)
}
