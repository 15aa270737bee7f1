//! SQLite catalog reader (`sqlite_master` and the table pragmas).

use std::sync::LazyLock;

use oxide_schema_core::provider::SqliteProvider;
use oxide_schema_core::{
    ColumnInfo, DefaultValue, IndexColumn, Provider, ReferentialAction, SchemaModel, TableInfo,
};
use regex::Regex;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use super::{
    attach_indexes, group_foreign_keys, group_indexes, is_internal_table,
    parse_index_expression, ForeignKeyRow, IndexRow, TableFailures,
};
use crate::error::IntrospectionError;

static AUTOINCREMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAUTOINCREMENT\b").expect("valid autoincrement pattern"));

static CONSTRAINT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)CONSTRAINT\s+"((?:[^"]|"")+)"\s+FOREIGN\s+KEY\s*\(([^)]*)\)"#)
        .expect("valid constraint pattern")
});

/// `ON <table> (` of a `CREATE INDEX` statement, with the table quoted or bare.
static INDEX_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\bON\s+(?:"(?:[^"]|"")*"|`[^`]*`|\[[^\]]*\]|[^\s(]+)\s*\("#)
        .expect("valid index pattern")
});

pub(super) async fn introspect(pool: &SqlitePool) -> Result<SchemaModel, IntrospectionError> {
    let provider = SqliteProvider;
    let queries = provider.introspection_queries();

    let tables: Vec<(String, Option<String>)> = sqlx::query_as(queries.tables)
        .fetch_all(pool)
        .await
        .map_err(|source| IntrospectionError::Failed {
            what: "tables",
            source,
        })?;

    let mut schema = SchemaModel::new();
    let mut failures = TableFailures::default();
    for (name, sql) in tables {
        if is_internal_table(&name) {
            continue;
        }
        match read_table(pool, &provider, &name, sql.as_deref().unwrap_or_default()).await {
            Ok(table) => schema.add_table(table),
            Err(e) => failures.record(&name, e),
        }
    }
    failures.finish()?;
    Ok(schema)
}

async fn read_table(
    pool: &SqlitePool,
    provider: &SqliteProvider,
    name: &str,
    create_sql: &str,
) -> Result<TableInfo, sqlx::Error> {
    let queries = provider.introspection_queries();
    let mut table = TableInfo::new(name);

    let rows = sqlx::query(queries.columns).bind(name).fetch_all(pool).await?;
    for row in &rows {
        table.columns.push(column(provider, row)?);
    }
    // AUTOINCREMENT only exists on a single INTEGER PRIMARY KEY column.
    if AUTOINCREMENT.is_match(create_sql) {
        let mut keys = table.columns.iter_mut().filter(|c| c.primary_key);
        if let (Some(key), None) = (keys.next(), keys.next()) {
            key.default.get_or_insert(DefaultValue::Autoincrement);
        }
    }

    let rows = sqlx::query(queries.indexes).bind(name).fetch_all(pool).await?;
    let mut index_rows = Vec::with_capacity(rows.len());
    for row in &rows {
        // Implicit index behind a non-integer primary key.
        let origin: String = row.try_get("origin")?;
        if origin == "pk" {
            continue;
        }
        let index_name: String = row.try_get("index_name")?;
        let column = match row.try_get::<Option<String>, _>("column_name")? {
            Some(column) => IndexColumn::new(column),
            None => {
                let position: i64 = row.try_get("position")?;
                match expression_column(pool, &index_name, position).await? {
                    Some(column) => column,
                    None => {
                        tracing::warn!(index = %index_name, "skipping index entry with an unsupported expression");
                        continue;
                    }
                }
            }
        };
        let column = if row.try_get::<i64, _>("is_descending")? == 1 {
            column.descending()
        } else {
            column
        };
        index_rows.push(IndexRow {
            name: index_name,
            unique: row.try_get::<i64, _>("is_unique")? == 1,
            column,
        });
    }

    let rows = sqlx::query(queries.foreign_keys).bind(name).fetch_all(pool).await?;
    let mut fk_rows = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: i64 = row.try_get("id")?;
        let column: String = row.try_get("column_name")?;
        let referenced_table: String = row.try_get("referenced_table")?;
        let referenced_column = match row.try_get::<Option<String>, _>("referenced_column")? {
            Some(column) => column,
            None => referenced_key_column(pool, &referenced_table, row.try_get("seq")?).await?,
        };
        fk_rows.push(ForeignKeyRow {
            // SQLite reports no constraint names; the id keeps rows grouped
            // until the real name is recovered below.
            name: id.to_string(),
            column,
            referenced_table,
            referenced_column,
            on_delete: action(row.try_get("on_delete")?),
            on_update: action(row.try_get("on_update")?),
        });
    }
    table.foreign_keys = group_foreign_keys(fk_rows)
        .into_iter()
        .map(|mut fk| {
            fk.name = constraint_name(create_sql, &fk.columns)
                .unwrap_or_else(|| format!("{name}_{}_fkey", fk.columns.join("_")));
            fk
        })
        .collect();

    attach_indexes(&mut table, group_indexes(index_rows));
    Ok(table)
}

fn column(provider: &SqliteProvider, row: &SqliteRow) -> Result<ColumnInfo, sqlx::Error> {
    let name: String = row.try_get("name")?;
    let sql_type = provider.normalize_type(&row.try_get::<String, _>("type")?);
    let not_null = row.try_get::<i64, _>("notnull")? == 1;
    let key = row.try_get::<i64, _>("pk")? > 0;

    let mut column = ColumnInfo::new(name, sql_type);
    column.nullable = !not_null;
    if key {
        column = column.primary_key();
    }
    column.default = row
        .try_get::<Option<String>, _>("dflt_value")?
        .and_then(|raw| provider.parse_default(&raw, &column.sql_type));
    Ok(column)
}

/// Recovers `lower(email)`-style entries from the index definition.
async fn expression_column(
    pool: &SqlitePool,
    index: &str,
    position: i64,
) -> Result<Option<IndexColumn>, sqlx::Error> {
    let sql = sqlx::query_scalar::<_, Option<String>>(
        "SELECT sql FROM sqlite_master WHERE type = 'index' AND name = ?1",
    )
    .bind(index)
    .fetch_optional(pool)
    .await?
    .flatten();
    let Some(sql) = sql else {
        return Ok(None);
    };
    let Some(list) = index_column_list(&sql) else {
        return Ok(None);
    };
    let entry = split_top_level(list)
        .into_iter()
        .nth(usize::try_from(position).unwrap_or(usize::MAX));
    Ok(entry.and_then(|entry| {
        let (expression, descending) = strip_sort_order(entry.trim());
        let column = parse_index_expression(expression).or_else(|| {
            expression
                .strip_prefix('(')
                .and_then(|e| e.strip_suffix(')'))
                .and_then(parse_index_expression)
        })?;
        Some(if descending { column.descending() } else { column })
    }))
}

/// Contents of the parenthesised column list of a `CREATE INDEX` statement.
fn index_column_list(sql: &str) -> Option<&str> {
    let start = INDEX_TARGET.find(sql)?.end();
    let list = &sql[start..];
    let mut depth = 1usize;
    let mut quote = None;
    for (at, c) in list.char_indices() {
        match (quote, c) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'' | '`') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth == 0 {
                    return Some(&list[..at]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits a trailing `ASC` / `DESC` off an index entry.
fn strip_sort_order(entry: &str) -> (&str, bool) {
    match entry.rsplit_once(char::is_whitespace) {
        Some((head, word)) if word.eq_ignore_ascii_case("DESC") => (head.trim_end(), true),
        Some((head, word)) if word.eq_ignore_ascii_case("ASC") => (head.trim_end(), false),
        _ => (entry, false),
    }
}

/// Key column of `table` referenced by a foreign key that names no column.
async fn referenced_key_column(
    pool: &SqlitePool,
    table: &str,
    seq: i64,
) -> Result<String, sqlx::Error> {
    let columns: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk",
    )
    .bind(table)
    .fetch_all(pool)
    .await?;
    usize::try_from(seq)
        .ok()
        .and_then(|at| columns.into_iter().nth(at))
        .ok_or(sqlx::Error::RowNotFound)
}

/// Name given to the foreign key over `columns` in the `CREATE TABLE` text.
fn constraint_name(create_sql: &str, columns: &[String]) -> Option<String> {
    CONSTRAINT_NAME.captures_iter(create_sql).find_map(|captures| {
        let declared: Vec<String> = captures[2]
            .split(',')
            .map(|c| c.trim().trim_matches('"').replace("\"\"", "\""))
            .collect();
        (declared == columns).then(|| captures[1].replace("\"\"", "\""))
    })
}

fn action(text: String) -> ReferentialAction {
    ReferentialAction::from_sql(&text).unwrap_or(ReferentialAction::NoAction)
}

/// Splits on commas outside parentheses and quotes.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0;
    for (at, c) in text.char_indices() {
        match (quote, c) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'' | '`') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&text[start..at]);
                start = at + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}
