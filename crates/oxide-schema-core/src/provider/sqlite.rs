//! SQLite provider.
//!
//! SQLite cannot alter columns or constraints in place; everything beyond
//! `ADD COLUMN` and index changes goes through a table rebuild.

use crate::ast::ScalarType;
use crate::error::GenerateError;
use crate::model::{ColumnInfo, DefaultValue, ForeignKeyInfo, IndexInfo};

use super::{
    canonical_type_text, is_numeric_literal, quote_literal, unique_column_index_name,
    unquote_literal, ColumnChangeStrategy, IntrospectionQueries, Provider, ProviderKind,
};

const TABLES: &str = "\
SELECT name AS table_name, sql
FROM sqlite_master
WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
ORDER BY name";

const COLUMNS: &str = "\
SELECT name, type, \"notnull\", dflt_value, pk
FROM pragma_table_info(?1)
ORDER BY cid";

const INDEXES: &str = "\
SELECT il.name AS index_name,
       il.\"unique\" AS is_unique,
       il.origin AS origin,
       ix.seqno AS position,
       ix.name AS column_name,
       ix.\"desc\" AS is_descending
FROM pragma_index_list(?1) AS il
JOIN pragma_index_xinfo(il.name) AS ix
WHERE ix.\"key\" = 1
ORDER BY il.name, ix.seqno";

const FOREIGN_KEYS: &str = "\
SELECT id, seq, \"table\" AS referenced_table, \"from\" AS column_name,
       \"to\" AS referenced_column, on_update, on_delete
FROM pragma_foreign_key_list(?1)
ORDER BY id, seq";

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteProvider;

impl SqliteProvider {
    fn unsupported(operation: &str, table: &str) -> GenerateError {
        GenerateError::Unsupported {
            provider: ProviderKind::Sqlite,
            operation: operation.to_string(),
            table: table.to_string(),
        }
    }
}

impl Provider for SqliteProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Sqlite
    }

    fn map_type(&self, scalar: ScalarType) -> String {
        match scalar {
            ScalarType::String | ScalarType::Json => "TEXT",
            ScalarType::Int | ScalarType::BigInt => "INTEGER",
            ScalarType::Float => "REAL",
            ScalarType::Decimal => "DECIMAL",
            ScalarType::Boolean => "BOOLEAN",
            ScalarType::DateTime => "DATETIME",
            ScalarType::Bytes => "BLOB",
        }
        .to_string()
    }

    fn normalize_type(&self, raw: &str) -> String {
        canonical_type_text(raw)
    }

    /// SQLite folds ASCII case when resolving table and column names.
    fn normalize_identifier(&self, name: &str) -> String {
        name.to_ascii_lowercase()
    }

    fn render_default(&self, default: &DefaultValue, _column_type: &str) -> Option<String> {
        match default {
            DefaultValue::Autoincrement => None,
            DefaultValue::Now => Some("CURRENT_TIMESTAMP".to_string()),
            DefaultValue::String(s) => Some(quote_literal(s)),
            DefaultValue::Number(n) => Some(n.clone()),
            DefaultValue::Boolean(b) => Some(b.to_string()),
            DefaultValue::Expression(e) => Some(format!("({e})")),
        }
    }

    fn parse_default(&self, raw: &str, column_type: &str) -> Option<DefaultValue> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("NULL") {
            return None;
        }
        if raw.eq_ignore_ascii_case("CURRENT_TIMESTAMP") {
            return Some(DefaultValue::Now);
        }
        if let Some(text) = unquote_literal(raw) {
            return Some(DefaultValue::String(text));
        }
        if raw.eq_ignore_ascii_case("true") || raw.eq_ignore_ascii_case("false") {
            return Some(DefaultValue::Boolean(raw.eq_ignore_ascii_case("true")));
        }
        if is_numeric_literal(raw) {
            if column_type.eq_ignore_ascii_case("BOOLEAN") && (raw == "0" || raw == "1") {
                return Some(DefaultValue::Boolean(raw == "1"));
            }
            return Some(DefaultValue::Number(raw.to_string()));
        }
        let expression = raw
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .unwrap_or(raw);
        Some(DefaultValue::Expression(expression.trim().to_string()))
    }

    fn introspection_queries(&self) -> IntrospectionQueries {
        IntrospectionQueries {
            tables: TABLES,
            columns: COLUMNS,
            indexes: INDEXES,
            foreign_keys: FOREIGN_KEYS,
        }
    }

    fn column_change_strategy(
        &self,
        _from: &ColumnInfo,
        _to: &ColumnInfo,
    ) -> ColumnChangeStrategy {
        ColumnChangeStrategy::RecreateTable
    }

    fn can_add_column_in_place(&self, column: &ColumnInfo) -> bool {
        let constant_default = matches!(
            column.default,
            None | Some(
                DefaultValue::String(_) | DefaultValue::Number(_) | DefaultValue::Boolean(_)
            )
        );
        !column.primary_key
            && !column.unique
            && constant_default
            && (column.nullable || column.default.is_some())
    }

    fn alters_constraints_in_place(&self) -> bool {
        false
    }

    fn inline_foreign_keys(&self) -> bool {
        true
    }

    fn inline_single_primary_key(&self) -> bool {
        true
    }

    fn autoincrement_clause(&self) -> &'static str {
        " AUTOINCREMENT"
    }

    fn primary_key_clause(&self, table: &crate::model::TableInfo) -> String {
        format!(
            "PRIMARY KEY ({})",
            super::quote_all(self, &table.primary_key())
        )
    }

    fn alter_column(
        &self,
        table: &str,
        _from: &ColumnInfo,
        _to: &ColumnInfo,
    ) -> Result<Vec<String>, GenerateError> {
        Err(Self::unsupported("ALTER COLUMN", table))
    }

    fn drop_index(&self, _table: &str, index: &IndexInfo) -> String {
        format!("DROP INDEX {}", self.quote_identifier(&index.name))
    }

    fn drop_unique_column(&self, table: &str, column: &str) -> Vec<String> {
        vec![format!(
            "DROP INDEX IF EXISTS {}",
            self.quote_identifier(&unique_column_index_name(table, column))
        )]
    }

    fn drop_foreign_key(&self, table: &str, _fk: &ForeignKeyInfo) -> Result<String, GenerateError> {
        Err(Self::unsupported("DROP CONSTRAINT", table))
    }

    fn drop_primary_key(&self, table: &str) -> Result<String, GenerateError> {
        Err(Self::unsupported("DROP PRIMARY KEY", table))
    }

    fn add_primary_key(&self, table: &crate::model::TableInfo) -> Result<String, GenerateError> {
        Err(Self::unsupported("ADD PRIMARY KEY", &table.name))
    }
}
