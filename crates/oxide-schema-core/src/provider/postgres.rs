//! PostgreSQL provider.

use crate::ast::ScalarType;
use crate::error::GenerateError;
use crate::model::{ColumnInfo, DefaultValue, ForeignKeyInfo, IndexColumn, IndexInfo};

use super::{
    canonical_type_text, is_numeric_literal, quote_literal, split_type, unique_column_index_name,
    unquote_literal, IntrospectionQueries, Provider, ProviderKind, TypeFamily,
};

const TABLES: &str = "\
SELECT c.relname::text AS table_name
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = current_schema() AND c.relkind IN ('r', 'p')
ORDER BY c.relname";

const COLUMNS: &str = "\
SELECT a.attname::text AS column_name,
       pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
       NOT a.attnotnull AS is_nullable,
       pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS column_default,
       a.attidentity::text AS identity,
       EXISTS (
           SELECT 1 FROM pg_catalog.pg_index i
           WHERE i.indrelid = c.oid AND i.indisprimary AND a.attnum = ANY(i.indkey)
       ) AS is_primary
FROM pg_catalog.pg_attribute a
JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
WHERE n.nspname = current_schema() AND c.relname = $1 AND a.attnum > 0 AND NOT a.attisdropped
ORDER BY a.attnum";

const INDEXES: &str = "\
SELECT ic.relname::text AS index_name,
       i.indisunique AS is_unique,
       i.indisprimary AS is_primary,
       k.ord::bigint AS position,
       a.attname::text AS column_name,
       pg_catalog.pg_get_indexdef(i.indexrelid, k.ord::int, true) AS expression,
       (i.indoption[(k.ord - 1)::int] & 1) = 1 AS is_descending
FROM pg_catalog.pg_index i
JOIN pg_catalog.pg_class t ON t.oid = i.indrelid
JOIN pg_catalog.pg_class ic ON ic.oid = i.indexrelid
JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
CROSS JOIN LATERAL unnest(i.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
LEFT JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
WHERE n.nspname = current_schema() AND t.relname = $1 AND k.ord <= i.indnkeyatts
ORDER BY ic.relname, k.ord";

const FOREIGN_KEYS: &str = "\
SELECT con.conname::text AS constraint_name,
       k.ord::bigint AS position,
       src.attname::text AS column_name,
       ref_table.relname::text AS referenced_table,
       ref.attname::text AS referenced_column,
       con.confdeltype::text AS on_delete,
       con.confupdtype::text AS on_update
FROM pg_catalog.pg_constraint con
JOIN pg_catalog.pg_class t ON t.oid = con.conrelid
JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
JOIN pg_catalog.pg_class ref_table ON ref_table.oid = con.confrelid
CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(src_attnum, ref_attnum, ord)
JOIN pg_catalog.pg_attribute src ON src.attrelid = con.conrelid AND src.attnum = k.src_attnum
JOIN pg_catalog.pg_attribute ref ON ref.attrelid = con.confrelid AND ref.attnum = k.ref_attnum
WHERE con.contype = 'f' AND n.nspname = current_schema() AND t.relname = $1
ORDER BY con.conname, k.ord";

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresProvider;

impl PostgresProvider {
    /// Maps a `format_type` base name to its canonical spelling.
    fn canonical_base(base: &str, suffix: &str) -> String {
        let with_zone = suffix == "WITH TIME ZONE";
        match base {
            "CHARACTER VARYING" => "VARCHAR".to_string(),
            "CHARACTER" | "BPCHAR" => "CHAR".to_string(),
            "INT" | "INT4" => "INTEGER".to_string(),
            "INT8" => "BIGINT".to_string(),
            "INT2" => "SMALLINT".to_string(),
            "FLOAT8" => "DOUBLE PRECISION".to_string(),
            "FLOAT4" => "REAL".to_string(),
            "NUMERIC" => "DECIMAL".to_string(),
            "BOOL" => "BOOLEAN".to_string(),
            "TIMESTAMP" if with_zone => "TIMESTAMPTZ".to_string(),
            "TIME" if with_zone => "TIMETZ".to_string(),
            other => other.to_string(),
        }
    }
}

impl Provider for PostgresProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Postgres
    }

    fn map_type(&self, scalar: ScalarType) -> String {
        match scalar {
            ScalarType::String => "TEXT",
            ScalarType::Int => "INTEGER",
            ScalarType::BigInt => "BIGINT",
            ScalarType::Float => "DOUBLE PRECISION",
            ScalarType::Decimal => "DECIMAL(65,30)",
            ScalarType::Boolean => "BOOLEAN",
            ScalarType::DateTime => "TIMESTAMP(3)",
            ScalarType::Json => "JSONB",
            ScalarType::Bytes => "BYTEA",
        }
        .to_string()
    }

    fn list_type(&self, element: &str) -> Option<String> {
        Some(format!("{element}[]"))
    }

    fn normalize_type(&self, raw: &str) -> String {
        let text = canonical_type_text(raw);
        if let Some(element) = text.strip_suffix("[]") {
            return format!("{}[]", self.normalize_type(element));
        }
        let (base, params, suffix) = split_type(&text);
        // `timestamp without time zone` has no parentheses, so the suffix is
        // still part of the base.
        let (base, suffix) = match base.find(" WITH") {
            Some(at) if params.is_none() => (&base[..at], base[at..].trim()),
            _ => (base, suffix),
        };
        let name = Self::canonical_base(base, suffix);
        match params {
            Some(params) => format!("{name}({params})"),
            None => name,
        }
    }

    fn bind_placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn render_default(&self, default: &DefaultValue, _column_type: &str) -> Option<String> {
        match default {
            DefaultValue::Autoincrement => None,
            DefaultValue::Now => Some("CURRENT_TIMESTAMP".to_string()),
            DefaultValue::String(s) => Some(quote_literal(s)),
            DefaultValue::Number(n) => Some(n.clone()),
            DefaultValue::Boolean(b) => Some(b.to_string()),
            DefaultValue::Expression(e) => Some(e.clone()),
        }
    }

    fn parse_default(&self, raw: &str, column_type: &str) -> Option<DefaultValue> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("NULL") || raw.starts_with("NULL::") {
            return None;
        }
        if raw.starts_with("nextval(") {
            return Some(DefaultValue::Autoincrement);
        }

        let value = strip_cast(raw);
        let upper = value.to_ascii_uppercase();
        if upper.starts_with("CURRENT_TIMESTAMP") || upper == "NOW()" {
            return Some(DefaultValue::Now);
        }
        if upper == "TRUE" || upper == "FALSE" {
            return Some(DefaultValue::Boolean(upper == "TRUE"));
        }

        let numeric = matches!(
            TypeFamily::of(column_type),
            TypeFamily::Integer | TypeFamily::Numeric
        );
        if let Some(text) = unquote_literal(value) {
            if numeric && is_numeric_literal(&text) {
                return Some(DefaultValue::Number(text));
            }
            return Some(DefaultValue::String(text));
        }
        if is_numeric_literal(value) {
            return Some(DefaultValue::Number(value.to_string()));
        }
        Some(DefaultValue::Expression(raw.to_string()))
    }

    fn introspection_queries(&self) -> IntrospectionQueries {
        IntrospectionQueries {
            tables: TABLES,
            columns: COLUMNS,
            indexes: INDEXES,
            foreign_keys: FOREIGN_KEYS,
        }
    }

    fn autoincrement_clause(&self) -> &'static str {
        " GENERATED BY DEFAULT AS IDENTITY"
    }

    fn index_column(&self, column: &IndexColumn) -> String {
        let mut sql = match &column.function {
            Some(function) => format!("({function}({}))", self.quote_identifier(&column.name)),
            None => self.quote_identifier(&column.name),
        };
        if column.sort.is_some() {
            sql.push_str(" DESC");
        }
        sql
    }

    fn alter_column(
        &self,
        table: &str,
        from: &ColumnInfo,
        to: &ColumnInfo,
    ) -> Result<Vec<String>, GenerateError> {
        let prefix = format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(&to.name)
        );
        let mut statements = Vec::new();

        let default_changed = from.default != to.default;
        if default_changed {
            match from.default {
                Some(DefaultValue::Autoincrement) => {
                    statements.push(format!("{prefix} DROP IDENTITY IF EXISTS"));
                }
                Some(_) => statements.push(format!("{prefix} DROP DEFAULT")),
                None => {}
            }
        }

        if self.normalize_type(&from.sql_type) != self.normalize_type(&to.sql_type) {
            statements.push(format!(
                "{prefix} SET DATA TYPE {} USING {}::{}",
                to.sql_type,
                self.quote_identifier(&to.name),
                to.sql_type
            ));
        }

        if from.nullable != to.nullable {
            statements.push(if to.nullable {
                format!("{prefix} DROP NOT NULL")
            } else {
                format!("{prefix} SET NOT NULL")
            });
        }

        if default_changed {
            match &to.default {
                Some(DefaultValue::Autoincrement) => {
                    statements.push(format!("{prefix} ADD{}", self.autoincrement_clause()));
                }
                Some(default) => {
                    if let Some(rendered) = self.render_default(default, &to.sql_type) {
                        statements.push(format!("{prefix} SET DEFAULT {rendered}"));
                    }
                }
                None => {}
            }
        }

        Ok(statements)
    }

    fn drop_index(&self, _table: &str, index: &IndexInfo) -> String {
        format!("DROP INDEX {}", self.quote_identifier(&index.name))
    }

    fn drop_unique_column(&self, table: &str, column: &str) -> Vec<String> {
        let name = self.quote_identifier(&unique_column_index_name(table, column));
        vec![
            format!(
                "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {name}",
                self.quote_identifier(table)
            ),
            format!("DROP INDEX IF EXISTS {name}"),
        ]
    }

    fn drop_foreign_key(&self, table: &str, fk: &ForeignKeyInfo) -> Result<String, GenerateError> {
        Ok(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_identifier(table),
            self.quote_identifier(&fk.name)
        ))
    }
}

/// Removes a trailing `::type` cast (outside quotes) and wrapping parentheses.
fn strip_cast(raw: &str) -> &str {
    let mut value = raw.trim();
    while value.starts_with('(') && value.ends_with(')') {
        value = value[1..value.len() - 1].trim();
    }
    let mut in_quote = false;
    let mut cut = None;
    let bytes = value.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'\'' => in_quote = !in_quote,
            b':' if !in_quote && bytes.get(i + 1) == Some(&b':') => {
                cut = Some(i);
                break;
            }
            _ => {}
        }
    }
    cut.map_or(value, |at| value[..at].trim())
}
