//! MySQL provider.

use crate::ast::ScalarType;
use crate::error::GenerateError;
use crate::model::{ColumnInfo, DefaultValue, ForeignKeyInfo, IndexColumn, IndexInfo};

use super::{
    canonical_type_text, is_numeric_literal, quote_literal, split_type, unique_column_index_name,
    unquote_literal, IntrospectionQueries, Provider, ProviderKind, TypeFamily,
};

const TABLES: &str = "\
SELECT CAST(TABLE_NAME AS CHAR) AS table_name
FROM information_schema.TABLES
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
ORDER BY TABLE_NAME";

const COLUMNS: &str = "\
SELECT CAST(COLUMN_NAME AS CHAR) AS column_name,
       CAST(COLUMN_TYPE AS CHAR) AS column_type,
       CAST(IS_NULLABLE AS CHAR) AS is_nullable,
       CAST(COLUMN_DEFAULT AS CHAR) AS column_default,
       CAST(EXTRA AS CHAR) AS extra,
       CAST(COLUMN_KEY AS CHAR) AS column_key
FROM information_schema.COLUMNS
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
ORDER BY ORDINAL_POSITION";

const INDEXES: &str = "\
SELECT CAST(INDEX_NAME AS CHAR) AS index_name,
       CAST(NON_UNIQUE AS SIGNED) AS non_unique,
       CAST(SEQ_IN_INDEX AS SIGNED) AS position,
       CAST(COLUMN_NAME AS CHAR) AS column_name,
       CAST(COLLATION AS CHAR) AS collation
FROM information_schema.STATISTICS
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
ORDER BY INDEX_NAME, SEQ_IN_INDEX";

const FOREIGN_KEYS: &str = "\
SELECT CAST(kcu.CONSTRAINT_NAME AS CHAR) AS constraint_name,
       CAST(kcu.ORDINAL_POSITION AS SIGNED) AS position,
       CAST(kcu.COLUMN_NAME AS CHAR) AS column_name,
       CAST(kcu.REFERENCED_TABLE_NAME AS CHAR) AS referenced_table,
       CAST(kcu.REFERENCED_COLUMN_NAME AS CHAR) AS referenced_column,
       CAST(rc.DELETE_RULE AS CHAR) AS on_delete,
       CAST(rc.UPDATE_RULE AS CHAR) AS on_update
FROM information_schema.KEY_COLUMN_USAGE kcu
JOIN information_schema.REFERENTIAL_CONSTRAINTS rc
  ON rc.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA
 AND rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME
 AND rc.TABLE_NAME = kcu.TABLE_NAME
WHERE kcu.TABLE_SCHEMA = DATABASE() AND kcu.TABLE_NAME = ?
  AND kcu.REFERENCED_TABLE_NAME IS NOT NULL
ORDER BY kcu.CONSTRAINT_NAME, kcu.ORDINAL_POSITION";

const INTEGER_TYPES: [&str; 5] = ["TINYINT", "SMALLINT", "MEDIUMINT", "INT", "BIGINT"];

/// MySQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlProvider;

impl Provider for MySqlProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::MySql
    }

    fn map_type(&self, scalar: ScalarType) -> String {
        match scalar {
            ScalarType::String => "VARCHAR(191)",
            ScalarType::Int => "INT",
            ScalarType::BigInt => "BIGINT",
            ScalarType::Float => "DOUBLE",
            ScalarType::Decimal => "DECIMAL(65,30)",
            ScalarType::Boolean => "TINYINT(1)",
            ScalarType::DateTime => "DATETIME(3)",
            ScalarType::Json => "JSON",
            ScalarType::Bytes => "LONGBLOB",
        }
        .to_string()
    }

    fn map_enum(&self, values: &[String]) -> String {
        let values: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
        format!("ENUM({})", values.join(","))
    }

    fn normalize_type(&self, raw: &str) -> String {
        let text = canonical_type_text(raw);
        let (base, params, suffix) = split_type(&text);
        let base = match base {
            "INTEGER" => "INT",
            "BOOL" | "BOOLEAN" => return "TINYINT(1)".to_string(),
            "NUMERIC" => "DECIMAL",
            "REAL" | "DOUBLE PRECISION" => "DOUBLE",
            other => other,
        };
        // Integer display widths are informational, except the boolean marker.
        let params = match params {
            Some("1") if base == "TINYINT" => Some("1"),
            Some(_) if INTEGER_TYPES.contains(&base) => None,
            other => other,
        };
        let mut out = match params {
            Some(params) => format!("{base}({params})"),
            None => base.to_string(),
        };
        if !suffix.is_empty() {
            out.push(' ');
            out.push_str(suffix);
        }
        out
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    // Column names are case-insensitive. Table names follow the file system
    // (`lower_case_table_names`) and are compared as written.
    fn normalize_identifier(&self, name: &str) -> String {
        name.to_lowercase()
    }

    fn normalize_table_name(&self, name: &str) -> String {
        name.to_string()
    }

    fn render_default(&self, default: &DefaultValue, column_type: &str) -> Option<String> {
        match default {
            DefaultValue::Autoincrement => None,
            DefaultValue::Now => Some(match split_type(column_type).1 {
                Some(precision) => format!("CURRENT_TIMESTAMP({precision})"),
                None => "CURRENT_TIMESTAMP".to_string(),
            }),
            DefaultValue::String(s) => Some(quote_literal(s)),
            DefaultValue::Number(n) => Some(n.clone()),
            DefaultValue::Boolean(b) => Some(if *b { "1" } else { "0" }.to_string()),
            DefaultValue::Expression(e) => Some(format!("({e})")),
        }
    }

    fn parse_default(&self, raw: &str, column_type: &str) -> Option<DefaultValue> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("NULL") {
            return None;
        }
        let upper = raw.to_ascii_uppercase();
        if upper.starts_with("CURRENT_TIMESTAMP") || upper.starts_with("NOW(") {
            return Some(DefaultValue::Now);
        }
        let value = unquote_literal(raw).unwrap_or_else(|| raw.to_string());

        match TypeFamily::of(column_type) {
            TypeFamily::Boolean => Some(DefaultValue::Boolean(
                value == "1" || value.eq_ignore_ascii_case("true"),
            )),
            TypeFamily::Integer | TypeFamily::Numeric if is_numeric_literal(&value) => {
                Some(DefaultValue::Number(value))
            }
            TypeFamily::Text | TypeFamily::Temporal => Some(DefaultValue::String(value)),
            _ => Some(DefaultValue::Expression(value)),
        }
    }

    fn introspection_queries(&self) -> IntrospectionQueries {
        IntrospectionQueries {
            tables: TABLES,
            columns: COLUMNS,
            indexes: INDEXES,
            foreign_keys: FOREIGN_KEYS,
        }
    }

    fn supports_transactional_ddl(&self) -> bool {
        false
    }

    fn inline_unique(&self) -> bool {
        false
    }

    fn autoincrement_clause(&self) -> &'static str {
        " AUTO_INCREMENT"
    }

    fn table_options(&self) -> &'static str {
        " DEFAULT CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci"
    }

    fn primary_key_clause(&self, table: &crate::model::TableInfo) -> String {
        format!(
            "PRIMARY KEY ({})",
            super::quote_all(self, &table.primary_key())
        )
    }

    fn unique_column_clause(&self, table: &str, column: &str) -> String {
        format!(
            "UNIQUE INDEX {}({})",
            self.quote_identifier(&unique_column_index_name(table, column)),
            self.quote_identifier(column)
        )
    }

    fn index_column(&self, column: &IndexColumn) -> String {
        let mut sql = match &column.function {
            Some(function) => format!("(({function}({})))", self.quote_identifier(&column.name)),
            None => self.quote_identifier(&column.name),
        };
        if column.sort.is_some() {
            sql.push_str(" DESC");
        }
        sql
    }

    fn rename_table(&self, from: &str, to: &str) -> String {
        format!(
            "RENAME TABLE {} TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    fn alter_column(
        &self,
        table: &str,
        _from: &ColumnInfo,
        to: &ColumnInfo,
    ) -> Result<Vec<String>, GenerateError> {
        Ok(vec![format!(
            "ALTER TABLE {} MODIFY {}",
            self.quote_identifier(table),
            self.column_definition(to, false)
        )])
    }

    fn drop_index(&self, table: &str, index: &IndexInfo) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(&index.name),
            self.quote_identifier(table)
        )
    }

    fn drop_unique_column(&self, table: &str, column: &str) -> Vec<String> {
        vec![format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(&unique_column_index_name(table, column)),
            self.quote_identifier(table)
        )]
    }

    fn drop_foreign_key(&self, table: &str, fk: &ForeignKeyInfo) -> Result<String, GenerateError> {
        Ok(format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.quote_identifier(table),
            self.quote_identifier(&fk.name)
        ))
    }

    fn drop_primary_key(&self, table: &str) -> Result<String, GenerateError> {
        Ok(format!(
            "ALTER TABLE {} DROP PRIMARY KEY",
            self.quote_identifier(table)
        ))
    }
}
