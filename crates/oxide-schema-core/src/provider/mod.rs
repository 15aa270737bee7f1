//! Provider capability interface.
//!
//! Every dialect difference (type mapping, quoting, default syntax, catalog
//! queries, alteration policy) lives behind [`Provider`]. Adding a database
//! means adding one implementation here.

mod mysql;
mod postgres;
mod sqlite;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use mysql::MySqlProvider;
pub use postgres::PostgresProvider;
pub use sqlite::SqliteProvider;

use crate::ast::{ScalarType, Schema};
use crate::error::GenerateError;
use crate::model::{ColumnInfo, DefaultValue, ForeignKeyInfo, IndexColumn, IndexInfo, TableInfo};

/// Supported database providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Postgres,
    MySql,
    Sqlite,
}

impl ProviderKind {
    /// Parses a datasource `provider` value.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Some(Self::Postgres),
            "mysql" => Some(Self::MySql),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Infers the provider from a connection string scheme.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.trim();
        if url.starts_with("postgresql://") || url.starts_with("postgres://") {
            Some(Self::Postgres)
        } else if url.starts_with("mysql://") {
            Some(Self::MySql)
        } else if url.starts_with("file:") || url.starts_with("sqlite:") {
            Some(Self::Sqlite)
        } else {
            None
        }
    }

    /// Datasource provider first, connection string scheme second.
    #[must_use]
    pub fn detect(schema: &Schema, url: Option<&str>) -> Option<Self> {
        schema
            .datasource_provider()
            .and_then(Self::from_name)
            .or_else(|| schema.datasource_url().and_then(Self::from_url))
            .or_else(|| url.and_then(Self::from_url))
    }

    /// Returns the provider implementation.
    #[must_use]
    pub fn provider(self) -> &'static dyn Provider {
        match self {
            Self::Postgres => &PostgresProvider,
            Self::MySql => &MySqlProvider,
            Self::Sqlite => &SqliteProvider,
        }
    }

    /// Canonical provider name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgresql",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown provider `{s}`"))
    }
}

/// Catalog queries used by the introspector. Per-table queries take the table
/// name as their only bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntrospectionQueries {
    pub tables: &'static str,
    pub columns: &'static str,
    pub indexes: &'static str,
    pub foreign_keys: &'static str,
}

/// How a modified column is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnChangeStrategy {
    /// `ALTER COLUMN` / `MODIFY COLUMN`, data preserved.
    AlterInPlace,
    /// Rebuild the table and copy rows across.
    RecreateTable,
    /// Drop the column and add it again; existing values are lost.
    DropAndAdd,
}

/// Coarse type grouping used by the alteration policy and destructive checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TypeFamily {
    Text,
    Integer,
    Numeric,
    Boolean,
    Temporal,
    Json,
    Binary,
    Other,
}

impl TypeFamily {
    /// Classifies a canonical SQL type.
    #[must_use]
    pub fn of(sql_type: &str) -> Self {
        let upper = sql_type.trim().to_ascii_uppercase();
        if upper.ends_with("[]") {
            return Self::Other;
        }
        if upper == "TINYINT(1)" || upper == "BOOLEAN" || upper == "BOOL" {
            return Self::Boolean;
        }
        let base = upper.split('(').next().unwrap_or_default().trim();
        match base {
            "TEXT" | "VARCHAR" | "CHAR" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM"
            | "UUID" | "CITEXT" | "CLOB" => Self::Text,
            "INTEGER" | "INT" | "BIGINT" | "SMALLINT" | "TINYINT" | "MEDIUMINT" | "SERIAL"
            | "BIGSERIAL" => Self::Integer,
            "DECIMAL" | "NUMERIC" | "REAL" | "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" => {
                Self::Numeric
            }
            "TIMESTAMP" | "TIMESTAMPTZ" | "DATETIME" | "DATE" | "TIME" | "TIMETZ" => {
                Self::Temporal
            }
            "JSON" | "JSONB" => Self::Json,
            "BYTEA" | "BLOB" | "LONGBLOB" | "MEDIUMBLOB" | "TINYBLOB" | "BINARY" | "VARBINARY" => {
                Self::Binary
            }
            _ => Self::Other,
        }
    }

    /// Whether a column of family `from` can be cast to `to` in place. The
    /// cast may still fail or lose data; see [`TypeFamily::widens`].
    #[must_use]
    pub fn converts_in_place(from: Self, to: Self) -> bool {
        use TypeFamily::{Boolean, Integer, Numeric, Text};
        from == to
            || matches!(
                (from, to),
                (Text, _) | (_, Text) | (Integer | Numeric | Boolean, Integer | Numeric | Boolean)
            )
    }

    /// True when every value of canonical type `from` is stored unchanged by
    /// canonical type `to`. Anything else is a narrowing change.
    #[must_use]
    pub fn widens(from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        let (from_family, to_family) = (Self::of(from), Self::of(to));
        // Any scalar value has an exact textual form.
        if to_family == Self::Text
            && from_family != Self::Text
            && from_family != Self::Other
            && from_family != Self::Binary
            && text_capacity(to) >= UNBOUNDED_TEXT
        {
            return true;
        }
        match (from_family, to_family) {
            (Self::Text, Self::Text) => text_widens(from, to),
            (Self::Boolean | Self::Integer, Self::Integer | Self::Boolean) => {
                integer_bits(from) <= integer_bits(to)
            }
            (Self::Boolean | Self::Integer, Self::Numeric) => {
                numeric_holds_integer(to, integer_bits(from))
            }
            (Self::Numeric, Self::Numeric) => numeric_widens(from, to),
            (Self::Temporal, Self::Temporal) => temporal_widens(from, to),
            (Self::Binary, Self::Binary) => binary_capacity(from) <= binary_capacity(to),
            (Self::Json, Self::Json) => to == "JSONB",
            _ => false,
        }
    }
}

/// Capacity given to `TEXT` and other unbounded string types.
const UNBOUNDED_TEXT: u64 = 65_535;

fn type_length(canonical: &str) -> Option<u64> {
    split_type(canonical).1.and_then(|p| p.trim().parse().ok())
}

fn text_capacity(canonical: &str) -> u64 {
    let (base, params, _) = split_type(canonical);
    match base {
        "VARCHAR" | "CHAR" | "CHARACTER VARYING" | "CHARACTER" => {
            params.map_or(UNBOUNDED_TEXT, |_| type_length(canonical).unwrap_or(0))
        }
        "TINYTEXT" => 255,
        "MEDIUMTEXT" => 16_777_215,
        "LONGTEXT" => u64::from(u32::MAX),
        "UUID" => 36,
        "ENUM" => 0,
        _ => UNBOUNDED_TEXT,
    }
}

fn enum_values(canonical: &str) -> Vec<&str> {
    split_type(canonical)
        .1
        .map(|p| p.split(',').map(str::trim).collect())
        .unwrap_or_default()
}

fn text_widens(from: &str, to: &str) -> bool {
    match (split_type(from).0, split_type(to).0) {
        ("ENUM", "ENUM") => {
            let allowed = enum_values(to);
            enum_values(from).iter().all(|v| allowed.contains(v))
        }
        ("ENUM", _) => text_capacity(to) >= UNBOUNDED_TEXT,
        (_, "ENUM" | "UUID") => false,
        _ => text_capacity(from) <= text_capacity(to),
    }
}

fn integer_bits(canonical: &str) -> u32 {
    if TypeFamily::of(canonical) == TypeFamily::Boolean {
        return 1;
    }
    match split_type(canonical).0 {
        "TINYINT" => 8,
        "SMALLINT" => 16,
        "MEDIUMINT" => 24,
        "INT" | "INTEGER" | "SERIAL" => 32,
        _ => 64,
    }
}

/// Decimal digits needed for the largest value of an integer width.
const fn integer_digits(bits: u32) -> u64 {
    match bits {
        1 => 1,
        8 => 3,
        16 => 5,
        24 => 8,
        32 => 10,
        _ => 19,
    }
}

/// `(precision, scale)` of a parameterised `DECIMAL` / `NUMERIC`.
fn decimal_parts(canonical: &str) -> Option<(u64, u64)> {
    let params = split_type(canonical).1?;
    let mut parts = params.split(',').map(|p| p.trim().parse::<u64>().ok());
    let precision = parts.next()??;
    let scale = parts.next().flatten().unwrap_or(0);
    Some((precision, scale))
}

fn is_decimal(canonical: &str) -> bool {
    matches!(split_type(canonical).0, "DECIMAL" | "NUMERIC")
}

fn numeric_holds_integer(to: &str, bits: u32) -> bool {
    if is_decimal(to) {
        // An unparameterised decimal holds any integer.
        return decimal_parts(to)
            .map_or(true, |(precision, scale)| precision.saturating_sub(scale) >= integer_digits(bits));
    }
    match split_type(to).0 {
        "DOUBLE" | "DOUBLE PRECISION" => bits <= 32,
        _ => bits <= 16,
    }
}

fn numeric_widens(from: &str, to: &str) -> bool {
    match (is_decimal(from), is_decimal(to)) {
        (true, true) => match (decimal_parts(from), decimal_parts(to)) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some((p1, s1)), Some((p2, s2))) => {
                s2 >= s1 && p2.saturating_sub(s2) >= p1.saturating_sub(s1)
            }
        },
        (false, false) => {
            let double = |t: &str| matches!(split_type(t).0, "DOUBLE" | "DOUBLE PRECISION");
            double(to) || !double(from)
        }
        _ => false,
    }
}

fn temporal_widens(from: &str, to: &str) -> bool {
    let (from_base, _, from_suffix) = split_type(from);
    let (to_base, _, to_suffix) = split_type(to);
    fn base<'a>(b: &'a str, suffix: &str) -> &'a str {
        match (b, suffix) {
            ("TIMESTAMP", "WITH TIME ZONE") | ("TIMESTAMPTZ", _) => "TIMESTAMPTZ",
            ("TIMESTAMP" | "DATETIME", _) => "TIMESTAMP",
            ("TIME", "WITH TIME ZONE") | ("TIMETZ", _) => "TIMETZ",
            (other, _) => other,
        }
    }
    let precision_kept = match (type_length(from), type_length(to)) {
        (Some(p1), Some(p2)) => p1 <= p2,
        _ => true,
    };
    let widening = matches!(
        (base(from_base, from_suffix), base(to_base, to_suffix)),
        ("DATE", "TIMESTAMP" | "TIMESTAMPTZ")
            | ("TIMESTAMP", "TIMESTAMPTZ")
            | ("TIME", "TIMETZ")
    ) || base(from_base, from_suffix) == base(to_base, to_suffix);
    widening && precision_kept
}

fn binary_capacity(canonical: &str) -> u64 {
    match split_type(canonical).0 {
        "BINARY" | "VARBINARY" => type_length(canonical).unwrap_or(0),
        "TINYBLOB" => 255,
        "MEDIUMBLOB" => 16_777_215,
        "LONGBLOB" | "BYTEA" => u64::from(u32::MAX),
        _ => UNBOUNDED_TEXT,
    }
}

/// Dialect capability interface.
///
/// Default methods render the SQL shared by all three dialects; implementations
/// override what differs.
pub trait Provider: Send + Sync {
    /// Which provider this is.
    fn kind(&self) -> ProviderKind;

    // ----- types -----

    /// Native type for a built-in scalar.
    fn map_type(&self, scalar: ScalarType) -> String;

    /// Native type for an enum-typed field.
    fn map_enum(&self, _values: &[String]) -> String {
        "TEXT".to_string()
    }

    /// Native type for a scalar list, if the provider has array columns.
    fn list_type(&self, _element: &str) -> Option<String> {
        None
    }

    /// Native type from a `@db.Name(args)` attribute.
    fn native_type(&self, name: &str, args: &[String]) -> String {
        let base = name.to_ascii_uppercase();
        if args.is_empty() {
            self.normalize_type(&base)
        } else {
            self.normalize_type(&format!("{base}({})", args.join(",")))
        }
    }

    /// Canonical spelling of a type as reported by the catalog or written by hand.
    fn normalize_type(&self, raw: &str) -> String {
        canonical_type_text(raw)
    }

    // ----- identifiers -----

    /// Quotes an identifier.
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Column identifier form used for name comparison in the diff.
    fn normalize_identifier(&self, name: &str) -> String {
        name.to_string()
    }

    /// Table name form used for name comparison in the diff.
    fn normalize_table_name(&self, name: &str) -> String {
        self.normalize_identifier(name)
    }

    /// Bound parameter marker for the n-th (1-based) parameter.
    fn bind_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    // ----- defaults -----

    /// SQL text of a default value, or `None` when not expressed as `DEFAULT`.
    fn render_default(&self, default: &DefaultValue, column_type: &str) -> Option<String>;

    /// Parses a catalog default expression back into a [`DefaultValue`].
    fn parse_default(&self, raw: &str, column_type: &str) -> Option<DefaultValue>;

    // ----- catalog -----

    /// Catalog queries for introspection.
    fn introspection_queries(&self) -> IntrospectionQueries;

    // ----- policy -----

    /// Whether index column order counts for index equality.
    fn index_order_significant(&self) -> bool {
        false
    }

    /// How a column modification is applied.
    fn column_change_strategy(&self, from: &ColumnInfo, to: &ColumnInfo) -> ColumnChangeStrategy {
        let from_type = self.normalize_type(&from.sql_type);
        let to_type = self.normalize_type(&to.sql_type);
        if from_type == to_type
            || TypeFamily::converts_in_place(TypeFamily::of(&from_type), TypeFamily::of(&to_type))
        {
            ColumnChangeStrategy::AlterInPlace
        } else {
            ColumnChangeStrategy::DropAndAdd
        }
    }

    /// Whether `ALTER TABLE ... ADD COLUMN` can add this column directly.
    fn can_add_column_in_place(&self, _column: &ColumnInfo) -> bool {
        true
    }

    /// Whether dropped columns, key changes and foreign key changes can be
    /// applied with `ALTER TABLE`. When false the table is rebuilt.
    fn alters_constraints_in_place(&self) -> bool {
        true
    }

    /// Whether DDL runs inside a transaction.
    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    /// Whether foreign keys must be declared inside `CREATE TABLE`.
    fn inline_foreign_keys(&self) -> bool {
        false
    }

    /// Whether a single-column primary key is declared on the column itself.
    fn inline_single_primary_key(&self) -> bool {
        false
    }

    /// Whether `UNIQUE` is declared on the column itself.
    fn inline_unique(&self) -> bool {
        true
    }

    // ----- DDL -----

    /// Clause appended for autoincrement columns.
    fn autoincrement_clause(&self) -> &'static str;

    /// Trailing options after the closing parenthesis of `CREATE TABLE`.
    fn table_options(&self) -> &'static str {
        ""
    }

    /// Renders a column definition.
    fn column_definition(&self, column: &ColumnInfo, inline_primary_key: bool) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            column.sql_type
        );
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        match &column.default {
            Some(DefaultValue::Autoincrement) if !inline_primary_key => {
                sql.push_str(self.autoincrement_clause());
            }
            Some(default) => {
                if let Some(rendered) = self.render_default(default, &column.sql_type) {
                    sql.push_str(" DEFAULT ");
                    sql.push_str(&rendered);
                }
            }
            None => {}
        }
        if inline_primary_key {
            sql.push_str(" PRIMARY KEY");
            if column.is_autoincrement() {
                sql.push_str(self.autoincrement_clause());
            }
        }
        if column.unique && self.inline_unique() {
            sql.push_str(" UNIQUE");
        }
        sql
    }

    /// Conventional primary key constraint name.
    fn primary_key_name(&self, table: &str) -> String {
        format!("{table}_pkey")
    }

    /// Table-level primary key clause.
    fn primary_key_clause(&self, table: &TableInfo) -> String {
        let columns = quote_all(self, &table.primary_key());
        format!(
            "CONSTRAINT {} PRIMARY KEY ({columns})",
            self.quote_identifier(&self.primary_key_name(&table.name))
        )
    }

    /// Table-level unique clause for a column when [`Self::inline_unique`] is false.
    fn unique_column_clause(&self, table: &str, column: &str) -> String {
        format!(
            "CONSTRAINT {} UNIQUE ({})",
            self.quote_identifier(&unique_column_index_name(table, column)),
            self.quote_identifier(column)
        )
    }

    /// Foreign key clause usable inside `CREATE TABLE` or after `ADD`.
    fn foreign_key_clause(&self, fk: &ForeignKeyInfo) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            self.quote_identifier(&fk.name),
            quote_all(self, &fk.columns),
            self.quote_identifier(&fk.referenced_table),
            quote_all(self, &fk.referenced_columns),
            fk.on_delete.as_sql(),
            fk.on_update.as_sql()
        )
    }

    /// `CREATE TABLE` with the given inline foreign keys.
    fn create_table(&self, table: &TableInfo, foreign_keys: &[&ForeignKeyInfo]) -> String {
        self.create_table_named(&table.name, table, foreign_keys)
    }

    /// `CREATE TABLE` under a different name (used by table rebuilds).
    fn create_table_named(
        &self,
        name: &str,
        table: &TableInfo,
        foreign_keys: &[&ForeignKeyInfo],
    ) -> String {
        let primary_key = table.primary_key();
        let inline_pk = primary_key.len() == 1 && self.inline_single_primary_key();

        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("    {}", self.column_definition(c, inline_pk && c.primary_key)))
            .collect();

        let mut constraints = Vec::new();
        if !primary_key.is_empty() && !inline_pk {
            let mut renamed = table.clone();
            renamed.name = name.to_string();
            constraints.push(self.primary_key_clause(&renamed));
        }
        if !self.inline_unique() {
            for column in table.columns.iter().filter(|c| c.unique) {
                constraints.push(self.unique_column_clause(name, &column.name));
            }
        }
        for fk in foreign_keys {
            constraints.push(self.foreign_key_clause(fk));
        }

        let mut sql = format!("CREATE TABLE {} (\n", self.quote_identifier(name));
        sql.push_str(&columns.join(",\n"));
        if !constraints.is_empty() {
            sql.push_str(",\n\n");
            let constraints: Vec<String> =
                constraints.iter().map(|c| format!("    {c}")).collect();
            sql.push_str(&constraints.join(",\n"));
        }
        sql.push_str("\n)");
        sql.push_str(self.table_options());
        sql
    }

    /// `DROP TABLE`.
    fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(table))
    }

    /// Renames a table.
    fn rename_table(&self, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    /// `ADD COLUMN`.
    fn add_column(&self, table: &str, column: &ColumnInfo) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column, false)
        )
    }

    /// `DROP COLUMN`.
    fn drop_column(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }

    /// Statements changing a column's type, nullability and default in place.
    fn alter_column(
        &self,
        table: &str,
        from: &ColumnInfo,
        to: &ColumnInfo,
    ) -> Result<Vec<String>, GenerateError>;

    /// Renders one index column reference.
    fn index_column(&self, column: &IndexColumn) -> String {
        let mut sql = match &column.function {
            Some(function) => format!("{function}({})", self.quote_identifier(&column.name)),
            None => self.quote_identifier(&column.name),
        };
        if column.sort.is_some() {
            sql.push_str(" DESC");
        }
        sql
    }

    /// `CREATE INDEX`.
    fn create_index(&self, table: &str, index: &IndexInfo) -> String {
        let columns: Vec<String> = index.columns.iter().map(|c| self.index_column(c)).collect();
        format!(
            "CREATE {}INDEX {} ON {}({})",
            if index.unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.name),
            self.quote_identifier(table),
            columns.join(", ")
        )
    }

    /// `DROP INDEX`.
    fn drop_index(&self, table: &str, index: &IndexInfo) -> String;

    /// Adds a unique index for a column whose `unique` flag was turned on.
    fn add_unique_column(&self, table: &str, column: &str) -> String {
        format!(
            "CREATE UNIQUE INDEX {} ON {}({})",
            self.quote_identifier(&unique_column_index_name(table, column)),
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }

    /// Removes the unique index/constraint of a column.
    fn drop_unique_column(&self, table: &str, column: &str) -> Vec<String>;

    /// `ADD CONSTRAINT ... FOREIGN KEY`.
    fn add_foreign_key(&self, table: &str, fk: &ForeignKeyInfo) -> String {
        format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            self.foreign_key_clause(fk)
        )
    }

    /// Drops a foreign key constraint.
    fn drop_foreign_key(&self, table: &str, fk: &ForeignKeyInfo) -> Result<String, GenerateError>;

    /// Drops the primary key.
    fn drop_primary_key(&self, table: &str) -> Result<String, GenerateError> {
        Ok(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_identifier(table),
            self.quote_identifier(&self.primary_key_name(table))
        ))
    }

    /// Adds a primary key over the table's key columns.
    fn add_primary_key(&self, table: &TableInfo) -> Result<String, GenerateError> {
        Ok(format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(&table.name),
            self.primary_key_clause(table)
        ))
    }
}

/// Quotes and joins a list of identifiers.
pub(crate) fn quote_all<P: Provider + ?Sized, S: AsRef<str>>(provider: &P, names: &[S]) -> String {
    names
        .iter()
        .map(|n| provider.quote_identifier(n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Conventional name of the unique index backing a column's `unique` flag.
#[must_use]
pub fn unique_column_index_name(table: &str, column: &str) -> String {
    format!("{table}_{column}_key")
}

/// Quotes a string literal with doubled single quotes.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Strips surrounding single quotes and un-doubles inner quotes.
#[must_use]
pub fn unquote_literal(raw: &str) -> Option<String> {
    let inner = raw.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

/// True for an optionally signed decimal literal.
#[must_use]
pub fn is_numeric_literal(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|c| *c == '.').count() <= 1
        && digits.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Upper-cases outside single-quoted sections, collapses whitespace and drops
/// spaces after commas and around parentheses.
#[must_use]
pub fn canonical_type_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_quote = false;
    let mut pending_space = false;
    for c in raw.trim().chars() {
        if in_quote {
            out.push(c);
            if c == '\'' {
                in_quote = false;
            }
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !matches!(c, ',' | '(' | ')') && !out.ends_with([',', '(']) {
            out.push(' ');
        }
        pending_space = false;
        if c == '\'' {
            in_quote = true;
        }
        out.extend(c.to_uppercase());
    }
    out
}

/// Splits `NAME(params) suffix` into its parts.
#[must_use]
pub fn split_type(canonical: &str) -> (&str, Option<&str>, &str) {
    match (canonical.find('('), canonical.rfind(')')) {
        (Some(open), Some(close)) if close > open => (
            canonical[..open].trim_end(),
            Some(&canonical[open + 1..close]),
            canonical[close + 1..].trim_start(),
        ),
        _ => (canonical, None, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_name_and_url() {
        assert_eq!(ProviderKind::from_name("postgresql"), Some(ProviderKind::Postgres));
        assert_eq!(ProviderKind::from_name("MySQL"), Some(ProviderKind::MySql));
        assert_eq!(ProviderKind::from_name("oracle"), None);
        assert_eq!(
            ProviderKind::from_url("postgres://localhost/db"),
            Some(ProviderKind::Postgres)
        );
        assert_eq!(ProviderKind::from_url("file:./dev.db"), Some(ProviderKind::Sqlite));
        assert_eq!(ProviderKind::from_url("sqlite::memory:"), Some(ProviderKind::Sqlite));
        assert_eq!(ProviderKind::from_url("mysql://root@localhost/app"), Some(ProviderKind::MySql));
        assert_eq!(ProviderKind::from_url("redis://x"), None);
    }

    #[test]
    fn test_detect_prefers_datasource_provider() {
        let (schema, errors) = crate::parser::parse(
            "datasource db {\n  provider = \"sqlite\"\n  url = env(\"DATABASE_URL\")\n}",
        );
        assert!(errors.is_empty());
        assert_eq!(
            ProviderKind::detect(&schema, Some("postgresql://x")),
            Some(ProviderKind::Sqlite)
        );
        assert_eq!(
            ProviderKind::detect(&Schema::default(), Some("postgresql://x")),
            Some(ProviderKind::Postgres)
        );
        assert_eq!(ProviderKind::detect(&Schema::default(), None), None);
    }

    #[test]
    fn test_canonical_type_text() {
        assert_eq!(canonical_type_text("  numeric( 65, 30 ) "), "NUMERIC(65,30)");
        assert_eq!(canonical_type_text("double   precision"), "DOUBLE PRECISION");
        assert_eq!(canonical_type_text("enum('a','B c')"), "ENUM('a','B c')");
        assert_eq!(
            canonical_type_text("timestamp(3) without time zone"),
            "TIMESTAMP(3) WITHOUT TIME ZONE"
        );
    }

    #[test]
    fn test_split_type() {
        assert_eq!(split_type("VARCHAR(191)"), ("VARCHAR", Some("191"), ""));
        assert_eq!(
            split_type("TIMESTAMP(3) WITH TIME ZONE"),
            ("TIMESTAMP", Some("3"), "WITH TIME ZONE")
        );
        assert_eq!(split_type("TEXT"), ("TEXT", None, ""));
    }

    #[test]
    fn test_type_family_policy() {
        assert_eq!(TypeFamily::of("VARCHAR(191)"), TypeFamily::Text);
        assert_eq!(TypeFamily::of("TINYINT(1)"), TypeFamily::Boolean);
        assert_eq!(TypeFamily::of("DOUBLE PRECISION"), TypeFamily::Numeric);
        assert_eq!(TypeFamily::of("TIMESTAMP(3)"), TypeFamily::Temporal);
        assert_eq!(TypeFamily::of("INTEGER[]"), TypeFamily::Other);
        assert!(TypeFamily::converts_in_place(TypeFamily::Integer, TypeFamily::Numeric));
        assert!(TypeFamily::converts_in_place(TypeFamily::Json, TypeFamily::Text));
        assert!(!TypeFamily::converts_in_place(TypeFamily::Temporal, TypeFamily::Integer));
        assert!(TypeFamily::converts_in_place(TypeFamily::Binary, TypeFamily::Binary));
    }

    #[test]
    fn test_widening_types() {
        let widening = [
            ("INT", "BIGINT"),
            ("TINYINT(1)", "INT"),
            ("VARCHAR(10)", "VARCHAR(255)"),
            ("VARCHAR(191)", "TEXT"),
            ("TEXT", "LONGTEXT"),
            ("INTEGER", "DECIMAL(12,2)"),
            ("INTEGER", "NUMERIC"),
            ("DECIMAL(8,2)", "DECIMAL(10,3)"),
            ("REAL", "DOUBLE PRECISION"),
            ("DATE", "TIMESTAMP(3)"),
            ("TIMESTAMP(3)", "TIMESTAMP(6)"),
            ("ENUM('A','B')", "ENUM('A','B','C')"),
            ("BIGINT", "TEXT"),
            ("JSON", "JSONB"),
        ];
        for (from, to) in widening {
            assert!(TypeFamily::widens(from, to), "{from} -> {to}");
        }

        let narrowing = [
            ("BIGINT", "INT"),
            ("DECIMAL(10,2)", "INT"),
            ("DECIMAL(10,2)", "DECIMAL(10,4)"),
            ("TEXT", "INTEGER"),
            ("TEXT", "TIMESTAMP"),
            ("VARCHAR(255)", "VARCHAR(10)"),
            ("LONGTEXT", "TEXT"),
            ("TEXT", "UUID"),
            ("ENUM('A','B')", "ENUM('A')"),
            ("TIMESTAMP(6)", "TIMESTAMP(3)"),
            ("TIMESTAMP", "DATE"),
            ("BIGINT", "DOUBLE"),
            ("DOUBLE", "REAL"),
            ("BYTEA", "TEXT"),
        ];
        for (from, to) in narrowing {
            assert!(!TypeFamily::widens(from, to), "{from} -> {to}");
        }
    }

    #[test]
    fn test_literal_helpers() {
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(unquote_literal("'it''s'").as_deref(), Some("it's"));
        assert_eq!(unquote_literal("plain"), None);
        assert!(is_numeric_literal("-1.5"));
        assert!(is_numeric_literal("42"));
        assert!(!is_numeric_literal("1.2.3"));
        assert!(!is_numeric_literal("abc"));
        assert!(!is_numeric_literal("-"));
    }
}
