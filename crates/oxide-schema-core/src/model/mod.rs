//! Canonical schema model.
//!
//! Provider-agnostic snapshot of tables, columns, indexes and foreign keys. Both
//! the declaration (desired state) and database introspection (actual state)
//! produce this representation; the diff engine only reads it.

mod build;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use build::build_schema_model;

/// A full database schema: table name to table definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaModel {
    pub tables: BTreeMap<String, TableInfo>,
}

impl SchemaModel {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table, replacing any table with the same name.
    pub fn add_table(&mut self, table: TableInfo) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Builder-style [`Self::add_table`].
    #[must_use]
    pub fn with_table(mut self, table: TableInfo) -> Self {
        self.add_table(table);
        self
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(name)
    }

    /// Returns true if there are no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Returns the table names in sorted order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

/// A table definition. Column names are unique; columns keep declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

impl TableInfo {
    /// Creates a table with no columns.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: ColumnInfo) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds an index through [`Self::push_index`].
    #[must_use]
    pub fn index(mut self, index: IndexInfo) -> Self {
        self.push_index(index);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, foreign_key: ForeignKeyInfo) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary key column names, in column order.
    #[must_use]
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Adds an index. A plain single-column unique index is folded into the
    /// column's `unique` flag so declared and introspected schemas agree; on
    /// the sole primary key column it is redundant and dropped.
    pub fn push_index(&mut self, index: IndexInfo) {
        if index.unique && index.columns.len() == 1 && index.columns[0].is_plain() {
            let single_key = self.primary_key().len() == 1;
            let name = &index.columns[0].name;
            if let Some(column) = self.columns.iter_mut().find(|c| &c.name == name) {
                if !(column.primary_key && single_key) {
                    column.unique = true;
                }
                return;
            }
        }
        self.indexes.push(index);
    }

    /// Names of tables referenced by this table's foreign keys, excluding itself.
    pub fn referenced_tables(&self) -> impl Iterator<Item = &str> {
        self.foreign_keys
            .iter()
            .map(|fk| fk.referenced_table.as_str())
            .filter(move |t| *t != self.name)
    }
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Canonical (provider-normalised) SQL type.
    pub sql_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub default: Option<DefaultValue>,
}

impl ColumnInfo {
    /// Creates a nullable, non-key column.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            primary_key: false,
            unique: false,
            default: None,
        }
    }

    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column as (part of) the primary key. Key columns are never null.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// True when the column has a database-generated value (autoincrement).
    #[must_use]
    pub const fn is_autoincrement(&self) -> bool {
        matches!(self.default, Some(DefaultValue::Autoincrement))
    }
}

/// Column default value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DefaultValue {
    /// Database-generated sequence/identity.
    Autoincrement,
    /// Current timestamp.
    Now,
    String(String),
    /// Numeric literal, kept as written.
    Number(String),
    Boolean(bool),
    /// Raw SQL expression.
    Expression(String),
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Autoincrement => write!(f, "autoincrement()"),
            Self::Now => write!(f, "now()"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Expression(e) => write!(f, "dbgenerated(\"{e}\")"),
        }
    }
}

/// An index definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<IndexColumn>,
    pub unique: bool,
}

impl IndexInfo {
    /// Creates an index over plain columns.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: &[&str], unique: bool) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| IndexColumn::new(*c)).collect(),
            unique,
        }
    }

    /// Column names in index order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// One column reference inside an index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexColumn {
    pub name: String,
    /// `None` means the provider default (ascending).
    pub sort: Option<SortOrder>,
    /// Function wrapper such as `lower`.
    pub function: Option<String>,
}

impl IndexColumn {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sort: None,
            function: None,
        }
    }

    #[must_use]
    pub const fn descending(mut self) -> Self {
        self.sort = Some(SortOrder::Desc);
        self
    }

    #[must_use]
    pub fn wrapped(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    /// True for a bare ascending column reference.
    #[must_use]
    pub const fn is_plain(&self) -> bool {
        self.sort.is_none() && self.function.is_none()
    }
}

/// Index column sort direction. Ascending is represented by its absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    Desc,
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

impl ForeignKeyInfo {
    /// Returns true if both constraints enforce the same rule, ignoring names.
    #[must_use]
    pub fn same_constraint(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.referenced_table == other.referenced_table
            && self.referenced_columns == other.referenced_columns
            && self.on_delete == other.on_delete
            && self.on_update == other.on_update
    }
}

/// Referential action for `ON DELETE` / `ON UPDATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferentialAction {
    Cascade,
    Restrict,
    NoAction,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    /// Returns the SQL spelling.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses the SQL spelling (case-insensitive).
    #[must_use]
    pub fn from_sql(text: &str) -> Option<Self> {
        Some(match text.trim().to_ascii_uppercase().as_str() {
            "CASCADE" => Self::Cascade,
            "RESTRICT" => Self::Restrict,
            "NO ACTION" => Self::NoAction,
            "SET NULL" => Self::SetNull,
            "SET DEFAULT" => Self::SetDefault,
            _ => return None,
        })
    }

    /// Parses the declaration spelling (`Cascade`, `SetNull`, ...).
    #[must_use]
    pub fn from_declaration(name: &str) -> Option<Self> {
        Some(match name {
            "Cascade" => Self::Cascade,
            "Restrict" => Self::Restrict,
            "NoAction" => Self::NoAction,
            "SetNull" => Self::SetNull,
            "SetDefault" => Self::SetDefault,
            _ => return None,
        })
    }
}
