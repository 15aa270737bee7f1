//! Structural schema diff.
//!
//! Compares a desired [`SchemaModel`](crate::model::SchemaModel) against an
//! actual one and produces a [`ChangeSet`]: the tables to create, alter and
//! drop, plus index-only changes. Renames are never inferred; a renamed table
//! or column is a drop and a create.

mod compare;
mod destructive;

use std::fmt;

use serde::Serialize;

use crate::model::{ColumnInfo, ForeignKeyInfo, IndexInfo, TableInfo};
use crate::provider::Provider;

pub use compare::{compare, compare_with};
pub use destructive::DestructiveChange;

// ================================================================
// Options
// ================================================================

/// Per-run diff settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Overrides [`Provider::index_order_significant`] when set.
    pub index_order_significant: Option<bool>,
}

impl DiffOptions {
    #[must_use]
    pub const fn with_index_order_significant(mut self, significant: bool) -> Self {
        self.index_order_significant = Some(significant);
        self
    }

    /// Effective index-order setting for `provider`.
    #[must_use]
    pub fn order_significant(&self, provider: &dyn Provider) -> bool {
        self.index_order_significant
            .unwrap_or_else(|| provider.index_order_significant())
    }
}

// ================================================================
// Change-set
// ================================================================

/// Result of comparing two schemas.
///
/// A table in `create_tables` never appears in `alter_tables` or
/// `drop_tables`, and an alteration never lists a column as both added and
/// dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    /// Tables to create, with their full definitions.
    pub create_tables: Vec<TableInfo>,
    /// Tables present on both sides with structural differences.
    pub alter_tables: Vec<TableAlteration>,
    /// Tables to drop, with their last known definitions.
    pub drop_tables: Vec<TableInfo>,
    /// Index changes on tables that are otherwise unchanged.
    pub index_changes: Vec<IndexChange>,
}

impl ChangeSet {
    /// Returns `true` when there is nothing to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create_tables.is_empty()
            && self.alter_tables.is_empty()
            && self.drop_tables.is_empty()
            && self.index_changes.is_empty()
    }

    /// Changes that can lose data, in table order.
    #[must_use]
    pub fn destructive_changes(&self, provider: &dyn Provider) -> Vec<DestructiveChange> {
        destructive::collect(self, provider)
    }

    /// Pretty-printed JSON form.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "no changes");
        }
        for table in &self.create_tables {
            writeln!(
                f,
                "create table `{}` ({} columns)",
                table.name,
                table.columns.len()
            )?;
        }
        for alteration in &self.alter_tables {
            writeln!(f, "alter table `{}`", alteration.table)?;
            for column in &alteration.added_columns {
                writeln!(f, "  add column `{}` {}", column.name, column.sql_type)?;
            }
            for column in &alteration.dropped_columns {
                writeln!(f, "  drop column `{}`", column.name)?;
            }
            for change in &alteration.modified_columns {
                writeln!(f, "  modify column `{}`: {}", change.to.name, change)?;
            }
            if let Some(pk) = &alteration.primary_key {
                writeln!(
                    f,
                    "  primary key ({}) -> ({})",
                    pk.from.join(", "),
                    pk.to.join(", ")
                )?;
            }
            for index in &alteration.dropped_indexes {
                writeln!(f, "  drop index `{}`", index.name)?;
            }
            for index in &alteration.added_indexes {
                writeln!(f, "  create index `{}`", index.name)?;
            }
            for fk in &alteration.dropped_foreign_keys {
                writeln!(f, "  drop foreign key `{}`", fk.name)?;
            }
            for fk in &alteration.added_foreign_keys {
                writeln!(f, "  add foreign key `{}` -> `{}`", fk.name, fk.referenced_table)?;
            }
        }
        for table in &self.drop_tables {
            writeln!(f, "drop table `{}`", table.name)?;
        }
        for change in &self.index_changes {
            match change {
                IndexChange::Create { table, index } => {
                    writeln!(f, "create index `{}` on `{table}`", index.name)?;
                }
                IndexChange::Drop { table, index } => {
                    writeln!(f, "drop index `{}` on `{table}`", index.name)?;
                }
            }
        }
        Ok(())
    }
}

/// Differences of one table present on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableAlteration {
    pub table: String,
    pub added_columns: Vec<ColumnInfo>,
    pub dropped_columns: Vec<ColumnInfo>,
    pub modified_columns: Vec<ColumnModification>,
    pub added_indexes: Vec<IndexInfo>,
    pub dropped_indexes: Vec<IndexInfo>,
    pub added_foreign_keys: Vec<ForeignKeyInfo>,
    pub dropped_foreign_keys: Vec<ForeignKeyInfo>,
    pub primary_key: Option<PrimaryKeyChange>,
    /// Table as it exists now.
    pub previous: TableInfo,
    /// Table as declared.
    pub desired: TableInfo,
}

impl TableAlteration {
    pub(crate) fn new(previous: &TableInfo, desired: &TableInfo) -> Self {
        Self {
            table: desired.name.clone(),
            added_columns: Vec::new(),
            dropped_columns: Vec::new(),
            modified_columns: Vec::new(),
            added_indexes: Vec::new(),
            dropped_indexes: Vec::new(),
            added_foreign_keys: Vec::new(),
            dropped_foreign_keys: Vec::new(),
            primary_key: None,
            previous: previous.clone(),
            desired: desired.clone(),
        }
    }

    /// True when nothing but indexes changed.
    #[must_use]
    pub fn is_index_only(&self) -> bool {
        self.added_columns.is_empty()
            && self.dropped_columns.is_empty()
            && self.modified_columns.is_empty()
            && self.added_foreign_keys.is_empty()
            && self.dropped_foreign_keys.is_empty()
            && self.primary_key.is_none()
    }

    /// True when there is no difference at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_index_only() && self.added_indexes.is_empty() && self.dropped_indexes.is_empty()
    }
}

/// A column present on both sides with a different definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnModification {
    pub from: ColumnInfo,
    pub to: ColumnInfo,
}

impl ColumnModification {
    #[must_use]
    pub fn type_changed(&self) -> bool {
        self.from.sql_type != self.to.sql_type
    }

    #[must_use]
    pub fn nullability_changed(&self) -> bool {
        self.from.nullable != self.to.nullable
    }

    #[must_use]
    pub fn default_changed(&self) -> bool {
        self.from.default != self.to.default
    }

    #[must_use]
    pub fn unique_changed(&self) -> bool {
        self.from.unique != self.to.unique
    }

    /// True when the column's definition (type, nullability, default)
    /// changed, as opposed to only its unique flag.
    #[must_use]
    pub fn definition_changed(&self) -> bool {
        self.type_changed() || self.nullability_changed() || self.default_changed()
    }
}

impl fmt::Display for ColumnModification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.type_changed() {
            parts.push(format!("type {} -> {}", self.from.sql_type, self.to.sql_type));
        }
        if self.nullability_changed() {
            parts.push(if self.to.nullable { "nullable" } else { "required" }.to_string());
        }
        if self.default_changed() {
            let render = |d: &Option<crate::model::DefaultValue>| {
                d.as_ref().map_or_else(|| "none".to_string(), ToString::to_string)
            };
            parts.push(format!(
                "default {} -> {}",
                render(&self.from.default),
                render(&self.to.default)
            ));
        }
        if self.unique_changed() {
            parts.push(if self.to.unique { "unique" } else { "not unique" }.to_string());
        }
        f.write_str(&parts.join(", "))
    }
}

/// Primary key columns before and after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryKeyChange {
    pub from: Vec<String>,
    pub to: Vec<String>,
}

/// An index change on an otherwise unchanged table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum IndexChange {
    Create { table: String, index: IndexInfo },
    Drop { table: String, index: IndexInfo },
}

impl IndexChange {
    /// Name of the table the index belongs to.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Create { table, .. } | Self::Drop { table, .. } => table,
        }
    }
}
