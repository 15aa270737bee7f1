//! SQL generation from a [`ChangeSet`].
//!
//! Statements are emitted in a fixed phase order so that every statement only
//! depends on objects that already exist:
//!
//! 1. drop removed foreign keys
//! 2. drop removed indexes
//! 3. create tables (referenced tables first, cycle edges deferred)
//! 4. alter tables (in place, or by rebuilding the table)
//! 5. drop tables (dependents first)
//! 6. create indexes
//! 7. add deferred and new foreign keys

mod order;
mod rebuild;
mod split;

use std::fmt;

use tracing::debug;

use crate::diff::{ChangeSet, IndexChange, TableAlteration};
use crate::error::GenerateError;
use crate::provider::{ColumnChangeStrategy, Provider};

pub use split::split_statements;

/// Category of a generated statement, rendered as its leading comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    DropForeignKey,
    DropIndex,
    CreateTable,
    AlterTable,
    RedefineTables,
    DropTable,
    CreateIndex,
    AddForeignKey,
}

impl StatementKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DropForeignKey => "DropForeignKey",
            Self::DropIndex => "DropIndex",
            Self::CreateTable => "CreateTable",
            Self::AlterTable => "AlterTable",
            Self::RedefineTables => "RedefineTables",
            Self::DropTable => "DropTable",
            Self::CreateIndex => "CreateIndex",
            Self::AddForeignKey => "AddForeignKey",
        }
    }
}

/// One generated SQL statement, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: StatementKind,
    pub sql: String,
}

impl Statement {
    #[must_use]
    pub fn new(kind: StatementKind, sql: impl Into<String>) -> Self {
        Self {
            kind,
            sql: sql.into(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-- {}\n{};\n", self.kind.label(), self.sql)
    }
}

/// Renders `changes` as a SQL script. An empty change-set yields an empty
/// string.
///
/// # Errors
///
/// Returns [`GenerateError`] when the provider cannot express a change.
pub fn generate(changes: &ChangeSet, provider: &dyn Provider) -> Result<String, GenerateError> {
    let statements = generate_statements(changes, provider)?;
    Ok(statements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Renders `changes` as an ordered list of statements.
///
/// # Errors
///
/// See [`generate`].
pub fn generate_statements(
    changes: &ChangeSet,
    provider: &dyn Provider,
) -> Result<Vec<Statement>, GenerateError> {
    let mut alterations: Vec<&TableAlteration> = changes.alter_tables.iter().collect();
    alterations.sort_by(|a, b| a.table.cmp(&b.table));
    let (rebuilt, in_place): (Vec<&TableAlteration>, Vec<&TableAlteration>) = alterations
        .into_iter()
        .partition(|a| rebuild::needs_rebuild(a, provider));

    let creation = order::creation_order(&changes.create_tables);
    let removal = order::removal_order(&changes.drop_tables);
    let mut out = Vec::new();

    // ---- 1. Drop foreign keys ----------------------------------
    for alteration in &in_place {
        for fk in &alteration.dropped_foreign_keys {
            out.push(Statement::new(
                StatementKind::DropForeignKey,
                provider.drop_foreign_key(&alteration.table, fk)?,
            ));
        }
    }
    if provider.alters_constraints_in_place() {
        for (table, fk) in &removal.broken {
            out.push(Statement::new(
                StatementKind::DropForeignKey,
                provider.drop_foreign_key(table, fk)?,
            ));
        }
    }

    // ---- 2. Drop indexes ---------------------------------------
    for alteration in &in_place {
        for index in &alteration.dropped_indexes {
            out.push(Statement::new(
                StatementKind::DropIndex,
                provider.drop_index(&alteration.table, index),
            ));
        }
    }
    for change in &changes.index_changes {
        if let IndexChange::Drop { table, index } = change {
            out.push(Statement::new(
                StatementKind::DropIndex,
                provider.drop_index(table, index),
            ));
        }
    }

    // ---- 3. Create tables --------------------------------------
    for table in &creation.order {
        let foreign_keys = if provider.inline_foreign_keys() {
            table.foreign_keys.iter().collect()
        } else {
            creation.inline_foreign_keys(table)
        };
        out.push(Statement::new(
            StatementKind::CreateTable,
            provider.create_table(table, &foreign_keys),
        ));
    }

    // ---- 4. Alter tables ---------------------------------------
    for alteration in &in_place {
        alter_in_place(alteration, provider, &mut out)?;
    }
    if !rebuilt.is_empty() {
        out.extend(rebuild::guard_start());
        for alteration in &rebuilt {
            debug!(table = %alteration.table, "redefining table");
            out.extend(rebuild::rebuild_table(alteration, provider));
        }
        out.extend(rebuild::guard_end());
    }

    // ---- 5. Drop tables ----------------------------------------
    for table in &removal.order {
        out.push(Statement::new(
            StatementKind::DropTable,
            provider.drop_table(&table.name),
        ));
    }

    // ---- 6. Create indexes -------------------------------------
    for table in &creation.order {
        for index in &table.indexes {
            out.push(Statement::new(
                StatementKind::CreateIndex,
                provider.create_index(&table.name, index),
            ));
        }
    }
    for alteration in &in_place {
        for index in &alteration.added_indexes {
            out.push(Statement::new(
                StatementKind::CreateIndex,
                provider.create_index(&alteration.table, index),
            ));
        }
    }
    for change in &changes.index_changes {
        if let IndexChange::Create { table, index } = change {
            out.push(Statement::new(
                StatementKind::CreateIndex,
                provider.create_index(table, index),
            ));
        }
    }

    // ---- 7. Add foreign keys -----------------------------------
    if !provider.inline_foreign_keys() {
        for (table, fk) in &creation.deferred {
            out.push(Statement::new(
                StatementKind::AddForeignKey,
                provider.add_foreign_key(table, fk),
            ));
        }
    }
    for alteration in &in_place {
        for fk in &alteration.added_foreign_keys {
            out.push(Statement::new(
                StatementKind::AddForeignKey,
                provider.add_foreign_key(&alteration.table, fk),
            ));
        }
    }

    debug!(
        provider = %provider.kind(),
        statements = out.len(),
        "generated migration statements"
    );
    Ok(out)
}

/// Column, key and constraint changes applied with `ALTER TABLE`.
fn alter_in_place(
    alteration: &TableAlteration,
    provider: &dyn Provider,
    out: &mut Vec<Statement>,
) -> Result<(), GenerateError> {
    let table = alteration.table.as_str();
    let mut push = |sql: String| out.push(Statement::new(StatementKind::AlterTable, sql));

    let key_change = alteration.primary_key.as_ref();
    if key_change.is_some_and(|pk| !pk.from.is_empty()) {
        push(provider.drop_primary_key(table)?);
    }

    for column in &alteration.added_columns {
        push(provider.add_column(table, column));
        if column.unique && !provider.inline_unique() {
            push(provider.add_unique_column(table, &column.name));
        }
    }

    for change in &alteration.modified_columns {
        match provider.column_change_strategy(&change.from, &change.to) {
            ColumnChangeStrategy::DropAndAdd => {
                push(provider.drop_column(table, &change.from.name));
                push(provider.add_column(table, &change.to));
                if change.to.unique && !provider.inline_unique() {
                    push(provider.add_unique_column(table, &change.to.name));
                }
            }
            ColumnChangeStrategy::AlterInPlace | ColumnChangeStrategy::RecreateTable => {
                if change.definition_changed() {
                    for sql in provider.alter_column(table, &change.from, &change.to)? {
                        push(sql);
                    }
                }
                if change.unique_changed() {
                    if change.to.unique {
                        push(provider.add_unique_column(table, &change.to.name));
                    } else {
                        for sql in provider.drop_unique_column(table, &change.to.name) {
                            push(sql);
                        }
                    }
                }
            }
        }
    }

    for column in &alteration.dropped_columns {
        push(provider.drop_column(table, &column.name));
    }

    if key_change.is_some_and(|pk| !pk.to.is_empty()) {
        push(provider.add_primary_key(&alteration.desired)?);
    }
    Ok(())
}
