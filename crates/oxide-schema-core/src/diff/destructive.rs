//! Detection of changes that can lose data.

use std::fmt;

use serde::Serialize;

use crate::provider::{ColumnChangeStrategy, Provider, TypeFamily};

use super::ChangeSet;

/// A change that discards existing data or can fail on existing rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DestructiveChange {
    DropTable {
        table: String,
    },
    DropColumn {
        table: String,
        column: String,
    },
    /// The provider cannot convert the column in place; it is dropped and
    /// added again empty.
    RecreateColumn {
        table: String,
        column: String,
    },
    /// Type change across type families; values may not convert.
    TypeChange {
        table: String,
        column: String,
        from: String,
        to: String,
    },
    /// Nullable column becomes required; existing nulls make this fail.
    MakeRequired {
        table: String,
        column: String,
    },
    /// Required column without a default added to an existing table.
    AddRequiredColumn {
        table: String,
        column: String,
    },
}

impl fmt::Display for DestructiveChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DropTable { table } => {
                write!(f, "table `{table}` will be dropped with all its rows")
            }
            Self::DropColumn { table, column } => {
                write!(f, "column `{column}` of `{table}` will be dropped")
            }
            Self::RecreateColumn { table, column } => write!(
                f,
                "column `{column}` of `{table}` will be dropped and re-added; its values are lost"
            ),
            Self::TypeChange {
                table,
                column,
                from,
                to,
            } => write!(
                f,
                "column `{column}` of `{table}` changes type from {from} to {to}; values may not convert"
            ),
            Self::MakeRequired { table, column } => write!(
                f,
                "column `{column}` of `{table}` becomes required; the change fails if it holds NULL values"
            ),
            Self::AddRequiredColumn { table, column } => write!(
                f,
                "required column `{column}` without a default is added to `{table}`; the change fails if the table has rows"
            ),
        }
    }
}

pub(super) fn collect(changes: &ChangeSet, provider: &dyn Provider) -> Vec<DestructiveChange> {
    let mut found = Vec::new();

    for alteration in &changes.alter_tables {
        let table = &alteration.table;
        for column in &alteration.dropped_columns {
            found.push(DestructiveChange::DropColumn {
                table: table.clone(),
                column: column.name.clone(),
            });
        }
        for column in &alteration.added_columns {
            if !column.nullable && column.default.is_none() {
                found.push(DestructiveChange::AddRequiredColumn {
                    table: table.clone(),
                    column: column.name.clone(),
                });
            }
        }
        for change in &alteration.modified_columns {
            let column = change.to.name.clone();
            let strategy = provider.column_change_strategy(&change.from, &change.to);
            if change.type_changed() {
                if strategy == ColumnChangeStrategy::DropAndAdd {
                    found.push(DestructiveChange::RecreateColumn {
                        table: table.clone(),
                        column: column.clone(),
                    });
                } else if !TypeFamily::widens(&change.from.sql_type, &change.to.sql_type) {
                    found.push(DestructiveChange::TypeChange {
                        table: table.clone(),
                        column: column.clone(),
                        from: change.from.sql_type.clone(),
                        to: change.to.sql_type.clone(),
                    });
                }
            }
            if change.from.nullable && !change.to.nullable {
                found.push(DestructiveChange::MakeRequired {
                    table: table.clone(),
                    column,
                });
            }
        }
    }

    for table in &changes.drop_tables {
        found.push(DestructiveChange::DropTable {
            table: table.name.clone(),
        });
    }
    found
}
