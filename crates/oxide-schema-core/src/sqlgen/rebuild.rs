//! Table redefinition for providers without in-place constraint changes.
//!
//! The desired table is created under a temporary name, the rows of the
//! columns both definitions share are copied across, the old table is dropped
//! and the new one renamed into place. Indexes are recreated afterwards.

use crate::diff::TableAlteration;
use crate::provider::{ColumnChangeStrategy, Provider};

use super::{Statement, StatementKind};

/// Whether `alteration` has to go through a table rebuild on `provider`.
pub(crate) fn needs_rebuild(alteration: &TableAlteration, provider: &dyn Provider) -> bool {
    let constraints_changed = !alteration.dropped_columns.is_empty()
        || alteration.primary_key.is_some()
        || !alteration.added_foreign_keys.is_empty()
        || !alteration.dropped_foreign_keys.is_empty();
    if constraints_changed && !provider.alters_constraints_in_place() {
        return true;
    }
    alteration
        .added_columns
        .iter()
        .any(|c| !provider.can_add_column_in_place(c))
        || alteration.modified_columns.iter().any(|m| {
            provider.column_change_strategy(&m.from, &m.to) == ColumnChangeStrategy::RecreateTable
        })
}

/// Foreign key guards opening a block of rebuilds.
pub(crate) fn guard_start() -> Vec<Statement> {
    vec![
        Statement::new(StatementKind::RedefineTables, "PRAGMA defer_foreign_keys=ON"),
        Statement::new(StatementKind::RedefineTables, "PRAGMA foreign_keys=OFF"),
    ]
}

/// Foreign key guards closing a block of rebuilds.
pub(crate) fn guard_end() -> Vec<Statement> {
    vec![
        Statement::new(StatementKind::RedefineTables, "PRAGMA foreign_keys=ON"),
        Statement::new(StatementKind::RedefineTables, "PRAGMA defer_foreign_keys=OFF"),
    ]
}

/// Statements rebuilding one table into its desired definition.
pub(crate) fn rebuild_table(alteration: &TableAlteration, provider: &dyn Provider) -> Vec<Statement> {
    let desired = &alteration.desired;
    let previous = &alteration.previous;
    let temporary = format!("new_{}", desired.name);
    let table = provider.quote_identifier(&desired.name);
    let kind = StatementKind::RedefineTables;

    let foreign_keys: Vec<_> = desired.foreign_keys.iter().collect();
    let mut statements = vec![Statement::new(
        kind,
        provider.create_table_named(&temporary, desired, &foreign_keys),
    )];

    let shared: Vec<String> = desired
        .columns
        .iter()
        .filter(|c| previous.get_column(&c.name).is_some())
        .map(|c| provider.quote_identifier(&c.name))
        .collect();
    if !shared.is_empty() {
        let columns = shared.join(", ");
        statements.push(Statement::new(
            kind,
            format!(
                "INSERT INTO {} ({columns}) SELECT {columns} FROM {table}",
                provider.quote_identifier(&temporary)
            ),
        ));
    }

    statements.push(Statement::new(kind, provider.drop_table(&desired.name)));
    statements.push(Statement::new(
        kind,
        provider.rename_table(&temporary, &desired.name),
    ));
    for index in &desired.indexes {
        statements.push(Statement::new(
            kind,
            provider.create_index(&desired.name, index),
        ));
    }
    statements
}
