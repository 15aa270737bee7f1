//! Table, column, index and foreign key comparison.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::DiffError;
use crate::model::{ColumnInfo, ForeignKeyInfo, IndexColumn, IndexInfo, SchemaModel, TableInfo};
use crate::provider::Provider;

use super::{
    ChangeSet, ColumnModification, DiffOptions, IndexChange, PrimaryKeyChange, TableAlteration,
};

/// Compares `desired` against `actual` with the provider's default options.
///
/// # Errors
///
/// Returns [`DiffError`] when two tables or columns on one side collapse to
/// the same provider-normalised name.
pub fn compare(
    desired: &SchemaModel,
    actual: &SchemaModel,
    provider: &dyn Provider,
) -> Result<ChangeSet, DiffError> {
    compare_with(desired, actual, provider, &DiffOptions::default())
}

/// Compares `desired` against `actual`.
///
/// Names are matched literally after provider normalisation; there is no fuzzy
/// matching, so a rename shows up as a drop plus a create.
///
/// # Errors
///
/// See [`compare`].
pub fn compare_with(
    desired: &SchemaModel,
    actual: &SchemaModel,
    provider: &dyn Provider,
    options: &DiffOptions,
) -> Result<ChangeSet, DiffError> {
    let desired_tables = keyed_tables(desired, provider)?;
    let actual_tables = keyed_tables(actual, provider)?;
    let order_significant = options.order_significant(provider);

    let mut changes = ChangeSet::default();

    for (key, table) in &desired_tables {
        let Some(existing) = actual_tables.get(key) else {
            changes.create_tables.push((*table).clone());
            continue;
        };
        let alteration = diff_table(existing, table, provider, order_significant)?;
        if alteration.is_empty() {
            continue;
        }
        if alteration.is_index_only() {
            let name = alteration.table;
            for index in alteration.dropped_indexes {
                changes.index_changes.push(IndexChange::Drop {
                    table: name.clone(),
                    index,
                });
            }
            for index in alteration.added_indexes {
                changes.index_changes.push(IndexChange::Create {
                    table: name.clone(),
                    index,
                });
            }
        } else {
            changes.alter_tables.push(alteration);
        }
    }

    for (key, table) in &actual_tables {
        if !desired_tables.contains_key(key) {
            changes.drop_tables.push((*table).clone());
        }
    }

    debug!(
        create = changes.create_tables.len(),
        alter = changes.alter_tables.len(),
        drop = changes.drop_tables.len(),
        index = changes.index_changes.len(),
        "compared schemas"
    );
    Ok(changes)
}

// ================================================================
// Name keys
// ================================================================

fn keyed_tables<'a>(
    schema: &'a SchemaModel,
    provider: &dyn Provider,
) -> Result<BTreeMap<String, &'a TableInfo>, DiffError> {
    let mut keyed: BTreeMap<String, &TableInfo> = BTreeMap::new();
    for table in schema.tables.values() {
        let key = provider.normalize_table_name(&table.name);
        if let Some(first) = keyed.insert(key, table) {
            return Err(DiffError::AmbiguousTableName {
                provider: provider.kind(),
                first: first.name.clone(),
                second: table.name.clone(),
            });
        }
    }
    Ok(keyed)
}

fn keyed_columns<'a>(
    table: &'a TableInfo,
    provider: &dyn Provider,
) -> Result<BTreeMap<String, &'a ColumnInfo>, DiffError> {
    let mut keyed: BTreeMap<String, &ColumnInfo> = BTreeMap::new();
    for column in &table.columns {
        let key = provider.normalize_identifier(&column.name);
        if let Some(first) = keyed.insert(key, column) {
            return Err(DiffError::AmbiguousColumnName {
                provider: provider.kind(),
                table: table.name.clone(),
                first: first.name.clone(),
                second: column.name.clone(),
            });
        }
    }
    Ok(keyed)
}

// ================================================================
// Table-level diff
// ================================================================

fn diff_table(
    previous: &TableInfo,
    desired: &TableInfo,
    provider: &dyn Provider,
    order_significant: bool,
) -> Result<TableAlteration, DiffError> {
    let old_columns = keyed_columns(previous, provider)?;
    let new_columns = keyed_columns(desired, provider)?;
    let key = |name: &str| provider.normalize_identifier(name);

    let mut alteration = TableAlteration::new(previous, desired);

    for column in &desired.columns {
        match old_columns.get(&key(&column.name)) {
            None => alteration.added_columns.push(column.clone()),
            Some(existing) => {
                if let Some(change) = diff_column(existing, column, provider) {
                    alteration.modified_columns.push(change);
                }
            }
        }
    }
    for column in &previous.columns {
        if !new_columns.contains_key(&key(&column.name)) {
            alteration.dropped_columns.push(column.clone());
        }
    }

    let old_pk: Vec<String> = previous.primary_key().into_iter().map(key).collect();
    let new_pk: Vec<String> = desired.primary_key().into_iter().map(key).collect();
    if old_pk != new_pk {
        alteration.primary_key = Some(PrimaryKeyChange {
            from: previous.primary_key().iter().map(ToString::to_string).collect(),
            to: desired.primary_key().iter().map(ToString::to_string).collect(),
        });
    }

    diff_indexes(previous, desired, provider, order_significant, &mut alteration);
    diff_foreign_keys(previous, desired, provider, &mut alteration);

    Ok(alteration)
}

/// A column is modified when its type, nullability, default or unique flag
/// differ. Types are compared in their provider-normalised spelling.
fn diff_column(
    existing: &ColumnInfo,
    desired: &ColumnInfo,
    provider: &dyn Provider,
) -> Option<ColumnModification> {
    let mut from = existing.clone();
    let mut to = desired.clone();
    from.sql_type = provider.normalize_type(&from.sql_type);
    to.sql_type = provider.normalize_type(&to.sql_type);

    let change = ColumnModification { from, to };
    (change.definition_changed() || change.unique_changed()).then_some(change)
}

// ================================================================
// Index / FK diffing helpers
// ================================================================

/// Content key of an index: its columns (sorted unless order is significant)
/// and its uniqueness. Names are ignored.
fn index_key(
    index: &IndexInfo,
    provider: &dyn Provider,
    order_significant: bool,
) -> (Vec<IndexColumn>, bool) {
    let mut columns: Vec<IndexColumn> = index
        .columns
        .iter()
        .map(|c| IndexColumn {
            name: provider.normalize_identifier(&c.name),
            ..c.clone()
        })
        .collect();
    if !order_significant {
        columns.sort();
    }
    (columns, index.unique)
}

fn diff_indexes(
    previous: &TableInfo,
    desired: &TableInfo,
    provider: &dyn Provider,
    order_significant: bool,
    alteration: &mut TableAlteration,
) {
    let old_keys: Vec<_> = previous
        .indexes
        .iter()
        .map(|i| index_key(i, provider, order_significant))
        .collect();
    let new_keys: Vec<_> = desired
        .indexes
        .iter()
        .map(|i| index_key(i, provider, order_significant))
        .collect();

    for (index, key) in previous.indexes.iter().zip(&old_keys) {
        if !new_keys.contains(key) {
            alteration.dropped_indexes.push(index.clone());
        }
    }
    for (index, key) in desired.indexes.iter().zip(&new_keys) {
        if !old_keys.contains(key) {
            alteration.added_indexes.push(index.clone());
        }
    }
}

fn normalized_fk(fk: &ForeignKeyInfo, provider: &dyn Provider) -> ForeignKeyInfo {
    let names = |names: &[String]| {
        names
            .iter()
            .map(|n| provider.normalize_identifier(n))
            .collect()
    };
    ForeignKeyInfo {
        name: String::new(),
        columns: names(&fk.columns),
        referenced_table: provider.normalize_table_name(&fk.referenced_table),
        referenced_columns: names(&fk.referenced_columns),
        on_delete: fk.on_delete,
        on_update: fk.on_update,
    }
}

fn diff_foreign_keys(
    previous: &TableInfo,
    desired: &TableInfo,
    provider: &dyn Provider,
    alteration: &mut TableAlteration,
) {
    let old: Vec<_> = previous
        .foreign_keys
        .iter()
        .map(|fk| normalized_fk(fk, provider))
        .collect();
    let new: Vec<_> = desired
        .foreign_keys
        .iter()
        .map(|fk| normalized_fk(fk, provider))
        .collect();

    for (fk, normalized) in previous.foreign_keys.iter().zip(&old) {
        if !new.iter().any(|n| n.same_constraint(normalized)) {
            alteration.dropped_foreign_keys.push(fk.clone());
        }
    }
    for (fk, normalized) in desired.foreign_keys.iter().zip(&new) {
        if !old.iter().any(|o| o.same_constraint(normalized)) {
            alteration.added_foreign_keys.push(fk.clone());
        }
    }
}
