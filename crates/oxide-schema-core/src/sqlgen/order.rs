//! Foreign key dependency ordering for table creation and removal.
//!
//! Both orders are deterministic: among tables that are ready, names are taken
//! in sorted order, and a cycle is broken at the smallest remaining name.

use std::collections::BTreeSet;

use crate::model::{ForeignKeyInfo, TableInfo};

/// Creation order plus the foreign keys that cannot be declared inline.
#[derive(Debug)]
pub(crate) struct CreationPlan<'a> {
    pub order: Vec<&'a TableInfo>,
    /// `(table, constraint)` pairs added once every table exists.
    pub deferred: Vec<(&'a str, &'a ForeignKeyInfo)>,
}

impl CreationPlan<'_> {
    /// Foreign keys of `table` that can be declared in its `CREATE TABLE`.
    pub fn inline_foreign_keys<'t>(&self, table: &'t TableInfo) -> Vec<&'t ForeignKeyInfo> {
        table
            .foreign_keys
            .iter()
            .filter(|fk| {
                !self
                    .deferred
                    .iter()
                    .any(|(name, deferred)| *name == table.name && *deferred == *fk)
            })
            .collect()
    }
}

/// Orders `tables` so referenced tables come first.
pub(crate) fn creation_order(tables: &[TableInfo]) -> CreationPlan<'_> {
    let mut remaining: Vec<&TableInfo> = tables.iter().collect();
    remaining.sort_by(|a, b| a.name.cmp(&b.name));
    let mut created: BTreeSet<&str> = BTreeSet::new();
    let mut plan = CreationPlan {
        order: Vec::with_capacity(tables.len()),
        deferred: Vec::new(),
    };

    while !remaining.is_empty() {
        let pending: BTreeSet<&str> = remaining.iter().map(|t| t.name.as_str()).collect();
        let ready = remaining
            .iter()
            .position(|t| t.referenced_tables().all(|r| !pending.contains(r) || created.contains(r)));

        let table = match ready {
            Some(at) => remaining.remove(at),
            None => {
                // Cycle: take the smallest name and defer its edges into the
                // tables that do not exist yet.
                let table = remaining.remove(0);
                for fk in &table.foreign_keys {
                    let target = fk.referenced_table.as_str();
                    if target != table.name && pending.contains(target) {
                        plan.deferred.push((table.name.as_str(), fk));
                    }
                }
                table
            }
        };
        created.insert(table.name.as_str());
        plan.order.push(table);
    }
    plan
}

/// Removal order plus the constraints that must be dropped first.
#[derive(Debug)]
pub(crate) struct RemovalPlan<'a> {
    pub order: Vec<&'a TableInfo>,
    /// `(table, constraint)` pairs dropped before any table.
    pub broken: Vec<(&'a str, &'a ForeignKeyInfo)>,
}

/// Orders `tables` so tables that reference others are dropped first.
pub(crate) fn removal_order(tables: &[TableInfo]) -> RemovalPlan<'_> {
    let mut remaining: Vec<&TableInfo> = tables.iter().collect();
    remaining.sort_by(|a, b| a.name.cmp(&b.name));
    let mut plan = RemovalPlan {
        order: Vec::with_capacity(tables.len()),
        broken: Vec::new(),
    };

    while !remaining.is_empty() {
        let ready = remaining
            .iter()
            .position(|t| !is_referenced(&t.name, &remaining));

        let table = match ready {
            Some(at) => remaining.remove(at),
            None => {
                let table = remaining.remove(0);
                for other in &remaining {
                    for fk in &other.foreign_keys {
                        if fk.referenced_table == table.name {
                            plan.broken.push((other.name.as_str(), fk));
                        }
                    }
                }
                table
            }
        };
        plan.order.push(table);
    }
    plan
}

fn is_referenced(name: &str, tables: &[&TableInfo]) -> bool {
    tables
        .iter()
        .any(|t| t.name != name && t.referenced_tables().any(|r| r == name))
}
