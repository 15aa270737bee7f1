//! Development diagnostic.
//!
//! Decides what an interactive "create or apply" run should do by comparing
//! the local migration history, the ledger and the live database. History
//! checks are pure and live here; the structural check needs a database and is
//! driven by the [`MigrationManager`](crate::MigrationManager).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use oxide_schema_core::ChangeSet;
use serde::Serialize;

use crate::directory::LocalMigration;
use crate::error::DriftReason;
use crate::history::AppliedMigration;

/// What a development run should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevAction {
    /// Pending local migrations exist and the database has not drifted.
    Apply {
        /// Pending migration names, oldest first.
        pending: Vec<String>,
    },
    /// Nothing is pending but the declaration differs from the database.
    Create { changes: ChangeSet },
    /// The database cannot be explained by the local history; it has to be
    /// dropped and rebuilt from it.
    Reset { reason: DriftReason },
    /// Nothing to do.
    NoChanges,
}

/// Where a migration stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    /// On disk, not in the ledger.
    LocalOnly,
    /// On disk and in the ledger.
    Applied,
    /// In the ledger, not on disk.
    MissingLocally,
}

/// One line of [`MigrationManager::status`](crate::MigrationManager::status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub name: String,
    pub state: MigrationState,
    pub applied_at: Option<DateTime<Utc>>,
    /// `false` when the script changed after it was applied.
    pub checksum_matches: bool,
}

/// Local migrations without a ledger entry, oldest first.
#[must_use]
pub fn pending(local: &[LocalMigration], applied: &[AppliedMigration]) -> Vec<LocalMigration> {
    let mut pending: Vec<LocalMigration> = local
        .iter()
        .filter(|m| !applied.iter().any(|a| a.name == m.name))
        .cloned()
        .collect();
    pending.sort_by(|a, b| a.name.cmp(&b.name));
    pending
}

/// First disagreement between the ledger and the local history, if any.
///
/// Checked in order: ledger entries missing locally, scripts edited after
/// being applied, unapplied migrations older than the newest applied one.
#[must_use]
pub fn history_drift(
    local: &[LocalMigration],
    applied: &[AppliedMigration],
) -> Option<DriftReason> {
    let by_name: HashMap<&str, &LocalMigration> =
        local.iter().map(|m| (m.name.as_str(), m)).collect();

    for entry in applied {
        if !by_name.contains_key(entry.name.as_str()) {
            return Some(DriftReason::MissingLocally {
                migration: entry.name.clone(),
            });
        }
    }
    for entry in applied {
        if by_name
            .get(entry.name.as_str())
            .is_some_and(|m| m.checksum != entry.checksum)
        {
            return Some(DriftReason::ChecksumMismatch {
                migration: entry.name.clone(),
            });
        }
    }

    let latest_applied = applied.iter().map(|a| a.name.as_str()).max()?;
    pending(local, applied)
        .into_iter()
        .find(|m| m.name.as_str() < latest_applied)
        .map(|m| DriftReason::OutOfOrder {
            migration: m.name,
            latest_applied: latest_applied.to_string(),
        })
}

/// Merges both histories into one status list ordered by name.
#[must_use]
pub fn status(local: &[LocalMigration], applied: &[AppliedMigration]) -> Vec<MigrationStatus> {
    let mut lines: Vec<MigrationStatus> = local
        .iter()
        .map(|m| {
            let entry = applied.iter().find(|a| a.name == m.name);
            MigrationStatus {
                name: m.name.clone(),
                state: if entry.is_some() {
                    MigrationState::Applied
                } else {
                    MigrationState::LocalOnly
                },
                applied_at: entry.map(|a| a.applied_at),
                checksum_matches: entry.map_or(true, |a| a.checksum == m.checksum),
            }
        })
        .collect();
    lines.extend(
        applied
            .iter()
            .filter(|a| !local.iter().any(|m| m.name == a.name))
            .map(|a| MigrationStatus {
                name: a.name.clone(),
                state: MigrationState::MissingLocally,
                applied_at: Some(a.applied_at),
                checksum_matches: false,
            }),
    );
    lines.sort_by(|a, b| a.name.cmp(&b.name));
    lines
}
