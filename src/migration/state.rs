//! Reconciled migration state: local files diffed against remote records.

use crate::migration::{Migration, MigrationId};
use std::collections::BTreeMap;
use std::fmt;

/// What differs between the local and remote copy of a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The apply SQL differs
    ApplyChanged,
    /// The apply SQL matches but the name differs
    NameChanged,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::ApplyChanged => write!(f, "apply changed"),
            ConflictKind::NameChanged => write!(f, "name changed"),
        }
    }
}

/// Status of a single migration after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStatus {
    Applied,
    Unapplied,
    Conflict(ConflictKind),
}

impl MigrationStatus {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, MigrationStatus::Applied)
    }

    #[must_use]
    pub fn is_unapplied(&self) -> bool {
        matches!(self, MigrationStatus::Unapplied)
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, MigrationStatus::Conflict(_))
    }
}

/// One reconciled migration: identity plus classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledMigration {
    pub id: MigrationId,
    pub status: MigrationStatus,
}

/// The reconciled sequence, ascending by index, covering the union of
/// indices present locally and remotely.
///
/// Derived, never stored: either side may change between calls, so the state
/// is recomputed from fresh listings every time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationState {
    pub migrations: Vec<ReconciledMigration>,
}

impl MigrationState {
    #[must_use]
    pub fn has_applied(&self) -> bool {
        self.migrations.iter().any(|m| m.status.is_applied())
    }

    #[must_use]
    pub fn has_unapplied(&self) -> bool {
        self.migrations.iter().any(|m| m.status.is_unapplied())
    }

    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        self.migrations.iter().any(|m| m.status.is_conflict())
    }

    /// First conflicting entry, if any. The migrate flow reverts from here.
    #[must_use]
    pub fn first_conflict(&self) -> Option<&ReconciledMigration> {
        self.migrations.iter().find(|m| m.status.is_conflict())
    }

    /// Tree-style listing, one line per migration:
    ///
    /// ```text
    /// ┣━[x] 001 - create_users
    /// ┗━[ ] 002 - create_articles
    /// ```
    #[must_use]
    pub fn formatted(&self) -> String {
        let mut lines = Vec::with_capacity(self.migrations.len());

        for (position, migration) in self.migrations.iter().enumerate() {
            let is_last = position == self.migrations.len() - 1;
            let prefix = if is_last { "┗━" } else { "┣━" };

            let line = match migration.status {
                MigrationStatus::Applied => {
                    format!("{prefix}[x] {:03} - {}", migration.id.index, migration.id.name)
                }
                MigrationStatus::Unapplied => {
                    format!("{prefix}[ ] {:03} - {}", migration.id.index, migration.id.name)
                }
                MigrationStatus::Conflict(kind) => {
                    format!(
                        "{prefix}[!] {:03} - {} => {kind}",
                        migration.id.index, migration.id.name
                    )
                }
            };
            lines.push(line);
        }

        lines.join("\n")
    }
}

/// Diff the local migration list against the remote one.
///
/// Total function: absence on either side is a valid case, never an error.
/// A migration present on both sides is `Applied` only when both the apply
/// body and the name match; a body difference outranks a name difference.
/// A remote-only migration is still `Applied` even if its local file was
/// deleted.
#[must_use]
pub fn reconcile(local: &[Migration], remote: &[Migration]) -> MigrationState {
    let local_by_index: BTreeMap<i32, &Migration> =
        local.iter().map(|m| (m.index, m)).collect();
    let remote_by_index: BTreeMap<i32, &Migration> =
        remote.iter().map(|m| (m.index, m)).collect();

    let mut indices: Vec<i32> = local_by_index
        .keys()
        .chain(remote_by_index.keys())
        .copied()
        .collect();
    indices.sort_unstable();
    indices.dedup();

    let migrations = indices
        .into_iter()
        .map(|index| {
            match (local_by_index.get(&index), remote_by_index.get(&index)) {
                (Some(local), Some(remote)) => {
                    let status = if local.apply != remote.apply {
                        MigrationStatus::Conflict(ConflictKind::ApplyChanged)
                    } else if local.name != remote.name {
                        MigrationStatus::Conflict(ConflictKind::NameChanged)
                    } else {
                        MigrationStatus::Applied
                    };
                    ReconciledMigration {
                        id: local.id(),
                        status,
                    }
                }
                (None, Some(remote)) => ReconciledMigration {
                    id: remote.id(),
                    status: MigrationStatus::Applied,
                },
                (Some(local), None) => ReconciledMigration {
                    id: local.id(),
                    status: MigrationStatus::Unapplied,
                },
                (None, None) => unreachable!("index came from one of the maps"),
            }
        })
        .collect();

    MigrationState { migrations }
}
