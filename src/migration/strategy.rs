//! Strategy planning: which migrations to revert and which to apply to
//! reach a target.

use crate::migration::{Migration, MigrationError, MigrationId, MigrationState};
use std::cmp::Reverse;

/// An ordered plan: reverts run first (highest index first), then applies
/// (lowest index first). At most one of the two lists is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStrategy {
    pub applies: Vec<Migration>,
    pub reverts: Vec<Migration>,
}

impl MigrationStrategy {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.applies.is_empty() && self.reverts.is_empty()
    }
}

/// Compute the strategy to move the remote set to `target`.
///
/// Preconditioned on a conflict-free state; the caller checks
/// `state.has_conflicts()` first and conflicts here are rejected rather
/// than resolved.
///
/// # Errors
///
/// Returns [`MigrationError::ConflictsExist`] if the reconciled state has
/// conflicts, or [`MigrationError::TargetNotFound`] if `target`'s index does
/// not exist among the local migrations.
pub fn plan(
    state: &MigrationState,
    local: &[Migration],
    remote: &[Migration],
    target: &MigrationId,
) -> Result<MigrationStrategy, MigrationError> {
    if state.has_conflicts() {
        return Err(MigrationError::ConflictsExist);
    }

    let target = local
        .iter()
        .find(|m| m.index == target.index)
        .ok_or_else(|| MigrationError::TargetNotFound(target.clone()))?;

    let latest_applied = remote.iter().map(|m| m.index).max();

    // Target ahead of (or nothing) applied: apply up to and including it.
    if latest_applied.is_none() || target.index > latest_applied.unwrap_or(0) {
        let floor = latest_applied.unwrap_or(0);
        let mut applies: Vec<Migration> = local
            .iter()
            .filter(|m| m.index > floor && m.index <= target.index)
            .cloned()
            .collect();
        applies.sort_by_key(|m| m.index);

        return Ok(MigrationStrategy {
            applies,
            reverts: Vec::new(),
        });
    }

    // Target is the latest applied migration: nothing to do.
    if Some(target.index) == latest_applied {
        log::info!("already at migration {} - {}", target.index, target.name);
        return Ok(MigrationStrategy {
            applies: Vec::new(),
            reverts: Vec::new(),
        });
    }

    // Target is behind the latest applied: revert everything above it.
    let mut reverts: Vec<Migration> = remote
        .iter()
        .filter(|m| m.index > target.index)
        .cloned()
        .collect();
    reverts.sort_by_key(|m| Reverse(m.index));

    Ok(MigrationStrategy {
        applies: Vec::new(),
        reverts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::state::reconcile;

    fn migration(index: i32, name: &str) -> Migration {
        Migration {
            index,
            name: name.to_string(),
            apply: format!("SELECT {index};"),
            revert: Some(format!("SELECT -{index};")),
        }
    }

    fn set(indices: &[i32]) -> Vec<Migration> {
        indices
            .iter()
            .map(|&i| migration(i, &format!("m{i}")))
            .collect()
    }

    #[test]
    fn nothing_applied_plans_applies_up_to_target() {
        let local = set(&[1, 2, 3]);
        let remote = Vec::new();
        let state = reconcile(&local, &remote);

        let strategy = plan(&state, &local, &remote, &MigrationId::new(2, "m2")).unwrap();
        let indices: Vec<i32> = strategy.applies.iter().map(|m| m.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert!(strategy.reverts.is_empty());
    }

    #[test]
    fn target_ahead_plans_only_the_gap() {
        let local = set(&[1, 2, 3, 4]);
        let remote = set(&[1, 2]);
        let state = reconcile(&local, &remote);

        let strategy = plan(&state, &local, &remote, &MigrationId::new(4, "m4")).unwrap();
        let indices: Vec<i32> = strategy.applies.iter().map(|m| m.index).collect();
        assert_eq!(indices, vec![3, 4]);
    }

    #[test]
    fn target_at_head_is_a_no_op() {
        let local = set(&[1, 2]);
        let remote = set(&[1, 2]);
        let state = reconcile(&local, &remote);

        let strategy = plan(&state, &local, &remote, &MigrationId::new(2, "m2")).unwrap();
        assert!(strategy.is_empty());
    }

    #[test]
    fn target_behind_plans_descending_reverts() {
        let local = set(&[1, 2, 3]);
        let remote = set(&[1, 2, 3]);
        let state = reconcile(&local, &remote);

        let strategy = plan(&state, &local, &remote, &MigrationId::new(1, "m1")).unwrap();
        let indices: Vec<i32> = strategy.reverts.iter().map(|m| m.index).collect();
        assert_eq!(indices, vec![3, 2]);
        assert!(strategy.applies.is_empty());
    }

    #[test]
    fn never_both_applies_and_reverts() {
        let local = set(&[1, 2, 3, 4, 5]);
        for applied in [&[][..], &[1][..], &[1, 2, 3][..], &[1, 2, 3, 4, 5][..]] {
            let remote = set(applied);
            let state = reconcile(&local, &remote);
            for target in 1..=5 {
                let strategy =
                    plan(&state, &local, &remote, &MigrationId::new(target, "x")).unwrap();
                assert!(
                    strategy.applies.is_empty() || strategy.reverts.is_empty(),
                    "both lists non-empty for applied={applied:?} target={target}"
                );
            }
        }
    }

    #[test]
    fn unknown_target_index_is_an_error() {
        let local = set(&[1]);
        let remote = Vec::new();
        let state = reconcile(&local, &remote);

        assert!(matches!(
            plan(&state, &local, &remote, &MigrationId::new(9, "missing")),
            Err(MigrationError::TargetNotFound(_))
        ));
    }

    #[test]
    fn comparison_is_by_index_not_name() {
        let local = set(&[1, 2]);
        let remote = set(&[1]);
        let state = reconcile(&local, &remote);

        // Name in the target id does not have to match the local name.
        let strategy = plan(&state, &local, &remote, &MigrationId::new(2, "other")).unwrap();
        assert_eq!(strategy.applies.len(), 1);
        assert_eq!(strategy.applies[0].index, 2);
    }

    #[test]
    fn planning_with_conflicts_is_rejected() {
        let local = vec![migration(1, "renamed")];
        let mut remote = vec![migration(1, "m1")];
        remote[0].apply = "DIFFERENT".to_string();
        let state = reconcile(&local, &remote);
        assert!(state.has_conflicts());

        assert!(matches!(
            plan(&state, &local, &remote, &MigrationId::new(1, "m1")),
            Err(MigrationError::ConflictsExist)
        ));
    }
}
