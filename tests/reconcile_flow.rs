//! End-to-end reconciliation and planning over a real migrations directory.
//!
//! The remote side is simulated with in-memory records; database-backed
//! paths are covered by the `tests-integration` package against a live
//! server.

use palindrome::migration::{reconcile, strategy, Migration, MigrationStatus};
use palindrome::{LocalMigrations, MigrationId};
use std::fs;
use tempfile::TempDir;

fn seeded_directory() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("000001_create_users.sql"),
        "CREATE TABLE users (id SERIAL PRIMARY KEY);\n-- REVERT:\nDROP TABLE users;\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("000002_create_articles.sql"),
        "CREATE TABLE articles (id SERIAL PRIMARY KEY);\n-- REVERT:\nDROP TABLE articles;\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("000003_add_flags.sql"),
        "ALTER TABLE users ADD COLUMN flags integer;\n-- REVERT:\nALTER TABLE users DROP COLUMN flags;\n",
    )
    .unwrap();
    dir
}

fn as_applied(migrations: &[Migration], count: usize) -> Vec<Migration> {
    migrations.iter().take(count).cloned().collect()
}

#[test]
fn fresh_directory_plans_every_migration() {
    let dir = seeded_directory();
    let local = LocalMigrations::new(dir.path()).unwrap().list().unwrap();
    let remote = Vec::new();

    let state = reconcile(&local, &remote);
    assert!(state.migrations.iter().all(|m| m.status.is_unapplied()));

    let plan = strategy::plan(&state, &local, &remote, &MigrationId::new(3, "add_flags")).unwrap();
    let indices: Vec<i32> = plan.applies.iter().map(|m| m.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
}

#[test]
fn partially_applied_directory_plans_the_remainder() {
    let dir = seeded_directory();
    let local = LocalMigrations::new(dir.path()).unwrap().list().unwrap();
    let remote = as_applied(&local, 1);

    let state = reconcile(&local, &remote);
    assert_eq!(state.migrations[0].status, MigrationStatus::Applied);
    assert!(state.migrations[1].status.is_unapplied());

    let plan = strategy::plan(&state, &local, &remote, &MigrationId::new(3, "add_flags")).unwrap();
    let indices: Vec<i32> = plan.applies.iter().map(|m| m.index).collect();
    assert_eq!(indices, vec![2, 3]);
}

#[test]
fn fully_applied_directory_plans_nothing() {
    let dir = seeded_directory();
    let local = LocalMigrations::new(dir.path()).unwrap().list().unwrap();
    let remote = as_applied(&local, 3);

    let state = reconcile(&local, &remote);
    let plan = strategy::plan(&state, &local, &remote, &MigrationId::new(3, "add_flags")).unwrap();
    assert!(plan.is_empty());
}

#[test]
fn downgrade_target_plans_descending_reverts() {
    let dir = seeded_directory();
    let local = LocalMigrations::new(dir.path()).unwrap().list().unwrap();
    let remote = as_applied(&local, 3);

    let state = reconcile(&local, &remote);
    let plan =
        strategy::plan(&state, &local, &remote, &MigrationId::new(1, "create_users")).unwrap();
    let indices: Vec<i32> = plan.reverts.iter().map(|m| m.index).collect();
    assert_eq!(indices, vec![3, 2]);
    assert!(plan.applies.is_empty());
}

#[test]
fn edited_applied_file_surfaces_as_conflict_and_blocks_planning() {
    let dir = seeded_directory();
    let store = LocalMigrations::new(dir.path()).unwrap();
    let remote = as_applied(&store.list().unwrap(), 2);

    // Edit an already-applied migration on disk.
    fs::write(
        dir.path().join("000002_create_articles.sql"),
        "CREATE TABLE articles (id BIGSERIAL PRIMARY KEY);\n-- REVERT:\nDROP TABLE articles;\n",
    )
    .unwrap();
    let local = store.list().unwrap();

    let state = reconcile(&local, &remote);
    assert!(state.has_conflicts());
    assert_eq!(state.first_conflict().unwrap().id.index, 2);

    assert!(strategy::plan(&state, &local, &remote, &MigrationId::new(3, "add_flags")).is_err());
}

#[test]
fn deleted_local_file_still_reports_applied() {
    let dir = seeded_directory();
    let store = LocalMigrations::new(dir.path()).unwrap();
    let remote = as_applied(&store.list().unwrap(), 3);

    fs::remove_file(dir.path().join("000003_add_flags.sql")).unwrap();
    let local = store.list().unwrap();

    let state = reconcile(&local, &remote);
    assert_eq!(state.migrations.len(), 3);
    assert_eq!(state.migrations[2].status, MigrationStatus::Applied);
    assert!(!state.has_conflicts());
}
