//! Migration system for Palindrome
//!
//! This module provides the pieces the [`Palindrome`](crate::Palindrome)
//! engine composes:
//! - Migration identity and record types, with the on-disk file format
//! - Local store over a directory of `.sql` files
//! - Remote store over the `palindrome_migrations` bookkeeping table
//! - Reconciliation of the two sets into a per-migration status
//! - Strategy planning (ordered reverts, then ordered applies)

pub mod error;
pub mod id;
pub mod local;
pub mod record;
pub mod remote;
pub mod state;
pub mod strategy;

pub use error::{MigrationError, VerifyPhase};
pub use id::MigrationId;
pub use local::LocalMigrations;
pub use record::{Migration, REVERT_SEPARATOR};
pub use remote::RemoteMigrations;
pub use state::{
    reconcile, ConflictKind, MigrationState, MigrationStatus, ReconciledMigration,
};
pub use strategy::MigrationStrategy;
