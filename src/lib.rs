//! # Palindrome
//!
//! Reversible PostgreSQL schema migrations on the `may` runtime.
//!
//! Migrations live as ordered `.sql` files in a local directory and are
//! tracked in a `palindrome_migrations` table in the target database. The
//! [`Palindrome`] engine diffs the two sets, plans the minimal sequence of
//! reverts and applies to reach a target migration, and executes each step
//! in its own transaction.

pub mod connection;
pub mod executor;
pub mod migration;
pub mod transaction;

mod palindrome;

pub use connection::{connect, ConnectionConfig, ConnectionError, TlsMode};
pub use executor::{DbError, DbExecutor, PgExecutor};
pub use migration::{
    ConflictKind, LocalMigrations, Migration, MigrationError, MigrationId, MigrationState,
    MigrationStatus, RemoteMigrations, VerifyPhase,
};
pub use palindrome::{Palindrome, StatusFilter};
