//! Remote migration store: the `palindrome_migrations` bookkeeping table.
//!
//! The table is the single source of truth for what is applied. The store
//! assumes single-writer access; a mutation observed mid-sequence (see
//! [`RemoteMigrations::revert_to`]) is a consistency violation, not
//! something to reconcile.

use crate::connection::{connect, ConnectionConfig};
use crate::executor::{DbExecutor, PgExecutor};
use crate::migration::{Migration, MigrationError, MigrationId};
use crate::transaction::with_transaction;

/// Split a migration body into individual statements on `;` boundaries.
///
/// Purely lexical: a semicolon inside a string literal or comment will
/// incorrectly split the statement. Known limitation, kept deliberately --
/// changing it would change which migration bodies are accepted.
pub(crate) fn split_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect()
}

/// Store over the bookkeeping table in the target database.
pub struct RemoteMigrations {
    executor: PgExecutor,
    config: ConnectionConfig,
}

impl RemoteMigrations {
    /// Connect to the configured database and ensure the bookkeeping table
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] if the connection or the table creation
    /// fails.
    pub fn connect(config: &ConnectionConfig) -> Result<Self, MigrationError> {
        let client = connect(config)?;
        let store = Self {
            executor: PgExecutor::new(client),
            config: config.clone(),
        };
        store.initialize()?;
        Ok(store)
    }

    /// The connection settings this store was opened with
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn initialize(&self) -> Result<(), MigrationError> {
        self.executor.execute(
            r#"
            CREATE TABLE IF NOT EXISTS palindrome_migrations (
                "index" integer NOT NULL PRIMARY KEY,
                "name" text NOT NULL,
                "apply" text NOT NULL,
                "revert" text
            )
            "#,
            &[],
        )?;
        Ok(())
    }

    /// All recorded migrations, ascending by index.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Database`] if the query fails.
    pub fn list(&self) -> Result<Vec<Migration>, MigrationError> {
        let rows = self.executor.query_all(
            r#"SELECT "index", name, apply, revert FROM palindrome_migrations ORDER BY "index""#,
            &[],
        )?;
        Ok(rows.iter().map(Migration::from_row).collect())
    }

    /// Apply a migration: run its statements and insert its bookkeeping row,
    /// all in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Database`] if any statement fails; the
    /// transaction is rolled back and no row is recorded.
    pub fn apply(&self, migration: &Migration) -> Result<(), MigrationError> {
        log::info!(
            "applying migration - index: {}, name: '{}'",
            migration.index,
            migration.name
        );

        with_transaction(&self.executor, |tx| {
            for statement in split_statements(&migration.apply) {
                tx.execute(statement, &[])?;
            }

            tx.execute(
                r#"
                INSERT INTO palindrome_migrations ("index", "name", "apply", "revert")
                VALUES ($1, $2, $3, $4)
                "#,
                &[
                    &migration.index,
                    &migration.name,
                    &migration.apply,
                    &migration.revert,
                ],
            )?;
            Ok::<(), MigrationError>(())
        })
    }

    /// Revert the most recently applied migration.
    ///
    /// Returns the identity of the new head row, or `None` when the table is
    /// empty afterwards. An empty table is a no-op that performs no
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::MissingRevert`] if the head migration has
    /// no revert body, or [`MigrationError::Database`] if execution fails.
    pub fn revert_last(&self) -> Result<Option<MigrationId>, MigrationError> {
        let migrations = self.list()?;
        let Some(latest) = migrations.last() else {
            log::info!("no migrations to revert");
            return Ok(None);
        };

        let revert = latest
            .revert
            .as_deref()
            .ok_or_else(|| MigrationError::MissingRevert(latest.id()))?;

        log::info!(
            "reverting migration - index: {}, name: '{}'",
            latest.index,
            latest.name
        );

        with_transaction(&self.executor, |tx| {
            for statement in split_statements(revert) {
                tx.execute(statement, &[])?;
            }

            tx.execute(
                r#"DELETE FROM palindrome_migrations WHERE "index" = $1"#,
                &[&latest.index],
            )?;
            Ok::<(), MigrationError>(())
        })?;

        Ok(migrations
            .iter()
            .rev()
            .nth(1)
            .map(Migration::id))
    }

    /// Revert up to `count` migrations, newest first, stopping early when no
    /// rows remain. Returns the identity of the remaining head row.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`revert_last`](Self::revert_last).
    pub fn revert_count(&self, count: usize) -> Result<Option<MigrationId>, MigrationError> {
        let mut head = None;
        for _ in 0..count {
            head = self.revert_last()?;
            if head.is_none() {
                break;
            }
        }
        Ok(head)
    }

    /// Revert migrations down to and including `target`.
    ///
    /// After every step the removed row is checked against the expected
    /// next-highest one; a mismatch means another process mutated the table
    /// and the revert halts.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::TargetNotApplied`] if `target` is not in
    /// the remote set, or [`MigrationError::HeadMismatch`] on an observed
    /// concurrent mutation.
    pub fn revert_to(&self, target: &MigrationId) -> Result<(), MigrationError> {
        let migrations = self.list()?;

        let position = migrations
            .iter()
            .position(|m| m.id() == *target)
            .ok_or_else(|| MigrationError::TargetNotApplied(target.clone()))?;

        let mut head = migrations.last().map(Migration::id);

        for expected in migrations[position..].iter().rev() {
            let expected_id = expected.id();
            if head.as_ref() != Some(&expected_id) {
                return Err(MigrationError::HeadMismatch {
                    expected: expected_id,
                    observed: head,
                });
            }
            head = self.revert_last()?;
        }

        Ok(())
    }

    /// Run `perform` against a throwaway database on the same server.
    ///
    /// A uniquely named database is created, a fresh store is opened against
    /// it, and the database is dropped afterwards on every exit path
    /// (lingering backends are terminated first).
    ///
    /// # Errors
    ///
    /// Returns the error from `perform`, or [`MigrationError`] if the
    /// database cannot be created or the store cannot connect.
    pub fn with_temporary<T>(
        &self,
        perform: impl FnOnce(RemoteMigrations) -> Result<T, MigrationError>,
    ) -> Result<T, MigrationError> {
        let name = format!(
            "{}_verify_{:08x}",
            self.config.database,
            rand::random::<u32>()
        );

        log::info!("creating temporary database '{name}'");
        self.executor
            .execute(&format!(r#"DROP DATABASE IF EXISTS "{name}""#), &[])?;
        self.executor
            .execute(&format!(r#"CREATE DATABASE "{name}""#), &[])?;

        // Teardown runs on every exit path from here, including early `?`.
        let _guard = TempDatabase {
            admin: self.executor.clone(),
            name: name.clone(),
        };

        let temporary = RemoteMigrations::connect(&self.config.with_database(&name))?;
        perform(temporary)
    }
}

/// Drop guard for a temporary verification database.
///
/// Terminates lingering backends, then drops the database. Failures are
/// logged, not propagated: teardown must never mask the primary outcome.
struct TempDatabase {
    admin: PgExecutor,
    name: String,
}

impl Drop for TempDatabase {
    fn drop(&mut self) {
        let terminated = self.admin.execute(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = $1",
            &[&self.name],
        );
        if let Err(e) = terminated {
            log::warn!("failed to terminate backends of '{}': {e}", self.name);
        }

        let dropped = self
            .admin
            .execute(&format!(r#"DROP DATABASE IF EXISTS "{}""#, self.name), &[]);
        match dropped {
            Ok(_) => log::info!("dropped temporary database '{}'", self.name),
            Err(e) => log::warn!("failed to drop temporary database '{}': {e}", self.name),
        }
    }
}
