//! The orchestration engine: state, migrate, revert-all, verify.

use crate::connection::ConnectionConfig;
use crate::migration::error::VerifyPhase;
use crate::migration::{
    reconcile, strategy, LocalMigrations, MigrationError, MigrationId, MigrationState,
    RemoteMigrations,
};

/// Narrow a state listing to one side of the applied/pending divide.
///
/// `Pending` covers everything not cleanly applied, conflicts included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Applied,
    Pending,
}

/// Composes the local and remote stores into the migration engine.
pub struct Palindrome {
    remote: RemoteMigrations,
    pub local: LocalMigrations,
}

impl Palindrome {
    /// Build an engine from already-opened stores
    pub fn new(remote: RemoteMigrations, local: LocalMigrations) -> Self {
        Self { remote, local }
    }

    /// Connect to the database and open the migrations directory.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] if the directory is missing or the
    /// database is unreachable.
    pub fn connect(
        config: &ConnectionConfig,
        migrations_dir: &str,
    ) -> Result<Self, MigrationError> {
        let remote = RemoteMigrations::connect(config)?;
        let local = LocalMigrations::new(migrations_dir)?;
        Ok(Self::new(remote, local))
    }

    /// Reconcile fresh local and remote listings into the current state.
    ///
    /// Recomputed on every call; nothing is cached, since either side may
    /// have changed in the meantime.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] if either listing fails.
    pub fn state(&self, filter: Option<StatusFilter>) -> Result<MigrationState, MigrationError> {
        let local = self.local.list()?;
        let remote = self.remote.list()?;

        let mut state = reconcile(&local, &remote);

        if let Some(filter) = filter {
            state.migrations.retain(|m| match filter {
                StatusFilter::Applied => m.status.is_applied(),
                StatusFilter::Pending => !m.status.is_applied(),
            });
        }

        Ok(state)
    }

    /// Move the database to `target`: compute the strategy, execute the
    /// reverts (highest first), then the applies (lowest first).
    ///
    /// A no-op strategy returns without touching the database.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] from planning or from any failed step;
    /// steps already executed stay committed.
    pub fn migrate(&self, target: &MigrationId) -> Result<(), MigrationError> {
        let state = self.state(None)?;
        let local = self.local.list()?;
        let remote = self.remote.list()?;

        let plan = strategy::plan(&state, &local, &remote, target)?;
        if plan.is_empty() {
            return Ok(());
        }

        for migration in &plan.reverts {
            self.remote.revert_to(&migration.id())?;
        }

        for migration in &plan.applies {
            self.remote.apply(migration)?;
        }

        Ok(())
    }

    /// Revert every applied migration, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] if any revert fails.
    pub fn revert_all(&self) -> Result<(), MigrationError> {
        let count = self.remote.list()?.len();
        self.remote.revert_count(count)?;
        Ok(())
    }

    /// Revert migrations down to and including `target`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] if `target` is not applied or a step fails.
    pub fn revert_to(&self, target: &MigrationId) -> Result<(), MigrationError> {
        self.remote.revert_to(target)
    }

    /// Check that every local migration applies and reverts cleanly.
    ///
    /// Runs against a throwaway database: for each migration in ascending
    /// order, migrate up to it, assert it reports `Applied`, revert one
    /// step, assert it reports `Unapplied`. Aborts on the first failed
    /// assertion; the temporary database is dropped regardless.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Verification`] naming the migration and
    /// phase that failed, or any underlying store error.
    pub fn verify(&self) -> Result<(), MigrationError> {
        let migrations = self.local.list()?;

        self.remote.with_temporary(|temporary_remote| {
            log::info!(
                "verifying migrations in '{}'",
                temporary_remote.config().database
            );
            let palindrome = Palindrome::new(temporary_remote, self.local.clone());

            for migration in &migrations {
                let id = migration.id();
                log::info!("verifying migration: {} - {}", migration.index, migration.name);

                palindrome.migrate(&id)?;
                let state = palindrome.state(None)?;
                let applied = state
                    .migrations
                    .iter()
                    .find(|m| m.id == id)
                    .is_some_and(|m| m.status.is_applied());
                if !applied {
                    return Err(MigrationError::Verification {
                        id,
                        phase: VerifyPhase::Apply,
                    });
                }

                palindrome.remote.revert_last()?;
                let state = palindrome.state(None)?;
                let unapplied = state
                    .migrations
                    .iter()
                    .find(|m| m.id == id)
                    .is_some_and(|m| m.status.is_unapplied());
                if !unapplied {
                    return Err(MigrationError::Verification {
                        id,
                        phase: VerifyPhase::Revert,
                    });
                }
            }

            log::info!("all migrations verified successfully");
            Ok(())
        })
    }
}
