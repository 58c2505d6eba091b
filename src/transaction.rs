//! Transaction support.
//!
//! A [`Transaction`] is a plain `BEGIN`/`COMMIT`/`ROLLBACK` issued through
//! the shared client handle. Migration apply/revert steps each run inside
//! one, so a failing statement leaves the database and the bookkeeping table
//! untouched together.

use crate::executor::{DbError, DbExecutor};
use may_postgres::types::ToSql;
use may_postgres::{Client, Row};

/// A database transaction.
///
/// Commit and rollback consume the transaction; a dropped, unfinished
/// transaction is rolled back.
pub struct Transaction {
    client: Client,
    closed: bool,
}

impl Transaction {
    /// Start a new transaction on the given client
    pub(crate) fn begin(client: Client) -> Result<Self, DbError> {
        client.execute("BEGIN", &[])?;
        Ok(Self {
            client,
            closed: false,
        })
    }

    /// Commit the transaction
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the `COMMIT` statement fails.
    pub fn commit(mut self) -> Result<(), DbError> {
        self.client.execute("COMMIT", &[])?;
        self.closed = true;
        Ok(())
    }

    /// Rollback the transaction, discarding all changes made within it
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the `ROLLBACK` statement fails.
    pub fn rollback(mut self) -> Result<(), DbError> {
        self.client.execute("ROLLBACK", &[])?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.client.execute("ROLLBACK", &[]) {
                log::warn!("failed to roll back abandoned transaction: {e}");
            }
        }
    }
}

impl DbExecutor for Transaction {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, DbError> {
        self.client.execute(query, params).map_err(DbError::from)
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, DbError> {
        self.client.query(query, params).map_err(DbError::from)
    }
}

/// Run `f` inside a transaction, committing on success and rolling back on
/// failure.
///
/// # Errors
///
/// Returns the error produced by `f`, or a [`DbError`] from `BEGIN`/`COMMIT`.
pub fn with_transaction<T, E>(
    executor: &crate::executor::PgExecutor,
    f: impl FnOnce(&Transaction) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<DbError>,
{
    let transaction = executor.begin()?;
    match f(&transaction) {
        Ok(value) => {
            transaction.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = transaction.rollback() {
                log::warn!("rollback failed after transaction error: {rollback_err}");
            }
            Err(e)
        }
    }
}
