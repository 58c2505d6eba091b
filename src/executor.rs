//! `DbExecutor` - abstracts statement execution over `may_postgres`.
//!
//! Both the plain [`PgExecutor`] and [`Transaction`](crate::transaction::Transaction)
//! implement [`DbExecutor`], so the remote store's read paths work the same
//! inside and outside a transaction.

use may_postgres::types::ToSql;
use may_postgres::{Client, Error as PostgresError, Row};
use std::fmt;

/// Database execution error type
#[derive(Debug)]
pub enum DbError {
    /// `PostgreSQL` error from `may_postgres`
    PostgresError(PostgresError),
    /// Other execution errors
    Other(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::PostgresError(e) => write!(f, "PostgreSQL error: {e}"),
            DbError::Other(s) => write!(f, "Execution error: {s}"),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::PostgresError(e) => Some(e),
            DbError::Other(_) => None,
        }
    }
}

impl From<PostgresError> for DbError {
    fn from(err: PostgresError) -> Self {
        DbError::PostgresError(err)
    }
}

/// Trait for executing database operations
///
/// Abstracts over a direct client and an open transaction, allowing the
/// migration stores to issue statements without caring which one they hold.
pub trait DbExecutor {
    /// Execute a SQL statement and return the number of rows affected
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the statement fails.
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, DbError>;

    /// Execute a query and return all rows
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, DbError>;
}

/// Executor over a `may_postgres::Client`.
///
/// The client is cheap to clone (it is a handle onto a shared connection),
/// which is what [`begin`](PgExecutor::begin) relies on.
#[derive(Clone)]
pub struct PgExecutor {
    client: Client,
}

impl PgExecutor {
    /// Create a new executor wrapping a connected client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Start a transaction on this connection
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the `BEGIN` statement fails.
    pub fn begin(&self) -> Result<crate::transaction::Transaction, DbError> {
        crate::transaction::Transaction::begin(self.client.clone())
    }
}

impl DbExecutor for PgExecutor {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, DbError> {
        self.client.execute(query, params).map_err(DbError::from)
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, DbError> {
        self.client.query(query, params).map_err(DbError::from)
    }
}
