//! Connection establishment for `may_postgres`.
//!
//! Wraps the driver's connection-string interface behind a structured
//! [`ConnectionConfig`] so callers (the CLI, the temporary-database scope)
//! can derive new configurations without string surgery.

use may_postgres::{Client, Error as PostgresError};
use std::fmt;

/// TLS behavior for the database connection, mirroring libpq's `sslmode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// Never negotiate TLS
    Disable,
    /// Use TLS if the server supports it (default)
    #[default]
    Prefer,
    /// Fail if TLS cannot be negotiated
    Require,
}

impl TlsMode {
    fn as_sslmode(self) -> &'static str {
        match self {
            TlsMode::Disable => "disable",
            TlsMode::Prefer => "prefer",
            TlsMode::Require => "require",
        }
    }
}

/// Connection settings for the target PostgreSQL server.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub tls: TlsMode,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "postgres".to_string(),
            tls: TlsMode::default(),
        }
    }
}

impl ConnectionConfig {
    /// Same server, different database. Used for the verification scope.
    #[must_use]
    pub fn with_database(&self, database: &str) -> Self {
        let mut config = self.clone();
        config.database = database.to_string();
        config
    }

    /// Render as a key-value connection string for `may_postgres::connect`.
    #[must_use]
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode={}",
            self.host,
            self.port,
            self.username,
            self.password,
            self.database,
            self.tls.as_sslmode()
        )
    }
}

/// Connection error type
#[derive(Debug)]
pub enum ConnectionError {
    /// Network/authentication error from `may_postgres`
    PostgresError(PostgresError),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::PostgresError(e) => write!(f, "PostgreSQL error: {e}"),
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectionError::PostgresError(e) => Some(e),
        }
    }
}

impl From<PostgresError> for ConnectionError {
    fn from(err: PostgresError) -> Self {
        ConnectionError::PostgresError(err)
    }
}

/// Establish a connection to PostgreSQL.
///
/// This is a blocking call that works within coroutines. The connection is
/// established synchronously and returns a `Client` that can be used for
/// queries.
///
/// # Errors
///
/// Returns [`ConnectionError`] if the server is unreachable or rejects the
/// credentials.
pub fn connect(config: &ConnectionConfig) -> Result<Client, ConnectionError> {
    log::debug!(
        "connecting to {}:{}/{}",
        config.host,
        config.port,
        config.database
    );
    let client = may_postgres::connect(&config.connection_string())?;
    Ok(client)
}
