//! Migration-specific error types

use crate::executor::DbError;
use crate::migration::MigrationId;
use std::path::PathBuf;

/// Which half of a verification round failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyPhase {
    Apply,
    Revert,
}

/// Migration-specific errors
#[derive(Debug)]
pub enum MigrationError {
    /// The migrations directory does not exist
    DirectoryNotFound(PathBuf),
    /// A migration file could not be read
    FileUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A migration file name does not match `{index:06}_{name}.sql`
    InvalidFileName(String),
    /// A migration file contains the revert separator more than once
    DuplicateSeparator { path: PathBuf, line: usize },
    /// A migration file is not valid UTF-8 text
    InvalidEncoding(PathBuf),
    /// Database execution error
    Database(DbError),
    /// The migrate target does not exist among the local migrations
    TargetNotFound(MigrationId),
    /// Planning was attempted while the reconciled state has conflicts
    ConflictsExist,
    /// The newest applied migration has no revert body, so it cannot be
    /// reverted
    MissingRevert(MigrationId),
    /// The revert target is not recorded as applied
    TargetNotApplied(MigrationId),
    /// During a multi-step revert the remote head was not the expected
    /// migration, meaning another process mutated the bookkeeping table
    HeadMismatch {
        /// The next migration the revert snapshot said would be at the head
        expected: MigrationId,
        /// The head actually observed in the live table
        observed: Option<MigrationId>,
    },
    /// A migration failed its apply/revert round in the verification database
    Verification { id: MigrationId, phase: VerifyPhase },
}

impl std::fmt::Display for MigrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationError::DirectoryNotFound(path) => {
                write!(f, "Migrations directory not found: {}", path.display())
            }
            MigrationError::FileUnreadable { path, source } => {
                write!(f, "Could not read migration file {}: {}", path.display(), source)
            }
            MigrationError::InvalidFileName(name) => {
                write!(
                    f,
                    "Migration file name '{name}' does not match expected pattern: {{index}}_{{name}}.sql"
                )
            }
            MigrationError::DuplicateSeparator { path, line } => {
                write!(
                    f,
                    "Duplicate revert separator in {} at line {line}",
                    path.display()
                )
            }
            MigrationError::InvalidEncoding(path) => {
                write!(f, "Migration file {} is not valid UTF-8", path.display())
            }
            MigrationError::Database(e) => write!(f, "Database error: {e}"),
            MigrationError::TargetNotFound(id) => {
                write!(f, "No local migration matches target '{id}'")
            }
            MigrationError::ConflictsExist => {
                write!(
                    f,
                    "Cannot plan migrations while conflicts exist; revert the conflicting migrations first"
                )
            }
            MigrationError::MissingRevert(id) => {
                write!(f, "Migration '{id}' has no revert section and cannot be reverted")
            }
            MigrationError::TargetNotApplied(id) => {
                write!(f, "Revert target '{id}' is not recorded as applied")
            }
            MigrationError::HeadMismatch { expected, observed } => {
                write!(
                    f,
                    "Inconsistent remote migration state: expected head '{expected}', observed {}.\n\
                     The bookkeeping table was modified by another process.",
                    observed
                        .as_ref()
                        .map_or_else(|| "<none>".to_string(), |id| format!("'{id}'"))
                )
            }
            MigrationError::Verification { id, phase } => {
                let phase = match phase {
                    VerifyPhase::Apply => "applied",
                    VerifyPhase::Revert => "reverted",
                };
                write!(f, "Migration '{id}' was not {phase} successfully")
            }
        }
    }
}

impl std::error::Error for MigrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MigrationError::Database(e) => Some(e),
            MigrationError::FileUnreadable { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<DbError> for MigrationError {
    fn from(error: DbError) -> Self {
        MigrationError::Database(error)
    }
}

impl From<crate::connection::ConnectionError> for MigrationError {
    fn from(error: crate::connection::ConnectionError) -> Self {
        match error {
            crate::connection::ConnectionError::PostgresError(e) => {
                MigrationError::Database(DbError::PostgresError(e))
            }
        }
    }
}

impl MigrationError {
    /// Whether this error reports a local/remote divergence the engine
    /// refuses to repair automatically.
    #[must_use]
    pub fn is_consistency_violation(&self) -> bool {
        matches!(
            self,
            MigrationError::MissingRevert(_)
                | MigrationError::TargetNotApplied(_)
                | MigrationError::HeadMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistency_violations_are_classified() {
        let id = MigrationId::new(3, "add_flags");

        assert!(MigrationError::MissingRevert(id.clone()).is_consistency_violation());
        assert!(MigrationError::TargetNotApplied(id.clone()).is_consistency_violation());
        assert!(MigrationError::HeadMismatch {
            expected: id.clone(),
            observed: None,
        }
        .is_consistency_violation());

        assert!(!MigrationError::ConflictsExist.is_consistency_violation());
        assert!(!MigrationError::TargetNotFound(id.clone()).is_consistency_violation());
        assert!(!MigrationError::DirectoryNotFound("missing".into()).is_consistency_violation());
        assert!(!MigrationError::Verification {
            id,
            phase: VerifyPhase::Apply,
        }
        .is_consistency_violation());
    }

    #[test]
    fn head_mismatch_names_expected_then_observed() {
        let error = MigrationError::HeadMismatch {
            expected: MigrationId::new(2, "b"),
            observed: Some(MigrationId::new(3, "c")),
        };
        let message = error.to_string();
        assert!(message.contains("expected head '000002_b.sql'"), "{message}");
        assert!(message.contains("observed '000003_c.sql'"), "{message}");
    }

    #[test]
    fn head_mismatch_with_empty_table_reports_none() {
        let error = MigrationError::HeadMismatch {
            expected: MigrationId::new(1, "a"),
            observed: None,
        };
        assert!(error.to_string().contains("observed <none>"));
    }
}
