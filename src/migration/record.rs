//! `Migration` - a migration's full content: identity plus SQL bodies.
//!
//! On disk a migration is a single UTF-8 `.sql` file: the apply statements,
//! a line exactly `-- REVERT:`, then the revert statements. Comment lines
//! (`--` prefixed) are not part of either body.

use crate::migration::{MigrationError, MigrationId};
use std::fs;
use std::path::Path;

/// The line separating the apply body from the revert body.
pub const REVERT_SEPARATOR: &str = "-- REVERT:";

/// A migration's identity and SQL bodies.
///
/// A migration without a revert body cannot be reverted; attempting to is a
/// consistency violation, not something the engine works around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub index: i32,
    pub name: String,
    /// Apply SQL, possibly multi-statement
    pub apply: String,
    /// Revert SQL, if the migration is reversible
    pub revert: Option<String>,
}

impl Migration {
    /// Create a new `Migration`
    pub fn new(id: MigrationId, apply: impl Into<String>, revert: Option<String>) -> Self {
        Self {
            index: id.index,
            name: id.name,
            apply: apply.into(),
            revert,
        }
    }

    /// The migration's identity
    #[must_use]
    pub fn id(&self) -> MigrationId {
        MigrationId::new(self.index, self.name.clone())
    }

    /// Load a migration from a file.
    ///
    /// The identity comes from the file name; the bodies from splitting the
    /// content at the first [`REVERT_SEPARATOR`] line.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] if the file name does not match the
    /// migration pattern, the file cannot be read, the content is not UTF-8,
    /// or the separator occurs more than once.
    pub fn load(path: &Path) -> Result<Self, MigrationError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let id = MigrationId::parse_file_name(file_name)
            .ok_or_else(|| MigrationError::InvalidFileName(file_name.to_string()))?;

        let bytes = fs::read(path).map_err(|e| MigrationError::FileUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
        let content = String::from_utf8(bytes)
            .map_err(|_| MigrationError::InvalidEncoding(path.to_path_buf()))?;

        let mut apply_lines: Vec<&str> = Vec::new();
        let mut revert_lines: Vec<&str> = Vec::new();
        let mut in_revert = false;

        for (line_number, line) in content.lines().enumerate() {
            if line.starts_with("--") {
                if line == REVERT_SEPARATOR {
                    if in_revert {
                        return Err(MigrationError::DuplicateSeparator {
                            path: path.to_path_buf(),
                            line: line_number + 1,
                        });
                    }
                    in_revert = true;
                }
                continue;
            }

            if in_revert {
                revert_lines.push(line);
            } else {
                apply_lines.push(line);
            }
        }

        Ok(Self::new(
            id,
            apply_lines.join("\n"),
            Some(revert_lines.join("\n")),
        ))
    }

    /// Write the migration to a file, apply body first, then the separator
    /// and the revert body.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::FileUnreadable`] if the file cannot be
    /// written.
    pub fn save(&self, path: &Path) -> Result<(), MigrationError> {
        let content = format!(
            "{}\n{REVERT_SEPARATOR}\n{}",
            self.apply,
            self.revert.as_deref().unwrap_or_default()
        );
        fs::write(path, content).map_err(|e| MigrationError::FileUnreadable {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Decode a migration from a bookkeeping table row.
    ///
    /// Expected column order: `index`, `name`, `apply`, `revert`.
    pub fn from_row(row: &may_postgres::Row) -> Self {
        let index: i32 = row.get(0);
        let name: String = row.get(1);
        let apply: String = row.get(2);
        let revert: Option<String> = row.get(3);

        Self {
            index,
            name,
            apply,
            revert,
        }
    }
}

/// The stub written by `create`: a header comment, an empty apply section,
/// and the revert marker.
pub(crate) fn template(id: &MigrationId) -> String {
    format!("-- {}: {}\n\n{REVERT_SEPARATOR}\n", id.index, id.name)
}
