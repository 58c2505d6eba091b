//! `MigrationId` - the (index, name) pair naming a migration.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static FILE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)_(.*)\.sql$").expect("valid file name pattern"));

/// Identity of a migration: ordinal index plus name.
///
/// The canonical on-disk encoding is `{index:06}_{name}.sql`; the identity is
/// recoverable from any file name matching `^(\d+)_(.*)\.sql$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MigrationId {
    pub index: i32,
    pub name: String,
}

impl MigrationId {
    /// Create a new `MigrationId`
    pub fn new(index: i32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }

    /// Canonical file name, e.g. `000001_create_users.sql`
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{:06}_{}.sql", self.index, self.name)
    }

    /// Recover an identity from a file name.
    ///
    /// Returns `None` for names that do not match the migration pattern;
    /// directory listings skip those rather than failing.
    #[must_use]
    pub fn parse_file_name(file_name: &str) -> Option<Self> {
        let caps = FILE_NAME_RE.captures(file_name)?;
        let index: i32 = caps.get(1)?.as_str().parse().ok()?;
        let name = caps.get(2)?.as_str().to_string();
        Some(Self { index, name })
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_zero_padded() {
        let id = MigrationId::new(1, "create_users");
        assert_eq!(id.file_name(), "000001_create_users.sql");

        let id = MigrationId::new(123456, "wide");
        assert_eq!(id.file_name(), "123456_wide.sql");
    }

    #[test]
    fn parse_recovers_identity() {
        let id = MigrationId::parse_file_name("000042_add_index.sql").unwrap();
        assert_eq!(id.index, 42);
        assert_eq!(id.name, "add_index");
    }

    #[test]
    fn parse_accepts_unpadded_index() {
        let id = MigrationId::parse_file_name("7_seed.sql").unwrap();
        assert_eq!(id.index, 7);
        assert_eq!(id.name, "seed");
    }

    #[test]
    fn parse_rejects_non_migration_names() {
        assert!(MigrationId::parse_file_name("README.md").is_none());
        assert!(MigrationId::parse_file_name("create_users.sql").is_none());
        assert!(MigrationId::parse_file_name("000001_create_users.txt").is_none());
        assert!(MigrationId::parse_file_name(".gitkeep").is_none());
    }

    #[test]
    fn round_trip() {
        let id = MigrationId::new(13, "rename_articles");
        assert_eq!(MigrationId::parse_file_name(&id.file_name()), Some(id));
    }

    #[test]
    fn equality_is_index_and_name() {
        assert_eq!(MigrationId::new(1, "a"), MigrationId::new(1, "a"));
        assert_ne!(MigrationId::new(1, "a"), MigrationId::new(1, "b"));
        assert_ne!(MigrationId::new(1, "a"), MigrationId::new(2, "a"));
    }
}
