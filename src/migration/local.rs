//! Local migration store: a directory of ordered `.sql` files.

use crate::migration::{record, Migration, MigrationError, MigrationId};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

static ILLEGAL_FILE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[:\\*?"<>|]"#).expect("valid character class"));

/// Reads and creates migration files in a configured directory.
///
/// Entries whose names do not match the migration pattern are skipped when
/// listing. The directory itself must exist; it is checked at construction
/// and again before every listing, since it may be removed between calls.
#[derive(Debug, Clone)]
pub struct LocalMigrations {
    directory: PathBuf,
}

impl LocalMigrations {
    /// Open the store over `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::DirectoryNotFound`] if `directory` does not
    /// exist or is not a directory.
    pub fn new(directory: impl AsRef<Path>) -> Result<Self, MigrationError> {
        let store = Self {
            directory: directory.as_ref().to_path_buf(),
        };
        store.validate()?;
        Ok(store)
    }

    /// Path of the migrations directory
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn validate(&self) -> Result<(), MigrationError> {
        if !self.directory.is_dir() {
            return Err(MigrationError::DirectoryNotFound(self.directory.clone()));
        }
        Ok(())
    }

    /// List migration identities, ascending by index.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] if the directory is missing or unreadable.
    pub fn list_identifiers(&self) -> Result<Vec<MigrationId>, MigrationError> {
        self.validate()?;

        let entries =
            fs::read_dir(&self.directory).map_err(|e| MigrationError::FileUnreadable {
                path: self.directory.clone(),
                source: e,
            })?;

        let mut identifiers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MigrationError::FileUnreadable {
                path: self.directory.clone(),
                source: e,
            })?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(id) = MigrationId::parse_file_name(file_name) {
                identifiers.push(id);
            }
        }

        identifiers.sort_by_key(|id| id.index);
        Ok(identifiers)
    }

    /// Load every migration in the directory, ascending by index.
    ///
    /// Each file is independent, so the reads fan out across coroutines; the
    /// final sort restores deterministic order.
    ///
    /// # Errors
    ///
    /// Returns the first [`MigrationError`] produced by any file load.
    pub fn list(&self) -> Result<Vec<Migration>, MigrationError> {
        let identifiers = self.list_identifiers()?;

        let (sender, receiver) = crossbeam_channel::bounded(identifiers.len().max(1));
        for id in &identifiers {
            let path = self.directory.join(id.file_name());
            let sender = sender.clone();
            may::go!(move || {
                let _ = sender.send(Migration::load(&path));
            });
        }
        drop(sender);

        let mut migrations = Vec::with_capacity(identifiers.len());
        for result in receiver.iter() {
            migrations.push(result?);
        }

        migrations.sort_by_key(|m| m.index);
        Ok(migrations)
    }

    /// Load a single migration by identity.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] if the directory or file is missing or the
    /// file fails to parse.
    pub fn get(&self, id: &MigrationId) -> Result<Migration, MigrationError> {
        self.validate()?;
        Migration::load(&self.directory.join(id.file_name()))
    }

    /// Create a new migration file stub and return its identity.
    ///
    /// Filesystem-illegal characters in `name` are replaced with `_`; the
    /// index is one past the current highest. Refuses to overwrite an
    /// existing file.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] if listing fails or the file already
    /// exists.
    pub fn create(&self, name: &str) -> Result<MigrationId, MigrationError> {
        let next_index = self
            .list_identifiers()?
            .last()
            .map_or(1, |id| id.index + 1);
        let clean_name = ILLEGAL_FILE_NAME_CHARS.replace_all(name, "_");
        let id = MigrationId::new(next_index, clean_name);

        let path = self.directory.join(id.file_name());
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        let mut file = options
            .open(&path)
            .map_err(|e| MigrationError::FileUnreadable {
                path: path.clone(),
                source: e,
            })?;

        use std::io::Write;
        file.write_all(record::template(&id).as_bytes())
            .map_err(|e| MigrationError::FileUnreadable { path, source: e })?;

        log::info!("created migration '{id}'");
        Ok(id)
    }
}
