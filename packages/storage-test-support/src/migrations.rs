//! Throwaway migration directories for tests.

use std::fs;
use std::io;
use std::path::Path;

use tempfile::TempDir;

/// Builds a temporary directory of `<version>_<description>.sql` files.
/// The directory is removed when the value is dropped.
///
/// # Examples
/// ```
/// use storage_test_support::migrations::MigrationDir;
///
/// let dir = MigrationDir::new()
///     .unwrap()
///     .with(1, "create_widgets", "CREATE TABLE widgets (id BIGINT PRIMARY KEY);")
///     .unwrap();
/// assert!(dir.path().join("1_create_widgets.sql").exists());
/// ```
pub struct MigrationDir {
    dir: TempDir,
}

impl MigrationDir {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::Builder::new().prefix("migrations-").tempdir()?,
        })
    }

    /// Add one migration file.
    pub fn with(self, version: i64, description: &str, sql: &str) -> io::Result<Self> {
        fs::write(
            self.dir.path().join(format!("{version}_{description}.sql")),
            sql,
        )?;
        Ok(self)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
