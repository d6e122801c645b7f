//! Catalog configuration.
//!
//! Loaded from a JSON file; every key is optional and falls back to
//! [`CatalogConfig::default`]:
//!
//! ```json
//! { "database": "library.db", "recovery_mode": "strict", "foreign_keys": true }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::reader::RecoveryMode;

/// Default database file name, relative to the working directory.
pub const DEFAULT_DATABASE: &str = "catalog.db";

/// Settings for opening a [`Catalog`](crate::Catalog).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// SQLite database file.
    pub database: PathBuf,
    /// How imports treat malformed records.
    pub recovery_mode: RecoveryMode,
    /// Enable SQLite foreign-key enforcement on the connection.
    pub foreign_keys: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            database: PathBuf::from(DEFAULT_DATABASE),
            recovery_mode: RecoveryMode::default(),
            foreign_keys: true,
        }
    }
}

impl CatalogConfig {
    /// Read a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::IoError`](crate::MarcError::IoError) if the file
    /// cannot be read and [`MarcError::Config`](crate::MarcError::Config) if it
    /// is not valid configuration JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Replace the database path.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<PathBuf>) -> Self {
        self.database = database.into();
        self
    }

    /// Replace the recovery mode.
    #[must_use]
    pub fn with_recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.recovery_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MarcError;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CatalogConfig::default();
        assert_eq!(config.database, PathBuf::from("catalog.db"));
        assert_eq!(config.recovery_mode, RecoveryMode::Lenient);
        assert!(config.foreign_keys);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"database": "library.db", "recovery_mode": "strict"}}"#).unwrap();

        let config = CatalogConfig::load(file.path()).unwrap();
        assert_eq!(config.database, PathBuf::from("library.db"));
        assert_eq!(config.recovery_mode, RecoveryMode::Strict);
        assert!(config.foreign_keys);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"databse": "typo.db"}}"#).unwrap();

        assert!(matches!(
            CatalogConfig::load(file.path()),
            Err(MarcError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            CatalogConfig::load(&missing),
            Err(MarcError::IoError(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = CatalogConfig::default()
            .with_database("other.db")
            .with_recovery_mode(RecoveryMode::Strict);
        assert_eq!(config.database, PathBuf::from("other.db"));
        assert_eq!(config.recovery_mode, RecoveryMode::Strict);
    }
}
