//! Error types for catalog operations.
//!
//! This module provides the [`MarcError`] type for all library operations
//! and the [`Result`] convenience type. Field-level edit rejections have their
//! own kind, [`ValidationError`], which converts into [`MarcError`].

use thiserror::Error;

use crate::validation::ValidationError;

/// Error type for all catalog operations.
///
/// Covers decoding and encoding of ISO 2709 records, relational
/// reconstruction, the SQLite-backed catalog store and configuration loading.
#[derive(Error, Debug)]
pub enum MarcError {
    /// Error indicating an invalid or malformed MARC record.
    #[error("Invalid MARC record: {0}")]
    InvalidRecord(String),

    /// Error indicating an invalid leader (24-byte header).
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// Error indicating an invalid field structure.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// A record cannot be represented in the wire format (length or offset
    /// overflow, structural bytes inside data). Raised before any byte is written.
    #[error("Cannot encode record: {0}")]
    EncodeError(String),

    /// Error indicating a truncated or incomplete record.
    #[error("Truncated record: {0}")]
    TruncatedRecord(String),

    /// Relational rows do not describe a consistent record.
    #[error("Inconsistent rows: {0}")]
    InconsistentRows(String),

    /// A row addressed by id does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Row kind (`record`, `field`, `subfield`)
        kind: &'static str,
        /// Surrogate id that was looked up
        id: i64,
    },

    /// A field-level edit was rejected before any row was touched.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Error raised by the SQLite catalog store. The enclosing transaction has
    /// been rolled back when this is returned from a mutating operation.
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Malformed configuration file.
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Error writing a records report.
    #[error("Report error: {0}")]
    Report(#[from] csv::Error),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MarcError {
    pub(crate) fn not_found(kind: &'static str, id: i64) -> Self {
        MarcError::NotFound { kind, id }
    }
}

/// Convenience type alias for [`std::result::Result`] with [`MarcError`].
pub type Result<T> = std::result::Result<T, MarcError>;
