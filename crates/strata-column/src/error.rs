//! Error types for column retrieval.

use std::path::PathBuf;

use strata_keys::KeyError;
use thiserror::Error;

use crate::value::PropertyType;

/// Why a retrieval loop stopped early.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Interrupt {
    /// The caller cancelled the token.
    #[error("retrieval cancelled")]
    Cancelled,

    /// The token's deadline passed.
    #[error("retrieval deadline exceeded")]
    TimedOut,
}

/// Errors that can occur while reading or binding columns.
#[derive(Debug, Error)]
pub enum ColumnError {
    /// The column's source does not cover this object (missing file, row,
    /// key, or a null cell).
    #[error("data not available for {object_id:?} in {column}: {reason}")]
    NotFound {
        column: String,
        object_id: String,
        reason: String,
    },

    /// The source holds more than one value for this object.
    #[error("{count} values found for {object_id:?} in {column}")]
    MultipleResults {
        column: String,
        object_id: String,
        count: usize,
    },

    /// A value could not be coerced to the declared type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: PropertyType,
        found: String,
    },

    /// An array's shape does not match its data.
    #[error("invalid array: {0}")]
    InvalidArray(String),

    /// A source file exists but could not be parsed.
    #[error("cannot parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// I/O failure while reading a source file.
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SQL failure in a database-backed reader.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The SQL handle was used after being closed.
    #[error("sql handle {0:?} is closed")]
    HandleClosed(String),

    /// A definition's parameters are unusable.
    #[error("invalid column definition: {0}")]
    InvalidDefinition(String),

    /// Two distinct columns were bound under the same id.
    #[error("duplicate column id: {id}")]
    DuplicateColumn { id: String },

    /// An alias is already bound to another column.
    #[error("alias {alias:?} already refers to {existing}")]
    DuplicateAlias { alias: String, existing: String },

    /// No bound column matches this id or alias.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// A lock was poisoned by a panicking thread.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Interrupted(#[from] Interrupt),
}

impl ColumnError {
    /// Build a [`ColumnError::NotFound`].
    pub fn not_found(
        column: impl Into<String>,
        object_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            column: column.into(),
            object_id: object_id.into(),
            reason: reason.into(),
        }
    }

    /// True for the "source does not cover this object" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience type alias for column operations.
pub type ColumnResult<T> = std::result::Result<T, ColumnError>;
