//! Error types for the data access layer.

use std::path::PathBuf;

use strata_column::{ColumnError, Interrupt};
use strata_keys::KeyError;
use thiserror::Error;

/// Errors surfaced by the DAL host, its layers, and ingestion.
#[derive(Debug, Error)]
pub enum DalError {
    /// No layer and no source holds data for this cell.
    #[error("data not available for {object_id:?} in {column}")]
    DataNotAvailable { column: String, object_id: String },

    /// Storage holds more than one value for this cell.
    #[error("{count} values found for {object_id:?} in {column}")]
    MultipleResults {
        column: String,
        object_id: String,
        count: usize,
    },

    /// A reader failed for a reason other than missing data.
    #[error("column read failed: {0}")]
    Column(ColumnError),

    /// Ingestion could not be carried out.
    #[error("ingestion error: {0}")]
    Ingestion(String),

    /// I/O failure in a file-backed layer.
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encoding or decoding a stored cell failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored cell failed its integrity check.
    #[error("corrupt cell at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// A layer could not be constructed from its parameters.
    #[error("invalid layer: {0}")]
    InvalidLayer(String),

    /// A configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// A lock was poisoned by a panicking thread.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Interrupted(#[from] Interrupt),
}

impl DalError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_data_not_available(&self) -> bool {
        matches!(self, Self::DataNotAvailable { .. })
    }
}

impl From<ColumnError> for DalError {
    fn from(err: ColumnError) -> Self {
        match err {
            ColumnError::NotFound {
                column, object_id, ..
            } => Self::DataNotAvailable { column, object_id },
            ColumnError::MultipleResults {
                column,
                object_id,
                count,
            } => Self::MultipleResults {
                column,
                object_id,
                count,
            },
            ColumnError::Interrupted(interrupt) => Self::Interrupted(interrupt),
            other => Self::Column(other),
        }
    }
}

/// The outcome of asking one layer for one cell, when it has no value.
///
/// `CantRespond` and `DataNotAvailable` never leave the host: it moves on to
/// the next layer. `Failed` is surfaced to the caller as-is.
#[derive(Debug, Error)]
pub enum LayerError {
    /// The layer does not index this kind of column at all.
    #[error("layer {layer} cannot respond: {reason}")]
    CantRespond { layer: String, reason: String },

    /// The layer indexes this kind of column but holds no entry for the
    /// cell.
    #[error("layer {layer} has no data: {reason}")]
    DataNotAvailable { layer: String, reason: String },

    #[error(transparent)]
    Failed(#[from] DalError),
}

impl LayerError {
    pub fn cant_respond(layer: &str, reason: impl Into<String>) -> Self {
        Self::CantRespond {
            layer: layer.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_available(layer: &str, reason: impl Into<String>) -> Self {
        Self::DataNotAvailable {
            layer: layer.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for DAL operations.
pub type DalResult<T> = std::result::Result<T, DalError>;

/// Result of a single layer lookup.
pub type LayerResult<T> = std::result::Result<T, LayerError>;
