//! Error types for trait mapping, resolution, and instantiation.

use strata_column::ColumnError;
use strata_dal::DalError;
use strata_keys::KeyError;
use thiserror::Error;

/// Errors from the registry and from trait instances.
#[derive(Debug, Error)]
pub enum TraitError {
    /// The key does not resolve to any registered mapping.
    #[error("unknown trait: {key}")]
    UnknownTrait { key: String },

    /// An under-specified key has several candidate branches or versions
    /// and no default to choose between them.
    #[error("ambiguous key {key}: candidate {field}s are {candidates:?}")]
    AmbiguousKey {
        key: String,
        field: &'static str,
        candidates: Vec<String>,
    },

    /// The trait's class declares no property of this name.
    #[error("trait {key} has no property {name:?}")]
    UnknownProperty { key: String, name: String },

    /// No layer and no source holds data for this property.
    #[error("data not available for {object_id:?} in {column}")]
    DataNotAvailable { column: String, object_id: String },

    /// Storage holds more than one value for this cell.
    #[error("{count} values found for {object_id:?} in {column}")]
    MultipleResults {
        column: String,
        object_id: String,
        count: usize,
    },

    /// A class, mapping, or defaults declaration is inconsistent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Two schema fragments disagree at `path`.
    #[error("schema conflict at {path}: {reason}")]
    SchemaConflict { path: String, reason: String },

    /// A property refers to a column alias the archive does not define.
    #[error("property {property:?} refers to unbound column alias {alias:?}")]
    UnboundColumn { property: String, alias: String },

    /// Writing an exported trait failed.
    #[error("export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Column(ColumnError),

    #[error(transparent)]
    Dal(DalError),
}

impl TraitError {
    pub fn unknown_trait(key: impl ToString) -> Self {
        Self::UnknownTrait {
            key: key.to_string(),
        }
    }

    pub fn is_data_not_available(&self) -> bool {
        matches!(self, Self::DataNotAvailable { .. })
    }
}

impl From<DalError> for TraitError {
    fn from(err: DalError) -> Self {
        match err {
            DalError::DataNotAvailable { column, object_id } => {
                Self::DataNotAvailable { column, object_id }
            }
            DalError::MultipleResults {
                column,
                object_id,
                count,
            } => Self::MultipleResults {
                column,
                object_id,
                count,
            },
            DalError::Column(e) => Self::from(e),
            other => Self::Dal(other),
        }
    }
}

impl From<ColumnError> for TraitError {
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
            other => Self::Column(other),
        }
    }
}

/// Convenience type alias for trait operations.
pub type TraitResult<T> = std::result::Result<T, TraitError>;
