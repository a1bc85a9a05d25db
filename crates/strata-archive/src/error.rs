use std::path::PathBuf;

use strata_column::ColumnError;
use strata_dal::DalError;
use strata_keys::KeyError;
use strata_traits::TraitError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("object {object_id:?} is not in archive {archive_id}")]
    NotInArchive { archive_id: String, object_id: String },

    #[error("data not available for {object_id:?} in {column}")]
    DataNotAvailable { column: String, object_id: String },

    #[error("invalid archive: {0}")]
    Validation(String),

    #[error("cannot discover contents in {path}: {source}")]
    Contents {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("trait error: {0}")]
    Trait(TraitError),

    #[error("column error: {0}")]
    Column(#[from] ColumnError),

    #[error("data access error: {0}")]
    Dal(DalError),

    #[error(transparent)]
    Key(#[from] KeyError),
}

impl ArchiveError {
    pub fn is_data_not_available(&self) -> bool {
        matches!(self, Self::DataNotAvailable { .. })
    }
}

impl From<TraitError> for ArchiveError {
    fn from(err: TraitError) -> Self {
        match err {
            TraitError::DataNotAvailable { column, object_id } => {
                Self::DataNotAvailable { column, object_id }
            }
            other => Self::Trait(other),
        }
    }
}

impl From<DalError> for ArchiveError {
    fn from(err: DalError) -> Self {
        match err {
            DalError::DataNotAvailable { column, object_id } => {
                Self::DataNotAvailable { column, object_id }
            }
            other => Self::Dal(other),
        }
    }
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
