use strata_column::{CancelToken, Column, ColumnError, Value};

use crate::error::{LayerError, LayerResult};
use crate::layer::DataAccessLayer;

/// A layer that reads each column from its own definition.
///
/// Placed last in a chain it plays the "slow original" behind faster
/// caches. It stores nothing, so ingestion into it is refused.
#[derive(Clone, Debug)]
pub struct SourceLayer {
    name: String,
}

impl SourceLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for SourceLayer {
    fn default() -> Self {
        Self::new("source")
    }
}

impl DataAccessLayer for SourceLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_value(&self, column: &Column, object_id: &str, cancel: &CancelToken) -> LayerResult<Value> {
        match column.get_value_with(object_id, cancel) {
            Ok(value) => Ok(value),
            Err(ColumnError::NotFound { reason, .. }) => Err(LayerError::not_available(&self.name, reason)),
            Err(e) => Err(LayerError::Failed(e.into())),
        }
    }
}
