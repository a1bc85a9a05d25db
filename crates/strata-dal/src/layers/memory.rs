use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use strata_column::{CancelToken, Column, Value};
use strata_keys::ColumnId;
use tracing::debug;

use crate::error::{DalError, DalResult, LayerError, LayerResult};
use crate::layer::{DataAccessLayer, IngestReport};

/// An in-process cell cache.
///
/// Optionally restricted to a set of column types; columns of any other
/// type get `CantRespond`.
#[derive(Debug)]
pub struct MemoryLayer {
    name: String,
    column_types: Option<BTreeSet<String>>,
    cells: RwLock<HashMap<ColumnId, BTreeMap<String, Value>>>,
}

impl MemoryLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_types: None,
            cells: RwLock::new(HashMap::new()),
        }
    }

    /// Only answer for columns of these types.
    pub fn indexing(mut self, column_types: impl IntoIterator<Item = String>) -> Self {
        self.column_types = Some(column_types.into_iter().collect());
        self
    }

    /// Store one cell directly.
    pub fn insert(&self, column: &ColumnId, object_id: &str, value: Value) -> DalResult<()> {
        let mut cells = self
            .cells
            .write()
            .map_err(|e| DalError::LockPoisoned(e.to_string()))?;
        cells
            .entry(column.clone())
            .or_default()
            .insert(object_id.to_string(), value);
        Ok(())
    }

    /// Drop every cell of `column`.
    pub fn clear_column(&self, column: &ColumnId) -> DalResult<bool> {
        let mut cells = self
            .cells
            .write()
            .map_err(|e| DalError::LockPoisoned(e.to_string()))?;
        Ok(cells.remove(column).is_some())
    }

    /// Number of stored cells across all columns.
    pub fn len(&self) -> DalResult<usize> {
        let cells = self
            .cells
            .read()
            .map_err(|e| DalError::LockPoisoned(e.to_string()))?;
        Ok(cells.values().map(BTreeMap::len).sum())
    }

    pub fn is_empty(&self) -> DalResult<bool> {
        Ok(self.len()? == 0)
    }

    fn indexes(&self, column: &Column) -> bool {
        self.column_types
            .as_ref()
            .map_or(true, |types| types.contains(column.column_type()))
    }
}

impl DataAccessLayer for MemoryLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_value(&self, column: &Column, object_id: &str, _cancel: &CancelToken) -> LayerResult<Value> {
        if !self.indexes(column) {
            return Err(LayerError::cant_respond(
                &self.name,
                format!("column type {} is not indexed", column.column_type()),
            ));
        }
        let cells = self
            .cells
            .read()
            .map_err(|e| DalError::LockPoisoned(e.to_string()))?;
        cells
            .get(column.id())
            .and_then(|objects| objects.get(object_id))
            .cloned()
            .ok_or_else(|| LayerError::not_available(&self.name, format!("no cell for {object_id:?}")))
    }

    fn ingest_column(&self, column: &Column, cancel: &CancelToken) -> DalResult<IngestReport> {
        if !self.indexes(column) {
            return Err(DalError::Ingestion(format!(
                "layer {} does not index column type {}",
                self.name,
                column.column_type()
            )));
        }
        let array = column.get_array_with(cancel)?;
        let report = IngestReport {
            columns: 1,
            objects_written: array.values.len(),
            objects_missing: array.missing.len(),
        };
        let mut cells = self
            .cells
            .write()
            .map_err(|e| DalError::LockPoisoned(e.to_string()))?;
        cells.insert(column.id().clone(), array.values);
        debug!(layer = %self.name, column = %column.id(), written = report.objects_written, "ingested column");
        Ok(report)
    }
}
