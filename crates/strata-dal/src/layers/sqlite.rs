//! SQLite-backed cell store.
//!
//! All cells live in one `cells` table keyed by the four column id
//! components and the object id. Values are stored as bincode blobs, so
//! array cells round-trip with their shape.

use std::collections::BTreeSet;
use std::sync::Arc;

use rusqlite::{params, OptionalExtension};
use strata_column::{CancelToken, Column, SqlHandle, Value};
use strata_keys::{ColumnId, ColumnTimestamp};
use tracing::debug;

use crate::error::{DalError, DalResult, LayerError, LayerResult};
use crate::layer::{DataAccessLayer, IngestReport};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS cells (
    archive_id  TEXT NOT NULL,
    column_type TEXT NOT NULL,
    column_name TEXT NOT NULL,
    timestamp   TEXT NOT NULL,
    object_id   TEXT NOT NULL,
    value       BLOB NOT NULL,
    PRIMARY KEY (archive_id, column_type, column_name, timestamp, object_id)
)";

const SELECT_CELL: &str = "SELECT value FROM cells
    WHERE archive_id = ?1 AND column_type = ?2 AND column_name = ?3 AND timestamp = ?4 AND object_id = ?5";

const COUNT_CELLS: &str = "SELECT COUNT(*) FROM cells
    WHERE archive_id = ?1 AND column_type = ?2 AND column_name = ?3 AND timestamp = ?4";

const DELETE_COLUMN: &str = "DELETE FROM cells
    WHERE archive_id = ?1 AND column_type = ?2 AND column_name = ?3 AND timestamp = ?4";

const INSERT_CELL: &str = "INSERT OR REPLACE INTO cells
    (archive_id, column_type, column_name, timestamp, object_id, value) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

/// The key columns of a column id, timestamp in its string form.
fn id_columns(id: &ColumnId) -> (&str, &str, &str, String) {
    (id.archive_id(), id.column_type(), id.column_name(), id.timestamp().to_string())
}

/// Stores ingested cells in a SQLite database reached through an
/// explicitly opened [`SqlHandle`].
#[derive(Debug)]
pub struct SqliteLayer {
    name: String,
    handle: Arc<SqlHandle>,
    archives: Option<BTreeSet<String>>,
}

impl SqliteLayer {
    /// Use `handle`, creating the cell table if it is missing.
    pub fn new(handle: Arc<SqlHandle>) -> DalResult<Self> {
        handle
            .with_connection(|c| c.execute_batch(CREATE_TABLE))
            .map_err(DalError::from)?;
        Ok(Self {
            name: format!("sqlite:{}", handle.label()),
            handle,
            archives: None,
        })
    }

    /// Open `connection` (a file path or `:memory:`) and use it.
    pub fn open(connection: &str) -> DalResult<Self> {
        let handle = SqlHandle::open_connection_string(connection).map_err(|e| {
            DalError::InvalidLayer(format!("cannot open sqlite database {connection:?}: {e}"))
        })?;
        Self::new(Arc::new(handle))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Only answer for these archives.
    pub fn with_archives(mut self, archives: impl IntoIterator<Item = String>) -> Self {
        self.archives = Some(archives.into_iter().collect());
        self
    }

    pub fn handle(&self) -> &Arc<SqlHandle> {
        &self.handle
    }

    /// Close the underlying handle. Later lookups fail.
    pub fn close(&self) -> DalResult<()> {
        Ok(self.handle.close()?)
    }

    /// Number of stored cells for `column`.
    pub fn cell_count(&self, column: &Column) -> DalResult<usize> {
        let (archive, ctype, cname, ts) = id_columns(column.id());
        let count: i64 = self.handle.with_connection(|c| {
            c.query_row(COUNT_CELLS, params![archive, ctype, cname, ts], |row| row.get(0))
        })?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Ids of every column with at least one stored cell, sorted.
    pub fn ingested_columns(&self) -> DalResult<Vec<ColumnId>> {
        let rows: Vec<(String, String, String, String)> = self.handle.with_connection(|c| {
            let mut stmt = c.prepare(
                "SELECT DISTINCT archive_id, column_type, column_name, timestamp FROM cells
                 ORDER BY archive_id, column_type, column_name, timestamp",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;
        let mut ids = Vec::with_capacity(rows.len());
        for (archive, ctype, cname, ts) in rows {
            let timestamp = ColumnTimestamp::parse(&ts)
                .map_err(|e| DalError::Corrupt { path: self.handle.label().into(), reason: e.to_string() })?;
            let id = ColumnId::new(archive, ctype, cname, timestamp)
                .map_err(|e| DalError::Corrupt { path: self.handle.label().into(), reason: e.to_string() })?;
            ids.push(id);
        }
        Ok(ids)
    }

    fn holds_archive(&self, archive_id: &str) -> bool {
        self.archives
            .as_ref()
            .map_or(true, |archives| archives.contains(archive_id))
    }
}

impl DataAccessLayer for SqliteLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_value(&self, column: &Column, object_id: &str, _cancel: &CancelToken) -> LayerResult<Value> {
        if !self.holds_archive(column.archive_id()) {
            return Err(LayerError::cant_respond(
                &self.name,
                format!("archive {} is not stored here", column.archive_id()),
            ));
        }
        let (archive, ctype, cname, ts) = id_columns(column.id());
        let blob: Option<Vec<u8>> = self
            .handle
            .with_connection(|c| {
                c.query_row(SELECT_CELL, params![archive, ctype, cname, ts, object_id], |row| row.get(0))
                    .optional()
            })
            .map_err(DalError::from)?;
        let blob = blob.ok_or_else(|| LayerError::not_available(&self.name, format!("no cell for {object_id:?}")))?;
        bincode::deserialize(&blob).map_err(|e| {
            LayerError::Failed(DalError::Corrupt {
                path: self.handle.label().into(),
                reason: format!("cell {}/{object_id}: {e}", column.id()),
            })
        })
    }

    fn ingest_column(&self, column: &Column, cancel: &CancelToken) -> DalResult<IngestReport> {
        if !self.holds_archive(column.archive_id()) {
            return Err(DalError::Ingestion(format!(
                "layer {} does not store archive {}",
                self.name,
                column.archive_id()
            )));
        }
        let array = column.get_array_with(cancel)?;
        let mut rows = Vec::with_capacity(array.values.len());
        for (object_id, value) in &array.values {
            let blob = bincode::serialize(value).map_err(|e| DalError::Serialization(e.to_string()))?;
            rows.push((object_id.as_str(), blob));
        }

        let (archive, ctype, cname, ts) = id_columns(column.id());
        self.handle.with_connection(|c| {
            let tx = c.unchecked_transaction()?;
            tx.execute(DELETE_COLUMN, params![archive, ctype, cname, ts])?;
            {
                let mut stmt = tx.prepare(INSERT_CELL)?;
                for (object_id, blob) in &rows {
                    stmt.execute(params![archive, ctype, cname, ts, object_id, blob])?;
                }
            }
            tx.commit()
        })?;
        debug!(layer = %self.name, column = %column.id(), written = rows.len(), "ingested column");

        Ok(IngestReport {
            columns: 1,
            objects_written: rows.len(),
            objects_missing: array.missing.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_column::{Array, ArchiveContext, ColumnDefinition, ColumnFromData, PropertyType};

    fn column(archive: &str) -> Column {
        let ctx = Arc::new(ArchiveContext::new(
            archive,
            None,
            vec!["Gal1".into(), "Gal2".into()],
        ));
        let cube = Value::FloatArray(Array::new(vec![1, 3], vec![0.5, 1.5, 2.5]).unwrap());
        let def: Arc<dyn ColumnDefinition> =
            Arc::new(ColumnFromData::new("spectra", PropertyType::FloatArray, [("Gal1", cube)]));
        Column::associate(def, ctx).unwrap()
    }

    #[test]
    fn default_name_uses_connection() {
        let layer = SqliteLayer::open(":memory:").unwrap();
        assert_eq!(layer.name(), "sqlite::memory:");
    }

    #[test]
    fn empty_store_has_no_data() {
        let layer = SqliteLayer::open(":memory:").unwrap();
        assert!(matches!(
            layer.get_value(&column("Example"), "Gal1", &CancelToken::new()),
            Err(LayerError::DataNotAvailable { .. })
        ));
    }

    #[test]
    fn ingest_then_read() {
        let layer = SqliteLayer::open(":memory:").unwrap();
        let col = column("Example");
        let report = layer.ingest_column(&col, &CancelToken::new()).unwrap();
        assert_eq!(report.objects_written, 1);
        assert_eq!(report.objects_missing, 1);
        assert_eq!(layer.cell_count(&col).unwrap(), 1);

        let value = layer.get_value(&col, "Gal1", &CancelToken::new()).unwrap();
        let array = value.as_float_array().unwrap();
        assert_eq!(array.shape(), &[1, 3]);
        assert_eq!(array.data(), &[0.5, 1.5, 2.5]);

        // Re-ingesting replaces rather than duplicates.
        layer.ingest_column(&col, &CancelToken::new()).unwrap();
        assert_eq!(layer.cell_count(&col).unwrap(), 1);
        assert_eq!(layer.ingested_columns().unwrap(), vec![col.id().clone()]);
    }

    #[test]
    fn reingest_drops_objects_gone_from_source() {
        let layer = SqliteLayer::open(":memory:").unwrap();
        let ctx = Arc::new(ArchiveContext::new("Example", None, vec!["Gal1".into(), "Gal2".into()]));
        let redshift = |values: Vec<(&str, Value)>| {
            let def: Arc<dyn ColumnDefinition> = Arc::new(ColumnFromData::new("z", PropertyType::Float, values));
            Column::associate(def, Arc::clone(&ctx)).unwrap()
        };

        let before = redshift(vec![("Gal1", Value::Float(0.1)), ("Gal2", Value::Float(0.2))]);
        layer.ingest_column(&before, &CancelToken::new()).unwrap();
        assert_eq!(layer.cell_count(&before).unwrap(), 2);

        let after = redshift(vec![("Gal1", Value::Float(0.15))]);
        assert_eq!(before.id(), after.id());
        layer.ingest_column(&after, &CancelToken::new()).unwrap();

        assert_eq!(layer.cell_count(&after).unwrap(), 1);
        assert_eq!(layer.get_value(&after, "Gal1", &CancelToken::new()).unwrap(), Value::Float(0.15));
        assert!(matches!(
            layer.get_value(&after, "Gal2", &CancelToken::new()),
            Err(LayerError::DataNotAvailable { .. })
        ));
    }

    #[test]
    fn archive_filter() {
        let layer = SqliteLayer::open(":memory:")
            .unwrap()
            .with_archives(["Example".to_string()]);
        assert!(matches!(
            layer.get_value(&column("Other"), "Gal1", &CancelToken::new()),
            Err(LayerError::CantRespond { .. })
        ));
        assert!(matches!(
            layer.ingest_column(&column("Other"), &CancelToken::new()),
            Err(DalError::Ingestion(_))
        ));
    }

    #[test]
    fn closed_handle_fails() {
        let layer = SqliteLayer::open(":memory:").unwrap();
        layer.close().unwrap();
        assert!(matches!(
            layer.get_value(&column("Example"), "Gal1", &CancelToken::new()),
            Err(LayerError::Failed(DalError::Column(_)))
        ));
    }

    #[test]
    fn shared_handle_sees_same_cells() {
        let handle = Arc::new(SqlHandle::open_in_memory().unwrap());
        let writer = SqliteLayer::new(Arc::clone(&handle)).unwrap().with_name("writer");
        let reader = SqliteLayer::new(handle).unwrap().with_name("reader");
        let col = column("Example");
        writer.ingest_column(&col, &CancelToken::new()).unwrap();
        assert!(reader.get_value(&col, "Gal1", &CancelToken::new()).is_ok());
    }
}
