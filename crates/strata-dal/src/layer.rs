//! The [`DataAccessLayer`] trait and ingestion types.

use std::fmt;
use std::sync::Arc;

use strata_column::{CancelToken, Column, Value};
use tracing::info;

use crate::error::{DalError, DalResult, LayerResult};

/// Where a cell may be read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Provenance {
    /// The layer chain first, then the column's own source.
    #[default]
    Any,
    /// The layer chain only.
    Dal,
    /// The column's own source only, bypassing every layer.
    Definition,
}

/// Anything that can be ingested: an archive's bound columns.
pub trait IngestSource {
    fn archive_id(&self) -> &str;

    /// Every column to ingest, in a stable order.
    fn ingest_columns(&self) -> Vec<Arc<Column>>;
}

/// Counts from an ingestion run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub columns: usize,
    pub objects_written: usize,
    pub objects_missing: usize,
}

impl IngestReport {
    pub fn merge(&mut self, other: IngestReport) {
        self.columns += other.columns;
        self.objects_written += other.objects_written;
        self.objects_missing += other.objects_missing;
    }
}

/// One store in the host's ordered chain.
///
/// A layer answers a `(column, object_id)` lookup with a value, or says why
/// it has none: [`LayerError::CantRespond`](crate::LayerError::CantRespond)
/// when the column is not a kind it indexes, or
/// [`LayerError::DataNotAvailable`](crate::LayerError::DataNotAvailable)
/// when it indexes the column but has no entry. Any other failure is
/// [`LayerError::Failed`](crate::LayerError::Failed).
///
/// Layers must be safe for concurrent reads once ingestion has completed.
pub trait DataAccessLayer: Send + Sync + fmt::Debug {
    /// Unique name of this layer within a host.
    fn name(&self) -> &str;

    /// Look up one cell.
    fn get_value(&self, column: &Column, object_id: &str, cancel: &CancelToken) -> LayerResult<Value>;

    /// Compute every value of `column` from its source and persist it.
    ///
    /// Layers that cannot store data keep the default, which refuses.
    fn ingest_column(&self, column: &Column, _cancel: &CancelToken) -> DalResult<IngestReport> {
        Err(DalError::Ingestion(format!(
            "layer {} does not accept ingestion (column {})",
            self.name(),
            column.id()
        )))
    }

    /// Ingest every column of `source`.
    fn ingest_archive(&self, source: &dyn IngestSource, cancel: &CancelToken) -> DalResult<IngestReport> {
        let mut report = IngestReport::default();
        for column in source.ingest_columns() {
            cancel.check()?;
            report.merge(self.ingest_column(&column, cancel)?);
        }
        info!(
            layer = self.name(),
            archive = source.archive_id(),
            columns = report.columns,
            written = report.objects_written,
            missing = report.objects_missing,
            "ingested archive"
        );
        Ok(report)
    }
}
