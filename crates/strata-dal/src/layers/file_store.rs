//! File-backed cell store.
//!
//! Layout, one directory per column id:
//!
//! ```text
//! base_path/
//!   <archive_id>/<column_type>/<column_name>/<timestamp>/
//!     series.cell            scalar columns: every object in one file
//!     <object_id>.cell       array columns: one file per object
//! ```
//!
//! Every path component is escaped with
//! [`escape_path_component`](strata_keys::escape_path_component), so column
//! names holding `/` or `:` stay one directory level.
//!
//! Cell file format:
//! ```text
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode)]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use strata_column::{CancelToken, Column, Value};
use strata_keys::{escape_path_component, unescape_component, ColumnId, ColumnTimestamp};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{DalError, DalResult, LayerError, LayerResult};
use crate::layer::{DataAccessLayer, IngestReport};

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

const SERIES_FILE: &str = "series.cell";
const CELL_EXTENSION: &str = "cell";

/// Stores ingested cells as framed files under a base directory.
#[derive(Clone, Debug)]
pub struct FileStoreLayer {
    name: String,
    base_path: PathBuf,
    archives: Option<BTreeSet<String>>,
}

impl FileStoreLayer {
    /// Open a store rooted at `base_path`, which must already exist.
    pub fn new(base_path: impl AsRef<Path>) -> DalResult<Self> {
        let base_path = base_path.as_ref();
        if !base_path.is_dir() {
            return Err(DalError::InvalidLayer(format!(
                "file store base path {} is not an existing directory",
                base_path.display()
            )));
        }
        Ok(Self {
            name: format!("file_store:{}", base_path.display()),
            base_path: base_path.to_path_buf(),
            archives: None,
        })
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

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory holding the cells of `id`.
    pub fn column_dir(&self, id: &ColumnId) -> PathBuf {
        self.base_path
            .join(escape_path_component(id.archive_id()))
            .join(escape_path_component(id.column_type()))
            .join(escape_path_component(id.column_name()))
            .join(escape_path_component(&id.timestamp().to_string()))
    }

    fn cell_path(dir: &Path, object_id: &str) -> PathBuf {
        dir.join(format!("{}.{CELL_EXTENSION}", escape_path_component(object_id)))
    }

    fn holds_archive(&self, archive_id: &str) -> bool {
        self.archives
            .as_ref()
            .map_or(true, |archives| archives.contains(archive_id))
    }

    /// Every column id with a directory in the store.
    pub fn ingested_columns(&self) -> DalResult<Vec<ColumnId>> {
        let mut ids = Vec::new();
        for entry in WalkDir::new(&self.base_path).min_depth(4).max_depth(4) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(self.base_path.as_path()).to_path_buf();
                DalError::io(path, io::Error::other(e.to_string()))
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.base_path) else {
                continue;
            };
            let parts: Vec<String> = relative
                .iter()
                .map(|c| unescape_component(&c.to_string_lossy()))
                .collect::<Result<_, _>>()?;
            if let [archive_id, column_type, column_name, timestamp] = parts.as_slice() {
                match ColumnTimestamp::parse(timestamp) {
                    Ok(ts) => ids.push(ColumnId::new(
                        archive_id.as_str(),
                        column_type.as_str(),
                        column_name.as_str(),
                        ts,
                    )?),
                    Err(_) => warn!(path = %entry.path().display(), "skipping unrecognised directory"),
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

fn write_cell(path: &Path, payload: &[u8]) -> DalResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| DalError::io(parent, e))?;
    }
    let length = u32::try_from(payload.len())
        .map_err(|_| DalError::Serialization(format!("cell of {} bytes is too large", payload.len())))?;
    let mut framed = Vec::with_capacity(HEADER_SIZE + payload.len());
    framed.extend_from_slice(&length.to_le_bytes());
    framed.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    framed.extend_from_slice(payload);

    // Write beside the target and rename, so readers never see a torn cell.
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &framed).map_err(|e| DalError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| DalError::io(path, e))?;
    Ok(())
}

/// Delete every cell file in `dir` not listed in `keep`.
fn prune_cells(dir: &Path, keep: &BTreeSet<PathBuf>) -> DalResult<usize> {
    let entries = fs::read_dir(dir).map_err(|e| DalError::io(dir, e))?;
    let mut removed = 0;
    for entry in entries {
        let path = entry.map_err(|e| DalError::io(dir, e))?.path();
        let is_cell = path.extension().is_some_and(|ext| ext == CELL_EXTENSION);
        if is_cell && !keep.contains(&path) {
            fs::remove_file(&path).map_err(|e| DalError::io(&path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// `Ok(None)` if the file does not exist.
fn read_cell(path: &Path) -> DalResult<Option<Vec<u8>>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(DalError::io(path, e)),
    };
    let corrupt = |reason: &str| DalError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    if bytes.len() < HEADER_SIZE {
        return Err(corrupt("truncated header"));
    }
    let length = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let crc = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != length {
        return Err(corrupt("length mismatch"));
    }
    if crc32fast::hash(payload) != crc {
        return Err(corrupt("checksum mismatch"));
    }
    Ok(Some(payload.to_vec()))
}

fn decode<T: serde::de::DeserializeOwned>(path: &Path, payload: &[u8]) -> DalResult<T> {
    bincode::deserialize(payload).map_err(|e| DalError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn encode<T: serde::Serialize>(value: &T) -> DalResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DalError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Layer
// ---------------------------------------------------------------------------

impl DataAccessLayer for FileStoreLayer {
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
        let dir = self.column_dir(column.id());
        if !dir.is_dir() {
            return Err(LayerError::not_available(&self.name, "column has not been ingested"));
        }

        if column.value_type().is_array() {
            let path = Self::cell_path(&dir, object_id);
            match read_cell(&path)? {
                Some(payload) => Ok(decode(&path, &payload)?),
                None => Err(LayerError::not_available(&self.name, format!("no cell for {object_id:?}"))),
            }
        } else {
            let path = dir.join(SERIES_FILE);
            let payload = read_cell(&path)?
                .ok_or_else(|| LayerError::not_available(&self.name, "series file is missing"))?;
            let mut series: BTreeMap<String, Value> = decode(&path, &payload)?;
            series
                .remove(object_id)
                .ok_or_else(|| LayerError::not_available(&self.name, format!("no cell for {object_id:?}")))
        }
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
        let dir = self.column_dir(column.id());
        fs::create_dir_all(&dir).map_err(|e| DalError::io(&dir, e))?;

        if column.value_type().is_array() {
            let keep: BTreeSet<PathBuf> = array.values.keys().map(|id| Self::cell_path(&dir, id)).collect();
            let removed = prune_cells(&dir, &keep)?;
            if removed > 0 {
                debug!(layer = %self.name, column = %column.id(), removed, "removed stale cells");
            }
            for (object_id, value) in &array.values {
                cancel.check()?;
                write_cell(&Self::cell_path(&dir, object_id), &encode(value)?)?;
            }
        } else {
            write_cell(&dir.join(SERIES_FILE), &encode(&array.values)?)?;
        }
        for object_id in &array.missing {
            debug!(column = %column.id(), object_id, "no source value; skipped");
        }
        debug!(layer = %self.name, column = %column.id(), written = array.values.len(), "ingested column");

        Ok(IngestReport {
            columns: 1,
            objects_written: array.values.len(),
            objects_missing: array.missing.len(),
        })
    }
}
