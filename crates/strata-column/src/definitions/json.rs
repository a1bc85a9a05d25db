//! Readers for JSON sources: one document per object, or one table of
//! records for the whole archive.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use serde_json::Value as Json;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::column::ColumnArray;
use crate::definition::{modified_secs, render_pattern, ArchiveContext, ColumnDefinition, ColumnMeta};
use crate::error::{ColumnError, ColumnResult};
use crate::value::{PropertyType, Value};

fn read_json(path: &Path, object_id: &str) -> ColumnResult<Json> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ColumnError::not_found(
                "",
                object_id,
                format!("{} does not exist", path.display()),
            ));
        }
        Err(source) => {
            return Err(ColumnError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&text).map_err(|e| ColumnError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn convert(json: &Json, path: &Path, object_id: &str) -> ColumnResult<Value> {
    match Value::from_json(json) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(ColumnError::not_found("", object_id, "value is null")),
        Err(reason) => Err(ColumnError::Parse {
            path: path.to_path_buf(),
            reason,
        }),
    }
}

// ---------------------------------------------------------------------------
// JsonDocumentColumn
// ---------------------------------------------------------------------------

/// One JSON document per object; the value sits at a dotted key path.
///
/// Path segments index into objects by name and into arrays by position,
/// so `detector.gains.0` reads the first gain. An empty key path selects
/// the whole document.
#[derive(Clone, Debug)]
pub struct JsonDocumentColumn {
    filename_pattern: String,
    key_path: String,
    value_type: PropertyType,
    meta: ColumnMeta,
}

impl JsonDocumentColumn {
    pub fn new(
        filename_pattern: impl Into<String>,
        key_path: impl Into<String>,
        value_type: PropertyType,
    ) -> Self {
        Self {
            filename_pattern: filename_pattern.into(),
            key_path: key_path.into(),
            value_type,
            meta: ColumnMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: ColumnMeta) -> Self {
        self.meta = meta;
        self
    }

    fn path_for(&self, ctx: &ArchiveContext, object_id: &str) -> PathBuf {
        ctx.resolve_path(&render_pattern(&self.filename_pattern, object_id))
    }

    fn descend<'a>(&self, doc: &'a Json) -> Option<&'a Json> {
        if self.key_path.is_empty() {
            return Some(doc);
        }
        self.key_path.split('.').try_fold(doc, |node, segment| match node {
            Json::Object(map) => map.get(segment),
            Json::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

impl ColumnDefinition for JsonDocumentColumn {
    fn column_type(&self) -> &str {
        "JsonDocumentColumn"
    }

    fn column_name(&self) -> String {
        format!("{}[{}]", self.filename_pattern, self.key_path)
    }

    fn value_type(&self) -> PropertyType {
        self.value_type
    }

    fn meta(&self) -> &ColumnMeta {
        &self.meta
    }

    fn timestamp_hint(&self, ctx: &ArchiveContext) -> Option<u64> {
        ctx.contents()
            .iter()
            .filter_map(|object_id| modified_secs(&self.path_for(ctx, object_id)))
            .max()
    }

    fn read_object(&self, ctx: &ArchiveContext, object_id: &str, _cancel: &CancelToken) -> ColumnResult<Value> {
        let path = self.path_for(ctx, object_id);
        let doc = read_json(&path, object_id)?;
        let node = self.descend(&doc).ok_or_else(|| {
            ColumnError::not_found(
                "",
                object_id,
                format!("{} has no key {:?}", path.display(), self.key_path),
            )
        })?;
        convert(node, &path, object_id)
    }
}

// ---------------------------------------------------------------------------
// JsonTableColumn
// ---------------------------------------------------------------------------

/// One JSON file holding an array of records for the whole archive.
///
/// Each record is an object; `index_column` names the field holding the
/// object id and `column` the field holding the value. An object id that
/// appears in more than one record is reported as
/// [`ColumnError::MultipleResults`] rather than silently picking one.
#[derive(Clone, Debug)]
pub struct JsonTableColumn {
    filename: String,
    index_column: String,
    column: String,
    value_type: PropertyType,
    meta: ColumnMeta,
    cache: Arc<Mutex<Option<TableCache>>>,
}

type Rows = BTreeMap<String, Vec<Option<Value>>>;

/// Parsed table plus the file identity it was parsed from.
#[derive(Debug)]
struct TableCache {
    path: PathBuf,
    modified: Option<SystemTime>,
    len: u64,
    rows: Arc<Rows>,
}

impl JsonTableColumn {
    pub fn new(
        filename: impl Into<String>,
        index_column: impl Into<String>,
        column: impl Into<String>,
        value_type: PropertyType,
    ) -> Self {
        Self {
            filename: filename.into(),
            index_column: index_column.into(),
            column: column.into(),
            value_type,
            meta: ColumnMeta::default(),
            cache: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_meta(mut self, meta: ColumnMeta) -> Self {
        self.meta = meta;
        self
    }

    /// The grouped table, parsed at most once per version of the file.
    /// A changed length or modification time forces a re-parse.
    fn rows(&self, ctx: &ArchiveContext, cancel: &CancelToken) -> ColumnResult<Arc<Rows>> {
        let path = ctx.resolve_path(&self.filename);
        let (modified, len) = match fs::metadata(&path) {
            Ok(meta) => (meta.modified().ok(), meta.len()),
            // Let load report the missing or unreadable file.
            Err(_) => return self.load(ctx, cancel).map(Arc::new),
        };
        let mut cache = self.cache.lock().map_err(|_| ColumnError::Parse {
            path: path.clone(),
            reason: "table cache lock poisoned".into(),
        })?;
        if let Some(hit) = cache.as_ref() {
            if hit.path == path && hit.modified == modified && hit.len == len {
                return Ok(Arc::clone(&hit.rows));
            }
        }
        let rows = Arc::new(self.load(ctx, cancel)?);
        *cache = Some(TableCache {
            path,
            modified,
            len,
            rows: Arc::clone(&rows),
        });
        Ok(rows)
    }

    /// Read the table, grouping cells by object id.
    fn load(&self, ctx: &ArchiveContext, cancel: &CancelToken) -> ColumnResult<Rows> {
        let path = ctx.resolve_path(&self.filename);
        let doc = read_json(&path, "*")?;
        let Json::Array(records) = doc else {
            return Err(ColumnError::Parse {
                path,
                reason: "expected an array of records".into(),
            });
        };

        let mut rows = Rows::new();
        for (n, record) in records.iter().enumerate() {
            cancel.check()?;
            let index = match record.get(&self.index_column) {
                Some(Json::String(s)) => s.clone(),
                Some(Json::Number(n)) => n.to_string(),
                _ => {
                    return Err(ColumnError::Parse {
                        path,
                        reason: format!("record {n} has no usable {:?} field", self.index_column),
                    })
                }
            };
            let cell = match record.get(&self.column) {
                None | Some(Json::Null) => None,
                Some(json) => Some(convert(json, &path, &index)?),
            };
            rows.entry(index).or_default().push(cell);
        }
        debug!(path = %path.display(), rows = records.len(), "loaded json table");
        Ok(rows)
    }
}

impl ColumnDefinition for JsonTableColumn {
    fn column_type(&self) -> &str {
        "JsonTableColumn"
    }

    fn column_name(&self) -> String {
        format!("{}[{}->{}]", self.filename, self.index_column, self.column)
    }

    fn value_type(&self) -> PropertyType {
        self.value_type
    }

    fn meta(&self) -> &ColumnMeta {
        &self.meta
    }

    fn timestamp_hint(&self, ctx: &ArchiveContext) -> Option<u64> {
        modified_secs(&ctx.resolve_path(&self.filename))
    }

    fn read_object(&self, ctx: &ArchiveContext, object_id: &str, cancel: &CancelToken) -> ColumnResult<Value> {
        let rows = self.rows(ctx, cancel).map_err(|e| match e {
            ColumnError::NotFound { reason, .. } => ColumnError::not_found("", object_id, reason),
            other => other,
        })?;
        match rows.get(object_id) {
            None => Err(ColumnError::not_found("", object_id, "no matching record")),
            Some(cells) if cells.len() > 1 => Err(ColumnError::MultipleResults {
                column: String::new(),
                object_id: object_id.to_string(),
                count: cells.len(),
            }),
            Some(cells) => cells
                .last()
                .cloned()
                .flatten()
                .ok_or_else(|| ColumnError::not_found("", object_id, "value is null")),
        }
    }

    fn read_array(&self, ctx: &ArchiveContext, cancel: &CancelToken) -> ColumnResult<ColumnArray> {
        let rows = match self.rows(ctx, cancel) {
            Ok(rows) => rows,
            Err(e) if e.is_not_found() => {
                return Ok(ColumnArray {
                    values: BTreeMap::new(),
                    missing: ctx.contents().to_vec(),
                })
            }
            Err(e) => return Err(e),
        };

        let mut array = ColumnArray::default();
        for (object_id, cells) in rows.iter() {
            if cells.len() > 1 {
                return Err(ColumnError::MultipleResults {
                    column: String::new(),
                    object_id: object_id.clone(),
                    count: cells.len(),
                });
            }
            match cells.last().cloned().flatten() {
                Some(value) => {
                    array.values.insert(object_id.clone(), value);
                }
                None => array.missing.push(object_id.clone()),
            }
        }
        Ok(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use strata_keys::ColumnTimestamp;
    use tempfile::TempDir;

    use crate::column::Column;

    fn context(dir: &TempDir, objects: &[&str]) -> Arc<ArchiveContext> {
        Arc::new(ArchiveContext::new(
            "Example",
            Some(dir.path().to_path_buf()),
            objects.iter().map(|s| s.to_string()).collect(),
        ))
    }

    fn write(dir: &TempDir, name: &str, body: &str) {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }

    // ---- JsonDocumentColumn ----

    #[test]
    fn document_reads_nested_key() {
        let dir = TempDir::new().unwrap();
        write(&dir, "Gal1/Gal1_red.json", r#"{"header": {"EXPOSED": 1200.5}}"#);
        let def = JsonDocumentColumn::new("{object_id}/{object_id}_red.json", "header.EXPOSED", PropertyType::Float);
        let ctx = context(&dir, &["Gal1"]);
        assert_eq!(def.read_object(&ctx, "Gal1", &CancelToken::new()).unwrap(), Value::Float(1200.5));
        assert_eq!(def.column_name(), "{object_id}/{object_id}_red.json[header.EXPOSED]");
    }

    #[test]
    fn document_reads_array_index() {
        let dir = TempDir::new().unwrap();
        write(&dir, "Gal1.json", r#"{"gains": [1.5, 2.5]}"#);
        let def = JsonDocumentColumn::new("{object_id}.json", "gains.1", PropertyType::Float);
        let ctx = context(&dir, &["Gal1"]);
        assert_eq!(def.read_object(&ctx, "Gal1", &CancelToken::new()).unwrap(), Value::Float(2.5));
    }

    #[test]
    fn document_missing_file_or_key_is_not_found() {
        let dir = TempDir::new().unwrap();
        write(&dir, "Gal1.json", r#"{"a": null}"#);
        let ctx = context(&dir, &["Gal1", "Gal2"]);
        let token = CancelToken::new();

        let missing_file = JsonDocumentColumn::new("{object_id}.json", "a", PropertyType::Float);
        assert!(missing_file.read_object(&ctx, "Gal2", &token).unwrap_err().is_not_found());

        let missing_key = JsonDocumentColumn::new("{object_id}.json", "b", PropertyType::Float);
        assert!(missing_key.read_object(&ctx, "Gal1", &token).unwrap_err().is_not_found());

        let null_value = JsonDocumentColumn::new("{object_id}.json", "a", PropertyType::Float);
        assert!(null_value.read_object(&ctx, "Gal1", &token).unwrap_err().is_not_found());
    }

    #[test]
    fn document_malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "Gal1.json", "{not json");
        let ctx = context(&dir, &["Gal1"]);
        let def = JsonDocumentColumn::new("{object_id}.json", "a", PropertyType::Float);
        let err = def.read_object(&ctx, "Gal1", &CancelToken::new()).unwrap_err();
        assert!(matches!(err, ColumnError::Parse { .. }));
    }

    #[test]
    fn document_timestamp_comes_from_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, "Gal1.json", r#"{"a": 1}"#);
        let ctx = context(&dir, &["Gal1", "Gal2"]);
        let def: Arc<dyn ColumnDefinition> =
            Arc::new(JsonDocumentColumn::new("{object_id}.json", "a", PropertyType::Int));
        let column = Column::associate(def, ctx).unwrap();
        assert!(matches!(column.id().timestamp(), ColumnTimestamp::At(ts) if ts > 0));
    }

    #[test]
    fn document_array_skips_missing_objects() {
        let dir = TempDir::new().unwrap();
        write(&dir, "Gal1.json", r#"{"data": [[1, 2], [3, 4]]}"#);
        let ctx = context(&dir, &["Gal1", "Gal2"]);
        let def: Arc<dyn ColumnDefinition> =
            Arc::new(JsonDocumentColumn::new("{object_id}.json", "data", PropertyType::FloatArray));
        let column = Column::associate(def, ctx).unwrap();
        let array = column.get_array().unwrap();
        let data = array.get("Gal1").unwrap().as_float_array().unwrap();
        assert_eq!(data.shape(), &[2, 2]);
        assert_eq!(array.missing, vec!["Gal2".to_string()]);
    }

    // ---- JsonTableColumn ----

    const CATALOG: &str = r#"[
        {"ID": "Gal1", "z": 0.05, "name": "first"},
        {"ID": "Gal2", "z": null, "name": "second"},
        {"ID": 3, "z": 0.2, "name": "third"}
    ]"#;

    #[test]
    fn table_reads_one_object() {
        let dir = TempDir::new().unwrap();
        write(&dir, "cat.json", CATALOG);
        let ctx = context(&dir, &["Gal1", "Gal2", "3"]);
        let def = JsonTableColumn::new("cat.json", "ID", "z", PropertyType::Float);
        let token = CancelToken::new();
        assert_eq!(def.read_object(&ctx, "Gal1", &token).unwrap(), Value::Float(0.05));
        assert_eq!(def.read_object(&ctx, "3", &token).unwrap(), Value::Float(0.2));
        assert!(def.read_object(&ctx, "Gal2", &token).unwrap_err().is_not_found());
        assert!(def.read_object(&ctx, "Gal9", &token).unwrap_err().is_not_found());
        assert_eq!(def.column_name(), "cat.json[ID->z]");
    }

    #[test]
    fn table_bulk_read() {
        let dir = TempDir::new().unwrap();
        write(&dir, "cat.json", CATALOG);
        let ctx = context(&dir, &["Gal1", "Gal2", "3", "Gal4"]);
        let def: Arc<dyn ColumnDefinition> =
            Arc::new(JsonTableColumn::new("cat.json", "ID", "name", PropertyType::String));
        let array = Column::associate(def, ctx).unwrap().get_array().unwrap();
        assert_eq!(array.len(), 3);
        assert_eq!(array.get("3"), Some(&Value::Str("third".into())));
        assert_eq!(array.missing, vec!["Gal4".to_string()]);
    }

    #[test]
    fn table_duplicate_index_is_multiple_results() {
        let dir = TempDir::new().unwrap();
        write(&dir, "cat.json", r#"[{"ID": "Gal1", "z": 1}, {"ID": "Gal1", "z": 2}, {"ID": "Gal2", "z": 3}]"#);
        let ctx = context(&dir, &["Gal1", "Gal2"]);
        let def = JsonTableColumn::new("cat.json", "ID", "z", PropertyType::Float);
        let token = CancelToken::new();

        let err = def.read_object(&ctx, "Gal1", &token).unwrap_err();
        assert!(matches!(err, ColumnError::MultipleResults { count: 2, .. }));
        assert_eq!(def.read_object(&ctx, "Gal2", &token).unwrap(), Value::Int(3));
        assert!(matches!(
            def.read_array(&ctx, &token),
            Err(ColumnError::MultipleResults { .. })
        ));
    }

    #[test]
    fn table_parsed_once_per_file_version() {
        let dir = TempDir::new().unwrap();
        write(&dir, "cat.json", CATALOG);
        let ctx = context(&dir, &["Gal1", "Gal2", "3"]);
        let def = JsonTableColumn::new("cat.json", "ID", "z", PropertyType::Float);
        let token = CancelToken::new();

        let first = def.rows(&ctx, &token).unwrap();
        assert_eq!(def.read_object(&ctx, "Gal1", &token).unwrap(), Value::Float(0.05));
        assert_eq!(def.read_object(&ctx, "3", &token).unwrap(), Value::Float(0.2));
        assert!(Arc::ptr_eq(&first, &def.rows(&ctx, &token).unwrap()));

        // Shorter rewrite: caught by length even within the same mtime tick.
        write(&dir, "cat.json", r#"[{"ID": "Gal1", "z": 0.75}]"#);
        let second = def.rows(&ctx, &token).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(def.read_object(&ctx, "Gal1", &token).unwrap(), Value::Float(0.75));
        assert!(def.read_object(&ctx, "3", &token).unwrap_err().is_not_found());
    }

    #[test]
    fn table_missing_file() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, &["Gal1"]);
        let def = JsonTableColumn::new("cat.json", "ID", "z", PropertyType::Float);
        let token = CancelToken::new();
        assert!(def.read_object(&ctx, "Gal1", &token).unwrap_err().is_not_found());
        let array = def.read_array(&ctx, &token).unwrap();
        assert_eq!(array.missing, vec!["Gal1".to_string()]);
    }

    #[test]
    fn table_rejects_non_array_document() {
        let dir = TempDir::new().unwrap();
        write(&dir, "cat.json", r#"{"ID": "Gal1"}"#);
        let ctx = context(&dir, &["Gal1"]);
        let def = JsonTableColumn::new("cat.json", "ID", "z", PropertyType::Float);
        assert!(matches!(
            def.read_object(&ctx, "Gal1", &CancelToken::new()),
            Err(ColumnError::Parse { .. })
        ));
    }
}
