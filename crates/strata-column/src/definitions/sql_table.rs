//! Reader for SQL tables reached through an injected [`SqlHandle`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::types::Value as SqlValue;

use crate::cancel::CancelToken;
use crate::column::ColumnArray;
use crate::definition::{ArchiveContext, ColumnDefinition, ColumnMeta};
use crate::error::{ColumnError, ColumnResult};
use crate::sql::{validate_identifier, SqlHandle};
use crate::value::{PropertyType, Value};

/// One scalar column of a SQL table, indexed by an object id column.
#[derive(Clone, Debug)]
pub struct SqlTableColumn {
    handle: Arc<SqlHandle>,
    table: String,
    index_column: String,
    column: String,
    value_type: PropertyType,
    meta: ColumnMeta,
}

impl SqlTableColumn {
    /// Fails if any identifier is not a plain SQL name, or if `value_type`
    /// is an array type.
    pub fn new(
        handle: Arc<SqlHandle>,
        table: impl Into<String>,
        index_column: impl Into<String>,
        column: impl Into<String>,
        value_type: PropertyType,
    ) -> ColumnResult<Self> {
        let (table, index_column, column) = (table.into(), index_column.into(), column.into());
        validate_identifier(&table)?;
        validate_identifier(&index_column)?;
        validate_identifier(&column)?;
        if value_type.is_array() {
            return Err(ColumnError::InvalidDefinition(format!(
                "sql columns hold scalars, not {value_type}"
            )));
        }
        Ok(Self {
            handle,
            table,
            index_column,
            column,
            value_type,
            meta: ColumnMeta::default(),
        })
    }

    pub fn with_meta(mut self, meta: ColumnMeta) -> Self {
        self.meta = meta;
        self
    }

    fn convert(&self, cell: SqlValue) -> ColumnResult<Option<Value>> {
        match cell {
            SqlValue::Null => Ok(None),
            SqlValue::Integer(i) => Ok(Some(Value::Int(i))),
            SqlValue::Real(f) => Ok(Some(Value::Float(f))),
            SqlValue::Text(s) => Ok(Some(Value::Str(s))),
            SqlValue::Blob(_) => Err(ColumnError::Parse {
                path: PathBuf::from(self.handle.label()),
                reason: format!("{}.{} holds a blob", self.table, self.column),
            }),
        }
    }
}

fn index_key(cell: &SqlValue) -> Option<String> {
    match cell {
        SqlValue::Integer(i) => Some(i.to_string()),
        SqlValue::Text(s) => Some(s.clone()),
        _ => None,
    }
}

impl ColumnDefinition for SqlTableColumn {
    fn column_type(&self) -> &str {
        "SqlTableColumn"
    }

    fn column_name(&self) -> String {
        format!("{}[{}->{}]", self.table, self.index_column, self.column)
    }

    fn value_type(&self) -> PropertyType {
        self.value_type
    }

    fn meta(&self) -> &ColumnMeta {
        &self.meta
    }

    fn read_object(&self, _ctx: &ArchiveContext, object_id: &str, cancel: &CancelToken) -> ColumnResult<Value> {
        let sql = format!(
            "SELECT \"{}\" FROM \"{}\" WHERE \"{}\" = ?1",
            self.column, self.table, self.index_column
        );
        let mut cells = self.handle.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([object_id], |row| row.get::<_, SqlValue>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;
        cancel.check()?;

        match cells.len() {
            0 => Err(ColumnError::not_found("", object_id, "no matching row")),
            1 => {
                let cell = cells.remove(0);
                self.convert(cell)?
                    .ok_or_else(|| ColumnError::not_found("", object_id, "value is null"))
            }
            count => Err(ColumnError::MultipleResults {
                column: String::new(),
                object_id: object_id.to_string(),
                count,
            }),
        }
    }

    fn read_array(&self, ctx: &ArchiveContext, cancel: &CancelToken) -> ColumnResult<ColumnArray> {
        let sql = format!(
            "SELECT \"{}\", \"{}\" FROM \"{}\"",
            self.index_column, self.column, self.table
        );
        let rows = self.handle.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, SqlValue>(0)?, row.get::<_, SqlValue>(1)?))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;

        let mut grouped: BTreeMap<String, Vec<SqlValue>> = BTreeMap::new();
        for (index, cell) in rows {
            cancel.check()?;
            if let Some(key) = index_key(&index) {
                grouped.entry(key).or_default().push(cell);
            }
        }

        let mut array = ColumnArray::default();
        for (object_id, mut cells) in grouped {
            if cells.len() > 1 {
                return Err(ColumnError::MultipleResults {
                    column: String::new(),
                    object_id,
                    count: cells.len(),
                });
            }
            match cells.pop().map(|cell| self.convert(cell)).transpose()?.flatten() {
                Some(value) => {
                    array.values.insert(object_id, value);
                }
                None => array.missing.push(object_id),
            }
        }
        for object_id in ctx.contents() {
            if !array.values.contains_key(object_id) && !array.missing.contains(object_id) {
                array.missing.push(object_id.clone());
            }
        }
        Ok(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> Arc<SqlHandle> {
        let handle = SqlHandle::open_in_memory().unwrap();
        handle
            .with_connection(|c| {
                c.execute_batch(
                    "CREATE TABLE galaxies (id TEXT, z REAL, nspec INTEGER, blob BLOB);
                     INSERT INTO galaxies VALUES ('Gal1', 0.05, 2, NULL);
                     INSERT INTO galaxies VALUES ('Gal2', NULL, 1, x'00');
                     INSERT INTO galaxies VALUES ('Dup', 0.3, 1, NULL);
                     INSERT INTO galaxies VALUES ('Dup', 0.4, 1, NULL);",
                )
            })
            .unwrap();
        Arc::new(handle)
    }

    fn context() -> ArchiveContext {
        ArchiveContext::new("Example", None, vec!["Gal1".into(), "Gal2".into(), "Gal3".into()])
    }

    #[test]
    fn reads_single_cells() {
        let def = SqlTableColumn::new(handle(), "galaxies", "id", "z", PropertyType::Float).unwrap();
        let token = CancelToken::new();
        assert_eq!(def.read_object(&context(), "Gal1", &token).unwrap(), Value::Float(0.05));
        assert!(def.read_object(&context(), "Gal2", &token).unwrap_err().is_not_found());
        assert!(def.read_object(&context(), "Gal3", &token).unwrap_err().is_not_found());
        assert_eq!(def.column_name(), "galaxies[id->z]");
    }

    #[test]
    fn duplicate_rows_are_multiple_results() {
        let def = SqlTableColumn::new(handle(), "galaxies", "id", "z", PropertyType::Float).unwrap();
        let err = def.read_object(&context(), "Dup", &CancelToken::new()).unwrap_err();
        assert!(matches!(err, ColumnError::MultipleResults { count: 2, .. }));
    }

    #[test]
    fn bulk_read_reports_duplicates() {
        let def = SqlTableColumn::new(handle(), "galaxies", "id", "nspec", PropertyType::Int).unwrap();
        assert!(matches!(
            def.read_array(&context(), &CancelToken::new()),
            Err(ColumnError::MultipleResults { .. })
        ));
    }

    #[test]
    fn blob_cells_are_rejected() {
        let def = SqlTableColumn::new(handle(), "galaxies", "id", "blob", PropertyType::String).unwrap();
        assert!(matches!(
            def.read_object(&context(), "Gal2", &CancelToken::new()),
            Err(ColumnError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_unsafe_identifiers_and_arrays() {
        assert!(SqlTableColumn::new(handle(), "galaxies; DROP", "id", "z", PropertyType::Float).is_err());
        assert!(SqlTableColumn::new(handle(), "galaxies", "id", "z", PropertyType::FloatArray).is_err());
    }

    #[test]
    fn closed_handle_is_an_error() {
        let h = handle();
        let def = SqlTableColumn::new(Arc::clone(&h), "galaxies", "id", "z", PropertyType::Float).unwrap();
        h.close().unwrap();
        assert!(matches!(
            def.read_object(&context(), "Gal1", &CancelToken::new()),
            Err(ColumnError::HandleClosed(_))
        ));
    }
}
