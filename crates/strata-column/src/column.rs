//! Bound columns and the per-archive column list.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use strata_keys::{ColumnId, ColumnTimestamp};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::definition::{ArchiveContext, ColumnDefinition, ColumnMeta};
use crate::error::{ColumnError, ColumnResult};
use crate::value::{PropertyType, Value};

/// The result of a bulk read: one value per covered object, plus the
/// objects the source did not cover.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnArray {
    pub values: BTreeMap<String, Value>,
    pub missing: Vec<String>,
}

impl ColumnArray {
    pub fn get(&self, object_id: &str) -> Option<&Value> {
        self.values.get(object_id)
    }

    /// Number of objects that have a value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A column definition bound to one archive.
///
/// A column owns no physical resource: reads go through its definition
/// with the archive's context. Two columns are equal when their ids are.
#[derive(Clone)]
pub struct Column {
    id: ColumnId,
    definition: Arc<dyn ColumnDefinition>,
    context: Arc<ArchiveContext>,
}

impl Column {
    /// Bind `definition` to the archive described by `context`.
    ///
    /// The timestamp is, in order of preference: the definition's explicit
    /// timestamp, the reader's inferred timestamp, or `latest`. The id is
    /// therefore deterministic, and binding the same definition twice
    /// yields equal columns.
    pub fn associate(
        definition: Arc<dyn ColumnDefinition>,
        context: Arc<ArchiveContext>,
    ) -> ColumnResult<Self> {
        let timestamp = definition
            .meta()
            .timestamp
            .or_else(|| definition.timestamp_hint(&context))
            .map(ColumnTimestamp::At)
            .unwrap_or(ColumnTimestamp::Latest);
        let id = ColumnId::new(
            context.archive_id(),
            definition.column_type(),
            definition.column_name(),
            timestamp,
        )?;
        debug!(column = %id, "associated column");
        Ok(Self {
            id,
            definition,
            context,
        })
    }

    pub fn id(&self) -> &ColumnId {
        &self.id
    }

    pub fn column_type(&self) -> &str {
        self.id.column_type()
    }

    pub fn archive_id(&self) -> &str {
        self.id.archive_id()
    }

    pub fn value_type(&self) -> PropertyType {
        self.definition.value_type()
    }

    pub fn meta(&self) -> &ColumnMeta {
        self.definition.meta()
    }

    pub fn definition(&self) -> &Arc<dyn ColumnDefinition> {
        &self.definition
    }

    pub fn context(&self) -> &ArchiveContext {
        &self.context
    }

    /// Read one object's value from the column's source.
    pub fn get_value(&self, object_id: &str) -> ColumnResult<Value> {
        self.get_value_with(object_id, &CancelToken::new())
    }

    /// [`get_value`](Self::get_value) with an explicit cancellation token.
    pub fn get_value_with(&self, object_id: &str, cancel: &CancelToken) -> ColumnResult<Value> {
        cancel.check()?;
        let raw = self
            .definition
            .read_object(&self.context, object_id, cancel)
            .map_err(|e| self.annotate(e))?;
        raw.coerce(self.value_type())
    }

    /// Read every object in the archive's contents.
    pub fn get_array(&self) -> ColumnResult<ColumnArray> {
        self.get_array_with(&CancelToken::new())
    }

    /// [`get_array`](Self::get_array) with an explicit cancellation token.
    ///
    /// The result covers exactly the archive's contents: objects the reader
    /// returned that the archive does not list are dropped, and listed
    /// objects the reader skipped are recorded as missing.
    pub fn get_array_with(&self, cancel: &CancelToken) -> ColumnResult<ColumnArray> {
        cancel.check()?;
        let mut raw = self
            .definition
            .read_array(&self.context, cancel)
            .map_err(|e| self.annotate(e))?;

        let mut array = ColumnArray::default();
        for object_id in self.context.contents() {
            match raw.values.remove(object_id) {
                Some(value) => {
                    let value = value.coerce(self.value_type())?;
                    array.values.insert(object_id.clone(), value);
                }
                None => array.missing.push(object_id.clone()),
            }
        }
        Ok(array)
    }

    /// Readers do not know the bound id; fill it into their errors.
    fn annotate(&self, err: ColumnError) -> ColumnError {
        match err {
            ColumnError::NotFound {
                object_id, reason, ..
            } => ColumnError::NotFound {
                column: self.id.to_string(),
                object_id,
                reason,
            },
            ColumnError::MultipleResults {
                object_id, count, ..
            } => ColumnError::MultipleResults {
                column: self.id.to_string(),
                object_id,
                count,
            },
            other => other,
        }
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Column {}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("id", &self.id)
            .field("value_type", &self.value_type())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ColumnList
// ---------------------------------------------------------------------------

/// The bound columns of one archive, addressable by id or alias.
#[derive(Clone, Debug, Default)]
pub struct ColumnList {
    columns: BTreeMap<ColumnId, Arc<Column>>,
    order: Vec<ColumnId>,
    aliases: BTreeMap<String, ColumnId>,
}

impl ColumnList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bound column, optionally under an alias.
    ///
    /// Adding a column whose definition is already bound under the same id
    /// returns the existing entry. A *different* definition producing an id
    /// that is already taken is an error, as is reusing an alias for
    /// another column.
    pub fn add(&mut self, column: Column, alias: Option<&str>) -> ColumnResult<Arc<Column>> {
        let id = column.id().clone();
        let entry = match self.columns.get(&id) {
            Some(existing) if Arc::ptr_eq(existing.definition(), column.definition()) => {
                Arc::clone(existing)
            }
            Some(_) => {
                return Err(ColumnError::DuplicateColumn { id: id.to_string() });
            }
            None => {
                let entry = Arc::new(column);
                self.columns.insert(id.clone(), Arc::clone(&entry));
                self.order.push(id.clone());
                entry
            }
        };

        if let Some(alias) = alias {
            match self.aliases.get(alias) {
                Some(existing) if *existing != id => {
                    return Err(ColumnError::DuplicateAlias {
                        alias: alias.to_string(),
                        existing: existing.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    self.aliases.insert(alias.to_string(), id);
                }
            }
        }
        Ok(entry)
    }

    /// Look up a column by alias or by the string form of its id.
    pub fn get(&self, key: &str) -> Option<&Arc<Column>> {
        if let Some(id) = self.aliases.get(key) {
            return self.columns.get(id);
        }
        ColumnId::parse(key)
            .ok()
            .and_then(|id| self.columns.get(&id))
    }

    pub fn get_id(&self, id: &ColumnId) -> Option<&Arc<Column>> {
        self.columns.get(id)
    }

    /// The id a key (alias or id string) refers to.
    pub fn resolve(&self, key: &str) -> ColumnResult<ColumnId> {
        self.get(key)
            .map(|c| c.id().clone())
            .ok_or_else(|| ColumnError::UnknownColumn(key.to_string()))
    }

    /// The alias bound to `id`, if any.
    pub fn alias_of(&self, id: &ColumnId) -> Option<&str> {
        self.aliases
            .iter()
            .find(|(_, target)| *target == id)
            .map(|(alias, _)| alias.as_str())
    }

    /// Columns in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Column>> {
        self.order.iter().filter_map(|id| self.columns.get(id))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
