use std::collections::BTreeMap;

use crate::cancel::CancelToken;
use crate::column::ColumnArray;
use crate::definition::{ArchiveContext, ColumnDefinition, ColumnMeta};
use crate::error::{ColumnError, ColumnResult};
use crate::value::{PropertyType, Value};

/// A column whose values are supplied in memory.
#[derive(Clone, Debug)]
pub struct ColumnFromData {
    label: String,
    values: BTreeMap<String, Value>,
    value_type: PropertyType,
    meta: ColumnMeta,
}

impl ColumnFromData {
    pub fn new<K, I>(label: impl Into<String>, value_type: PropertyType, values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            label: label.into(),
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            value_type,
            meta: ColumnMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: ColumnMeta) -> Self {
        self.meta = meta;
        self
    }
}

impl ColumnDefinition for ColumnFromData {
    fn column_type(&self) -> &str {
        "ColumnFromData"
    }

    fn column_name(&self) -> String {
        self.label.clone()
    }

    fn value_type(&self) -> PropertyType {
        self.value_type
    }

    fn meta(&self) -> &ColumnMeta {
        &self.meta
    }

    fn read_object(&self, _ctx: &ArchiveContext, object_id: &str, _cancel: &CancelToken) -> ColumnResult<Value> {
        self.values
            .get(object_id)
            .cloned()
            .ok_or_else(|| ColumnError::not_found(&self.label, object_id, "no value supplied"))
    }

    fn read_array(&self, ctx: &ArchiveContext, _cancel: &CancelToken) -> ColumnResult<ColumnArray> {
        Ok(ColumnArray {
            values: self.values.clone(),
            missing: ctx
                .contents()
                .iter()
                .filter(|o| !self.values.contains_key(*o))
                .cloned()
                .collect(),
        })
    }
}
