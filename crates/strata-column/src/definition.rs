//! Column definitions: unbound reader strategies.
//!
//! A definition says *how* to read a column (which files or tables, which
//! key inside them) but not *for which archive*. Binding to an archive
//! happens in [`Column::associate`](crate::Column::associate).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::column::{Column, ColumnArray};
use crate::error::ColumnResult;
use crate::value::{PropertyType, Value};

/// Descriptive metadata attached to a column definition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Fixed revision. Overrides anything the reader can infer.
    pub timestamp: Option<u64>,
    pub unit: Option<String>,
    /// IVOA unified content descriptor.
    pub ucd: Option<String>,
    pub pretty_name: Option<String>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
}

impl ColumnMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_ucd(mut self, ucd: impl Into<String>) -> Self {
        self.ucd = Some(ucd.into());
        self
    }

    pub fn with_pretty_name(mut self, name: impl Into<String>) -> Self {
        self.pretty_name = Some(name.into());
        self
    }

    pub fn with_short_description(mut self, text: impl Into<String>) -> Self {
        self.short_description = Some(text.into());
        self
    }

    pub fn with_long_description(mut self, text: impl Into<String>) -> Self {
        self.long_description = Some(text.into());
        self
    }
}

/// What a definition needs to know about the archive it is bound to.
#[derive(Clone, Debug)]
pub struct ArchiveContext {
    archive_id: String,
    basepath: Option<PathBuf>,
    contents: Arc<[String]>,
}

impl ArchiveContext {
    pub fn new(archive_id: impl Into<String>, basepath: Option<PathBuf>, contents: Vec<String>) -> Self {
        Self {
            archive_id: archive_id.into(),
            basepath,
            contents: contents.into(),
        }
    }

    pub fn archive_id(&self) -> &str {
        &self.archive_id
    }

    pub fn basepath(&self) -> Option<&Path> {
        self.basepath.as_deref()
    }

    /// Every object id in the archive, in archive order.
    pub fn contents(&self) -> &[String] {
        &self.contents
    }

    pub fn contains(&self, object_id: &str) -> bool {
        self.contents.iter().any(|o| o == object_id)
    }

    /// Resolve a source path relative to the archive's base path.
    pub fn resolve_path(&self, relative: &str) -> PathBuf {
        match &self.basepath {
            Some(base) => base.join(relative),
            None => PathBuf::from(relative),
        }
    }
}

/// An unbound strategy for reading one column.
///
/// Implementations read raw values; coercion to [`value_type`] happens in
/// the bound [`Column`](crate::Column). A reader signals "this object is
/// not covered" with [`ColumnError::NotFound`](crate::ColumnError::NotFound)
/// and anything else (I/O, parse, SQL failures) with the matching error.
///
/// [`value_type`]: ColumnDefinition::value_type
pub trait ColumnDefinition: Send + Sync + fmt::Debug {
    /// The strategy name; becomes the `column_type` of the column id.
    fn column_type(&self) -> &str;

    /// The strategy-specific locator; becomes the `column_name`.
    fn column_name(&self) -> String;

    /// The declared value type.
    fn value_type(&self) -> PropertyType;

    fn meta(&self) -> &ColumnMeta;

    /// Revision inferred from the source, typically the newest modification
    /// time among its files. `None` if the reader cannot tell.
    fn timestamp_hint(&self, _ctx: &ArchiveContext) -> Option<u64> {
        None
    }

    /// Read one object's value.
    fn read_object(&self, ctx: &ArchiveContext, object_id: &str, cancel: &CancelToken) -> ColumnResult<Value>;

    /// Read every object in the archive.
    ///
    /// The default visits each object through [`read_object`], recording
    /// not-found objects as missing. Table-backed readers override this to
    /// read their source once.
    ///
    /// [`read_object`]: ColumnDefinition::read_object
    fn read_array(&self, ctx: &ArchiveContext, cancel: &CancelToken) -> ColumnResult<ColumnArray> {
        let mut array = ColumnArray::default();
        for object_id in ctx.contents() {
            cancel.check()?;
            match self.read_object(ctx, object_id, cancel) {
                Ok(value) => {
                    array.values.insert(object_id.clone(), value);
                }
                Err(e) if e.is_not_found() => array.missing.push(object_id.clone()),
                Err(e) => return Err(e),
            }
        }
        Ok(array)
    }
}

impl dyn ColumnDefinition {
    /// Bind this definition to an archive; see [`Column::associate`].
    pub fn associate(self: Arc<Self>, context: Arc<ArchiveContext>) -> ColumnResult<Column> {
        Column::associate(self, context)
    }
}

/// Seconds since the epoch of a file's last modification.
pub(crate) fn modified_secs(path: &Path) -> Option<u64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    modified.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

/// Substitute `{object_id}` in a file pattern.
pub(crate) fn render_pattern(pattern: &str, object_id: &str) -> String {
    pattern.replace("{object_id}", object_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_builder() {
        let meta = ColumnMeta::new()
            .with_unit("erg/s")
            .with_pretty_name("Flux")
            .with_timestamp(5);
        assert_eq!(meta.unit.as_deref(), Some("erg/s"));
        assert_eq!(meta.timestamp, Some(5));
        assert_eq!(meta.ucd, None);
    }

    #[test]
    fn context_resolves_relative_paths() {
        let ctx = ArchiveContext::new("A", Some(PathBuf::from("/data")), vec!["x".into()]);
        assert_eq!(ctx.resolve_path("x/y.json"), PathBuf::from("/data/x/y.json"));
        assert!(ctx.contains("x"));
        assert!(!ctx.contains("y"));

        let bare = ArchiveContext::new("A", None, Vec::new());
        assert_eq!(bare.resolve_path("y.json"), PathBuf::from("y.json"));
    }

    #[test]
    fn pattern_substitutes_every_occurrence() {
        assert_eq!(
            render_pattern("{object_id}/{object_id}_red.json", "Gal1"),
            "Gal1/Gal1_red.json"
        );
    }
}
