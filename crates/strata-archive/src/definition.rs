//! Declaring archives: the [`ArchiveDefinition`] trait and the static
//! [`ArchiveBuilder`].

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata_column::{ArchiveContext, Column, ColumnDefinition, ColumnList};
use strata_dal::DataAccessLayerHost;
use strata_traits::{DefaultsRegistry, TraitMapping, TraitRegistry};
use tracing::info;

use crate::archive::Archive;
use crate::error::{ArchiveError, ArchiveResult};

/// A column definition with an optional alias for mappings to refer to.
#[derive(Clone, Debug)]
pub struct ColumnEntry {
    pub alias: Option<String>,
    pub definition: Arc<dyn ColumnDefinition>,
}

impl ColumnEntry {
    pub fn new(definition: Arc<dyn ColumnDefinition>) -> Self {
        Self {
            alias: None,
            definition,
        }
    }

    pub fn aliased(alias: impl Into<String>, definition: Arc<dyn ColumnDefinition>) -> Self {
        Self {
            alias: Some(alias.into()),
            definition,
        }
    }
}

/// Describes a kind of archive. One definition can open many physical
/// datasets, each at its own base path.
pub trait ArchiveDefinition {
    /// The id of the archive at `basepath`.
    fn archive_id(&self, basepath: Option<&Path>) -> String;

    /// Every object id of the archive at `basepath`.
    fn contents(&self, basepath: Option<&Path>) -> ArchiveResult<Vec<String>>;

    fn columns(&self) -> Vec<ColumnEntry>;

    /// Trait mappings. Column sources may use aliases from
    /// [`columns`](Self::columns).
    fn trait_mappings(&self) -> ArchiveResult<Vec<TraitMapping>>;

    /// Branch/version defaults per trait name.
    fn defaults(&self) -> Vec<(String, DefaultsRegistry)> {
        Vec::new()
    }
}

/// The names of the sub-directories of `dir`, sorted. Archives that keep
/// one directory per object use this for contents discovery.
pub fn contents_from_directory(dir: &Path) -> ArchiveResult<Vec<String>> {
    let io_err = |source| ArchiveError::Contents {
        path: dir.to_path_buf(),
        source,
    };
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.file_type().map_err(io_err)?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Builds an [`Archive`] from statically supplied parts.
#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    archive_id: String,
    basepath: Option<PathBuf>,
    contents: Vec<String>,
    columns: Vec<ColumnEntry>,
    mappings: Vec<TraitMapping>,
    defaults: Vec<(String, DefaultsRegistry)>,
    dal: Option<Arc<DataAccessLayerHost>>,
}

impl ArchiveBuilder {
    pub fn new(archive_id: impl Into<String>) -> Self {
        Self {
            archive_id: archive_id.into(),
            ..Self::default()
        }
    }

    pub fn basepath(mut self, path: impl Into<PathBuf>) -> Self {
        self.basepath = Some(path.into());
        self
    }

    pub fn contents<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.contents.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn column(mut self, definition: Arc<dyn ColumnDefinition>) -> Self {
        self.columns.push(ColumnEntry::new(definition));
        self
    }

    pub fn aliased_column(mut self, alias: impl Into<String>, definition: Arc<dyn ColumnDefinition>) -> Self {
        self.columns.push(ColumnEntry::aliased(alias, definition));
        self
    }

    pub fn mapping(mut self, mapping: TraitMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    pub fn defaults(mut self, trait_name: impl Into<String>, defaults: DefaultsRegistry) -> Self {
        self.defaults.push((trait_name.into(), defaults));
        self
    }

    /// Use `dal` for lookups. Without one the archive gets an empty host,
    /// so every read falls back to the column sources.
    pub fn dal(mut self, dal: Arc<DataAccessLayerHost>) -> Self {
        self.dal = Some(dal);
        self
    }

    /// Bind columns, register mappings, and apply defaults.
    ///
    /// Contents are deduplicated, keeping the first occurrence.
    pub fn build(self) -> ArchiveResult<Archive> {
        if self.archive_id.is_empty() {
            return Err(ArchiveError::Validation("archive id must not be empty".into()));
        }
        let mut seen = HashSet::new();
        let contents: Vec<String> = self
            .contents
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        let context = Arc::new(ArchiveContext::new(self.archive_id, self.basepath, contents));

        let mut columns = ColumnList::new();
        for entry in self.columns {
            let column = Column::associate(entry.definition, Arc::clone(&context))?;
            columns.add(column, entry.alias.as_deref())?;
        }

        let dal = self.dal.unwrap_or_else(|| Arc::new(DataAccessLayerHost::new()));
        let mut archive = Archive::from_parts(context, columns, TraitRegistry::new(), dal);
        for mapping in self.mappings {
            archive.register(mapping)?;
        }
        for (trait_name, defaults) in self.defaults {
            archive.set_defaults(&trait_name, defaults)?;
        }

        info!(
            archive = archive.archive_id(),
            objects = archive.contents().len(),
            columns = archive.columns().len(),
            traits = archive.registry().len(),
            "built archive"
        );
        Ok(archive)
    }
}

impl Archive {
    /// Open the archive `definition` describes at `basepath`.
    pub fn from_definition(
        definition: &dyn ArchiveDefinition,
        basepath: Option<&Path>,
        dal: Arc<DataAccessLayerHost>,
    ) -> ArchiveResult<Archive> {
        let mut builder = ArchiveBuilder::new(definition.archive_id(basepath))
            .contents(definition.contents(basepath)?)
            .dal(dal);
        if let Some(path) = basepath {
            builder = builder.basepath(path);
        }
        for entry in definition.columns() {
            builder.columns.push(entry);
        }
        for mapping in definition.trait_mappings()? {
            builder = builder.mapping(mapping);
        }
        for (trait_name, defaults) in definition.defaults() {
            builder = builder.defaults(trait_name, defaults);
        }
        builder.build()
    }
}
