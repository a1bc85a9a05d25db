//! The [`Archive`]: one physical dataset with its columns, trait registry,
//! and data access layer host.

use std::path::Path;
use std::sync::Arc;

use strata_column::{ArchiveContext, CancelToken, Column, ColumnDefinition, ColumnError, ColumnList, Value};
use strata_dal::{DataAccessLayerHost, DalError, IngestReport, IngestSource, Provenance};
use strata_keys::{ColumnId, IntoTraitKey, IntoTraitPath, TraitKey, TraitPath};
use strata_traits::{
    CellSource, DefaultsRegistry, Schema, SchemaLayout, Trait, TraitError, TraitMapping, TraitRegistry, TraitResult,
};
use tracing::{debug, info};

use crate::error::{ArchiveError, ArchiveResult};

/// An archive with its contents fixed and its columns bound.
///
/// Traits borrow the archive; their values are read through the DAL host
/// with [`Provenance::Any`], so an ingested copy is preferred and the
/// column source is the fallback.
#[derive(Debug)]
pub struct Archive {
    context: Arc<ArchiveContext>,
    columns: ColumnList,
    registry: TraitRegistry,
    dal: Arc<DataAccessLayerHost>,
}

impl Archive {
    pub(crate) fn from_parts(
        context: Arc<ArchiveContext>,
        columns: ColumnList,
        registry: TraitRegistry,
        dal: Arc<DataAccessLayerHost>,
    ) -> Self {
        Self {
            context,
            columns,
            registry,
            dal,
        }
    }

    pub fn archive_id(&self) -> &str {
        self.context.archive_id()
    }

    pub fn basepath(&self) -> Option<&Path> {
        self.context.basepath()
    }

    /// Object ids, in declaration order.
    pub fn contents(&self) -> &[String] {
        self.context.contents()
    }

    pub fn contains(&self, object_id: &str) -> bool {
        self.context.contains(object_id)
    }

    pub fn context(&self) -> &Arc<ArchiveContext> {
        &self.context
    }

    pub fn columns(&self) -> &ColumnList {
        &self.columns
    }

    /// A column by alias or id string.
    pub fn column(&self, key: &str) -> ArchiveResult<&Arc<Column>> {
        self.columns
            .get(key)
            .ok_or_else(|| ColumnError::UnknownColumn(key.to_string()).into())
    }

    pub fn registry(&self) -> &TraitRegistry {
        &self.registry
    }

    pub fn dal(&self) -> &Arc<DataAccessLayerHost> {
        &self.dal
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Bind `definition` to this archive and add the resulting column.
    /// Adding the same definition twice returns the existing column.
    pub fn associate(
        &mut self,
        definition: Arc<dyn ColumnDefinition>,
        alias: Option<&str>,
    ) -> ArchiveResult<Arc<Column>> {
        let column = Column::associate(definition, Arc::clone(&self.context))?;
        let column = self.columns.add(column, alias)?;
        debug!(archive = self.archive_id(), column = %column.id(), "associated column");
        Ok(column)
    }

    /// Bind the mapping's aliases to this archive's columns and register
    /// it. Every column the mapping reads must belong to this archive.
    pub fn register(&mut self, mut mapping: TraitMapping) -> ArchiveResult<()> {
        let columns = &self.columns;
        mapping.bind_columns(&|alias| columns.get(alias).map(|c| c.id().clone()))?;
        if let Some(id) = mapping.column_ids().into_iter().find(|id| columns.get_id(id).is_none()) {
            return Err(ArchiveError::Validation(format!(
                "mapping {} reads column {id}, which is not part of archive {}",
                mapping.key(),
                self.context.archive_id()
            )));
        }
        self.registry.register(mapping)?;
        Ok(())
    }

    pub fn set_defaults(&mut self, trait_name: &str, defaults: DefaultsRegistry) -> ArchiveResult<()> {
        self.registry.set_defaults(trait_name, defaults)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Schema keyed by trait type, then qualifier.
    pub fn schema(&self) -> ArchiveResult<Schema> {
        Ok(self.registry.schema(SchemaLayout::ByTraitType)?)
    }

    /// Schema keyed by full trait name.
    pub fn schema_by_trait_name(&self) -> ArchiveResult<Schema> {
        Ok(self.registry.schema(SchemaLayout::ByTraitName)?)
    }

    pub fn can_provide(&self, key: impl IntoTraitKey) -> bool {
        self.registry.can_provide(key)
    }

    /// A view of one object.
    pub fn object(&self, object_id: &str) -> ArchiveResult<ArchiveObject<'_>> {
        self.check_contains(object_id)?;
        Ok(ArchiveObject {
            archive: self,
            object_id: object_id.to_string(),
        })
    }

    /// Resolve `key` and bind it to `object_id`. No data is read.
    pub fn get_trait(&self, object_id: &str, key: impl IntoTraitKey) -> ArchiveResult<Trait<'_>> {
        self.check_contains(object_id)?;
        Ok(Trait::resolve(self, &self.registry, object_id, key)?)
    }

    /// Walk `path` from the top-level trait through its sub-traits and
    /// read `property` of the last one.
    pub fn value_at(&self, object_id: &str, path: impl IntoTraitPath, property: &str) -> ArchiveResult<Value> {
        let path = TraitPath::as_path(path)?;
        let mut current = self.get_trait(object_id, path.root())?;
        for key in path.keys().iter().skip(1) {
            current = current.get_sub_trait(key)?;
        }
        Ok(current.value(property)?.clone())
    }

    /// Ingest every column into the layer named `layer_name`.
    pub fn ingest_into(&self, layer_name: &str, cancel: &CancelToken) -> ArchiveResult<IngestReport> {
        let layer = self
            .dal
            .layer(layer_name)?
            .ok_or_else(|| DalError::InvalidLayer(format!("no layer named {layer_name:?}")))?;
        info!(archive = self.archive_id(), layer = layer_name, "ingesting archive");
        Ok(layer.ingest_archive(self, cancel)?)
    }

    fn check_contains(&self, object_id: &str) -> ArchiveResult<()> {
        if self.context.contains(object_id) {
            Ok(())
        } else {
            Err(ArchiveError::NotInArchive {
                archive_id: self.context.archive_id().to_string(),
                object_id: object_id.to_string(),
            })
        }
    }
}

impl CellSource for Archive {
    fn cell(&self, column: &ColumnId, object_id: &str) -> TraitResult<Value> {
        let column = self
            .columns
            .get_id(column)
            .ok_or_else(|| TraitError::Column(ColumnError::UnknownColumn(column.to_string())))?;
        Ok(self
            .dal
            .retrieve(column, object_id, Provenance::Any, &CancelToken::new())?)
    }
}

impl IngestSource for Archive {
    fn archive_id(&self) -> &str {
        self.context.archive_id()
    }

    fn ingest_columns(&self) -> Vec<Arc<Column>> {
        self.columns.iter().cloned().collect()
    }
}

/// One object of an archive: a key-indexed view of its traits.
#[derive(Clone, Debug)]
pub struct ArchiveObject<'a> {
    archive: &'a Archive,
    object_id: String,
}

impl<'a> ArchiveObject<'a> {
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn archive(&self) -> &'a Archive {
        self.archive
    }

    pub fn get(&self, key: impl IntoTraitKey) -> ArchiveResult<Trait<'a>> {
        Ok(Trait::resolve(self.archive, &self.archive.registry, &self.object_id, key)?)
    }

    /// Every registered top-level key.
    pub fn keys(&self) -> Vec<TraitKey> {
        self.archive.registry.keys().cloned().collect()
    }
}
