//! Lazily materialized traits bound to one object.
//!
//! A [`Trait`] records bindings only. Values are computed on first access
//! and cached in the instance's own slots, one per declared property of its
//! class. A property that turns out to be unavailable is not cached, so a
//! later read can succeed once the data exists.

use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

use strata_column::{PropertyType, Value};
use strata_keys::{ColumnId, IntoTraitKey, TraitKey, TraitPath};
use tracing::debug;

use crate::class::{PropertyDef, TraitClass};
use crate::error::{TraitError, TraitResult};
use crate::mapping::{ColumnRef, PropertySource, TraitMapping};
use crate::registry::{BranchesVersions, SchemaLayout, TraitRegistry};
use crate::schema::Schema;

/// Reads one cell of a bound column.
///
/// Archives implement this on top of their data access layer.
pub trait CellSource {
    fn cell(&self, column: &ColumnId, object_id: &str) -> TraitResult<Value>;
}

/// One trait of one object.
pub struct Trait<'a> {
    source: &'a dyn CellSource,
    registry: Option<&'a TraitRegistry>,
    mapping: &'a TraitMapping,
    key: TraitKey,
    object_id: String,
    path: TraitPath,
    slots: Vec<OnceCell<Value>>,
}

impl<'a> Trait<'a> {
    /// Bind `mapping` to `object_id` under the resolved `key`. No data is
    /// read.
    pub fn new(
        source: &'a dyn CellSource,
        object_id: &str,
        key: TraitKey,
        mapping: &'a TraitMapping,
        parent_path: Option<&TraitPath>,
    ) -> Self {
        let path = match parent_path {
            Some(parent) => parent.join(key.clone()),
            None => TraitPath::from(key.clone()),
        };
        let slots = mapping.class().properties().iter().map(|_| OnceCell::new()).collect();
        Self {
            source,
            registry: None,
            mapping,
            key,
            object_id: object_id.to_string(),
            path,
            slots,
        }
    }

    /// Resolve `key` in `registry` and bind the result to `object_id`.
    pub fn resolve(
        source: &'a dyn CellSource,
        registry: &'a TraitRegistry,
        object_id: &str,
        key: impl IntoTraitKey,
    ) -> TraitResult<Self> {
        let (key, mapping) = registry.resolve(key)?;
        let mut t = Self::new(source, object_id, key, mapping, None);
        t.registry = Some(registry);
        Ok(t)
    }

    pub fn key(&self) -> &TraitKey {
        &self.key
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn path(&self) -> &TraitPath {
        &self.path
    }

    pub fn mapping(&self) -> &'a TraitMapping {
        self.mapping
    }

    pub fn class(&self) -> &Arc<TraitClass> {
        self.mapping.class()
    }

    /// The value of property `name`, computing it on first access.
    pub fn value(&self, name: &str) -> TraitResult<&Value> {
        let index = self
            .class()
            .property_index(name)
            .ok_or_else(|| TraitError::UnknownProperty {
                key: self.key.to_string(),
                name: name.to_string(),
            })?;
        self.property_at(index)
    }

    /// The value of the property at `index` in the class's declaration
    /// order.
    ///
    /// Repeated reads return the same cached value. Failures, including
    /// [`TraitError::DataNotAvailable`], are returned uncached.
    pub fn property_at(&self, index: usize) -> TraitResult<&Value> {
        let (def, slot) = self
            .class()
            .properties()
            .get(index)
            .zip(self.slots.get(index))
            .ok_or_else(|| TraitError::UnknownProperty {
                key: self.key.to_string(),
                name: format!("#{index}"),
            })?;
        if let Some(value) = slot.get() {
            return Ok(value);
        }

        let value = self.compute(def)?.coerce(def.property_type)?;
        // A computed property may already have filled this slot through a
        // nested read; the first value stays.
        let _ = slot.set(value);
        slot.get().ok_or_else(|| TraitError::UnknownProperty {
            key: self.key.to_string(),
            name: def.name.clone(),
        })
    }

    /// Whether property `name` has been computed and cached.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.class()
            .property_index(name)
            .and_then(|i| self.slots.get(i))
            .is_some_and(|slot| slot.get().is_some())
    }

    fn compute(&self, def: &PropertyDef) -> TraitResult<Value> {
        if let Some(compute) = def.compute {
            return compute(self);
        }
        match self.mapping.source(&def.name) {
            Some(PropertySource::Constant(value)) => Ok(value.clone()),
            Some(PropertySource::Column(ColumnRef::Id(column))) => {
                debug!(key = %self.key, property = %def.name, column = %column, object_id = %self.object_id, "reading property");
                self.source.cell(column, &self.object_id)
            }
            Some(PropertySource::Column(ColumnRef::Alias(alias))) => Err(TraitError::UnboundColumn {
                property: def.name.clone(),
                alias: alias.clone(),
            }),
            None => Err(TraitError::DataNotAvailable {
                column: format!("{} has no source for {:?}", self.key, def.name),
                object_id: self.object_id.clone(),
            }),
        }
    }

    /// Accessors for every provided property, in declaration order.
    pub fn trait_properties<'s>(&'s self) -> impl Iterator<Item = TraitProperty<'s>> + 's {
        let owner: &'s Trait<'s> = self;
        owner
            .class()
            .properties()
            .iter()
            .enumerate()
            .filter(move |(_, def)| owner.mapping.provides(&def.name))
            .map(move |(index, _)| TraitProperty { owner, index })
    }

    /// Resolve and bind a sub-trait. Unset branch and version are inherited
    /// from this trait where the child registry allows.
    pub fn get_sub_trait(&self, key: impl IntoTraitKey) -> TraitResult<Trait<'a>> {
        let registry: &'a TraitRegistry = self.mapping.sub_traits();
        let (key, mapping) = registry.resolve_with_parent(key, Some(&self.key))?;
        let mut child = Trait::new(self.source, &self.object_id, key, mapping, Some(&self.path));
        child.registry = Some(registry);
        Ok(child)
    }

    /// Full keys of the sub-traits this trait's mapping declares.
    pub fn sub_trait_keys(&self) -> Vec<TraitKey> {
        self.mapping.sub_traits().keys().cloned().collect()
    }

    /// The schema of this trait's mapping.
    pub fn schema(&self) -> TraitResult<Schema> {
        self.mapping.schema(SchemaLayout::ByTraitType)
    }

    /// Valid branches and versions for this trait's name, when the trait
    /// was resolved through a registry.
    pub fn branches_versions(&self) -> Option<&'a BranchesVersions> {
        self.registry?.branches_versions(&self.key.trait_name())
    }
}

impl fmt::Debug for Trait<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trait")
            .field("path", &self.path.to_string())
            .field("object_id", &self.object_id)
            .field("class", &self.class().name())
            .finish()
    }
}

/// A lazily bound accessor for one property of a trait.
#[derive(Clone, Copy)]
pub struct TraitProperty<'t> {
    owner: &'t Trait<'t>,
    index: usize,
}

impl<'t> TraitProperty<'t> {
    fn def(&self) -> &'t PropertyDef {
        let class: &'t TraitClass = self.owner.mapping.class();
        &class.properties()[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &'t str {
        &self.def().name
    }

    pub fn property_type(&self) -> PropertyType {
        self.def().property_type
    }

    pub fn description(&self) -> Option<&'t str> {
        self.def().descriptions.short.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.owner.slots[self.index].get().is_some()
    }

    pub fn value(&self) -> TraitResult<&'t Value> {
        self.owner.property_at(self.index)
    }
}

impl fmt::Debug for TraitProperty<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraitProperty")
            .field("name", &self.name())
            .field("type", &self.property_type())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
