//! Trait mappings: which sources feed a trait's properties.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use strata_column::Value;
use strata_keys::{ColumnId, IntoTraitKey, TraitKey};

use crate::class::TraitClass;
use crate::error::{TraitError, TraitResult};
use crate::registry::{SchemaLayout, TraitRegistry};
use crate::schema::Schema;

/// A reference to a bound column.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnRef {
    Id(ColumnId),
    /// Resolved to an id by [`TraitMapping::bind_columns`].
    Alias(String),
}

/// Where a mapped property's value comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertySource {
    Column(ColumnRef),
    Constant(Value),
}

impl PropertySource {
    pub fn column(id: ColumnId) -> Self {
        Self::Column(ColumnRef::Id(id))
    }

    pub fn alias(alias: impl Into<String>) -> Self {
        Self::Column(ColumnRef::Alias(alias.into()))
    }

    pub fn constant(value: Value) -> Self {
        Self::Constant(value)
    }

    /// The bound column id, if this is a resolved column source.
    pub fn column_id(&self) -> Option<&ColumnId> {
        match self {
            Self::Column(ColumnRef::Id(id)) => Some(id),
            _ => None,
        }
    }
}

impl From<ColumnId> for PropertySource {
    fn from(id: ColumnId) -> Self {
        Self::column(id)
    }
}

impl From<Value> for PropertySource {
    fn from(value: Value) -> Self {
        Self::Constant(value)
    }
}

/// Binds one trait key to a class and the sources of its properties.
///
/// Sub-trait mappings live in the mapping's own child registry, so
/// mappings form a tree mirroring the trait hierarchy.
#[derive(Clone, Debug)]
pub struct TraitMapping {
    class: Arc<TraitClass>,
    key: TraitKey,
    properties: BTreeMap<String, PropertySource>,
    sub_traits: TraitRegistry,
    long_description: Option<String>,
}

impl TraitMapping {
    pub fn new(class: Arc<TraitClass>, key: impl IntoTraitKey) -> TraitResult<Self> {
        Ok(Self {
            class,
            key: TraitKey::as_traitkey(key)?,
            properties: BTreeMap::new(),
            sub_traits: TraitRegistry::new(),
            long_description: None,
        })
    }

    /// Map property `name` to `source`. A later call for the same name
    /// replaces the earlier one.
    pub fn property(mut self, name: &str, source: impl Into<PropertySource>) -> Self {
        self.properties.insert(name.to_string(), source.into());
        self
    }

    /// Add a sub-trait mapping to the child registry.
    pub fn sub_trait(mut self, mapping: TraitMapping) -> TraitResult<Self> {
        self.sub_traits.register(mapping)?;
        Ok(self)
    }

    pub fn long_description(mut self, text: impl Into<String>) -> Self {
        self.long_description = Some(text.into());
        self
    }

    pub fn class(&self) -> &Arc<TraitClass> {
        &self.class
    }

    pub fn key(&self) -> &TraitKey {
        &self.key
    }

    pub fn trait_name(&self) -> String {
        self.key.trait_name()
    }

    pub fn source(&self, property: &str) -> Option<&PropertySource> {
        self.properties.get(property)
    }

    pub fn sources(&self) -> impl Iterator<Item = (&str, &PropertySource)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn sub_traits(&self) -> &TraitRegistry {
        &self.sub_traits
    }

    pub fn sub_traits_mut(&mut self) -> &mut TraitRegistry {
        &mut self.sub_traits
    }

    /// The mapping's long description, falling back to the class's.
    pub fn description(&self) -> Option<&str> {
        self.long_description
            .as_deref()
            .or(self.class.descriptions().long.as_deref())
    }

    /// Whether property `name` has a value source: mapped, constant, or
    /// computed.
    pub fn provides(&self, name: &str) -> bool {
        self.properties.contains_key(name)
            || self.class.property(name).is_some_and(|p| p.is_computed())
    }

    /// Names of the provided properties, in declaration order.
    pub fn provided_properties(&self) -> impl Iterator<Item = &str> {
        self.class
            .properties()
            .iter()
            .filter(|p| self.provides(&p.name))
            .map(|p| p.name.as_str())
    }

    /// Check this mapping and, recursively, its sub-trait mappings.
    pub fn validate(&self) -> TraitResult<()> {
        let invalid = |what: String| TraitError::Validation(format!("mapping {}: {what}", self.key));
        self.class.validate()?;

        if self.key.trait_type() != self.class.trait_type() {
            return Err(invalid(format!(
                "class {} implements {:?}, not {:?}",
                self.class.name(),
                self.class.trait_type(),
                self.key.trait_type()
            )));
        }
        self.class.qualifiers().check(self.key.qualifier()).map_err(invalid)?;

        for name in self.properties.keys() {
            match self.class.property(name) {
                None => return Err(invalid(format!("class {} has no property {name:?}", self.class.name()))),
                Some(p) if p.is_computed() => {
                    return Err(invalid(format!("property {name:?} is computed and cannot be mapped")))
                }
                Some(_) => {}
            }
        }
        for p in self.class.properties() {
            if !p.optional && !self.provides(&p.name) {
                return Err(invalid(format!("required property {:?} is not mapped", p.name)));
            }
        }

        let mapped_types: BTreeSet<&str> = self.sub_traits.mappings().map(|m| m.key().trait_type()).collect();
        for trait_type in &mapped_types {
            if self.class.sub_trait_slot(trait_type).is_none() {
                return Err(invalid(format!(
                    "class {} has no sub-trait slot {trait_type:?}",
                    self.class.name()
                )));
            }
        }
        for slot in self.class.sub_trait_slots() {
            if !slot.optional && !mapped_types.contains(slot.trait_type.as_str()) {
                return Err(invalid(format!("required sub-trait {:?} is not mapped", slot.trait_type)));
            }
        }
        for child in self.sub_traits.mappings() {
            if let Some(slot) = self.class.sub_trait_slot(child.key().trait_type()) {
                if slot.class.name() != child.class().name() {
                    return Err(invalid(format!(
                        "sub-trait {} uses class {}, slot expects {}",
                        child.key(),
                        child.class().name(),
                        slot.class.name()
                    )));
                }
            }
            child.validate()?;
        }
        Ok(())
    }

    /// Rewrite every column alias into its id, here and in sub-traits.
    ///
    /// An alias `resolve` does not know is [`TraitError::UnboundColumn`].
    pub fn bind_columns(&mut self, resolve: &dyn Fn(&str) -> Option<ColumnId>) -> TraitResult<()> {
        for (name, source) in self.properties.iter_mut() {
            if let PropertySource::Column(ColumnRef::Alias(alias)) = source {
                let id = resolve(alias).ok_or_else(|| TraitError::UnboundColumn {
                    property: name.clone(),
                    alias: alias.clone(),
                })?;
                *source = PropertySource::column(id);
            }
        }
        self.sub_traits.bind_columns(resolve)
    }

    /// Column ids used by this mapping and its sub-traits.
    pub fn column_ids(&self) -> BTreeSet<ColumnId> {
        let mut ids: BTreeSet<ColumnId> = self.properties.values().filter_map(|s| s.column_id().cloned()).collect();
        for child in self.sub_traits.mappings() {
            ids.extend(child.column_ids());
        }
        ids
    }

    /// The schema of one trait of this mapping: every provided property,
    /// then the sub-traits laid out by `layout`.
    pub fn schema(&self, layout: SchemaLayout) -> TraitResult<Schema> {
        let mut schema = Schema::node(
            self.class
                .properties()
                .iter()
                .filter(|p| self.provides(&p.name))
                .map(|p| (p.name.clone(), Schema::Leaf(p.property_type))),
        );
        schema.merge(self.sub_traits.schema(layout)?)?;
        Ok(schema)
    }
}
