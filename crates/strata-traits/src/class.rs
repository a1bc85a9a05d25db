//! Trait classes: the static registration list of a trait type.
//!
//! A class declares, once, which properties and sub-trait slots every trait
//! of its type has. Each property's position in the list is its property
//! index, which trait instances use to address their value slots.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use strata_column::{PropertyType, Value};
use strata_keys::names::validate_trait_type;

use crate::error::{TraitError, TraitResult};
use crate::instance::Trait;

/// Computes a property from other properties of the same trait.
pub type ComputeFn = fn(&Trait<'_>) -> TraitResult<Value>;

/// Human-readable descriptions attached to classes and properties.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Descriptions {
    pub pretty_name: Option<String>,
    pub short: Option<String>,
    pub long: Option<String>,
}

/// Which qualifiers a trait type accepts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QualifierPolicy {
    /// Keys of this type never carry a qualifier.
    Forbidden,
    /// A qualifier may be given or omitted.
    Optional,
    /// Every key of this type carries a qualifier.
    Required,
    /// Every key carries one of these qualifiers.
    OneOf(BTreeSet<String>),
}

impl QualifierPolicy {
    /// `Ok` if `qualifier` is acceptable under this policy.
    pub fn check(&self, qualifier: Option<&str>) -> Result<(), String> {
        match (self, qualifier) {
            (Self::Forbidden, Some(q)) => Err(format!("qualifier {q:?} is not allowed")),
            (Self::Required | Self::OneOf(_), None) => Err("a qualifier is required".into()),
            (Self::OneOf(allowed), Some(q)) if !allowed.contains(q) => Err(format!(
                "qualifier {q:?} is not one of {:?}",
                allowed.iter().collect::<Vec<_>>()
            )),
            _ => Ok(()),
        }
    }
}

/// One declared property.
#[derive(Clone)]
pub struct PropertyDef {
    pub name: String,
    pub property_type: PropertyType,
    pub optional: bool,
    pub descriptions: Descriptions,
    /// Set for computed properties, which are never mapped to a source.
    pub compute: Option<ComputeFn>,
}

impl PropertyDef {
    pub fn is_computed(&self) -> bool {
        self.compute.is_some()
    }
}

impl fmt::Debug for PropertyDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDef")
            .field("name", &self.name)
            .field("property_type", &self.property_type)
            .field("optional", &self.optional)
            .field("computed", &self.is_computed())
            .finish()
    }
}

/// A slot for sub-traits of one type.
#[derive(Clone, Debug)]
pub struct SubTraitSlot {
    pub trait_type: String,
    pub class: Arc<TraitClass>,
    pub optional: bool,
}

/// The registration list of a trait type.
#[derive(Debug)]
pub struct TraitClass {
    name: String,
    trait_type: String,
    qualifiers: QualifierPolicy,
    descriptions: Descriptions,
    properties: Vec<PropertyDef>,
    sub_traits: Vec<SubTraitSlot>,
}

impl TraitClass {
    /// Start declaring a class named `name` for keys of `trait_type`.
    pub fn builder(name: impl Into<String>, trait_type: impl Into<String>) -> TraitClassBuilder {
        TraitClassBuilder {
            class: TraitClass {
                name: name.into(),
                trait_type: trait_type.into(),
                qualifiers: QualifierPolicy::Optional,
                descriptions: Descriptions::default(),
                properties: Vec::new(),
                sub_traits: Vec::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trait_type(&self) -> &str {
        &self.trait_type
    }

    pub fn qualifiers(&self) -> &QualifierPolicy {
        &self.qualifiers
    }

    pub fn descriptions(&self) -> &Descriptions {
        &self.descriptions
    }

    /// Properties in declaration order.
    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    pub fn sub_trait_slots(&self) -> &[SubTraitSlot] {
        &self.sub_traits
    }

    /// The stable index of property `name`.
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn sub_trait_slot(&self, trait_type: &str) -> Option<&SubTraitSlot> {
        self.sub_traits.iter().find(|s| s.trait_type == trait_type)
    }

    /// Check the declaration itself: well-formed type and property names,
    /// and no property sharing a name with a sub-trait slot.
    pub fn validate(&self) -> TraitResult<()> {
        let invalid = |what: String| TraitError::Validation(format!("class {}: {what}", self.name));
        validate_trait_type(&self.trait_type).map_err(|e| invalid(e.to_string()))?;
        for p in &self.properties {
            validate_trait_type(&p.name)
                .map_err(|_| invalid(format!("invalid property name {:?}", p.name)))?;
            if self.sub_trait_slot(&p.name).is_some() {
                return Err(invalid(format!("{:?} is both a property and a sub-trait", p.name)));
            }
        }
        for slot in &self.sub_traits {
            slot.class.validate()?;
            if slot.class.trait_type != slot.trait_type {
                return Err(invalid(format!(
                    "slot {:?} holds class {} of type {:?}",
                    slot.trait_type, slot.class.name, slot.class.trait_type
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`TraitClass`].
///
/// Declaring a property or slot twice replaces the earlier declaration in
/// place, so indices stay stable.
#[derive(Debug)]
pub struct TraitClassBuilder {
    class: TraitClass,
}

impl TraitClassBuilder {
    pub fn qualifiers(mut self, policy: QualifierPolicy) -> Self {
        self.class.qualifiers = policy;
        self
    }

    pub fn pretty_name(mut self, text: impl Into<String>) -> Self {
        self.class.descriptions.pretty_name = Some(text.into());
        self
    }

    pub fn short_description(mut self, text: impl Into<String>) -> Self {
        self.class.descriptions.short = Some(text.into());
        self
    }

    pub fn long_description(mut self, text: impl Into<String>) -> Self {
        self.class.descriptions.long = Some(text.into());
        self
    }

    /// A required property.
    pub fn property(self, name: &str, property_type: PropertyType) -> Self {
        self.push(name, property_type, false, None, None)
    }

    /// An optional property.
    pub fn optional_property(self, name: &str, property_type: PropertyType) -> Self {
        self.push(name, property_type, true, None, None)
    }

    /// A property with a one-line description.
    pub fn described_property(self, name: &str, property_type: PropertyType, optional: bool, short: &str) -> Self {
        self.push(name, property_type, optional, Some(short), None)
    }

    /// A property computed from the trait's other properties.
    pub fn computed(self, name: &str, property_type: PropertyType, compute: ComputeFn) -> Self {
        self.push(name, property_type, true, None, Some(compute))
    }

    /// A slot for sub-traits of `class`'s type.
    pub fn sub_trait(mut self, class: Arc<TraitClass>, optional: bool) -> Self {
        let slot = SubTraitSlot {
            trait_type: class.trait_type.clone(),
            class,
            optional,
        };
        match self
            .class
            .sub_traits
            .iter_mut()
            .find(|s| s.trait_type == slot.trait_type)
        {
            Some(existing) => *existing = slot,
            None => self.class.sub_traits.push(slot),
        }
        self
    }

    pub fn build(self) -> Arc<TraitClass> {
        Arc::new(self.class)
    }

    fn push(
        mut self,
        name: &str,
        property_type: PropertyType,
        optional: bool,
        short: Option<&str>,
        compute: Option<ComputeFn>,
    ) -> Self {
        let def = PropertyDef {
            name: name.to_string(),
            property_type,
            optional,
            descriptions: Descriptions {
                short: short.map(str::to_string),
                ..Descriptions::default()
            },
            compute,
        };
        match self.class.properties.iter_mut().find(|p| p.name == name) {
            Some(existing) => *existing = def,
            None => self.class.properties.push(def),
        }
        self
    }
}
