//! Trait layer for strata.
//!
//! A **trait** is a named, versioned logical datum of one astronomical
//! object, such as `image-red` or `stellar_mass:dr2(1.1)`. This crate
//! declares which traits an archive offers and how each one is built from
//! columns, and materializes them lazily per object.
//!
//! # Architecture
//!
//! - A [`TraitClass`] is the static registration list of a trait type:
//!   its properties (some computed), sub-trait slots, and descriptions.
//! - A [`TraitMapping`] binds one trait key to a class and says where each
//!   property's value comes from: a column, or a constant.
//! - The [`TraitRegistry`] stores mappings by full key and completes
//!   partial keys with branch/version defaults and parent inheritance.
//! - A [`Trait`] binds a resolved mapping to one object id. Values are
//!   read through a [`CellSource`] on first access and cached in the
//!   instance's own slots.
//! - [`Schema`] trees describe what a registry or mapping provides.
//!
//! # Modules
//!
//! - [`error`]: [`TraitError`], [`TraitResult`]
//! - [`class`]: [`TraitClass`] and its builder
//! - [`standard`]: ready-made classes
//! - [`mapping`]: [`TraitMapping`], [`PropertySource`], [`ColumnRef`]
//! - [`registry`]: [`TraitRegistry`], [`BranchesVersions`], [`DefaultsRegistry`]
//! - [`schema`]: [`Schema`]
//! - [`instance`]: [`Trait`], [`TraitProperty`], [`CellSource`]
//! - [`export`]: [`ExportRequest`], [`ExportedTrait`]

pub mod class;
pub mod error;
pub mod export;
pub mod instance;
pub mod mapping;
pub mod registry;
pub mod schema;
pub mod standard;

pub use class::{ComputeFn, Descriptions, PropertyDef, QualifierPolicy, SubTraitSlot, TraitClass, TraitClassBuilder};
pub use error::{TraitError, TraitResult};
pub use export::{ExportRequest, ExportedProperty, ExportedTrait};
pub use instance::{CellSource, Trait, TraitProperty};
pub use mapping::{ColumnRef, PropertySource, TraitMapping};
pub use registry::{BranchesVersions, DefaultsRegistry, SchemaLayout, TraitRegistry};
pub use schema::Schema;
