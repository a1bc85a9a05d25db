//! Key grammar for strata.
//!
//! This crate names data. It knows nothing about where data lives or how it
//! is read; it only guarantees that every name built by the rest of the
//! workspace is well formed and has exactly one canonical string.
//!
//! # Architecture
//!
//! - A **trait key** names one logical datum of an object:
//!   `type-qualifier:branch(version)`. Keys are validated when constructed,
//!   so typos surface before any data access.
//! - A **trait path** walks from a top-level trait down through sub-traits.
//! - A **column id** names one physical column:
//!   `archive_id:column_type:column_name:timestamp`, with percent escaping
//!   so that any column name round-trips.
//!
//! # Modules
//!
//! - [`error`]: [`KeyError`] and the [`KeyResult`] alias
//! - [`names`]: token validators for each key component
//! - [`trait_key`]: [`TraitKey`] and the [`IntoTraitKey`] normalization trait
//! - [`trait_path`]: [`TraitPath`]
//! - [`column_id`]: [`ColumnId`] and [`ColumnTimestamp`]
//! - [`escape`]: percent escaping shared with storage layers

pub mod column_id;
pub mod error;
pub mod escape;
pub mod names;
pub mod trait_key;
pub mod trait_path;

pub use column_id::{ColumnId, ColumnTimestamp};
pub use error::{KeyError, KeyResult};
pub use escape::{escape_path_component, unescape_component};
pub use trait_key::{split_trait_name, IntoTraitKey, TraitKey};
pub use trait_path::{IntoTraitPath, TraitPath};
