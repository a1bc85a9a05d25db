//! Column layer for strata.
//!
//! A **column** is one physical, retrievable unit of data: a key inside a
//! family of per-object files, a field of a catalog table, a SQL column.
//! This crate separates *how* a column is read from *which archive* it
//! belongs to.
//!
//! # Architecture
//!
//! - A [`ColumnDefinition`] is an unbound reader strategy. Definitions are
//!   immutable templates, shared between archives as
//!   `Arc<dyn ColumnDefinition>`.
//! - [`Column::associate`] binds a definition to one archive
//!   ([`ArchiveContext`]) and assigns its [`ColumnId`](strata_keys::ColumnId).
//! - A bound [`Column`] answers `get_value(object_id)` and the bulk
//!   `get_array()`, coercing raw reader output to the declared
//!   [`PropertyType`].
//! - Readers report "object not covered" as [`ColumnError::NotFound`], kept
//!   distinct from I/O and parse failures so the data access layer can fall
//!   through on the former and surface the latter.
//!
//! # Modules
//!
//! - [`error`]: [`ColumnError`], [`Interrupt`], [`ColumnResult`]
//! - [`value`]: [`Value`], [`Array`], [`PropertyType`]
//! - [`definition`]: the [`ColumnDefinition`] trait, [`ColumnMeta`], [`ArchiveContext`]
//! - [`column`]: [`Column`], [`ColumnArray`], [`ColumnList`]
//! - [`definitions`]: built-in reader strategies
//! - [`sql`]: [`SqlHandle`], the injected database handle
//! - [`cancel`]: [`CancelToken`]

pub mod cancel;
pub mod column;
pub mod definition;
pub mod definitions;
pub mod error;
pub mod sql;
pub mod value;

pub use cancel::CancelToken;
pub use column::{Column, ColumnArray, ColumnList};
pub use definition::{ArchiveContext, ColumnDefinition, ColumnMeta};
pub use definitions::{ColumnFromData, JsonDocumentColumn, JsonTableColumn, SqlTableColumn};
pub use error::{ColumnError, ColumnResult, Interrupt};
pub use sql::SqlHandle;
pub use value::{Array, PropertyType, Value};
