//! Archives for strata.
//!
//! This is the main entry point for applications. An [`Archive`] fixes
//! one dataset's object ids, binds its columns, and registers the trait
//! mappings that give those columns meaning. Object views and traits
//! borrow the archive and read their values through its
//! [`DataAccessLayerHost`].

pub mod archive;
pub mod definition;
pub mod error;

pub use archive::{Archive, ArchiveObject};
pub use definition::{contents_from_directory, ArchiveBuilder, ArchiveDefinition, ColumnEntry};
pub use error::{ArchiveError, ArchiveResult};

// Re-export key types
pub use strata_column::{
    Array, CancelToken, Column, ColumnDefinition, ColumnFromData, JsonDocumentColumn, JsonTableColumn,
    PropertyType, SqlHandle, SqlTableColumn, Value,
};
pub use strata_dal::{
    DataAccessLayer, DataAccessLayerHost, FileStoreLayer, MemoryLayer, Provenance, SourceLayer, SqliteLayer,
    StrataConfig,
};
pub use strata_keys::{ColumnId, TraitKey, TraitPath};
pub use strata_traits::{
    standard, DefaultsRegistry, ExportRequest, ExportedTrait, PropertySource, Schema, Trait, TraitClass, TraitMapping,
};
