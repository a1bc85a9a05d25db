//! Data access layer for strata.
//!
//! The data access layer (DAL) sits between an archive's columns and their
//! slow original sources. A [`DataAccessLayerHost`] holds an ordered chain of
//! [`DataAccessLayer`]s. A lookup asks each layer in turn. The first layer
//! that has the cell answers. Layers that cannot respond, or have no entry,
//! are skipped. Any other failure stops the search and is returned.
//!
//! # Layers
//!
//! - [`FileStoreLayer`]: CRC-framed cell files under a base directory
//! - [`SqliteLayer`]: a cells table in a SQLite database
//! - [`MemoryLayer`]: an in-process cache
//! - [`SourceLayer`]: the column's own reader, usually last in the chain
//!
//! # Ingestion
//!
//! [`DataAccessLayer::ingest_archive`] reads every column of an
//! [`IngestSource`] from its source and persists the values, so later
//! lookups are answered without touching the original files.
//!
//! # Configuration
//!
//! The chain can be described in TOML and loaded with [`StrataConfig`].

pub mod config;
pub mod error;
pub mod host;
pub mod layer;
pub mod layers;

pub use config::{DalConfig, LayerConfig, StrataConfig};
pub use error::{DalError, DalResult, LayerError, LayerResult};
pub use host::DataAccessLayerHost;
pub use layer::{DataAccessLayer, IngestReport, IngestSource, Provenance};
pub use layers::{FileStoreLayer, MemoryLayer, SourceLayer, SqliteLayer};
