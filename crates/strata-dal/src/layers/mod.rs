//! Layer implementations.
//!
//! - [`FileStoreLayer`]: framed cell files under a base directory
//! - [`SqliteLayer`]: a cells table in a SQLite database
//! - [`MemoryLayer`]: an in-process cache
//! - [`SourceLayer`]: reads the column's own source

mod file_store;
mod memory;
mod source;
mod sqlite;

pub use file_store::FileStoreLayer;
pub use memory::MemoryLayer;
pub use source::SourceLayer;
pub use sqlite::SqliteLayer;
