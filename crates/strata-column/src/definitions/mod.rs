//! Built-in reader strategies.
//!
//! Each strategy defines its own `column_name` grammar:
//!
//! | strategy             | column name                              |
//! |----------------------|------------------------------------------|
//! | [`ColumnFromData`]   | the label it was given                   |
//! | [`JsonDocumentColumn`] | `{pattern}[{key.path}]`                |
//! | [`JsonTableColumn`]  | `{pattern}[{index_column}->{column}]`    |
//! | [`SqlTableColumn`]   | `{table}[{index_column}->{column}]`      |
//!
//! File patterns may contain `{object_id}` and are resolved against the
//! archive's base path.

mod from_data;
mod json;
mod sql_table;

pub use from_data::ColumnFromData;
pub use json::{JsonDocumentColumn, JsonTableColumn};
pub use sql_table::SqlTableColumn;
