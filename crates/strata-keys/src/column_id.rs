//! Column identifiers: the shared key between archives, mappings and the
//! data access layer.
//!
//! The string form is `archive_id:column_type:column_name:timestamp`. Each
//! component is escaped with [`escape_component`] so that colons inside a
//! component (common in column names built from file paths) survive the
//! round trip.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KeyError, KeyResult};
use crate::escape::{escape_component, unescape_component, COLUMN_RESERVED};

/// Selects among revisions of the same logical column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnTimestamp {
    /// A fixed revision, in seconds since the Unix epoch.
    At(u64),
    /// Whatever revision the source currently holds.
    Latest,
}

impl ColumnTimestamp {
    /// Parse `"latest"` or an unsigned integer.
    pub fn parse(input: &str) -> KeyResult<Self> {
        if input == "latest" {
            return Ok(Self::Latest);
        }
        input
            .parse::<u64>()
            .map(Self::At)
            .map_err(|_| KeyError::malformed(input, "timestamp must be an integer or \"latest\""))
    }
}

impl fmt::Display for ColumnTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(ts) => write!(f, "{ts}"),
            Self::Latest => f.write_str("latest"),
        }
    }
}

/// Identifies one physical, retrievable column.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColumnId {
    archive_id: String,
    column_type: String,
    column_name: String,
    timestamp: ColumnTimestamp,
}

impl ColumnId {
    /// Build a column id. The three name components must be non-empty.
    pub fn new(
        archive_id: impl Into<String>,
        column_type: impl Into<String>,
        column_name: impl Into<String>,
        timestamp: ColumnTimestamp,
    ) -> KeyResult<Self> {
        let id = Self {
            archive_id: archive_id.into(),
            column_type: column_type.into(),
            column_name: column_name.into(),
            timestamp,
        };
        for (label, value) in [
            ("archive id", &id.archive_id),
            ("column type", &id.column_type),
            ("column name", &id.column_name),
        ] {
            if value.is_empty() {
                return Err(KeyError::malformed(
                    id.to_string(),
                    format!("{label} must not be empty"),
                ));
            }
        }
        Ok(id)
    }

    /// Parse the escaped, colon-delimited string form.
    ///
    /// ```
    /// use strata_keys::{ColumnId, ColumnTimestamp};
    ///
    /// let id = ColumnId::new("Survey", "JsonDocumentColumn", "C:/cat.json[z]", ColumnTimestamp::At(7)).unwrap();
    /// let text = id.to_string();
    /// assert_eq!(text, "Survey:JsonDocumentColumn:C%3A/cat.json[z]:7");
    /// assert_eq!(ColumnId::parse(&text).unwrap(), id);
    /// ```
    pub fn parse(input: &str) -> KeyResult<Self> {
        let parts: Vec<&str> = input.split(':').collect();
        let [archive_id, column_type, column_name, timestamp] = parts.as_slice() else {
            return Err(KeyError::malformed(
                input,
                format!("expected 4 colon-separated components, found {}", parts.len()),
            ));
        };
        Self::new(
            unescape_component(archive_id)?,
            unescape_component(column_type)?,
            unescape_component(column_name)?,
            ColumnTimestamp::parse(timestamp)?,
        )
        .map_err(|e| match e {
            KeyError::MalformedKey { reason, .. } => KeyError::malformed(input, reason),
        })
    }

    pub fn archive_id(&self) -> &str {
        &self.archive_id
    }

    pub fn column_type(&self) -> &str {
        &self.column_type
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn timestamp(&self) -> ColumnTimestamp {
        self.timestamp
    }

    /// The archive-independent part of the id: `column_type:column_name`.
    pub fn definition_id(&self) -> String {
        format!(
            "{}:{}",
            escape_component(&self.column_type, COLUMN_RESERVED),
            escape_component(&self.column_name, COLUMN_RESERVED)
        )
    }

    /// A copy of this id pinned to another revision.
    pub fn with_timestamp(&self, timestamp: ColumnTimestamp) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            escape_component(&self.archive_id, COLUMN_RESERVED),
            self.definition_id(),
            self.timestamp
        )
    }
}

impl fmt::Debug for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ColumnId({self})")
    }
}

impl FromStr for ColumnId {
    type Err = KeyError;

    fn from_str(s: &str) -> KeyResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ColumnId {
    type Error = KeyError;

    fn try_from(s: String) -> KeyResult<Self> {
        Self::parse(&s)
    }
}

impl From<ColumnId> for String {
    fn from(id: ColumnId) -> Self {
        id.to_string()
    }
}
