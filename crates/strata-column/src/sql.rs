//! Explicitly opened SQL handles.
//!
//! A handle is created by the caller and passed to every definition or
//! layer that needs it. Nothing in the workspace opens connections on its
//! own, and closing a handle makes later reads fail with
//! [`ColumnError::HandleClosed`] instead of reconnecting.

use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::debug;

use crate::error::{ColumnError, ColumnResult};

/// A shared SQLite connection with an explicit open/close lifecycle.
pub struct SqlHandle {
    label: String,
    connection: Mutex<Option<Connection>>,
}

impl SqlHandle {
    /// Open a database file, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> ColumnResult<Self> {
        let path = path.as_ref();
        let connection = Connection::open(path)?;
        debug!(path = %path.display(), "opened sql handle");
        Ok(Self::from_connection(path.display().to_string(), connection))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> ColumnResult<Self> {
        Ok(Self::from_connection(":memory:", Connection::open_in_memory()?))
    }

    /// Open from a connection string: `:memory:` or a file path.
    pub fn open_connection_string(connection: &str) -> ColumnResult<Self> {
        if connection == ":memory:" {
            Self::open_in_memory()
        } else {
            Self::open(connection)
        }
    }

    /// Wrap an already-open connection.
    pub fn from_connection(label: impl Into<String>, connection: Connection) -> Self {
        Self {
            label: label.into(),
            connection: Mutex::new(Some(connection)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_open(&self) -> bool {
        self.connection
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Close the connection. Closing twice is a no-op.
    pub fn close(&self) -> ColumnResult<()> {
        let mut guard = self
            .connection
            .lock()
            .map_err(|e| ColumnError::LockPoisoned(e.to_string()))?;
        if let Some(connection) = guard.take() {
            connection.close().map_err(|(_, e)| ColumnError::Database(e))?;
            debug!(handle = %self.label, "closed sql handle");
        }
        Ok(())
    }

    /// Run `f` against the open connection.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> ColumnResult<T> {
        let guard = self
            .connection
            .lock()
            .map_err(|e| ColumnError::LockPoisoned(e.to_string()))?;
        let connection = guard
            .as_ref()
            .ok_or_else(|| ColumnError::HandleClosed(self.label.clone()))?;
        Ok(f(connection)?)
    }
}

impl fmt::Debug for SqlHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlHandle")
            .field("label", &self.label)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Check that `name` is a plain SQL identifier, safe to quote into a
/// statement.
pub fn validate_identifier(name: &str) -> ColumnResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(ColumnError::InvalidDefinition(format!(
            "invalid sql identifier {name:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_query_close() {
        let handle = SqlHandle::open_in_memory().unwrap();
        assert!(handle.is_open());
        let n: i64 = handle
            .with_connection(|c| c.query_row("SELECT 41 + 1", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(n, 42);

        handle.close().unwrap();
        assert!(!handle.is_open());
        assert!(handle.close().is_ok());
    }

    #[test]
    fn closed_handle_refuses_queries() {
        let handle = SqlHandle::open_in_memory().unwrap();
        handle.close().unwrap();
        let err = handle
            .with_connection(|c| c.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)))
            .unwrap_err();
        assert!(matches!(err, ColumnError::HandleClosed(_)));
    }

    #[test]
    fn identifiers() {
        assert!(validate_identifier("galaxies").is_ok());
        assert!(validate_identifier("_z2").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2mass").is_err());
        assert!(validate_identifier("a;drop").is_err());
        assert!(validate_identifier("a\"b").is_err());
    }
}
