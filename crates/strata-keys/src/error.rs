//! Error types for key parsing and validation.

use thiserror::Error;

/// Errors produced while constructing or parsing keys.
///
/// Every variant here is a caller bug: keys are validated when they are
/// built, so a malformed key never reaches resolution or data access.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum KeyError {
    /// A trait key, trait path, or column id failed the grammar.
    #[error("malformed key {input:?}: {reason}")]
    MalformedKey { input: String, reason: String },
}

impl KeyError {
    /// Build a [`KeyError::MalformedKey`] for `input`.
    pub fn malformed(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedKey {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for key operations.
pub type KeyResult<T> = std::result::Result<T, KeyError>;
