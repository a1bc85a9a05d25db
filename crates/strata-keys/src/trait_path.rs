//! Trait paths address a sub-trait from the root of an object.
//!
//! A path is a non-empty sequence of trait keys joined by `/`, for example
//! `image-red/wcs`. The first key is resolved against the archive registry,
//! each following key against the child registry of the trait before it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KeyError, KeyResult};
use crate::trait_key::TraitKey;

/// An ordered, non-empty list of trait keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TraitPath {
    keys: Vec<TraitKey>,
}

impl TraitPath {
    /// Build a path from keys. Fails if `keys` is empty.
    pub fn new(keys: Vec<TraitKey>) -> KeyResult<Self> {
        if keys.is_empty() {
            return Err(KeyError::malformed("", "a trait path must not be empty"));
        }
        Ok(Self { keys })
    }

    /// Parse a `/`-separated path of canonical trait keys.
    ///
    /// ```
    /// use strata_keys::TraitPath;
    ///
    /// let path = TraitPath::parse("image-red:v1/wcs").unwrap();
    /// assert_eq!(path.len(), 2);
    /// assert_eq!(path.leaf().trait_type(), "wcs");
    /// assert!(TraitPath::parse("image//wcs").is_err());
    /// ```
    pub fn parse(input: &str) -> KeyResult<Self> {
        if input.is_empty() {
            return Err(KeyError::malformed(input, "a trait path must not be empty"));
        }
        let keys = input
            .split('/')
            .map(|part| {
                if part.is_empty() {
                    Err(KeyError::malformed(input, "empty path element"))
                } else {
                    TraitKey::parse(part)
                }
            })
            .collect::<KeyResult<Vec<_>>>()?;
        Ok(Self { keys })
    }

    /// The root key.
    pub fn root(&self) -> &TraitKey {
        &self.keys[0]
    }

    /// The last key.
    pub fn leaf(&self) -> &TraitKey {
        &self.keys[self.keys.len() - 1]
    }

    pub fn keys(&self) -> &[TraitKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Paths are never empty; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Normalize a path string, a single key, or a key list into a path.
    pub fn as_path<P: IntoTraitPath>(path: P) -> KeyResult<Self> {
        path.into_trait_path()
    }

    /// Append `key` in place.
    pub fn push(&mut self, key: TraitKey) {
        self.keys.push(key);
    }

    /// A new path with `key` appended.
    pub fn join(&self, key: TraitKey) -> Self {
        let mut keys = self.keys.clone();
        keys.push(key);
        Self { keys }
    }

    /// The path without its leaf, or `None` for a single-key path.
    pub fn parent(&self) -> Option<Self> {
        if self.keys.len() == 1 {
            None
        } else {
            Some(Self {
                keys: self.keys[..self.keys.len() - 1].to_vec(),
            })
        }
    }
}

/// Anything that can be normalized into a [`TraitPath`].
pub trait IntoTraitPath {
    fn into_trait_path(self) -> KeyResult<TraitPath>;
}

impl IntoTraitPath for TraitPath {
    fn into_trait_path(self) -> KeyResult<TraitPath> {
        Ok(self)
    }
}

impl IntoTraitPath for &TraitPath {
    fn into_trait_path(self) -> KeyResult<TraitPath> {
        Ok(self.clone())
    }
}

impl IntoTraitPath for TraitKey {
    fn into_trait_path(self) -> KeyResult<TraitPath> {
        Ok(TraitPath::from(self))
    }
}

impl IntoTraitPath for &str {
    fn into_trait_path(self) -> KeyResult<TraitPath> {
        TraitPath::parse(self)
    }
}

impl IntoTraitPath for Vec<TraitKey> {
    fn into_trait_path(self) -> KeyResult<TraitPath> {
        TraitPath::new(self)
    }
}

impl From<TraitKey> for TraitPath {
    fn from(key: TraitKey) -> Self {
        Self { keys: vec![key] }
    }
}

impl fmt::Display for TraitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

impl FromStr for TraitPath {
    type Err = KeyError;

    fn from_str(s: &str) -> KeyResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TraitPath {
    type Error = KeyError;

    fn try_from(s: String) -> KeyResult<Self> {
        Self::parse(&s)
    }
}

impl From<TraitPath> for String {
    fn from(path: TraitPath) -> Self {
        path.to_string()
    }
}
