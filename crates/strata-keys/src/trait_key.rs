//! Trait keys: the structured name of one logical datum of an object.
//!
//! The canonical string form is `type-qualifier:branch(version)`, where
//! every part after the type is omitted when absent:
//!
//! ```text
//! image                  type only
//! image-red              type + qualifier
//! image-red:v02          ... + branch
//! image-red:v02(1.0)     ... + version
//! image(1.0)             type + version, no qualifier or branch
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KeyError, KeyResult};
use crate::names::{validate_branch, validate_qualifier, validate_trait_type, validate_version};

/// Identifies one logical datum for one object.
///
/// All four fields are validated at construction, and a key is immutable
/// afterwards. Equality compares all four fields exactly.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TraitKey {
    trait_type: String,
    qualifier: Option<String>,
    branch: Option<String>,
    version: Option<String>,
}

impl TraitKey {
    /// Build a key from its parts, validating each one.
    pub fn new(
        trait_type: &str,
        qualifier: Option<&str>,
        branch: Option<&str>,
        version: Option<&str>,
    ) -> KeyResult<Self> {
        validate_trait_type(trait_type)?;
        if let Some(q) = qualifier {
            validate_qualifier(q)?;
        }
        if let Some(b) = branch {
            validate_branch(b)?;
        }
        if let Some(v) = version {
            validate_version(v)?;
        }
        Ok(Self {
            trait_type: trait_type.to_string(),
            qualifier: qualifier.map(str::to_string),
            branch: branch.map(str::to_string),
            version: version.map(str::to_string),
        })
    }

    /// A key naming only a trait type.
    pub fn of_type(trait_type: &str) -> KeyResult<Self> {
        Self::new(trait_type, None, None, None)
    }

    /// Parse the canonical string form.
    ///
    /// Empty optional parts are accepted as omissions, so `image-`,
    /// `image:` and `image()` all parse to the same key as `image`.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_keys::TraitKey;
    ///
    /// let key = TraitKey::parse("image-red:v02(1.0)").unwrap();
    /// assert_eq!(key.trait_type(), "image");
    /// assert_eq!(key.qualifier(), Some("red"));
    /// assert_eq!(key.branch(), Some("v02"));
    /// assert_eq!(key.version(), Some("1.0"));
    /// assert_eq!(key.to_string(), "image-red:v02(1.0)");
    ///
    /// assert_eq!(TraitKey::parse("image:").unwrap().to_string(), "image");
    /// assert!(TraitKey::parse("2image").is_err());
    /// ```
    pub fn parse(input: &str) -> KeyResult<Self> {
        let (rest, version) = match input.find('(') {
            Some(open) => {
                let inner = input[open + 1..]
                    .strip_suffix(')')
                    .ok_or_else(|| KeyError::malformed(input, "unterminated version"))?;
                (&input[..open], non_empty(inner))
            }
            None => (input, None),
        };

        let (name, branch) = match rest.split_once(':') {
            Some((name, branch)) => (name, non_empty(branch)),
            None => (rest, None),
        };

        let (trait_type, qualifier) = match name.split_once('-') {
            Some((trait_type, qualifier)) => (trait_type, non_empty(qualifier)),
            None => (name, None),
        };

        Self::new(trait_type, qualifier, branch, version)
            .map_err(|e| KeyError::malformed(input, reason_of(e)))
    }

    /// Normalize anything key-like into a [`TraitKey`].
    ///
    /// Accepts an existing key, a canonical string, or a tuple of
    /// `(type, qualifier, branch, version)` with trailing fields optional.
    ///
    /// ```
    /// use strata_keys::TraitKey;
    ///
    /// let a = TraitKey::as_traitkey("image-red").unwrap();
    /// let b = TraitKey::as_traitkey(("image", Some("red"))).unwrap();
    /// let c = TraitKey::as_traitkey(&a).unwrap();
    /// assert_eq!(a, b);
    /// assert_eq!(a, c);
    /// ```
    pub fn as_traitkey<K: IntoTraitKey>(key: K) -> KeyResult<Self> {
        key.into_trait_key()
    }

    pub fn trait_type(&self) -> &str {
        &self.trait_type
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The registry lookup name: `type` or `type-qualifier`.
    pub fn trait_name(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{}-{}", self.trait_type, q),
            None => self.trait_type.clone(),
        }
    }

    /// A copy of this key with the branch replaced.
    pub fn with_branch(&self, branch: Option<&str>) -> KeyResult<Self> {
        if let Some(b) = branch {
            validate_branch(b)?;
        }
        Ok(Self {
            branch: branch.map(str::to_string),
            ..self.clone()
        })
    }

    /// A copy of this key with the version replaced.
    pub fn with_version(&self, version: Option<&str>) -> KeyResult<Self> {
        if let Some(v) = version {
            validate_version(v)?;
        }
        Ok(Self {
            version: version.map(str::to_string),
            ..self.clone()
        })
    }

    /// A copy of this key with both branch and version replaced.
    pub fn with_branch_version(&self, branch: Option<&str>, version: Option<&str>) -> KeyResult<Self> {
        self.with_branch(branch)?.with_version(version)
    }

    /// The key with branch and version stripped.
    pub fn name_only(&self) -> Self {
        Self {
            trait_type: self.trait_type.clone(),
            qualifier: self.qualifier.clone(),
            branch: None,
            version: None,
        }
    }
}

/// Split a trait name (`type` or `type-qualifier`) into its parts.
pub fn split_trait_name(name: &str) -> KeyResult<(String, Option<String>)> {
    let key = TraitKey::parse(name)?;
    if key.branch.is_some() || key.version.is_some() {
        return Err(KeyError::malformed(
            name,
            "a trait name must not carry a branch or version",
        ));
    }
    Ok((key.trait_type, key.qualifier))
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn reason_of(err: KeyError) -> String {
    match err {
        KeyError::MalformedKey { input, reason } => format!("{reason} ({input:?})"),
    }
}

impl fmt::Display for TraitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.trait_type)?;
        if let Some(q) = &self.qualifier {
            write!(f, "-{q}")?;
        }
        if let Some(b) = &self.branch {
            write!(f, ":{b}")?;
        }
        if let Some(v) = &self.version {
            write!(f, "({v})")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TraitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraitKey({self})")
    }
}

impl FromStr for TraitKey {
    type Err = KeyError;

    fn from_str(s: &str) -> KeyResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TraitKey {
    type Error = KeyError;

    fn try_from(s: String) -> KeyResult<Self> {
        Self::parse(&s)
    }
}

impl From<TraitKey> for String {
    fn from(key: TraitKey) -> Self {
        key.to_string()
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Anything that can be normalized into a [`TraitKey`].
///
/// Shapes outside the implementations below are rejected by the compiler.
/// Strings that do not follow the grammar fail with
/// [`KeyError::MalformedKey`].
pub trait IntoTraitKey {
    fn into_trait_key(self) -> KeyResult<TraitKey>;
}

impl IntoTraitKey for TraitKey {
    fn into_trait_key(self) -> KeyResult<TraitKey> {
        Ok(self)
    }
}

impl IntoTraitKey for &TraitKey {
    fn into_trait_key(self) -> KeyResult<TraitKey> {
        Ok(self.clone())
    }
}

impl IntoTraitKey for &str {
    fn into_trait_key(self) -> KeyResult<TraitKey> {
        TraitKey::parse(self)
    }
}

impl IntoTraitKey for String {
    fn into_trait_key(self) -> KeyResult<TraitKey> {
        TraitKey::parse(&self)
    }
}

impl IntoTraitKey for &String {
    fn into_trait_key(self) -> KeyResult<TraitKey> {
        TraitKey::parse(self)
    }
}

impl IntoTraitKey for (&str,) {
    fn into_trait_key(self) -> KeyResult<TraitKey> {
        TraitKey::new(self.0, None, None, None)
    }
}

impl IntoTraitKey for (&str, Option<&str>) {
    fn into_trait_key(self) -> KeyResult<TraitKey> {
        TraitKey::new(self.0, self.1, None, None)
    }
}

impl IntoTraitKey for (&str, Option<&str>, Option<&str>) {
    fn into_trait_key(self) -> KeyResult<TraitKey> {
        TraitKey::new(self.0, self.1, self.2, None)
    }
}

impl IntoTraitKey for (&str, Option<&str>, Option<&str>, Option<&str>) {
    fn into_trait_key(self) -> KeyResult<TraitKey> {
        TraitKey::new(self.0, self.1, self.2, self.3)
    }
}
