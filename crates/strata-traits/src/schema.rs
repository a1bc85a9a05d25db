//! Schema trees.
//!
//! A schema maps property and sub-trait names to type tags. Leaves are
//! property types; nodes are named children. Merging is total: two trees
//! either combine or the merge fails at the first incompatible path.

use std::collections::BTreeMap;
use std::ops::Index;

use serde::{Deserialize, Serialize};
use strata_column::PropertyType;

use crate::error::{TraitError, TraitResult};

/// A tagged schema tree.
///
/// Serializes to the plain nested form `{"data": "float.array", ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Schema {
    Leaf(PropertyType),
    Node(BTreeMap<String, Schema>),
}

impl Default for Schema {
    fn default() -> Self {
        Self::empty()
    }
}

impl Schema {
    /// An empty node.
    pub fn empty() -> Self {
        Self::Node(BTreeMap::new())
    }

    /// A node from `(name, child)` pairs.
    pub fn node<K: Into<String>>(entries: impl IntoIterator<Item = (K, Schema)>) -> Self {
        Self::Node(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// `leaf` nested under each name of `path` in turn.
    pub fn nested(path: &[&str], leaf: Schema) -> Self {
        path.iter()
            .rev()
            .fold(leaf, |inner, name| Self::node([(*name, inner)]))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Node(children) if children.is_empty())
    }

    pub fn leaf_type(&self) -> Option<PropertyType> {
        match self {
            Self::Leaf(t) => Some(*t),
            Self::Node(_) => None,
        }
    }

    /// The child named `name`, if this is a node that has one.
    pub fn get(&self, name: &str) -> Option<&Schema> {
        match self {
            Self::Node(children) => children.get(name),
            Self::Leaf(_) => None,
        }
    }

    /// Child names in sorted order; empty for a leaf.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let children = match self {
            Self::Node(children) => Some(children),
            Self::Leaf(_) => None,
        };
        children.into_iter().flat_map(|c| c.keys().map(String::as_str))
    }

    /// Merge `other` into `self`.
    ///
    /// Equal leaves merge to themselves and nodes merge child by child.
    /// A leaf against a node, or two different leaf types, is
    /// [`TraitError::SchemaConflict`] naming the dotted path.
    pub fn merge(&mut self, other: Schema) -> TraitResult<()> {
        let mut path = Vec::new();
        self.merge_at(other, &mut path)
    }

    fn merge_at(&mut self, other: Schema, path: &mut Vec<String>) -> TraitResult<()> {
        match (self, other) {
            (Self::Leaf(a), Self::Leaf(b)) => {
                if *a == b {
                    Ok(())
                } else {
                    Err(conflict(path, format!("{a} versus {b}")))
                }
            }
            (Self::Node(ours), Self::Node(theirs)) => {
                for (name, child) in theirs {
                    path.push(name.clone());
                    match ours.get_mut(&name) {
                        Some(existing) => existing.merge_at(child, path)?,
                        None => {
                            ours.insert(name, child);
                        }
                    }
                    path.pop();
                }
                Ok(())
            }
            (Self::Leaf(a), Self::Node(_)) => Err(conflict(path, format!("{a} versus a nested schema"))),
            (Self::Node(_), Self::Leaf(b)) => Err(conflict(path, format!("a nested schema versus {b}"))),
        }
    }
}

fn conflict(path: &[String], reason: String) -> TraitError {
    let path = if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    };
    TraitError::SchemaConflict { path, reason }
}

impl Index<&str> for Schema {
    type Output = Schema;

    /// # Panics
    ///
    /// Panics if this is a leaf or has no child named `name`.
    fn index(&self, name: &str) -> &Schema {
        match self.get(name) {
            Some(child) => child,
            None => panic!("schema has no entry {name:?}"),
        }
    }
}

impl From<PropertyType> for Schema {
    fn from(t: PropertyType) -> Self {
        Self::Leaf(t)
    }
}
