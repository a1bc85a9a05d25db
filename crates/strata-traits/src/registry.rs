//! The trait registry: resolving partial keys to mappings.
//!
//! Mappings are stored by their full key. For each trait name the registry
//! also records the valid branch/version pairs and the declared defaults,
//! which drive how an under-specified key is completed.

use std::collections::{BTreeMap, BTreeSet};

use strata_keys::{ColumnId, IntoTraitKey, TraitKey};
use tracing::debug;

use crate::error::{TraitError, TraitResult};
use crate::mapping::TraitMapping;
use crate::schema::Schema;

/// How [`TraitRegistry::schema`] arranges its top level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SchemaLayout {
    /// `type -> qualifier -> properties`; unqualified traits put their
    /// properties directly under the type.
    #[default]
    ByTraitType,
    /// `trait_name -> properties`.
    ByTraitName,
}

// ---------------------------------------------------------------------------
// Branches and versions
// ---------------------------------------------------------------------------

/// The valid `(branch, version)` pairs of one trait name. Either part may
/// be absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BranchesVersions {
    entries: BTreeMap<Option<String>, BTreeSet<Option<String>>>,
    descriptions: BTreeMap<Option<String>, String>,
}

impl BranchesVersions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, branch: Option<&str>, version: Option<&str>) {
        self.entries
            .entry(branch.map(str::to_string))
            .or_default()
            .insert(version.map(str::to_string));
    }

    pub fn describe_branch(&mut self, branch: Option<&str>, text: impl Into<String>) {
        self.descriptions.insert(branch.map(str::to_string), text.into());
    }

    pub fn branch_description(&self, branch: Option<&str>) -> Option<&str> {
        self.descriptions
            .get(&branch.map(str::to_string))
            .map(String::as_str)
    }

    /// Known branches in sorted order, the absent branch first.
    pub fn branches(&self) -> impl Iterator<Item = Option<&str>> {
        self.entries.keys().map(|b| b.as_deref())
    }

    /// Known versions of `branch`, or `None` if the branch is unknown.
    pub fn versions(&self, branch: Option<&str>) -> Option<impl Iterator<Item = Option<&str>>> {
        self.entries
            .get(&branch.map(str::to_string))
            .map(|versions| versions.iter().map(|v| v.as_deref()))
    }

    pub fn has_branch(&self, branch: Option<&str>) -> bool {
        self.entries.contains_key(&branch.map(str::to_string))
    }

    pub fn contains(&self, branch: Option<&str>, version: Option<&str>) -> bool {
        self.entries
            .get(&branch.map(str::to_string))
            .is_some_and(|versions| versions.contains(&version.map(str::to_string)))
    }

    /// Number of `(branch, version)` pairs.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn branch_set(&self) -> BTreeSet<Option<String>> {
        self.entries.keys().cloned().collect()
    }

    fn version_set(&self, branch: &Option<String>) -> Option<&BTreeSet<Option<String>>> {
        self.entries.get(branch)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Declared defaults for one trait name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DefaultsRegistry {
    default_branch: Option<String>,
    default_versions: BTreeMap<Option<String>, String>,
    prefer_own: bool,
}

impl DefaultsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = Some(branch.into());
        self
    }

    /// The default version within `branch`.
    pub fn with_version(mut self, branch: Option<&str>, version: impl Into<String>) -> Self {
        self.default_versions
            .insert(branch.map(str::to_string), version.into());
        self
    }

    /// These defaults take precedence over branch and version inherited
    /// from a parent trait.
    pub fn prefer_own_defaults(mut self) -> Self {
        self.prefer_own = true;
        self
    }

    pub fn default_branch(&self) -> Option<&str> {
        self.default_branch.as_deref()
    }

    pub fn default_version(&self, branch: Option<&str>) -> Option<&str> {
        self.default_versions
            .get(&branch.map(str::to_string))
            .map(String::as_str)
    }

    pub fn prefers_own(&self) -> bool {
        self.prefer_own
    }

    /// Fold `other` into these defaults. Declaring a different default for
    /// something that already has one is a [`TraitError::Validation`].
    pub fn merge(&mut self, other: &DefaultsRegistry) -> TraitResult<()> {
        if let Some(branch) = &other.default_branch {
            match &self.default_branch {
                Some(existing) if existing != branch => {
                    return Err(TraitError::Validation(format!(
                        "default branch already set to {existing:?}, cannot change to {branch:?}"
                    )))
                }
                _ => self.default_branch = Some(branch.clone()),
            }
        }
        for (branch, version) in &other.default_versions {
            match self.default_versions.get(branch) {
                Some(existing) if existing != version => {
                    return Err(TraitError::Validation(format!(
                        "default version of branch {branch:?} already set to {existing:?}, cannot change to {version:?}"
                    )))
                }
                _ => {
                    self.default_versions.insert(branch.clone(), version.clone());
                }
            }
        }
        self.prefer_own |= other.prefer_own;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Every mapping of an archive (or of one parent mapping's sub-traits).
#[derive(Clone, Debug, Default)]
pub struct TraitRegistry {
    mappings: BTreeMap<TraitKey, TraitMapping>,
    branches_versions: BTreeMap<String, BranchesVersions>,
    defaults: BTreeMap<String, DefaultsRegistry>,
}

impl TraitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add `mapping` under its full key.
    pub fn register(&mut self, mapping: TraitMapping) -> TraitResult<()> {
        mapping.validate()?;
        let key = mapping.key().clone();
        if self.mappings.contains_key(&key) {
            return Err(TraitError::Validation(format!("duplicate mapping for {key}")));
        }
        self.branches_versions
            .entry(key.trait_name())
            .or_default()
            .insert(key.branch(), key.version());
        debug!(key = %key, class = mapping.class().name(), "registered trait mapping");
        self.mappings.insert(key, mapping);
        Ok(())
    }

    /// Merge `defaults` into the declared defaults of `trait_name`.
    pub fn set_defaults(&mut self, trait_name: &str, defaults: DefaultsRegistry) -> TraitResult<()> {
        strata_keys::split_trait_name(trait_name)?;
        self.defaults
            .entry(trait_name.to_string())
            .or_default()
            .merge(&defaults)
    }

    /// Attach a description to one branch of `trait_name`.
    pub fn describe_branch(&mut self, trait_name: &str, branch: Option<&str>, text: impl Into<String>) -> TraitResult<()> {
        self.branches_versions
            .get_mut(trait_name)
            .ok_or_else(|| TraitError::unknown_trait(trait_name))?
            .describe_branch(branch, text);
        Ok(())
    }

    /// Complete `key` and return the full key with its mapping.
    pub fn resolve(&self, key: impl IntoTraitKey) -> TraitResult<(TraitKey, &TraitMapping)> {
        self.resolve_with_parent(key, None)
    }

    /// Complete `key`, inheriting branch and version from `parent` where
    /// they are valid for this trait name.
    ///
    /// An unset branch is filled by, in order: the parent's branch (unless
    /// this trait's defaults take precedence), the declared default, the
    /// only known branch, or the absent branch. If none applies the key is
    /// ambiguous. The version is then completed the same way within the
    /// chosen branch.
    pub fn resolve_with_parent(
        &self,
        key: impl IntoTraitKey,
        parent: Option<&TraitKey>,
    ) -> TraitResult<(TraitKey, &TraitMapping)> {
        let key = TraitKey::as_traitkey(key)?;
        let trait_name = key.trait_name();
        let known = self
            .branches_versions
            .get(&trait_name)
            .ok_or_else(|| TraitError::unknown_trait(&key))?;
        let defaults = self.defaults.get(&trait_name);
        let parent = parent.filter(|_| !defaults.is_some_and(DefaultsRegistry::prefers_own));

        let branch = match key.branch() {
            Some(b) => Some(b.to_string()),
            None => choose(
                "branch",
                &key,
                &known.branch_set(),
                parent.and_then(TraitKey::branch),
                defaults.and_then(DefaultsRegistry::default_branch),
            )?,
        };

        let version = match key.version() {
            Some(v) => Some(v.to_string()),
            None => {
                let versions = known
                    .version_set(&branch)
                    .ok_or_else(|| TraitError::unknown_trait(&key))?;
                choose(
                    "version",
                    &key,
                    versions,
                    parent.and_then(TraitKey::version),
                    defaults.and_then(|d| d.default_version(branch.as_deref())),
                )?
            }
        };

        let full = key.with_branch_version(branch.as_deref(), version.as_deref())?;
        if full != key {
            debug!(requested = %key, resolved = %full, "applied branch/version defaults");
        }
        match self.mappings.get(&full) {
            Some(mapping) => Ok((full, mapping)),
            None => Err(TraitError::unknown_trait(full)),
        }
    }

    /// Whether `key` resolves to a mapping.
    pub fn can_provide(&self, key: impl IntoTraitKey) -> bool {
        self.resolve(key).is_ok()
    }

    pub fn get(&self, key: &TraitKey) -> Option<&TraitMapping> {
        self.mappings.get(key)
    }

    /// Full keys of every mapping, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &TraitKey> {
        self.mappings.keys()
    }

    pub fn mappings(&self) -> impl Iterator<Item = &TraitMapping> {
        self.mappings.values()
    }

    /// Distinct trait names, sorted.
    pub fn trait_names(&self) -> impl Iterator<Item = &str> {
        self.branches_versions.keys().map(String::as_str)
    }

    /// Distinct trait types, sorted.
    pub fn trait_types(&self) -> BTreeSet<&str> {
        self.mappings.keys().map(TraitKey::trait_type).collect()
    }

    pub fn branches_versions(&self, trait_name: &str) -> Option<&BranchesVersions> {
        self.branches_versions.get(trait_name)
    }

    pub fn defaults(&self, trait_name: &str) -> Option<&DefaultsRegistry> {
        self.defaults.get(trait_name)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Rewrite column aliases into ids in every mapping.
    pub fn bind_columns(&mut self, resolve: &dyn Fn(&str) -> Option<ColumnId>) -> TraitResult<()> {
        for mapping in self.mappings.values_mut() {
            mapping.bind_columns(resolve)?;
        }
        Ok(())
    }

    /// Column ids used anywhere in the registry.
    pub fn column_ids(&self) -> BTreeSet<ColumnId> {
        self.mappings.values().flat_map(TraitMapping::column_ids).collect()
    }

    /// The nested type map of every mapping. Mappings of one trait name on
    /// different branches merge into one entry.
    pub fn schema(&self, layout: SchemaLayout) -> TraitResult<Schema> {
        let mut root = Schema::empty();
        for mapping in self.mappings.values() {
            let fragment = mapping.schema(layout)?;
            let key = mapping.key();
            let placed = match (layout, key.qualifier()) {
                (SchemaLayout::ByTraitType, Some(q)) => Schema::nested(&[key.trait_type(), q], fragment),
                (SchemaLayout::ByTraitType, None) => Schema::nested(&[key.trait_type()], fragment),
                (SchemaLayout::ByTraitName, _) => {
                    let name = key.trait_name();
                    Schema::nested(&[name.as_str()], fragment)
                }
            };
            root.merge(placed)?;
        }
        Ok(root)
    }
}

/// Pick a value for an unset key field from `candidates`.
fn choose(
    field: &'static str,
    key: &TraitKey,
    candidates: &BTreeSet<Option<String>>,
    inherited: Option<&str>,
    declared: Option<&str>,
) -> TraitResult<Option<String>> {
    if let Some(value) = inherited {
        if candidates.contains(&Some(value.to_string())) {
            return Ok(Some(value.to_string()));
        }
    }
    if let Some(value) = declared {
        return Ok(Some(value.to_string()));
    }
    if candidates.len() == 1 {
        return Ok(candidates.iter().next().cloned().flatten());
    }
    if candidates.contains(&None) {
        return Ok(None);
    }
    Err(TraitError::AmbiguousKey {
        key: key.to_string(),
        field,
        candidates: candidates.iter().flatten().cloned().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::TraitClass;
    use crate::standard;
    use std::sync::Arc;
    use strata_column::{PropertyType, Value};

    fn simple() -> Arc<TraitClass> {
        TraitClass::builder("Simple", "t").property("v", PropertyType::Float).build()
    }

    fn mapping(key: &str) -> TraitMapping {
        TraitMapping::new(simple(), key).unwrap().property("v", Value::Float(1.0))
    }

    fn registry(keys: &[&str]) -> TraitRegistry {
        let mut r = TraitRegistry::new();
        for key in keys {
            r.register(mapping(key)).unwrap();
        }
        r
    }

    fn resolved(r: &TraitRegistry, key: &str) -> String {
        r.resolve(key).unwrap().0.to_string()
    }

    // ---- Branch defaults ----

    #[test]
    fn declared_default_branch() {
        let mut r = registry(&["t:A", "t:B"]);
        r.set_defaults("t", DefaultsRegistry::new().with_branch("A")).unwrap();

        assert_eq!(resolved(&r, "t"), "t:A");
        assert_eq!(resolved(&r, "t:B"), "t:B");
        assert!(matches!(r.resolve("t:C"), Err(TraitError::UnknownTrait { .. })));
    }

    #[test]
    fn unknown_trait_name() {
        let r = registry(&["t"]);
        assert!(matches!(r.resolve("u"), Err(TraitError::UnknownTrait { .. })));
        assert!(matches!(r.resolve("t-red"), Err(TraitError::UnknownTrait { .. })));
    }

    #[test]
    fn malformed_key() {
        let r = registry(&["t"]);
        assert!(matches!(r.resolve("2t"), Err(TraitError::Key(_))));
    }

    #[test]
    fn single_branch_needs_no_default() {
        let r = registry(&["t:only(1)"]);
        assert_eq!(resolved(&r, "t"), "t:only(1)");
    }

    #[test]
    fn absent_branch_preferred_over_ambiguity() {
        let r = registry(&["t", "t:A", "t:B"]);
        assert_eq!(resolved(&r, "t"), "t");
    }

    #[test]
    fn ambiguous_without_default() {
        let r = registry(&["t:A", "t:B"]);
        match r.resolve("t") {
            Err(TraitError::AmbiguousKey { field, candidates, .. }) => {
                assert_eq!(field, "branch");
                assert_eq!(candidates, ["A", "B"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
        assert!(!r.can_provide("t"));
        assert!(r.can_provide("t:A"));
    }

    // ---- Version defaults ----

    #[test]
    fn versions_default_within_branch() {
        let mut r = registry(&["t:A(1)", "t:A(2)", "t:B(1)"]);
        r.set_defaults(
            "t",
            DefaultsRegistry::new().with_branch("A").with_version(Some("A"), "2"),
        )
        .unwrap();
        assert_eq!(resolved(&r, "t"), "t:A(2)");
        assert_eq!(resolved(&r, "t:B"), "t:B(1)");
        assert_eq!(resolved(&r, "t:A(1)"), "t:A(1)");
        assert!(matches!(r.resolve("t:A(3)"), Err(TraitError::UnknownTrait { .. })));
    }

    #[test]
    fn ambiguous_version() {
        let r = registry(&["t:A(1)", "t:A(2)"]);
        assert!(matches!(
            r.resolve("t"),
            Err(TraitError::AmbiguousKey { field: "version", .. })
        ));
    }

    // ---- Parent inheritance ----

    #[test]
    fn parent_branch_wins_over_default() {
        let mut r = registry(&["t:A", "t:B"]);
        r.set_defaults("t", DefaultsRegistry::new().with_branch("A")).unwrap();
        let parent = TraitKey::parse("image:B").unwrap();
        let (key, _) = r.resolve_with_parent("t", Some(&parent)).unwrap();
        assert_eq!(key.branch(), Some("B"));
    }

    #[test]
    fn invalid_parent_branch_is_ignored() {
        let mut r = registry(&["t:A", "t:B"]);
        r.set_defaults("t", DefaultsRegistry::new().with_branch("A")).unwrap();
        let parent = TraitKey::parse("image:Z").unwrap();
        let (key, _) = r.resolve_with_parent("t", Some(&parent)).unwrap();
        assert_eq!(key.branch(), Some("A"));
    }

    #[test]
    fn own_defaults_take_precedence() {
        let mut r = registry(&["t:A", "t:B"]);
        r.set_defaults("t", DefaultsRegistry::new().with_branch("A").prefer_own_defaults())
            .unwrap();
        let parent = TraitKey::parse("image:B").unwrap();
        let (key, _) = r.resolve_with_parent("t", Some(&parent)).unwrap();
        assert_eq!(key.branch(), Some("A"));
    }

    // ---- Registration ----

    #[test]
    fn duplicate_mapping_rejected() {
        let mut r = registry(&["t:A"]);
        assert!(matches!(r.register(mapping("t:A")), Err(TraitError::Validation(_))));
    }

    #[test]
    fn invalid_mapping_rejected() {
        let mut r = TraitRegistry::new();
        let m = TraitMapping::new(simple(), "t").unwrap();
        assert!(matches!(r.register(m), Err(TraitError::Validation(_))));
        assert!(r.is_empty());
    }

    #[test]
    fn conflicting_defaults_rejected() {
        let mut r = registry(&["t:A", "t:B"]);
        r.set_defaults("t", DefaultsRegistry::new().with_branch("A")).unwrap();
        r.set_defaults("t", DefaultsRegistry::new().with_branch("A")).unwrap();
        assert!(matches!(
            r.set_defaults("t", DefaultsRegistry::new().with_branch("B")),
            Err(TraitError::Validation(_))
        ));
        assert_eq!(r.defaults("t").unwrap().default_branch(), Some("A"));
    }

    #[test]
    fn branches_versions_recorded() {
        let mut r = registry(&["t:A(1)", "t:A(2)", "t"]);
        r.describe_branch("t", Some("A"), "First reduction").unwrap();
        let bv = r.branches_versions("t").unwrap();
        assert_eq!(bv.branches().collect::<Vec<_>>(), [None, Some("A")]);
        assert_eq!(bv.len(), 3);
        assert!(bv.contains(Some("A"), Some("2")));
        assert!(!bv.contains(Some("A"), None));
        assert_eq!(bv.branch_description(Some("A")), Some("First reduction"));
        assert!(r.describe_branch("u", None, "x").is_err());
    }

    // ---- Schema ----

    fn image_mapping(key: &str) -> TraitMapping {
        TraitMapping::new(standard::image(), key)
            .unwrap()
            .property("data", Value::FloatArray(strata_column::Array::from_vec(vec![1.0])))
            .property("exposed", Value::Float(1.0))
    }

    #[test]
    fn schema_by_trait_type() {
        let mut r = TraitRegistry::new();
        r.register(image_mapping("image-red")).unwrap();
        r.register(image_mapping("image-blue:v2")).unwrap();
        r.register(mapping("t")).unwrap();

        let s = r.schema(SchemaLayout::ByTraitType).unwrap();
        let image = Schema::node([
            ("data", Schema::Leaf(PropertyType::FloatArray)),
            ("exposed", Schema::Leaf(PropertyType::Float)),
        ]);
        assert_eq!(s["image"]["red"], image);
        assert_eq!(s["image"]["blue"], image);
        assert_eq!(s["t"]["v"], Schema::Leaf(PropertyType::Float));
    }

    #[test]
    fn schema_by_trait_name_merges_branches() {
        let mut r = TraitRegistry::new();
        r.register(image_mapping("image-red:A")).unwrap();
        r.register(
            image_mapping("image-red:B").property("variance", Value::FloatArray(strata_column::Array::from_vec(vec![0.1]))),
        )
        .unwrap();
        let s = r.schema(SchemaLayout::ByTraitName).unwrap();
        assert_eq!(s["image-red"].names().collect::<Vec<_>>(), ["data", "exposed", "variance"]);
    }

    #[test]
    fn schema_conflict_between_branches() {
        let other = TraitClass::builder("Other", "t").property("v", PropertyType::String).build();
        let mut r = registry(&["t:A"]);
        r.register(TraitMapping::new(other, "t:B").unwrap().property("v", Value::Str("x".into())))
            .unwrap();
        assert!(matches!(
            r.schema(SchemaLayout::ByTraitType),
            Err(TraitError::SchemaConflict { ref path, .. }) if path == "t.v"
        ));
    }

    #[test]
    fn queries() {
        let mut r = registry(&["t:A", "t:B"]);
        r.register(image_mapping("image-red")).unwrap();
        assert_eq!(r.trait_names().collect::<Vec<_>>(), ["image-red", "t"]);
        assert_eq!(r.trait_types().into_iter().collect::<Vec<_>>(), ["image", "t"]);
        assert_eq!(r.len(), 3);
        assert!(r.get(&TraitKey::parse("t:A").unwrap()).is_some());
        assert_eq!(r.keys().count(), 3);
    }
}
