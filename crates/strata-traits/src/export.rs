//! Exporting a trait and its sub-traits to a self-describing document.

use std::collections::BTreeSet;
use std::io::Write;

use serde::{Deserialize, Serialize};
use strata_column::{PropertyType, Value};

use crate::error::{TraitError, TraitResult};
use crate::instance::Trait;

/// Container format identifier written by [`ExportedTrait::write_json`].
pub const EXPORT_FORMAT: &str = "strata.trait";

/// Container format version.
pub const EXPORT_VERSION: u32 = 1;

/// Which parts of a trait to export.
///
/// The property filter applies to the top-level trait. Sub-traits, when
/// included, are exported in full.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportRequest {
    properties: Option<BTreeSet<String>>,
    skip_sub_traits: bool,
}

impl ExportRequest {
    /// Every provided property and every sub-trait.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only the named properties.
    pub fn only<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            properties: Some(names.into_iter().map(Into::into).collect()),
            skip_sub_traits: false,
        }
    }

    pub fn without_sub_traits(mut self) -> Self {
        self.skip_sub_traits = true;
        self
    }

    pub fn wants(&self, property: &str) -> bool {
        self.properties
            .as_ref()
            .map_or(true, |names| names.contains(property))
    }
}

/// One exported property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportedProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub value: Value,
}

/// A trait materialized for export, in schema order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportedTrait {
    pub key: String,
    pub path: String,
    pub object_id: String,
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub properties: Vec<ExportedProperty>,
    /// Requested properties with no data for this object.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_traits: Vec<ExportedTrait>,
}

#[derive(Serialize)]
struct Container<'a> {
    format: &'static str,
    version: u32,
    #[serde(rename = "trait")]
    exported: &'a ExportedTrait,
}

impl ExportedTrait {
    /// Write the document wrapped in a container naming its format.
    pub fn write_json<W: Write>(&self, writer: W) -> TraitResult<()> {
        let container = Container {
            format: EXPORT_FORMAT,
            version: EXPORT_VERSION,
            exported: self,
        };
        serde_json::to_writer_pretty(writer, &container).map_err(|e| TraitError::Export(e.to_string()))
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

impl Trait<'_> {
    /// Materialize the requested parts of this trait.
    ///
    /// Only requested properties are computed. A property with no data is
    /// listed under `unavailable`; any other failure aborts the export.
    pub fn export(&self, request: &ExportRequest) -> TraitResult<ExportedTrait> {
        let mut exported = ExportedTrait {
            key: self.key().to_string(),
            path: self.path().to_string(),
            object_id: self.object_id().to_string(),
            class: self.class().name().to_string(),
            description: self.mapping().description().map(str::to_string),
            properties: Vec::new(),
            unavailable: Vec::new(),
            sub_traits: Vec::new(),
        };

        for property in self.trait_properties() {
            if !request.wants(property.name()) {
                continue;
            }
            match property.value() {
                Ok(value) => exported.properties.push(ExportedProperty {
                    name: property.name().to_string(),
                    property_type: property.property_type(),
                    value: value.clone(),
                }),
                Err(e) if e.is_data_not_available() => exported.unavailable.push(property.name().to_string()),
                Err(e) => return Err(e),
            }
        }

        if !request.skip_sub_traits {
            for key in self.sub_trait_keys() {
                let child = self.get_sub_trait(&key)?;
                exported.sub_traits.push(child.export(&ExportRequest::all())?);
            }
        }
        Ok(exported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::CellSource;
    use crate::mapping::TraitMapping;
    use crate::registry::TraitRegistry;
    use crate::standard;
    use std::cell::RefCell;
    use strata_column::Array;
    use strata_keys::{ColumnId, ColumnTimestamp};

    /// Records which columns were read; has data only for `red`.
    #[derive(Default)]
    struct Recording {
        reads: RefCell<Vec<String>>,
    }

    impl CellSource for Recording {
        fn cell(&self, column: &ColumnId, object_id: &str) -> TraitResult<Value> {
            self.reads.borrow_mut().push(column.column_name().to_string());
            match column.column_name() {
                "red" => Ok(Value::FloatArray(Array::new(vec![1, 2], vec![5.0, 6.0]).unwrap())),
                "crpix" | "crval" | "cdelt" => Ok(Value::FloatArray(Array::from_vec(vec![0.0, 0.0]))),
                _ => Err(TraitError::DataNotAvailable {
                    column: column.to_string(),
                    object_id: object_id.to_string(),
                }),
            }
        }
    }

    fn id(name: &str) -> ColumnId {
        ColumnId::new("Example", "ColumnFromData", name, ColumnTimestamp::Latest).unwrap()
    }

    fn registry() -> TraitRegistry {
        let wcs = TraitMapping::new(standard::wcs(), "wcs")
            .unwrap()
            .property("crpix", id("crpix"))
            .property("crval", id("crval"))
            .property("cdelt", id("cdelt"));
        let red = TraitMapping::new(standard::image(), "image-red")
            .unwrap()
            .property("data", id("red"))
            .property("exposed", Value::Float(60.0))
            .property("variance", id("red_var"))
            .long_description("Red band image")
            .sub_trait(wcs)
            .unwrap();
        let mut r = TraitRegistry::new();
        r.register(red).unwrap();
        r
    }

    #[test]
    fn export_everything() {
        let source = Recording::default();
        let r = registry();
        let t = Trait::resolve(&source, &r, "Gal1", "image-red").unwrap();
        let e = t.export(&ExportRequest::all()).unwrap();

        let names: Vec<_> = e.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["data", "exposed"]);
        assert_eq!(e.unavailable, ["variance"]);
        assert_eq!(e.description.as_deref(), Some("Red band image"));
        assert_eq!(e.sub_traits.len(), 1);
        assert_eq!(e.sub_traits[0].path, "image-red/wcs");
        assert_eq!(e.sub_traits[0].properties.len(), 3);
    }

    #[test]
    fn unrequested_properties_are_not_computed() {
        let source = Recording::default();
        let r = registry();
        let t = Trait::resolve(&source, &r, "Gal1", "image-red").unwrap();
        let e = t
            .export(&ExportRequest::only(["exposed"]).without_sub_traits())
            .unwrap();
        assert_eq!(e.property("exposed"), Some(&Value::Float(60.0)));
        assert!(e.sub_traits.is_empty());
        assert!(source.reads.borrow().is_empty());
        assert!(!t.is_loaded("data"));
    }

    #[test]
    fn write_json_container() {
        let source = Recording::default();
        let r = registry();
        let t = Trait::resolve(&source, &r, "Gal1", "image-red").unwrap();
        let e = t.export(&ExportRequest::only(["data"])).unwrap();

        let mut buf = Vec::new();
        e.write_json(&mut buf).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(doc["format"], EXPORT_FORMAT);
        assert_eq!(doc["version"], EXPORT_VERSION);
        assert_eq!(doc["trait"]["key"], "image-red");
        assert_eq!(doc["trait"]["properties"][0]["type"], "float.array");

        let back: ExportedTrait = serde_json::from_value(doc["trait"].clone()).unwrap();
        assert_eq!(back, e);
    }
}
