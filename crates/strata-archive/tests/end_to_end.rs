//! Archives over JSON files on disk, read directly and through ingested
//! layers.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use strata_archive::*;
use strata_traits::TraitError;
use tempfile::TempDir;

fn write_object(dir: &Path, object_id: &str, red: serde_json::Value, exposed: f64) {
    let doc = serde_json::json!({ "image": { "red": red, "exposed": exposed } });
    fs::write(dir.join(format!("{object_id}.json")), doc.to_string()).unwrap();
}

fn galaxies() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_object(dir.path(), "Gal1", serde_json::json!([[1.0, 2.0], [3.0, 4.5]]), 3600.0);
    write_object(dir.path(), "Gal2", serde_json::json!([[0, 1], [1, 0]]), 1200.0);
    dir
}

fn wcs_mapping() -> TraitMapping {
    let axis = |a: f64, b: f64| Value::FloatArray(Array::from_vec(vec![a, b]));
    TraitMapping::new(standard::wcs(), "wcs")
        .unwrap()
        .property("crpix", axis(1.0, 1.0))
        .property("crval", axis(150.1, 2.2))
        .property("cdelt", axis(-0.0002, 0.0002))
}

fn red_mapping() -> TraitMapping {
    TraitMapping::new(standard::image(), "image-red")
        .unwrap()
        .property("data", PropertySource::alias("red_data"))
        .property("exposed", PropertySource::alias("red_exposed"))
}

fn build(dir: &Path, dal: Arc<DataAccessLayerHost>) -> Archive {
    build_with(dir, dal, red_mapping().sub_trait(wcs_mapping()).unwrap())
}

fn build_with(dir: &Path, dal: Arc<DataAccessLayerHost>, red: TraitMapping) -> Archive {
    ArchiveBuilder::new("Example")
        .basepath(dir)
        .contents(["Gal1", "Gal2"])
        .aliased_column(
            "red_data",
            Arc::new(JsonDocumentColumn::new("{object_id}.json", "image.red", PropertyType::FloatArray)),
        )
        .aliased_column(
            "red_exposed",
            Arc::new(JsonDocumentColumn::new("{object_id}.json", "image.exposed", PropertyType::Float)),
        )
        .mapping(red)
        .dal(dal)
        .build()
        .unwrap()
}

// ---- schema ----

#[test]
fn schema_lists_image_properties() {
    let dir = galaxies();
    let archive = build_with(dir.path(), Arc::new(DataAccessLayerHost::new()), red_mapping());
    assert_eq!(
        archive.schema().unwrap()["image"]["red"],
        Schema::node([
            ("data", Schema::Leaf(PropertyType::FloatArray)),
            ("exposed", Schema::Leaf(PropertyType::Float)),
        ])
    );
}

#[test]
fn schema_nests_sub_traits() {
    let dir = galaxies();
    let archive = build(dir.path(), Arc::new(DataAccessLayerHost::new()));
    let schema = archive.schema().unwrap();
    let wcs = Schema::node([
        ("cdelt", Schema::Leaf(PropertyType::FloatArray)),
        ("crpix", Schema::Leaf(PropertyType::FloatArray)),
        ("crval", Schema::Leaf(PropertyType::FloatArray)),
    ]);
    assert_eq!(
        schema["image"]["red"],
        Schema::node([
            ("data", Schema::Leaf(PropertyType::FloatArray)),
            ("exposed", Schema::Leaf(PropertyType::Float)),
            ("wcs", wcs),
        ])
    );
    assert!(archive.schema_by_trait_name().unwrap().get("image-red").is_some());
}

// ---- reading ----

#[test]
fn traits_read_from_json_files() {
    let dir = galaxies();
    let archive = build(dir.path(), Arc::new(DataAccessLayerHost::new()));

    let red = archive.get_trait("Gal1", "image-red").unwrap();
    let data = red.value("data").unwrap().as_float_array().unwrap();
    assert_eq!(data.shape(), &[2, 2]);
    assert_eq!(data.get(&[1, 1]), Some(&4.5));
    assert_eq!(red.value("exposed").unwrap(), &Value::Float(3600.0));

    // Integer pixels widen to the declared float type.
    let gal2 = archive.object("Gal2").unwrap().get("image-red").unwrap();
    assert_eq!(gal2.value("data").unwrap().as_float_array().unwrap().data(), &[0.0, 1.0, 1.0, 0.0]);
}

#[test]
fn sub_trait_values_through_paths() {
    let dir = galaxies();
    let archive = build(dir.path(), Arc::new(DataAccessLayerHost::new()));
    let path = TraitPath::parse("image-red/wcs").unwrap();
    let crval = archive.value_at("Gal1", &path, "crval").unwrap();
    assert_eq!(crval.as_float_array().unwrap().data(), &[150.1, 2.2]);

    let wcs = archive.get_trait("Gal1", "image-red").unwrap().get_sub_trait("wcs").unwrap();
    assert_eq!(wcs.path().to_string(), "image-red/wcs");
}

#[test]
fn unknown_object_and_trait() {
    let dir = galaxies();
    let archive = build(dir.path(), Arc::new(DataAccessLayerHost::new()));
    assert!(matches!(archive.object("Gal3"), Err(ArchiveError::NotInArchive { .. })));
    assert!(matches!(
        archive.get_trait("Gal1", "image-blue"),
        Err(ArchiveError::Trait(TraitError::UnknownTrait { .. }))
    ));
    assert!(!archive.can_provide("image-blue"));
    assert!(archive.can_provide("image-red"));
}

#[test]
fn missing_file_is_data_not_available() {
    let dir = galaxies();
    let archive = build(dir.path(), Arc::new(DataAccessLayerHost::new()));
    fs::remove_file(dir.path().join("Gal2.json")).unwrap();

    let t = archive.get_trait("Gal2", "image-red").unwrap();
    let err = ArchiveError::from(t.value("data").unwrap_err());
    assert!(err.is_data_not_available());
    // Other objects are unaffected.
    assert!(archive.get_trait("Gal1", "image-red").unwrap().value("data").is_ok());
}

// ---- branches ----

#[test]
fn default_branch_applies_to_bare_names() {
    let flux = |value: f64| Value::Float(value);
    let a = TraitMapping::new(standard::measurement(), "measurement-flux:A")
        .unwrap()
        .property("value", flux(1.0));
    let b = TraitMapping::new(standard::measurement(), "measurement-flux:B")
        .unwrap()
        .property("value", flux(2.0));
    let archive = ArchiveBuilder::new("Example")
        .contents(["Gal1"])
        .mapping(a)
        .mapping(b)
        .defaults("measurement-flux", DefaultsRegistry::new().with_branch("A"))
        .build()
        .unwrap();

    let bare = archive.get_trait("Gal1", "measurement-flux").unwrap();
    assert_eq!(bare.key().branch(), Some("A"));
    assert_eq!(bare.value("value").unwrap(), &Value::Float(1.0));

    let explicit = archive.get_trait("Gal1", "measurement-flux:B").unwrap();
    assert_eq!(explicit.value("value").unwrap(), &Value::Float(2.0));
}

// ---- data access layers ----

#[test]
fn ingested_cells_survive_source_removal() {
    let dir = galaxies();
    let store = TempDir::new().unwrap();
    let layer: Arc<dyn DataAccessLayer> = Arc::new(FileStoreLayer::new(store.path()).unwrap().with_name("cache"));
    let dal = Arc::new(DataAccessLayerHost::with_layers(vec![layer]).unwrap());
    let archive = build(dir.path(), dal);

    let report = archive.ingest_into("cache", &CancelToken::new()).unwrap();
    assert_eq!(report.columns, 2);
    assert_eq!(report.objects_written, 4);

    fs::remove_file(dir.path().join("Gal1.json")).unwrap();
    let red = archive.get_trait("Gal1", "image-red").unwrap();
    assert_eq!(red.value("exposed").unwrap(), &Value::Float(3600.0));
    assert_eq!(red.value("data").unwrap().as_float_array().unwrap().data(), &[1.0, 2.0, 3.0, 4.5]);
}

#[test]
fn empty_layers_fall_back_to_source() {
    let dir = galaxies();
    let store = TempDir::new().unwrap();
    let layer: Arc<dyn DataAccessLayer> = Arc::new(FileStoreLayer::new(store.path()).unwrap());
    let sqlite: Arc<dyn DataAccessLayer> = Arc::new(SqliteLayer::new(Arc::new(SqlHandle::open_in_memory().unwrap())).unwrap());
    let dal = Arc::new(DataAccessLayerHost::with_layers(vec![layer, sqlite]).unwrap());
    let archive = build(dir.path(), dal);

    let red = archive.get_trait("Gal2", "image-red").unwrap();
    assert_eq!(red.value("exposed").unwrap(), &Value::Float(1200.0));
}

// ---- export ----

#[test]
fn export_writes_container_document() {
    let dir = galaxies();
    let archive = build(dir.path(), Arc::new(DataAccessLayerHost::new()));
    let red = archive.get_trait("Gal1", "image-red").unwrap();
    let exported = red.export(&ExportRequest::all()).unwrap();
    assert_eq!(exported.property("exposed"), Some(&Value::Float(3600.0)));
    assert_eq!(exported.sub_traits.len(), 1);

    let mut out = Vec::new();
    exported.write_json(&mut out).unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(doc["format"], "strata.trait");
    assert_eq!(doc["trait"]["key"], "image-red");
    assert_eq!(doc["trait"]["object_id"], "Gal1");
}
