//! Ready-made trait classes.
//!
//! Each function returns the shared class for its type. Archives map
//! columns onto these, or declare their own classes with
//! [`TraitClass::builder`].

use std::sync::{Arc, OnceLock};

use strata_column::{Array, PropertyType, Value};

use crate::class::{QualifierPolicy, TraitClass};
use crate::error::{TraitError, TraitResult};
use crate::instance::Trait;

/// World coordinate system of an image or map: `wcs`.
pub fn wcs() -> Arc<TraitClass> {
    static CLASS: OnceLock<Arc<TraitClass>> = OnceLock::new();
    CLASS
        .get_or_init(|| {
            TraitClass::builder("WorldCoordinateSystem", "wcs")
                .qualifiers(QualifierPolicy::Forbidden)
                .pretty_name("World Coordinate System")
                .short_description("Mapping from pixel to sky coordinates")
                .described_property("crpix", PropertyType::FloatArray, false, "Reference pixel")
                .described_property("crval", PropertyType::FloatArray, false, "Coordinates at the reference pixel")
                .described_property("cdelt", PropertyType::FloatArray, false, "Coordinate increment per pixel")
                .optional_property("ctype", PropertyType::StringArray)
                .build()
        })
        .clone()
}

/// A two-dimensional image, usually qualified by band: `image-red`.
pub fn image() -> Arc<TraitClass> {
    static CLASS: OnceLock<Arc<TraitClass>> = OnceLock::new();
    CLASS
        .get_or_init(|| {
            TraitClass::builder("Image", "image")
                .pretty_name("Image")
                .short_description("A two-dimensional image")
                .described_property("data", PropertyType::FloatArray, false, "Pixel values")
                .described_property("exposed", PropertyType::Float, true, "Exposure time")
                .optional_property("variance", PropertyType::FloatArray)
                .sub_trait(wcs(), true)
                .build()
        })
        .clone()
}

/// A cube of spectra over a spatial grid: `spectral_map-blue`.
pub fn spectral_map() -> Arc<TraitClass> {
    static CLASS: OnceLock<Arc<TraitClass>> = OnceLock::new();
    CLASS
        .get_or_init(|| {
            TraitClass::builder("SpectralMap", "spectral_map")
                .pretty_name("Spectral Map")
                .short_description("Spectra arranged on a spatial grid")
                .described_property("value", PropertyType::FloatArray, false, "Flux per wavelength slice")
                .optional_property("variance", PropertyType::FloatArray)
                .optional_property("covariance", PropertyType::FloatArray)
                .optional_property("weight", PropertyType::FloatArray)
                .computed("shape", PropertyType::IntArray, cube_shape)
                .sub_trait(wcs(), true)
                .build()
        })
        .clone()
}

/// A single measured quantity with its uncertainty: `stellar_mass`.
pub fn measurement() -> Arc<TraitClass> {
    static CLASS: OnceLock<Arc<TraitClass>> = OnceLock::new();
    CLASS
        .get_or_init(|| {
            TraitClass::builder("Measurement", "measurement")
                .pretty_name("Measurement")
                .described_property("value", PropertyType::Float, false, "Measured value")
                .optional_property("uncertainty", PropertyType::Float)
                .optional_property("unit", PropertyType::String)
                .build()
        })
        .clone()
}

/// A row of an object catalog: `catalog-gama`.
pub fn catalog() -> Arc<TraitClass> {
    static CLASS: OnceLock<Arc<TraitClass>> = OnceLock::new();
    CLASS
        .get_or_init(|| {
            TraitClass::builder("CatalogEntry", "catalog")
                .pretty_name("Catalog Entry")
                .short_description("Position and identification from a catalog")
                .described_property("ra", PropertyType::Float, false, "Right ascension in degrees")
                .described_property("dec", PropertyType::Float, false, "Declination in degrees")
                .optional_property("redshift", PropertyType::Float)
                .optional_property("name", PropertyType::String)
                .build()
        })
        .clone()
}

fn cube_shape(t: &Trait<'_>) -> TraitResult<Value> {
    let shape = t
        .value("value")?
        .as_float_array()
        .map(|a| a.shape().to_vec())
        .ok_or_else(|| TraitError::Validation(format!("value of {} is not a float array", t.key())))?;
    let shape = shape
        .into_iter()
        .map(|n| i64::try_from(n).unwrap_or(i64::MAX))
        .collect();
    Ok(Value::IntArray(Array::from_vec(shape)))
}
