//! Typed values carried by columns and trait properties.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ColumnError, ColumnResult};

/// The declared type of a column or property.
///
/// The string tags (`"float"`, `"float.array"`, ...) are what schemas
/// report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "float.array")]
    FloatArray,
    #[serde(rename = "int.array")]
    IntArray,
    #[serde(rename = "string.array")]
    StringArray,
}

impl PropertyType {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Int => "int",
            Self::String => "string",
            Self::FloatArray => "float.array",
            Self::IntArray => "int.array",
            Self::StringArray => "string.array",
        }
    }

    pub fn is_array(self) -> bool {
        matches!(self, Self::FloatArray | Self::IntArray | Self::StringArray)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for PropertyType {
    type Err = ColumnError;

    fn from_str(s: &str) -> ColumnResult<Self> {
        // Dimension suffixes such as `float.array.2` are accepted and dropped.
        let trimmed = s.trim_end_matches(|c: char| c.is_ascii_digit());
        let base = if trimmed != s && trimmed.ends_with(".array.") {
            trimmed.trim_end_matches('.')
        } else {
            s
        };
        match base {
            "float" => Ok(Self::Float),
            "int" => Ok(Self::Int),
            "string" => Ok(Self::String),
            "float.array" => Ok(Self::FloatArray),
            "int.array" => Ok(Self::IntArray),
            "string.array" => Ok(Self::StringArray),
            other => Err(ColumnError::InvalidDefinition(format!(
                "unknown property type {other:?}"
            ))),
        }
    }
}

/// A dense, row-major n-dimensional array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Array<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T> Array<T> {
    /// Build an array, checking that `shape` covers exactly `data.len()`
    /// elements.
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> ColumnResult<Self> {
        let expected: usize = shape.iter().product();
        if shape.is_empty() || expected != data.len() {
            return Err(ColumnError::InvalidArray(format!(
                "shape {shape:?} does not hold {} elements",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// A one-dimensional array.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Element at a multi-dimensional index.
    pub fn get(&self, index: &[usize]) -> Option<&T> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0;
        for (i, (&idx, &dim)) in index.iter().zip(&self.shape).enumerate() {
            if idx >= dim {
                return None;
            }
            let stride: usize = self.shape[i + 1..].iter().product();
            offset += idx * stride;
        }
        self.data.get(offset)
    }

    fn map<U>(self, f: impl FnMut(T) -> U) -> Array<U> {
        Array {
            shape: self.shape,
            data: self.data.into_iter().map(f).collect(),
        }
    }
}

/// One scalar, string, or array datum.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Float(f64),
    Int(i64),
    Str(String),
    FloatArray(Array<f64>),
    IntArray(Array<i64>),
    StrArray(Array<String>),
}

impl Value {
    /// The natural type of this value.
    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Float(_) => PropertyType::Float,
            Self::Int(_) => PropertyType::Int,
            Self::Str(_) => PropertyType::String,
            Self::FloatArray(_) => PropertyType::FloatArray,
            Self::IntArray(_) => PropertyType::IntArray,
            Self::StrArray(_) => PropertyType::StringArray,
        }
    }

    /// Convert to `target`, allowing only lossless widening (int to float).
    pub fn coerce(self, target: PropertyType) -> ColumnResult<Value> {
        match (self, target) {
            (Self::Int(i), PropertyType::Float) => Ok(Self::Float(i as f64)),
            (Self::IntArray(a), PropertyType::FloatArray) => {
                Ok(Self::FloatArray(a.map(|i| i as f64)))
            }
            (value, target) if value.property_type() == target => Ok(value),
            (value, target) => Err(ColumnError::TypeMismatch {
                expected: target,
                found: value.property_type().to_string(),
            }),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_float_array(&self) -> Option<&Array<f64>> {
        match self {
            Self::FloatArray(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&Array<i64>> {
        match self {
            Self::IntArray(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_str_array(&self) -> Option<&Array<String>> {
        match self {
            Self::StrArray(a) => Some(a),
            _ => None,
        }
    }

    /// Convert a JSON value.
    ///
    /// `null` yields `Ok(None)`: readers treat it as a missing cell. Nested
    /// arrays must be rectangular; `null` inside a numeric array becomes
    /// NaN.
    pub fn from_json(json: &serde_json::Value) -> Result<Option<Value>, String> {
        use serde_json::Value as Json;

        match json {
            Json::Null => Ok(None),
            Json::Bool(b) => Ok(Some(Self::Int(i64::from(*b)))),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Ok(Some(Self::Int(i))),
                None => n
                    .as_f64()
                    .map(|f| Some(Self::Float(f)))
                    .ok_or_else(|| format!("number {n} is out of range")),
            },
            Json::String(s) => Ok(Some(Self::Str(s.clone()))),
            Json::Array(_) => array_from_json(json).map(Some),
            Json::Object(_) => Err("objects cannot be converted to values".into()),
        }
    }
}

fn array_from_json(json: &serde_json::Value) -> Result<Value, String> {
    let mut shape = Vec::new();
    let mut probe = json;
    while let serde_json::Value::Array(items) = probe {
        shape.push(items.len());
        match items.first() {
            Some(first) => probe = first,
            None => break,
        }
    }

    let mut leaves = Vec::new();
    collect_leaves(json, &shape, 0, &mut leaves)?;

    if leaves.iter().all(|l| l.is_string()) && !leaves.is_empty() {
        let data = leaves
            .iter()
            .filter_map(|l| l.as_str().map(str::to_string))
            .collect();
        return Array::new(shape, data)
            .map(Value::StrArray)
            .map_err(|e| e.to_string());
    }

    if leaves.iter().all(|l| l.is_i64()) && !leaves.is_empty() {
        let data = leaves.iter().filter_map(|l| l.as_i64()).collect();
        return Array::new(shape, data)
            .map(Value::IntArray)
            .map_err(|e| e.to_string());
    }

    let data = leaves
        .iter()
        .map(|l| match l {
            serde_json::Value::Null => Ok(f64::NAN),
            serde_json::Value::Number(n) => n.as_f64().ok_or_else(|| format!("number {n} is out of range")),
            other => Err(format!("mixed array element {other}")),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Array::new(shape, data)
        .map(Value::FloatArray)
        .map_err(|e| e.to_string())
}

fn collect_leaves<'a>(
    json: &'a serde_json::Value,
    shape: &[usize],
    depth: usize,
    out: &mut Vec<&'a serde_json::Value>,
) -> Result<(), String> {
    match (json, shape.get(depth)) {
        (serde_json::Value::Array(items), Some(&len)) => {
            if items.len() != len {
                return Err(format!("ragged array at depth {depth}"));
            }
            for item in items {
                collect_leaves(item, shape, depth + 1, out)?;
            }
            Ok(())
        }
        (serde_json::Value::Array(_), None) => Err(format!("ragged array at depth {depth}")),
        (leaf, None) => {
            out.push(leaf);
            Ok(())
        }
        (_, Some(_)) => Err(format!("ragged array at depth {depth}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn property_type_tags() {
        assert_eq!(PropertyType::FloatArray.to_string(), "float.array");
        assert_eq!("string".parse::<PropertyType>().unwrap(), PropertyType::String);
        assert_eq!("float.array.2".parse::<PropertyType>().unwrap(), PropertyType::FloatArray);
        assert!("double".parse::<PropertyType>().is_err());
    }

    #[test]
    fn array_shape_is_checked() {
        assert!(Array::new(vec![2, 3], vec![0.0; 6]).is_ok());
        assert!(Array::new(vec![2, 3], vec![0.0; 5]).is_err());
        assert!(Array::<f64>::new(vec![], vec![]).is_err());
    }

    #[test]
    fn array_indexing_is_row_major() {
        let a = Array::new(vec![2, 3], vec![0, 1, 2, 3, 4, 5]).unwrap();
        assert_eq!(a.get(&[0, 2]), Some(&2));
        assert_eq!(a.get(&[1, 0]), Some(&3));
        assert_eq!(a.get(&[2, 0]), None);
        assert_eq!(a.get(&[1]), None);
    }

    #[test]
    fn coerce_widens_ints() {
        assert_eq!(Value::Int(3).coerce(PropertyType::Float).unwrap(), Value::Float(3.0));
        let ints = Value::IntArray(Array::from_vec(vec![1, 2]));
        let floats = ints.coerce(PropertyType::FloatArray).unwrap();
        assert_eq!(floats.as_float_array().unwrap().data(), &[1.0, 2.0]);
    }

    #[test]
    fn coerce_rejects_narrowing() {
        let err = Value::Float(1.5).coerce(PropertyType::Int).unwrap_err();
        assert!(matches!(err, ColumnError::TypeMismatch { .. }));
        assert!(Value::Str("x".into()).coerce(PropertyType::Float).is_err());
    }

    #[test]
    fn json_scalars() {
        assert_eq!(Value::from_json(&json!(1)).unwrap(), Some(Value::Int(1)));
        assert_eq!(Value::from_json(&json!(1.5)).unwrap(), Some(Value::Float(1.5)));
        assert_eq!(Value::from_json(&json!("a")).unwrap(), Some(Value::Str("a".into())));
        assert_eq!(Value::from_json(&json!(null)).unwrap(), None);
        assert!(Value::from_json(&json!({"a": 1})).is_err());
    }

    #[test]
    fn json_two_dimensional_array() {
        let v = Value::from_json(&json!([[1.0, 2.5], [3.0, 4.0], [5.0, 6.0]]))
            .unwrap()
            .unwrap();
        let a = v.as_float_array().unwrap();
        assert_eq!(a.shape(), &[3, 2]);
        assert_eq!(a.get(&[1, 1]), Some(&4.0));
    }

    #[test]
    fn json_int_and_string_arrays() {
        let ints = Value::from_json(&json!([1, 2, 3])).unwrap().unwrap();
        assert_eq!(ints.property_type(), PropertyType::IntArray);
        let strs = Value::from_json(&json!(["a", "b"])).unwrap().unwrap();
        assert_eq!(strs.property_type(), PropertyType::StringArray);
    }

    #[test]
    fn json_null_in_numeric_array_is_nan() {
        let v = Value::from_json(&json!([1.0, null])).unwrap().unwrap();
        assert!(v.as_float_array().unwrap().data()[1].is_nan());
    }

    #[test]
    fn json_ragged_array_is_rejected() {
        assert!(Value::from_json(&json!([[1, 2], [3]])).is_err());
        assert!(Value::from_json(&json!([[1, 2], 3])).is_err());
        assert!(Value::from_json(&json!([1, "a"])).is_err());
    }
}
