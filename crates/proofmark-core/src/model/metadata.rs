//! Typed open metadata map.
//!
//! Metadata is caller-supplied and ends up inside signing input, so it is
//! bounded: string keys, scalar values or flat arrays of scalars, and explicit
//! size caps from `LimitsConfig`. Keys live in a `BTreeMap`, which fixes their
//! canonical order.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

use crate::config::LimitsConfig;
use crate::errors::ValidationError;

/// A single metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// Flat list. Elements are never `Array`.
    Array(Vec<MetadataValue>),
}

impl MetadataValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    fn scalar_from_json(key: &str, v: &Value, limits: &LimitsConfig) -> Result<Self, ValidationError> {
        match v {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Number(n) => Ok(Self::Number(n.clone())),
            Value::String(s) => {
                if s.len() > limits.max_string_bytes {
                    return Err(ValidationError::Metadata(format!(
                        "value for {key} exceeds {} bytes",
                        limits.max_string_bytes
                    )));
                }
                Ok(Self::String(s.clone()))
            }
            Value::Array(_) => Err(ValidationError::Metadata(format!(
                "nested arrays are not allowed under {key}"
            ))),
            Value::Object(_) => Err(ValidationError::Metadata(format!(
                "objects are not allowed under {key}"
            ))),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for MetadataValue {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

/// Bounded, canonically ordered metadata map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata(BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.0.iter()
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        for (k, v) in &self.0 {
            obj.insert(k.clone(), v.to_json());
        }
        Value::Object(obj)
    }

    /// Decode and bound-check a JSON object.
    pub fn from_json(v: &Value, limits: &LimitsConfig) -> Result<Self, ValidationError> {
        let obj = v
            .as_object()
            .ok_or_else(|| ValidationError::Metadata("metadata must be an object".to_string()))?;

        let mut out = BTreeMap::new();
        for (k, v) in obj {
            let value = match v {
                Value::Array(items) => {
                    if items.len() > limits.max_array_len {
                        return Err(ValidationError::Metadata(format!(
                            "array under {k} exceeds {} items",
                            limits.max_array_len
                        )));
                    }
                    let scalars = items
                        .iter()
                        .map(|i| MetadataValue::scalar_from_json(k, i, limits))
                        .collect::<Result<Vec<_>, _>>()?;
                    MetadataValue::Array(scalars)
                }
                other => MetadataValue::scalar_from_json(k, other, limits)?,
            };
            out.insert(k.clone(), value);
        }

        let md = Self(out);
        md.check_limits(limits)?;
        Ok(md)
    }

    /// Enforce key count, key length and total encoded size.
    pub fn check_limits(&self, limits: &LimitsConfig) -> Result<(), ValidationError> {
        if self.0.len() > limits.max_metadata_keys {
            return Err(ValidationError::Metadata(format!(
                "too many keys: {} > {}",
                self.0.len(),
                limits.max_metadata_keys
            )));
        }

        for (k, v) in &self.0 {
            if k.is_empty() || k.len() > limits.max_key_bytes {
                return Err(ValidationError::Metadata(format!(
                    "key length must be 1..={} bytes",
                    limits.max_key_bytes
                )));
            }
            if let MetadataValue::Array(items) = v {
                if items.len() > limits.max_array_len {
                    return Err(ValidationError::Metadata(format!(
                        "array under {k} exceeds {} items",
                        limits.max_array_len
                    )));
                }
                if items.iter().any(|i| matches!(i, MetadataValue::Array(_))) {
                    return Err(ValidationError::Metadata(format!(
                        "nested arrays are not allowed under {k}"
                    )));
                }
            }
        }

        let encoded = serde_json::to_vec(&self.to_json()).map(|b| b.len()).unwrap_or(usize::MAX);
        if encoded > limits.max_metadata_bytes {
            return Err(ValidationError::Metadata(format!(
                "encoded size {encoded} exceeds {} bytes",
                limits.max_metadata_bytes
            )));
        }

        Ok(())
    }
}
