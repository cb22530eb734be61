//! Canonical JSON encoding.
//!
//! Canonical bytes are what gets hashed and signed, so they must not depend on
//! serde field order, map iteration order, or pretty-printing.
//!
//! Rules:
//! - object keys sorted by UTF-8 byte order, recursively
//! - no insignificant whitespace
//! - numbers and strings as emitted by `serde_json` compact form
//!
//! Never hash the output of `serde_json::to_vec` on a struct directly.

use itertools::Itertools;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::{ProofmarkError, ProofmarkResult};
use crate::hash::{sha256_hex, HashHex};

/// Rebuild `value` with every object's keys in sorted order.
pub fn canonical_json_value(value: &Value) -> Value {
    match value {
        Value::Object(obj) => {
            let mut out = Map::new();
            for (k, v) in obj.iter().sorted_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes())) {
                out.insert(k.clone(), canonical_json_value(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_json_value).collect()),
        other => other.clone(),
    }
}

/// Canonical bytes for an arbitrary JSON value.
pub fn canonical_json_bytes(value: &Value) -> ProofmarkResult<Vec<u8>> {
    let mut out = Vec::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

/// Canonical bytes for any serializable type.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> ProofmarkResult<Vec<u8>> {
    let v = serde_json::to_value(value)
        .map_err(|e| ProofmarkError::serialization(format!("failed to serialize: {e}")))?;
    canonical_json_bytes(&v)
}

/// sha256 over canonical bytes.
pub fn canonical_hash<T: Serialize>(value: &T) -> ProofmarkResult<HashHex> {
    Ok(sha256_hex(&to_canonical_bytes(value)?))
}

// Writes keys in sorted order directly so the result does not depend on whether
// serde_json's `preserve_order` feature is enabled somewhere in the build graph.
fn write_canonical(value: &Value, out: &mut Vec<u8>) -> ProofmarkResult<()> {
    match value {
        Value::Object(obj) => {
            out.push(b'{');
            let entries = obj
                .iter()
                .sorted_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            for (i, (k, v)) in entries.enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_scalar(&Value::String(k.clone()), out)?;
                out.push(b':');
                write_canonical(v, out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(v, out)?;
            }
            out.push(b']');
        }
        scalar => write_scalar(scalar, out)?,
    }
    Ok(())
}

fn write_scalar(value: &Value, out: &mut Vec<u8>) -> ProofmarkResult<()> {
    serde_json::to_writer(&mut *out, value)
        .map_err(|e| ProofmarkError::serialization(format!("failed to encode scalar: {e}")))
}
