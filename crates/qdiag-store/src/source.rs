//! Field sources: the seam between a `LogStore` and the parsed document
//!
//! A `FieldSource` knows which fields exist and how to convert one of them
//! into a numeric array. Conversion is the expensive step, so the store
//! calls `convert` at most once per successfully converted field.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::error::StoreError;
use crate::Result;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// SHA-256 hex digest of a raw log document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// FieldSource
// ---------------------------------------------------------------------------

/// Provider of named numeric sequences.
///
/// Guarantees:
/// - `convert(name)` returns `Ok(None)` when the field is absent.
/// - `convert(name)` returns `Err(StoreError::CorruptField)` when an element
///   cannot be read as a number.
/// - `null` elements convert to NaN, booleans to 0.0 / 1.0.
pub trait FieldSource: std::fmt::Debug {
    /// Names of every field in the document, sorted.
    fn field_names(&self) -> Vec<String>;

    /// Whether the document has a field called `name`.
    fn contains(&self, name: &str) -> bool;

    /// Convert one field into a numeric array.
    fn convert(&self, name: &str) -> Result<Option<Vec<f64>>>;
}

/// Convert one raw JSON sequence into numbers.
///
/// Single-element nested arrays (`[[1.0], [2.0]]`, as written for MATLAB
/// column vectors) are unwrapped.
pub fn convert_values(field: &str, values: &[Value]) -> Result<Vec<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| convert_element(value).ok_or_else(|| corrupt(field, index, value)))
        .collect()
}

fn convert_element(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Null => Some(f64::NAN),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Array(inner) if inner.len() == 1 => convert_element(&inner[0]),
        _ => None,
    }
}

/// Characters of an offending value kept in a `CorruptField` error.
const FOUND_MAX_CHARS: usize = 40;

fn corrupt(field: &str, index: usize, value: &Value) -> StoreError {
    let rendered = value.to_string();
    let mut found: String = rendered.chars().take(FOUND_MAX_CHARS).collect();
    if found.len() < rendered.len() {
        found.push_str("...");
    }
    StoreError::CorruptField {
        field: field.to_string(),
        index,
        found,
    }
}

// ---------------------------------------------------------------------------
// JsonDocument
// ---------------------------------------------------------------------------

/// A parsed log document: a flat JSON object whose values are sequences.
#[derive(Debug, Clone)]
pub struct JsonDocument {
    fields: Map<String, Value>,
}

impl JsonDocument {
    /// Parse and validate raw bytes. `origin` is used only for error messages.
    pub fn from_slice(origin: &Path, bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| StoreError::malformed(origin, format!("invalid JSON: {e}")))?;

        let Value::Object(fields) = value else {
            return Err(StoreError::malformed(
                origin,
                "top-level value is not an object",
            ));
        };

        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_array()) {
            return Err(StoreError::malformed(
                origin,
                format!("field '{name}' is not a sequence"),
            ));
        }

        Ok(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of raw elements in a field without converting it.
    pub fn raw_len(&self, name: &str) -> Option<usize> {
        self.fields.get(name).and_then(Value::as_array).map(Vec::len)
    }
}

impl FieldSource for JsonDocument {
    fn field_names(&self) -> Vec<String> {
        // serde_json::Map is a BTreeMap without `preserve_order`, already sorted
        self.fields.keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    fn convert(&self, name: &str) -> Result<Option<Vec<f64>>> {
        match self.fields.get(name).and_then(Value::as_array) {
            Some(values) => convert_values(name, values).map(Some),
            None => Ok(None),
        }
    }
}
