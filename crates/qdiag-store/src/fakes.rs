//! In-memory field source (testing only)
//!
//! `MemorySource` satisfies the `FieldSource` contract without touching the
//! filesystem and counts how often a field is converted.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

use crate::source::{convert_values, FieldSource};
use crate::store::LogStore;
use crate::Result;

/// Shared handle on the number of `convert` calls made on a `MemorySource`.
#[derive(Debug, Clone, Default)]
pub struct ConversionCounter(Rc<Cell<usize>>);

impl ConversionCounter {
    pub fn get(&self) -> usize {
        self.0.get()
    }
}

/// In-memory document backed by a `BTreeMap<name, raw values>`.
#[derive(Debug, Default)]
pub struct MemorySource {
    fields: BTreeMap<String, Vec<Value>>,
    conversions: ConversionCounter,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a numeric field.
    pub fn with_field(mut self, name: &str, values: impl IntoIterator<Item = f64>) -> Self {
        let raw = values.into_iter().map(Value::from).collect();
        self.fields.insert(name.to_string(), raw);
        self
    }

    /// Add a field with arbitrary JSON elements (for corrupt-data tests).
    pub fn with_raw(mut self, name: &str, values: Vec<Value>) -> Self {
        self.fields.insert(name.to_string(), values);
        self
    }

    pub fn counter(&self) -> ConversionCounter {
        self.conversions.clone()
    }

    pub fn into_store(self, name: &str) -> LogStore {
        LogStore::from_source(name, Box::new(self))
    }
}

impl FieldSource for MemorySource {
    fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    fn convert(&self, name: &str) -> Result<Option<Vec<f64>>> {
        let cell = &self.conversions.0;
        cell.set(cell.get() + 1);
        match self.fields.get(name) {
            Some(values) => convert_values(name, values).map(Some),
            None => Ok(None),
        }
    }
}
