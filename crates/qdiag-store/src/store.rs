//! `LogStore`: a lazily materialised view over one log document

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::fields::{self, FieldGroup};
use crate::source::{ContentDigest, FieldSource, JsonDocument};
use crate::Result;

/// Shared, immutable converted field.
pub type Series = Rc<[f64]>;

/// One loaded log document with a per-field conversion cache.
///
/// Fields are converted on first access; later accesses return the cached
/// array. Missing fields read as empty arrays.
#[derive(Debug)]
pub struct LogStore {
    name: String,
    path: Option<PathBuf>,
    source: Box<dyn FieldSource>,
    digest: Option<ContentDigest>,
    cache: RefCell<HashMap<String, Series>>,
}

/// Overview of a loaded log, as printed by `qdiag inspect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub sample_count: usize,
    pub has_instrumentation: bool,
    pub time_start: f64,
    pub time_end: f64,
    pub field_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl LogStore {
    /// Load and parse the JSON document at `path`.
    ///
    /// Fails with `NotFound` when the file is absent and `Malformed` when it
    /// is not a flat object of sequences.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let document = JsonDocument::from_slice(path, &bytes)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        debug!(
            path = %path.display(),
            fields = document.len(),
            bytes = bytes.len(),
            "log document parsed"
        );

        Ok(Self {
            name,
            path: Some(path.to_path_buf()),
            source: Box::new(document),
            digest: Some(ContentDigest::from_bytes(&bytes)),
            cache: RefCell::new(HashMap::new()),
        })
    }

    /// Parse a document already held in memory.
    pub fn from_json_str(name: impl Into<String>, text: &str) -> Result<Self> {
        let name = name.into();
        let document = JsonDocument::from_slice(Path::new(&name), text.as_bytes())?;
        Ok(Self {
            digest: Some(ContentDigest::from_bytes(text.as_bytes())),
            ..Self::from_source(name, Box::new(document))
        })
    }

    /// Wrap an arbitrary field source (used by test doubles).
    pub fn from_source(name: impl Into<String>, source: Box<dyn FieldSource>) -> Self {
        Self {
            name: name.into(),
            path: None,
            source,
            digest: None,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn digest(&self) -> Option<&ContentDigest> {
        self.digest.as_ref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.source.contains(name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.source.field_names()
    }

    /// Numeric array for `name`, or an error if an element is not numeric.
    ///
    /// Absent fields yield an empty array.
    pub fn try_field(&self, name: &str) -> Result<Series> {
        if let Some(series) = self.cache.borrow().get(name) {
            return Ok(Rc::clone(series));
        }

        let series: Series = self.source.convert(name)?.unwrap_or_default().into();
        self.cache
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&series));
        Ok(series)
    }

    /// Numeric array for `name`; empty when absent or unreadable.
    pub fn field(&self, name: &str) -> Series {
        match self.try_field(name) {
            Ok(series) => series,
            Err(e) => {
                warn!(log = %self.name, field = name, error = %e, "field conversion failed");
                Rc::from(Vec::new())
            }
        }
    }

    /// Length of the first populated field among `Q_e`, `Q_t`,
    /// `DEBUG_old_state`; 0 if none.
    pub fn sample_count(&self) -> usize {
        fields::SAMPLE_COUNT_CANDIDATES
            .iter()
            .map(|name| self.field(name).len())
            .find(|&len| len > 0)
            .unwrap_or(0)
    }

    /// Whether any debug field carries at least one nonzero value.
    pub fn has_instrumentation(&self) -> bool {
        fields::DEBUG_FIELDS.iter().any(|name| {
            self.contains(name) && self.field(name).iter().any(|&v| v != 0.0 && !v.is_nan())
        })
    }

    /// First and last positive value of `Q_t`; `(0, 0)` when absent.
    pub fn time_range(&self) -> (f64, f64) {
        let time = self.field(fields::Q_TIME);
        let mut positive = time.iter().copied().filter(|&t| t > 0.0);
        match positive.next() {
            Some(first) => (first, positive.last().unwrap_or(first)),
            None => (0.0, 0.0),
        }
    }

    /// Sample indices where a Q-table update happened.
    ///
    /// Uses the learning flag when the log has one, otherwise every sample
    /// with a recorded exploration decision. An unreadable flag yields no
    /// indices.
    pub fn learning_indices(&self) -> Vec<usize> {
        if self.contains(fields::DEBUG_LEARNING) {
            let flag = self.field(fields::DEBUG_LEARNING);
            return indices_where(&flag, |v| v == 1.0);
        }
        let exploration = self.field(fields::Q_EXPLORATION);
        indices_where(&exploration, |v| v >= 0.0)
    }

    /// Present fields of a well-known group.
    pub fn field_group(&self, group: FieldGroup) -> Vec<&'static str> {
        group
            .fields()
            .iter()
            .copied()
            .filter(|name| self.contains(name))
            .collect()
    }

    pub fn summary(&self) -> LogSummary {
        let (time_start, time_end) = self.time_range();
        LogSummary {
            name: self.name.clone(),
            path: self.path.clone(),
            sample_count: self.sample_count(),
            has_instrumentation: self.has_instrumentation(),
            time_start,
            time_end,
            field_count: self.field_names().len(),
            digest: self.digest.as_ref().map(|d| d.as_str().to_string()),
        }
    }
}

fn indices_where(values: &[f64], pred: impl Fn(f64) -> bool) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter(|&(_, &v)| pred(v))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(text: &str) -> LogStore {
        LogStore::from_json_str("mem", text).unwrap()
    }

    #[test]
    fn test_missing_field_is_empty() {
        let s = store(r#"{"Q_e": [1, 2, 3]}"#);
        assert!(s.field("X").is_empty());
        assert!(s.try_field("X").unwrap().is_empty());
    }

    #[test]
    fn test_sample_count_falls_back() {
        let s = store(r#"{"Q_t": [0.1, 0.2], "DEBUG_old_state": [1, 2, 3]}"#);
        assert_eq!(s.sample_count(), 2);

        let s = store(r#"{"Q_e": [], "DEBUG_old_state": [1, 2, 3]}"#);
        assert_eq!(s.sample_count(), 3);

        let s = store(r#"{"PID_e": [1]}"#);
        assert_eq!(s.sample_count(), 0);
    }

    #[test]
    fn test_has_instrumentation() {
        assert!(!store(r#"{"Q_e": [1]}"#).has_instrumentation());
        assert!(!store(r#"{"DEBUG_TD_error": [0, 0], "DEBUG_goal_Q": [0]}"#).has_instrumentation());
        assert!(store(r#"{"DEBUG_TD_error": [0, 0.5]}"#).has_instrumentation());
        // non-debug nonzero data does not count
        assert!(!store(r#"{"DEBUG_goal_Q": [0], "Q_u": [5]}"#).has_instrumentation());
    }

    #[test]
    fn test_time_range_skips_non_positive() {
        let s = store(r#"{"Q_t": [0, 0.1, 0.2, 0.3, 0]}"#);
        assert_eq!(s.time_range(), (0.1, 0.3));
        assert_eq!(store(r#"{}"#).time_range(), (0.0, 0.0));
    }

    #[test]
    fn test_learning_indices_prefers_flag() {
        let s = store(r#"{"DEBUG_uczenie_T0": [0, 1, 1, 0], "Q_losowanie": [0, 0, 0, 0]}"#);
        assert_eq!(s.learning_indices(), vec![1, 2]);

        let s = store(r#"{"Q_losowanie": [-1, 0, 1]}"#);
        assert_eq!(s.learning_indices(), vec![1, 2]);

        assert!(store(r#"{}"#).learning_indices().is_empty());
    }

    #[test]
    fn test_learning_indices_ignores_exploration_when_flag_corrupt() {
        let s = store(r#"{"DEBUG_uczenie_T0": [1, "x", 1], "Q_losowanie": [0, 0, 1]}"#);
        assert!(s.learning_indices().is_empty());

        let s = store(r#"{"DEBUG_uczenie_T0": [], "Q_losowanie": [0, 1]}"#);
        assert!(s.learning_indices().is_empty());
    }

    #[test]
    fn test_corrupt_field_surfaces_only_through_try_field() {
        let s = store(r#"{"Q_e": [1, "x"]}"#);
        assert!(s.try_field("Q_e").unwrap_err().is_field_level());
        assert!(s.field("Q_e").is_empty());
    }

    #[test]
    fn test_summary_carries_digest() {
        let s = store(r#"{"Q_e": [1, 2], "Q_t": [0.1, 0.2]}"#);
        let summary = s.summary();
        assert_eq!(summary.sample_count, 2);
        assert_eq!(summary.field_count, 2);
        assert_eq!(summary.digest.as_deref().map(str::len), Some(64));
    }
}
