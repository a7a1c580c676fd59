//! Conventional log locations and discovery

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::LogStore;

/// The three logs produced by one simulation campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Before,
    Training,
    After,
}

impl LogKind {
    pub fn all() -> [LogKind; 3] {
        [LogKind::Before, LogKind::Training, LogKind::After]
    }

    pub fn label(self) -> &'static str {
        match self {
            LogKind::Before => "before",
            LogKind::Training => "training",
            LogKind::After => "after",
        }
    }
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Log directory plus the file name of each conventional log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSet {
    pub dir: PathBuf,
    pub before: String,
    pub training: String,
    pub after: String,
}

impl Default for LogSet {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            before: "logi_before_learning.json".to_string(),
            training: "logi_training.json".to_string(),
            after: "logi_after_learning.json".to_string(),
        }
    }
}

impl LogSet {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn file_name(&self, kind: LogKind) -> &str {
        match kind {
            LogKind::Before => &self.before,
            LogKind::Training => &self.training,
            LogKind::After => &self.after,
        }
    }

    /// Full path of one conventional log.
    pub fn path(&self, kind: LogKind) -> PathBuf {
        self.dir.join(self.file_name(kind))
    }

    /// Resolve a user-supplied log name.
    ///
    /// Existing paths are used as given; bare names are looked up in `dir`.
    pub fn resolve(&self, name: impl AsRef<Path>) -> PathBuf {
        let name = name.as_ref();
        if name.is_absolute() || name.exists() {
            name.to_path_buf()
        } else {
            self.dir.join(name)
        }
    }

    /// Load every conventional log that is present.
    ///
    /// A log that fails to load is reported and skipped.
    pub fn discover(&self) -> Vec<(LogKind, LogStore)> {
        let mut found = Vec::new();
        for kind in LogKind::all() {
            let path = self.path(kind);
            if !path.exists() {
                debug!(kind = %kind, path = %path.display(), "log not present");
                continue;
            }
            match LogStore::load(&path) {
                Ok(store) => found.push((kind, store)),
                Err(e) => warn!(kind = %kind, error = %e, "skipping unreadable log"),
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names() {
        let set = LogSet::in_dir("/data/run1");
        assert_eq!(
            set.path(LogKind::Training),
            PathBuf::from("/data/run1/logi_training.json")
        );
        assert_eq!(set.file_name(LogKind::Before), "logi_before_learning.json");
    }

    #[test]
    fn test_resolve_bare_name_joins_dir() {
        let set = LogSet::in_dir("/nonexistent/logs");
        assert_eq!(
            set.resolve("custom.json"),
            PathBuf::from("/nonexistent/logs/custom.json")
        );
        assert_eq!(set.resolve("/abs/x.json"), PathBuf::from("/abs/x.json"));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let set: LogSet = serde_json::from_str(r#"{"dir": "logs"}"#).unwrap();
        assert_eq!(set.dir, PathBuf::from("logs"));
        assert_eq!(set.after, "logi_after_learning.json");
    }

    #[test]
    fn test_discover_skips_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let set = LogSet::in_dir(dir.path());
        std::fs::write(set.path(LogKind::Training), r#"{"Q_e": [1, 2]}"#).unwrap();
        std::fs::write(set.path(LogKind::After), "not json").unwrap();

        let found = set.discover();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, LogKind::Training);
        assert_eq!(found[0].1.sample_count(), 2);
    }
}
