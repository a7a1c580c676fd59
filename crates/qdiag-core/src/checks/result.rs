//! Check result types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Verdict of one check. Ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Ok,
    /// Inconclusive: inputs missing, inapplicable, or too few samples.
    Info,
    Warning,
    Error,
}

impl CheckStatus {
    pub fn label(self) -> &'static str {
        match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Info => "INFO",
            CheckStatus::Warning => "WARNING",
            CheckStatus::Error => "ERROR",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CheckStatus::Ok => "✓",
            CheckStatus::Info => "i",
            CheckStatus::Warning => "!",
            CheckStatus::Error => "✗",
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one checker run against one log.
///
/// Built incrementally by the checker; status only ever escalates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub metrics: BTreeMap<String, f64>,
    pub issues: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

impl Default for CheckResult {
    fn default() -> Self {
        Self::ok()
    }
}

impl CheckResult {
    pub fn ok() -> Self {
        Self {
            status: CheckStatus::Ok,
            metrics: BTreeMap::new(),
            issues: Vec::new(),
            details: BTreeMap::new(),
        }
    }

    /// A result that stops early with a single explanatory issue.
    pub fn inconclusive(status: CheckStatus, issue: impl Into<String>) -> Self {
        let mut r = Self::ok();
        r.flag(status, issue);
        r
    }

    /// Record an issue and raise the status to at least `status`.
    pub fn flag(&mut self, status: CheckStatus, issue: impl Into<String>) {
        self.status = self.status.max(status);
        self.issues.push(issue.into());
    }

    pub fn warn(&mut self, issue: impl Into<String>) {
        self.flag(CheckStatus::Warning, issue);
    }

    pub fn error(&mut self, issue: impl Into<String>) {
        self.flag(CheckStatus::Error, issue);
    }

    pub fn info(&mut self, issue: impl Into<String>) {
        self.flag(CheckStatus::Info, issue);
    }

    pub fn metric(&mut self, key: &str, value: f64) {
        self.metrics.insert(key.to_string(), value);
    }

    pub fn count(&mut self, key: &str, value: usize) {
        self.metric(key, value as f64);
    }

    pub fn detail(&mut self, key: &str, value: impl Into<Value>) {
        self.details.insert(key.to_string(), value.into());
    }

    /// Downgrade to INFO when the verdict rests on fewer than `min` samples.
    pub fn require_samples(&mut self, n: usize, min: usize) {
        if n < min {
            self.status = CheckStatus::Info;
            self.issues.push(format!(
                "inconclusive: {n} samples, at least {min} required"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(CheckStatus::Ok < CheckStatus::Info);
        assert!(CheckStatus::Info < CheckStatus::Warning);
        assert!(CheckStatus::Warning < CheckStatus::Error);
    }

    #[test]
    fn status_only_escalates() {
        let mut r = CheckResult::ok();
        r.error("bad");
        r.warn("less bad");
        assert_eq!(r.status, CheckStatus::Error);
        assert_eq!(r.issues.len(), 2);
    }

    #[test]
    fn insufficient_samples_downgrade_to_info() {
        let mut r = CheckResult::ok();
        r.error("violations");
        r.require_samples(4, 100);
        assert_eq!(r.status, CheckStatus::Info);

        let mut r = CheckResult::ok();
        r.require_samples(100, 100);
        assert_eq!(r.status, CheckStatus::Ok);
    }

    #[test]
    fn serializes_status_uppercase() {
        let mut r = CheckResult::inconclusive(CheckStatus::Warning, "no data");
        r.metric("n", 3.0);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "WARNING");
        assert_eq!(json["issues"][0], "no data");
        assert_eq!(json["metrics"]["n"], 3.0);
        assert!(json.get("details").is_none());
    }
}
