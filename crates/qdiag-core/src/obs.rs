//! Structured lifecycle events for an analysis run.
//!
//! Every event carries an `event` field (`log.loaded`, `check.finished`,
//! `check.failed`, `report.finished`) so JSON log consumers can filter on it.

use tracing::info;

use crate::checks::CheckStatus;

/// RAII guard scoping all events of one log's analysis.
///
/// ```ignore
/// let _span = AnalysisSpan::enter("logi_training");
/// // every event below carries log = "logi_training"
/// ```
pub struct AnalysisSpan {
    _span: tracing::span::EnteredSpan,
}

impl AnalysisSpan {
    pub fn enter(log: &str) -> Self {
        let span = tracing::info_span!("qdiag.analysis", log = %log);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_log_loaded(log: &str, samples: usize, fields: usize, instrumented: bool) {
    info!(
        event = "log.loaded",
        log = %log,
        samples = samples,
        fields = fields,
        instrumented = instrumented,
    );
}

pub fn emit_check_finished(check: &str, status: CheckStatus, issues: usize) {
    tracing::debug!(
        event = "check.finished",
        check = %check,
        status = %status,
        issues = issues,
    );
}

/// A checker returned an error instead of a result (warning level).
pub fn emit_check_failed(check: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "check.failed", check = %check, error = %error);
}

pub fn emit_report_finished(log: &str, errors: usize, warnings: usize, overall: CheckStatus) {
    info!(
        event = "report.finished",
        log = %log,
        errors = errors,
        warnings = warnings,
        overall = %overall,
    );
}
