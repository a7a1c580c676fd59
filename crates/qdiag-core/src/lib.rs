//! qdiag Core Library
//!
//! Metric extraction, invariant checks and reporting over the logs loaded by
//! `qdiag-store`. All analysis is synchronous and reads only the store and an
//! explicit [`AnalysisConfig`].

pub mod bumpless;
pub mod checks;
pub mod compare;
pub mod config;
pub mod counters;
mod error;
pub mod goal;
pub mod inspect;
pub mod metrics;
pub mod obs;
pub mod report;
pub mod reporting;
pub mod runner;
pub mod stats;
pub mod telemetry;

pub use bumpless::{verify_bumpless, BumplessReport, Phase, PhaseResult};
pub use checks::{Category, CheckResult, CheckStatus, Checker, CHECKERS};
pub use compare::{
    compare_controllers, compare_metrics, ComparisonReport, ComparisonTally, ControllerComparison,
    MetricComparison, Outcome,
};
pub use config::{AnalysisConfig, MissingSample, QdiagConfig, Thresholds};
pub use error::{DiagError, Result};
pub use goal::{detect_goal_indices, resolve_goal, DetectedGoal};
pub use inspect::{inspect, Inspection};
pub use metrics::{extract_metrics, MetricId, MetricSet, Polarity};
pub use report::{CombinedReport, DiagnosticReport, Recommendation, ReportEntry};
pub use runner::{run_checks, CheckOutcome};
pub use telemetry::init_tracing;

pub use qdiag_store::{LogKind, LogSet, LogStore, StoreError};

/// Crate version, printed in reports and `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run every checker on `store` and build its report.
pub fn analyze(store: &LogStore, config: &AnalysisConfig) -> DiagnosticReport {
    let _span = obs::AnalysisSpan::enter(store.name());
    let outcomes = run_checks(store, config, None);
    DiagnosticReport::build(store.summary(), outcomes, config)
}

/// Analyse every conventional log found in `logs`.
///
/// Logs without instrumentation fields are skipped with a warning. Fails with
/// [`DiagError::NoLogs`] when nothing could be analysed.
pub fn analyze_all(logs: &LogSet, config: &AnalysisConfig) -> Result<CombinedReport> {
    let mut reports = Vec::new();
    for (kind, store) in logs.discover() {
        counters::COUNTERS.inc_logs_loaded();
        let summary = store.summary();
        obs::emit_log_loaded(
            &summary.name,
            summary.sample_count,
            summary.field_count,
            summary.has_instrumentation,
        );
        if !summary.has_instrumentation {
            tracing::warn!(log = %summary.name, "skipping log without instrumentation data");
            continue;
        }
        reports.push((kind, analyze(&store, config)));
    }
    if reports.is_empty() {
        return Err(DiagError::NoLogs {
            dir: logs.dir.clone(),
        });
    }
    Ok(CombinedReport { reports })
}
