//! Severity-grouped diagnostic report for one log.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use qdiag_store::{LogKind, LogSummary};
use serde::{Deserialize, Serialize};

use crate::checks::{Category, CheckStatus};
use crate::config::AnalysisConfig;
use crate::obs;
use crate::runner::CheckOutcome;

pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// One issue line, tagged with the check that raised it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub check: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// 1 is most urgent.
    pub priority: u8,
    pub message: String,
}

/// A headline metric with the value a healthy run is expected to show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMetric {
    pub key: String,
    pub label: String,
    pub expected: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub log: LogSummary,
    pub errors: Vec<ReportEntry>,
    pub warnings: Vec<ReportEntry>,
    pub info: Vec<ReportEntry>,
    /// Every check metric, keyed `category.check.metric`.
    pub metrics: BTreeMap<String, f64>,
    pub key_metrics: Vec<KeyMetric>,
    pub recommendations: Vec<Recommendation>,
    /// ERROR if any error entry, WARNING if any warning entry, else OK.
    pub overall: CheckStatus,
    pub checks: Vec<CheckOutcome>,
}

// ---------------------------------------------------------------------------
// Recommendation rules
// ---------------------------------------------------------------------------

/// Checks whose WARNING or ERROR outcome triggers a recommendation.
struct StatusRule {
    checks: &'static [&'static str],
    priority: u8,
    message: &'static str,
}

const STATUS_RULES: &[StatusRule] = &[
    StatusRule {
        checks: &[
            "temporal.pairing",
            "temporal.reward",
            "temporal.sequence",
            "temporal.buffer",
        ],
        priority: 1,
        message: "Check state-action-reward alignment of the buffered Q-update",
    },
    StatusRule {
        checks: &[
            "convergence.bootstrap",
            "goal_state.transitions",
            "goal_state.evolution",
        ],
        priority: 1,
        message: "Verify the bootstrap override for goal-to-goal transitions",
    },
    StatusRule {
        checks: &[
            "constraints.same_side",
            "constraints.action_direction",
            "constraints.oscillation",
        ],
        priority: 1,
        message: "Check the same-side constraint applied during exploration",
    },
    StatusRule {
        checks: &[
            "projection.application",
            "projection.on_trajectory",
            "projection.effectiveness",
            "projection.coefficient",
        ],
        priority: 2,
        message: "Review the conditions under which the projection term is applied",
    },
];

/// (metric key, label, expected)
const KEY_METRICS: &[(&str, &str, &str)] = &[
    ("goal_state.evolution.final_value", "Q(goal,goal)", "~theoretical max"),
    ("goal_state.evolution.distance_to_max", "Distance to max", "~0"),
    ("convergence.td_error.improvement_ratio", "TD error improvement", ">1"),
    ("constraints.same_side.violation_rate_pct", "Constraint violations (%)", "~0"),
    ("temporal.reward.reward_1_pct", "R=1 share (%)", ">0"),
];

const GOAL_VALUE_KEY: &str = "goal_state.evolution.final_value";
const VIOLATION_RATE_KEY: &str = "constraints.same_side.violation_rate_pct";
/// Violation rate (percent) above which exploration logic must be fixed.
const VIOLATION_RATE_RECOMMEND: f64 = 1.0;

impl DiagnosticReport {
    /// Group the outcomes of one log by severity and derive recommendations.
    pub fn build(log: LogSummary, checks: Vec<CheckOutcome>, config: &AnalysisConfig) -> Self {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut info = Vec::new();
        let mut metrics = BTreeMap::new();

        for outcome in &checks {
            let id = outcome.id();
            for (key, value) in &outcome.result.metrics {
                metrics.insert(format!("{id}.{key}"), *value);
            }
            let bucket = match outcome.status() {
                CheckStatus::Error => &mut errors,
                CheckStatus::Warning => &mut warnings,
                CheckStatus::Ok | CheckStatus::Info => &mut info,
            };
            bucket.extend(outcome.result.issues.iter().map(|message| ReportEntry {
                check: id.clone(),
                message: message.clone(),
            }));
        }

        let key_metrics = KEY_METRICS
            .iter()
            .filter_map(|&(key, label, expected)| {
                metrics.get(key).map(|&value| KeyMetric {
                    key: key.to_string(),
                    label: label.to_string(),
                    expected: expected.to_string(),
                    value,
                })
            })
            .collect();

        let overall = if !errors.is_empty() {
            CheckStatus::Error
        } else if !warnings.is_empty() {
            CheckStatus::Warning
        } else {
            CheckStatus::Ok
        };

        let mut report = Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            log,
            errors,
            warnings,
            info,
            metrics,
            key_metrics,
            recommendations: Vec::new(),
            overall,
            checks,
        };
        report.recommendations = recommend(&report, config);
        obs::emit_report_finished(
            &report.log.name,
            report.errors.len(),
            report.warnings.len(),
            report.overall,
        );
        report
    }

    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    /// Outcomes of one category, in registry order.
    pub fn category(&self, category: Category) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(move |c| c.category == category)
    }
}

fn recommend(report: &DiagnosticReport, config: &AnalysisConfig) -> Vec<Recommendation> {
    let flagged = |id: &str| {
        report
            .checks
            .iter()
            .any(|c| c.status() >= CheckStatus::Warning && c.id() == id)
    };

    let mut out: Vec<Recommendation> = STATUS_RULES
        .iter()
        .filter(|rule| rule.checks.iter().any(|id| flagged(id)))
        .map(|rule| Recommendation {
            priority: rule.priority,
            message: rule.message.to_string(),
        })
        .collect();

    let expected = config.theoretical_max();
    if let Some(goal_q) = report.metric(GOAL_VALUE_KEY) {
        if goal_q > 0.0 && goal_q < config.thresholds.goal_value_warning_fraction * expected {
            out.push(Recommendation {
                priority: 1,
                message: format!(
                    "Q(goal,goal) = {goal_q:.1} is below the expected ~{expected:.0}; check reward and bootstrap logic"
                ),
            });
        }
    }
    if let Some(rate) = report.metric(VIOLATION_RATE_KEY) {
        if rate > VIOLATION_RATE_RECOMMEND {
            out.push(Recommendation {
                priority: 1,
                message: format!("High constraint violation rate ({rate:.1}%); fix exploration logic"),
            });
        }
    }

    out.sort_by_key(|r| r.priority);
    out
}

/// Reports for every analysed conventional log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedReport {
    pub reports: Vec<(LogKind, DiagnosticReport)>,
}

impl CombinedReport {
    /// The log worth reading in detail: training, else after-learning.
    pub fn primary(&self) -> Option<&(LogKind, DiagnosticReport)> {
        [LogKind::Training, LogKind::After]
            .into_iter()
            .find_map(|kind| self.reports.iter().find(|(k, _)| *k == kind))
    }

    pub fn overall(&self) -> CheckStatus {
        self.reports
            .iter()
            .map(|(_, r)| r.overall)
            .max()
            .unwrap_or(CheckStatus::Ok)
    }
}
