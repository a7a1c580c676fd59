//! Before/after metric comparison and learned-vs-baseline comparison.

use qdiag_store::{fields, LogStore};
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::metrics::{extract_metrics, MetricId, MetricSet, Polarity};
use crate::stats;

/// Classification of one metric's change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Improved,
    Regressed,
    Unchanged,
    /// The metric has no declared preferred direction.
    NotRanked,
}

impl Outcome {
    fn classify(polarity: Polarity, diff: f64) -> Self {
        match polarity {
            Polarity::Neutral => Outcome::NotRanked,
            _ if diff == 0.0 => Outcome::Unchanged,
            Polarity::LowerIsBetter if diff < 0.0 => Outcome::Improved,
            Polarity::HigherIsBetter if diff > 0.0 => Outcome::Improved,
            _ => Outcome::Regressed,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Outcome::Improved => "+",
            Outcome::Regressed => "-",
            Outcome::Unchanged => "=",
            Outcome::NotRanked => " ",
        }
    }
}

/// One metric present in both runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: String,
    pub before: f64,
    pub after: f64,
    pub diff: f64,
    /// `None` when the before value is zero.
    pub pct_change: Option<f64>,
    pub outcome: Outcome,
}

/// Diff every metric present in both sets, in declaration order.
pub fn compare_metrics(before: &MetricSet, after: &MetricSet) -> Vec<MetricComparison> {
    MetricId::ALL
        .into_iter()
        .filter_map(|id| {
            let (b, a) = (before.get(id)?, after.get(id)?);
            let diff = a - b;
            Some(MetricComparison {
                metric: id.name().to_string(),
                before: b,
                after: a,
                diff,
                pct_change: (b != 0.0).then(|| 100.0 * diff / b),
                outcome: Outcome::classify(id.polarity(), diff),
            })
        })
        .collect()
}

/// Tally of comparison outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonTally {
    pub improved: usize,
    pub regressed: usize,
    pub unchanged: usize,
    pub not_ranked: usize,
}

pub fn tally(comparisons: &[MetricComparison]) -> ComparisonTally {
    let mut t = ComparisonTally::default();
    for c in comparisons {
        match c.outcome {
            Outcome::Improved => t.improved += 1,
            Outcome::Regressed => t.regressed += 1,
            Outcome::Unchanged => t.unchanged += 1,
            Outcome::NotRanked => t.not_ranked += 1,
        }
    }
    t
}

// ---------------------------------------------------------------------------
// Learned vs baseline controller
// ---------------------------------------------------------------------------

/// One measure evaluated for both controllers of a single log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerComparison {
    pub measure: String,
    pub learned: f64,
    pub baseline: f64,
    /// `learned / baseline`; `None` when the baseline is zero.
    pub ratio: Option<f64>,
    pub learned_better: bool,
}

impl ControllerComparison {
    fn new(measure: &str, learned: f64, baseline: f64) -> Self {
        Self {
            measure: measure.to_string(),
            learned,
            baseline,
            ratio: (baseline > 0.0).then(|| learned / baseline),
            learned_better: learned < baseline,
        }
    }
}

/// Compare tracking error and control smoothness of the learned and
/// baseline controllers over their common samples.
pub fn compare_controllers(store: &LogStore, config: &AnalysisConfig) -> Vec<ControllerComparison> {
    let policy = config.missing_sample;
    let mut out = Vec::new();

    let (learned, baseline) = paired(
        &store.field(fields::Q_ERROR),
        &store.field(fields::PI_ERROR),
        |v| policy.is_present(v),
    );
    if let (Some(q), Some(pi)) = (stats::mean_abs(&learned), stats::mean_abs(&baseline)) {
        out.push(ControllerComparison::new("MAE", q, pi));
    }
    if let (Some(q), Some(pi)) = (stats::rms(&learned), stats::rms(&baseline)) {
        out.push(ControllerComparison::new("RMS", q, pi));
    }

    let (learned, baseline) = paired(
        &store.field(fields::Q_CONTROL),
        &store.field(fields::PI_CONTROL),
        |v| policy.is_present_positive(v),
    );
    if !learned.is_empty() {
        out.push(ControllerComparison::new(
            "control_smoothness",
            stats::smoothness(&learned),
            stats::smoothness(&baseline),
        ));
    }

    out
}

/// Everything `qdiag compare` prints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub before: String,
    pub after: String,
    pub metrics: Vec<MetricComparison>,
    pub tally: ComparisonTally,
    /// Learned vs baseline, measured on the after log.
    pub controllers: Vec<ControllerComparison>,
}

impl ComparisonReport {
    pub fn build(before: &LogStore, after: &LogStore, config: &AnalysisConfig) -> Self {
        let metrics = compare_metrics(
            &extract_metrics(before, config),
            &extract_metrics(after, config),
        );
        let tally = tally(&metrics);
        tracing::debug!(
            before = before.name(),
            after = after.name(),
            improved = tally.improved,
            regressed = tally.regressed,
            "metrics compared"
        );
        Self {
            before: before.name().to_string(),
            after: after.name().to_string(),
            metrics,
            tally,
            controllers: compare_controllers(after, config),
        }
    }
}

/// Truncate to the common length and keep samples where either side is
/// present and both are finite.
fn paired(a: &[f64], b: &[f64], present: impl Fn(f64) -> bool) -> (Vec<f64>, Vec<f64>) {
    a.iter()
        .zip(b)
        .filter(|&(&x, &y)| (present(x) || present(y)) && x.is_finite() && y.is_finite())
        .map(|(&x, &y)| (x, y))
        .unzip()
}
