//! Scalar performance metrics extracted from one log.
//!
//! Each metric is computed independently; a metric whose inputs are absent
//! is simply missing from the resulting [`MetricSet`].

use std::collections::BTreeMap;

use qdiag_store::{fields, LogStore};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

use crate::config::AnalysisConfig;
use crate::stats;

// ---------------------------------------------------------------------------
// Metric identifiers
// ---------------------------------------------------------------------------

/// Which direction of change counts as an improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    LowerIsBetter,
    HigherIsBetter,
    Neutral,
}

/// Every metric the extractor can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricId {
    QMae,
    QRmsError,
    QMaxError,
    QIae,
    PiMae,
    PiRmsError,
    PiMaxError,
    QMeanControl,
    QControlVariance,
    QControlSmoothness,
    PiMeanControl,
    PiControlVariance,
    PiControlSmoothness,
    GoalRegionTimePct,
    GoalQFinal,
    GoalQMax,
    GoalQDistance,
}

impl MetricId {
    pub const ALL: [MetricId; 17] = [
        MetricId::QMae,
        MetricId::QRmsError,
        MetricId::QMaxError,
        MetricId::QIae,
        MetricId::PiMae,
        MetricId::PiRmsError,
        MetricId::PiMaxError,
        MetricId::QMeanControl,
        MetricId::QControlVariance,
        MetricId::QControlSmoothness,
        MetricId::PiMeanControl,
        MetricId::PiControlVariance,
        MetricId::PiControlSmoothness,
        MetricId::GoalRegionTimePct,
        MetricId::GoalQFinal,
        MetricId::GoalQMax,
        MetricId::GoalQDistance,
    ];

    /// Report name and polarity, declared together.
    const fn describe(self) -> (&'static str, Polarity) {
        use Polarity::*;
        match self {
            MetricId::QMae => ("Q_MAE", LowerIsBetter),
            MetricId::QRmsError => ("Q_RMS_error", LowerIsBetter),
            MetricId::QMaxError => ("Q_max_error", LowerIsBetter),
            MetricId::QIae => ("Q_IAE", LowerIsBetter),
            MetricId::PiMae => ("PI_MAE", LowerIsBetter),
            MetricId::PiRmsError => ("PI_RMS_error", LowerIsBetter),
            MetricId::PiMaxError => ("PI_max_error", LowerIsBetter),
            MetricId::QMeanControl => ("Q_mean_control", Neutral),
            MetricId::QControlVariance => ("Q_control_variance", LowerIsBetter),
            MetricId::QControlSmoothness => ("Q_control_smoothness", LowerIsBetter),
            MetricId::PiMeanControl => ("PI_mean_control", Neutral),
            MetricId::PiControlVariance => ("PI_control_variance", LowerIsBetter),
            MetricId::PiControlSmoothness => ("PI_control_smoothness", LowerIsBetter),
            MetricId::GoalRegionTimePct => ("goal_region_time_pct", HigherIsBetter),
            MetricId::GoalQFinal => ("goal_Q_final", HigherIsBetter),
            MetricId::GoalQMax => ("goal_Q_max", HigherIsBetter),
            MetricId::GoalQDistance => ("goal_Q_distance_to_max", LowerIsBetter),
        }
    }

    pub const fn name(self) -> &'static str {
        self.describe().0
    }

    pub const fn polarity(self) -> Polarity {
        self.describe().1
    }

    pub fn from_name(name: &str) -> Option<MetricId> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

impl std::fmt::Display for MetricId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// MetricSet
// ---------------------------------------------------------------------------

/// Flat mapping metric -> scalar, ordered by declaration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSet {
    values: BTreeMap<MetricId, f64>,
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: MetricId, value: f64) {
        self.values.insert(id, value);
    }

    fn insert_opt(&mut self, id: MetricId, value: Option<f64>) {
        if let Some(v) = value {
            self.insert(id, v);
        }
    }

    pub fn get(&self, id: MetricId) -> Option<f64> {
        self.values.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricId, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}

impl FromIterator<(MetricId, f64)> for MetricSet {
    fn from_iter<I: IntoIterator<Item = (MetricId, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl Serialize for MetricSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (id, value) in &self.values {
            map.serialize_entry(id.name(), value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Compute every metric whose inputs are present.
pub fn extract_metrics(store: &LogStore, config: &AnalysisConfig) -> MetricSet {
    let policy = config.missing_sample;
    let mut set = MetricSet::new();

    // tracking error
    let q_error = store.field(fields::Q_ERROR);
    let q_valid: Vec<f64> = q_error.iter().copied().filter(|&e| policy.is_present(e)).collect();
    set.insert_opt(MetricId::QMae, stats::mean_abs(&q_valid));
    set.insert_opt(MetricId::QRmsError, stats::rms(&q_valid));
    set.insert_opt(MetricId::QMaxError, stats::max_abs(&q_valid));

    let time = store.field(fields::Q_TIME);
    if !q_valid.is_empty() && time.len() == q_error.len() && time.len() > 1 {
        let steps: Vec<f64> = stats::diff(&time).into_iter().filter(|&d| d > 0.0).collect();
        // fallback sample time when the time base never advances
        let dt = stats::mean(&steps).unwrap_or(0.1);
        let total: f64 = q_valid.iter().map(|e| e.abs()).sum();
        set.insert(MetricId::QIae, total * dt);
    }

    let pi_error = store.field(fields::PI_ERROR);
    let pi_valid: Vec<f64> = pi_error.iter().copied().filter(|&e| policy.is_present(e)).collect();
    set.insert_opt(MetricId::PiMae, stats::mean_abs(&pi_valid));
    set.insert_opt(MetricId::PiRmsError, stats::rms(&pi_valid));
    set.insert_opt(MetricId::PiMaxError, stats::max_abs(&pi_valid));

    // control effort
    let control = |name: &str| -> Vec<f64> {
        store
            .field(name)
            .iter()
            .copied()
            .filter(|&u| policy.is_present_positive(u))
            .collect()
    };
    let q_u = control(fields::Q_CONTROL);
    if !q_u.is_empty() {
        set.insert_opt(MetricId::QMeanControl, stats::mean(&q_u));
        set.insert_opt(MetricId::QControlVariance, stats::variance(&q_u));
        set.insert(MetricId::QControlSmoothness, stats::smoothness(&q_u));
    }
    let pi_u = control(fields::PI_CONTROL);
    if !pi_u.is_empty() {
        set.insert_opt(MetricId::PiMeanControl, stats::mean(&pi_u));
        set.insert_opt(MetricId::PiControlVariance, stats::variance(&pi_u));
        set.insert(MetricId::PiControlSmoothness, stats::smoothness(&pi_u));
    }

    // goal dwell
    let states: Vec<f64> = store
        .field(fields::Q_STATE_INDEX)
        .iter()
        .copied()
        .filter(|&s| s > 0.0)
        .collect();
    if !states.is_empty() {
        let at_goal = states.iter().filter(|&&s| config.in_goal_region(s)).count();
        set.insert(
            MetricId::GoalRegionTimePct,
            100.0 * stats::rate(at_goal, states.len()),
        );
    }

    // convergence
    let goal_q: Vec<f64> = store
        .field(fields::DEBUG_GOAL_Q)
        .iter()
        .copied()
        .filter(|&q| policy.is_present_positive(q))
        .collect();
    if let Some(&last) = goal_q.last() {
        set.insert(MetricId::GoalQFinal, last);
        set.insert_opt(MetricId::GoalQMax, stats::max(&goal_q));
        set.insert(MetricId::GoalQDistance, config.theoretical_max() - last);
    }

    set
}

// ---------------------------------------------------------------------------
// Convergence summary
// ---------------------------------------------------------------------------

/// Shape of a value series that should rise monotonically toward an
/// asymptote (the goal pair's Q-value).
#[derive(Debug, Clone, PartialEq, serde::Serialize, Deserialize)]
pub struct ConvergenceSummary {
    pub samples: usize,
    pub initial: f64,
    pub last: f64,
    pub max: f64,
    pub min: f64,
    pub net_change: f64,
    pub distance_to_max: f64,
    /// Steps that dropped by more than the noise tolerance.
    pub decreases: usize,
    /// `decreases / samples`.
    pub decrease_rate: f64,
    /// Largest single drop (negative) and the step index where it happened.
    pub largest_drop: Option<(f64, usize)>,
}

/// Summarise a series of valid goal values. `None` when `values` is empty.
pub fn convergence_summary(
    values: &[f64],
    theoretical_max: f64,
    noise: f64,
) -> Option<ConvergenceSummary> {
    let (&initial, &last) = (values.first()?, values.last()?);

    let steps = stats::diff(values);
    let mut decreases = 0;
    let mut largest_drop: Option<(f64, usize)> = None;
    for (i, &d) in steps.iter().enumerate() {
        if d < -noise {
            decreases += 1;
            if largest_drop.map_or(true, |(worst, _)| d < worst) {
                largest_drop = Some((d, i));
            }
        }
    }

    Some(ConvergenceSummary {
        samples: values.len(),
        initial,
        last,
        max: stats::max(values)?,
        min: stats::min(values)?,
        net_change: last - initial,
        distance_to_max: theoretical_max - last,
        decreases,
        decrease_rate: stats::rate(decreases, values.len()),
        largest_drop,
    })
}
