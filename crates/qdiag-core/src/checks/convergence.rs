//! Convergence checks: TD error, goal value level, bootstrap term, update sizes.

use qdiag_store::{fields, LogStore, StoreError};

use super::{learning_samples, pct, CheckResult, CheckStatus};
use crate::config::AnalysisConfig;
use crate::stats;

/// Window used for start/end trend means of the bootstrap term.
const TREND_WINDOW: usize = 100;

/// TD-error statistics over learning samples.
///
/// The magnitude should shrink as the table converges; a second half larger
/// than the first, or many strongly negative errors (overestimation), are
/// warnings.
pub fn td_error(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let t = &config.thresholds;
    let learning = learning_samples(store)?;
    if learning.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            "no learning samples (learning flag never set)",
        ));
    }

    let td = stats::select(&store.try_field(fields::DEBUG_TD_ERROR)?, &learning);
    if td.iter().all(|&v| v == 0.0) {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            "TD error is all zero; update instrumentation may be disabled",
        ));
    }

    let mut r = CheckResult::ok();
    let n = td.len();
    r.metric("mean", stats::mean(&td).unwrap_or(0.0));
    r.metric("std", stats::std_dev(&td).unwrap_or(0.0));
    r.metric("min", stats::min(&td).unwrap_or(0.0));
    r.metric("max", stats::max(&td).unwrap_or(0.0));
    r.count("n_samples", n);

    if n / 2 > config.min_samples {
        if let Some((first, second)) = stats::half_abs_means(&td) {
            r.metric("first_half_abs_mean", first);
            r.metric("second_half_abs_mean", second);
            r.metric("improvement_ratio", stats::ratio(first, second));
            if second > first * t.td_growth_ratio {
                r.warn(format!("TD error increased: {first:.4} -> {second:.4}"));
            }
        }
    }

    let large_negative = td.iter().filter(|&&v| v < t.large_negative_td).count();
    r.count("n_large_negative", large_negative);
    if large_negative as f64 > n as f64 * t.large_negative_td_rate {
        r.warn(format!(
            "{large_negative} samples ({:.1}%) have TD error < {} (overestimation)",
            pct(stats::rate(large_negative, n)),
            t.large_negative_td
        ));
    }

    let window = (n / 10).min(1000);
    if window > 10 {
        if let Some((start, end)) = stats::moving_average_ends(&td, window) {
            r.metric("trend_start", start);
            r.metric("trend_end", end);
        }
    }

    r.require_samples(n, config.min_samples);
    Ok(r)
}

/// Goal value level against the theoretical maximum, and stability of the
/// global-maximum location.
pub fn global_max(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let t = &config.thresholds;
    let policy = config.missing_sample;
    let goal_q: Vec<f64> = store
        .try_field(fields::DEBUG_GOAL_Q)?
        .iter()
        .copied()
        .filter(|&q| policy.is_present_positive(q))
        .collect();

    let (Some(&first), Some(&last)) = (goal_q.first(), goal_q.last()) else {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            "no goal Q-value data",
        ));
    };

    let mut r = CheckResult::ok();
    let q_max = config.theoretical_max();
    r.metric("goal_q_start", first);
    r.metric("goal_q_end", last);
    r.metric("goal_q_max", stats::max(&goal_q).unwrap_or(last));
    r.metric("goal_q_min", stats::min(&goal_q).unwrap_or(last));
    r.metric("distance_to_theoretical_max", q_max - last);

    if last < t.goal_value_error_fraction * q_max {
        r.error(format!("goal Q-value too low: {last:.2} (expected ~{q_max:.0})"));
    } else if last < t.goal_value_warning_fraction * q_max {
        r.warn(format!("goal Q-value not converged: {last:.2} (expected ~{q_max:.0})"));
    }
    if last < first - t.goal_value_drop {
        r.error(format!("goal Q-value decreased: {first:.2} -> {last:.2}"));
    }

    let positive = |name: &str| -> Result<Vec<f64>, StoreError> {
        Ok(store
            .try_field(name)?
            .iter()
            .copied()
            .filter(|&v| v > 0.0)
            .collect())
    };
    let states = positive(fields::DEBUG_GLOBAL_MAX_STATE)?;
    let actions = positive(fields::DEBUG_GLOBAL_MAX_ACTION)?;
    if let Some((state, count)) = stats::mode(states.iter().copied()) {
        let share = stats::rate(count, states.len());
        r.metric("most_common_max_state", state as f64);
        r.metric("most_common_max_state_pct", pct(share));
        if let Some((action, a_count)) = stats::mode(actions.iter().copied()) {
            r.metric("most_common_max_action", action as f64);
            r.metric("most_common_max_action_pct", pct(stats::rate(a_count, actions.len())));
        }
        if share < t.global_max_stability_min {
            r.warn(format!(
                "global maximum not stable: only {:.1}% at state {state}",
                pct(share)
            ));
        }
        if state != i64::from(config.goal_state) {
            r.detail(
                "location_note",
                format!(
                    "global maximum mostly at state {state}, configured goal is {}",
                    config.goal_state
                ),
            );
        }
    }

    r.require_samples(goal_q.len(), config.min_samples);
    Ok(r)
}

/// Bootstrap term `discount * max Q(s', .)` must stay below
/// `discount * theoretical_max` (plus tolerance) and should not decline.
pub fn bootstrap(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let t = &config.thresholds;
    let learning = learning_samples(store)?;
    if learning.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            "no learning samples for bootstrap analysis",
        ));
    }

    let values: Vec<f64> = stats::select(&store.try_field(fields::DEBUG_BOOTSTRAP)?, &learning)
        .into_iter()
        .filter(|&v| config.missing_sample.is_present_positive(v))
        .collect();
    if values.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            "bootstrap values all zero",
        ));
    }

    let mut r = CheckResult::ok();
    let max = stats::max(&values).unwrap_or(0.0);
    let bound = config.discount * config.theoretical_max();
    r.metric("mean", stats::mean(&values).unwrap_or(0.0));
    r.metric("std", stats::std_dev(&values).unwrap_or(0.0));
    r.metric("min", stats::min(&values).unwrap_or(0.0));
    r.metric("max", max);
    r.metric("expected_max", bound);

    if max > bound + t.bootstrap_tolerance {
        r.warn(format!("bootstrap exceeds expected maximum: {max:.2} > {bound:.2}"));
    }

    if values.len() > 2 * TREND_WINDOW {
        let start = stats::mean(&values[..TREND_WINDOW]).unwrap_or(0.0);
        let end = stats::mean(&values[values.len() - TREND_WINDOW..]).unwrap_or(0.0);
        r.metric("trend_start", start);
        r.metric("trend_end", end);
        if end < start * t.bootstrap_decline_ratio {
            r.warn(format!("bootstrap decreased: {start:.2} -> {end:.2}"));
        }
    }

    r.require_samples(values.len(), config.min_samples);
    Ok(r)
}

/// Magnitude of Q-table updates `Q_new - Q_old`.
pub fn q_updates(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let t = &config.thresholds;
    let policy = config.missing_sample;
    let old = store.try_field(fields::DEBUG_Q_OLD)?;
    let new = store.try_field(fields::DEBUG_Q_NEW)?;

    let updates: Vec<f64> = old
        .iter()
        .zip(new.iter())
        .filter(|&(&o, &n)| policy.is_present(o) || policy.is_present(n))
        .map(|(&o, &n)| n - o)
        .filter(|u| u.is_finite())
        .collect();
    if updates.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            "no Q-update data",
        ));
    }

    let mut r = CheckResult::ok();
    let n = updates.len();
    r.metric("mean_update", stats::mean(&updates).unwrap_or(0.0));
    r.metric("std_update", stats::std_dev(&updates).unwrap_or(0.0));
    r.metric("max_positive_update", stats::max(&updates).unwrap_or(0.0));
    r.metric("max_negative_update", stats::min(&updates).unwrap_or(0.0));
    r.count("n_positive", updates.iter().filter(|&&u| u > 0.0).count());
    r.count("n_negative", updates.iter().filter(|&&u| u < 0.0).count());

    let extreme = updates.iter().filter(|u| u.abs() > t.extreme_update).count();
    r.count("n_extreme", extreme);
    if extreme as f64 > n as f64 * t.extreme_update_rate {
        r.warn(format!(
            "{extreme} extreme updates (|delta Q| > {})",
            t.extreme_update
        ));
    }

    if n > 2 * TREND_WINDOW {
        if let Some((first, second)) = stats::half_abs_means(&updates) {
            r.metric("first_half_mean_abs", first);
            r.metric("second_half_mean_abs", second);
            if second > first * t.update_growth_ratio {
                r.warn(format!(
                    "update magnitude increased: {first:.4} -> {second:.4}"
                ));
            }
        }
    }

    r.require_samples(n, config.min_samples);
    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testing::permissive;
    use qdiag_store::fakes::MemorySource;

    #[test]
    fn td_error_without_learning_flag_warns() {
        let store = MemorySource::new()
            .with_field(fields::DEBUG_TD_ERROR, [1.0, 2.0])
            .into_store("t");
        let r = td_error(&store, &permissive()).unwrap();
        assert_eq!(r.status, CheckStatus::Warning);
    }

    #[test]
    fn td_error_growth_warns() {
        let n = 400;
        let td: Vec<f64> = (0..n).map(|i| if i < n / 2 { 0.5 } else { 2.0 }).collect();
        let store = MemorySource::new()
            .with_field(fields::DEBUG_LEARNING, vec![1.0; n])
            .with_field(fields::DEBUG_TD_ERROR, td)
            .into_store("t");
        let r = td_error(&store, &AnalysisConfig::default()).unwrap();
        assert_eq!(r.status, CheckStatus::Warning);
        assert_eq!(r.metrics["improvement_ratio"], 0.25);
    }

    #[test]
    fn td_error_shrinking_is_ok() {
        let n = 400;
        let td: Vec<f64> = (0..n).map(|i| if i < n / 2 { 2.0 } else { 0.5 }).collect();
        let store = MemorySource::new()
            .with_field(fields::DEBUG_LEARNING, vec![1.0; n])
            .with_field(fields::DEBUG_TD_ERROR, td)
            .into_store("t");
        let r = td_error(&store, &AnalysisConfig::default()).unwrap();
        assert_eq!(r.status, CheckStatus::Ok, "{:?}", r.issues);
        assert_eq!(r.metrics["improvement_ratio"], 4.0);
    }

    #[test]
    fn corrupt_td_error_is_an_error() {
        let store = MemorySource::new()
            .with_field(fields::DEBUG_LEARNING, [1.0])
            .with_raw(fields::DEBUG_TD_ERROR, vec![serde_json::json!("x")])
            .into_store("t");
        assert!(td_error(&store, &permissive()).is_err());
    }

    #[test]
    fn global_max_levels() {
        let store = MemorySource::new()
            .with_field(fields::DEBUG_GOAL_Q, [0.0, 20.0, 40.0])
            .into_store("g");
        assert_eq!(global_max(&store, &permissive()).unwrap().status, CheckStatus::Error);

        let store = MemorySource::new()
            .with_field(fields::DEBUG_GOAL_Q, [60.0, 80.0])
            .into_store("g");
        assert_eq!(global_max(&store, &permissive()).unwrap().status, CheckStatus::Warning);

        let store = MemorySource::new()
            .with_field(fields::DEBUG_GOAL_Q, [90.0, 99.0])
            .with_field(fields::DEBUG_GLOBAL_MAX_STATE, [50.0, 50.0])
            .with_field(fields::DEBUG_GLOBAL_MAX_ACTION, [50.0, 50.0])
            .into_store("g");
        let r = global_max(&store, &permissive()).unwrap();
        assert_eq!(r.status, CheckStatus::Ok, "{:?}", r.issues);
        assert_eq!(r.metrics["most_common_max_state_pct"], 100.0);
    }

    #[test]
    fn global_max_unstable_location_warns() {
        let store = MemorySource::new()
            .with_field(fields::DEBUG_GOAL_Q, [95.0, 99.0])
            .with_field(fields::DEBUG_GLOBAL_MAX_STATE, [50.0, 50.0, 12.0, 13.0])
            .with_field(fields::DEBUG_GLOBAL_MAX_ACTION, [50.0, 50.0, 12.0, 13.0])
            .into_store("g");
        let r = global_max(&store, &permissive()).unwrap();
        assert_eq!(r.status, CheckStatus::Warning);
    }

    #[test]
    fn bootstrap_above_bound_warns() {
        let store = MemorySource::new()
            .with_field(fields::DEBUG_LEARNING, [1.0, 1.0, 0.0])
            .with_field(fields::DEBUG_BOOTSTRAP, [50.0, 110.0, 500.0])
            .into_store("b");
        let r = bootstrap(&store, &permissive()).unwrap();
        assert_eq!(r.status, CheckStatus::Warning);
        assert_eq!(r.metrics["max"], 110.0);
    }

    #[test]
    fn bootstrap_within_bound_ok() {
        let store = MemorySource::new()
            .with_field(fields::DEBUG_LEARNING, [1.0, 1.0, 0.0])
            .with_field(fields::DEBUG_BOOTSTRAP, [50.0, 98.0, 500.0])
            .into_store("b");
        assert_eq!(bootstrap(&store, &permissive()).unwrap().status, CheckStatus::Ok);
    }

    #[test]
    fn bootstrap_decline_warns() {
        let mut values = vec![80.0; 150];
        values.extend(vec![50.0; 150]);
        let store = MemorySource::new()
            .with_field(fields::DEBUG_LEARNING, vec![1.0; 300])
            .with_field(fields::DEBUG_BOOTSTRAP, values)
            .into_store("b");
        let r = bootstrap(&store, &AnalysisConfig::default()).unwrap();
        assert_eq!(r.status, CheckStatus::Warning);
        assert_eq!(r.metrics["trend_start"], 80.0);
        assert_eq!(r.metrics["trend_end"], 50.0);
    }

    #[test]
    fn extreme_updates_warn() {
        let store = MemorySource::new()
            .with_field(fields::DEBUG_Q_OLD, [1.0, 2.0, 3.0, 0.0])
            .with_field(fields::DEBUG_Q_NEW, [1.5, 2.5, 30.0, 0.0])
            .into_store("u");
        let r = q_updates(&store, &permissive()).unwrap();
        assert_eq!(r.status, CheckStatus::Warning);
        assert_eq!(r.metrics["n_extreme"], 1.0);
        assert_eq!(r.metrics["n_positive"], 3.0);
    }

    #[test]
    fn small_sample_is_inconclusive_by_default() {
        let store = MemorySource::new()
            .with_field(fields::DEBUG_Q_OLD, [1.0, 2.0, 3.0])
            .with_field(fields::DEBUG_Q_NEW, [1.5, 2.5, 30.0])
            .into_store("u");
        let r = q_updates(&store, &AnalysisConfig::default()).unwrap();
        assert_eq!(r.status, CheckStatus::Info);
    }
}
