//! Projection term checks.
//!
//! The projection term `e * (1/Te - 1/Ti)` is subtracted from the chosen
//! action so that the Q controller follows the PI controller's trajectory.
//! A log without any projection activity means the term is disabled; every
//! check here then reports INFO rather than a verdict.

use qdiag_store::{fields, LogStore, StoreError};

use super::{pct, CheckResult, CheckStatus};
use crate::config::AnalysisConfig;
use crate::stats;

/// Integral time assumed when converting the coefficient into `Te`.
const ASSUMED_TI: f64 = 20.0;
/// Minimum `|e|` for a sample to contribute to the coefficient estimate.
const COEFFICIENT_MIN_ERROR: f64 = 0.1;

pub fn application(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let t = &config.thresholds;
    let proj = store.try_field(fields::Q_PROJECTION)?;
    if proj.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Info,
            "no projection data; projection may be disabled",
        ));
    }

    let mut r = CheckResult::ok();
    let active = proj.iter().filter(|&&p| p != 0.0).count();
    r.count("n_nonzero_projection", active);
    r.metric("projection_usage_pct", pct(stats::rate(active, proj.len())));
    if active == 0 {
        r.info("projection term is all zeros (disabled, or Te = Ti)");
        return Ok(r);
    }

    let action = store.try_field(fields::Q_ACTION_VALUE)?;
    let unprojected = store.try_field(fields::Q_ACTION_VALUE_NO_PROJECTION)?;
    if !action.is_empty() && !unprojected.is_empty() {
        let diff: Vec<f64> = action
            .iter()
            .zip(unprojected.iter())
            .map(|(a, b)| a - b)
            .collect();
        let applied = diff.iter().filter(|&&d| d != 0.0).count();
        r.count("n_projection_applied", applied);
        r.metric("projection_applied_pct", pct(stats::rate(applied, diff.len())));
        if applied > 0 {
            let consistent = diff
                .iter()
                .enumerate()
                .filter(|&(i, &d)| (d + stats::at(&proj, i)).abs() <= t.projection_tolerance)
                .count();
            r.metric(
                "projection_consistency_pct",
                pct(stats::rate(consistent, diff.len())),
            );
        }
    }

    let states = store.try_field(fields::Q_STATE_INDEX)?;
    let region: Vec<usize> = (0..states.len().min(proj.len()))
        .filter(|&i| config.in_goal_region(states[i]))
        .collect();
    if region.is_empty() {
        return Ok(r);
    }
    let at_goal_active = region.iter().filter(|&&i| proj[i] != 0.0).count();
    r.count("n_samples_at_goal_region", region.len());
    r.metric(
        "projection_at_goal_pct",
        pct(stats::rate(at_goal_active, region.len())),
    );

    let error = store.try_field(fields::Q_ERROR)?;
    if error.is_empty() {
        return Ok(r);
    }
    let needed: Vec<usize> = region
        .into_iter()
        .filter(|&i| stats::at(&error, i).abs() > t.projection_error_at_goal)
        .collect();
    if !needed.is_empty() {
        let applied = needed.iter().filter(|&&i| proj[i] != 0.0).count();
        let share = stats::rate(applied, needed.len());
        r.count("n_large_error_at_goal", needed.len());
        r.metric("projection_when_needed_pct", pct(share));
        if share < t.projection_at_goal_min {
            r.warn(format!(
                "projection missing at goal with large error: only {:.1}% applied",
                pct(share)
            ));
        }
    }
    Ok(r)
}

/// Large error while the state sits at the goal: the plant follows the
/// target trajectory, so the state value is ~0 and the Q controller idles.
pub fn on_trajectory(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let threshold = config.thresholds.on_trajectory_error;
    let error = store.try_field(fields::Q_ERROR)?;
    let de = store.try_field(fields::Q_ERROR_DERIVATIVE)?;
    if error.is_empty() || de.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            "no error/derivative data",
        ));
    }
    let states = store.try_field(fields::Q_STATE_INDEX)?;
    let state_value = store.try_field(fields::Q_STATE_VALUE)?;

    let large: Vec<usize> = (0..error.len())
        .filter(|&i| error[i].abs() > threshold)
        .collect();
    let at_goal = states.iter().filter(|&&s| config.in_goal_region(s)).count();
    let on_traj: Vec<usize> = large
        .iter()
        .copied()
        .filter(|&i| config.in_goal_region(stats::at(&states, i)))
        .collect();

    let mut r = CheckResult::ok();
    r.count("n_large_error", large.len());
    r.count("n_at_goal", at_goal);
    r.count("n_on_trajectory", on_traj.len());
    if !large.is_empty() {
        r.metric(
            "on_trajectory_pct",
            pct(stats::rate(on_traj.len(), large.len())),
        );
    }
    if on_traj.is_empty() {
        return Ok(r);
    }

    let errors = stats::select(&error, &on_traj);
    let values = stats::select(&state_value, &on_traj);
    let error_mean = stats::mean_abs(&errors).unwrap_or(0.0);
    r.detail("on_trajectory_error_mean", error_mean);
    r.detail("on_trajectory_error_max", stats::max_abs(&errors).unwrap_or(0.0));
    if let Some(mean) = stats::mean(&values) {
        r.detail("on_trajectory_state_value_mean", mean);
    }
    if stats::mean_abs(&values).unwrap_or(0.0) < 1.0 {
        r.info(format!(
            "{} samples on trajectory: |e| = {error_mean:.1} on average but state value ~0",
            on_traj.len()
        ));
    }
    Ok(r)
}

/// The projected Q controller should track the PI controller's output.
pub fn effectiveness(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let increment = store.try_field(fields::Q_CONTROL_INCREMENT)?;
    if increment.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            "no control increment data",
        ));
    }

    let mut r = CheckResult::ok();
    let policy = config.missing_sample;
    let q_u = store.try_field(fields::Q_CONTROL)?;
    let pi_u = store.try_field(fields::PI_CONTROL)?;
    let (q, pi): (Vec<f64>, Vec<f64>) = q_u
        .iter()
        .zip(pi_u.iter())
        .filter(|&(&a, &b)| policy.is_present_positive(a) && policy.is_present_positive(b))
        .map(|(&a, &b)| (a, b))
        .unzip();
    if !q.is_empty() {
        let diff: Vec<f64> = q.iter().zip(&pi).map(|(a, b)| a - b).collect();
        r.metric("control_diff_mean", stats::mean(&diff).unwrap_or(0.0));
        r.metric("control_diff_std", stats::std_dev(&diff).unwrap_or(0.0));
        r.metric("control_diff_max", stats::max_abs(&diff).unwrap_or(0.0));
        if let Some(corr) = stats::corrcoef(&q, &pi) {
            r.metric("q_pi_correlation", corr);
            if corr < config.thresholds.correlation_min {
                r.warn(format!(
                    "low Q/PI control correlation: {corr:.3}; projection may not be effective"
                ));
            }
        }
    }

    let unprojected = store.try_field(fields::Q_CONTROL_INCREMENT_NO_PROJECTION)?;
    if !unprojected.is_empty() {
        let impact: Vec<f64> = increment
            .iter()
            .zip(unprojected.iter())
            .map(|(a, b)| a - b)
            .collect();
        r.count(
            "n_projection_changes",
            impact.iter().filter(|&&d| d != 0.0).count(),
        );
        r.metric("mean_projection_impact", stats::mean_abs(&impact).unwrap_or(0.0));
    }

    r.require_samples(q.len(), config.min_samples);
    Ok(r)
}

/// Estimate the projection coefficient `1/Te - 1/Ti` from `proj / e`.
pub fn coefficient(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let proj = store.try_field(fields::Q_PROJECTION)?;
    if proj.iter().all(|&p| p == 0.0) {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Info,
            "no projection data to estimate the coefficient",
        ));
    }
    let error = store.try_field(fields::Q_ERROR)?;

    let samples: Vec<usize> = (0..error.len().min(proj.len()))
        .filter(|&i| error[i].abs() > COEFFICIENT_MIN_ERROR)
        .collect();
    let coefficients: Vec<f64> = samples
        .iter()
        .map(|&i| proj[i] / error[i])
        .filter(|c| c.abs() < 1.0)
        .collect();
    if samples.len() < config.min_samples || coefficients.len() <= 10 {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Info,
            format!(
                "too few samples with |e| > {COEFFICIENT_MIN_ERROR} to estimate the coefficient ({})",
                coefficients.len()
            ),
        ));
    }

    let mut r = CheckResult::ok();
    let mean = stats::mean(&coefficients).unwrap_or(0.0);
    r.metric("estimated_coefficient", mean);
    r.metric("coefficient_std", stats::std_dev(&coefficients).unwrap_or(0.0));
    let interpretation = if mean.abs() < 0.001 {
        "Te ≈ Ti (projection has no effect)".to_string()
    } else if mean > 0.0 {
        format!("Te < Ti (coefficient {mean:.4})")
    } else {
        format!("Te > Ti (coefficient {mean:.4})")
    };
    r.detail("interpretation", interpretation);

    if mean.abs() > 0.001 {
        let te = 1.0 / (mean + 1.0 / ASSUMED_TI);
        if te > 0.0 && te < 100.0 {
            r.metric("estimated_te", te);
            r.detail("te_note", format!("assuming Ti = {ASSUMED_TI}, Te ≈ {te:.1}"));
        }
    }
    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testing::permissive;
    use qdiag_store::fakes::MemorySource;

    #[test]
    fn disabled_projection_is_info() {
        let store = MemorySource::new()
            .with_field(fields::Q_PROJECTION, [0.0, 0.0])
            .into_store("p");
        let r = application(&store, &permissive()).unwrap();
        assert_eq!(r.status, CheckStatus::Info);
        assert_eq!(r.metrics["projection_usage_pct"], 0.0);
        assert_eq!(coefficient(&store, &permissive()).unwrap().status, CheckStatus::Info);

        let empty = MemorySource::new().into_store("p");
        assert_eq!(application(&empty, &permissive()).unwrap().status, CheckStatus::Info);
    }

    #[test]
    fn projection_missing_at_goal_warns() {
        let store = MemorySource::new()
            .with_field(fields::Q_PROJECTION, [0.5, 0.0, 0.0, 0.2])
            .with_field(fields::Q_ACTION_VALUE, [1.0, 2.0, 0.0, 0.8])
            .with_field(fields::Q_ACTION_VALUE_NO_PROJECTION, [1.5, 2.0, 0.0, 1.0])
            .with_field(fields::Q_STATE_INDEX, [30.0, 50.0, 51.0, 49.0])
            .with_field(fields::Q_ERROR, [3.0, 2.0, 1.0, 0.1])
            .into_store("p");
        let r = application(&store, &permissive()).unwrap();
        assert_eq!(r.status, CheckStatus::Warning);
        assert_eq!(r.metrics["n_projection_applied"], 2.0);
        assert_eq!(r.metrics["projection_consistency_pct"], 100.0);
        assert_eq!(r.metrics["n_samples_at_goal_region"], 3.0);
        assert_eq!(r.metrics["n_large_error_at_goal"], 2.0);
        assert_eq!(r.metrics["projection_when_needed_pct"], 0.0);
    }

    #[test]
    fn on_trajectory_samples_are_info() {
        let store = MemorySource::new()
            .with_field(fields::Q_ERROR, [10.0, 8.0, 1.0])
            .with_field(fields::Q_ERROR_DERIVATIVE, [-0.5, -0.4, 0.0])
            .with_field(fields::Q_STATE_INDEX, [50.0, 20.0, 50.0])
            .with_field(fields::Q_STATE_VALUE, [0.2, 5.0, 0.0])
            .into_store("t");
        let r = on_trajectory(&store, &permissive()).unwrap();
        assert_eq!(r.status, CheckStatus::Info);
        assert_eq!(r.metrics["n_large_error"], 2.0);
        assert_eq!(r.metrics["n_on_trajectory"], 1.0);
        assert_eq!(r.metrics["on_trajectory_pct"], 50.0);
    }

    #[test]
    fn missing_derivative_warns() {
        let store = MemorySource::new()
            .with_field(fields::Q_ERROR, [1.0])
            .into_store("t");
        assert_eq!(
            on_trajectory(&store, &permissive()).unwrap().status,
            CheckStatus::Warning
        );
    }

    #[test]
    fn uncorrelated_controllers_warn() {
        let store = MemorySource::new()
            .with_field(fields::Q_CONTROL_INCREMENT, [0.1, 0.2, 0.1, 0.0])
            .with_field(fields::Q_CONTROL_INCREMENT_NO_PROJECTION, [0.1, 0.1, 0.1, 0.0])
            .with_field(fields::Q_CONTROL, [10.0, 20.0, 10.0, 20.0])
            .with_field(fields::PI_CONTROL, [10.0, 10.0, 20.0, 20.0])
            .into_store("e");
        let r = effectiveness(&store, &permissive()).unwrap();
        assert_eq!(r.status, CheckStatus::Warning);
        assert_eq!(r.metrics["q_pi_correlation"], 0.0);
        assert_eq!(r.metrics["n_projection_changes"], 1.0);
        assert_eq!(r.metrics["control_diff_max"], 10.0);
    }

    #[test]
    fn tracking_controllers_ok() {
        let store = MemorySource::new()
            .with_field(fields::Q_CONTROL_INCREMENT, [0.1, 0.2, 0.1])
            .with_field(fields::Q_CONTROL, [10.0, 20.0, 30.0])
            .with_field(fields::PI_CONTROL, [11.0, 21.0, 31.0])
            .into_store("e");
        let r = effectiveness(&store, &permissive()).unwrap();
        assert_eq!(r.status, CheckStatus::Ok, "{:?}", r.issues);
        assert_eq!(r.metrics["control_diff_mean"], -1.0);
    }

    #[test]
    fn coefficient_estimates_te() {
        // coefficient 0.05 = 1/Te - 1/20 gives Te = 10
        let error: Vec<f64> = (1..=200).map(|i| i as f64 * 0.5).collect();
        let proj: Vec<f64> = error.iter().map(|e| e * 0.05).collect();
        let store = MemorySource::new()
            .with_field(fields::Q_ERROR, error)
            .with_field(fields::Q_PROJECTION, proj)
            .into_store("c");
        let r = coefficient(&store, &AnalysisConfig::default()).unwrap();
        assert_eq!(r.status, CheckStatus::Ok);
        assert!((r.metrics["estimated_coefficient"] - 0.05).abs() < 1e-12);
        assert!((r.metrics["estimated_te"] - 10.0).abs() < 1e-9);
        assert!(r.details["interpretation"]
            .as_str()
            .is_some_and(|s| s.starts_with("Te < Ti")));
    }
}
