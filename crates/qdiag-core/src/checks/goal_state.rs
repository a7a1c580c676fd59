//! Goal-state behaviour: value evolution, self-transitions, visitation.

use qdiag_store::{fields, LogStore, StoreError};
use serde_json::json;

use super::{learning_samples, pct, CheckResult, CheckStatus};
use crate::config::AnalysisConfig;
use crate::metrics::convergence_summary;
use crate::stats;

/// Evolution of the goal pair's Q-value over the run.
///
/// The value should rise toward `reward / (1 - discount)` and never drop by
/// more than noise. A net decrease over the run is an ERROR.
pub fn evolution(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let t = &config.thresholds;
    let values: Vec<f64> = store
        .try_field(fields::DEBUG_GOAL_Q)?
        .iter()
        .copied()
        .filter(|&v| config.missing_sample.is_present_positive(v))
        .collect();
    let q_max = config.theoretical_max();
    let Some(summary) = convergence_summary(&values, q_max, t.decrease_noise) else {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            "no goal Q-value data",
        ));
    };

    let mut r = CheckResult::ok();
    r.metric("initial_value", summary.initial);
    r.metric("final_value", summary.last);
    r.metric("max_value", summary.max);
    r.metric("min_value", summary.min);
    r.count("n_samples", summary.samples);
    r.metric("distance_to_max", summary.distance_to_max);
    r.count("n_decreases", summary.decreases);
    r.metric("decrease_rate_pct", pct(summary.decrease_rate));
    r.metric("net_change", summary.net_change);

    let last = summary.last;
    if last < t.goal_value_error_fraction * q_max {
        r.error(format!(
            "goal Q-value far below theoretical maximum: {last:.2} vs {q_max:.2}"
        ));
    } else if last < t.goal_value_warning_fraction * q_max {
        r.warn(format!(
            "goal Q-value below theoretical maximum: {last:.2} vs {q_max:.2}"
        ));
    }

    if summary.decrease_rate > t.decrease_rate_max {
        r.warn(format!(
            "goal Q-value decreased {} times ({:.2}% of samples)",
            summary.decreases,
            pct(summary.decrease_rate)
        ));
        if let Some((drop, at)) = summary.largest_drop {
            r.detail("largest_drop", json!({ "value": drop, "step": at }));
        }
    }
    if summary.net_change < 0.0 {
        r.error(format!(
            "goal Q-value decreased over the run: {:.2} -> {last:.2}",
            summary.initial
        ));
    }

    if values.len() > 100 {
        let quarter = values.len() / 4;
        let quarters: Vec<f64> = (0..4)
            .map(|k| {
                let end = if k == 3 { values.len() } else { (k + 1) * quarter };
                stats::mean(&values[k * quarter..end]).unwrap_or(0.0)
            })
            .collect();
        r.detail("quarter_means", quarters);
    }

    r.require_samples(summary.samples, config.min_samples);
    Ok(r)
}

/// Transitions out of the goal pair.
///
/// Updates of the goal pair must see the goal state as next state (the
/// controller holds the plant there), and the bootstrap state must be forced
/// to the goal.
pub fn transitions(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let t = &config.thresholds;
    let goal_state = config.goal_state_value();
    let goal_action = config.goal_action_value();

    let learning = learning_samples(store)?;
    let update_state = store.try_field(fields::DEBUG_UPDATE_STATE)?;
    let update_action = store.try_field(fields::DEBUG_UPDATE_ACTION)?;
    let at_goal: Vec<usize> = learning
        .into_iter()
        .filter(|&i| {
            stats::at(&update_state, i) == goal_state && stats::at(&update_action, i) == goal_action
        })
        .collect();
    if at_goal.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            format!(
                "no updates of the goal pair (state {}, action {})",
                config.goal_state, config.goal_action
            ),
        ));
    }

    let mut r = CheckResult::ok();
    let n = at_goal.len();
    r.count("n_goal_updates", n);

    let next = store.try_field(fields::DEBUG_NEXT_STATE)?;
    if !next.is_empty() {
        let stayed = at_goal
            .iter()
            .filter(|&&i| stats::at(&next, i) == goal_state)
            .count();
        let share = stats::rate(stayed, n);
        r.metric("next_state_at_goal_pct", pct(share));

        let escapes: Vec<f64> = at_goal
            .iter()
            .map(|&i| stats::at(&next, i))
            .filter(|&s| s != goal_state)
            .collect();
        if !escapes.is_empty() {
            let top: Vec<_> = stats::top_counts(escapes, 3)
                .into_iter()
                .map(|(state, count)| json!({ "state": state, "count": count }))
                .collect();
            r.detail("escape_states", top);
        }

        if share < t.self_transition_min / 2.0 {
            r.error(format!(
                "goal state is not absorbing: next state stays at goal only {:.1}% of updates",
                pct(share)
            ));
        } else if share < t.self_transition_min {
            r.warn(format!(
                "next state stays at goal only {:.1}% of goal updates",
                pct(share)
            ));
        }
    }

    let bootstrap_state = store.try_field(fields::DEBUG_BOOTSTRAP_STATE)?;
    if !bootstrap_state.is_empty() {
        let forced = at_goal
            .iter()
            .filter(|&&i| stats::at(&bootstrap_state, i) == goal_state)
            .count();
        let share = stats::rate(forced, n);
        r.metric("bootstrap_state_at_goal_pct", pct(share));
        r.count("n_override_failures", n - forced);
        if share < t.bootstrap_override_min {
            r.error(format!(
                "bootstrap state override failed on {} goal updates ({:.1}% forced to goal)",
                n - forced,
                pct(share)
            ));
        }
    }

    r.require_samples(n, config.min_samples);
    Ok(r)
}

/// How often the plant reaches the goal region and the goal state itself.
pub fn visitation(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let states: Vec<f64> = store
        .try_field(fields::Q_STATE_INDEX)?
        .iter()
        .copied()
        .filter(|&s| s > 0.0)
        .collect();
    if states.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            "no state data",
        ));
    }

    let mut r = CheckResult::ok();
    let n = states.len();
    let goal = config.goal_state_value();
    let in_region = states.iter().filter(|&&s| config.in_goal_region(s)).count();
    let exact = states.iter().filter(|&&s| s == goal).count();
    let region_share = stats::rate(in_region, n);

    r.count("n_samples", n);
    r.metric("goal_region_pct", pct(region_share));
    r.metric("goal_state_pct", pct(stats::rate(exact, n)));
    r.count(
        "unique_states",
        stats::top_counts(states.iter().copied(), usize::MAX).len(),
    );
    if let Some((state, count)) = stats::mode(states.iter().copied()) {
        r.metric("most_common_state", state as f64);
        r.metric("most_common_state_pct", pct(stats::rate(count, n)));
    }

    if region_share < config.thresholds.visitation_min {
        r.warn(format!(
            "goal region rarely visited: {:.2}% of samples",
            pct(region_share)
        ));
    }

    let flag = store.try_field(fields::DEBUG_IS_GOAL_STATE)?;
    if !flag.is_empty() {
        let flagged = flag.iter().filter(|&&v| v == 1.0).count();
        r.count("n_goal_flag", flagged);
        r.metric("goal_flag_pct", pct(stats::rate(flagged, flag.len())));
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
    fn rising_goal_value_is_ok() {
        let store = MemorySource::new()
            .with_field(fields::DEBUG_GOAL_Q, [0.0, 91.0, 95.0, 99.0])
            .into_store("e");
        let r = evolution(&store, &permissive()).unwrap();
        assert_eq!(r.status, CheckStatus::Ok, "{:?}", r.issues);
        assert_eq!(r.metrics["initial_value"], 91.0);
        assert_eq!(r.metrics["final_value"], 99.0);
        assert_eq!(r.metrics["n_samples"], 3.0);
    }

    #[test]
    fn net_decrease_is_error() {
        let store = MemorySource::new()
            .with_field(fields::DEBUG_GOAL_Q, [98.0, 97.0, 95.0])
            .into_store("e");
        let r = evolution(&store, &permissive()).unwrap();
        assert_eq!(r.status, CheckStatus::Error);
        assert_eq!(r.metrics["n_decreases"], 2.0);
        assert!(r.details.contains_key("largest_drop"));
    }

    #[test]
    fn quarter_means_on_long_runs() {
        let values: Vec<f64> = (1..=200).map(|i| 90.0 + i as f64 * 0.01).collect();
        let store = MemorySource::new()
            .with_field(fields::DEBUG_GOAL_Q, values)
            .into_store("e");
        let r = evolution(&store, &permissive()).unwrap();
        assert_eq!(r.details["quarter_means"].as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn missing_goal_value_warns() {
        let store = MemorySource::new().into_store("e");
        assert_eq!(
            evolution(&store, &permissive()).unwrap().status,
            CheckStatus::Warning
        );
    }

    #[test]
    fn partial_self_transition_warns() {
        let store = MemorySource::new()
            .with_field(fields::DEBUG_LEARNING, [1.0; 4])
            .with_field(fields::DEBUG_UPDATE_STATE, [50.0; 4])
            .with_field(fields::DEBUG_UPDATE_ACTION, [50.0; 4])
            .with_field(fields::DEBUG_NEXT_STATE, [50.0, 50.0, 40.0, 50.0])
            .into_store("t");
        let r = transitions(&store, &permissive()).unwrap();
        assert_eq!(r.status, CheckStatus::Warning);
        assert_eq!(r.metrics["next_state_at_goal_pct"], 75.0);
        assert_eq!(r.details["escape_states"][0]["state"], 40);
    }

    #[test]
    fn failed_bootstrap_override_is_error() {
        let store = MemorySource::new()
            .with_field(fields::DEBUG_LEARNING, [1.0, 1.0, 1.0])
            .with_field(fields::DEBUG_UPDATE_STATE, [50.0, 50.0, 30.0])
            .with_field(fields::DEBUG_UPDATE_ACTION, [50.0, 50.0, 30.0])
            .with_field(fields::DEBUG_NEXT_STATE, [50.0, 50.0, 31.0])
            .with_field(fields::DEBUG_BOOTSTRAP_STATE, [50.0, 49.0, 31.0])
            .into_store("t");
        let r = transitions(&store, &permissive()).unwrap();
        assert_eq!(r.status, CheckStatus::Error);
        assert_eq!(r.metrics["n_goal_updates"], 2.0);
        assert_eq!(r.metrics["n_override_failures"], 1.0);
    }

    #[test]
    fn no_goal_updates_warns() {
        let store = MemorySource::new()
            .with_field(fields::DEBUG_LEARNING, [1.0])
            .with_field(fields::DEBUG_UPDATE_STATE, [12.0])
            .with_field(fields::DEBUG_UPDATE_ACTION, [50.0])
            .into_store("t");
        assert_eq!(
            transitions(&store, &permissive()).unwrap().status,
            CheckStatus::Warning
        );
    }

    #[test]
    fn rare_goal_visits_warn() {
        let mut states = vec![10.0; 199];
        states.push(50.0);
        let store = MemorySource::new()
            .with_field(fields::Q_STATE_INDEX, states)
            .into_store("v");
        let r = visitation(&store, &permissive()).unwrap();
        assert_eq!(r.status, CheckStatus::Warning);
        assert_eq!(r.metrics["goal_state_pct"], 0.5);
        assert_eq!(r.metrics["unique_states"], 2.0);
        assert_eq!(r.metrics["most_common_state"], 10.0);
    }

    #[test]
    fn frequent_goal_visits_ok() {
        let store = MemorySource::new()
            .with_field(fields::Q_STATE_INDEX, [0.0, 49.0, 50.0, 51.0, 20.0])
            .with_field(fields::DEBUG_IS_GOAL_STATE, [0.0, 0.0, 1.0, 0.0, 0.0])
            .into_store("v");
        let r = visitation(&store, &permissive()).unwrap();
        assert_eq!(r.status, CheckStatus::Ok);
        assert_eq!(r.metrics["goal_region_pct"], 75.0);
        assert_eq!(r.metrics["n_goal_flag"], 1.0);
    }
}
