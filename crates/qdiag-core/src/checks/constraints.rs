//! Action constraints relative to the goal.
//!
//! The controller may only pick actions on the same side of the goal action
//! as the current state is of the goal state. Exploration is where this is
//! enforced; violations during exploitation point at a table already
//! corrupted by earlier unconstrained exploration.

use qdiag_store::{fields, LogStore, StoreError};

use super::{pct, CheckResult, CheckStatus};
use crate::config::AnalysisConfig;
use crate::stats;

/// Samples looked at for the recent goal-time share.
const RECENT_WINDOW: usize = 1000;
/// Recent goal-time share below which a note is added.
const RECENT_AT_GOAL_MIN: f64 = 0.05;

fn violates(state: f64, action: f64, goal_state: f64, goal_action: f64) -> bool {
    (state > goal_state && action < goal_action) || (state < goal_state && action > goal_action)
}

/// Sign with an exact zero kept as zero.
fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

pub fn same_side(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let states = store.try_field(fields::Q_STATE_INDEX)?;
    let actions = store.try_field(fields::Q_ACTION_INDEX)?;
    let exploration = store.try_field(fields::Q_EXPLORATION)?;
    if states.is_empty() || actions.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            "no state/action data",
        ));
    }

    let (gs, ga) = (config.goal_state_value(), config.goal_action_value());
    let valid: Vec<usize> = (0..states.len().min(actions.len()))
        .filter(|&i| states[i] > 0.0 && actions[i] > 0.0)
        .collect();
    if valid.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            "no valid state-action pairs",
        ));
    }

    let mut r = CheckResult::ok();
    let n = valid.len();
    let violations: Vec<usize> = valid
        .iter()
        .copied()
        .filter(|&i| violates(states[i], actions[i], gs, ga))
        .collect();
    let rate = stats::rate(violations.len(), n);
    r.count("n_valid_samples", n);
    r.count("n_violations", violations.len());
    r.metric("violation_rate_pct", pct(rate));

    if !violations.is_empty() {
        let issue = format!(
            "{} same-side constraint violations ({:.2}%)",
            violations.len(),
            pct(rate)
        );
        if rate < config.thresholds.same_side_error_rate {
            r.warn(issue);
        } else {
            r.error(issue);
        }
        let high_low = violations.iter().filter(|&&i| states[i] > gs).count();
        r.detail("high_state_low_action", high_low);
        r.detail("low_state_high_action", violations.len() - high_low);
    }

    if !exploration.is_empty() {
        for (label, flag) in [("exploration", 1.0), ("exploitation", 0.0)] {
            let subset: Vec<usize> = valid
                .iter()
                .copied()
                .filter(|&i| stats::at(&exploration, i) == flag)
                .collect();
            r.count(&format!("n_{label}"), subset.len());
            if subset.is_empty() {
                continue;
            }
            let bad = subset
                .iter()
                .filter(|&&i| violates(states[i], actions[i], gs, ga))
                .count();
            r.count(&format!("{label}_violations"), bad);
            r.metric(
                &format!("{label}_violation_rate_pct"),
                pct(stats::rate(bad, subset.len())),
            );
            if bad == 0 {
                continue;
            }
            if flag == 1.0 {
                r.issues.push(format!(
                    "{bad} violations during exploration; constraint not enforced"
                ));
            } else {
                r.detail(
                    "exploitation_note",
                    format!(
                        "{bad} violations during exploitation; Q-table may be corrupted by past exploration"
                    ),
                );
            }
        }
    }

    r.require_samples(n, config.min_samples);
    Ok(r)
}

/// Actions should push in the same direction as the state value.
pub fn action_direction(
    store: &LogStore,
    config: &AnalysisConfig,
) -> Result<CheckResult, StoreError> {
    let t = &config.thresholds;
    let state_value = store.try_field(fields::Q_STATE_VALUE)?;
    let action_value = store.try_field(fields::Q_ACTION_VALUE)?;
    if state_value.is_empty() || action_value.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            "no state/action value data",
        ));
    }

    let significant: Vec<(f64, f64)> = state_value
        .iter()
        .zip(action_value.iter())
        .filter(|&(&s, _)| s.abs() > t.direction_deadband)
        .map(|(&s, &a)| (s, a))
        .collect();
    if significant.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Info,
            format!("no state values outside the ±{} deadband", t.direction_deadband),
        ));
    }

    let mut r = CheckResult::ok();
    let n = significant.len();
    let correct = significant
        .iter()
        .filter(|&&(s, a)| sign(s) == sign(a))
        .count();
    let rate = stats::rate(correct, n);
    r.count("n_significant_samples", n);
    r.count("n_correct_direction", correct);
    r.metric("correct_direction_rate_pct", pct(rate));
    if rate < t.direction_min {
        r.warn(format!("only {:.1}% of actions in the correct direction", pct(rate)));
    }

    r.require_samples(n, config.min_samples);
    Ok(r)
}

/// Repeated goal crossings with little time spent at the goal.
pub fn oscillation(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let t = &config.thresholds;
    let states: Vec<f64> = store
        .try_field(fields::Q_STATE_INDEX)?
        .iter()
        .copied()
        .filter(|&s| s > 0.0)
        .collect();
    if states.len() < config.min_samples || states.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Info,
            format!("insufficient data for oscillation analysis ({} states)", states.len()),
        ));
    }

    let mut r = CheckResult::ok();
    let n = states.len();
    let goal = config.goal_state_value();
    let crossings = states
        .windows(2)
        .filter(|w| sign(w[0] - goal) != sign(w[1] - goal))
        .count();
    let crossing_rate = stats::rate(crossings, n);
    let at_goal = stats::rate(
        states.iter().filter(|&&s| config.in_goal_region(s)).count(),
        n,
    );
    r.count("n_goal_crossings", crossings);
    r.metric("crossing_rate_pct", pct(crossing_rate));
    r.metric("time_at_goal_pct", pct(at_goal));
    r.metric(
        "state_range",
        stats::max(&states).unwrap_or(0.0) - stats::min(&states).unwrap_or(0.0),
    );
    r.metric("state_std", stats::std_dev(&states).unwrap_or(0.0));

    if crossing_rate > t.crossing_rate_max && at_goal < t.time_at_goal_min {
        r.warn(format!(
            "possible oscillation: {crossings} goal crossings but only {:.1}% time at goal",
            pct(at_goal)
        ));
    }

    if n > RECENT_WINDOW {
        let recent = &states[n - RECENT_WINDOW..];
        let recent_at_goal = stats::rate(
            recent.iter().filter(|&&s| config.in_goal_region(s)).count(),
            RECENT_WINDOW,
        );
        r.metric("recent_time_at_goal_pct", pct(recent_at_goal));
        if recent_at_goal < RECENT_AT_GOAL_MIN {
            r.issues.push(format!(
                "recent behaviour: only {:.1}% time at goal",
                pct(recent_at_goal)
            ));
        }
    }

    Ok(r)
}
