//! Temporal consistency of state, action and reward around each Q-update.

use qdiag_store::{fields, LogStore, StoreError};
use serde_json::json;

use super::{learning_samples, pct, CheckResult, CheckStatus};
use crate::config::AnalysisConfig;
use crate::stats;

/// Buffered (dead-time compensated) state/action pairing against the
/// unbuffered previous state/action.
///
/// A mismatch is expected whenever the controller compensates dead time, so
/// it is reported as INFO.
pub fn pairing(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let learning = learning_samples(store)?;
    if learning.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            "no learning samples",
        ));
    }

    let mut r = CheckResult::ok();
    r.count("n_learning_samples", learning.len());

    let pairs = [
        ("state", fields::DEBUG_OLD_STATE, fields::DEBUG_UPDATE_STATE),
        ("action", fields::DEBUG_OLD_ACTION, fields::DEBUG_UPDATE_ACTION),
    ];
    for (label, unbuffered, buffered) in pairs {
        let a = store.try_field(unbuffered)?;
        let b = store.try_field(buffered)?;
        if a.is_empty() || b.is_empty() {
            continue;
        }
        let matches = learning
            .iter()
            .filter(|&&i| stats::at(&a, i) == stats::at(&b, i))
            .count();
        let rate = stats::rate(matches, learning.len());
        r.metric(&format!("{label}_match_rate"), rate);

        if rate < config.thresholds.pairing_min {
            let mismatches = learning.len() - matches;
            r.detail(&format!("{label}_mismatches"), mismatches);
            r.info(format!(
                "{label} mismatch: {mismatches} samples ({:.1}%); expected when dead-time compensation is active",
                pct(1.0 - rate)
            ));
        }
    }

    r.require_samples(learning.len(), config.min_samples);
    Ok(r)
}

/// Reward must be credited to the goal pair: among learning samples that
/// update the goal pair, reward 1 should dominate.
pub fn reward(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let min_share = config.thresholds.reward_at_goal_min;
    let learning = learning_samples(store)?;
    if learning.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            "no learning samples",
        ));
    }

    let reward = store.try_field(fields::DEBUG_REWARD)?;
    let update_state = store.try_field(fields::DEBUG_UPDATE_STATE)?;
    let updating_goal = store.try_field(fields::DEBUG_IS_UPDATING_GOAL)?;

    let mut r = CheckResult::ok();
    let rewarded: Vec<usize> = learning
        .iter()
        .copied()
        .filter(|&i| stats::at(&reward, i) == 1.0)
        .collect();
    let unrewarded = learning
        .iter()
        .filter(|&&i| stats::at(&reward, i) == 0.0)
        .count();
    r.count("n_R_equals_1", rewarded.len());
    r.count("n_R_equals_0", unrewarded);
    r.metric("reward_1_pct", pct(stats::rate(rewarded.len(), learning.len())));

    if !rewarded.is_empty() && !update_state.is_empty() {
        let states = stats::select(&update_state, &rewarded);
        let at_goal = states.iter().filter(|&&s| config.in_goal_region(s)).count();
        let share = stats::rate(at_goal, states.len());
        r.metric("reward_at_goal_pct", pct(share));
        let top: Vec<_> = stats::top_counts(states.iter().copied(), 3)
            .into_iter()
            .map(|(state, count)| {
                json!({
                    "state": state,
                    "count": count,
                    "pct": pct(stats::rate(count, states.len())),
                })
            })
            .collect();
        r.detail("states_when_R1", top);

        if share < min_share {
            r.warn(format!(
                "only {:.1}% of R=1 rewards are credited at the goal state; possible reward timing misalignment",
                pct(share)
            ));
        }
    }

    let goal_updates: Vec<usize> = learning
        .iter()
        .copied()
        .filter(|&i| stats::at(&updating_goal, i) == 1.0)
        .collect();
    r.count("n_goal_updates", goal_updates.len());
    if goal_updates.is_empty() {
        r.info("no goal-pair updates recorded");
        return Ok(r);
    }

    let r1 = goal_updates
        .iter()
        .filter(|&&i| stats::at(&reward, i) == 1.0)
        .count();
    let share = stats::rate(r1, goal_updates.len());
    r.count("R1_when_updating_goal", r1);
    r.metric("R1_when_updating_goal_pct", pct(share));
    if share < min_share {
        r.warn(format!(
            "reward timing misalignment: only {:.1}% of goal-pair updates carry R=1",
            pct(share)
        ));
    }

    r.require_samples(goal_updates.len(), config.min_samples);
    Ok(r)
}

/// State sequence plausibility: large jumps, state/action ranges, goal share.
pub fn sequence(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let t = &config.thresholds;
    let state_nr = store.try_field(fields::Q_STATE_INDEX)?;
    let action_nr = store.try_field(fields::Q_ACTION_INDEX)?;
    if state_nr.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Warning,
            "no state sequence data",
        ));
    }

    let mut r = CheckResult::ok();
    let steps = stats::diff(&state_nr);
    let jumps = steps.iter().filter(|d| d.abs() > t.state_jump).count();
    r.count("n_large_state_jumps", jumps);
    r.metric("large_jump_rate_pct", pct(stats::rate(jumps, steps.len())));
    if jumps as f64 > steps.len() as f64 * t.state_jump_rate {
        r.info(format!(
            "{jumps} large state jumps (> {} states); may mark episode boundaries or disturbances",
            t.state_jump
        ));
    }

    let states: Vec<f64> = state_nr.iter().copied().filter(|&s| s > 0.0).collect();
    if !states.is_empty() {
        let at_goal = states.iter().filter(|&&s| config.in_goal_region(s)).count();
        r.metric("min_state", stats::min(&states).unwrap_or(0.0));
        r.metric("max_state", stats::max(&states).unwrap_or(0.0));
        r.metric("mean_state", stats::mean(&states).unwrap_or(0.0));
        r.count("goal_region_visits", at_goal);
        r.metric("goal_region_pct", pct(stats::rate(at_goal, states.len())));
    }

    let actions: Vec<f64> = action_nr.iter().copied().filter(|&a| a > 0.0).collect();
    if !actions.is_empty() {
        r.metric("min_action", stats::min(&actions).unwrap_or(0.0));
        r.metric("max_action", stats::max(&actions).unwrap_or(0.0));
        r.metric("mean_action", stats::mean(&actions).unwrap_or(0.0));
    }

    r.require_samples(states.len(), config.min_samples);
    Ok(r)
}

/// Estimate the dead-time buffer delay by correlating the buffered update
/// state with delayed copies of the unbuffered state.
pub fn buffer(store: &LogStore, config: &AnalysisConfig) -> Result<CheckResult, StoreError> {
    let buffered = store.try_field(fields::DEBUG_UPDATE_STATE)?;
    let unbuffered = store.try_field(fields::DEBUG_OLD_STATE)?;
    if buffered.is_empty() || unbuffered.is_empty() {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Info,
            "insufficient data for buffer analysis",
        ));
    }

    let max_delay = config.thresholds.buffer_max_delay;
    let span = buffered
        .len()
        .min(unbuffered.len())
        .saturating_sub(max_delay);
    if span <= config.min_samples {
        return Ok(CheckResult::inconclusive(
            CheckStatus::Info,
            format!("buffer analysis needs more than {} samples", config.min_samples + max_delay),
        ));
    }

    let mut best: Option<(usize, f64)> = None;
    for delay in (0..max_delay).step_by(5) {
        let corr = stats::corrcoef(&buffered[delay..span + delay], &unbuffered[..span]);
        if let Some(c) = corr {
            if best.map_or(c > 0.0, |(_, b)| c > b) {
                best = Some((delay, c));
            }
        }
    }

    let mut r = CheckResult::ok();
    match best {
        Some((delay, corr)) => {
            r.count("best_delay_match", delay);
            r.metric("correlation_at_best_delay", corr);
            let mode = if delay == 0 {
                "no delay (dead-time compensation off)".to_string()
            } else {
                format!("delayed by ~{delay} samples (dead-time compensation on)")
            };
            r.detail("buffer_mode", mode);
        }
        None => r.info("buffered state does not correlate with any delay"),
    }
    Ok(r)
}
