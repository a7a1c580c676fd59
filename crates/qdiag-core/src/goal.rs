//! Goal index resolution.
//!
//! Goal indices come from configuration. When `detect_goal` is set, the most
//! frequent location of the Q-table's global maximum is used instead.

use qdiag_store::{fields, LogStore};
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::stats;

/// Goal pair inferred from the global-maximum location fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedGoal {
    pub state: u32,
    pub action: u32,
    /// Share of valid samples at the most common state location.
    pub state_share: f64,
    /// Share of valid samples at the most common action location.
    pub action_share: f64,
}

/// Most frequent positive value of the global-maximum state/action fields.
///
/// `None` when either field has no positive sample.
pub fn detect_goal_indices(store: &LogStore) -> Option<DetectedGoal> {
    let positive = |name: &str| -> Vec<f64> {
        store
            .field(name)
            .iter()
            .copied()
            .filter(|&v| v > 0.0)
            .collect()
    };
    let states = positive(fields::DEBUG_GLOBAL_MAX_STATE);
    let actions = positive(fields::DEBUG_GLOBAL_MAX_ACTION);

    let (state, state_count) = stats::mode(states.iter().copied())?;
    let (action, action_count) = stats::mode(actions.iter().copied())?;

    Some(DetectedGoal {
        state: u32::try_from(state).ok()?,
        action: u32::try_from(action).ok()?,
        state_share: stats::rate(state_count, states.len()),
        action_share: stats::rate(action_count, actions.len()),
    })
}

/// The analysis settings to use for `store`.
///
/// Returns `config` unchanged unless detection is enabled and succeeds.
pub fn resolve_goal(store: &LogStore, config: &AnalysisConfig) -> AnalysisConfig {
    let mut resolved = config.clone();
    if !config.detect_goal {
        return resolved;
    }
    match detect_goal_indices(store) {
        Some(goal) => {
            tracing::info!(
                log = store.name(),
                goal_state = goal.state,
                goal_action = goal.action,
                "goal indices detected"
            );
            resolved.goal_state = goal.state;
            resolved.goal_action = goal.action;
        }
        None => tracing::warn!(
            log = store.name(),
            goal_state = config.goal_state,
            goal_action = config.goal_action,
            "goal detection found no global-maximum data, keeping configured goal"
        ),
    }
    resolved
}
