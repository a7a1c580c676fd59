//! Structural overview of one log: field groups, episodes, active ranges.

use std::collections::BTreeMap;

use qdiag_store::{fields, FieldGroup, LogStore, LogSummary};
use serde::{Deserialize, Serialize};

use crate::goal::{detect_goal_indices, DetectedGoal};
use crate::stats::{self, Episode};

/// Backwards jump of `Q_t` (seconds) that starts a new episode.
pub const EPISODE_RESET: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPresence {
    pub group: String,
    pub present: Vec<String>,
    pub known: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    pub summary: LogSummary,
    pub groups: Vec<GroupPresence>,
    pub episodes: Vec<Episode>,
    /// First and last nonzero index of each instrumentation field.
    pub active_ranges: BTreeMap<String, (usize, usize)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_goal: Option<DetectedGoal>,
}

pub fn inspect(store: &LogStore) -> Inspection {
    let groups = FieldGroup::all()
        .into_iter()
        .map(|group| GroupPresence {
            group: group.name().to_string(),
            present: store
                .field_group(group)
                .into_iter()
                .map(str::to_string)
                .collect(),
            known: group.fields().len(),
        })
        .collect();

    let active_ranges = fields::DEBUG_FIELDS
        .iter()
        .filter_map(|&name| {
            stats::nonzero_range(&store.field(name)).map(|range| (name.to_string(), range))
        })
        .collect();

    Inspection {
        summary: store.summary(),
        groups,
        episodes: stats::detect_episodes(&store.field(fields::Q_TIME), EPISODE_RESET),
        active_ranges,
        detected_goal: detect_goal_indices(store),
    }
}
