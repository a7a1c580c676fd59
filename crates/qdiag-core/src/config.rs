//! Analysis configuration
//!
//! All paths and thresholds are resolved once (file, then CLI overrides) and
//! passed down explicitly. Every field has a default, so an empty TOML file
//! is a valid configuration.

use std::path::Path;

use qdiag_store::LogSet;
use serde::{Deserialize, Serialize};

use crate::error::{DiagError, Result};

/// Top-level configuration file.
///
/// ```toml
/// [logs]
/// dir = "runs/2026-03-01"
///
/// [analysis]
/// goal_state = 50
/// missing_sample = "non_finite"
///
/// [analysis.thresholds]
/// self_transition_min = 0.95
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QdiagConfig {
    pub logs: LogSet,
    pub analysis: AnalysisConfig,
}

impl QdiagConfig {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|source| DiagError::InvalidConfig {
            path: origin.to_path_buf(),
            source,
        })?;
        config.analysis.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DiagError::ConfigNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                DiagError::Io(e)
            }
        })?;
        let config = Self::from_toml_str(&text, path)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }
}

/// How a placeholder sample is distinguished from a real one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSample {
    /// Exact zero means "not recorded". Matches how the simulator pre-fills
    /// its log buffers, but also discards samples with perfect tracking.
    #[default]
    Zero,
    /// Only `null` / NaN / infinite values are missing; zero is a value.
    NonFinite,
}

impl MissingSample {
    /// Whether a signed signal (errors, TD errors) holds a real sample.
    pub fn is_present(self, value: f64) -> bool {
        match self {
            MissingSample::Zero => value != 0.0 && !value.is_nan(),
            MissingSample::NonFinite => value.is_finite(),
        }
    }

    /// Whether a non-negative signal (control effort, Q-values) holds a real
    /// sample.
    pub fn is_present_positive(self, value: f64) -> bool {
        match self {
            MissingSample::Zero => value > 0.0,
            MissingSample::NonFinite => value.is_finite(),
        }
    }
}

/// Goal definition, numeric policy and check thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// 1-based goal state index in the Q-table.
    pub goal_state: u32,
    /// 1-based goal action index in the Q-table.
    pub goal_action: u32,
    /// States within this distance of the goal count as the goal region.
    pub goal_band: u32,
    pub discount: f64,
    pub reward: f64,
    /// Checks with fewer samples than this report INFO instead of a verdict.
    pub min_samples: usize,
    pub missing_sample: MissingSample,
    /// Infer goal indices from the global-maximum location fields.
    pub detect_goal: bool,
    pub thresholds: Thresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            goal_state: 50,
            goal_action: 50,
            goal_band: 1,
            discount: 0.99,
            reward: 1.0,
            min_samples: 100,
            missing_sample: MissingSample::Zero,
            detect_goal: false,
            thresholds: Thresholds::default(),
        }
    }
}

impl AnalysisConfig {
    /// Asymptotic Q-value of the goal pair: `reward / (1 - discount)`.
    pub fn theoretical_max(&self) -> f64 {
        self.reward / (1.0 - self.discount)
    }

    pub fn goal_state_value(&self) -> f64 {
        f64::from(self.goal_state)
    }

    pub fn goal_action_value(&self) -> f64 {
        f64::from(self.goal_action)
    }

    /// Whether a state index lies within `goal_band` of the goal state.
    pub fn in_goal_region(&self, state: f64) -> bool {
        (state - self.goal_state_value()).abs() <= f64::from(self.goal_band)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.discount) {
            return Err(DiagError::InvalidSettings(format!(
                "discount must be in [0, 1), got {}",
                self.discount
            )));
        }
        if self.goal_state == 0 || self.goal_action == 0 {
            return Err(DiagError::InvalidSettings(
                "goal indices are 1-based and must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Check thresholds. Rates are fractions in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    // convergence
    pub td_growth_ratio: f64,
    pub large_negative_td: f64,
    pub large_negative_td_rate: f64,
    /// Goal value below this fraction of the theoretical maximum is an ERROR.
    pub goal_value_error_fraction: f64,
    /// Goal value below this fraction of the theoretical maximum is a WARNING.
    pub goal_value_warning_fraction: f64,
    pub goal_value_drop: f64,
    pub global_max_stability_min: f64,
    pub bootstrap_tolerance: f64,
    pub bootstrap_decline_ratio: f64,
    pub extreme_update: f64,
    pub extreme_update_rate: f64,
    pub update_growth_ratio: f64,

    // temporal
    pub pairing_min: f64,
    pub reward_at_goal_min: f64,
    pub state_jump: f64,
    pub state_jump_rate: f64,
    pub buffer_max_delay: usize,

    // goal state
    pub self_transition_min: f64,
    pub bootstrap_override_min: f64,
    pub decrease_noise: f64,
    pub decrease_rate_max: f64,
    pub visitation_min: f64,

    // constraints
    pub same_side_error_rate: f64,
    pub direction_deadband: f64,
    pub direction_min: f64,
    pub crossing_rate_max: f64,
    pub time_at_goal_min: f64,

    // projection
    pub projection_tolerance: f64,
    pub projection_error_at_goal: f64,
    pub projection_at_goal_min: f64,
    pub on_trajectory_error: f64,
    pub correlation_min: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            td_growth_ratio: 1.2,
            large_negative_td: -10.0,
            large_negative_td_rate: 0.1,
            goal_value_error_fraction: 0.5,
            goal_value_warning_fraction: 0.9,
            goal_value_drop: 5.0,
            global_max_stability_min: 0.9,
            bootstrap_tolerance: 5.0,
            bootstrap_decline_ratio: 0.9,
            extreme_update: 10.0,
            extreme_update_rate: 0.01,
            update_growth_ratio: 1.5,

            pairing_min: 0.99,
            reward_at_goal_min: 0.8,
            state_jump: 10.0,
            state_jump_rate: 0.05,
            buffer_max_delay: 100,

            self_transition_min: 0.9,
            bootstrap_override_min: 0.99,
            decrease_noise: 0.1,
            decrease_rate_max: 0.01,
            visitation_min: 0.01,

            same_side_error_rate: 0.05,
            direction_deadband: 0.1,
            direction_min: 0.7,
            crossing_rate_max: 0.1,
            time_at_goal_min: 0.1,

            projection_tolerance: 0.001,
            projection_error_at_goal: 0.5,
            projection_at_goal_min: 0.9,
            on_trajectory_error: 5.0,
            correlation_min: 0.9,
        }
    }
}
