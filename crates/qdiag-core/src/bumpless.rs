//! Bumpless-transfer verification.
//!
//! A verification run drives the plant with both controllers from identical
//! conditions through three phases: set-point tracking, a step disturbance
//! and recovery after it is removed. With an untrained (identity) table and
//! the projection term active, the learned controller's output must match
//! the baseline PI output in every phase.

use qdiag_store::{fields, LogStore, StoreError};
use serde::{Deserialize, Serialize};

use crate::stats;

/// First sample after the manual-control lead-in.
pub const TRACKING_START: usize = 19;
/// `|Q_d|` above this marks the disturbance phase.
const DISTURBANCE_THRESHOLD: f64 = 0.01;
/// Phase boundaries used when the log carries no disturbance.
const FALLBACK_BOUNDS: (usize, usize) = (2000, 4000);
/// `|projection|` above this counts as active.
const PROJECTION_ACTIVE: f64 = 0.01;
/// Projection active on fewer tracking samples than this share is suspicious.
const PROJECTION_ACTIVITY_MIN: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Tracking,
    Disturbance,
    Recovery,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Tracking => "Phase 1 (set-point tracking)",
            Phase::Disturbance => "Phase 2 (disturbance)",
            Phase::Recovery => "Phase 3 (recovery)",
        }
    }

    /// Pass limits on `|u_Q - u_PI|`: (mean, max), in percent of the
    /// control range.
    pub fn limits(self) -> (f64, f64) {
        match self {
            Phase::Tracking => (0.5, 2.0),
            Phase::Disturbance | Phase::Recovery => (0.5, 1.0),
        }
    }
}

/// `|u_Q - u_PI|` statistics over one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: Phase,
    pub start: usize,
    /// Exclusive.
    pub end: usize,
    pub mean: f64,
    pub std: f64,
    pub max: f64,
    pub passed: bool,
}

impl PhaseResult {
    pub fn samples(&self) -> usize {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionActivity {
    pub active: usize,
    pub total: usize,
    pub mean_abs: f64,
}

impl ProjectionActivity {
    pub fn rate(&self) -> f64 {
        stats::rate(self.active, self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BumplessReport {
    pub log: String,
    pub disturbance_detected: bool,
    pub phases: Vec<PhaseResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<ProjectionActivity>,
    pub warnings: Vec<String>,
}

impl BumplessReport {
    /// All three phases evaluated and within limits.
    pub fn passed(&self) -> bool {
        self.phases.len() == 3 && self.phases.iter().all(|p| p.passed)
    }
}

/// Phase boundaries `(disturbance start, disturbance end)`, end exclusive.
fn phase_bounds(disturbance: &[f64], len: usize) -> Option<(usize, usize)> {
    let first = disturbance
        .iter()
        .position(|d| d.abs() > DISTURBANCE_THRESHOLD)?;
    let last = disturbance
        .iter()
        .rposition(|d| d.abs() > DISTURBANCE_THRESHOLD)?;
    Some((first.min(len), (last + 1).min(len)))
}

pub fn verify_bumpless(store: &LogStore) -> Result<BumplessReport, StoreError> {
    let q_u = store.try_field(fields::Q_CONTROL)?;
    let pi_u = store.try_field(fields::PI_CONTROL)?;
    let disturbance = store.try_field(fields::Q_DISTURBANCE)?;
    let projection = store.try_field(fields::Q_PROJECTION)?;

    let mut report = BumplessReport {
        log: store.name().to_string(),
        disturbance_detected: false,
        phases: Vec::new(),
        projection: None,
        warnings: Vec::new(),
    };

    let len = q_u.len().min(pi_u.len());
    if len == 0 {
        report
            .warnings
            .push("no learned/baseline control data".to_string());
        return Ok(report);
    }

    let (p2_start, p2_end) = match phase_bounds(&disturbance, len) {
        Some(bounds) => {
            report.disturbance_detected = true;
            bounds
        }
        None => {
            report.warnings.push(format!(
                "no disturbance found in {}; using default phase boundaries",
                fields::Q_DISTURBANCE
            ));
            (FALLBACK_BOUNDS.0.min(len), FALLBACK_BOUNDS.1.min(len))
        }
    };

    let diff: Vec<f64> = q_u
        .iter()
        .zip(pi_u.iter())
        .map(|(q, p)| (q - p).abs())
        .collect();
    for (phase, start, end) in [
        (Phase::Tracking, TRACKING_START, p2_start),
        (Phase::Disturbance, p2_start, p2_end),
        (Phase::Recovery, p2_end, len),
    ] {
        if start >= end {
            report
                .warnings
                .push(format!("{} has no samples", phase.label()));
            continue;
        }
        let window = &diff[start..end];
        let mean = stats::mean(window).unwrap_or(0.0);
        let max = stats::max(window).unwrap_or(0.0);
        let (mean_limit, max_limit) = phase.limits();
        report.phases.push(PhaseResult {
            phase,
            start,
            end,
            mean,
            std: stats::std_dev(window).unwrap_or(0.0),
            max,
            passed: mean < mean_limit && max < max_limit,
        });
    }

    let tracking_end = p2_start.min(projection.len());
    if TRACKING_START < tracking_end {
        let window = &projection[TRACKING_START..tracking_end];
        let activity = ProjectionActivity {
            active: window.iter().filter(|p| p.abs() > PROJECTION_ACTIVE).count(),
            total: window.len(),
            mean_abs: stats::mean_abs(window).unwrap_or(0.0),
        };
        if activity.rate() < PROJECTION_ACTIVITY_MIN {
            report.warnings.push(format!(
                "projection rarely active in the tracking phase ({}/{} samples); check that it is enabled",
                activity.active, activity.total
            ));
        }
        report.projection = Some(activity);
    }

    tracing::debug!(
        log = store.name(),
        phases = report.phases.len(),
        passed = report.passed(),
        "bumpless verification finished"
    );
    Ok(report)
}
