//! Invariant checkers.
//!
//! Each checker is a plain function over one [`LogStore`] returning a
//! [`CheckResult`]. Absent inputs are reported through the result (INFO or
//! WARNING); only a field that cannot be read as numbers is an `Err`.

use std::str::FromStr;

use qdiag_store::{fields, LogStore, StoreError};
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::error::DiagError;

pub mod constraints;
pub mod convergence;
pub mod goal_state;
pub mod projection;
mod result;
pub mod temporal;

pub use result::{CheckResult, CheckStatus};

/// Checker function signature.
pub type CheckFn = fn(&LogStore, &AnalysisConfig) -> Result<CheckResult, StoreError>;

/// Checker family, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Convergence,
    Temporal,
    GoalState,
    Constraints,
    Projection,
}

impl Category {
    pub fn all() -> [Category; 5] {
        [
            Category::Convergence,
            Category::Temporal,
            Category::GoalState,
            Category::Constraints,
            Category::Projection,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Convergence => "convergence",
            Category::Temporal => "temporal",
            Category::GoalState => "goal_state",
            Category::Constraints => "constraints",
            Category::Projection => "projection",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = DiagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Category::all()
            .into_iter()
            .find(|c| c.name() == normalized)
            .ok_or_else(|| DiagError::UnknownCategory(s.to_string()))
    }
}

/// One registered checker.
#[derive(Clone, Copy)]
pub struct Checker {
    pub category: Category,
    pub name: &'static str,
    pub run: CheckFn,
}

impl Checker {
    /// `category.name`, the key used in reports.
    pub fn id(&self) -> String {
        format!("{}.{}", self.category.name(), self.name)
    }
}

impl std::fmt::Debug for Checker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checker")
            .field("category", &self.category)
            .field("name", &self.name)
            .finish()
    }
}

const fn checker(category: Category, name: &'static str, run: CheckFn) -> Checker {
    Checker {
        category,
        name,
        run,
    }
}

/// Every checker, in report order.
pub static CHECKERS: &[Checker] = &[
    checker(Category::Convergence, "td_error", convergence::td_error),
    checker(Category::Convergence, "global_max", convergence::global_max),
    checker(Category::Convergence, "bootstrap", convergence::bootstrap),
    checker(Category::Convergence, "q_updates", convergence::q_updates),
    checker(Category::Temporal, "pairing", temporal::pairing),
    checker(Category::Temporal, "reward", temporal::reward),
    checker(Category::Temporal, "sequence", temporal::sequence),
    checker(Category::Temporal, "buffer", temporal::buffer),
    checker(Category::GoalState, "evolution", goal_state::evolution),
    checker(Category::GoalState, "transitions", goal_state::transitions),
    checker(Category::GoalState, "visitation", goal_state::visitation),
    checker(Category::Constraints, "same_side", constraints::same_side),
    checker(Category::Constraints, "action_direction", constraints::action_direction),
    checker(Category::Constraints, "oscillation", constraints::oscillation),
    checker(Category::Projection, "application", projection::application),
    checker(Category::Projection, "on_trajectory", projection::on_trajectory),
    checker(Category::Projection, "effectiveness", projection::effectiveness),
    checker(Category::Projection, "coefficient", projection::coefficient),
];

pub fn checkers_in(category: Category) -> impl Iterator<Item = &'static Checker> {
    CHECKERS.iter().filter(move |c| c.category == category)
}

// ---------------------------------------------------------------------------
// Shared input helpers
// ---------------------------------------------------------------------------

/// Indices of samples that performed a Q-table update.
pub(crate) fn learning_samples(store: &LogStore) -> Result<Vec<usize>, StoreError> {
    let flag = store.try_field(fields::DEBUG_LEARNING)?;
    Ok(flag
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v == 1.0)
        .map(|(i, _)| i)
        .collect())
}

pub(crate) fn pct(fraction: f64) -> f64 {
    100.0 * fraction
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<String> = CHECKERS.iter().map(Checker::id).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn every_category_has_checkers() {
        for category in Category::all() {
            assert!(checkers_in(category).count() > 0, "{category} has no checkers");
        }
    }

    #[test]
    fn category_parses_loosely() {
        assert_eq!("goal-state".parse::<Category>().unwrap(), Category::GoalState);
        assert_eq!(" Temporal ".parse::<Category>().unwrap(), Category::Temporal);
        assert!("nope".parse::<Category>().is_err());
    }
}
