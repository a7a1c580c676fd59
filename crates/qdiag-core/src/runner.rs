//! Checker orchestration over one log.

use qdiag_store::LogStore;
use serde::{Deserialize, Serialize};

use crate::checks::{Category, CheckResult, CheckStatus, Checker, CHECKERS};
use crate::config::AnalysisConfig;
use crate::counters::COUNTERS;
use crate::goal::resolve_goal;
use crate::obs;

/// Result of one registered checker against one log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub category: Category,
    pub check: String,
    pub result: CheckResult,
}

impl CheckOutcome {
    pub fn id(&self) -> String {
        format!("{}.{}", self.category.name(), self.check)
    }

    pub fn status(&self) -> CheckStatus {
        self.result.status
    }
}

/// Run every checker, or only those of `only`, against `store`.
///
/// Goal indices are resolved once per log. A checker that fails to read its
/// inputs becomes an ERROR outcome naming the failure; the remaining
/// checkers still run.
pub fn run_checks(
    store: &LogStore,
    config: &AnalysisConfig,
    only: Option<Category>,
) -> Vec<CheckOutcome> {
    let config = resolve_goal(store, config);
    CHECKERS
        .iter()
        .filter(|c| only.map_or(true, |cat| c.category == cat))
        .map(|checker| run_one(checker, store, &config))
        .collect()
}

fn run_one(checker: &Checker, store: &LogStore, config: &AnalysisConfig) -> CheckOutcome {
    let id = checker.id();
    COUNTERS.inc_checks_run();
    let result = match (checker.run)(store, config) {
        Ok(result) => result,
        Err(e) => {
            COUNTERS.inc_checks_failed();
            obs::emit_check_failed(&id, &e);
            CheckResult::inconclusive(CheckStatus::Error, format!("checker failed: {e}"))
        }
    };
    obs::emit_check_finished(&id, result.status, result.issues.len());
    CheckOutcome {
        category: checker.category,
        check: checker.name.to_string(),
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdiag_store::fakes::MemorySource;
    use qdiag_store::fields;
    use serde_json::json;

    #[test]
    fn empty_log_runs_every_checker() {
        let store = MemorySource::new().into_store("empty");
        let outcomes = run_checks(&store, &AnalysisConfig::default(), None);
        assert_eq!(outcomes.len(), CHECKERS.len());
        assert!(outcomes.iter().all(|o| o.status() != CheckStatus::Error));
    }

    #[test]
    fn category_filter_limits_checkers() {
        let store = MemorySource::new().into_store("empty");
        let outcomes = run_checks(&store, &AnalysisConfig::default(), Some(Category::Projection));
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(|o| o.category == Category::Projection));
        assert_eq!(outcomes[0].id(), "projection.application");
    }

    #[test]
    fn failing_checker_becomes_error_and_run_continues() {
        let store = MemorySource::new()
            .with_raw(fields::Q_STATE_INDEX, vec![json!("not a number")])
            .into_store("bad");
        let outcomes = run_checks(&store, &AnalysisConfig::default(), Some(Category::Constraints));
        assert_eq!(outcomes.len(), 3);

        let same_side = &outcomes[0];
        assert_eq!(same_side.status(), CheckStatus::Error);
        assert!(same_side.result.issues[0].starts_with("checker failed:"));
        // action_direction does not read the state index
        assert_ne!(outcomes[1].status(), CheckStatus::Error);
    }

    #[test]
    fn long_multibyte_corrupt_field_is_error_not_crash() {
        let store = MemorySource::new()
            .with_raw(
                fields::Q_STATE_INDEX,
                vec![json!(50.0), json!("zażółć gęślą jaźń ".repeat(4))],
            )
            .with_field(fields::Q_ACTION_INDEX, [50.0, 50.0])
            .into_store("polish");
        let outcomes = run_checks(&store, &AnalysisConfig::default(), None);
        assert_eq!(outcomes.len(), CHECKERS.len());

        let same_side = outcomes
            .iter()
            .find(|o| o.id() == "constraints.same_side")
            .unwrap();
        assert_eq!(same_side.status(), CheckStatus::Error);
        assert!(same_side.result.issues[0].contains("..."));
        assert!(outcomes.iter().any(|o| o.status() != CheckStatus::Error));
    }

    #[test]
    fn detected_goal_is_used_when_enabled() {
        let store = MemorySource::new()
            .with_field(fields::DEBUG_GLOBAL_MAX_STATE, [30.0, 30.0, 31.0])
            .with_field(fields::DEBUG_GLOBAL_MAX_ACTION, [30.0, 30.0, 30.0])
            .with_field(fields::Q_STATE_INDEX, [40.0, 40.0])
            .with_field(fields::Q_ACTION_INDEX, [20.0, 35.0])
            .into_store("g");
        let config = AnalysisConfig {
            detect_goal: true,
            min_samples: 1,
            ..AnalysisConfig::default()
        };
        let outcomes = run_checks(&store, &config, Some(Category::Constraints));
        // goal 30: state 40 with action 20 violates, action 35 does not
        assert_eq!(outcomes[0].result.metrics["n_violations"], 1.0);
    }
}
