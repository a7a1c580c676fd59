//! qdiag CLI
//!
//! Command-line interface for diagnosing Q-learning controller logs.
//!
//! Usage:
//!   qdiag summary [FILE]            Full diagnostic report
//!   qdiag check <CATEGORY> [FILE]   Run one category of checks
//!   qdiag compare [BEFORE AFTER]    Compare two runs metric by metric
//!   qdiag inspect [FILE]            Show log structure
//!   qdiag bumpless [FILE]           Verify bumpless transfer

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::Level;

use qdiag_core::counters::COUNTERS;
use qdiag_core::reporting::{
    render_bumpless, render_combined, render_comparison, render_inspection, render_outcomes,
    render_report, write_report_json,
};
use qdiag_core::{
    analyze, analyze_all, inspect, obs, run_checks, verify_bumpless, AnalysisConfig, Category,
    ComparisonReport, QdiagConfig,
};
use qdiag_store::{LogKind, LogStore};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "qdiag.toml";

#[derive(Parser)]
#[command(name = "qdiag")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Offline diagnostics for Q-learning controller simulation logs", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit diagnostic logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "QDIAG_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the simulation logs
    #[arg(long, global = true, env = "QDIAG_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Goal state index (1-based)
    #[arg(long, global = true)]
    goal_state: Option<u32>,

    /// Goal action index (1-based)
    #[arg(long, global = true)]
    goal_action: Option<u32>,

    /// Infer the goal indices from the global-maximum location fields
    #[arg(long, global = true)]
    detect_goal: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every check and print a severity-grouped report
    Summary {
        /// Log file; all conventional logs in the log directory when omitted
        file: Option<PathBuf>,

        /// Also write the report as JSON to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the checks of one category
    Check {
        /// convergence, temporal, goal_state, constraints or projection
        category: String,

        /// Log file (default: the training log)
        file: Option<PathBuf>,
    },

    /// Compare metrics between two runs
    Compare {
        /// Baseline log (default: the before-learning log)
        #[arg(requires = "after")]
        before: Option<PathBuf>,

        /// Candidate log (default: the after-learning log)
        after: Option<PathBuf>,
    },

    /// Show field groups, episodes and instrumentation ranges
    Inspect {
        /// Log file (default: the training log)
        file: Option<PathBuf>,
    },

    /// Verify that the learned controller matches the baseline before training
    Bumpless {
        /// Log file (default: the before-learning log)
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    qdiag_core::init_tracing(cli.log_json, level);

    let config = resolve_config(&cli)?;
    let json = cli.json;

    let output = match cli.command {
        Commands::Summary { file, output } => {
            cmd_summary(&config, file.as_deref(), output.as_deref(), json)
        }
        Commands::Check { category, file } => cmd_check(&config, &category, file.as_deref(), json),
        Commands::Compare { before, after } => {
            cmd_compare(&config, before.as_deref(), after.as_deref(), json)
        }
        Commands::Inspect { file } => cmd_inspect(&config, file.as_deref(), json),
        Commands::Bumpless { file } => cmd_bumpless(&config, file.as_deref(), json),
    };

    COUNTERS.flush();
    println!("{}", output?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// File settings first, then command-line overrides.
fn resolve_config(cli: &Cli) -> Result<QdiagConfig> {
    let mut config = match &cli.config {
        Some(path) => QdiagConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            QdiagConfig::load(Path::new(DEFAULT_CONFIG_FILE))
                .with_context(|| format!("Failed to load config {DEFAULT_CONFIG_FILE}"))?
        }
        None => QdiagConfig::default(),
    };

    if let Some(dir) = &cli.log_dir {
        config.logs.dir = dir.clone();
    }
    apply_goal_overrides(
        &mut config.analysis,
        cli.goal_state,
        cli.goal_action,
        cli.detect_goal,
    );
    config
        .analysis
        .validate()
        .context("Invalid analysis settings")?;
    Ok(config)
}

fn apply_goal_overrides(
    analysis: &mut AnalysisConfig,
    goal_state: Option<u32>,
    goal_action: Option<u32>,
    detect_goal: bool,
) {
    if let Some(state) = goal_state {
        analysis.goal_state = state;
    }
    if let Some(action) = goal_action {
        analysis.goal_action = action;
    }
    if detect_goal {
        analysis.detect_goal = true;
    }
}

fn load_log(config: &QdiagConfig, file: Option<&Path>, default: LogKind) -> Result<LogStore> {
    let path = match file {
        Some(name) => config.logs.resolve(name),
        None => config.logs.path(default),
    };
    let store = LogStore::load(&path).with_context(|| format!("Failed to load {}", path.display()))?;

    COUNTERS.inc_logs_loaded();
    let summary = store.summary();
    obs::emit_log_loaded(
        &summary.name,
        summary.sample_count,
        summary.field_count,
        summary.has_instrumentation,
    );
    Ok(store)
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_summary(
    config: &QdiagConfig,
    file: Option<&Path>,
    output: Option<&Path>,
    json: bool,
) -> Result<String> {
    match file {
        Some(_) => {
            let store = load_log(config, file, LogKind::Training)?;
            let report = analyze(&store, &config.analysis);
            if let Some(path) = output {
                write_report_json(path, &report)?;
            }
            if json {
                to_json(&report)
            } else {
                Ok(render_report(&report))
            }
        }
        None => {
            let combined = analyze_all(&config.logs, &config.analysis)
                .context("Failed to analyze log directory")?;
            if let Some(path) = output {
                write_report_json(path, &combined)?;
            }
            if json {
                to_json(&combined)
            } else {
                Ok(render_combined(&combined))
            }
        }
    }
}

fn cmd_check(
    config: &QdiagConfig,
    category: &str,
    file: Option<&Path>,
    json: bool,
) -> Result<String> {
    let category: Category = category.parse()?;
    let store = load_log(config, file, LogKind::Training)?;
    let _span = obs::AnalysisSpan::enter(store.name());
    let outcomes = run_checks(&store, &config.analysis, Some(category));

    if json {
        to_json(&outcomes)
    } else {
        Ok(render_outcomes(store.name(), &outcomes))
    }
}

fn cmd_compare(
    config: &QdiagConfig,
    before: Option<&Path>,
    after: Option<&Path>,
    json: bool,
) -> Result<String> {
    let before = load_log(config, before, LogKind::Before)?;
    let after = load_log(config, after, LogKind::After)?;
    let report = ComparisonReport::build(&before, &after, &config.analysis);

    if json {
        to_json(&report)
    } else {
        Ok(render_comparison(&report))
    }
}

fn cmd_inspect(config: &QdiagConfig, file: Option<&Path>, json: bool) -> Result<String> {
    let store = load_log(config, file, LogKind::Training)?;
    let inspection = inspect(&store);

    if json {
        to_json(&inspection)
    } else {
        Ok(render_inspection(&inspection))
    }
}

fn cmd_bumpless(config: &QdiagConfig, file: Option<&Path>, json: bool) -> Result<String> {
    let store = load_log(config, file, LogKind::Before)?;
    let report = verify_bumpless(&store)
        .with_context(|| format!("Failed to read control signals from {}", store.name()))?;

    if json {
        to_json(&report)
    } else {
        Ok(render_bumpless(&report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdiag_store::fields;
    use serde_json::{Map, Value};

    fn log_of(columns: Vec<(&str, Vec<f64>)>) -> Value {
        let mut log = Map::new();
        for (name, values) in columns {
            log.insert(name.to_string(), Value::from(values));
        }
        Value::Object(log)
    }

    fn write_log(dir: &Path, name: &str, log: Value) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_string(&log).unwrap()).unwrap();
        path
    }

    fn training_log(n: usize) -> Value {
        let t: Vec<f64> = (1..=n).map(|i| i as f64 * 0.1).collect();
        let e: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let u = vec![20.0; n];
        let goal_q: Vec<f64> = (0..n).map(|i| 50.0 + i as f64 * 0.1).collect();
        log_of(vec![
            (fields::Q_TIME, t),
            (fields::Q_ERROR, e.clone()),
            (fields::Q_CONTROL, u.clone()),
            (fields::PI_ERROR, e),
            (fields::PI_CONTROL, u),
            (fields::DEBUG_GOAL_Q, goal_q),
        ])
    }

    fn config_for(dir: &Path) -> QdiagConfig {
        let mut config = QdiagConfig::default();
        config.logs.dir = dir.to_path_buf();
        config
    }

    #[test]
    fn cli_definition_is_valid_and_unbranded() {
        use clap::CommandFactory;
        let command = Cli::command();
        command.clone().debug_assert();
        assert_eq!(command.get_name(), "qdiag");
        assert!(command.get_author().is_none());
    }

    #[test]
    fn goal_overrides_replace_file_values() {
        let mut analysis = AnalysisConfig::default();
        apply_goal_overrides(&mut analysis, Some(40), None, true);
        assert_eq!(analysis.goal_state, 40);
        assert_eq!(analysis.goal_action, 50);
        assert!(analysis.detect_goal);
    }

    #[test]
    fn summary_of_single_file_writes_json_report() {
        let dir = tempfile::tempdir().unwrap();
        write_log(dir.path(), "logi_training.json", training_log(200));
        let out = dir.path().join("report.json");

        let text = cmd_summary(
            &config_for(dir.path()),
            Some(Path::new("logi_training.json")),
            Some(&out),
            false,
        )
        .unwrap();
        assert!(text.contains("logi_training"));

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written["schema_version"], "1.0");
        assert_eq!(written["log"]["sample_count"], 200);
    }

    #[test]
    fn summary_of_empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_summary(&config_for(dir.path()), None, None, false).unwrap_err();
        assert!(format!("{err:#}").contains("no logs found"));
    }

    #[test]
    fn check_rejects_unknown_category() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_check(&config_for(dir.path()), "bogus", None, false).unwrap_err();
        assert!(err.to_string().contains("unknown check category"));
    }

    #[test]
    fn check_runs_one_category_as_json() {
        let dir = tempfile::tempdir().unwrap();
        write_log(dir.path(), "logi_training.json", training_log(200));

        let text = cmd_check(&config_for(dir.path()), "convergence", None, true).unwrap();
        let outcomes: Value = serde_json::from_str(&text).unwrap();
        let outcomes = outcomes.as_array().unwrap();
        assert!(!outcomes.is_empty());
        assert!(outcomes.iter().all(|o| o["category"] == "convergence"));
    }

    #[test]
    fn compare_defaults_to_conventional_logs() {
        let dir = tempfile::tempdir().unwrap();
        write_log(dir.path(), "logi_before_learning.json", training_log(50));
        write_log(dir.path(), "logi_after_learning.json", training_log(50));

        let text = cmd_compare(&config_for(dir.path()), None, None, true).unwrap();
        let report: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(report["before"], "logi_before_learning");
        assert_eq!(report["after"], "logi_after_learning");
        assert_eq!(report["tally"]["regressed"], 0);
    }

    #[test]
    fn missing_log_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_inspect(&config_for(dir.path()), None, false).unwrap_err();
        assert!(err.to_string().contains("logi_training.json"));
    }

    #[test]
    fn bumpless_reports_phases() {
        let dir = tempfile::tempdir().unwrap();
        let n = 100;
        let disturbance: Vec<f64> = (0..n)
            .map(|i| if (40..70).contains(&i) { 0.3 } else { 0.0 })
            .collect();
        write_log(
            dir.path(),
            "logi_before_learning.json",
            log_of(vec![
                (fields::Q_CONTROL, vec![20.0; n]),
                (fields::PI_CONTROL, vec![20.0; n]),
                (fields::Q_DISTURBANCE, disturbance),
                (fields::Q_PROJECTION, vec![0.2; n]),
            ]),
        );

        let text = cmd_bumpless(&config_for(dir.path()), None, false).unwrap();
        assert!(text.contains("Phase 2 (disturbance)"));
    }
}
