//! Console rendering and JSON artifact writers.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::bumpless::BumplessReport;
use crate::checks::CheckStatus;
use crate::compare::ComparisonReport;
use crate::inspect::Inspection;
use crate::report::{CombinedReport, DiagnosticReport, ReportEntry};
use crate::runner::CheckOutcome;

const RULE: &str = "======================================================================";

fn banner(out: &mut String, title: &str) {
    let _ = writeln!(out, "{RULE}\n{title}\n{RULE}");
}

fn entries(out: &mut String, title: &str, list: &[ReportEntry]) {
    if list.is_empty() {
        return;
    }
    banner(out, title);
    for (i, e) in list.iter().enumerate() {
        let _ = writeln!(out, "{}. [{}]\n   {}", i + 1, e.check, e.message);
    }
    out.push('\n');
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        format!("{v:.4}")
    }
}

/// Full severity-grouped report for one log.
pub fn render_report(report: &DiagnosticReport) -> String {
    let mut out = String::new();
    banner(&mut out, &format!("DIAGNOSTIC SUMMARY: {}", report.log.name));
    let _ = writeln!(
        out,
        "Generated: {}\nSamples:   {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.log.sample_count
    );
    let _ = writeln!(
        out,
        "Errors:   {}\nWarnings: {}\nInfo:     {}\n",
        report.errors.len(),
        report.warnings.len(),
        report.info.len()
    );

    entries(&mut out, "ERRORS (must fix)", &report.errors);
    entries(&mut out, "WARNINGS (should review)", &report.warnings);

    if !report.key_metrics.is_empty() {
        banner(&mut out, "KEY METRICS");
        for m in &report.key_metrics {
            let _ = writeln!(out, "  {}: {:.2} (expected {})", m.label, m.value, m.expected);
        }
        out.push('\n');
    }

    if !report.recommendations.is_empty() {
        banner(&mut out, "RECOMMENDATIONS");
        for (i, r) in report.recommendations.iter().enumerate() {
            let _ = writeln!(out, "{}. [priority {}] {}", i + 1, r.priority, r.message);
        }
        out.push('\n');
    }

    banner(&mut out, "OVERALL STATUS");
    out.push_str(match report.overall {
        CheckStatus::Error => "✗ CRITICAL ISSUES DETECTED\n",
        CheckStatus::Warning => "! POTENTIAL ISSUES DETECTED\n",
        CheckStatus::Ok | CheckStatus::Info => "✓ NO MAJOR ISSUES DETECTED\n",
    });
    out
}

/// Per-check listing, used by `qdiag check`.
pub fn render_outcomes(log: &str, outcomes: &[CheckOutcome]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Log: {log}");
    for o in outcomes {
        let _ = writeln!(out, "\n{} {}", o.status().symbol(), o.id());
        let _ = writeln!(out, "{}", "-".repeat(50));
        for (key, value) in &o.result.metrics {
            let _ = writeln!(out, "  {key}: {}", format_value(*value));
        }
        for (key, value) in &o.result.details {
            let _ = writeln!(out, "  {key}: {value}");
        }
        if o.result.issues.is_empty() && o.status() == CheckStatus::Ok {
            out.push_str("  no issues detected\n");
        }
        for issue in &o.result.issues {
            let _ = writeln!(out, "  - {issue}");
        }
    }
    out
}

/// Short per-log lines, followed by the full report of the primary log.
pub fn render_combined(combined: &CombinedReport) -> String {
    let mut out = String::new();
    banner(&mut out, "COMBINED ANALYSIS SUMMARY");
    for (kind, report) in &combined.reports {
        let _ = writeln!(
            out,
            "{} ({}): errors {}, warnings {}",
            kind.label().to_uppercase(),
            report.log.name,
            report.errors.len(),
            report.warnings.len()
        );
        if let Some(q) = report.metric("goal_state.evolution.final_value") {
            let _ = writeln!(out, "  Q(goal,goal): {q:.2}");
        }
    }
    out.push('\n');
    if let Some((_, primary)) = combined.primary() {
        out.push_str(&render_report(primary));
    }
    out
}

pub fn render_comparison(report: &ComparisonReport) -> String {
    let mut out = String::new();
    banner(
        &mut out,
        &format!("COMPARISON: {} -> {}", report.before, report.after),
    );
    let _ = writeln!(
        out,
        "{:<26} {:>12} {:>12} {:>12} {:>9}",
        "metric", "before", "after", "diff", "change"
    );
    for c in &report.metrics {
        let change = c
            .pct_change
            .map_or_else(|| "n/a".to_string(), |p| format!("{p:+.1}%"));
        let _ = writeln!(
            out,
            "{} {:<24} {:>12.4} {:>12.4} {:>+12.4} {:>9}",
            c.outcome.symbol(),
            c.metric,
            c.before,
            c.after,
            c.diff,
            change
        );
    }
    let t = &report.tally;
    let _ = writeln!(
        out,
        "\nimproved {}, regressed {}, unchanged {}, not ranked {}",
        t.improved, t.regressed, t.unchanged, t.not_ranked
    );

    if !report.controllers.is_empty() {
        let _ = writeln!(out, "\nLearned vs baseline ({}):", report.after);
        for c in &report.controllers {
            let ratio = c
                .ratio
                .map_or_else(|| "n/a".to_string(), |r| format!("{r:.3}"));
            let _ = writeln!(
                out,
                "  {:<20} learned {:>10.4}  baseline {:>10.4}  ratio {:>7}  {}",
                c.measure,
                c.learned,
                c.baseline,
                ratio,
                if c.learned_better { "learned better" } else { "baseline better" }
            );
        }
    }
    out
}

pub fn render_bumpless(report: &BumplessReport) -> String {
    let mut out = String::new();
    banner(&mut out, &format!("BUMPLESS TRANSFER: {}", report.log));
    for p in &report.phases {
        let (mean_limit, max_limit) = p.phase.limits();
        let _ = writeln!(
            out,
            "{} {}\n  samples {}..{} (n={})\n  |u_Q - u_PI|: mean {:.3}, std {:.3}, max {:.3} (limits: mean < {mean_limit}, max < {max_limit})",
            if p.passed { "✓" } else { "✗" },
            p.phase.label(),
            p.start,
            p.end,
            p.samples(),
            p.mean,
            p.std,
            p.max
        );
    }
    if let Some(a) = &report.projection {
        let _ = writeln!(
            out,
            "\nProjection activity in tracking phase: {}/{} samples ({:.1}%), mean |projection| {:.4}",
            a.active,
            a.total,
            100.0 * a.rate(),
            a.mean_abs
        );
    }
    for w in &report.warnings {
        let _ = writeln!(out, "! {w}");
    }
    let _ = writeln!(
        out,
        "\n{}",
        if report.passed() {
            "✓ all phases meet the bumpless transfer criteria"
        } else {
            "✗ bumpless transfer criteria not met"
        }
    );
    out
}

pub fn render_inspection(inspection: &Inspection) -> String {
    let s = &inspection.summary;
    let mut out = String::new();
    banner(&mut out, &format!("LOG: {}", s.name));
    if let Some(path) = &s.path {
        let _ = writeln!(out, "Path:            {}", path.display());
    }
    if let Some(digest) = &s.digest {
        let _ = writeln!(out, "Digest:          {digest}");
    }
    let _ = writeln!(
        out,
        "Samples:         {}\nFields:          {}\nTime range:      {:.2} - {:.2} s\nInstrumentation: {}",
        s.sample_count,
        s.field_count,
        s.time_start,
        s.time_end,
        if s.has_instrumentation { "present" } else { "absent" }
    );

    out.push_str("\nField groups:\n");
    for g in &inspection.groups {
        let _ = writeln!(out, "  {:<14} {}/{}", g.group, g.present.len(), g.known);
    }

    let _ = writeln!(out, "\nEpisodes: {}", inspection.episodes.len());
    for (i, e) in inspection.episodes.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}: samples {}..={} (n={})",
            i + 1,
            e.start,
            e.end,
            e.sample_count()
        );
    }

    if !inspection.active_ranges.is_empty() {
        out.push_str("\nActive instrumentation ranges:\n");
        for (field, (first, last)) in &inspection.active_ranges {
            let _ = writeln!(out, "  {field:<30} {first}..={last}");
        }
    }

    match &inspection.detected_goal {
        Some(g) => {
            let _ = writeln!(
                out,
                "\nDetected goal: state {} ({:.1}%), action {} ({:.1}%)",
                g.state,
                100.0 * g.state_share,
                g.action,
                100.0 * g.action_share
            );
        }
        None => out.push_str("\nDetected goal: none (no global-maximum data)\n"),
    }
    out
}

/// Write any report as pretty JSON.
pub fn write_report_json<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    tracing::debug!(path = %path.display(), "report written");
    Ok(())
}
