//! Human and JSON rendering of plans, install reports, status and module lists.

use crate::orchestrator::{
    InstallationPlan, InstallationReport, ModuleSummary, StatusRow, TargetOutcome, TargetReport,
};
use crate::ledger::InstallStatus;
use crate::runner::{RunOutcome, RunResult};
use anyhow::Result;
use clap::ValueEnum;
use console::style;
use itertools::Itertools;
use serde_json::{Value, json};
use std::fmt::Write;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

pub fn render_plan(plan: &InstallationPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Plan for {} (order: {})",
        style(&plan.module).bold(),
        plan.order.join(" → ")
    );

    if plan.steps.is_empty() {
        let _ = writeln!(out, "  No targets selected");
        return out;
    }

    let mut current_target = None;
    for step in &plan.steps {
        if current_target != Some(&step.target_key) {
            let _ = writeln!(out, "\n{}", style(&step.target_key).cyan());
            current_target = Some(&step.target_key);
        }

        if step.pending.is_empty() {
            let _ = writeln!(out, "  {} {} up to date", style("✓").green(), step.module);
        } else {
            let _ = writeln!(
                out,
                "  {} {} ({} pending)",
                style("→").yellow(),
                step.module,
                step.pending.len()
            );
            for unit in &step.pending {
                let _ = writeln!(out, "      {}", unit);
            }
        }
    }

    let _ = writeln!(out, "\n{} units pending", plan.pending_count());
    out
}

pub fn render_report(report: &InstallationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Install {} (order: {})",
        style(&report.module).bold(),
        report.order.join(" → ")
    );

    if report.targets.is_empty() {
        let _ = writeln!(out, "  No targets selected");
    }

    for target in &report.targets {
        let _ = writeln!(
            out,
            "\n{} {}",
            outcome_marker(target.outcome()),
            style(&target.target_key).cyan()
        );
        for run in &target.runs {
            let _ = writeln!(out, "  {}", render_run(run));
        }
    }

    let failed = report
        .targets
        .iter()
        .filter(|t| t.outcome() != TargetOutcome::Succeeded)
        .count();
    let _ = writeln!(out);
    if failed == 0 {
        let _ = writeln!(
            out,
            "{} {} targets succeeded",
            style("✓").green(),
            report.targets.len()
        );
    } else {
        let _ = writeln!(
            out,
            "{} {} of {} targets did not succeed",
            style("✗").red(),
            failed,
            report.targets.len()
        );
    }
    out
}

fn outcome_marker(outcome: TargetOutcome) -> console::StyledObject<&'static str> {
    match outcome {
        TargetOutcome::Succeeded => style("✓").green(),
        TargetOutcome::Failed => style("✗").red(),
        TargetOutcome::Blocked | TargetOutcome::Cancelled => style("⚠").yellow(),
    }
}

fn render_run(run: &RunResult) -> String {
    match &run.outcome {
        RunOutcome::Applied => format!(
            "{} {}: applied {} ({})",
            style("✓").green(),
            run.module,
            run.applied.join(", "),
            format_duration(run.duration)
        ),
        RunOutcome::UpToDate => format!("{} {}: up to date", style("✓").green(), run.module),
        RunOutcome::Failed { unit_id, error } => {
            let mut line = format!("{} {}: failed", style("✗").red(), run.module);
            if let Some(unit_id) = unit_id {
                let _ = write!(line, " at {}", unit_id);
            }
            if !run.applied.is_empty() {
                let _ = write!(line, " after applying {}", run.applied.join(", "));
            }
            let _ = write!(line, "\n      {}", style(error.to_string()).red());
            line
        }
        RunOutcome::Cancelled => {
            let mut line = format!("{} {}: cancelled", style("⚠").yellow(), run.module);
            if !run.applied.is_empty() {
                let _ = write!(line, " after applying {}", run.applied.join(", "));
            }
            line
        }
        RunOutcome::Blocked { by } => format!(
            "{} {}: blocked by {}",
            style("⚠").yellow(),
            run.module,
            by
        ),
    }
}

pub fn render_status(rows: &[StatusRow]) -> String {
    let mut out = String::new();
    if rows.is_empty() {
        let _ = writeln!(out, "No targets selected");
        return out;
    }

    let module_width = rows.iter().map(|r| r.module.len()).max().unwrap_or(0);

    for (target_key, target_rows) in &rows.iter().chunk_by(|r| r.target_key.as_str()) {
        let _ = writeln!(out, "{}", style(target_key).cyan());
        for row in target_rows {
            let marker = match row.status {
                InstallStatus::FullyInstalled => style("✓").green(),
                InstallStatus::PartiallyInstalled => style("⚠").yellow(),
                InstallStatus::NotInstalled => style("✗").red(),
            };
            let _ = writeln!(
                out,
                "  {} {:<mw$}  {} ({}/{})",
                marker,
                row.module,
                row.status,
                row.applied,
                row.declared,
                mw = module_width,
            );
        }
    }
    out
}

pub fn render_module_list(modules: &[ModuleSummary]) -> String {
    let mut out = String::new();
    if modules.is_empty() {
        let _ = writeln!(out, "No modules found");
        return out;
    }

    for module in modules {
        let _ = write!(
            out,
            "{} {} ({} landlord, {} tenant units)",
            style(&module.name).bold(),
            module.version,
            module.landlord_units,
            module.tenant_units
        );
        if !module.dependencies.is_empty() {
            let _ = write!(out, " requires {}", module.dependencies.join(", "));
        }
        let _ = writeln!(out);
        if module.display_name != module.name {
            let _ = writeln!(out, "    {}", style(&module.display_name).dim());
        }
    }
    out
}

pub fn report_to_json(report: &InstallationReport) -> Value {
    json!({
        "module": report.module,
        "order": report.order,
        "succeeded": report.succeeded(),
        "targets": report.targets.iter().map(target_to_json).collect::<Vec<_>>(),
    })
}

fn target_to_json(target: &TargetReport) -> Value {
    json!({
        "target": target.target_key,
        "outcome": target.outcome(),
        "runs": target.runs.iter().map(run_to_json).collect::<Vec<_>>(),
    })
}

fn run_to_json(run: &RunResult) -> Value {
    let mut value = json!({
        "module": run.module,
        "outcome": run.outcome.label(),
        "applied": run.applied,
        "skipped": run.skipped(),
        "duration_ms": run.duration.as_millis() as u64,
    });

    match &run.outcome {
        RunOutcome::Failed { unit_id, error } => {
            value["failed_at"] = json!(unit_id);
            value["error"] = json!(error.to_string());
        }
        RunOutcome::Blocked { by } => {
            value["blocked_by"] = json!(by);
        }
        _ => {}
    }
    value
}

/// Print either the human rendering or the JSON document
pub fn emit<T: serde::Serialize>(format: OutputFormat, human: impl FnOnce() -> String, json: &T) -> Result<()> {
    match format {
        OutputFormat::Human => print!("{}", human()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(json)?),
    }
    Ok(())
}

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let millis = d.subsec_millis();

    if total_secs == 0 {
        format!("{}ms", millis)
    } else if total_secs < 60 {
        if millis > 0 {
            format!("{}.{}s", total_secs, millis / 100)
        } else {
            format!("{}s", total_secs)
        }
    } else {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        if secs > 0 {
            format!("{}m{}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    }
}
