//! Display formatting for CLI output
//!
//! Provides structured display for:
//! - Validation reports grouped by problem kind
//! - Resolved parameters with their origin
//! - Per-step resource counts

use console::style;
use meshpack_plan::{InstallPlan, ReportEntry, ResolvedParameter, ValidationReport};
use std::collections::BTreeMap;

/// Display problems grouped by kind
pub fn display_report(report: &ValidationReport) {
    let mut by_kind: BTreeMap<&str, Vec<ReportEntry>> = BTreeMap::new();
    for entry in report.entries() {
        by_kind.entry(entry.kind).or_default().push(entry);
    }

    for (kind, entries) in by_kind {
        println!();
        println!("{}", style(kind).cyan().bold());

        for entry in entries {
            println!("  {} {}", style("✗").red(), entry.message);
            if let Some(help) = &entry.help {
                println!("    {} {}", style("hint:").blue(), help);
            }
        }
    }
}

/// Print summary line
pub fn print_summary(report: &ValidationReport) {
    let count = report.entries().len();
    if count > 0 {
        println!(
            "{} Validation failed: {}",
            style("✗").red().bold(),
            pluralize(count, "error", "errors")
        );
    } else {
        println!("{} Validation passed!", style("✓").green().bold());
    }
}

/// Parameters as YAML comments, one per line with their origin
pub fn format_parameters(parameters: &[ResolvedParameter]) -> String {
    let width = parameters.iter().map(|p| p.name.len()).max().unwrap_or(0);
    parameters
        .iter()
        .map(|p| {
            format!(
                "#   {:width$} = {}  ({})\n",
                p.name,
                p.display_value(),
                p.source,
                width = width
            )
        })
        .collect()
}

/// Values as YAML comments
pub fn format_values(yaml: &str) -> String {
    yaml.lines().map(|line| format!("#   {}\n", line)).collect()
}

/// One status line per step, on stderr
pub fn display_steps(plan: &InstallPlan) {
    for step in &plan.steps {
        eprintln!(
            "  {} {} ({})",
            style("→").blue(),
            style(&step.name).yellow(),
            pluralize(step.resources, "resource", "resources")
        );
    }
    let fragments = plan.layer_resources().count();
    if fragments > 0 {
        eprintln!(
            "  {} {} ({})",
            style("→").blue(),
            style("layers").yellow(),
            pluralize(fragments, "resource", "resources")
        );
    }
}

/// Format count with proper pluralization
pub fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}
