//! Render command - compose an installation plan and print its manifests

use console::style;
use meshpack_core::{Resource, to_manifest};
use meshpack_plan::{CancelSignal, InstallPlan};
use std::fs;
use std::path::Path;

use super::PlanArgs;
use crate::display::{display_steps, format_parameters, format_values, pluralize};
use crate::error::Result;

pub async fn run(args: &PlanArgs, output_dir: Option<&Path>, show_values: bool) -> Result<()> {
    let (resolver, request) = args.prepare().await?;

    let cancel = CancelSignal::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, stopping before the next step");
                cancel.cancel();
            }
        })
    };
    let result = resolver.resolve_with_cancel(&request, &cancel).await;
    watcher.abort();
    let plan = result?;

    eprintln!(
        "{} Planned {} {} into {}",
        style("✓").green().bold(),
        style(&plan.application).bold(),
        plan.version,
        style(&plan.namespace).cyan()
    );
    display_steps(&plan);

    if show_values {
        println!("{}", style("# Computed Values").cyan().bold());
        print!("{}", format_values(&redacted_values(&plan)?));
        println!("{}", style("# Parameters").cyan().bold());
        print!("{}", format_parameters(&plan.parameters));
    }

    match output_dir {
        Some(dir) => write_steps(&plan, dir),
        None => {
            print!("{}", plan.to_manifest()?);
            Ok(())
        }
    }
}

/// Rendered values with secret parameter values masked
fn redacted_values(plan: &InstallPlan) -> Result<String> {
    let mut values = plan.values.clone();
    for parameter in plan.parameters.iter().filter(|p| p.secret) {
        values.set(&parameter.name, parameter.display_value().into())?;
    }
    Ok(values.to_yaml()?)
}

/// One file per step, numbered in apply order, then the layer fragments
fn write_steps(plan: &InstallPlan, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;

    let mut files: Vec<(String, Vec<Resource>)> = plan
        .steps
        .iter()
        .map(|step| {
            let resources = plan.resources_for_step(&step.name).cloned().collect();
            (step.name.clone(), resources)
        })
        .collect();
    let fragments: Vec<Resource> = plan.layer_resources().cloned().collect();
    if !fragments.is_empty() {
        files.push(("layers".to_string(), fragments));
    }

    for (index, (name, resources)) in files.iter().enumerate() {
        let path = dir.join(format!("{:02}-{}.yaml", index + 1, name));
        fs::write(&path, to_manifest(resources)?)?;
        eprintln!(
            "{} {} ({})",
            style("wrote").green(),
            path.display(),
            pluralize(resources.len(), "resource", "resources")
        );
    }

    Ok(())
}
