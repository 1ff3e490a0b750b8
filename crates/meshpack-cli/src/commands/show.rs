//! Show command - display application spec information

use console::style;
use meshpack_core::{
    ApplicationSpec, InstallSource, InstallationSpec, Parameter, VersionedApplicationSpec,
};
use meshpack_plan::error::suggest;
use meshpack_plan::PlanError;
use std::path::Path;

use crate::error::Result;

pub fn run(path: &Path, version: Option<&str>, show_all: bool) -> Result<()> {
    let spec = ApplicationSpec::from_file(path)?;
    spec.ensure_valid()?;

    let title = spec.display_name.as_deref().unwrap_or(&spec.name);
    println!("{}", style(title).cyan().bold());
    println!("{}", style("=".repeat(title.len())).dim());
    println!();

    println!("{}: {}", style("Name").bold(), spec.name);
    println!("{}: {:?}", style("Type").bold(), spec.app_type);
    if let Some(desc) = &spec.description {
        println!("{}: {}", style("Description").bold(), desc);
    }
    if let Some(docs) = &spec.documentation_url {
        println!("{}: {}", style("Docs").bold(), docs);
    }
    if let Some(repo) = &spec.repository_url {
        println!("{}: {}", style("Repository").bold(), repo);
    }

    let selected: Vec<&VersionedApplicationSpec> = match version {
        Some(v) => {
            let found = spec.find_version(v).ok_or_else(|| PlanError::VersionNotFound {
                application: spec.name.clone(),
                version: v.to_string(),
                help: suggest(v, spec.version_names()),
            })?;
            vec![found]
        }
        None if show_all => spec.versions.iter().collect(),
        None => {
            println!();
            println!("{}:", style("Versions").bold());
            for v in &spec.versions {
                println!("  - {}", v.version);
            }
            return Ok(());
        }
    };

    for v in selected {
        show_version(v);
    }
    Ok(())
}

fn show_version(version: &VersionedApplicationSpec) {
    println!();
    println!("{} {}", style("Version").bold(), style(&version.version).green().bold());

    match &version.install {
        Some(install) => println!("  {}: {}", style("Install").bold(), describe(install)),
        None => println!("  {}: {}", style("Install").bold(), style("none").red()),
    }

    if !version.required_labels.is_empty() {
        let labels: Vec<String> = version
            .required_labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        println!("  {}: {}", style("Required labels").bold(), labels.join(", "));
    }
    if version.respect_manifest_namespaces {
        println!("  {}: kept", style("Manifest namespaces").bold());
    }

    show_parameters("  ", &version.parameters);

    for flavor in &version.flavors {
        println!("  {} {}", style("Flavor").bold(), style(&flavor.name).yellow());
        for set in &flavor.requirement_sets {
            println!("    requires {}", set);
        }
        show_parameters("    ", &flavor.parameters);

        for layer in &flavor.customization_layers {
            let marker = if layer.optional { " (optional)" } else { "" };
            println!("    {} {}{}", style("Layer").bold(), layer.id, marker);
            for option in &layer.options {
                println!("      - {}", option.id);
                for dependency in &option.resource_dependencies {
                    println!("          needs {}", dependency);
                }
                show_parameters("          ", &option.parameters);
            }
        }
    }
}

fn show_parameters(indent: &str, parameters: &[Parameter]) {
    for parameter in parameters {
        let default = parameter
            .default
            .as_ref()
            .map(|d| d.display_literal())
            .unwrap_or_default();
        let required = if parameter.required { " required" } else { "" };
        println!(
            "{}{} {} ({}{}) = {:?}",
            indent,
            style("param").dim(),
            parameter.name,
            parameter.value_type(),
            required,
            default
        );
    }
}

fn describe(install: &InstallationSpec) -> String {
    match install {
        InstallationSpec::ChartDirectory(dir) => {
            InstallSource::ChartDirectory(dir.clone()).describe()
        }
        InstallationSpec::ChartArchive(archive) => {
            InstallSource::ChartArchive(archive.clone()).describe()
        }
        InstallationSpec::ManifestsArchive(archive) => {
            InstallSource::ManifestsArchive(archive.clone()).describe()
        }
        InstallationSpec::InstallationSteps(steps) => {
            let names: Vec<&str> = steps.steps.iter().map(|s| s.name.as_str()).collect();
            format!("steps [{}]", names.join(", "))
        }
    }
}
