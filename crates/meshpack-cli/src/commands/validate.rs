//! Validate command - run every check of a plan without rendering

use console::style;

use super::PlanArgs;
use crate::display::{display_report, print_summary};
use crate::error::{CliError, Result};

pub async fn run(args: &PlanArgs, json_output: bool) -> Result<()> {
    let (resolver, request) = args.prepare().await?;

    if !json_output {
        println!(
            "{} {} {}",
            style("Validating").bold(),
            style(&request.application).cyan(),
            request.version
        );
    }

    let report = resolver.validate(&request).await;
    let entries = report.entries();

    if json_output {
        let output = serde_json::json!({
            "valid": report.is_valid(),
            "application": request.application,
            "version": request.version,
            "errors": &entries,
        });
        let text = serde_json::to_string_pretty(&output).map_err(|e| CliError::Io {
            message: e.to_string(),
        })?;
        println!("{}", text);
    } else {
        display_report(&report);
        println!();
        print_summary(&report);
    }

    if report.is_valid() {
        Ok(())
    } else {
        Err(CliError::ValidationFailed {
            errors: entries.len(),
        })
    }
}
