//! Meshpack CLI - plan installations of service mesh applications

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

mod commands;
mod display;
mod error;
mod exit_codes;

use commands::PlanArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "meshpack")]
#[command(author = "Meshpack Contributors")]
#[command(version)]
#[command(about = "Plan installations of service mesh applications", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose an installation plan and print its manifests
    Render {
        #[command(flatten)]
        plan: PlanArgs,

        /// Output directory, one file per step (if not set, outputs to stdout)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Show rendered values and resolved parameters
        #[arg(long)]
        show_values: bool,
    },

    /// Check a request without rendering
    Validate {
        #[command(flatten)]
        plan: PlanArgs,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show application spec information
    Show {
        /// Application spec file (YAML)
        spec: PathBuf,

        /// Show a single version in detail
        #[arg(long = "version", value_name = "VERSION")]
        app_version: Option<String>,

        /// Show every version in detail
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let result = match &cli.command {
        Commands::Render {
            plan,
            output_dir,
            show_values,
        } => commands::render::run(plan, output_dir.as_deref(), *show_values).await,

        Commands::Validate { plan, json } => commands::validate::run(plan, *json).await,

        Commands::Show {
            spec,
            app_version,
            all,
        } => commands::show::run(spec, app_version.as_deref(), *all),
    };

    match result {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => report(err),
    }
}

fn report(err: CliError) -> ExitCode {
    let code = err.exit_code();
    // Validation problems were already listed by the command
    if !matches!(err, CliError::ValidationFailed { .. }) {
        eprintln!("{:?}", miette::Report::new(err));
    }
    ExitCode::from(code as u8)
}
