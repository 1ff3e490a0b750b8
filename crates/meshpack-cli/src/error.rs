//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use meshpack_plan::PlanError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Planning rejected the request
    #[error(transparent)]
    #[diagnostic(transparent)]
    Plan(#[from] PlanError),

    /// A validate run found problems; they were already printed
    #[error("Validation failed with {errors} error(s)")]
    #[diagnostic(code(meshpack::cli::validation))]
    ValidationFailed { errors: usize },

    /// Invalid arguments that clap cannot catch
    #[error("{message}")]
    #[diagnostic(code(meshpack::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Could not reach the cluster
    #[error("Cluster error: {message}")]
    #[diagnostic(
        code(meshpack::cli::cluster),
        help("check your kubeconfig, or drop --cluster to plan offline")
    )]
    Cluster { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(meshpack::cli::io))]
    Io { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Plan(err) => plan_exit_code(err),
            CliError::ValidationFailed { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Cluster { .. } => exit_codes::ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
        }
    }

    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: None,
        }
    }

    /// Create a usage error with help text
    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

fn plan_exit_code(err: &PlanError) -> i32 {
    match err {
        PlanError::TemplatingFailed { .. } => exit_codes::TEMPLATE_ERROR,
        PlanError::Spec { .. }
        | PlanError::ApplicationNotFound { .. }
        | PlanError::VersionNotFound { .. }
        | PlanError::NoInstallSourceDefined { .. } => exit_codes::SPEC_ERROR,
        PlanError::Cluster { .. } | PlanError::Cancelled { .. } => exit_codes::ERROR,
        _ => exit_codes::VALIDATION_ERROR,
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<meshpack_core::CoreError> for CliError {
    fn from(err: meshpack_core::CoreError) -> Self {
        CliError::Plan(err.into())
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
