//! Planning errors
//!
//! Every way a plan can be rejected is one [`PlanError`] variant. Checks that
//! accumulate problems fold them with [`PlanError::from_errors`]: a single
//! problem is returned as itself, several as [`PlanError::Validation`].

use meshpack_core::CoreError;
use meshpack_engine::EngineError;
use meshpack_kube::KubeError;
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

/// Result type for planning operations
pub type Result<T> = std::result::Result<T, PlanError>;

#[derive(Error, Debug, Diagnostic)]
pub enum PlanError {
    #[error("application '{name}' not found")]
    #[diagnostic(code(meshpack::plan::application_not_found))]
    ApplicationNotFound {
        name: String,
        #[help]
        help: Option<String>,
    },

    #[error("version '{version}' of application '{application}' not found")]
    #[diagnostic(code(meshpack::plan::version_not_found))]
    VersionNotFound {
        application: String,
        version: String,
        #[help]
        help: Option<String>,
    },

    #[error("flavor '{flavor}' not found in version '{version}'")]
    #[diagnostic(code(meshpack::plan::flavor_not_found))]
    FlavorNotFound {
        version: String,
        flavor: String,
        #[help]
        help: Option<String>,
    },

    #[error("flavor '{flavor}' is not compatible with the target runtime; unmet: {}", unmet.join(" | "))]
    #[diagnostic(
        code(meshpack::plan::flavor_incompatible),
        help("pass --mesh/--mesh-version for a runtime that satisfies one requirement set")
    )]
    FlavorIncompatible { flavor: String, unmet: Vec<String> },

    #[error("layer '{layer}' not found")]
    #[diagnostic(code(meshpack::plan::layer_not_found))]
    LayerNotFound {
        layer: String,
        #[help]
        help: Option<String>,
    },

    #[error("option '{option}' not found in layer '{layer}'")]
    #[diagnostic(code(meshpack::plan::layer_option_not_found))]
    LayerOptionNotFound {
        layer: String,
        option: String,
        #[help]
        help: Option<String>,
    },

    #[error("layer '{layer}' is not optional and no option was selected")]
    #[diagnostic(code(meshpack::plan::layer_selection_required))]
    LayerSelectionRequired {
        layer: String,
        #[help]
        help: Option<String>,
    },

    #[error("layer option '{layer}:{option}' requires {dependency} in namespace '{namespace}'")]
    #[diagnostic(code(meshpack::plan::missing_dependency))]
    MissingDependency {
        layer: String,
        option: String,
        dependency: String,
        namespace: String,
    },

    #[error("parameter '{name}' is required but has no value")]
    #[diagnostic(
        code(meshpack::plan::missing_required_parameter),
        help("supply it with --set {name}=<value>")
    )]
    MissingRequiredParameter { name: String },

    #[error("parameter '{name}' expects a {expected} value, got '{value}'")]
    #[diagnostic(code(meshpack::plan::invalid_parameter_value))]
    InvalidParameterValue {
        name: String,
        expected: String,
        value: String,
    },

    #[error("secret '{name}' has no key '{key}' in namespace '{namespace}'")]
    #[diagnostic(code(meshpack::plan::secret_not_found))]
    SecretNotFound {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("cannot read {reference}: {message}")]
    #[diagnostic(code(meshpack::plan::secret_source_unavailable))]
    SecretSourceUnavailable { reference: String, message: String },

    #[error("templating failed in '{step}': {message}")]
    #[diagnostic(code(meshpack::plan::templating_failed))]
    TemplatingFailed {
        step: String,
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("version '{version}' defines no install source")]
    #[diagnostic(
        code(meshpack::plan::no_install_source),
        help("set exactly one of chartDirectory, chartArchive, manifestsArchive or installationSteps under `install`")
    )]
    NoInstallSourceDefined { version: String },

    #[error("invalid version '{version}': {message}")]
    #[diagnostic(code(meshpack::plan::invalid_version))]
    InvalidVersion { version: String, message: String },

    #[error("planning cancelled before '{next_step}'")]
    #[diagnostic(code(meshpack::plan::cancelled))]
    Cancelled { next_step: String },

    #[error("cluster query failed: {message}")]
    #[diagnostic(code(meshpack::plan::cluster))]
    Cluster { message: String },

    #[error("invalid application spec: {message}")]
    #[diagnostic(code(meshpack::plan::spec))]
    Spec { message: String },

    #[error("{} problems found", errors.len())]
    #[diagnostic(code(meshpack::plan::validation))]
    Validation {
        #[related]
        errors: Vec<PlanError>,
    },
}

impl PlanError {
    /// Fold accumulated errors: none is `None`, one is itself, more is `Validation`
    pub fn from_errors(mut errors: Vec<PlanError>) -> Option<PlanError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(PlanError::Validation { errors }),
        }
    }

    /// Stable name of the variant, used in machine-readable reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApplicationNotFound { .. } => "ApplicationNotFound",
            Self::VersionNotFound { .. } => "VersionNotFound",
            Self::FlavorNotFound { .. } => "FlavorNotFound",
            Self::FlavorIncompatible { .. } => "FlavorIncompatible",
            Self::LayerNotFound { .. } => "LayerNotFound",
            Self::LayerOptionNotFound { .. } => "LayerOptionNotFound",
            Self::LayerSelectionRequired { .. } => "LayerSelectionRequired",
            Self::MissingDependency { .. } => "MissingDependency",
            Self::MissingRequiredParameter { .. } => "MissingRequiredParameter",
            Self::InvalidParameterValue { .. } => "InvalidParameterValue",
            Self::SecretNotFound { .. } => "SecretNotFound",
            Self::SecretSourceUnavailable { .. } => "SecretSourceUnavailable",
            Self::TemplatingFailed { .. } => "TemplatingFailed",
            Self::NoInstallSourceDefined { .. } => "NoInstallSourceDefined",
            Self::InvalidVersion { .. } => "InvalidVersion",
            Self::Cancelled { .. } => "Cancelled",
            Self::Cluster { .. } => "Cluster",
            Self::Spec { .. } => "Spec",
            Self::Validation { .. } => "Validation",
        }
    }

    /// The individual problems: the nested list for `Validation`, else itself
    pub fn problems(&self) -> Vec<&PlanError> {
        match self {
            Self::Validation { errors } => errors.iter().flat_map(PlanError::problems).collect(),
            other => vec![other],
        }
    }

    pub(crate) fn templating(step: &str, err: EngineError) -> Self {
        let help = match &err {
            EngineError::Template(template) => template.suggestion.clone(),
            _ => None,
        };
        Self::TemplatingFailed {
            step: step.to_string(),
            message: err.to_string(),
            help,
        }
    }
}

impl From<KubeError> for PlanError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::SecretNotFound {
                namespace,
                name,
                key,
            } => Self::SecretNotFound {
                namespace,
                name,
                key,
            },
            KubeError::SecretSourceUnavailable { reference, message } => {
                Self::SecretSourceUnavailable { reference, message }
            }
            other => Self::Cluster {
                message: other.to_string(),
            },
        }
    }
}

impl From<CoreError> for PlanError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidVersion { version, message } => {
                Self::InvalidVersion { version, message }
            }
            other => Self::Spec {
                message: other.to_string(),
            },
        }
    }
}

/// "did you mean" help for a name that was not found
pub fn suggest<'a, I>(input: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let candidates: Vec<&str> = candidates.into_iter().collect();
    if candidates.is_empty() {
        return None;
    }

    let closest = candidates
        .iter()
        .map(|c| (*c, strsim::jaro_winkler(input, c)))
        .filter(|(_, score)| *score >= 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1));

    Some(match closest {
        Some((candidate, _)) => format!("did you mean '{}'?", candidate),
        None => format!("available: {}", candidates.join(", ")),
    })
}

/// Everything that would reject a request, without rendering
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<PlanError>,
}

/// One line of a machine-readable report
#[derive(Debug, Serialize)]
pub struct ReportEntry {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fold into a result, as `resolve` would report it
    pub fn into_result(self) -> Result<()> {
        match PlanError::from_errors(self.errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn entries(&self) -> Vec<ReportEntry> {
        self.errors
            .iter()
            .flat_map(PlanError::problems)
            .map(|err| ReportEntry {
                kind: err.kind(),
                message: err.to_string(),
                help: err.help().map(|h| h.to_string()),
            })
            .collect()
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            return writeln!(f, "valid");
        }
        for entry in self.entries() {
            writeln!(f, "[{}] {}", entry.kind, entry.message)?;
        }
        Ok(())
    }
}
