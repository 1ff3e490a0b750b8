//! Resolver configuration

use serde::{Deserialize, Serialize};

/// Label carrying the step a resource was rendered by
pub const DEFAULT_STEP_LABEL: &str = "meshpack.io/install-step";

/// Name of the step created for single-source installs
pub const DEFAULT_IMPLICIT_STEP: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverConfig {
    pub step_label: String,
    pub implicit_step: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            step_label: DEFAULT_STEP_LABEL.to_string(),
            implicit_step: DEFAULT_IMPLICIT_STEP.to_string(),
        }
    }
}
