//! Application spec definition and loading
//!
//! An [`ApplicationSpec`] describes a packaged application and all of its
//! released versions. Each [`VersionedApplicationSpec`] says how to install
//! that release (one source or an ordered list of steps), which flavors can
//! customize it and which parameters it accepts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::compat::{Compatibility, MeshRuntime, RequirementSet, check_requirements};
use crate::error::{CoreError, Result};
use crate::parameter::Parameter;

/// A packaged application with its released versions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    /// Application name (required)
    pub name: String,

    /// Application type
    #[serde(default, rename = "type")]
    pub app_type: ApplicationType,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub logo_url: Option<String>,

    #[serde(default)]
    pub repository_url: Option<String>,

    #[serde(default)]
    pub documentation_url: Option<String>,

    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,

    /// Released versions, in declaration order
    #[serde(default)]
    pub versions: Vec<VersionedApplicationSpec>,
}

/// Application type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationType {
    #[default]
    Extension,
    Demo,
}

/// One release of an application
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedApplicationSpec {
    /// Version string, unique within the application
    pub version: String,

    #[serde(default)]
    pub date_published: Option<DateTime<Utc>>,

    /// How this release is installed
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub install: Option<InstallationSpec>,

    /// Base value overrides (YAML)
    #[serde(default)]
    pub values_yaml: Option<String>,

    /// Only resources carrying all of these labels are kept
    #[serde(default)]
    pub required_labels: BTreeMap<String, String>,

    #[serde(default)]
    pub flavors: Vec<Flavor>,

    #[serde(default)]
    pub parameters: Vec<Parameter>,

    /// Keep namespaces declared in manifests instead of forcing the install namespace
    #[serde(default)]
    pub respect_manifest_namespaces: bool,
}

/// How a release is installed: exactly one variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallationSpec {
    /// Chart in a local directory
    ChartDirectory(ChartDirectory),
    /// Gzipped tarball of a chart
    ChartArchive(ArchiveLocation),
    /// Gzipped tarball of plain manifests
    ManifestsArchive(ArchiveLocation),
    /// Ordered installation steps
    InstallationSteps(InstallationSteps),
}

/// A single install source, as used by steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallSource {
    ChartDirectory(ChartDirectory),
    ChartArchive(ArchiveLocation),
    ManifestsArchive(ArchiveLocation),
}

impl InstallSource {
    /// Short description for logs and errors
    pub fn describe(&self) -> String {
        match self {
            Self::ChartDirectory(dir) => format!("chart directory {}", dir.path.display()),
            Self::ChartArchive(archive) => format!("chart archive {}", archive.uri),
            Self::ManifestsArchive(archive) => format!("manifests archive {}", archive.uri),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartDirectory {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveLocation {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationSteps {
    pub steps: Vec<Step>,
}

/// A named installation stage with its own source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Step name, unique within the version
    pub name: String,

    #[serde(flatten)]
    pub source: InstallSource,
}

/// A named customization bundle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flavor {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Layers, applied in declaration order
    #[serde(default)]
    pub customization_layers: Vec<Layer>,

    /// Satisfied if any set is satisfied
    #[serde(default)]
    pub requirement_sets: Vec<RequirementSet>,

    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl Flavor {
    pub fn find_layer(&self, id: &str) -> Option<&Layer> {
        self.customization_layers.iter().find(|l| l.id == id)
    }

    /// Check this flavor's requirement sets against a runtime
    pub fn check_compatibility(&self, runtime: Option<&MeshRuntime>) -> Result<Compatibility> {
        check_requirements(&self.requirement_sets, runtime)
    }
}

/// A customization axis with mutually exclusive options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// An optional layer may be left unselected
    #[serde(default)]
    pub optional: bool,

    #[serde(default)]
    pub options: Vec<LayerOption>,
}

impl Layer {
    pub fn find_option(&self, id: &str) -> Option<&LayerOption> {
        self.options.iter().find(|o| o.id == id)
    }

    pub fn option_ids(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|o| o.id.as_str())
    }
}

/// One concrete choice for a layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerOption {
    pub id: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Value overrides applied when this option is selected (YAML)
    #[serde(default)]
    pub values_yaml: Option<String>,

    #[serde(default)]
    pub parameters: Vec<Parameter>,

    /// Cluster preconditions, checked but never rendered
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub resource_dependencies: Vec<ResourceDependency>,

    /// Manifest template appended after all installation steps
    #[serde(default)]
    pub manifests: Option<String>,
}

/// A precondition on cluster state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceDependency {
    SecretDependency(SecretDependency),
}

impl std::fmt::Display for ResourceDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SecretDependency(dep) if dep.keys.is_empty() => {
                write!(f, "secret '{}'", dep.name)
            }
            Self::SecretDependency(dep) => {
                write!(f, "secret '{}' with keys [{}]", dep.name, dep.keys.join(", "))
            }
        }
    }
}

/// A secret that must exist in the install namespace with the listed keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretDependency {
    pub name: String,

    #[serde(default)]
    pub keys: Vec<String>,
}

impl ApplicationSpec {
    /// Load a spec from a YAML (or JSON) file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CoreError::SpecNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a spec from YAML (JSON is valid YAML)
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn find_version(&self, version: &str) -> Option<&VersionedApplicationSpec> {
        self.versions.iter().find(|v| v.version == version)
    }

    pub fn version_names(&self) -> impl Iterator<Item = &str> {
        self.versions.iter().map(|v| v.version.as_str())
    }

    /// Check the structural invariants, collecting every violation
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("application name must not be empty".to_string());
        }

        let mut seen = HashSet::new();
        for version in &self.versions {
            if !seen.insert(version.version.as_str()) {
                problems.push(format!("duplicate version '{}'", version.version));
            }
            version.collect_problems(&mut problems);
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// Like [`validate`](Self::validate), folded into a single error
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate().map_err(|problems| CoreError::InvalidSpec {
            message: problems.join("; "),
        })
    }
}

impl VersionedApplicationSpec {
    pub fn find_flavor(&self, name: &str) -> Option<&Flavor> {
        self.flavors.iter().find(|f| f.name == name)
    }

    pub fn flavor_names(&self) -> impl Iterator<Item = &str> {
        self.flavors.iter().map(|f| f.name.as_str())
    }

    fn collect_problems(&self, problems: &mut Vec<String>) {
        let ctx = format!("version '{}'", self.version);

        if let Some(InstallationSpec::InstallationSteps(steps)) = &self.install {
            if steps.steps.is_empty() {
                problems.push(format!("{}: installation steps must not be empty", ctx));
            }
            let mut names = HashSet::new();
            for step in &steps.steps {
                if !names.insert(step.name.as_str()) {
                    problems.push(format!("{}: duplicate step name '{}'", ctx, step.name));
                }
            }
        }

        check_parameters(&self.parameters, &ctx, problems);

        let mut flavor_names = HashSet::new();
        for flavor in &self.flavors {
            if !flavor_names.insert(flavor.name.as_str()) {
                problems.push(format!("{}: duplicate flavor '{}'", ctx, flavor.name));
            }
            let flavor_ctx = format!("{}, flavor '{}'", ctx, flavor.name);
            check_parameters(&flavor.parameters, &flavor_ctx, problems);

            for set in &flavor.requirement_sets {
                if let Err(e) = set.mesh_requirement.versions.validate() {
                    problems.push(format!("{}: {}", flavor_ctx, e));
                }
            }

            let mut layer_ids = HashSet::new();
            for layer in &flavor.customization_layers {
                if !layer_ids.insert(layer.id.as_str()) {
                    problems.push(format!("{}: duplicate layer '{}'", flavor_ctx, layer.id));
                }
                if layer.options.is_empty() {
                    problems.push(format!("{}: layer '{}' has no options", flavor_ctx, layer.id));
                }
                let mut option_ids = HashSet::new();
                for option in &layer.options {
                    if !option_ids.insert(option.id.as_str()) {
                        problems.push(format!(
                            "{}: duplicate option '{}' in layer '{}'",
                            flavor_ctx, option.id, layer.id
                        ));
                    }
                    let option_ctx = format!("{}, option '{}:{}'", flavor_ctx, layer.id, option.id);
                    check_parameters(&option.parameters, &option_ctx, problems);
                }
            }
        }
    }
}

/// Unique names within one scope, defaults matching the declared type
fn check_parameters(parameters: &[Parameter], ctx: &str, problems: &mut Vec<String>) {
    let mut names = HashSet::new();
    for param in parameters {
        if !names.insert(param.name.as_str()) {
            problems.push(format!("{}: duplicate parameter '{}'", ctx, param.name));
        }
        if let (Some(declared), Some(default)) = (param.declared_type, &param.default) {
            if declared != default.value_type() {
                problems.push(format!(
                    "{}: parameter '{}' is declared {} but its default is {}",
                    ctx,
                    param.name,
                    declared,
                    default.value_type()
                ));
            }
        }
    }
}
