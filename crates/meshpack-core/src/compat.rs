//! Mesh runtime compatibility
//!
//! A flavor declares requirement sets; it applies to a target runtime when
//! at least one set is satisfied. A set is a mesh type plus an inclusive
//! version range where an empty bound is open.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Service mesh implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeshType {
    Istio,
    Linkerd,
    AwsAppMesh,
    ConsulConnect,
}

impl MeshType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Istio => "ISTIO",
            Self::Linkerd => "LINKERD",
            Self::AwsAppMesh => "AWS_APP_MESH",
            Self::ConsulConnect => "CONSUL_CONNECT",
        }
    }
}

impl fmt::Display for MeshType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeshType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "istio" => Ok(Self::Istio),
            "linkerd" => Ok(Self::Linkerd),
            "awsappmesh" | "appmesh" => Ok(Self::AwsAppMesh),
            "consulconnect" | "consul" => Ok(Self::ConsulConnect),
            _ => Err(format!(
                "unknown mesh type '{}', expected one of: istio, linkerd, aws-app-mesh, consul-connect",
                s
            )),
        }
    }
}

/// Description of the mesh the application will be installed into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshRuntime {
    pub mesh_type: MeshType,
    pub version: String,
}

impl MeshRuntime {
    pub fn new(mesh_type: MeshType, version: impl Into<String>) -> Self {
        Self {
            mesh_type,
            version: version.into(),
        }
    }
}

impl fmt::Display for MeshRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.mesh_type, self.version)
    }
}

/// Inclusive version range, empty bounds are open
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRange {
    #[serde(default)]
    pub min_version: Option<String>,

    #[serde(default)]
    pub max_version: Option<String>,
}

impl VersionRange {
    pub fn new(min: Option<&str>, max: Option<&str>) -> Self {
        Self {
            min_version: min.map(String::from),
            max_version: max.map(String::from),
        }
    }

    fn min(&self) -> Option<&str> {
        self.min_version.as_deref().filter(|s| !s.trim().is_empty())
    }

    fn max(&self) -> Option<&str> {
        self.max_version.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Check that both bounds parse
    pub fn validate(&self) -> Result<()> {
        for bound in [self.min(), self.max()].into_iter().flatten() {
            parse_mesh_version(bound)?;
        }
        Ok(())
    }

    pub fn contains(&self, version: &Version) -> Result<bool> {
        if let Some(min) = self.min() {
            if version < &parse_mesh_version(min)? {
                return Ok(false);
            }
        }
        if let Some(max) = self.max() {
            if version > &parse_mesh_version(max)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min(), self.max()) {
            (None, None) => f.write_str("any version"),
            (Some(min), None) => write!(f, ">={}", min),
            (None, Some(max)) => write!(f, "<={}", max),
            (Some(min), Some(max)) => write!(f, ">={}, <={}", min, max),
        }
    }
}

/// A mesh type and version range condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshRequirement {
    pub mesh_type: MeshType,

    #[serde(default)]
    pub versions: VersionRange,
}

impl MeshRequirement {
    pub fn is_satisfied_by(&self, runtime: &MeshRuntime) -> Result<bool> {
        if self.mesh_type != runtime.mesh_type {
            return Ok(false);
        }
        let version = parse_mesh_version(&runtime.version)?;
        self.versions.contains(&version)
    }
}

impl fmt::Display for MeshRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.mesh_type, self.versions)
    }
}

/// Conjunction of conditions under which a flavor applies
///
/// Only a mesh requirement exists today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementSet {
    pub mesh_requirement: MeshRequirement,
}

impl RequirementSet {
    pub fn mesh(mesh_type: MeshType, versions: VersionRange) -> Self {
        Self {
            mesh_requirement: MeshRequirement {
                mesh_type,
                versions,
            },
        }
    }

    pub fn is_satisfied_by(&self, runtime: &MeshRuntime) -> Result<bool> {
        self.mesh_requirement.is_satisfied_by(runtime)
    }
}

impl fmt::Display for RequirementSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.mesh_requirement.fmt(f)
    }
}

/// Outcome of checking requirement sets against a runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    Incompatible {
        /// Human-readable description of every unmet requirement set
        unmet: Vec<String>,
    },
}

impl Compatibility {
    pub fn is_compatible(&self) -> bool {
        matches!(self, Self::Compatible)
    }
}

/// Evaluate requirement sets with satisfied-if-any semantics
///
/// No requirement sets means universally applicable. Sets exist but no
/// runtime was described: incompatible.
pub fn check_requirements(
    sets: &[RequirementSet],
    runtime: Option<&MeshRuntime>,
) -> Result<Compatibility> {
    if sets.is_empty() {
        return Ok(Compatibility::Compatible);
    }

    let Some(runtime) = runtime else {
        return Ok(Compatibility::Incompatible {
            unmet: sets
                .iter()
                .map(|s| format!("{} (no target runtime described)", s))
                .collect(),
        });
    };

    let mut unmet = Vec::with_capacity(sets.len());
    for set in sets {
        if set.is_satisfied_by(runtime)? {
            return Ok(Compatibility::Compatible);
        }
        unmet.push(set.to_string());
    }

    Ok(Compatibility::Incompatible { unmet })
}

/// Parse a mesh version leniently
///
/// Accepts a leading `v` and missing minor/patch components
/// (`1.5` is read as `1.5.0`).
pub fn parse_mesh_version(raw: &str) -> Result<Version> {
    let cleaned = raw.trim().trim_start_matches('v');

    if let Ok(version) = Version::parse(cleaned) {
        return Ok(version);
    }

    let split_at = cleaned.find(['-', '+']).unwrap_or(cleaned.len());
    let (core, rest) = cleaned.split_at(split_at);
    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(invalid_version(raw, "expected MAJOR[.MINOR[.PATCH]]"));
    }
    while parts.len() < 3 {
        parts.push("0");
    }

    Version::parse(&format!("{}{}", parts.join("."), rest))
        .map_err(|e| invalid_version(raw, &e.to_string()))
}

fn invalid_version(raw: &str, message: &str) -> CoreError {
    CoreError::InvalidVersion {
        version: raw.to_string(),
        message: message.to_string(),
    }
}
