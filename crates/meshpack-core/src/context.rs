//! Template rendering context

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::compat::MeshRuntime;
use crate::values::Values;

/// Context available to all templates of one plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderContext {
    /// Composed values (defaults, layers, user values and parameters)
    pub values: JsonValue,

    /// Release information
    pub release: ReleaseInfo,

    /// Application being installed
    pub application: ApplicationInfo,

    /// Target mesh runtime, when the request described one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshInfo>,

    /// Name of the step being rendered; unset for layer fragments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
}

/// Release information for templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub name: String,
    pub namespace: String,
}

/// Application information for templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
}

/// Mesh runtime as seen by templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshInfo {
    #[serde(rename = "type")]
    pub mesh_type: String,
    pub version: String,
}

impl From<&MeshRuntime> for MeshInfo {
    fn from(runtime: &MeshRuntime) -> Self {
        Self {
            mesh_type: runtime.mesh_type.to_string(),
            version: runtime.version.clone(),
        }
    }
}

impl RenderContext {
    pub fn new(values: &Values, release: ReleaseInfo, application: ApplicationInfo) -> Self {
        Self {
            values: values.inner().clone(),
            release,
            application,
            mesh: None,
            step: None,
        }
    }

    pub fn with_mesh(mut self, runtime: Option<&MeshRuntime>) -> Self {
        self.mesh = runtime.map(MeshInfo::from);
        self
    }

    /// Copy of this context for a single step
    pub fn for_step(&self, step: Option<&str>) -> Self {
        Self {
            step: step.map(str::to_string),
            ..self.clone()
        }
    }

    /// Convert to minijinja-compatible context
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::MeshType;

    fn context() -> RenderContext {
        let values = Values::from_yaml("replicas: 3").unwrap();
        RenderContext::new(
            &values,
            ReleaseInfo {
                name: "gloo".into(),
                namespace: "gloo-system".into(),
            },
            ApplicationInfo {
                name: "gloo".into(),
                version: "0.13.0".into(),
                flavor: Some("vanilla".into()),
            },
        )
    }

    #[test]
    fn test_render_context_json() {
        let ctx = context()
            .with_mesh(Some(&MeshRuntime::new(MeshType::Istio, "1.3.2")))
            .for_step(Some("core"));

        let json = ctx.to_json();
        assert_eq!(json["values"]["replicas"], 3);
        assert_eq!(json["release"]["namespace"], "gloo-system");
        assert_eq!(json["application"]["flavor"], "vanilla");
        assert_eq!(json["mesh"]["type"], "ISTIO");
        assert_eq!(json["mesh"]["version"], "1.3.2");
        assert_eq!(json["step"], "core");
    }

    #[test]
    fn test_optional_fields_omitted() {
        let json = context().to_json();
        assert!(json.get("mesh").is_none());
        assert!(json.get("step").is_none());
    }
}
