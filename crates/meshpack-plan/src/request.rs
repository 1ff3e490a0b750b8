//! What the caller asks for

use meshpack_core::MeshRuntime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A request to plan one installation
///
/// Parameter overrides are literal strings, the way they arrive from a
/// command line; they are checked against the declared parameter types.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub application: String,
    pub version: String,

    #[serde(default)]
    pub flavor: Option<String>,

    /// Layer id to option id
    #[serde(default)]
    pub layers: BTreeMap<String, String>,

    /// Parameter name to literal value
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,

    pub namespace: String,

    /// Install name; defaults to the application name
    #[serde(default)]
    pub release_name: Option<String>,

    #[serde(default)]
    pub mesh: Option<MeshRuntime>,

    /// User values (YAML), merged above layer values and below parameters
    #[serde(default)]
    pub values_yaml: Option<String>,
}

impl PlanRequest {
    pub fn new(
        application: impl Into<String>,
        version: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            application: application.into(),
            version: version.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn flavor(mut self, flavor: impl Into<String>) -> Self {
        self.flavor = Some(flavor.into());
        self
    }

    pub fn layer(mut self, layer: impl Into<String>, option: impl Into<String>) -> Self {
        self.layers.insert(layer.into(), option.into());
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn mesh(mut self, runtime: MeshRuntime) -> Self {
        self.mesh = Some(runtime);
        self
    }

    pub fn values_yaml(mut self, yaml: impl Into<String>) -> Self {
        self.values_yaml = Some(yaml.into());
        self
    }

    pub fn release_name(mut self, name: impl Into<String>) -> Self {
        self.release_name = Some(name.into());
        self
    }

    /// Effective install name
    pub fn install_name(&self) -> &str {
        self.release_name.as_deref().unwrap_or(&self.application)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshpack_core::MeshType;

    #[test]
    fn test_builder() {
        let request = PlanRequest::new("gloo", "0.13.0", "gloo-system")
            .flavor("vanilla")
            .layer("mtls", "strict")
            .parameter("gateway.replicas", "2")
            .mesh(MeshRuntime::new(MeshType::Istio, "1.3.2"));

        assert_eq!(request.layers["mtls"], "strict");
        assert_eq!(request.parameters["gateway.replicas"], "2");
        assert_eq!(request.install_name(), "gloo");
        assert_eq!(request.release_name("edge").install_name(), "edge");
    }

    #[test]
    fn test_from_json() {
        let request: PlanRequest = serde_json::from_str(
            r#"{
                "application": "gloo",
                "version": "0.13.0",
                "namespace": "gloo-system",
                "layers": {"mtls": "permissive"},
                "mesh": {"meshType": "LINKERD", "version": "2.6.0"}
            }"#,
        )
        .unwrap();

        assert_eq!(request.layers["mtls"], "permissive");
        assert!(request.flavor.is_none());
        assert_eq!(request.mesh.unwrap().mesh_type, MeshType::Linkerd);
    }
}
