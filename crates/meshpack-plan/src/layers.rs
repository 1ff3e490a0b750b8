//! Customization layers
//!
//! A flavor declares layers in order; the caller picks at most one option
//! per layer. Selected options contribute values, parameters, cluster
//! preconditions and manifest fragments.

use meshpack_core::{Flavor, Layer, LayerOption, Parameter, ResourceDependency, Values};
use meshpack_kube::ClusterQuery;
use std::collections::BTreeMap;

use crate::error::{PlanError, Result, suggest};
use crate::params::ValueSource;

/// One chosen option of one layer
#[derive(Debug, Clone, Copy)]
pub struct LayerSelection<'a> {
    pub layer: &'a Layer,
    pub option: &'a LayerOption,
}

/// Manifest template contributed by a selected option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerFragment {
    pub layer: String,
    pub option: String,
    pub template: String,
}

impl LayerFragment {
    /// Template name used in diagnostics: `layer:option`
    pub fn name(&self) -> String {
        format!("{}:{}", self.layer, self.option)
    }
}

/// Validated layer selections in declaration order
#[derive(Debug, Default)]
pub struct LayerComposer<'a> {
    selections: Vec<LayerSelection<'a>>,
}

impl<'a> LayerComposer<'a> {
    /// Validate choices against the flavor's declared layers
    ///
    /// All problems are collected: unknown layers, unknown options and
    /// required layers left unselected.
    pub fn select(
        flavor: Option<&'a Flavor>,
        choices: &BTreeMap<String, String>,
    ) -> std::result::Result<Self, Vec<PlanError>> {
        let Some(flavor) = flavor else {
            if choices.is_empty() {
                return Ok(Self::default());
            }
            return Err(choices
                .keys()
                .map(|layer| PlanError::LayerNotFound {
                    layer: layer.clone(),
                    help: Some("layers are declared by flavors; select a flavor first".into()),
                })
                .collect());
        };

        let mut errors = Vec::new();
        let layer_ids = || flavor.customization_layers.iter().map(|l| l.id.as_str());

        for layer in choices.keys() {
            if flavor.find_layer(layer).is_none() {
                errors.push(PlanError::LayerNotFound {
                    layer: layer.clone(),
                    help: suggest(layer, layer_ids()),
                });
            }
        }

        let mut selections = Vec::new();
        for layer in &flavor.customization_layers {
            match choices.get(&layer.id) {
                Some(option_id) => match layer.find_option(option_id) {
                    Some(option) => selections.push(LayerSelection { layer, option }),
                    None => errors.push(PlanError::LayerOptionNotFound {
                        layer: layer.id.clone(),
                        option: option_id.clone(),
                        help: suggest(option_id, layer.option_ids()),
                    }),
                },
                None if layer.optional => {}
                None => errors.push(PlanError::LayerSelectionRequired {
                    layer: layer.id.clone(),
                    help: Some(format!(
                        "choose one of: {}",
                        layer.option_ids().collect::<Vec<_>>().join(", ")
                    )),
                }),
            }
        }

        if errors.is_empty() {
            tracing::debug!(
                flavor = %flavor.name,
                selected = selections.len(),
                "layer selection validated"
            );
            Ok(Self { selections })
        } else {
            Err(errors)
        }
    }

    pub fn selections(&self) -> &[LayerSelection<'a>] {
        &self.selections
    }

    /// Parameter scopes of the selected options, in layer order
    pub fn parameter_scopes(&self) -> impl Iterator<Item = (ValueSource, &'a [Parameter])> + '_ {
        self.selections.iter().map(|s| {
            (
                ValueSource::LayerOption {
                    layer: s.layer.id.clone(),
                    option: s.option.id.clone(),
                },
                s.option.parameters.as_slice(),
            )
        })
    }

    /// Check every selected option's preconditions against the cluster
    ///
    /// Read-only. All unmet dependencies are reported together.
    pub async fn check_dependencies(
        &self,
        cluster: &dyn ClusterQuery,
        namespace: &str,
    ) -> std::result::Result<(), Vec<PlanError>> {
        let mut errors = Vec::new();

        for selection in &self.selections {
            for dependency in &selection.option.resource_dependencies {
                let missing = || PlanError::MissingDependency {
                    layer: selection.layer.id.clone(),
                    option: selection.option.id.clone(),
                    dependency: dependency.to_string(),
                    namespace: namespace.to_string(),
                };

                match dependency {
                    ResourceDependency::SecretDependency(secret) => {
                        match cluster.get_secret(namespace, &secret.name).await {
                            Ok(Some(data)) if secret.keys.iter().all(|k| data.contains_key(k)) => {
                                tracing::debug!(secret = %secret.name, "dependency satisfied");
                            }
                            Ok(_) => errors.push(missing()),
                            Err(e) => errors.push(PlanError::from(e)),
                        }
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Parsed values of every selected option, in layer order
    ///
    /// Options without `valuesYaml` yield an empty overlay so their
    /// parameters still have a slot.
    pub fn overlays(&self) -> Result<Vec<(ValueSource, Values)>> {
        self.selections
            .iter()
            .map(|s| -> Result<(ValueSource, Values)> {
                let overlay = Values::from_optional_yaml(s.option.values_yaml.as_deref())?;
                let source = ValueSource::LayerOption {
                    layer: s.layer.id.clone(),
                    option: s.option.id.clone(),
                };
                Ok((source, overlay))
            })
            .collect()
    }

    /// Manifest fragments of the selected options, in layer order
    pub fn fragments(&self) -> Vec<LayerFragment> {
        self.selections
            .iter()
            .filter_map(|s| {
                s.option.manifests.as_ref().map(|template| LayerFragment {
                    layer: s.layer.id.clone(),
                    option: s.option.id.clone(),
                    template: template.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshpack_core::ApplicationSpec;
    use meshpack_kube::StaticCluster;
    use serde_json::json;

    const SPEC: &str = r#"
name: gloo
versions:
  - version: 0.13.0
    flavors:
      - name: vanilla
        customizationLayers:
          - id: mtls
            optional: true
            options:
              - id: strict
                valuesYaml: |
                  mtls:
                    mode: STRICT
                manifests: |
                  apiVersion: security.istio.io/v1beta1
                  kind: PeerAuthentication
                  metadata:
                    name: default
              - id: permissive
                valuesYaml: |
                  mtls:
                    mode: PERMISSIVE
          - id: ingress
            options:
              - id: gateway
                valuesYaml: |
                  ingress:
                    enabled: true
                  mtls:
                    mode: OVERRIDDEN
                resourceDependencies:
                  - secretDependency:
                      name: gateway-tls
                      keys: [tls.crt, tls.key]
              - id: none
"#;

    fn spec() -> ApplicationSpec {
        ApplicationSpec::from_yaml(SPEC).unwrap()
    }

    fn choices(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(l, o)| (l.to_string(), o.to_string()))
            .collect()
    }

    #[test]
    fn test_select_in_declaration_order() {
        let spec = spec();
        let flavor = spec.versions[0].find_flavor("vanilla");

        let composer =
            LayerComposer::select(flavor, &choices(&[("ingress", "none"), ("mtls", "strict")]))
                .unwrap();

        let ids: Vec<&str> = composer.selections().iter().map(|s| s.layer.id.as_str()).collect();
        assert_eq!(ids, vec!["mtls", "ingress"]);
    }

    #[test]
    fn test_optional_layer_may_be_skipped() {
        let spec = spec();
        let flavor = spec.versions[0].find_flavor("vanilla");

        let composer = LayerComposer::select(flavor, &choices(&[("ingress", "none")])).unwrap();
        assert_eq!(composer.selections().len(), 1);
        assert!(composer.fragments().is_empty());
    }

    #[test]
    fn test_selection_errors_accumulate() {
        let spec = spec();
        let flavor = spec.versions[0].find_flavor("vanilla");

        let errors =
            LayerComposer::select(flavor, &choices(&[("mtlss", "strict"), ("mtls", "strct")]))
                .unwrap_err();

        let kinds: Vec<&str> = errors.iter().map(PlanError::kind).collect();
        assert_eq!(
            kinds,
            vec!["LayerNotFound", "LayerOptionNotFound", "LayerSelectionRequired"]
        );
        assert!(matches!(
            &errors[0],
            PlanError::LayerNotFound { help: Some(h), .. } if h == "did you mean 'mtls'?"
        ));
        assert!(matches!(
            &errors[1],
            PlanError::LayerOptionNotFound { help: Some(h), .. } if h == "did you mean 'strict'?"
        ));
    }

    #[test]
    fn test_layers_without_flavor() {
        let errors = LayerComposer::select(None, &choices(&[("mtls", "strict")])).unwrap_err();
        assert_eq!(errors[0].kind(), "LayerNotFound");

        assert!(LayerComposer::select(None, &BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_later_layers_override() {
        let spec = spec();
        let flavor = spec.versions[0].find_flavor("vanilla");
        let composer =
            LayerComposer::select(flavor, &choices(&[("mtls", "strict"), ("ingress", "gateway")]))
                .unwrap();

        let mut values = Values::from_yaml("mtls:\n  mode: DISABLE\nreplicas: 1").unwrap();
        let overlays = composer.overlays().unwrap();
        assert_eq!(overlays[0].0.to_string(), "layer option 'mtls:strict'");
        for (_, overlay) in &overlays {
            values.merge(overlay);
        }

        assert_eq!(
            values.inner(),
            &json!({"mtls": {"mode": "OVERRIDDEN"}, "ingress": {"enabled": true}, "replicas": 1})
        );
    }

    #[test]
    fn test_fragments() {
        let spec = spec();
        let flavor = spec.versions[0].find_flavor("vanilla");
        let composer = LayerComposer::select(
            flavor,
            &choices(&[("mtls", "strict"), ("ingress", "none")]),
        )
        .unwrap();

        let fragments = composer.fragments();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].name(), "mtls:strict");
        assert!(fragments[0].template.contains("PeerAuthentication"));
    }

    #[tokio::test]
    async fn test_dependencies() {
        let spec = spec();
        let flavor = spec.versions[0].find_flavor("vanilla");
        let composer =
            LayerComposer::select(flavor, &choices(&[("ingress", "gateway")])).unwrap();

        let partial = StaticCluster::new().with_secret("gloo-system", "gateway-tls", "tls.crt", "c");
        let errors = composer
            .check_dependencies(&partial, "gloo-system")
            .await
            .unwrap_err();
        insta::assert_snapshot!(errors[0].to_string(), @"layer option 'ingress:gateway' requires secret 'gateway-tls' with keys [tls.crt, tls.key] in namespace 'gloo-system'");

        let complete = partial.with_secret("gloo-system", "gateway-tls", "tls.key", "k");
        composer.check_dependencies(&complete, "gloo-system").await.unwrap();

        let down = StaticCluster::unavailable("connection refused");
        let errors = composer.check_dependencies(&down, "gloo-system").await.unwrap_err();
        assert_eq!(errors[0].kind(), "Cluster");
    }
}
