//! End-to-end planning scenarios against an in-memory renderer and cluster

use async_trait::async_trait;
use meshpack_core::{
    ApplicationSpec, InstallSource, MeshRuntime, MeshType, RenderContext, Resource,
    parse_manifests,
};
use meshpack_engine::TemplateRenderer;
use meshpack_kube::StaticCluster;
use meshpack_plan::{
    CancelSignal, InMemorySpecStore, PlanError, PlanRequest, PlanResolver, ValueSource,
};
use serde_json::{Value as JsonValue, json};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const STEP_LABEL: &str = "meshpack.io/install-step";

const GLOO: &str = r#"
name: gloo
versions:
  - version: 0.13.0
    install:
      chartDirectory:
        path: charts/gloo
    valuesYaml: |
      gateway:
        image: from-version-values
        port: 8080
    parameters:
      - name: gateway.replicas
        type: int
        default:
          int: 1
      - name: gateway.image
        default:
          string: v-version
      - name: mtls.mode
        default:
          string: DISABLE
    flavors:
      - name: vanilla
        parameters:
          - name: gateway.image
            default:
              string: v-flavor
        customizationLayers:
          - id: mtls
            optional: true
            options:
              - id: strict
                valuesYaml: |
                  mtls:
                    mode: STRICT
                parameters:
                  - name: gateway.image
                    default:
                      string: v-layer
                manifests: |
                  apiVersion: security.istio.io/v1beta1
                  kind: PeerAuthentication
                  metadata:
                    name: default
                  spec:
                    mtls:
                      mode: STRICT
              - id: permissive
                valuesYaml: |
                  mtls:
                    mode: PERMISSIVE
      - name: istio
        requirementSets:
          - meshRequirement:
              meshType: ISTIO
              versions:
                minVersion: 1.0.0
                maxVersion: 1.5.0
        customizationLayers:
          - id: ingress
            options:
              - id: gateway
                resourceDependencies:
                  - secretDependency:
                      name: gateway-tls
                      keys: [tls.crt, tls.key]
              - id: none
          - id: auth
            optional: true
            options:
              - id: oidc
                resourceDependencies:
                  - secretDependency:
                      name: oidc-client
                      keys: [client-secret]
  - version: 0.14.0
    requiredLabels:
      app: gloo
    install:
      installationSteps:
        steps:
          - name: pre-install
            manifestsArchive:
              uri: crds.tgz
          - name: core
            chartArchive:
              uri: gloo.tgz
          - name: post-install
            chartDirectory:
              path: charts/post
    parameters:
      - name: license.key
        type: secret
        default:
          secret:
            secretRef:
              name: license
              key: key
  - version: 0.15.0
    respectManifestNamespaces: true
    install:
      chartDirectory:
        path: charts/gloo
"#;

const GLOO_CHART: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: gateway
  labels:
    app: gloo
---
apiVersion: v1
kind: Service
metadata:
  name: gateway
  namespace: somewhere-else
  labels:
    app: gloo
"#;

const CRDS: &str = r#"
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: virtualservices.gateway.solo.io
  labels:
    app: gloo
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: unlabeled
"#;

const POST: &str = r#"
apiVersion: batch/v1
kind: Job
metadata:
  name: post-install
  labels:
    app: gloo
"#;

struct RenderCall {
    target: String,
    step: Option<String>,
    values: JsonValue,
}

/// Returns canned manifests per install source and records every call
#[derive(Default)]
struct RecordingRenderer {
    manifests: BTreeMap<String, &'static str>,
    calls: Mutex<Vec<RenderCall>>,
}

impl RecordingRenderer {
    fn new() -> Self {
        let manifests = BTreeMap::from([
            ("charts/gloo".to_string(), GLOO_CHART),
            ("crds.tgz".to_string(), CRDS),
            ("gloo.tgz".to_string(), GLOO_CHART),
            ("charts/post".to_string(), POST),
        ]);
        Self {
            manifests,
            calls: Mutex::default(),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn targets(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.target.clone()).collect()
    }

    fn first_values(&self) -> JsonValue {
        self.calls.lock().unwrap()[0].values.clone()
    }
}

#[async_trait]
impl TemplateRenderer for RecordingRenderer {
    async fn render(
        &self,
        source: &InstallSource,
        context: &RenderContext,
    ) -> meshpack_engine::Result<Vec<Resource>> {
        let target = match source {
            InstallSource::ChartDirectory(dir) => dir.path.display().to_string(),
            InstallSource::ChartArchive(archive) | InstallSource::ManifestsArchive(archive) => {
                archive.uri.clone()
            }
        };
        let manifest = self.manifests.get(&target).copied().unwrap_or("");
        self.calls.lock().unwrap().push(RenderCall {
            target,
            step: context.step.clone(),
            values: context.values.clone(),
        });
        Ok(parse_manifests(manifest)?)
    }

    async fn render_fragment(
        &self,
        name: &str,
        template: &str,
        context: &RenderContext,
    ) -> meshpack_engine::Result<Vec<Resource>> {
        self.calls.lock().unwrap().push(RenderCall {
            target: name.to_string(),
            step: context.step.clone(),
            values: context.values.clone(),
        });
        Ok(parse_manifests(template)?)
    }
}

struct Harness {
    renderer: Arc<RecordingRenderer>,
    cluster: StaticCluster,
    resolver: PlanResolver,
}

fn harness(cluster: StaticCluster) -> Harness {
    let store = InMemorySpecStore::new()
        .with_spec(ApplicationSpec::from_yaml(GLOO).unwrap())
        .unwrap();
    let renderer = Arc::new(RecordingRenderer::new());
    let resolver = PlanResolver::new(
        Arc::new(store),
        renderer.clone(),
        Arc::new(cluster.clone()),
    );
    Harness {
        renderer,
        cluster,
        resolver,
    }
}

fn license_cluster() -> StaticCluster {
    StaticCluster::new().with_secret("gloo-system", "license", "key", "LICENSE-123")
}

#[tokio::test]
async fn test_chart_with_selected_layer() {
    let h = harness(StaticCluster::new());
    let request = PlanRequest::new("gloo", "0.13.0", "gloo-system")
        .flavor("vanilla")
        .layer("mtls", "strict");

    let plan = h.resolver.resolve(&request).await.unwrap();

    let kinds: Vec<&str> = plan.resources.iter().map(Resource::kind).collect();
    assert_eq!(kinds, vec!["Deployment", "Service", "PeerAuthentication"]);
    assert_eq!(plan.resources_for_step("default").count(), 2);
    assert_eq!(plan.layer_resources().count(), 1);
    assert_eq!(plan.resources[2].label(STEP_LABEL), None);
    assert_eq!(h.renderer.targets(), vec!["charts/gloo", "mtls:strict"]);
}

#[tokio::test]
async fn test_steps_keep_order_and_labels() {
    let h = harness(license_cluster());

    let plan = h
        .resolver
        .resolve(&PlanRequest::new("gloo", "0.14.0", "gloo-system"))
        .await
        .unwrap();

    assert_eq!(h.renderer.targets(), vec!["crds.tgz", "gloo.tgz", "charts/post"]);
    let labels: Vec<&str> = plan
        .resources
        .iter()
        .filter_map(|r| r.label(STEP_LABEL))
        .collect();
    assert_eq!(labels, vec!["pre-install", "core", "core", "post-install"]);

    let steps: Vec<(&str, usize)> = plan
        .steps
        .iter()
        .map(|s| (s.name.as_str(), s.resources))
        .collect();
    assert_eq!(steps, vec![("pre-install", 1), ("core", 2), ("post-install", 1)]);

    let call_steps: Vec<Option<String>> = h
        .renderer
        .calls
        .lock()
        .unwrap()
        .iter()
        .map(|c| c.step.clone())
        .collect();
    assert_eq!(
        call_steps,
        vec![
            Some("pre-install".to_string()),
            Some("core".to_string()),
            Some("post-install".to_string())
        ]
    );
}

#[tokio::test]
async fn test_required_layer_without_choice_never_renders() {
    let h = harness(StaticCluster::new());
    let request = PlanRequest::new("gloo", "0.13.0", "gloo-system")
        .flavor("istio")
        .mesh(MeshRuntime::new(MeshType::Istio, "1.3.2"));

    let err = h.resolver.resolve(&request).await.unwrap_err();

    assert!(matches!(
        err,
        PlanError::LayerSelectionRequired { ref layer, .. } if layer == "ingress"
    ));
    assert_eq!(h.renderer.call_count(), 0);
    assert_eq!(h.cluster.lookup_count(), 0);
}

#[tokio::test]
async fn test_parameter_and_value_precedence() {
    let h = harness(StaticCluster::new());
    let request = PlanRequest::new("gloo", "0.13.0", "gloo-system")
        .flavor("vanilla")
        .layer("mtls", "strict")
        .values_yaml("mtls:\n  mode: USER\ngateway:\n  port: 9090\n");

    let plan = h.resolver.resolve(&request).await.unwrap();
    let values = h.renderer.first_values();

    // layer option default beats flavor and version defaults
    assert_eq!(values["gateway"]["image"], json!("v-layer"));
    // user values beat layer values
    assert_eq!(values["mtls"]["mode"], json!("USER"));
    assert_eq!(values["gateway"]["port"], json!(9090));
    assert_eq!(values["gateway"]["replicas"], json!(1));

    let image = plan.parameters.iter().find(|p| p.name == "gateway.image").unwrap();
    assert_eq!(
        image.source,
        ValueSource::LayerOption {
            layer: "mtls".into(),
            option: "strict".into()
        }
    );
}

#[tokio::test]
async fn test_parameter_defaults_sit_below_layers_and_user_values() {
    async fn rendered_values(request: PlanRequest) -> JsonValue {
        let h = harness(StaticCluster::new());
        h.resolver.resolve(&request).await.unwrap();
        h.renderer.first_values()
    }
    let vanilla = || PlanRequest::new("gloo", "0.13.0", "gloo-system").flavor("vanilla");

    let values = rendered_values(vanilla()).await;
    assert_eq!(values["mtls"]["mode"], json!("DISABLE"));

    // selected layer values beat a version default for the same path
    let values = rendered_values(vanilla().layer("mtls", "strict")).await;
    assert_eq!(values["mtls"]["mode"], json!("STRICT"));

    // the caller's values beat version and layer option defaults
    let values = rendered_values(
        vanilla()
            .layer("mtls", "strict")
            .values_yaml("mtls:\n  mode: USER\ngateway:\n  image: from-user-values\n"),
    )
    .await;
    assert_eq!(values["mtls"]["mode"], json!("USER"));
    assert_eq!(values["gateway"]["image"], json!("from-user-values"));

    // explicit overrides stay on top
    let values = rendered_values(
        vanilla()
            .layer("mtls", "strict")
            .values_yaml("mtls:\n  mode: USER\n")
            .parameter("mtls.mode", "PERMISSIVE"),
    )
    .await;
    assert_eq!(values["mtls"]["mode"], json!("PERMISSIVE"));
}

#[tokio::test]
async fn test_caller_override_wins() {
    let h = harness(StaticCluster::new());
    let request = PlanRequest::new("gloo", "0.13.0", "gloo-system")
        .flavor("vanilla")
        .layer("mtls", "strict")
        .parameter("gateway.image", "custom")
        .parameter("gateway.replicas", "3")
        .values_yaml("gateway:\n  image: from-user-values\n");

    let plan = h.resolver.resolve(&request).await.unwrap();
    let values = h.renderer.first_values();

    assert_eq!(values["gateway"]["image"], json!("custom"));
    assert_eq!(values["gateway"]["replicas"], json!(3));
    assert_eq!(plan.values.get("gateway.image"), Some(&json!("custom")));
}

#[tokio::test]
async fn test_invalid_override_is_static_error() {
    let h = harness(StaticCluster::new());
    let request = PlanRequest::new("gloo", "0.13.0", "gloo-system").parameter("gateway.replicas", "many");

    let err = h.resolver.resolve(&request).await.unwrap_err();

    assert!(matches!(err, PlanError::InvalidParameterValue { ref expected, .. } if expected == "int"));
    assert_eq!(h.renderer.call_count(), 0);
}

#[tokio::test]
async fn test_namespace_rewrite() {
    let h = harness(StaticCluster::new());

    let plan = h
        .resolver
        .resolve(&PlanRequest::new("gloo", "0.13.0", "gloo-system"))
        .await
        .unwrap();
    assert!(plan.resources.iter().all(|r| r.namespace() == Some("gloo-system")));

    let plan = h
        .resolver
        .resolve(&PlanRequest::new("gloo", "0.15.0", "gloo-system"))
        .await
        .unwrap();
    let namespaces: Vec<Option<&str>> = plan.resources.iter().map(Resource::namespace).collect();
    assert_eq!(namespaces, vec![None, Some("somewhere-else")]);
}

#[tokio::test]
async fn test_required_labels_filter() {
    let h = harness(license_cluster());

    let plan = h
        .resolver
        .resolve(&PlanRequest::new("gloo", "0.14.0", "gloo-system"))
        .await
        .unwrap();

    assert!(plan.resources.iter().all(|r| r.label("app") == Some("gloo")));
    assert!(!plan.resources.iter().any(|r| r.name() == "unlabeled"));
}

#[tokio::test]
async fn test_identical_requests_give_identical_manifests() {
    let h = harness(license_cluster());
    let request = PlanRequest::new("gloo", "0.14.0", "gloo-system");

    let first = h.resolver.resolve(&request).await.unwrap().to_manifest().unwrap();
    let second = h.resolver.resolve(&request).await.unwrap().to_manifest().unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_flavor_compatibility() {
    let cluster = StaticCluster::new().with_secret("gloo-system", "gateway-tls", "tls.crt", "c")
        .with_secret("gloo-system", "gateway-tls", "tls.key", "k");
    let h = harness(cluster);
    let request = |mesh: Option<MeshRuntime>| {
        let request = PlanRequest::new("gloo", "0.13.0", "gloo-system")
            .flavor("istio")
            .layer("ingress", "gateway");
        match mesh {
            Some(mesh) => request.mesh(mesh),
            None => request,
        }
    };

    h.resolver
        .resolve(&request(Some(MeshRuntime::new(MeshType::Istio, "1.3.2"))))
        .await
        .unwrap();

    for mesh in [
        Some(MeshRuntime::new(MeshType::Istio, "1.6.0")),
        Some(MeshRuntime::new(MeshType::Linkerd, "1.3.2")),
        None,
    ] {
        let err = h.resolver.resolve(&request(mesh)).await.unwrap_err();
        assert_eq!(err.kind(), "FlavorIncompatible");
    }

    let err = h
        .resolver
        .resolve(&request(Some(MeshRuntime::new(MeshType::Istio, "not-a-version"))))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidVersion");
}

#[tokio::test]
async fn test_dependency_errors_are_accumulated() {
    let h = harness(StaticCluster::new());
    let request = PlanRequest::new("gloo", "0.13.0", "gloo-system")
        .flavor("istio")
        .mesh(MeshRuntime::new(MeshType::Istio, "1.3.2"))
        .layer("ingress", "gateway")
        .layer("auth", "oidc");

    let err = h.resolver.resolve(&request).await.unwrap_err();

    let PlanError::Validation { errors } = &err else {
        panic!("expected a validation error, got {err:?}");
    };
    let deps: Vec<String> = errors
        .iter()
        .map(|e| match e {
            PlanError::MissingDependency { layer, option, .. } => format!("{layer}:{option}"),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(deps, vec!["ingress:gateway", "auth:oidc"]);
    assert_eq!(h.renderer.call_count(), 0);
}

#[tokio::test]
async fn test_static_errors_are_accumulated() {
    let h = harness(StaticCluster::new());
    let request = PlanRequest::new("gloo", "0.13.0", "gloo-system")
        .flavor("vanilla")
        .layer("mtls", "strictest")
        .parameter("gateway.replicas", "x");

    let report = h.resolver.validate(&request).await;

    let kinds: Vec<&str> = report.entries().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec!["LayerOptionNotFound", "InvalidParameterValue"]);
    assert!(matches!(report.into_result(), Err(PlanError::Validation { .. })));
}

#[tokio::test]
async fn test_secret_parameter_resolution() {
    let h = harness(license_cluster());

    let plan = h
        .resolver
        .resolve(&PlanRequest::new("gloo", "0.14.0", "gloo-system"))
        .await
        .unwrap();

    assert_eq!(h.renderer.first_values()["license"]["key"], json!("LICENSE-123"));
    let license = &plan.parameters[0];
    assert!(license.secret);
    assert_eq!(license.display_value(), "<redacted>");
}

#[tokio::test]
async fn test_missing_secret_fails_before_rendering() {
    let h = harness(StaticCluster::new().with_secret("default", "license", "key", "x"));

    let err = h
        .resolver
        .resolve(&PlanRequest::new("gloo", "0.14.0", "gloo-system"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PlanError::SecretNotFound { ref namespace, ref name, .. }
            if namespace == "gloo-system" && name == "license"
    ));
    assert_eq!(h.renderer.call_count(), 0);
}

#[tokio::test]
async fn test_cancelled_before_first_step() {
    let h = harness(license_cluster());
    let cancel = CancelSignal::new();
    cancel.cancel();

    let err = h
        .resolver
        .resolve_with_cancel(&PlanRequest::new("gloo", "0.14.0", "gloo-system"), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, PlanError::Cancelled { ref next_step } if next_step == "pre-install"));
    assert_eq!(h.renderer.call_count(), 0);
}

#[tokio::test]
async fn test_concurrent_requests_share_resolver() {
    let h = harness(license_cluster());
    let resolver = Arc::new(h.resolver);

    let tasks: Vec<_> = ["ns-a", "ns-b"]
        .into_iter()
        .map(|namespace| {
            let resolver = resolver.clone();
            tokio::spawn(async move {
                let request = PlanRequest::new("gloo", "0.13.0", namespace);
                resolver.resolve(&request).await.map(|plan| plan.namespace)
            })
        })
        .collect();

    let mut namespaces = Vec::new();
    for task in tasks {
        namespaces.push(task.await.unwrap().unwrap());
    }
    assert_eq!(namespaces, vec!["ns-a", "ns-b"]);
}
