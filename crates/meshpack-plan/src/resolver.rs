//! Plan resolution entry point
//!
//! [`PlanResolver::resolve`] turns a [`PlanRequest`] into an [`InstallPlan`].
//! Checks run in phases and a phase only starts when every earlier phase
//! passed:
//!
//! 1. static checks (version, flavor, layer selection, parameters, install
//!    source, value documents), all problems collected
//! 2. flavor compatibility with the target runtime
//! 3. layer dependencies against the cluster, all problems collected
//! 4. secret parameters
//! 5. rendering
//!
//! The templating engine is only reached in phase 5.

use meshpack_core::{
    ApplicationInfo, ApplicationSpec, Compatibility, Flavor, ReleaseInfo, RenderContext,
    Resource, Step, Values, VersionedApplicationSpec, to_manifest,
};
use meshpack_engine::TemplateRenderer;
use meshpack_kube::{ClusterQuery, SecretResolver};
use std::sync::Arc;

use crate::cancel::CancelSignal;
use crate::config::ResolverConfig;
use crate::error::{PlanError, Result, ValidationReport, suggest};
use crate::layers::LayerComposer;
use crate::params::{self, ParameterResolver, PendingParameter, ResolvedParameter, ValueSource};
use crate::request::PlanRequest;
use crate::steps::{StepOrchestrator, StepSummary, plan_steps};
use crate::store::SpecStore;

/// The resolved, ordered manifests of one installation
#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub application: String,
    pub version: String,
    pub flavor: Option<String>,
    pub namespace: String,
    pub resources: Vec<Resource>,
    pub steps: Vec<StepSummary>,
    /// Values the templates were rendered with
    pub values: Values,
    pub parameters: Vec<ResolvedParameter>,
    step_label: String,
}

impl InstallPlan {
    /// The plan as one `---` separated YAML stream
    pub fn to_manifest(&self) -> Result<String> {
        Ok(to_manifest(&self.resources)?)
    }

    /// Resources rendered by the named step
    pub fn resources_for_step<'a>(&'a self, step: &'a str) -> impl Iterator<Item = &'a Resource> {
        self.resources
            .iter()
            .filter(move |r| r.label(&self.step_label) == Some(step))
    }

    /// Resources contributed by layer fragments
    pub fn layer_resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources
            .iter()
            .filter(|r| r.label(&self.step_label).is_none())
    }
}

/// Everything phases 1 to 4 established
struct Checked<'s> {
    version: &'s VersionedApplicationSpec,
    flavor: Option<&'s Flavor>,
    composer: LayerComposer<'s>,
    steps: Vec<Step>,
    documents: ValueDocuments,
    parameters: Vec<ResolvedParameter>,
}

/// Value documents parsed during the static phase
///
/// Parameters are written in at the scope that supplied them: version and
/// flavor defaults under the layers, each option's defaults with its
/// overlay, caller overrides above the caller's values.
struct ValueDocuments {
    base: Values,
    overlays: Vec<(ValueSource, Values)>,
    user: Values,
}

impl ValueDocuments {
    fn parse(
        version: &VersionedApplicationSpec,
        composer: &LayerComposer<'_>,
        request: &PlanRequest,
    ) -> Result<Self> {
        Ok(Self {
            base: Values::from_optional_yaml(version.values_yaml.as_deref())?,
            overlays: composer.overlays()?,
            user: Values::from_optional_yaml(request.values_yaml.as_deref())?,
        })
    }

    fn compose(self, parameters: &[ResolvedParameter]) -> Result<Values> {
        let mut values = self.base;
        params::inject(
            &mut values,
            parameters
                .iter()
                .filter(|p| matches!(p.source, ValueSource::Version | ValueSource::Flavor { .. })),
        )?;

        for (source, overlay) in &self.overlays {
            values.merge(overlay);
            params::inject(&mut values, parameters.iter().filter(|p| &p.source == source))?;
        }

        values.merge(&self.user);
        params::inject(
            &mut values,
            parameters.iter().filter(|p| p.source == ValueSource::Override),
        )?;
        Ok(values)
    }
}

/// Composes installation plans from stored application specs
///
/// Holds no per-request state; one resolver can serve concurrent requests.
pub struct PlanResolver {
    store: Arc<dyn SpecStore>,
    renderer: Arc<dyn TemplateRenderer>,
    cluster: Arc<dyn ClusterQuery>,
    config: ResolverConfig,
}

impl PlanResolver {
    pub fn new(
        store: Arc<dyn SpecStore>,
        renderer: Arc<dyn TemplateRenderer>,
        cluster: Arc<dyn ClusterQuery>,
    ) -> Self {
        Self {
            store,
            renderer,
            cluster,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub async fn resolve(&self, request: &PlanRequest) -> Result<InstallPlan> {
        self.resolve_with_cancel(request, &CancelSignal::new()).await
    }

    /// Resolve, giving up before the next unstarted step once `cancel` is raised
    pub async fn resolve_with_cancel(
        &self,
        request: &PlanRequest,
        cancel: &CancelSignal,
    ) -> Result<InstallPlan> {
        let spec = self.load_spec(&request.application).await?;
        let checked = self.check(&spec, request).await.map_err(fold)?;
        self.render(request, checked, cancel).await
    }

    /// Run every check without rendering
    pub async fn validate(&self, request: &PlanRequest) -> ValidationReport {
        let errors = match self.load_spec(&request.application).await {
            Ok(spec) => self.check(&spec, request).await.err().unwrap_or_default(),
            Err(e) => vec![e],
        };
        ValidationReport { errors }
    }

    async fn load_spec(&self, name: &str) -> Result<Arc<ApplicationSpec>> {
        if let Some(spec) = self.store.get(name).await? {
            return Ok(spec);
        }
        let names = self.store.names().await?;
        Err(PlanError::ApplicationNotFound {
            name: name.to_string(),
            help: suggest(name, names.iter().map(String::as_str)),
        })
    }

    async fn check<'s>(
        &self,
        spec: &'s ApplicationSpec,
        request: &PlanRequest,
    ) -> std::result::Result<Checked<'s>, Vec<PlanError>> {
        // Phase 1: static
        let Some(version) = spec.find_version(&request.version) else {
            return Err(vec![PlanError::VersionNotFound {
                application: spec.name.clone(),
                version: request.version.clone(),
                help: suggest(&request.version, spec.version_names()),
            }]);
        };

        let mut errors = Vec::new();

        let flavor = match &request.flavor {
            Some(name) => match version.find_flavor(name) {
                Some(flavor) => Some(flavor),
                None => {
                    errors.push(PlanError::FlavorNotFound {
                        version: version.version.clone(),
                        flavor: name.clone(),
                        help: suggest(name, version.flavor_names()),
                    });
                    None
                }
            },
            None => None,
        };

        // Layer choices can only be judged against a known flavor
        let composer = if request.flavor.is_some() && flavor.is_none() {
            None
        } else {
            match LayerComposer::select(flavor, &request.layers) {
                Ok(composer) => Some(composer),
                Err(layer_errors) => {
                    errors.extend(layer_errors);
                    None
                }
            }
        };

        let mut resolver = ParameterResolver::new().scope(ValueSource::Version, &version.parameters);
        if let Some(flavor) = flavor {
            resolver = resolver.scope(
                ValueSource::Flavor {
                    flavor: flavor.name.clone(),
                },
                &flavor.parameters,
            );
        }
        if let Some(composer) = &composer {
            for (source, parameters) in composer.parameter_scopes() {
                resolver = resolver.scope(source, parameters);
            }
        }
        let pending = match resolver.overrides(&request.parameters).check() {
            Ok(pending) => pending,
            Err(param_errors) => {
                errors.extend(param_errors);
                Vec::new()
            }
        };

        let steps = match &version.install {
            Some(install) => plan_steps(install, &self.config.implicit_step),
            None => {
                errors.push(PlanError::NoInstallSourceDefined {
                    version: version.version.clone(),
                });
                Vec::new()
            }
        };

        let documents = match &composer {
            Some(composer) => match ValueDocuments::parse(version, composer, request) {
                Ok(documents) => Some(documents),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
            None => None,
        };

        let (Some(composer), Some(documents), true) = (composer, documents, errors.is_empty())
        else {
            return Err(errors);
        };
        tracing::debug!(
            application = %spec.name,
            version = %version.version,
            flavor = ?request.flavor,
            "static checks passed"
        );

        // Phase 2: compatibility
        if let Some(flavor) = flavor {
            match flavor.check_compatibility(request.mesh.as_ref()) {
                Ok(Compatibility::Compatible) => {}
                Ok(Compatibility::Incompatible { unmet }) => {
                    return Err(vec![PlanError::FlavorIncompatible {
                        flavor: flavor.name.clone(),
                        unmet,
                    }]);
                }
                Err(e) => return Err(vec![e.into()]),
            }
        }

        // Phase 3: dependencies
        composer
            .check_dependencies(self.cluster.as_ref(), &request.namespace)
            .await?;

        // Phase 4: secrets, through a resolver scoped to this call
        let parameters = self.resolve_parameters(pending, &request.namespace).await?;

        Ok(Checked {
            version,
            flavor,
            composer,
            steps,
            documents,
            parameters,
        })
    }

    async fn resolve_parameters(
        &self,
        pending: Vec<PendingParameter>,
        namespace: &str,
    ) -> std::result::Result<Vec<ResolvedParameter>, Vec<PlanError>> {
        let secrets = SecretResolver::new(self.cluster.as_ref(), namespace);
        params::resolve(pending, &secrets).await
    }

    async fn render(
        &self,
        request: &PlanRequest,
        checked: Checked<'_>,
        cancel: &CancelSignal,
    ) -> Result<InstallPlan> {
        let Checked {
            version,
            flavor,
            composer,
            steps,
            documents,
            parameters,
        } = checked;

        let values = documents.compose(&parameters)?;

        let context = RenderContext::new(
            &values,
            ReleaseInfo {
                name: request.install_name().to_string(),
                namespace: request.namespace.clone(),
            },
            ApplicationInfo {
                name: request.application.clone(),
                version: version.version.clone(),
                flavor: flavor.map(|f| f.name.clone()),
            },
        )
        .with_mesh(request.mesh.as_ref());

        let mut orchestrator =
            StepOrchestrator::new(self.renderer.as_ref(), &self.config, cancel);
        let output = orchestrator
            .run(&steps, &composer.fragments(), &context)
            .await?;

        let mut resources = output.resources;
        if !version.required_labels.is_empty() {
            let before = resources.len();
            resources.retain(|r| r.has_labels(&version.required_labels));
            tracing::debug!(
                dropped = before - resources.len(),
                "filtered resources by required labels"
            );
        }
        if !version.respect_manifest_namespaces {
            for resource in &mut resources {
                resource.set_namespace(&request.namespace);
            }
        }

        let steps = output
            .steps
            .into_iter()
            .map(|summary| StepSummary {
                resources: resources
                    .iter()
                    .filter(|r| r.label(&self.config.step_label) == Some(summary.name.as_str()))
                    .count(),
                name: summary.name,
            })
            .collect();

        tracing::debug!(
            application = %request.application,
            resources = resources.len(),
            "plan resolved"
        );

        Ok(InstallPlan {
            application: request.application.clone(),
            version: version.version.clone(),
            flavor: flavor.map(|f| f.name.clone()),
            namespace: request.namespace.clone(),
            resources,
            steps,
            values,
            parameters,
            step_label: self.config.step_label.clone(),
        })
    }
}

fn fold(errors: Vec<PlanError>) -> PlanError {
    PlanError::from_errors(errors).unwrap_or(PlanError::Validation { errors: Vec::new() })
}
