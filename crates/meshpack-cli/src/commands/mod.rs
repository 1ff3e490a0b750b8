//! CLI commands

pub mod render;
pub mod show;
pub mod validate;

use clap::Args;
use meshpack_core::{MeshRuntime, MeshType, Values, parse_assignments};
use meshpack_engine::{ChartRenderer, Engine};
use meshpack_kube::{ClusterQuery, KubeCluster, StaticCluster};
use meshpack_plan::{InMemorySpecStore, PlanRequest, PlanResolver};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{CliError, Result};

/// Arguments shared by every command that plans an installation
#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Application spec file (YAML)
    pub spec: PathBuf,

    /// Application version to install
    #[arg(long = "version", value_name = "VERSION")]
    pub app_version: String,

    /// Flavor of the version
    #[arg(long)]
    pub flavor: Option<String>,

    /// Select a layer option (layer=option, can be repeated)
    #[arg(short, long = "layer", value_name = "LAYER=OPTION")]
    pub layers: Vec<String>,

    /// Override a parameter (name=value, can be repeated)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,

    /// Additional values files (merged in order)
    #[arg(short = 'f', long = "values")]
    pub values: Vec<PathBuf>,

    /// Install namespace
    #[arg(short, long, env = "MESHPACK_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Install name (defaults to the application name)
    #[arg(long)]
    pub name: Option<String>,

    /// Mesh type of the target runtime
    #[arg(long, requires = "mesh_version")]
    pub mesh: Option<MeshType>,

    /// Mesh version of the target runtime
    #[arg(long, requires = "mesh")]
    pub mesh_version: Option<String>,

    /// Read secrets and check dependencies against the current kube context
    #[arg(long)]
    pub cluster: bool,

    /// Offline secret (name:key=value, can be repeated); ignored with --cluster
    #[arg(long = "secret", value_name = "NAME:KEY=VALUE")]
    pub secrets: Vec<String>,

    /// Render undefined template variables as empty instead of failing
    #[arg(long)]
    pub lenient: bool,
}

impl PlanArgs {
    /// Build the resolver and the request this invocation describes
    pub async fn prepare(&self) -> Result<(PlanResolver, PlanRequest)> {
        let mut store = InMemorySpecStore::new();
        let application = store.load_file(&self.spec)?;

        let base_dir = self
            .spec
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let engine = Engine::builder().strict(!self.lenient).build();
        let renderer = ChartRenderer::new(engine, base_dir);

        let cluster = self.cluster().await?;
        let resolver = PlanResolver::new(Arc::new(store), Arc::new(renderer), cluster);

        Ok((resolver, self.request(application)?))
    }

    fn request(&self, application: String) -> Result<PlanRequest> {
        let mut request = PlanRequest::new(application, &self.app_version, &self.namespace);
        request.flavor = self.flavor.clone();
        request.release_name = self.name.clone();
        request.layers = parse_assignments(&self.layers)?;
        request.parameters = parse_assignments(&self.set)?;

        if let (Some(mesh), Some(version)) = (self.mesh, &self.mesh_version) {
            request.mesh = Some(MeshRuntime::new(mesh, version));
        }

        if !self.values.is_empty() {
            let mut values = Values::new();
            for file in &self.values {
                values.merge(&Values::from_file(file)?);
            }
            request.values_yaml = Some(values.to_yaml()?);
        }

        tracing::debug!(?request, "built plan request");
        Ok(request)
    }

    async fn cluster(&self) -> Result<Arc<dyn ClusterQuery>> {
        if self.cluster {
            let cluster = KubeCluster::connect()
                .await
                .map_err(|e| CliError::Cluster {
                    message: e.to_string(),
                })?;
            return Ok(Arc::new(cluster));
        }

        let mut cluster = StaticCluster::new();
        for raw in &self.secrets {
            let (name, key, value) = parse_secret(raw)?;
            cluster = cluster.with_secret(&self.namespace, name, key, value);
        }
        Ok(Arc::new(cluster))
    }
}

/// Split `name:key=value`
fn parse_secret(raw: &str) -> Result<(&str, &str, &str)> {
    let parsed = raw
        .split_once('=')
        .and_then(|(reference, value)| {
            let (name, key) = reference.split_once(':')?;
            Some((name.trim(), key.trim(), value))
        })
        .filter(|(name, key, _)| !name.is_empty() && !key.is_empty());

    parsed.ok_or_else(|| {
        CliError::usage_with_help(
            format!("Invalid secret '{}'", raw),
            "expected the form name:key=value",
        )
    })
}
