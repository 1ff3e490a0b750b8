//! The templating seam used by the planner

use async_trait::async_trait;
use meshpack_core::{InstallSource, RenderContext, Resource, parse_manifests};
use std::path::PathBuf;
use std::sync::Arc;

use crate::chart::{Chart, load_manifests};
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::fetcher::{ArtifactFetcher, LocalFetcher};

/// Turns install sources and inline templates into resources
#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    /// Render one install source with the given context
    async fn render(&self, source: &InstallSource, context: &RenderContext)
    -> Result<Vec<Resource>>;

    /// Render an inline manifest template
    async fn render_fragment(
        &self,
        name: &str,
        template: &str,
        context: &RenderContext,
    ) -> Result<Vec<Resource>>;
}

/// MiniJinja-backed renderer for chart directories, chart archives and
/// manifest archives
pub struct ChartRenderer {
    engine: Engine,
    base_dir: PathBuf,
    fetcher: Arc<dyn ArtifactFetcher>,
}

impl ChartRenderer {
    /// Relative chart paths and archive URIs resolve against `base_dir`
    pub fn new(engine: Engine, base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            engine,
            fetcher: Arc::new(LocalFetcher::new(base_dir.clone())),
            base_dir,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    async fn load_chart_dir(&self, path: &std::path::Path) -> Result<Chart> {
        let root = self.base_dir.join(path);
        tokio::task::spawn_blocking(move || Chart::load_dir(&root))
            .await
            .map_err(|e| EngineError::Chart {
                message: format!("chart loading task failed: {}", e),
            })?
    }
}

#[async_trait]
impl TemplateRenderer for ChartRenderer {
    async fn render(
        &self,
        source: &InstallSource,
        context: &RenderContext,
    ) -> Result<Vec<Resource>> {
        tracing::debug!(source = %source.describe(), "rendering install source");

        match source {
            InstallSource::ChartDirectory(dir) => {
                let chart = self.load_chart_dir(&dir.path).await?;
                chart.render(&self.engine, context)
            }
            InstallSource::ChartArchive(archive) => {
                let bytes = self.fetcher.fetch(&archive.uri).await?;
                let name = archive_name(&archive.uri);
                Chart::from_archive(name, &bytes)?.render(&self.engine, context)
            }
            InstallSource::ManifestsArchive(archive) => {
                let bytes = self.fetcher.fetch(&archive.uri).await?;
                load_manifests(&bytes)
            }
        }
    }

    async fn render_fragment(
        &self,
        name: &str,
        template: &str,
        context: &RenderContext,
    ) -> Result<Vec<Resource>> {
        let output = self.engine.render_string(template, context, name)?;
        parse_manifests(&output).map_err(|source| EngineError::Manifest {
            template: name.to_string(),
            source,
        })
    }
}

/// `charts/gloo-0.13.0.tgz` -> `gloo-0.13.0`
fn archive_name(uri: &str) -> String {
    let file = uri.rsplit('/').next().unwrap_or(uri);
    file.trim_end_matches(".tgz")
        .trim_end_matches(".tar.gz")
        .to_string()
}
