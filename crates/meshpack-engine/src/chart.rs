//! Charts and manifest bundles
//!
//! A chart is a `values.yaml` with defaults plus a `templates/` tree. It can
//! be loaded from a directory or from a gzipped tarball; both end up as the
//! same in-memory [`Chart`].

use meshpack_core::archive::read_archive_text;
use meshpack_core::{RenderContext, Resource, Values, parse_manifests};
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

use crate::engine::Engine;
use crate::error::{EngineError, Result};

const TEMPLATES_DIR: &str = "templates/";
const VALUES_FILE: &str = "values.yaml";
const TEMPLATE_EXTENSIONS: &[&str] = &["yaml", "yml", "j2", "tpl"];
const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// A loaded chart
#[derive(Debug, Clone)]
pub struct Chart {
    pub name: String,

    /// Chart defaults, lowest precedence
    pub defaults: Values,

    /// Template sources keyed by path relative to `templates/`
    pub templates: BTreeMap<String, String>,
}

impl Chart {
    /// Load a chart directory
    pub fn load_dir(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(EngineError::Chart {
                message: format!("chart directory not found: {}", root.display()),
            });
        }

        let mut files = BTreeMap::new();
        let values_path = root.join(VALUES_FILE);
        if values_path.exists() {
            files.insert(VALUES_FILE.to_string(), std::fs::read_to_string(values_path)?);
        }

        let templates_dir = root.join(TEMPLATES_DIR);
        if templates_dir.is_dir() {
            for entry in WalkDir::new(&templates_dir).follow_links(true) {
                let entry = entry.map_err(|e| EngineError::Chart {
                    message: format!("failed to read {}: {}", templates_dir.display(), e),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let rel = entry
                    .path()
                    .strip_prefix(root)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                files.insert(rel, std::fs::read_to_string(entry.path())?);
            }
        }

        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "chart".to_string());

        Self::from_files(name, files)
    }

    /// Load a chart from a gzipped tarball
    pub fn from_archive(name: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        Self::from_files(name.into(), read_archive_text(bytes)?)
    }

    /// Build a chart from chart-root-relative paths and contents
    pub fn from_files(name: String, files: BTreeMap<String, String>) -> Result<Self> {
        let defaults = Values::from_optional_yaml(files.get(VALUES_FILE).map(String::as_str))?;

        let templates: BTreeMap<String, String> = files
            .into_iter()
            .filter_map(|(path, content)| {
                let rel = path.strip_prefix(TEMPLATES_DIR)?;
                has_extension(rel, TEMPLATE_EXTENSIONS).then(|| (rel.to_string(), content))
            })
            .collect();

        if templates.is_empty() {
            return Err(EngineError::Chart {
                message: format!("chart '{}' has no templates", name),
            });
        }

        Ok(Self {
            name,
            defaults,
            templates,
        })
    }

    /// Render every template with the chart defaults under the context values
    pub fn render(&self, engine: &Engine, context: &RenderContext) -> Result<Vec<Resource>> {
        let mut values = self.defaults.clone();
        values.merge(&Values(context.values.clone()));

        let context = RenderContext {
            values: values.into_inner(),
            ..context.clone()
        };

        let mut resources = Vec::new();
        for rendered in engine.render_templates(&self.templates, &context)? {
            let parsed = parse_manifests(&rendered.output).map_err(|source| {
                EngineError::Manifest {
                    template: rendered.name.clone(),
                    source,
                }
            })?;
            resources.extend(parsed);
        }

        tracing::debug!(chart = %self.name, resources = resources.len(), "rendered chart");
        Ok(resources)
    }
}

/// Parse a tarball of plain manifests, files in path order
///
/// Manifests are used as-is; no templating is applied.
pub fn load_manifests(bytes: &[u8]) -> Result<Vec<Resource>> {
    let mut resources = Vec::new();

    for (path, content) in read_archive_text(bytes)? {
        if !has_extension(&path, MANIFEST_EXTENSIONS) {
            tracing::warn!(file = %path, "skipping non-manifest file in archive");
            continue;
        }
        let parsed = parse_manifests(&content).map_err(|source| EngineError::Manifest {
            template: path.clone(),
            source,
        })?;
        resources.extend(parsed);
    }

    Ok(resources)
}

fn has_extension(path: &str, extensions: &[&str]) -> bool {
    path.rsplit_once('.')
        .is_some_and(|(_, ext)| extensions.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshpack_core::archive::create_archive;
    use meshpack_core::{ApplicationInfo, ReleaseInfo};
    use tempfile::TempDir;

    fn context(values: &str) -> RenderContext {
        RenderContext::new(
            &Values::from_yaml(values).unwrap(),
            ReleaseInfo {
                name: "gloo".into(),
                namespace: "gloo-system".into(),
            },
            ApplicationInfo {
                name: "gloo".into(),
                version: "0.13.0".into(),
                flavor: None,
            },
        )
    }

    const DEPLOYMENT: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {{ release.name }}-gateway
spec:
  replicas: {{ values.replicas }}
"#;

    fn write_chart(root: &Path) {
        std::fs::create_dir_all(root.join("templates/extra")).unwrap();
        std::fs::write(root.join("values.yaml"), "replicas: 1\n").unwrap();
        std::fs::write(root.join("templates/deployment.yaml"), DEPLOYMENT).unwrap();
        std::fs::write(
            root.join("templates/extra/service.yaml"),
            "kind: Service\nmetadata:\n  name: {{ release.name }}\n",
        )
        .unwrap();
        std::fs::write(root.join("templates/NOTES.txt"), "ignored").unwrap();
    }

    #[test]
    fn test_load_dir() {
        let temp = TempDir::new().unwrap();
        write_chart(temp.path());

        let chart = Chart::load_dir(temp.path()).unwrap();

        let names: Vec<_> = chart.templates.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["deployment.yaml", "extra/service.yaml"]);
        assert_eq!(chart.defaults.get("replicas").unwrap(), 1);
    }

    #[test]
    fn test_missing_dir() {
        let err = Chart::load_dir(Path::new("/nonexistent/chart")).unwrap_err();
        assert!(matches!(err, EngineError::Chart { .. }));
    }

    #[test]
    fn test_render_defaults_are_overridden() {
        let temp = TempDir::new().unwrap();
        write_chart(temp.path());
        let chart = Chart::load_dir(temp.path()).unwrap();

        let resources = chart.render(&Engine::default(), &context("replicas: 3")).unwrap();

        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].name(), "gloo-gateway");
        assert_eq!(resources[0].body()["spec"]["replicas"], 3);
        assert_eq!(resources[1].kind(), "Service");
    }

    #[test]
    fn test_render_manifest_snapshot() {
        let temp = TempDir::new().unwrap();
        write_chart(temp.path());
        let chart = Chart::load_dir(temp.path()).unwrap();

        let resources = chart.render(&Engine::default(), &context("replicas: 3")).unwrap();
        let manifest = meshpack_core::to_manifest(&resources).unwrap();

        insta::assert_snapshot!(manifest, @r"
        ---
        apiVersion: apps/v1
        kind: Deployment
        metadata:
          name: gloo-gateway
        spec:
          replicas: 3
        ---
        kind: Service
        metadata:
          name: gloo
        ");
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_templates_fail_load() {
        let temp = TempDir::new().unwrap();
        write_chart(temp.path());
        std::os::unix::fs::symlink(
            temp.path().join("templates"),
            temp.path().join("templates/extra/loop"),
        )
        .unwrap();

        let err = Chart::load_dir(temp.path()).unwrap_err();
        assert!(matches!(err, EngineError::Chart { ref message } if message.contains("templates")));
    }

    #[test]
    fn test_chart_from_archive() {
        let bytes = create_archive([
            ("gloo/values.yaml", b"replicas: 2\n".as_slice()),
            ("gloo/templates/deployment.yaml", DEPLOYMENT.as_bytes()),
        ])
        .unwrap();

        let chart = Chart::from_archive("gloo", &bytes).unwrap();
        let resources = chart.render(&Engine::default(), &context("{}")).unwrap();

        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].body()["spec"]["replicas"], 2);
    }

    #[test]
    fn test_chart_without_templates() {
        let err = Chart::from_files("empty".into(), BTreeMap::new()).unwrap_err();
        assert!(matches!(err, EngineError::Chart { .. }));
    }

    #[test]
    fn test_invalid_rendered_manifest() {
        let mut files = BTreeMap::new();
        files.insert("templates/bad.yaml".to_string(), "metadata:\n  name: x\n".to_string());
        let chart = Chart::from_files("bad".into(), files).unwrap();

        let err = chart.render(&Engine::default(), &context("{}")).unwrap_err();
        assert!(matches!(err, EngineError::Manifest { ref template, .. } if template == "bad.yaml"));
    }

    #[test]
    fn test_load_manifests() {
        let bytes = create_archive([
            ("crds/01-gateway.yaml", b"kind: CustomResourceDefinition\nmetadata:\n  name: gateways\n".as_slice()),
            ("crds/02-vs.yaml", b"kind: CustomResourceDefinition\nmetadata:\n  name: virtualservices\n---\nkind: ConfigMap\nmetadata:\n  name: x\n".as_slice()),
            ("crds/README.md", b"# docs".as_slice()),
        ])
        .unwrap();

        let resources = load_manifests(&bytes).unwrap();

        let names: Vec<_> = resources.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["gateways", "virtualservices", "x"]);
    }
}
