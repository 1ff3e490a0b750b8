//! Meshpack Engine - Jinja2 templating for mesh application charts
//!
//! This crate provides:
//! - A MiniJinja-based [`Engine`] with Kubernetes-oriented filters
//! - [`Chart`] loading from directories and archives
//! - The [`TemplateRenderer`] seam and its default [`ChartRenderer`]
//! - Source-mapped error messages with suggestions

pub mod chart;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod filters;
pub mod functions;
pub mod renderer;

pub use chart::{Chart, load_manifests};
pub use engine::{Engine, EngineBuilder, EngineConfig, RenderedTemplate};
pub use error::{EngineError, Result, TemplateError, TemplateErrorKind};
pub use fetcher::{ArtifactFetcher, LocalFetcher};
pub use renderer::{ChartRenderer, TemplateRenderer};
