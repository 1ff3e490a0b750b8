//! Template engine based on MiniJinja

use minijinja::{Environment, UndefinedBehavior};
use meshpack_core::RenderContext;
use std::collections::BTreeMap;

use crate::error::{EngineError, Result, TemplateError};
use crate::filters;
use crate::functions;

/// Engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fail on undefined variables instead of rendering them empty
    pub strict: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// One rendered, non-helper template
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTemplate {
    pub name: String,
    pub output: String,
}

/// Template engine builder
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strict mode (fail on undefined variables)
    pub fn strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    pub fn build(self) -> Engine {
        Engine::from_config(self.config)
    }
}

/// The template engine
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(strict: bool) -> Self {
        Self {
            config: EngineConfig { strict },
        }
    }

    pub fn from_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn is_strict(&self) -> bool {
        self.config.strict
    }

    fn create_environment(&self) -> Environment<'static> {
        let mut env = Environment::new();

        env.set_undefined_behavior(if self.config.strict {
            UndefinedBehavior::Strict
        } else {
            UndefinedBehavior::Lenient
        });

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("b64decode", filters::b64decode);
        env.add_filter("quote", filters::quote);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("indent", filters::indent);
        env.add_filter("required", filters::required);
        env.add_filter("sha256", filters::sha256sum);
        env.add_filter("trunc", filters::trunc);
        env.add_filter("semver_match", filters::semver_match);
        env.add_filter("dns1123", filters::dns1123);

        env.add_function("fail", functions::fail);
        env.add_function("dict", functions::dict);
        env.add_function("coalesce", functions::coalesce);
        env.add_function("ternary", functions::ternary);

        env
    }

    /// Render a single template string
    pub fn render_string(
        &self,
        template: &str,
        context: &RenderContext,
        template_name: &str,
    ) -> Result<String> {
        let mut templates = BTreeMap::new();
        templates.insert(template_name.to_string(), template.to_string());

        let mut env = self.create_environment();
        load_templates(&mut env, &templates, context)?;
        render_one(&env, template_name, template, context)
    }

    /// Render a set of templates keyed by relative path
    ///
    /// All templates are loaded so they can include each other; templates
    /// whose file name starts with `_` are helpers and are not rendered.
    /// Output is in path order, with blank results dropped.
    pub fn render_templates(
        &self,
        templates: &BTreeMap<String, String>,
        context: &RenderContext,
    ) -> Result<Vec<RenderedTemplate>> {
        let mut env = self.create_environment();
        load_templates(&mut env, templates, context)?;

        let mut rendered = Vec::new();
        for (name, source) in templates {
            if is_helper(name) {
                continue;
            }

            let output = render_one(&env, name, source, context)?;
            let trimmed = output.trim();
            if trimmed.is_empty() || trimmed == "---" {
                tracing::debug!(template = %name, "template rendered empty, skipping");
                continue;
            }

            rendered.push(RenderedTemplate {
                name: name.clone(),
                output,
            });
        }

        Ok(rendered)
    }
}

fn load_templates(
    env: &mut Environment<'static>,
    templates: &BTreeMap<String, String>,
    context: &RenderContext,
) -> Result<()> {
    for (name, source) in templates {
        env.add_template_owned(name.clone(), source.clone())
            .map_err(|e| {
                EngineError::Template(TemplateError::from_minijinja(
                    e,
                    name,
                    source,
                    Some(&context.values),
                ))
            })?;
    }
    Ok(())
}

fn render_one(
    env: &Environment<'static>,
    name: &str,
    source: &str,
    context: &RenderContext,
) -> Result<String> {
    let to_error = |e: minijinja::Error| {
        EngineError::Template(TemplateError::from_minijinja(
            e,
            name,
            source,
            Some(&context.values),
        ))
    };

    let ctx = minijinja::context! {
        values => &context.values,
        release => &context.release,
        application => &context.application,
        mesh => &context.mesh,
        step => &context.step,
    };

    env.get_template(name).map_err(to_error)?.render(ctx).map_err(to_error)
}

/// Helper templates (`_helpers.tpl`) are loaded but never rendered on their own
pub fn is_helper(path: &str) -> bool {
    path.rsplit('/').next().is_some_and(|file| file.starts_with('_'))
}
