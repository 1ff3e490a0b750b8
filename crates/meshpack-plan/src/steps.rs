//! Step orchestration
//!
//! Steps render strictly in declaration order, each through one templating
//! call. Every resource a step produces is labeled with the step name. Layer
//! fragments follow the last step and carry no step label.

use meshpack_core::{InstallSource, InstallationSpec, RenderContext, Resource, Step};
use meshpack_engine::TemplateRenderer;
use serde::Serialize;
use std::fmt;

use crate::cancel::CancelSignal;
use crate::config::ResolverConfig;
use crate::error::{PlanError, Result};
use crate::layers::LayerFragment;

/// Where an orchestration run is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepState {
    NotStarted,
    Rendering { step: String },
    Labeling { step: String },
    LayersApplied,
    Done,
    Failed,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => f.write_str("not-started"),
            Self::Rendering { step } => write!(f, "rendering({})", step),
            Self::Labeling { step } => write!(f, "labeling({})", step),
            Self::LayersApplied => f.write_str("layers-applied"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Resource count produced by one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSummary {
    pub name: String,
    pub resources: usize,
}

#[derive(Debug, Clone)]
pub struct StepOutput {
    pub resources: Vec<Resource>,
    pub steps: Vec<StepSummary>,
}

/// The steps of an install, with single sources wrapped in one implicit step
pub fn plan_steps(install: &InstallationSpec, implicit_step: &str) -> Vec<Step> {
    let single = |source: InstallSource| {
        vec![Step {
            name: implicit_step.to_string(),
            source,
        }]
    };

    match install {
        InstallationSpec::ChartDirectory(dir) => single(InstallSource::ChartDirectory(dir.clone())),
        InstallationSpec::ChartArchive(archive) => {
            single(InstallSource::ChartArchive(archive.clone()))
        }
        InstallationSpec::ManifestsArchive(archive) => {
            single(InstallSource::ManifestsArchive(archive.clone()))
        }
        InstallationSpec::InstallationSteps(steps) => steps.steps.clone(),
    }
}

/// Drives one rendering pass over steps and fragments
pub struct StepOrchestrator<'a> {
    renderer: &'a dyn TemplateRenderer,
    config: &'a ResolverConfig,
    cancel: &'a CancelSignal,
    state: StepState,
}

impl<'a> StepOrchestrator<'a> {
    pub fn new(
        renderer: &'a dyn TemplateRenderer,
        config: &'a ResolverConfig,
        cancel: &'a CancelSignal,
    ) -> Self {
        Self {
            renderer,
            config,
            cancel,
            state: StepState::NotStarted,
        }
    }

    pub fn state(&self) -> &StepState {
        &self.state
    }

    fn transition(&mut self, next: StepState) {
        tracing::debug!(from = %self.state, to = %next, "step state");
        self.state = next;
    }

    fn fail(&mut self, err: PlanError) -> PlanError {
        self.transition(StepState::Failed);
        err
    }

    /// Render every step then every fragment
    ///
    /// The first failure aborts the run; nothing rendered so far is returned.
    pub async fn run(
        &mut self,
        steps: &[Step],
        fragments: &[LayerFragment],
        context: &RenderContext,
    ) -> Result<StepOutput> {
        let mut resources = Vec::new();
        let mut summaries = Vec::with_capacity(steps.len());

        for step in steps {
            if self.cancel.is_cancelled() {
                return Err(self.fail(PlanError::Cancelled {
                    next_step: step.name.clone(),
                }));
            }

            self.transition(StepState::Rendering {
                step: step.name.clone(),
            });
            let step_context = context.for_step(Some(&step.name));
            let mut rendered = match self.renderer.render(&step.source, &step_context).await {
                Ok(rendered) => rendered,
                Err(e) => return Err(self.fail(PlanError::templating(&step.name, e))),
            };

            self.transition(StepState::Labeling {
                step: step.name.clone(),
            });
            for resource in &mut rendered {
                resource.set_label(&self.config.step_label, &step.name);
            }

            summaries.push(StepSummary {
                name: step.name.clone(),
                resources: rendered.len(),
            });
            resources.extend(rendered);
        }

        if let Some(first) = fragments.first() {
            if self.cancel.is_cancelled() {
                return Err(self.fail(PlanError::Cancelled {
                    next_step: first.name(),
                }));
            }
        }

        let fragment_context = context.for_step(None);
        for fragment in fragments {
            let name = fragment.name();
            match self
                .renderer
                .render_fragment(&name, &fragment.template, &fragment_context)
                .await
            {
                Ok(rendered) => resources.extend(rendered),
                Err(e) => return Err(self.fail(PlanError::templating(&name, e))),
            }
        }
        self.transition(StepState::LayersApplied);

        self.transition(StepState::Done);
        Ok(StepOutput {
            resources,
            steps: summaries,
        })
    }
}
