//! Meshpack Plan - installation plan composition
//!
//! Given an application spec and the caller's choices (flavor, layer
//! options, parameter overrides, namespace), [`PlanResolver`] produces the
//! ordered, fully parameterized resources to apply, or every reason the
//! installation would be rejected.
//!
//! # Example
//!
//! ```ignore
//! use meshpack_plan::{InMemorySpecStore, PlanRequest, PlanResolver};
//!
//! let resolver = PlanResolver::new(store, renderer, cluster);
//! let plan = resolver
//!     .resolve(&PlanRequest::new("gloo", "0.13.0", "gloo-system").layer("mtls", "strict"))
//!     .await?;
//! println!("{}", plan.to_manifest()?);
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod layers;
pub mod params;
pub mod request;
pub mod resolver;
pub mod steps;
pub mod store;

pub use cancel::CancelSignal;
pub use config::ResolverConfig;
pub use error::{PlanError, ReportEntry, Result, ValidationReport};
pub use layers::{LayerComposer, LayerFragment};
pub use params::{ParameterResolver, ResolvedParameter, ValueSource};
pub use request::PlanRequest;
pub use resolver::{InstallPlan, PlanResolver};
pub use steps::{StepState, StepSummary};
pub use store::{InMemorySpecStore, SpecStore};
