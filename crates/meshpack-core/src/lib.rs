//! Meshpack Core - Data model for packaged mesh applications
//!
//! This crate provides the foundational types used throughout meshpack:
//! - `ApplicationSpec`: versioned application descriptions (install sources,
//!   flavors, customization layers)
//! - `Parameter`: typed parameters and their literal forms
//! - `Values`: configuration values with deep merge support
//! - `Resource`: rendered manifests
//! - `compat`: mesh runtime requirements
//! - `RenderContext`: template rendering context

pub mod archive;
pub mod compat;
pub mod context;
pub mod error;
pub mod parameter;
pub mod resource;
pub mod spec;
pub mod values;

pub use compat::{
    Compatibility, MeshRequirement, MeshRuntime, MeshType, RequirementSet, VersionRange,
    check_requirements,
};
pub use context::{ApplicationInfo, ReleaseInfo, RenderContext};
pub use error::{CoreError, Result};
pub use parameter::{Parameter, ParameterType, ParameterValue, SecretRef, SecretValue};
pub use resource::{Resource, parse_manifests, to_manifest};
pub use spec::{
    ApplicationSpec, ApplicationType, ArchiveLocation, ChartDirectory, Flavor, InstallSource,
    InstallationSpec, InstallationSteps, Layer, LayerOption, ResourceDependency,
    SecretDependency, Step, VersionedApplicationSpec,
};
pub use values::{Values, infer_scalar, parse_assignments};
