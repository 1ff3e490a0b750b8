//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Application spec not found: {path}")]
    SpecNotFound { path: String },

    #[error("Invalid application spec: {message}")]
    InvalidSpec { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version '{version}': {message}")]
    InvalidVersion { version: String, message: String },

    #[error("Values merge error: {message}")]
    ValuesMerge { message: String },

    #[error("Invalid manifest: {message}")]
    InvalidManifest { message: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    /// Secret-typed parameter values cannot be turned into literals without
    /// a secret resolver.
    #[error("secret parameter values cannot be rendered without a secret resolver")]
    SecretParameterRenderingUnsupported,
}

pub type Result<T> = std::result::Result<T, CoreError>;
