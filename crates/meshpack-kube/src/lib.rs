//! Meshpack Kube - Kubernetes integration for meshpack
//!
//! This crate provides:
//! - **Cluster queries**: the read-only [`ClusterQuery`] seam, backed by the
//!   Kubernetes API ([`KubeCluster`]) or by memory ([`StaticCluster`])
//! - **Secret resolution**: [`SecretResolver`] turns secret references into
//!   literal values scoped to the install namespace

pub mod cluster;
pub mod error;
pub mod secrets;

pub use cluster::{ClusterQuery, KubeCluster, SecretData, StaticCluster};
pub use error::{KubeError, Result};
pub use secrets::SecretResolver;
