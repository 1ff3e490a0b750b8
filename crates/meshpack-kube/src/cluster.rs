//! Read-only cluster queries
//!
//! Planning only ever reads from the cluster. [`ClusterQuery`] is the seam:
//! [`KubeCluster`] talks to a real API server, [`StaticCluster`] serves a
//! fixed set of secrets from memory (offline rendering and tests).

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::Client;
use kube::api::Api;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{KubeError, Result};

/// Data of one secret: key to raw bytes
pub type SecretData = BTreeMap<String, Vec<u8>>;

/// Cluster lookups needed while planning
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait ClusterQuery: Send + Sync {
    /// Fetch a secret's data, `None` if it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<SecretData>>;
}

/// Cluster queries against the Kubernetes API
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Connect using the default kubeconfig or in-cluster configuration
    pub async fn connect() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    /// Create with an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn secrets_api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterQuery for KubeCluster {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<SecretData>> {
        tracing::debug!(namespace, name, "looking up secret");

        let Some(secret) = self.secrets_api(namespace).get_opt(name).await? else {
            return Ok(None);
        };

        let data = secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(key, bytes)| (key, bytes.0))
            .collect();
        Ok(Some(data))
    }
}

/// In-memory cluster holding a fixed set of secrets
///
/// Clones share the lookup counter, so a test can hand a clone to the
/// planner and assert on the original.
#[derive(Debug, Clone, Default)]
pub struct StaticCluster {
    secrets: Arc<BTreeMap<(String, String), SecretData>>,
    unavailable: Option<String>,
    lookups: Arc<AtomicUsize>,
}

impl StaticCluster {
    /// Create an empty cluster
    pub fn new() -> Self {
        Self::default()
    }

    /// A cluster whose every query fails
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            unavailable: Some(message.into()),
            ..Self::default()
        }
    }

    /// Add one key of a secret, creating the secret if needed
    pub fn with_secret(
        mut self,
        namespace: &str,
        name: &str,
        key: &str,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Arc::make_mut(&mut self.secrets)
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }

    /// Number of `get_secret` calls served so far
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterQuery for StaticCluster {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<SecretData>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.unavailable {
            return Err(KubeError::Unavailable(message.clone()));
        }

        Ok(self
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}
