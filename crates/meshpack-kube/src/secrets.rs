//! Secret parameter resolution
//!
//! Turns a [`SecretValue`] into its literal string. Values are read on demand
//! and never cached or logged; only the reference appears in traces.

use meshpack_core::SecretValue;

use crate::cluster::ClusterQuery;
use crate::error::{KubeError, Result};

/// Resolves secret references against one install namespace
///
/// Construct a fresh resolver per planning call.
pub struct SecretResolver<'a> {
    cluster: &'a dyn ClusterQuery,
    namespace: &'a str,
}

impl<'a> SecretResolver<'a> {
    pub fn new(cluster: &'a dyn ClusterQuery, namespace: &'a str) -> Self {
        Self { cluster, namespace }
    }

    /// Resolve a secret value to its literal string
    pub async fn resolve(&self, value: &SecretValue) -> Result<String> {
        tracing::debug!(reference = %value, namespace = self.namespace, "resolving secret");

        match value {
            SecretValue::Plaintext(text) => Ok(text.clone()),
            SecretValue::Path(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| KubeError::SecretSourceUnavailable {
                        reference: value.to_string(),
                        message: e.to_string(),
                    })
            }
            SecretValue::SecretRef(reference) => {
                let not_found = || KubeError::SecretNotFound {
                    namespace: self.namespace.to_string(),
                    name: reference.name.clone(),
                    key: reference.key.clone(),
                };

                let data = self
                    .cluster
                    .get_secret(self.namespace, &reference.name)
                    .await?
                    .ok_or_else(not_found)?;
                let bytes = data.get(&reference.key).ok_or_else(not_found)?;

                String::from_utf8(bytes.clone()).map_err(|_| {
                    KubeError::SecretSourceUnavailable {
                        reference: value.to_string(),
                        message: "secret data is not valid UTF-8".to_string(),
                    }
                })
            }
        }
    }
}
