//! Rendered Kubernetes resources
//!
//! A [`Resource`] keeps the full manifest body and exposes the fields the
//! planner cares about (kind, name, namespace, labels). The body is the
//! single source of truth: mutators write straight into `metadata`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};

/// A parsed Kubernetes resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource {
    body: JsonValue,
}

impl Resource {
    /// Wrap a manifest body; it must be a mapping with a `kind`
    pub fn from_value(body: JsonValue) -> Result<Self> {
        let Some(obj) = body.as_object() else {
            return Err(CoreError::InvalidManifest {
                message: "manifest document is not a mapping".to_string(),
            });
        };
        if obj.get("kind").and_then(JsonValue::as_str).is_none_or(str::is_empty) {
            return Err(CoreError::InvalidManifest {
                message: "manifest document has no kind".to_string(),
            });
        }
        Ok(Self { body })
    }

    /// Parse a single YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let body: JsonValue = serde_yaml::from_str(yaml)?;
        Self::from_value(body)
    }

    pub fn api_version(&self) -> &str {
        self.body
            .get("apiVersion")
            .and_then(JsonValue::as_str)
            .unwrap_or("")
    }

    pub fn kind(&self) -> &str {
        self.body.get("kind").and_then(JsonValue::as_str).unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.metadata_str("name").unwrap_or("")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata_str("namespace")
    }

    /// Value of one label
    pub fn label(&self, key: &str) -> Option<&str> {
        self.body
            .get("metadata")
            .and_then(|m| m.get("labels"))
            .and_then(|l| l.get(key))
            .and_then(JsonValue::as_str)
    }

    /// All string-valued labels
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.body
            .get("metadata")
            .and_then(|m| m.get("labels"))
            .and_then(JsonValue::as_object)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True if every required pair is present with the same value
    pub fn has_labels(&self, required: &BTreeMap<String, String>) -> bool {
        required
            .iter()
            .all(|(k, v)| self.label(k) == Some(v.as_str()))
    }

    pub fn set_label(&mut self, key: &str, value: &str) {
        let labels = self
            .metadata_mut()
            .entry("labels")
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !labels.is_object() {
            *labels = JsonValue::Object(Map::new());
        }
        if let JsonValue::Object(labels) = labels {
            labels.insert(key.to_string(), JsonValue::String(value.to_string()));
        }
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        self.metadata_mut().insert(
            "namespace".to_string(),
            JsonValue::String(namespace.to_string()),
        );
    }

    /// Identity key: `Kind/namespace/name`, namespace empty when unset
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}",
            self.kind(),
            self.namespace().unwrap_or(""),
            self.name()
        )
    }

    pub fn body(&self) -> &JsonValue {
        &self.body
    }

    pub fn into_body(self) -> JsonValue {
        self.body
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.body)?)
    }

    fn metadata_str(&self, field: &str) -> Option<&str> {
        self.body
            .get("metadata")
            .and_then(|m| m.get(field))
            .and_then(JsonValue::as_str)
    }

    fn metadata_mut(&mut self) -> &mut Map<String, JsonValue> {
        if !self.body.is_object() {
            self.body = JsonValue::Object(Map::new());
        }
        let JsonValue::Object(obj) = &mut self.body else {
            unreachable!("body was just made an object");
        };
        let metadata = obj
            .entry("metadata")
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !metadata.is_object() {
            *metadata = JsonValue::Object(Map::new());
        }
        match metadata {
            JsonValue::Object(map) => map,
            _ => unreachable!("metadata was just made an object"),
        }
    }
}

/// Parse a multi-document YAML stream into resources
///
/// Documents are separated by `---` lines. Documents holding only blank
/// lines or comments are skipped; any other document must be a resource.
pub fn parse_manifests(text: &str) -> Result<Vec<Resource>> {
    split_documents(text)
        .into_iter()
        .filter(|doc| !is_blank_document(doc))
        .map(|doc| Resource::from_yaml(&doc))
        .collect()
}

/// Serialize resources as a `---`-separated YAML stream
pub fn to_manifest(resources: &[Resource]) -> Result<String> {
    let mut out = String::new();
    for resource in resources {
        out.push_str("---\n");
        out.push_str(&resource.to_yaml()?);
    }
    Ok(out)
}

fn split_documents(text: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.trim_end() == "---" || line.starts_with("--- ") {
            documents.push(std::mem::take(&mut current));
            if let Some(rest) = line.strip_prefix("--- ") {
                current.push_str(rest);
                current.push('\n');
            }
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    documents.push(current);

    documents
}

fn is_blank_document(doc: &str) -> bool {
    doc.lines().all(|line| {
        let trimmed = line.trim();
        trimmed.is_empty() || trimmed.starts_with('#')
    })
}
