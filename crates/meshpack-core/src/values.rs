//! Values handling with deep merge support

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CoreError, Result};

/// Values container with deep merge capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Default for Values {
    fn default() -> Self {
        Self::new()
    }
}

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Load values from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse values from YAML string
    ///
    /// An empty document yields empty values rather than `null`.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::new());
        }
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        match value {
            JsonValue::Null => Ok(Self::new()),
            JsonValue::Object(_) => Ok(Self(value)),
            other => Err(CoreError::ValuesMerge {
                message: format!("values must be a mapping, got: {}", other),
            }),
        }
    }

    /// Parse an optional YAML blob, `None` meaning empty values
    pub fn from_optional_yaml(yaml: Option<&str>) -> Result<Self> {
        yaml.map(Self::from_yaml)
            .transpose()
            .map(|v| v.unwrap_or_else(Self::new))
    }

    /// Deep merge another Values into this one
    ///
    /// Rules:
    /// - Scalars: overlay replaces base
    /// - Objects: recursive merge
    /// - Arrays: overlay replaces base (not appended)
    pub fn merge(&mut self, overlay: &Values) {
        deep_merge(&mut self.0, &overlay.0);
    }

    /// Set a value by dotted path (e.g., "image.tag")
    pub fn set(&mut self, path: &str, value: JsonValue) -> Result<()> {
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(CoreError::ValuesMerge {
                message: format!("invalid value path '{}'", path),
            });
        }
        let parts: Vec<&str> = path.split('.').collect();
        set_nested(&mut self.0, &parts, value);
        Ok(())
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let parts: Vec<&str> = path.split('.').collect();
        get_nested(&self.0, &parts)
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Convert to JSON value
    pub fn into_inner(self) -> JsonValue {
        self.0
    }

    /// Check if values are empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }
}

/// Deep merge two JSON values
fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Set a nested value by path, replacing non-object intermediates
fn set_nested(value: &mut JsonValue, path: &[&str], new_value: JsonValue) {
    let Some((key, remaining)) = path.split_first() else {
        *value = new_value;
        return;
    };

    if !value.is_object() {
        *value = JsonValue::Object(serde_json::Map::new());
    }

    if let JsonValue::Object(map) = value {
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| JsonValue::Object(serde_json::Map::new()));
        set_nested(entry, remaining, new_value);
    }
}

/// Get a nested value by path
fn get_nested<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let Some((key, remaining)) = path.split_first() else {
        return Some(value);
    };

    match value {
        JsonValue::Object(map) => map.get(*key).and_then(|v| get_nested(v, remaining)),
        _ => None,
    }
}

/// Infer a JSON scalar from a `--set` style literal
///
/// `true`/`false`/`null`, integers and floats become typed values, JSON
/// arrays and objects are parsed, anything else stays a string.
pub fn infer_scalar(literal: &str) -> JsonValue {
    match literal {
        "true" => JsonValue::Bool(true),
        "false" => JsonValue::Bool(false),
        "null" => JsonValue::Null,
        _ => {
            if let Ok(num) = literal.parse::<i64>() {
                JsonValue::Number(num.into())
            } else if let Some(num) = literal
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
            {
                JsonValue::Number(num)
            } else if literal.starts_with('[') || literal.starts_with('{') {
                serde_json::from_str(literal)
                    .unwrap_or_else(|_| JsonValue::String(literal.to_string()))
            } else {
                JsonValue::String(literal.to_string())
            }
        }
    }
}

/// Parse `key=value` arguments into an ordered map
///
/// Later assignments to the same key win.
pub fn parse_assignments(args: &[String]) -> Result<BTreeMap<String, String>> {
    let mut assignments = BTreeMap::new();

    for arg in args {
        let (key, val) = arg.split_once('=').ok_or_else(|| CoreError::ValuesMerge {
            message: format!("Invalid assignment: '{}'. Expected key=value", arg),
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(CoreError::ValuesMerge {
                message: format!("Invalid assignment: '{}'. Key must not be empty", arg),
            });
        }
        assignments.insert(key.to_string(), val.to_string());
    }

    Ok(assignments)
}
