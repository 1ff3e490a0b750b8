//! Kubernetes-oriented template filters
//!
//! These extend MiniJinja with the Helm-style helpers chart authors expect,
//! plus a couple of mesh-specific ones (`semver_match`, `dns1123`).

use base64::Engine as _;
use minijinja::{Error, ErrorKind, Value};
use semver::VersionReq;

/// Names registered by [`crate::Engine`], used in error hints
pub const FILTER_NAMES: &[&str] = &[
    "toyaml",
    "tojson",
    "b64encode",
    "b64decode",
    "quote",
    "nindent",
    "indent",
    "required",
    "sha256",
    "trunc",
    "semver_match",
    "dns1123",
];

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

fn to_json(value: &Value) -> Result<serde_json::Value, Error> {
    serde_json::to_value(value).map_err(|e| invalid(e.to_string()))
}

/// Render a value as YAML, without a trailing newline
///
/// Usage: {{ values.gateway | toyaml | nindent(2) }}
pub fn toyaml(value: Value) -> Result<String, Error> {
    let yaml = serde_yaml::to_string(&to_json(&value)?).map_err(|e| invalid(e.to_string()))?;
    Ok(yaml.trim_start_matches("---\n").trim_end().to_string())
}

/// Render a value as compact JSON
pub fn tojson(value: Value) -> Result<String, Error> {
    serde_json::to_string(&to_json(&value)?).map_err(|e| invalid(e.to_string()))
}

#[must_use]
pub fn b64encode(value: String) -> String {
    base64::engine::general_purpose::STANDARD.encode(value.as_bytes())
}

pub fn b64decode(value: String) -> Result<String, Error> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(value.as_bytes())
        .map_err(|e| invalid(format!("base64 decode error: {}", e)))?;
    String::from_utf8(decoded).map_err(|e| invalid(format!("UTF-8 decode error: {}", e)))
}

/// Double-quote a scalar, escaping backslashes and quotes
#[must_use]
pub fn quote(value: Value) -> String {
    let raw = match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    };
    format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Indent every non-empty line, prefixed with a newline
///
/// Usage: {{ values.annotations | toyaml | nindent(4) }}
#[must_use]
pub fn nindent(value: String, spaces: usize) -> String {
    format!("\n{}", indent(value, spaces))
}

/// Indent every non-empty line
#[must_use]
pub fn indent(value: String, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    value
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fail rendering when a value is undefined, none or an empty string
///
/// Usage: {{ values.gateway.host | required("gateway.host is required") }}
pub fn required(value: Value, message: Option<String>) -> Result<Value, Error> {
    let missing = value.is_undefined()
        || value.is_none()
        || value.as_str().is_some_and(str::is_empty);
    if missing {
        Err(invalid(
            message.unwrap_or_else(|| "required value is missing".to_string()),
        ))
    } else {
        Ok(value)
    }
}

/// Hex SHA-256 digest, handy for config checksum annotations
#[must_use]
pub fn sha256sum(value: String) -> String {
    use sha2::{Digest, Sha256};
    format!("{:x}", Sha256::digest(value.as_bytes()))
}

/// Truncate to at most `length` characters
#[must_use]
pub fn trunc(value: String, length: usize) -> String {
    value.chars().take(length).collect()
}

/// Test a mesh version against a semver requirement
///
/// Versions are read leniently (`v1.5` is `1.5.0`).
///
/// Usage: {% if mesh.version | semver_match(">=1.5") %}
pub fn semver_match(version: Value, constraint: String) -> Result<bool, Error> {
    let raw = version
        .as_str()
        .ok_or_else(|| invalid("version must be a string"))?;
    let version =
        meshpack_core::compat::parse_mesh_version(raw).map_err(|e| invalid(e.to_string()))?;
    let req = VersionReq::parse(constraint.trim())
        .map_err(|e| invalid(format!("invalid constraint '{}': {}", constraint, e)))?;
    Ok(req.matches(&version))
}

/// Coerce a string into an RFC 1123 label: lowercase alphanumerics and `-`,
/// at most 63 characters, no leading or trailing `-`
///
/// Usage: name: {{ release.name ~ "-" ~ step | dns1123 }}
#[must_use]
pub fn dns1123(value: String) -> String {
    let mut label = String::with_capacity(value.len());
    for c in value.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            label.push(c);
        } else if !label.ends_with('-') {
            label.push('-');
        }
    }
    let label: String = label.trim_matches('-').chars().take(63).collect();
    label.trim_end_matches('-').to_string()
}
