//! Typed parameters and their literal string forms
//!
//! Every parameter ends up as a string before templating. Non-secret values
//! are converted here; secret values need a resolver (see `meshpack-kube`)
//! and are rejected by [`ParameterValue::literal`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::path::PathBuf;

use crate::error::{CoreError, Result};

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    #[default]
    String,
    Float,
    Bool,
    Int,
    Date,
    Secret,
}

impl ParameterType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Date => "date",
            Self::Secret => "secret",
        }
    }

    /// Convert a literal into the JSON scalar injected into template values
    ///
    /// Returns `None` when the literal is not a valid value of this type.
    /// Strings, dates and secrets stay strings; dates must be RFC 3339.
    pub fn typed_json(&self, literal: &str) -> Option<JsonValue> {
        match self {
            Self::String | Self::Secret => Some(JsonValue::String(literal.to_string())),
            Self::Bool => match literal {
                "true" => Some(JsonValue::Bool(true)),
                "false" => Some(JsonValue::Bool(false)),
                _ => None,
            },
            Self::Int => literal.parse::<i64>().ok().map(|n| JsonValue::Number(n.into())),
            Self::Float => literal
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(JsonValue::Number),
            Self::Date => DateTime::parse_from_rfc3339(literal)
                .ok()
                .map(|_| JsonValue::String(literal.to_string())),
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed configuration slot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    /// Parameter name, also the dot path it sets in the values tree
    pub name: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Declared type. When omitted, the type of `default` is used.
    #[serde(rename = "type", default)]
    pub declared_type: Option<ParameterType>,

    #[serde(default)]
    pub required: bool,

    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub default: Option<ParameterValue>,
}

impl Parameter {
    /// Create an optional string parameter without a default
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            declared_type: None,
            required: false,
            default: None,
        }
    }

    /// Set the default value
    pub fn with_default(mut self, value: ParameterValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the declared type
    pub fn typed(mut self, ty: ParameterType) -> Self {
        self.declared_type = Some(ty);
        self
    }

    /// Effective type: declared, else inferred from the default, else string
    pub fn value_type(&self) -> ParameterType {
        self.declared_type
            .or_else(|| self.default.as_ref().map(ParameterValue::value_type))
            .unwrap_or_default()
    }
}

/// A typed parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterValue {
    String(String),
    Float(f64),
    Boolean(bool),
    Int(i64),
    Date(DateTime<Utc>),
    Secret(SecretValue),
}

impl ParameterValue {
    pub fn value_type(&self) -> ParameterType {
        match self {
            Self::String(_) => ParameterType::String,
            Self::Float(_) => ParameterType::Float,
            Self::Boolean(_) => ParameterType::Bool,
            Self::Int(_) => ParameterType::Int,
            Self::Date(_) => ParameterType::Date,
            Self::Secret(_) => ParameterType::Secret,
        }
    }

    /// Literal string form of a non-secret value
    ///
    /// Secret values fail with [`CoreError::SecretParameterRenderingUnsupported`];
    /// resolving them requires cluster or filesystem access.
    pub fn literal(&self) -> Result<String> {
        self.scalar_literal()
            .ok_or(CoreError::SecretParameterRenderingUnsupported)
    }

    /// Literal form for display-only contexts
    ///
    /// Secret values render as the empty string. This is a known limitation
    /// of contexts that have no secret resolver (listing defaults, for
    /// example); it must never be used to produce template values.
    pub fn display_literal(&self) -> String {
        match self {
            Self::Secret(_) => String::new(),
            _ => self.scalar_literal().unwrap_or_default(),
        }
    }

    fn scalar_literal(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Float(f) => Some(format_float(*f)),
            Self::Boolean(b) => Some(if *b { "true" } else { "false" }.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Date(d) => Some(format_date(d)),
            Self::Secret(_) => None,
        }
    }
}

/// Minimal non-exponential decimal form (`1.5`, `3`, `0.0001`)
pub fn format_float(value: f64) -> String {
    // f64's Display never switches to exponent notation
    format!("{}", value)
}

/// Canonical timestamp form: RFC 3339, UTC, `Z` suffix
pub fn format_date(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Where a secret parameter's value comes from
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecretValue {
    /// Key of a secret in the install namespace
    SecretRef(SecretRef),
    /// Local file whose full contents are the value
    Path(PathBuf),
    /// Inline value
    Plaintext(String),
}

/// Reference to one key of a cluster secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub name: String,
    pub key: String,
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecretRef(r) => write!(f, "secret {}[{}]", r.name, r.key),
            Self::Path(p) => write!(f, "file {}", p.display()),
            Self::Plaintext(_) => f.write_str("inline value"),
        }
    }
}

// Plaintext must not end up in logs through `{:?}`.
impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecretRef(r) => f.debug_tuple("SecretRef").field(r).finish(),
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::Plaintext(_) => f.write_str("Plaintext(<redacted>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_literal_forms() {
        assert_eq!(ParameterValue::Boolean(true).literal().unwrap(), "true");
        assert_eq!(ParameterValue::Boolean(false).literal().unwrap(), "false");
        assert_eq!(ParameterValue::Int(-42).literal().unwrap(), "-42");
        assert_eq!(ParameterValue::Float(1.5).literal().unwrap(), "1.5");
        assert_eq!(ParameterValue::Float(3.0).literal().unwrap(), "3");
        assert_eq!(ParameterValue::Float(0.0001).literal().unwrap(), "0.0001");
        assert_eq!(ParameterValue::Float(1e21).literal().unwrap(), "1000000000000000000000");
        assert_eq!(
            ParameterValue::String("hello".into()).literal().unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_date_literal() {
        let date = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            ParameterValue::Date(date).literal().unwrap(),
            "2020-01-02T03:04:05Z"
        );
    }

    #[test]
    fn test_secret_literal_unsupported() {
        let secret = ParameterValue::Secret(SecretValue::Plaintext("s3cr3t".into()));
        assert!(matches!(
            secret.literal(),
            Err(CoreError::SecretParameterRenderingUnsupported)
        ));
        assert_eq!(secret.display_literal(), "");
    }

    #[test]
    fn test_secret_debug_redacts_plaintext() {
        let secret = SecretValue::Plaintext("s3cr3t".into());
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("s3cr3t"));
        assert_eq!(secret.to_string(), "inline value");
    }

    #[test]
    fn test_typed_json() {
        assert_eq!(ParameterType::Bool.typed_json("true"), Some(JsonValue::Bool(true)));
        assert_eq!(ParameterType::Bool.typed_json("yes"), None);
        assert_eq!(ParameterType::Int.typed_json("7"), Some(JsonValue::from(7)));
        assert_eq!(ParameterType::Int.typed_json("7.5"), None);
        assert_eq!(ParameterType::Float.typed_json("7.5"), Some(JsonValue::from(7.5)));
        assert_eq!(
            ParameterType::String.typed_json("true"),
            Some(JsonValue::String("true".into()))
        );
        assert!(ParameterType::Date.typed_json("2020-01-02T03:04:05Z").is_some());
        assert!(ParameterType::Date.typed_json("yesterday").is_none());
    }

    #[test]
    fn test_parse_parameter_yaml() {
        let params: Vec<Parameter> = serde_yaml::from_str(
            r#"
- name: apiServer.enable
  displayName: API server
  default:
    boolean: true
- name: replicas
  type: int
  required: true
- name: gateway.token
  default:
    secret:
      secretRef:
        name: gateway-creds
        key: token
"#,
        )
        .unwrap();

        assert_eq!(params[0].value_type(), ParameterType::Bool);
        assert_eq!(params[1].value_type(), ParameterType::Int);
        assert!(params[1].required);
        assert_eq!(params[2].value_type(), ParameterType::Secret);
        assert_eq!(
            params[2].default,
            Some(ParameterValue::Secret(SecretValue::SecretRef(SecretRef {
                name: "gateway-creds".into(),
                key: "token".into(),
            })))
        );
    }

    #[test]
    fn test_value_type_defaults_to_string() {
        assert_eq!(Parameter::new("name").value_type(), ParameterType::String);
    }
}
