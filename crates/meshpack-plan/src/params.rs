//! Parameter resolution
//!
//! Parameters are declared at several scopes. Scopes are applied in order
//! (version, flavor, then each selected layer option in layer order) and
//! caller overrides come last; a later value for a name replaces an earlier
//! one. Resolution runs in two phases: [`ParameterResolver::check`] is
//! purely static and reports missing or mistyped values before anything
//! touches the cluster, [`resolve`] then reads secrets.

use meshpack_core::{
    Parameter, ParameterType, ParameterValue, SecretValue, Values, infer_scalar,
};
use meshpack_kube::SecretResolver;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{PlanError, Result};

/// Where a parameter's effective value came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "camelCase")]
pub enum ValueSource {
    Version,
    Flavor { flavor: String },
    LayerOption { layer: String, option: String },
    Override,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version => f.write_str("version default"),
            Self::Flavor { flavor } => write!(f, "flavor '{}'", flavor),
            Self::LayerOption { layer, option } => write!(f, "layer option '{}:{}'", layer, option),
            Self::Override => f.write_str("override"),
        }
    }
}

enum Candidate<'a> {
    Default(&'a ParameterValue),
    Override(&'a str),
}

struct Entry<'a> {
    declaration: Option<&'a Parameter>,
    required: bool,
    value: Option<(Candidate<'a>, ValueSource)>,
}

/// A parameter value that passed the static checks
#[derive(Debug, Clone)]
pub struct PendingParameter {
    pub name: String,
    pub value: PendingValue,
    /// Type used when injecting into values; `None` for undeclared overrides
    pub value_type: Option<ParameterType>,
    pub source: ValueSource,
}

#[derive(Debug, Clone)]
pub enum PendingValue {
    Literal(String),
    Secret(SecretValue),
}

/// A parameter with its final literal value
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedParameter {
    pub name: String,
    #[serde(skip)]
    pub value: String,
    pub value_type: Option<ParameterType>,
    pub source: ValueSource,
    pub secret: bool,
}

impl ResolvedParameter {
    /// Value suitable for output; secret values are masked
    pub fn display_value(&self) -> &str {
        if self.secret { "<redacted>" } else { &self.value }
    }
}

impl fmt::Debug for ResolvedParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedParameter")
            .field("name", &self.name)
            .field("value", &self.display_value())
            .field("value_type", &self.value_type)
            .field("source", &self.source)
            .finish()
    }
}

/// Merges parameter scopes and caller overrides
#[derive(Default)]
pub struct ParameterResolver<'a> {
    entries: BTreeMap<&'a str, Entry<'a>>,
}

impl<'a> ParameterResolver<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one scope of declarations
    pub fn scope(mut self, source: ValueSource, parameters: &'a [Parameter]) -> Self {
        for param in parameters {
            let entry = self.entries.entry(param.name.as_str()).or_insert(Entry {
                declaration: None,
                required: false,
                value: None,
            });
            entry.declaration = Some(param);
            entry.required |= param.required;
            if let Some(default) = &param.default {
                entry.value = Some((Candidate::Default(default), source.clone()));
            }
        }
        self
    }

    /// Apply caller overrides, highest precedence
    pub fn overrides(mut self, overrides: &'a BTreeMap<String, String>) -> Self {
        for (name, literal) in overrides {
            let entry = self.entries.entry(name.as_str()).or_insert(Entry {
                declaration: None,
                required: false,
                value: None,
            });
            entry.value = Some((Candidate::Override(literal), ValueSource::Override));
        }
        self
    }

    /// Static phase: required values present, overrides well-typed
    ///
    /// Every problem is collected. Performs no I/O.
    pub fn check(&self) -> std::result::Result<Vec<PendingParameter>, Vec<PlanError>> {
        let mut pending = Vec::with_capacity(self.entries.len());
        let mut errors = Vec::new();

        for (name, entry) in &self.entries {
            let Some((candidate, source)) = &entry.value else {
                if entry.required {
                    errors.push(PlanError::MissingRequiredParameter {
                        name: name.to_string(),
                    });
                }
                continue;
            };

            let declared = entry.declaration.map(Parameter::value_type);
            let (value, value_type) = match candidate {
                Candidate::Default(default) => match default {
                    ParameterValue::Secret(secret) => {
                        (PendingValue::Secret(secret.clone()), Some(ParameterType::Secret))
                    }
                    other => {
                        // Non-secret values always have a literal form
                        let Ok(literal) = other.literal() else { continue };
                        (PendingValue::Literal(literal), Some(other.value_type()))
                    }
                },
                Candidate::Override(literal) => {
                    if let Some(ty) = declared {
                        if ty.typed_json(literal).is_none() {
                            errors.push(PlanError::InvalidParameterValue {
                                name: name.to_string(),
                                expected: ty.to_string(),
                                value: literal.to_string(),
                            });
                            continue;
                        }
                    }
                    (PendingValue::Literal(literal.to_string()), declared)
                }
            };

            pending.push(PendingParameter {
                name: name.to_string(),
                value,
                value_type,
                source: source.clone(),
            });
        }

        if errors.is_empty() {
            Ok(pending)
        } else {
            Err(errors)
        }
    }
}

/// Secret phase: read every secret value through a fresh resolver
///
/// Failures are collected so one call reports every unreadable secret.
pub async fn resolve(
    pending: Vec<PendingParameter>,
    secrets: &SecretResolver<'_>,
) -> std::result::Result<Vec<ResolvedParameter>, Vec<PlanError>> {
    let mut resolved = Vec::with_capacity(pending.len());
    let mut errors = Vec::new();

    for param in pending {
        let (value, secret) = match &param.value {
            PendingValue::Literal(literal) => (literal.clone(), false),
            PendingValue::Secret(reference) => match secrets.resolve(reference).await {
                Ok(value) => (value, true),
                Err(e) => {
                    errors.push(PlanError::from(e));
                    continue;
                }
            },
        };

        tracing::debug!(
            parameter = %param.name,
            source = %param.source,
            secret,
            "resolved parameter"
        );

        resolved.push(ResolvedParameter {
            name: param.name,
            value,
            value_type: param.value_type,
            source: param.source,
            secret,
        });
    }

    if errors.is_empty() {
        Ok(resolved)
    } else {
        Err(errors)
    }
}

/// Write parameters into values, each name read as a dot path
pub fn inject<'p>(
    values: &mut Values,
    parameters: impl IntoIterator<Item = &'p ResolvedParameter>,
) -> Result<()> {
    for param in parameters {
        let json = match param.value_type {
            Some(ty) => ty
                .typed_json(&param.value)
                .unwrap_or_else(|| JsonValue::String(param.value.clone())),
            None => infer_scalar(&param.value),
        };
        values.set(&param.name, json)?;
    }
    Ok(())
}
