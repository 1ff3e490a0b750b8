//! Template functions (global functions available in templates)
//!
//! Only deterministic helpers are registered: the same values must always
//! render the same manifests.

use minijinja::{Error, ErrorKind, Value};

/// Abort rendering with a message
///
/// Usage: {{ fail("mtls.mode must be STRICT or PERMISSIVE") }}
pub fn fail(message: String) -> Result<Value, Error> {
    Err(Error::new(ErrorKind::InvalidOperation, message))
}

/// Build a mapping from alternating keys and values
///
/// Usage: {{ dict("app", release.name, "step", step) | toyaml }}
pub fn dict(args: Vec<Value>) -> Result<Value, Error> {
    if args.len() % 2 != 0 {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "dict requires an even number of arguments (key-value pairs)",
        ));
    }

    let mut map = serde_json::Map::new();
    for pair in args.chunks(2) {
        let key = pair[0]
            .as_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "dict keys must be strings"))?;
        let value = serde_json::to_value(&pair[1])
            .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
        map.insert(key.to_string(), value);
    }

    Ok(Value::from_serialize(serde_json::Value::Object(map)))
}

/// First argument that is defined, not none and not an empty string
///
/// Usage: {{ coalesce(values.gateway.host, release.name) }}
pub fn coalesce(args: Vec<Value>) -> Value {
    args.into_iter()
        .find(|arg| {
            !arg.is_undefined() && !arg.is_none() && !arg.as_str().is_some_and(str::is_empty)
        })
        .unwrap_or(Value::UNDEFINED)
}

/// Usage: {{ ternary("STRICT", "PERMISSIVE", values.mtls.strict) }}
pub fn ternary(true_val: Value, false_val: Value, condition: Value) -> Value {
    if condition.is_true() { true_val } else { false_val }
}
