//! Engine error types with source-mapped template diagnostics

use miette::{Diagnostic, NamedSource, SourceSpan};
use meshpack_core::CoreError;
use thiserror::Error;

/// Main engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Template error in {}: {}", .0.src.name(), .0.message)]
    Template(#[from] TemplateError),

    #[error("Invalid rendered manifest in {template}: {source}")]
    Manifest {
        template: String,
        #[source]
        source: CoreError,
    },

    #[error("Chart error: {message}")]
    Chart { message: String },

    #[error("Cannot fetch {uri}: {message}")]
    Fetch { uri: String, message: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error kind for categorizing template errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    UnknownFunction,
    SyntaxError,
    TypeError,
    InvalidOperation,
    Other,
}

impl TemplateErrorKind {
    pub fn to_code_string(&self) -> &'static str {
        match self {
            Self::UndefinedVariable => "undefined_variable",
            Self::UnknownFilter => "unknown_filter",
            Self::UnknownFunction => "unknown_function",
            Self::SyntaxError => "syntax",
            Self::TypeError => "type",
            Self::InvalidOperation => "invalid_operation",
            Self::Other => "render",
        }
    }
}

/// Template-specific error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(meshpack::template::render))]
pub struct TemplateError {
    pub message: String,

    pub kind: TemplateErrorKind,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Build from a MiniJinja error, pointing at the failing line
    ///
    /// `values` is used to suggest close keys for undefined `values.*` paths.
    pub fn from_minijinja(
        err: minijinja::Error,
        template_name: &str,
        template_source: &str,
        values: Option<&serde_json::Value>,
    ) -> Self {
        let kind = categorize(&err);
        let span = err
            .line()
            .and_then(|line| calculate_span(template_source, line));
        let suggestion = suggest(&err, kind, values);

        let message = match err.detail() {
            Some(detail) => format!("{}: {}", kind_label(kind), detail),
            None => err.to_string(),
        };

        Self {
            message,
            kind,
            src: NamedSource::new(template_name, template_source.to_string()),
            span,
            suggestion,
        }
    }

    /// Create an error without source mapping
    pub fn simple(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: TemplateErrorKind::Other,
            src: NamedSource::new("<unknown>", String::new()),
            span: None,
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

fn categorize(err: &minijinja::Error) -> TemplateErrorKind {
    use minijinja::ErrorKind;

    match err.kind() {
        ErrorKind::UndefinedError => TemplateErrorKind::UndefinedVariable,
        ErrorKind::UnknownFilter => TemplateErrorKind::UnknownFilter,
        ErrorKind::UnknownFunction => TemplateErrorKind::UnknownFunction,
        ErrorKind::SyntaxError => TemplateErrorKind::SyntaxError,
        ErrorKind::InvalidOperation => TemplateErrorKind::InvalidOperation,
        ErrorKind::NonPrimitive | ErrorKind::NonKey => TemplateErrorKind::TypeError,
        _ => TemplateErrorKind::Other,
    }
}

fn kind_label(kind: TemplateErrorKind) -> &'static str {
    match kind {
        TemplateErrorKind::UndefinedVariable => "undefined variable",
        TemplateErrorKind::UnknownFilter => "unknown filter",
        TemplateErrorKind::UnknownFunction => "unknown function",
        TemplateErrorKind::SyntaxError => "syntax error",
        TemplateErrorKind::TypeError => "type error",
        TemplateErrorKind::InvalidOperation => "invalid operation",
        TemplateErrorKind::Other => "render error",
    }
}

/// Span covering the whole 1-based `line_num`
fn calculate_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;

    for (index, line) in source.lines().enumerate() {
        if index + 1 == line_num {
            return Some(SourceSpan::new(offset.into(), line.len()));
        }
        offset += line.len() + 1;
    }

    None
}

fn suggest(
    err: &minijinja::Error,
    kind: TemplateErrorKind,
    values: Option<&serde_json::Value>,
) -> Option<String> {
    match kind {
        TemplateErrorKind::UndefinedVariable => {
            let detailed = format!("{:#}", err);
            let expr = extract_expression(&detailed)?;

            if expr == "value" || expr.starts_with("value.") {
                return Some(format!(
                    "Did you mean `{}`? Use `values` (plural) to access the values object.",
                    expr.replacen("value", "values", 1)
                ));
            }

            let path = expr.strip_prefix("values.")?;
            suggest_values_key(path, values?)
        }
        TemplateErrorKind::SyntaxError => Some(
            "Check bracket matching: `{{ }}` for expressions, `{% %}` for statements".to_string(),
        ),
        TemplateErrorKind::UnknownFilter => Some(format!(
            "Available filters: {}",
            crate::filters::FILTER_NAMES.join(", ")
        )),
        _ => None,
    }
}

/// Walk `path` through `values` and suggest the closest key where it breaks
fn suggest_values_key(path: &str, values: &serde_json::Value) -> Option<String> {
    let mut current = values;
    let mut walked = vec!["values"];

    for part in path.split('.') {
        match current.get(part) {
            Some(next) => {
                walked.push(part);
                current = next;
            }
            None => {
                let available: Vec<&str> = current.as_object()?.keys().map(String::as_str).collect();
                let prefix = walked.join(".");
                return Some(match closest_match(part, &available) {
                    Some(candidate) => format!(
                        "Key `{}` not found. Did you mean `{}.{}`?",
                        part, prefix, candidate
                    ),
                    None => format!(
                        "Key `{}` not found in `{}`. Available keys: {}",
                        part,
                        prefix,
                        available.join(", ")
                    ),
                });
            }
        }
    }

    None
}

/// Closest candidate by Jaro-Winkler similarity, if reasonably close
pub(crate) fn closest_match<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, strsim::jaro_winkler(input, c)))
        .filter(|(_, score)| *score >= 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
}

/// Pull the `{{ ... }}` expression off the marked line of MiniJinja's
/// detailed display, dropping any filters
fn extract_expression(display: &str) -> Option<String> {
    let lines: Vec<&str> = display.lines().collect();

    for (index, line) in lines.iter().enumerate() {
        let marked = line.trim_start().contains(" > ") || line.trim_start().starts_with("> ");
        let candidate = if marked {
            Some(*line)
        } else if line.contains("^^^") && index > 0 {
            Some(lines[index - 1])
        } else {
            None
        };

        let Some(candidate) = candidate else { continue };
        let Some(start) = candidate.find("{{") else { continue };
        let Some(end) = candidate[start..].find("}}") else { continue };

        let expr = candidate[start + 2..start + end].trim();
        let expr = expr.split('|').next().unwrap_or(expr).trim();
        if !expr.is_empty() {
            return Some(expr.to_string());
        }
    }

    None
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_error_simple() {
        let error = TemplateError::simple("test message");
        assert_eq!(error.message, "test message");
        assert_eq!(error.kind(), TemplateErrorKind::Other);
        assert!(error.suggestion.is_none());
    }

    #[test]
    fn test_with_suggestion() {
        let error = TemplateError::simple("test").with_suggestion("try this");
        assert_eq!(error.suggestion.as_deref(), Some("try this"));
    }

    #[test]
    fn test_kind_code_strings() {
        assert_eq!(
            TemplateErrorKind::UndefinedVariable.to_code_string(),
            "undefined_variable"
        );
        assert_eq!(TemplateErrorKind::SyntaxError.to_code_string(), "syntax");
    }

    #[test]
    fn test_calculate_span() {
        let source = "a: 1\nbb: 2\nccc: 3";
        let span = calculate_span(source, 2).unwrap();
        assert_eq!(span.offset(), 5);
        assert_eq!(span.len(), 5);
        assert!(calculate_span(source, 9).is_none());
    }

    #[test]
    fn test_extract_expression_with_marker() {
        let display = r#"
   8 >   mode: {{ values.mtls.mode | quote }}
     i            ^^^^^^^^^^^^^^^ undefined value
"#;
        assert_eq!(
            extract_expression(display).as_deref(),
            Some("values.mtls.mode")
        );
    }

    #[test]
    fn test_suggest_values_key() {
        let values = serde_json::json!({"mtls": {"mode": "STRICT"}, "gateway": {}});

        let hint = suggest_values_key("mtls.mdoe", &values).unwrap();
        assert_eq!(hint, "Key `mdoe` not found. Did you mean `values.mtls.mode`?");

        assert!(suggest_values_key("mtls.mode", &values).is_none());
    }

    #[test]
    fn test_closest_match() {
        assert_eq!(closest_match("gatway", &["gateway", "mtls"]), Some("gateway"));
        assert_eq!(closest_match("zzz", &["gateway", "mtls"]), None);
    }
}
