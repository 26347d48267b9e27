//! Placeholder templates used by directive arguments.
//!
//! A template is a string with zero or more `{namespace.path}` placeholders:
//!
//! | Namespace | Reads from |
//! |-----------|------------|
//! | `args` (or `arg`) | the field's coerced arguments |
//! | `exports` | the export context of the current resolution path |
//! | `parent` | the parent object's backing value |
//!
//! Paths may be dotted (`{parent.address.city}`) to traverse objects.
//! Templates are parsed once at assembly; interpolation happens per request.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::FieldError;
use crate::exports::ExportContext;
use crate::types::json_type_name;

/// Where a placeholder reads its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Args,
    Exports,
    Parent,
}

impl Namespace {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "args" | "arg" => Some(Namespace::Args),
            "exports" => Some(Namespace::Exports),
            "parent" => Some(Namespace::Parent),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Namespace::Args => "args",
            Namespace::Exports => "exports",
            Namespace::Parent => "parent",
        }
    }
}

/// A single `{namespace.path}` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub namespace: Namespace,
    /// Non-empty list of keys. The first one names the argument, export or
    /// parent property.
    pub path: Vec<String>,
}

impl Placeholder {
    /// The argument, export key or parent property this placeholder names.
    pub fn key(&self) -> &str {
        &self.path[0]
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}.{}}}", self.namespace.as_str(), self.path.join("."))
    }
}

/// Parse failure, reported as an assembly error by callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TemplateError {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Constant(String),
    Placeholder(Placeholder),
}

/// A parsed string template.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    parts: Vec<Part>,
}

impl FromStr for Template {
    type Err = TemplateError;

    /// Braces that do not enclose a `namespace.path` expression (JSON text,
    /// for instance) are kept as constant text.
    fn from_str(input: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut constant = String::new();
        let mut rest = input;
        while let Some(open) = rest.find('{') {
            constant.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if is_expression(&after[..close]) => {
                    if !constant.is_empty() {
                        parts.push(Part::Constant(std::mem::take(&mut constant)));
                    }
                    parts.push(Part::Placeholder(parse_placeholder(&after[..close])?));
                    rest = &after[close + 1..];
                }
                None if opens_placeholder(after) => {
                    return Err(TemplateError {
                        message: "invalid placeholder, missing closing }".to_string(),
                    });
                }
                _ => {
                    constant.push('{');
                    rest = after;
                }
            }
        }
        constant.push_str(rest);
        if !constant.is_empty() {
            parts.push(Part::Constant(constant));
        }
        Ok(Template { parts })
    }
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// `{ns.path}` or a bare namespace such as `{exports}`.
fn is_expression(text: &str) -> bool {
    let text = text.trim();
    text.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && text.chars().all(is_path_char)
        && (text.contains('.') || Namespace::parse(text).is_some())
}

fn opens_placeholder(text: &str) -> bool {
    let end = text.find(|c: char| !is_path_char(c)).unwrap_or(text.len());
    text[..end].contains('.')
}

fn parse_placeholder(expression: &str) -> Result<Placeholder, TemplateError> {
    let expression = expression.trim();
    let mut segments = expression.split('.');
    let namespace = segments.next().unwrap_or_default();
    let namespace = Namespace::parse(namespace).ok_or_else(|| TemplateError {
        message: format!(
            "unknown placeholder namespace in {{{expression}}}: expected args, exports or parent"
        ),
    })?;
    let path: Vec<String> = segments.map(str::to_string).collect();
    if path.is_empty() || path.iter().any(|segment| segment.is_empty()) {
        return Err(TemplateError {
            message: format!("placeholder {{{expression}}} must name a key"),
        });
    }
    Ok(Placeholder { namespace, path })
}

impl Template {
    /// True when the template has no placeholders.
    pub fn is_static(&self) -> bool {
        self.placeholders().next().is_none()
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.parts.iter().filter_map(|part| match part {
            Part::Placeholder(placeholder) => Some(placeholder),
            Part::Constant(_) => None,
        })
    }

    /// The placeholder, when the whole template is exactly one placeholder.
    fn single(&self) -> Option<&Placeholder> {
        match self.parts.as_slice() {
            [Part::Placeholder(placeholder)] => Some(placeholder),
            _ => None,
        }
    }

    /// Interpolate into a plain string.
    ///
    /// # Errors
    ///
    /// Fails when a placeholder cannot be resolved (see [`Scope::lookup`]) or
    /// resolves to a list or object.
    pub fn interpolate(&self, scope: &Scope<'_>) -> Result<String, FieldError> {
        let mut output = String::new();
        for part in &self.parts {
            match part {
                Part::Constant(value) => output.push_str(value),
                Part::Placeholder(placeholder) => {
                    let value = scope.lookup(placeholder)?;
                    output.push_str(&scalar_text(placeholder, &value)?);
                }
            }
        }
        Ok(output)
    }

    /// Interpolate as a URI: placeholder values are percent-encoded, constant
    /// parts are written as-is.
    pub fn interpolate_uri(&self, scope: &Scope<'_>) -> Result<String, FieldError> {
        let mut output = String::new();
        for part in &self.parts {
            match part {
                Part::Constant(value) => output.push_str(value),
                Part::Placeholder(placeholder) => {
                    let value = scope.lookup(placeholder)?;
                    let text = scalar_text(placeholder, &value)?;
                    output.extend(encoding::encode(&text));
                }
            }
        }
        Ok(output)
    }

    /// Render to a JSON value. A template that is a single placeholder keeps
    /// the looked-up value's type; anything else renders to a string.
    ///
    /// # Errors
    ///
    /// Same as [`Template::interpolate`].
    pub fn render(&self, scope: &Scope<'_>) -> Result<Value, FieldError> {
        match self.single() {
            Some(placeholder) => scope.lookup(placeholder),
            None => self.interpolate(scope).map(Value::String),
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                Part::Constant(value) => write!(f, "{value}")?,
                Part::Placeholder(placeholder) => write!(f, "{placeholder}")?,
            }
        }
        Ok(())
    }
}

fn scalar_text(placeholder: &Placeholder, value: &Value) -> Result<String, FieldError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        other => Err(FieldError::Template {
            message: format!(
                "placeholder {placeholder} evaluated to an {}, expected a scalar",
                json_type_name(other)
            ),
        }),
    }
}

/// A JSON value whose strings may contain placeholders, as used by `@stub`
/// and `@policy(args:)`.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueTemplate {
    Literal(Value),
    Text(Template),
    List(Vec<ValueTemplate>),
    Object(Vec<(String, ValueTemplate)>),
}

impl ValueTemplate {
    /// # Errors
    ///
    /// Returns the first [`TemplateError`] found in any nested string.
    pub fn parse(value: &Value) -> Result<Self, TemplateError> {
        Ok(match value {
            Value::String(s) => {
                let template: Template = s.parse()?;
                if template.is_static() {
                    ValueTemplate::Literal(value.clone())
                } else {
                    ValueTemplate::Text(template)
                }
            }
            Value::Array(items) => ValueTemplate::List(
                items
                    .iter()
                    .map(ValueTemplate::parse)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => ValueTemplate::Object(
                map.iter()
                    .map(|(key, value)| Ok((key.clone(), ValueTemplate::parse(value)?)))
                    .collect::<Result<_, TemplateError>>()?,
            ),
            other => ValueTemplate::Literal(other.clone()),
        })
    }

    /// All placeholders, depth first.
    pub fn placeholders(&self) -> Vec<&Placeholder> {
        match self {
            ValueTemplate::Literal(_) => Vec::new(),
            ValueTemplate::Text(template) => template.placeholders().collect(),
            ValueTemplate::List(items) => items.iter().flat_map(|i| i.placeholders()).collect(),
            ValueTemplate::Object(fields) => {
                fields.iter().flat_map(|(_, v)| v.placeholders()).collect()
            }
        }
    }

    pub fn render(&self, scope: &Scope<'_>) -> Result<Value, FieldError> {
        match self {
            ValueTemplate::Literal(value) => Ok(value.clone()),
            ValueTemplate::Text(template) => template.render(scope),
            ValueTemplate::List(items) => items
                .iter()
                .map(|item| item.render(scope))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            ValueTemplate::Object(fields) => {
                let mut map = Map::new();
                for (key, value) in fields {
                    map.insert(key.clone(), value.render(scope)?);
                }
                Ok(Value::Object(map))
            }
        }
    }
}

/// The values a template can read at request time.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub args: &'a Map<String, Value>,
    pub exports: &'a ExportContext,
    pub parent: &'a Value,
}

impl Scope<'_> {
    /// Look up a placeholder.
    ///
    /// # Errors
    ///
    /// Returns `FieldError::MissingExport` when the export key is not visible
    /// on the current path, and `FieldError::Template` when an argument, a
    /// parent property or a nested path segment is absent. Present `null`
    /// values resolve normally.
    pub fn lookup(&self, placeholder: &Placeholder) -> Result<Value, FieldError> {
        let key = placeholder.key();
        let root = match placeholder.namespace {
            Namespace::Args => self.args.get(key),
            Namespace::Exports => Some(self.exports.get(key).ok_or_else(|| {
                FieldError::MissingExport {
                    key: key.to_string(),
                }
            })?),
            Namespace::Parent => self.parent.get(key),
        };
        placeholder.path[1..]
            .iter()
            .fold(root, |current, segment| current.and_then(|v| v.get(segment)))
            .cloned()
            .ok_or_else(|| FieldError::Template {
                message: format!("unresolvable placeholder {placeholder}"),
            })
    }
}

mod encoding {
    use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

    /// Everything but RFC 3986 unreserved characters is encoded.
    const USER_INPUT: &AsciiSet = &NON_ALPHANUMERIC
        .remove(b'-')
        .remove(b'.')
        .remove(b'_')
        .remove(b'~');

    pub(super) fn encode(s: &str) -> impl Iterator<Item = &str> {
        utf8_percent_encode(s, USER_INPUT)
    }
}
