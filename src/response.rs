//! GraphQL request and response shapes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FieldError;

/// An incoming query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }
}

/// `{data, errors}` as returned to clients.
///
/// `data` is absent when the request failed before execution started and
/// `null` when an error propagated up to the root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

impl Response {
    /// A response for a request that never reached execution.
    pub fn from_errors(errors: Vec<GraphQLError>) -> Self {
        Self { data: None, errors }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A single entry of the response `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
            extensions: None,
        }
    }

    /// Set `extensions.code`.
    pub fn code(mut self, code: &str) -> Self {
        self.extensions
            .get_or_insert_with(Map::new)
            .insert("code".to_string(), Value::String(code.to_string()));
        self
    }

    /// Build the error reported for a failed field.
    pub fn from_field_error(error: &FieldError, path: Vec<PathElement>) -> Self {
        let mut err = Self::new(error.to_string()).code(error.code());
        if let FieldError::Upstream {
            status: Some(status),
            ..
        } = error
        {
            if let Some(ext) = err.extensions.as_mut() {
                ext.insert("status".to_string(), Value::from(*status));
            }
        }
        err.path = path;
        err
    }
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            return write!(f, "{}", self.message);
        }
        let path: Vec<String> = self.path.iter().map(ToString::to_string).collect();
        write!(f, "{} (at {})", self.message, path.join("."))
    }
}

/// Line and column (1-based) in the query document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// One segment of a response path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Key(key) => write!(f, "{key}"),
            PathElement::Index(index) => write!(f, "{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_serializes_path_and_code() {
        let err = GraphQLError::from_field_error(
            &FieldError::MissingExport {
                key: "orgName".into(),
            },
            vec![
                PathElement::Key("orgs".into()),
                PathElement::Index(1),
                PathElement::Key("name".into()),
            ],
        );

        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({
                "message": "missing export 'orgName' on the current resolution path",
                "path": ["orgs", 1, "name"],
                "extensions": { "code": "MISSING_EXPORT" }
            })
        );
        assert!(err.to_string().ends_with("(at orgs.1.name)"));
    }

    #[test]
    fn upstream_error_reports_status() {
        let err = GraphQLError::from_field_error(
            &FieldError::Upstream {
                url: "http://test.api/x".into(),
                status: Some(503),
                message: "503 Service Unavailable".into(),
            },
            Vec::new(),
        );
        let ext = err.extensions.unwrap();
        assert_eq!(ext["code"], "UPSTREAM_FAILURE");
        assert_eq!(ext["status"], 503);
    }

    #[test]
    fn request_error_response_has_no_data() {
        let response = Response::from_errors(vec![GraphQLError::new("bad query")]);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "errors": [{ "message": "bad query" }] })
        );
    }

    #[test]
    fn request_deserializes_camel_case() {
        let request: Request = serde_json::from_value(json!({
            "query": "{ a }",
            "operationName": "A",
            "variables": { "x": 1 }
        }))
        .unwrap();
        assert_eq!(request.operation_name.as_deref(), Some("A"));
        assert_eq!(request.variables["x"], 1);
    }
}
