//! Core types: schema bundles, upstreams and gateway options.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default timeout for a whole query.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for a single REST delegate call (10 seconds).
pub const DEFAULT_REST_TIMEOUT: Duration = Duration::from_secs(10);

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A versioned snapshot of schema documents and upstream metadata.
///
/// Bundles are immutable: a new bundle wholly replaces the assembled schema.
///
/// ```json
/// {
///   "etag": "v42",
///   "schemas": [
///     { "metadata": { "namespace": "hr", "name": "org" }, "schema": "type Query { ... }" }
///   ],
///   "upstreams": [
///     { "host": "hr.internal", "headers": { "x-api-key": "secret" } }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaBundle {
    /// Version tag of this snapshot. Re-applying a live etag is a no-op.
    #[serde(default)]
    pub etag: String,
    #[serde(default)]
    pub schemas: Vec<SchemaDocument>,
    #[serde(default)]
    pub upstreams: Vec<Upstream>,
}

impl SchemaBundle {
    /// Create an empty bundle with the given etag.
    pub fn new(etag: impl Into<String>) -> Self {
        Self {
            etag: etag.into(),
            ..Self::default()
        }
    }

    /// Add a schema document.
    pub fn with_schema(mut self, document: SchemaDocument) -> Self {
        self.schemas.push(document);
        self
    }

    /// Add an upstream descriptor.
    pub fn with_upstream(mut self, upstream: Upstream) -> Self {
        self.upstreams.push(upstream);
        self
    }
}

/// One registered schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub metadata: ResourceMetadata,
    /// GraphQL SDL source.
    pub schema: String,
}

impl SchemaDocument {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            metadata: ResourceMetadata {
                namespace: namespace.into(),
                name: name.into(),
            },
            schema: schema.into(),
        }
    }

    /// `namespace/name`, used as the document path in diagnostics.
    pub fn id(&self) -> String {
        format!("{}/{}", self.metadata.namespace, self.metadata.name)
    }
}

/// Registry coordinates of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub namespace: String,
    pub name: String,
}

/// Connection metadata for an upstream REST backend.
///
/// Headers are attached to every REST delegate call whose URL host equals
/// `host`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upstream {
    pub host: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Upstream {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Options for a gateway instance.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Upper bound for a whole query. `None` disables the timeout.
    pub request_timeout: Option<Duration>,
    /// Timeout applied to each REST delegate call.
    pub rest_timeout: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            rest_timeout: DEFAULT_REST_TIMEOUT,
        }
    }
}

impl GatewayOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query timeout.
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the per-call REST timeout.
    pub fn rest_timeout(mut self, timeout: Duration) -> Self {
        self.rest_timeout = timeout;
        self
    }
}
