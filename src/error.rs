//! Error types for schema assembly, field resolution and bundle loading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while assembling a schema bundle into an executable schema.
///
/// Any of these aborts the assembly attempt; a gateway keeps serving the
/// previously assembled schema.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("cannot parse schema document '{document}': {message}")]
    Parse { document: String, message: String },

    #[error("invalid schema document '{document}': {message}")]
    InvalidDocument { document: String, message: String },

    #[error("type conflict: '{name}' is defined in both '{first}' and '{second}'")]
    TypeConflict {
        name: String,
        first: String,
        second: String,
    },

    #[error("type conflict: field '{coordinate}' is defined in both '{first}' and '{second}'")]
    FieldConflict {
        coordinate: String,
        first: String,
        second: String,
    },

    #[error("unknown directive @{name} at {location}")]
    UnknownDirective { name: String, location: String },

    #[error("invalid argument '{argument}' of @{directive} at {location}: {message}")]
    InvalidArgument {
        directive: String,
        argument: String,
        location: String,
        message: String,
    },

    #[error("malformed template \"{template}\" at {location}: {message}")]
    MalformedTemplate {
        template: String,
        location: String,
        message: String,
    },

    #[error("missing export '{key}' referenced at {location}: no field exports it")]
    MissingExport { key: String, location: String },

    #[error("invalid schema: {message}")]
    Invalid { message: String },
}

impl AssemblyError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors raised while resolving a single field.
///
/// These are local to the field: the field resolves to null (following
/// nullability rules) and siblings keep resolving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("policy {namespace}/{name} denied access: {reason}")]
    PolicyDenied {
        namespace: String,
        name: String,
        reason: String,
    },

    /// The evaluator itself failed. Treated as a denial.
    #[error("policy evaluation error for {namespace}/{name}: {message}")]
    EvaluatorUnavailable {
        namespace: String,
        name: String,
        message: String,
    },

    #[error("upstream request to {url} failed: {message}")]
    Upstream {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("missing export '{key}' on the current resolution path")]
    MissingExport { key: String },

    #[error("template error: {message}")]
    Template { message: String },

    #[error("{message}")]
    Resolver { message: String },

    #[error("{message}")]
    Unsupported { message: String },
}

impl FieldError {
    /// Shorthand for an error produced by a field resolver.
    pub fn resolver(message: impl Into<String>) -> Self {
        Self::Resolver {
            message: message.into(),
        }
    }

    /// Returns the error code reported in `extensions.code`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PolicyDenied { .. } => "POLICY_DENIED",
            Self::EvaluatorUnavailable { .. } => "POLICY_EVALUATION_ERROR",
            Self::Upstream { .. } => "UPSTREAM_FAILURE",
            Self::MissingExport { .. } => "MISSING_EXPORT",
            Self::Template { .. } => "TEMPLATE_ERROR",
            Self::Resolver { .. } => "RESOLVER_ERROR",
            Self::Unsupported { .. } => "UNSUPPORTED",
        }
    }

    /// True for both explicit denials and evaluator failures.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::PolicyDenied { .. } | Self::EvaluatorUnavailable { .. }
        )
    }
}

/// Errors while loading a schema bundle.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. }
            | LoadError::ReadError { .. }
            | LoadError::NetworkError { .. } => 3,
            LoadError::InvalidJson { .. } => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("bundle.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = LoadError::InvalidJson {
            source: serde_json::from_str::<serde_json::Value>("nope").unwrap_err(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn field_error_codes() {
        let denied = FieldError::PolicyDenied {
            namespace: "ns".into(),
            name: "alwaysDeny".into(),
            reason: "nope".into(),
        };
        assert_eq!(denied.code(), "POLICY_DENIED");
        assert!(denied.is_denial());

        let unavailable = FieldError::EvaluatorUnavailable {
            namespace: "ns".into(),
            name: "p".into(),
            message: "timeout".into(),
        };
        assert_eq!(unavailable.code(), "POLICY_EVALUATION_ERROR");
        assert!(unavailable.is_denial());

        assert!(!FieldError::resolver("boom").is_denial());
    }

    #[test]
    fn assembly_error_display() {
        let err = AssemblyError::UnknownDirective {
            name: "cache".into(),
            location: "Query.foo".into(),
        };
        assert_eq!(err.to_string(), "unknown directive @cache at Query.foo");

        let err = AssemblyError::TypeConflict {
            name: "Foo".into(),
            first: "ns/a".into(),
            second: "ns/b".into(),
        };
        assert!(err.to_string().starts_with("type conflict"));
    }
}
