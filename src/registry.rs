//! Directive registry: the fixed set of directives the gateway understands and
//! how each one turns into a [`Behavior`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::AssemblyError;
use crate::exports::ExportBehavior;
use crate::policy::{PolicyBehavior, PolicyEvaluator};
use crate::pipeline::Behavior;
use crate::rest::{RestBehavior, RestCall, RestClient, RestMethod};
use crate::stub::StubBehavior;
use crate::template::{Namespace, Placeholder, Template, TemplateError, ValueTemplate};
use crate::transform::CaseTransform;
use crate::types::{json_type_name, Upstream};

/// Name of the scalar used for free-form directive arguments.
pub const JSON_SCALAR: &str = "JSON";

/// Definitions of every registered directive.
pub const DIRECTIVES_SDL: &str = r#"
directive @stub(value: JSON!) on FIELD_DEFINITION
directive @export(key: String!) on FIELD_DEFINITION
directive @policy(namespace: String!, name: String!, args: JSON) repeatable on OBJECT | FIELD_DEFINITION
directive @rest(url: String!, method: String = "GET", headers: [RestHeader!], bodyArg: String) on FIELD_DEFINITION
directive @lowerCase on OBJECT | FIELD_DEFINITION
directive @upperCase on OBJECT | FIELD_DEFINITION

input RestHeader {
  key: String!
  value: String!
}
"#;

/// Registered directive names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Stub,
    Export,
    Policy,
    Rest,
    LowerCase,
    UpperCase,
}

impl DirectiveKind {
    pub const ALL: [DirectiveKind; 6] = [
        DirectiveKind::Stub,
        DirectiveKind::Export,
        DirectiveKind::Policy,
        DirectiveKind::Rest,
        DirectiveKind::LowerCase,
        DirectiveKind::UpperCase,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DirectiveKind::Stub => "stub",
            DirectiveKind::Export => "export",
            DirectiveKind::Policy => "policy",
            DirectiveKind::Rest => "rest",
            DirectiveKind::LowerCase => "lowerCase",
            DirectiveKind::UpperCase => "upperCase",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name())
    }
}

/// One directive application, with its arguments as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub kind: DirectiveKind,
    pub arguments: Map<String, Value>,
    /// Where the directive was applied: `Type` or `Type.field`.
    pub coordinate: String,
}

impl Annotation {
    fn invalid(&self, argument: &str, message: impl Into<String>) -> AssemblyError {
        AssemblyError::InvalidArgument {
            directive: self.kind.name().to_string(),
            argument: argument.to_string(),
            location: self.coordinate.clone(),
            message: message.into(),
        }
    }

    fn malformed(&self, template: &str, message: impl Into<String>) -> AssemblyError {
        AssemblyError::MalformedTemplate {
            template: template.to_string(),
            location: self.coordinate.clone(),
            message: message.into(),
        }
    }

    fn optional_str(&self, argument: &str) -> Result<Option<&str>, AssemblyError> {
        match self.arguments.get(argument) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(self.invalid(
                argument,
                format!("expected a string, got {}", json_type_name(other)),
            )),
        }
    }

    fn required_str(&self, argument: &str) -> Result<&str, AssemblyError> {
        match self.optional_str(argument)? {
            Some(s) if !s.trim().is_empty() => Ok(s),
            _ => Err(self.invalid(argument, "must be a non-empty string")),
        }
    }

    fn template(&self, source: &str) -> Result<Template, AssemblyError> {
        source
            .parse()
            .map_err(|err: TemplateError| self.malformed(source, err.message))
    }

    fn value_template(&self, argument: &str) -> Result<Option<ValueTemplate>, AssemblyError> {
        match self.arguments.get(argument) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => ValueTemplate::parse(value)
                .map(Some)
                .map_err(|err| self.malformed(&value.to_string(), err.message)),
        }
    }
}

/// What the registry needs to know about the field a behavior is built for.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    /// Arguments declared on the field.
    pub field_arguments: &'a [String],
    /// Every export key declared anywhere in the bundle.
    pub exported_keys: &'a HashSet<String>,
    pub upstreams: &'a Arc<Vec<Upstream>>,
}

impl BuildContext<'_> {
    fn check<'p>(
        &self,
        annotation: &Annotation,
        placeholders: impl IntoIterator<Item = &'p Placeholder>,
    ) -> Result<(), AssemblyError> {
        for placeholder in placeholders {
            let key = placeholder.key();
            match placeholder.namespace {
                Namespace::Args if !self.field_arguments.iter().any(|a| a == key) => {
                    return Err(annotation.malformed(
                        &placeholder.to_string(),
                        format!("argument '{key}' is not declared on this field"),
                    ));
                }
                Namespace::Exports if !self.exported_keys.contains(key) => {
                    return Err(AssemblyError::MissingExport {
                        key: key.to_string(),
                        location: annotation.coordinate.clone(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Maps directive names to behaviors and holds the collaborators those
/// behaviors call.
#[derive(Clone)]
pub struct DirectiveRegistry {
    policy: Arc<dyn PolicyEvaluator>,
    rest: RestClient,
}

impl DirectiveRegistry {
    pub fn new(policy: Arc<dyn PolicyEvaluator>) -> Self {
        Self {
            policy,
            rest: RestClient::default(),
        }
    }

    /// Use `client` for `@rest` calls.
    pub fn with_rest_client(mut self, client: RestClient) -> Self {
        self.rest = client;
        self
    }

    pub fn lookup(&self, name: &str) -> Option<DirectiveKind> {
        DirectiveKind::from_name(name)
    }

    /// Directive definitions merged into every assembled schema.
    pub fn sdl(&self) -> &'static str {
        DIRECTIVES_SDL
    }

    /// Build the behavior for one annotation.
    ///
    /// # Errors
    ///
    /// Returns an assembly error when an argument is invalid, a template is
    /// malformed, or a template reads an export no field declares.
    pub fn build(
        &self,
        annotation: &Annotation,
        ctx: &BuildContext<'_>,
    ) -> Result<Arc<dyn Behavior>, AssemblyError> {
        Ok(match annotation.kind {
            DirectiveKind::Stub => {
                let value = annotation
                    .value_template("value")?
                    .ok_or_else(|| annotation.invalid("value", "is required"))?;
                ctx.check(annotation, value.placeholders())?;
                Arc::new(StubBehavior::new(value))
            }
            DirectiveKind::Export => {
                let key = annotation.required_str("key")?;
                Arc::new(ExportBehavior::new(key))
            }
            DirectiveKind::Policy => {
                let namespace = annotation.required_str("namespace")?;
                let name = annotation.required_str("name")?;
                let args = annotation.value_template("args")?;
                if let Some(args) = &args {
                    ctx.check(annotation, args.placeholders())?;
                }
                Arc::new(PolicyBehavior::new(
                    namespace,
                    name,
                    args,
                    self.policy.clone(),
                ))
            }
            DirectiveKind::Rest => {
                let call = self.rest_call(annotation, ctx)?;
                Arc::new(RestBehavior::new(
                    call,
                    ctx.upstreams.clone(),
                    self.rest.clone(),
                ))
            }
            DirectiveKind::LowerCase => Arc::new(CaseTransform::Lower),
            DirectiveKind::UpperCase => Arc::new(CaseTransform::Upper),
        })
    }

    fn rest_call(
        &self,
        annotation: &Annotation,
        ctx: &BuildContext<'_>,
    ) -> Result<RestCall, AssemblyError> {
        let url_source = annotation.required_str("url")?;
        let url = annotation.template(url_source)?;
        ctx.check(annotation, url.placeholders())?;

        let method = match annotation.optional_str("method")? {
            Some(method) => method
                .parse::<RestMethod>()
                .map_err(|message| annotation.invalid("method", message))?,
            None => RestMethod::Get,
        };

        let mut headers = Vec::new();
        if let Some(entries) = annotation.arguments.get("headers") {
            let entries = match entries {
                Value::Null => &[][..],
                Value::Array(entries) => entries.as_slice(),
                other => std::slice::from_ref(other),
            };
            for entry in entries {
                let key = entry.get("key").and_then(Value::as_str);
                let value = entry.get("value").and_then(Value::as_str);
                let (Some(key), Some(value)) = (key, value) else {
                    return Err(annotation.invalid("headers", "each header needs a key and a value"));
                };
                let template = annotation.template(value)?;
                ctx.check(annotation, template.placeholders())?;
                headers.push((key.to_string(), template));
            }
        }

        let body_arg = annotation.optional_str("bodyArg")?.map(str::to_string);
        if let Some(arg) = &body_arg {
            if !ctx.field_arguments.contains(arg) {
                return Err(annotation.invalid(
                    "bodyArg",
                    format!("argument '{arg}' is not declared on this field"),
                ));
            }
        }

        Ok(RestCall {
            url,
            method,
            headers,
            body_arg,
        })
    }
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveRegistry")
            .field("directives", &DirectiveKind::ALL)
            .field("rest", &self.rest)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::StaticPolicyEvaluator;
    use serde_json::json;

    fn registry() -> DirectiveRegistry {
        DirectiveRegistry::new(Arc::new(StaticPolicyEvaluator::new()))
    }

    fn annotation(kind: DirectiveKind, arguments: Value) -> Annotation {
        Annotation {
            kind,
            arguments: arguments.as_object().cloned().unwrap(),
            coordinate: "Query.team".to_string(),
        }
    }

    struct Fixture {
        arguments: Vec<String>,
        exported: HashSet<String>,
        upstreams: Arc<Vec<Upstream>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                arguments: vec!["id".to_string()],
                exported: HashSet::from(["org".to_string()]),
                upstreams: Arc::new(Vec::new()),
            }
        }

        fn ctx(&self) -> BuildContext<'_> {
            BuildContext {
                field_arguments: &self.arguments,
                exported_keys: &self.exported,
                upstreams: &self.upstreams,
            }
        }
    }

    #[test]
    fn lookup_knows_registered_names() {
        let registry = registry();
        assert_eq!(registry.lookup("lowerCase"), Some(DirectiveKind::LowerCase));
        assert_eq!(registry.lookup("cache"), None);
        assert!(registry.sdl().contains("directive @rest("));
    }

    #[test]
    fn builds_rest_with_headers() {
        let fixture = Fixture::new();
        let behavior = registry()
            .build(
                &annotation(
                    DirectiveKind::Rest,
                    json!({
                        "url": "http://hr.internal/orgs/{exports.org}/teams/{args.id}",
                        "method": "get",
                        "headers": [{ "key": "x-team", "value": "{args.id}" }]
                    }),
                ),
                &fixture.ctx(),
            )
            .unwrap();
        assert_eq!(behavior.name(), "rest");
    }

    #[test]
    fn rejects_undeclared_argument() {
        let fixture = Fixture::new();
        let err = registry()
            .build(
                &annotation(DirectiveKind::Rest, json!({ "url": "http://x/{args.slug}" })),
                &fixture.ctx(),
            )
            .unwrap_err();
        assert!(matches!(err, AssemblyError::MalformedTemplate { .. }));
    }

    #[test]
    fn rejects_export_nobody_declares() {
        let fixture = Fixture::new();
        let err = registry()
            .build(
                &annotation(DirectiveKind::Stub, json!({ "value": "{exports.tenant}" })),
                &fixture.ctx(),
            )
            .unwrap_err();
        assert!(matches!(err, AssemblyError::MissingExport { ref key, .. } if key == "tenant"));
    }

    #[test]
    fn rejects_unknown_method() {
        let fixture = Fixture::new();
        let err = registry()
            .build(
                &annotation(DirectiveKind::Rest, json!({ "url": "http://x", "method": "TRACE" })),
                &fixture.ctx(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("unsupported method"));
    }

    #[test]
    fn rejects_empty_policy_namespace() {
        let fixture = Fixture::new();
        let err = registry()
            .build(
                &annotation(DirectiveKind::Policy, json!({ "namespace": "", "name": "p" })),
                &fixture.ctx(),
            )
            .unwrap_err();
        assert!(matches!(err, AssemblyError::InvalidArgument { ref argument, .. } if argument == "namespace"));
    }

    #[test]
    fn rejects_undeclared_body_arg() {
        let fixture = Fixture::new();
        let err = registry()
            .build(
                &annotation(
                    DirectiveKind::Rest,
                    json!({ "url": "http://x", "method": "POST", "bodyArg": "input" }),
                ),
                &fixture.ctx(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("bodyArg"));
    }
}
