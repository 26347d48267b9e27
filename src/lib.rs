//! Stitch Gateway
//!
//! Directive-driven GraphQL schema stitching and execution.
//!
//! Schema documents registered by independent teams are merged into one
//! executable schema. Field behavior is declared with directives in the SDL:
//! canned values, REST delegation, policy gates, value transforms and values
//! exported to descendant fields.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use stitch_gateway::{
//!     Gateway, GatewayOptions, Request, SchemaBundle, SchemaDocument, StaticPolicyEvaluator,
//! };
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let policies = StaticPolicyEvaluator::new().allow("hr", "isEmployee");
//! let gateway = Gateway::new(Arc::new(policies), GatewayOptions::new());
//!
//! let bundle = SchemaBundle::new("v1").with_schema(SchemaDocument::new(
//!     "hr",
//!     "greeting",
//!     r#"
//!     type Query {
//!         greeting: String @policy(namespace: "hr", name: "isEmployee") @upperCase @stub(value: "hello")
//!     }
//!     "#,
//! ));
//! gateway.apply_bundle(&bundle).unwrap();
//!
//! let response = gateway.execute(&Request::new("{ greeting }")).await;
//! assert_eq!(response.data, Some(json!({ "greeting": "HELLO" })));
//! # });
//! ```
//!
//! # Directives
//!
//! | Directive | Locations | Effect |
//! |-----------|-----------|--------|
//! | `@stub(value: JSON!)` | field | Fixed value, templated from args and exports |
//! | `@rest(url, method, headers, bodyArg)` | field | Value fetched from a REST upstream |
//! | `@export(key: String!)` | field | Publishes the field's value to descendants |
//! | `@policy(namespace, name, args)` | object, field | Denies access unless the policy allows |
//! | `@lowerCase` / `@upperCase` | object, field | Case-maps string results |
//!
//! Directives wrap each other in declaration order: the first directive on a
//! field is the outermost. Object-level directives wrap every field of the
//! type and come before the field's own.
//!
//! # Templates
//!
//! `{args.id}`, `{exports.orgId}` and `{parent.name}` are replaced at
//! resolution time. A placeholder that cannot be resolved fails the field:
//! a missing export with `MISSING_EXPORT`, an absent argument or parent
//! property with `TEMPLATE_ERROR`. Braces that do not enclose a
//! `namespace.path` expression are literal text, so JSON can be stubbed.

mod assembler;
mod error;
mod executor;
mod exports;
mod gateway;
mod loader;
mod pipeline;
mod policy;
mod registry;
mod response;
mod rest;
mod stub;
mod template;
mod transform;
mod types;

pub use assembler::{assemble, Assembler, ExecutableSchema, ResolverMap};
pub use error::{AssemblyError, FieldError, LoadError};
pub use executor::execute;
pub use exports::{ExportBehavior, ExportContext};
pub use gateway::Gateway;
pub use loader::{
    is_url, load_bundle, load_bundle_auto, load_bundle_str, load_bundle_url, load_json,
    BundleSource, FileBundleSource, HttpBundleSource,
};
pub use pipeline::{
    resolver_fn, Behavior, FieldChain, FieldContext, FieldResolver, Next, PropertyResolver,
    RequestState, Resolution,
};
pub use policy::{
    PolicyBehavior, PolicyDecision, PolicyEvaluator, PolicyEvaluatorError, PolicyRequest,
    StaticPolicyEvaluator,
};
pub use registry::{
    Annotation, BuildContext, DirectiveKind, DirectiveRegistry, DIRECTIVES_SDL, JSON_SCALAR,
};
pub use response::{GraphQLError, Location, PathElement, Request, Response};
pub use rest::{RestBehavior, RestCall, RestClient, RestMethod};
pub use stub::StubBehavior;
pub use template::{Namespace, Placeholder, Scope, Template, TemplateError, ValueTemplate};
pub use transform::CaseTransform;
pub use types::{
    GatewayOptions, ResourceMetadata, SchemaBundle, SchemaDocument, Upstream,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_REST_TIMEOUT,
};
