//! Schema assembly: bundle documents + directive registry → executable schema.
//!
//! Assembly merges every document of a bundle into one schema, rejects
//! conflicts and unknown directives, validates the result with
//! `apollo-compiler`, and composes a [`FieldChain`] for every object field.
//! It is a pure function of its inputs.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use apollo_compiler::ast;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::validation::Valid;
use apollo_compiler::Schema;
use serde_json::{Map, Value};

use crate::error::AssemblyError;
use crate::pipeline::{Behavior, FieldChain, FieldResolver, PropertyResolver};
use crate::registry::{Annotation, BuildContext, DirectiveKind, DirectiveRegistry, JSON_SCALAR};
use crate::types::SchemaBundle;

/// Source name used for the registry's own definitions in diagnostics.
const REGISTRY_SOURCE: &str = "stitch/directives.graphql";

/// Directives every GraphQL schema may use without registering them.
const BUILT_IN_DIRECTIVES: &[&str] = &["deprecated", "specifiedBy", "oneOf", "skip", "include"];

/// Assemble `bundle` with the default property resolver on every field.
///
/// # Errors
///
/// See [`Assembler::assemble`].
pub fn assemble(
    bundle: &SchemaBundle,
    registry: &DirectiveRegistry,
) -> Result<ExecutableSchema, AssemblyError> {
    Assembler::new(registry).assemble(bundle)
}

/// Native resolvers keyed by `(type, field)`.
#[derive(Clone, Default)]
pub struct ResolverMap {
    resolvers: HashMap<(String, String), Arc<dyn FieldResolver>>,
}

impl ResolverMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `resolver` for `type_name.field_name`.
    pub fn with(
        mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: Arc<dyn FieldResolver>,
    ) -> Self {
        self.insert(type_name, field_name, resolver);
        self
    }

    pub fn insert(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: Arc<dyn FieldResolver>,
    ) {
        self.resolvers
            .insert((type_name.into(), field_name.into()), resolver);
    }

    fn get(&self, type_name: &str, field_name: &str) -> Option<Arc<dyn FieldResolver>> {
        self.resolvers
            .get(&(type_name.to_string(), field_name.to_string()))
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl fmt::Debug for ResolverMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .resolvers
            .keys()
            .map(|(t, f)| format!("{t}.{f}"))
            .collect();
        keys.sort();
        f.debug_struct("ResolverMap").field("fields", &keys).finish()
    }
}

/// Configured assembly run.
#[derive(Debug)]
pub struct Assembler<'r> {
    registry: &'r DirectiveRegistry,
    resolvers: ResolverMap,
}

impl<'r> Assembler<'r> {
    pub fn new(registry: &'r DirectiveRegistry) -> Self {
        Self {
            registry,
            resolvers: ResolverMap::new(),
        }
    }

    /// Install native resolvers. Directive behaviors still wrap them.
    pub fn with_resolvers(mut self, resolvers: ResolverMap) -> Self {
        self.resolvers = resolvers;
        self
    }

    /// Assemble a bundle.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyError`] when a document does not parse, two
    /// documents define the same type or field, a directive is not
    /// registered, a directive argument or template is invalid, or the merged
    /// schema fails validation.
    #[tracing::instrument(skip_all, fields(etag = %bundle.etag, documents = bundle.schemas.len()))]
    pub fn assemble(&self, bundle: &SchemaBundle) -> Result<ExecutableSchema, AssemblyError> {
        let mut definitions = Definitions::default();
        for document in &bundle.schemas {
            let id = document.id();
            let ast = ast::Document::parse(&document.schema, &id).map_err(|invalid| {
                AssemblyError::Parse {
                    document: id.clone(),
                    message: invalid.errors.to_string(),
                }
            })?;
            definitions.record(&ast, &id, self.registry)?;
        }
        if let Some(first) = definitions.types.get("RestHeader") {
            return Err(AssemblyError::TypeConflict {
                name: "RestHeader".to_string(),
                first: first.clone(),
                second: REGISTRY_SOURCE.to_string(),
            });
        }

        let mut builder = Schema::builder().adopt_orphan_extensions();
        for document in &bundle.schemas {
            builder = builder.parse(&document.schema, document.id());
        }
        builder = builder.parse(self.registry.sdl(), REGISTRY_SOURCE);
        if !definitions.types.contains_key(JSON_SCALAR) {
            builder = builder.parse(format!("scalar {JSON_SCALAR}"), REGISTRY_SOURCE);
        }
        let schema = builder.build().map_err(|invalid| AssemblyError::Invalid {
            message: invalid.errors.to_string(),
        })?;

        check_directive_usages(&schema, self.registry)?;

        let schema = schema.validate().map_err(|invalid| AssemblyError::Invalid {
            message: invalid.errors.to_string(),
        })?;

        let plans = self.plan(&schema, bundle)?;
        tracing::info!(types = plans.len(), "assembled schema");

        Ok(ExecutableSchema {
            schema,
            plans,
            fallback: FieldChain::plain(),
            etag: bundle.etag.clone(),
        })
    }

    fn plan(
        &self,
        schema: &Valid<Schema>,
        bundle: &SchemaBundle,
    ) -> Result<HashMap<String, TypePlan>, AssemblyError> {
        let exported_keys = exported_keys(schema);
        let upstreams = Arc::new(bundle.upstreams.clone());
        let mut plans = HashMap::new();
        let mut used_resolvers = HashSet::new();

        for (type_name, ty) in &schema.types {
            let ExtendedType::Object(object) = ty else {
                continue;
            };
            if ty.is_built_in() {
                continue;
            }

            let type_annotations: Vec<Annotation> = object
                .directives
                .iter()
                .filter_map(|directive| annotation(directive, type_name.as_str(), self.registry))
                .collect();

            let mut plan = TypePlan::default();
            for (field_name, field) in &object.fields {
                let coordinate = format!("{type_name}.{field_name}");
                let field_annotations: Vec<Annotation> = field
                    .directives
                    .iter()
                    .filter_map(|directive| annotation(directive, &coordinate, self.registry))
                    .collect();

                let field_arguments: Vec<String> =
                    field.arguments.iter().map(|a| a.name.to_string()).collect();
                let ctx = BuildContext {
                    field_arguments: &field_arguments,
                    exported_keys: &exported_keys,
                    upstreams: &upstreams,
                };
                let behaviors = type_annotations
                    .iter()
                    .chain(&field_annotations)
                    .map(|annotation| self.registry.build(annotation, &ctx))
                    .collect::<Result<Vec<Arc<dyn Behavior>>, _>>()?;

                let resolver = match self.resolvers.get(type_name, field_name) {
                    Some(resolver) => {
                        used_resolvers.insert((type_name.to_string(), field_name.to_string()));
                        resolver
                    }
                    None => Arc::new(PropertyResolver) as Arc<dyn FieldResolver>,
                };

                if field_annotations
                    .iter()
                    .any(|a| a.kind == DirectiveKind::Export)
                {
                    plan.exporters.push(Exporter {
                        field: field_name.to_string(),
                        default_arguments: field
                            .arguments
                            .iter()
                            .filter_map(|arg| {
                                arg.default_value.as_ref().map(|default| {
                                    (arg.name.to_string(), to_json(default, &Map::new()))
                                })
                            })
                            .collect(),
                    });
                }
                tracing::trace!(
                    field = %coordinate,
                    behaviors = behaviors.len(),
                    "composed field chain"
                );
                plan.fields
                    .insert(field_name.to_string(), FieldChain::new(behaviors, resolver));
            }
            plans.insert(type_name.to_string(), plan);
        }

        let mut unknown: Vec<String> = self
            .resolvers
            .resolvers
            .keys()
            .filter(|key| !used_resolvers.contains(*key))
            .map(|(t, f)| format!("{t}.{f}"))
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(AssemblyError::Invalid {
                message: format!(
                    "resolvers registered for unknown fields: {}",
                    unknown.join(", ")
                ),
            });
        }
        Ok(plans)
    }
}

/// Type and field names seen so far, with the document that defined them.
#[derive(Default)]
struct Definitions {
    types: HashMap<String, String>,
    fields: HashMap<String, String>,
}

impl Definitions {
    fn record(
        &mut self,
        document: &ast::Document,
        id: &str,
        registry: &DirectiveRegistry,
    ) -> Result<(), AssemblyError> {
        for definition in &document.definitions {
            match definition {
                ast::Definition::OperationDefinition(_) | ast::Definition::FragmentDefinition(_) => {
                    return Err(AssemblyError::InvalidDocument {
                        document: id.to_string(),
                        message: "operations and fragments are not allowed in schema documents"
                            .to_string(),
                    });
                }
                ast::Definition::DirectiveDefinition(def) if registry.lookup(&def.name).is_some() => {
                    return Err(AssemblyError::InvalidDocument {
                        document: id.to_string(),
                        message: format!("redefines registered directive @{}", def.name),
                    });
                }
                ast::Definition::ScalarTypeDefinition(def) => self.add_type(&def.name, id)?,
                ast::Definition::UnionTypeDefinition(def) => self.add_type(&def.name, id)?,
                ast::Definition::EnumTypeDefinition(def) => self.add_type(&def.name, id)?,
                ast::Definition::ObjectTypeDefinition(def) => {
                    self.add_type(&def.name, id)?;
                    for field in &def.fields {
                        self.add_field(&def.name, &field.name, id)?;
                    }
                }
                ast::Definition::ObjectTypeExtension(def) => {
                    for field in &def.fields {
                        self.add_field(&def.name, &field.name, id)?;
                    }
                }
                ast::Definition::InterfaceTypeDefinition(def) => {
                    self.add_type(&def.name, id)?;
                    for field in &def.fields {
                        self.add_field(&def.name, &field.name, id)?;
                    }
                }
                ast::Definition::InterfaceTypeExtension(def) => {
                    for field in &def.fields {
                        self.add_field(&def.name, &field.name, id)?;
                    }
                }
                ast::Definition::InputObjectTypeDefinition(def) => {
                    self.add_type(&def.name, id)?;
                    for field in &def.fields {
                        self.add_field(&def.name, &field.name, id)?;
                    }
                }
                ast::Definition::InputObjectTypeExtension(def) => {
                    for field in &def.fields {
                        self.add_field(&def.name, &field.name, id)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn add_type(&mut self, name: &str, id: &str) -> Result<(), AssemblyError> {
        if let Some(first) = self.types.insert(name.to_string(), id.to_string()) {
            return Err(AssemblyError::TypeConflict {
                name: name.to_string(),
                first,
                second: id.to_string(),
            });
        }
        Ok(())
    }

    fn add_field(&mut self, type_name: &str, field: &str, id: &str) -> Result<(), AssemblyError> {
        let coordinate = format!("{type_name}.{field}");
        if let Some(first) = self.fields.insert(coordinate.clone(), id.to_string()) {
            return Err(AssemblyError::FieldConflict {
                coordinate,
                first,
                second: id.to_string(),
            });
        }
        Ok(())
    }
}

fn check_directive_usages(schema: &Schema, registry: &DirectiveRegistry) -> Result<(), AssemblyError> {
    check_names(
        registry,
        schema.schema_definition.directives.iter().map(|d| d.name.as_str()),
        || "schema".to_string(),
    )?;

    for (type_name, ty) in &schema.types {
        if ty.is_built_in() {
            continue;
        }
        let at_type = || type_name.to_string();
        match ty {
            ExtendedType::Object(object) => {
                check_names(registry, object.directives.iter().map(|d| d.name.as_str()), at_type)?;
                for (field_name, field) in &object.fields {
                    check_field(registry, type_name, field_name, field)?;
                }
            }
            ExtendedType::Interface(interface) => {
                check_names(registry, interface.directives.iter().map(|d| d.name.as_str()), at_type)?;
                for (field_name, field) in &interface.fields {
                    check_field(registry, type_name, field_name, field)?;
                }
            }
            ExtendedType::Enum(enum_type) => {
                check_names(registry, enum_type.directives.iter().map(|d| d.name.as_str()), at_type)?;
                for (value_name, value) in &enum_type.values {
                    check_names(
                        registry,
                        value.directives.iter().map(|d| d.name.as_str()),
                        || format!("{type_name}.{value_name}"),
                    )?;
                }
            }
            ExtendedType::InputObject(input) => {
                check_names(registry, input.directives.iter().map(|d| d.name.as_str()), at_type)?;
                for (field_name, field) in &input.fields {
                    check_names(
                        registry,
                        field.directives.iter().map(|d| d.name.as_str()),
                        || format!("{type_name}.{field_name}"),
                    )?;
                }
            }
            ExtendedType::Scalar(scalar) => {
                check_names(registry, scalar.directives.iter().map(|d| d.name.as_str()), at_type)?;
            }
            ExtendedType::Union(union_type) => {
                check_names(registry, union_type.directives.iter().map(|d| d.name.as_str()), at_type)?;
            }
        }
    }
    Ok(())
}

fn check_field(
    registry: &DirectiveRegistry,
    type_name: &str,
    field_name: &str,
    field: &ast::FieldDefinition,
) -> Result<(), AssemblyError> {
    check_names(
        registry,
        field.directives.iter().map(|d| d.name.as_str()),
        || format!("{type_name}.{field_name}"),
    )?;
    for argument in &field.arguments {
        check_names(
            registry,
            argument.directives.iter().map(|d| d.name.as_str()),
            || format!("{type_name}.{field_name}({}:)", argument.name),
        )?;
    }
    Ok(())
}

/// Fails on the first directive that is neither registered nor built in.
fn check_names<'d>(
    registry: &DirectiveRegistry,
    names: impl IntoIterator<Item = &'d str>,
    location: impl Fn() -> String,
) -> Result<(), AssemblyError> {
    for name in names {
        if registry.lookup(name).is_none() && !BUILT_IN_DIRECTIVES.contains(&name) {
            return Err(AssemblyError::UnknownDirective {
                name: name.to_string(),
                location: location(),
            });
        }
    }
    Ok(())
}

/// Every `@export(key:)` declared on an object field.
fn exported_keys(schema: &Schema) -> HashSet<String> {
    schema
        .types
        .values()
        .filter_map(|ty| match ty {
            ExtendedType::Object(object) => Some(object),
            _ => None,
        })
        .flat_map(|object| object.fields.values())
        .flat_map(|field| field.directives.get_all("export"))
        .filter_map(|directive| match directive.specified_argument_by_name("key") {
            Some(value) => value.as_str().map(str::to_string),
            None => None,
        })
        .collect()
}

/// The registry's view of a directive application, or `None` for built-ins.
fn annotation(
    directive: &ast::Directive,
    coordinate: &str,
    registry: &DirectiveRegistry,
) -> Option<Annotation> {
    let kind = registry.lookup(&directive.name)?;
    let arguments = directive
        .arguments
        .iter()
        .map(|argument| (argument.name.to_string(), to_json(&argument.value, &Map::new())))
        .collect();
    Some(Annotation {
        kind,
        arguments,
        coordinate: coordinate.to_string(),
    })
}

/// Convert a GraphQL literal to JSON, substituting `variables`. Unknown
/// variables read as null.
pub(crate) fn to_json(value: &ast::Value, variables: &Map<String, Value>) -> Value {
    match value {
        ast::Value::Null => Value::Null,
        ast::Value::Enum(name) => Value::String(name.to_string()),
        ast::Value::Variable(name) => variables.get(name.as_str()).cloned().unwrap_or(Value::Null),
        ast::Value::String(s) => Value::String(s.to_string()),
        ast::Value::Float(f) => f
            .try_to_f64()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ast::Value::Int(i) => i
            .try_to_i32()
            .map(Value::from)
            .or_else(|_| i.try_to_f64().map(Value::from))
            .unwrap_or(Value::Null),
        ast::Value::Boolean(b) => Value::Bool(*b),
        ast::Value::List(items) => Value::Array(items.iter().map(|v| to_json(v, variables)).collect()),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, v)| (name.to_string(), to_json(v, variables)))
                .collect(),
        ),
    }
}

/// A field that must be evaluated when an object of its type is entered.
#[derive(Debug)]
pub(crate) struct Exporter {
    pub(crate) field: String,
    pub(crate) default_arguments: Map<String, Value>,
}

#[derive(Debug, Default)]
struct TypePlan {
    fields: HashMap<String, FieldChain>,
    exporters: Vec<Exporter>,
}

/// A validated schema with a composed chain on every object field.
///
/// Immutable once built; share it behind an `Arc`.
pub struct ExecutableSchema {
    schema: Valid<Schema>,
    plans: HashMap<String, TypePlan>,
    fallback: FieldChain,
    etag: String,
}

impl ExecutableSchema {
    pub fn schema(&self) -> &Valid<Schema> {
        &self.schema
    }

    /// Etag of the bundle this schema was assembled from.
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// The merged schema as SDL.
    pub fn sdl(&self) -> String {
        self.schema.to_string()
    }

    pub fn chain(&self, type_name: &str, field_name: &str) -> &FieldChain {
        self.plans
            .get(type_name)
            .and_then(|plan| plan.fields.get(field_name))
            .unwrap_or(&self.fallback)
    }

    /// Directive names on `type_name.field_name`, in execution order.
    pub fn behavior_names(&self, type_name: &str, field_name: &str) -> &[&'static str] {
        self.chain(type_name, field_name).behavior_names()
    }

    pub(crate) fn exporters(&self, type_name: &str) -> &[Exporter] {
        self.plans
            .get(type_name)
            .map(|plan| plan.exporters.as_slice())
            .unwrap_or_default()
    }
}

impl fmt::Debug for ExecutableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableSchema")
            .field("etag", &self.etag)
            .field("types", &self.plans.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::StaticPolicyEvaluator;
    use crate::types::SchemaDocument;

    fn registry() -> DirectiveRegistry {
        DirectiveRegistry::new(Arc::new(StaticPolicyEvaluator::new()))
    }

    fn bundle(documents: &[&str]) -> SchemaBundle {
        documents
            .iter()
            .enumerate()
            .fold(SchemaBundle::new("etag"), |bundle, (i, sdl)| {
                bundle.with_schema(SchemaDocument::new("ns", format!("doc{i}"), *sdl))
            })
    }

    #[test]
    fn merges_documents_and_extensions() {
        let schema = assemble(
            &bundle(&[
                "type Query { a: String }",
                "extend type Query { b: String @stub(value: \"B\") }",
            ]),
            &registry(),
        )
        .unwrap();

        let sdl = schema.sdl();
        assert!(sdl.contains("b: String"));
        assert_eq!(schema.behavior_names("Query", "b"), &["stub"]);
        assert!(schema.behavior_names("Query", "a").is_empty());
        assert_eq!(schema.etag(), "etag");
    }

    #[test]
    fn type_directives_precede_field_directives() {
        let schema = assemble(
            &bundle(&[r#"
                type Foo @lowerCase @policy(namespace: "ns", name: "p") {
                  bar: String @stub(value: "BAR") @upperCase
                }
                type Query { foo: Foo }
            "#]),
            &registry(),
        )
        .unwrap();

        assert_eq!(
            schema.behavior_names("Foo", "bar"),
            &["lowerCase", "policy", "stub", "upperCase"]
        );
    }

    #[test]
    fn rejects_unknown_directive() {
        let err = assemble(
            &bundle(&["type Query { a: String @cache(ttl: 5) }"]),
            &registry(),
        )
        .unwrap_err();
        assert!(
            matches!(err, AssemblyError::UnknownDirective { ref name, ref location } if name == "cache" && location == "Query.a")
        );
    }

    #[test]
    fn rejects_type_defined_twice() {
        let err = assemble(
            &bundle(&["type Query { a: String }", "type Query { b: String }"]),
            &registry(),
        )
        .unwrap_err();
        assert!(
            matches!(err, AssemblyError::TypeConflict { ref name, ref first, ref second } if name == "Query" && first == "ns/doc0" && second == "ns/doc1")
        );
    }

    #[test]
    fn rejects_field_defined_twice() {
        let err = assemble(
            &bundle(&[
                "type Query { a: String }",
                "extend type Query { a: Int }",
            ]),
            &registry(),
        )
        .unwrap_err();
        assert!(matches!(err, AssemblyError::FieldConflict { .. }));
    }

    #[test]
    fn rejects_parse_errors() {
        let err = assemble(&bundle(&["type Query {"]), &registry()).unwrap_err();
        assert!(matches!(err, AssemblyError::Parse { ref document, .. } if document == "ns/doc0"));
    }

    #[test]
    fn rejects_operations_in_schema_documents() {
        let err = assemble(
            &bundle(&["type Query { a: String } query { a }"]),
            &registry(),
        )
        .unwrap_err();
        assert!(matches!(err, AssemblyError::InvalidDocument { .. }));
    }

    #[test]
    fn rejects_registry_directive_redefinition() {
        let err = assemble(
            &bundle(&["directive @stub(value: String) on FIELD_DEFINITION type Query { a: String }"]),
            &registry(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("redefines registered directive @stub"));
    }

    #[test]
    fn rejects_invalid_schema() {
        let err = assemble(&bundle(&["type Query { a: Missing }"]), &registry()).unwrap_err();
        assert!(matches!(err, AssemblyError::Invalid { .. }));
    }

    #[test]
    fn rejects_import_without_export() {
        let err = assemble(
            &bundle(&[r#"type Query { a: String @stub(value: "{exports.org}") }"#]),
            &registry(),
        )
        .unwrap_err();
        assert!(matches!(err, AssemblyError::MissingExport { ref key, .. } if key == "org"));
    }

    #[test]
    fn user_defined_json_scalar_is_kept() {
        let schema = assemble(
            &bundle(&["scalar JSON type Query { a: JSON @stub(value: {x: 1}) }"]),
            &registry(),
        )
        .unwrap();
        assert_eq!(schema.behavior_names("Query", "a"), &["stub"]);
    }

    #[test]
    fn rejects_resolver_for_unknown_field() {
        let resolvers = ResolverMap::new().with(
            "Query",
            "missing",
            Arc::new(PropertyResolver),
        );
        let err = Assembler::new(&registry())
            .with_resolvers(resolvers)
            .assemble(&bundle(&["type Query { a: String }"]))
            .unwrap_err();
        assert!(err.to_string().contains("Query.missing"));
    }

    #[test]
    fn exporters_are_recorded_with_default_arguments() {
        let schema = assemble(
            &bundle(&[r#"
                type Organization {
                  name(format: String = "short"): String @export(key: "organizationName")
                  employees: [Employee]
                }
                type Employee { organizationName: String @stub(value: "{exports.organizationName}") }
                type Query { organizations: [Organization] }
            "#]),
            &registry(),
        )
        .unwrap();

        let exporters = schema.exporters("Organization");
        assert_eq!(exporters.len(), 1);
        assert_eq!(exporters[0].field, "name");
        assert_eq!(exporters[0].default_arguments["format"], "short");
        assert!(schema.exporters("Employee").is_empty());
    }

    #[test]
    fn literals_convert_to_json() {
        let value = ast::Value::Object(vec![
            (
                apollo_compiler::name!("a"),
                ast::Value::List(vec![
                    ast::Value::String("x".to_string()).into(),
                    ast::Value::Null.into(),
                ])
                .into(),
            ),
            (
                apollo_compiler::name!("b"),
                ast::Value::Variable(apollo_compiler::name!("v")).into(),
            ),
            (
                apollo_compiler::name!("c"),
                ast::Value::Enum(apollo_compiler::name!("ACTIVE")).into(),
            ),
        ]);
        let variables = serde_json::json!({ "v": true }).as_object().cloned().unwrap();
        assert_eq!(
            to_json(&value, &variables),
            serde_json::json!({ "a": ["x", null], "b": true, "c": "ACTIVE" })
        );
    }
}
