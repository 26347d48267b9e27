//! Query execution over an [`ExecutableSchema`].
//!
//! Follows the GraphQL execution algorithm: collect fields (fragments,
//! `@skip`/`@include`), resolve each field through its [`FieldChain`], then
//! complete the value against the field type with null propagation. Sibling
//! fields and list items are resolved concurrently; root mutation fields run
//! one after another.
//!
//! Every object carries an [`ExportContext`]. On entering an object, the
//! fields of its type that declare `@export` are evaluated first (selected or
//! not) and their exports are visible to every field of that object and all
//! of its descendants.
//!
//! [`FieldChain`]: crate::pipeline::FieldChain

use std::collections::HashSet;

use apollo_compiler::collections::IndexMap;
use apollo_compiler::executable::{Field, Operation, OperationType, Selection, SelectionSet};
use apollo_compiler::schema::{ExtendedType, Type};
use apollo_compiler::validation::Valid;
use apollo_compiler::{ast, ExecutableDocument, Node, Schema};
use futures::future::{join_all, BoxFuture};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::assembler::{to_json, ExecutableSchema};
use crate::error::FieldError;
use crate::exports::ExportContext;
use crate::pipeline::{FieldContext, RequestState, Resolution};
use crate::response::{GraphQLError, Location, PathElement, Request, Response};
use crate::types::json_type_name;

/// Execute `request` against `schema`.
///
/// Request errors (parse, validation, operation selection) produce a response
/// without `data`. Field errors are collected and the affected fields are
/// nulled according to their types.
#[tracing::instrument(level = "debug", skip_all, fields(etag = schema.etag()))]
pub async fn execute(schema: &ExecutableSchema, request: &Request) -> Response {
    let document = match ExecutableDocument::parse_and_validate(
        schema.schema(),
        &request.query,
        "query.graphql",
    ) {
        Ok(document) => document,
        Err(invalid) => {
            return Response::from_errors(
                invalid
                    .errors
                    .iter()
                    .map(|diagnostic| {
                        let error = diagnostic.to_json();
                        GraphQLError {
                            locations: error
                                .locations
                                .iter()
                                .map(|l| Location {
                                    line: l.line,
                                    column: l.column,
                                })
                                .collect(),
                            ..GraphQLError::new(error.message)
                        }
                        .code("GRAPHQL_VALIDATION_FAILED")
                    })
                    .collect(),
            );
        }
    };

    let operation = match document.operations.get(request.operation_name.as_deref()) {
        Ok(operation) => operation,
        Err(err) => {
            let error = err.to_graphql_error(&document.sources);
            return Response::from_errors(vec![
                GraphQLError::new(error.message).code("OPERATION_RESOLUTION_FAILURE")
            ]);
        }
    };
    let mode = match operation.operation_type {
        OperationType::Query => ExecutionMode::Normal,
        OperationType::Mutation => ExecutionMode::Sequential,
        OperationType::Subscription => {
            return Response::from_errors(vec![
                GraphQLError::new("subscriptions are not supported").code("UNSUPPORTED")
            ]);
        }
    };

    let state = ExecutionState {
        schema,
        document: &document,
        variables: coerce_variables(operation, &request.variables),
        request: RequestState::new(),
        errors: Mutex::new(Vec::new()),
    };
    let root_type = operation.selection_set.ty.as_str();
    let root_value = Value::Object(Map::new());
    let root_exports = ExportContext::default();

    let data = match execute_selection_set(
        &state,
        root_type,
        &[&operation.selection_set],
        &root_value,
        &root_exports,
        &[],
        mode,
    )
    .await
    {
        Ok(map) => Value::Object(map),
        Err(PropagateNull) => Value::Null,
    };

    let errors = state.errors.into_inner();
    if !errors.is_empty() {
        tracing::debug!(errors = errors.len(), "query completed with field errors");
    }
    Response {
        data: Some(data),
        errors,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecutionMode {
    /// Sibling fields resolve concurrently.
    Normal,
    /// Root mutation fields resolve one at a time, in document order.
    Sequential,
}

/// Returned when a field error must null the nearest nullable ancestor.
#[derive(Debug, Clone, Copy)]
struct PropagateNull;

/// Nulls a failed position when its type allows it.
fn try_nullify(ty: &Type, result: Result<Value, PropagateNull>) -> Result<Value, PropagateNull> {
    match result {
        Ok(value) => Ok(value),
        Err(PropagateNull) if ty.is_non_null() => Err(PropagateNull),
        Err(PropagateNull) => Ok(Value::Null),
    }
}

struct ExecutionState<'a> {
    schema: &'a ExecutableSchema,
    document: &'a Valid<ExecutableDocument>,
    variables: Map<String, Value>,
    request: RequestState,
    errors: Mutex<Vec<GraphQLError>>,
}

impl ExecutionState<'_> {
    fn schema(&self) -> &Valid<Schema> {
        self.schema.schema()
    }

    fn push_error(&self, error: GraphQLError, field: &Node<Field>) {
        let locations = field
            .line_column_range(&self.document.sources)
            .map(|range| Location {
                line: range.start.line,
                column: range.start.column,
            })
            .into_iter()
            .collect();
        self.errors.lock().push(GraphQLError { locations, ..error });
    }

    fn field_error(&self, error: &FieldError, path: &[PathElement], field: &Node<Field>) {
        self.push_error(GraphQLError::from_field_error(error, path.to_vec()), field);
    }

    /// Result coercion failure at `path`. Always yields `Err(PropagateNull)`.
    fn coercion_error<T>(
        &self,
        message: String,
        path: &[PathElement],
        field: &Node<Field>,
    ) -> Result<T, PropagateNull> {
        let mut error = GraphQLError::new(message).code("INVALID_RESULT");
        error.path = path.to_vec();
        self.push_error(error, field);
        Err(PropagateNull)
    }

    /// `@skip(if:)` / `@include(if:)`
    fn is_included(&self, directives: &ast::DirectiveList) -> bool {
        let condition = |name: &str| {
            directives
                .get(name)
                .and_then(|directive| directive.specified_argument_by_name("if"))
                .map(|value| to_json(value, &self.variables))
        };
        condition("skip") != Some(Value::Bool(true))
            && condition("include") != Some(Value::Bool(false))
    }

    fn is_subtype(&self, abstract_type: &str, object_type: &str) -> bool {
        let Some(object) = self.schema().get_object(object_type) else {
            return false;
        };
        match self.schema().types.get(abstract_type) {
            Some(ExtendedType::Interface(_)) => object
                .implements_interfaces
                .iter()
                .any(|interface| interface.name.as_str() == abstract_type),
            Some(ExtendedType::Union(union_type)) => union_type
                .members
                .iter()
                .any(|member| member.name.as_str() == object_type),
            _ => false,
        }
    }

    fn fragment_applies(&self, object_type: &str, type_condition: &str) -> bool {
        type_condition == object_type || self.is_subtype(type_condition, object_type)
    }
}

type GroupedFields<'a> = IndexMap<String, Vec<&'a Node<Field>>>;

/// <https://spec.graphql.org/October2021/#CollectFields()>
fn collect_fields<'a>(
    state: &'a ExecutionState<'a>,
    object_type: &str,
    selection_set: &'a SelectionSet,
    grouped: &mut GroupedFields<'a>,
    visited_fragments: &mut HashSet<&'a str>,
) {
    for selection in &selection_set.selections {
        match selection {
            Selection::Field(field) => {
                if state.is_included(&field.directives) {
                    grouped
                        .entry(field.response_key().to_string())
                        .or_default()
                        .push(field);
                }
            }
            Selection::FragmentSpread(spread) => {
                if !state.is_included(&spread.directives)
                    || !visited_fragments.insert(spread.fragment_name.as_str())
                {
                    continue;
                }
                let Some(fragment) = state.document.fragments.get(&spread.fragment_name) else {
                    continue;
                };
                if state.fragment_applies(object_type, fragment.type_condition().as_str()) {
                    collect_fields(
                        state,
                        object_type,
                        &fragment.selection_set,
                        grouped,
                        visited_fragments,
                    );
                }
            }
            Selection::InlineFragment(inline) => {
                if !state.is_included(&inline.directives) {
                    continue;
                }
                let applies = inline
                    .type_condition
                    .as_ref()
                    .map_or(true, |condition| {
                        state.fragment_applies(object_type, condition.as_str())
                    });
                if applies {
                    collect_fields(
                        state,
                        object_type,
                        &inline.selection_set,
                        grouped,
                        visited_fragments,
                    );
                }
            }
        }
    }
}

/// Outcomes of the `@export` fields of one object.
#[derive(Default)]
struct EvaluatedExports {
    outcomes: Vec<(String, Map<String, Value>, Result<Resolution, FieldError>)>,
}

impl EvaluatedExports {
    /// Export entries of every successful outcome, in declaration order.
    fn entries(&self) -> Vec<(String, Value)> {
        self.outcomes
            .iter()
            .filter_map(|(_, _, outcome)| outcome.as_ref().ok())
            .flat_map(|resolution| resolution.exports.iter().cloned())
            .collect()
    }

    /// The already evaluated outcome for `field` called with `arguments`.
    fn reuse(&self, field: &str, arguments: &Map<String, Value>) -> Option<&Result<Resolution, FieldError>> {
        self.outcomes
            .iter()
            .find(|(name, args, _)| name == field && args == arguments)
            .map(|(_, _, outcome)| outcome)
    }
}

async fn evaluate_exports<'a>(
    state: &'a ExecutionState<'a>,
    object_type: &'a str,
    parent: &'a Value,
    exports: &'a ExportContext,
) -> EvaluatedExports {
    let exporters = state.schema.exporters(object_type);
    if exporters.is_empty() {
        return EvaluatedExports::default();
    }
    let outcomes = join_all(exporters.iter().map(|exporter| async move {
        let ctx = FieldContext::new(
            object_type,
            &exporter.field,
            parent,
            &exporter.default_arguments,
            exports,
            &state.request,
        );
        let outcome = state
            .schema
            .chain(object_type, &exporter.field)
            .resolve(ctx)
            .await;
        if let Err(error) = &outcome {
            tracing::debug!(
                field = %format_args!("{object_type}.{}", exporter.field),
                %error,
                "export evaluation failed"
            );
        }
        (
            exporter.field.clone(),
            exporter.default_arguments.clone(),
            outcome,
        )
    }))
    .await;
    EvaluatedExports { outcomes }
}

/// <https://spec.graphql.org/October2021/#ExecuteSelectionSet()>
///
/// Returns `Err` for a field error being propagated upwards to find a
/// nullable place.
fn execute_selection_set<'a>(
    state: &'a ExecutionState<'a>,
    object_type: &'a str,
    selection_sets: &'a [&'a SelectionSet],
    parent: &'a Value,
    exports: &'a ExportContext,
    path: &'a [PathElement],
    mode: ExecutionMode,
) -> BoxFuture<'a, Result<Map<String, Value>, PropagateNull>> {
    Box::pin(async move {
        let mut grouped = GroupedFields::default();
        let mut visited_fragments = HashSet::new();
        for selection_set in selection_sets {
            collect_fields(
                state,
                object_type,
                selection_set,
                &mut grouped,
                &mut visited_fragments,
            );
        }

        // Root mutation exporters are never run speculatively.
        let evaluated = match mode {
            ExecutionMode::Normal => evaluate_exports(state, object_type, parent, exports).await,
            ExecutionMode::Sequential => EvaluatedExports::default(),
        };
        let scoped = exports.extend(evaluated.entries());

        let mut data = Map::new();
        match mode {
            ExecutionMode::Sequential => {
                for (key, fields) in &grouped {
                    let value = execute_field(
                        state,
                        object_type,
                        fields,
                        parent,
                        &scoped,
                        path,
                        &evaluated,
                    )
                    .await?;
                    data.insert(key.clone(), value);
                }
            }
            ExecutionMode::Normal => {
                let results = join_all(grouped.values().map(|fields| {
                    execute_field(
                        state,
                        object_type,
                        fields,
                        parent,
                        &scoped,
                        path,
                        &evaluated,
                    )
                }))
                .await;
                for (key, result) in grouped.keys().zip(results) {
                    data.insert(key.clone(), result?);
                }
            }
        }
        Ok(data)
    })
}

/// <https://spec.graphql.org/October2021/#ExecuteField()>
async fn execute_field<'a>(
    state: &'a ExecutionState<'a>,
    object_type: &'a str,
    fields: &'a [&'a Node<Field>],
    parent: &'a Value,
    exports: &'a ExportContext,
    path: &'a [PathElement],
    evaluated: &'a EvaluatedExports,
) -> Result<Value, PropagateNull> {
    let field = fields[0];
    let mut path = path.to_vec();
    path.push(PathElement::Key(field.response_key().to_string()));
    let ty = field.ty();

    if field.name.as_str() == "__typename" {
        return Ok(Value::String(object_type.to_string()));
    }
    if field.name.as_str().starts_with("__") {
        let error = FieldError::Unsupported {
            message: format!("introspection field {} is not supported", field.name),
        };
        state.field_error(&error, &path, field);
        return try_nullify(ty, Err(PropagateNull));
    }

    let arguments = coerce_arguments(field, &state.variables);
    let outcome = match evaluated.reuse(field.name.as_str(), &arguments) {
        Some(outcome) => outcome.clone(),
        None => {
            let ctx = FieldContext::new(
                object_type,
                field.name.as_str(),
                parent,
                &arguments,
                exports,
                &state.request,
            );
            state
                .schema
                .chain(object_type, field.name.as_str())
                .resolve(ctx)
                .await
        }
    };

    let result = match outcome {
        Ok(Resolution {
            value,
            exports: produced,
        }) => {
            let child_exports = exports.extend(produced);
            complete_value(state, ty, fields, value, &child_exports, &path).await
        }
        Err(error) => {
            state.field_error(&error, &path, field);
            Err(PropagateNull)
        }
    };
    try_nullify(ty, result)
}

/// <https://spec.graphql.org/October2021/#CompleteValue()>
///
/// Returns `Err` for a field error being propagated upwards to find a
/// nullable place.
fn complete_value<'a>(
    state: &'a ExecutionState<'a>,
    ty: &'a Type,
    fields: &'a [&'a Node<Field>],
    value: Value,
    exports: &'a ExportContext,
    path: &'a [PathElement],
) -> BoxFuture<'a, Result<Value, PropagateNull>> {
    Box::pin(async move {
        let field = fields[0];
        if value.is_null() {
            if ty.is_non_null() {
                return state.coercion_error(
                    format!("cannot return null for non-nullable field {}", field.name),
                    path,
                    field,
                );
            }
            return Ok(Value::Null);
        }

        let ty_name = match ty {
            Type::List(inner) | Type::NonNullList(inner) => {
                let items = match value {
                    Value::Array(items) => items,
                    other => {
                        return state.coercion_error(
                            format!("expected a list for {ty}, got {}", json_type_name(&other)),
                            path,
                            field,
                        );
                    }
                };
                let completed = join_all(items.into_iter().enumerate().map(|(index, item)| {
                    let mut item_path = path.to_vec();
                    item_path.push(PathElement::Index(index));
                    async move {
                        let result =
                            complete_value(state, inner, fields, item, exports, &item_path).await;
                        try_nullify(inner, result)
                    }
                }))
                .await;
                // A non-null item that failed nulls the whole list.
                return completed
                    .into_iter()
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array);
            }
            Type::Named(name) | Type::NonNullNamed(name) => name,
        };

        let Some(ty_def) = state.schema().types.get(ty_name) else {
            return state.coercion_error(format!("undefined type {ty_name}"), path, field);
        };
        let object_type = match ty_def {
            ExtendedType::Scalar(_) => {
                return match coerce_scalar(ty_name.as_str(), value) {
                    Ok(value) => Ok(value),
                    Err(message) => state.coercion_error(message, path, field),
                };
            }
            ExtendedType::Enum(enum_def) => {
                if value
                    .as_str()
                    .is_some_and(|s| enum_def.values.contains_key(s))
                {
                    return Ok(value);
                }
                return state.coercion_error(
                    format!("resolved {value}, expected enum {ty_name}"),
                    path,
                    field,
                );
            }
            ExtendedType::InputObject(_) => {
                return state.coercion_error(
                    format!("field with input object type {ty_name}"),
                    path,
                    field,
                );
            }
            ExtendedType::Object(def) => def.name.as_str(),
            ExtendedType::Interface(_) | ExtendedType::Union(_) => {
                let typename = value.get("__typename").and_then(Value::as_str);
                match typename.and_then(|name| state.schema().get_object(name)) {
                    Some(def) if state.is_subtype(ty_name.as_str(), def.name.as_str()) => {
                        def.name.as_str()
                    }
                    _ => {
                        return state.coercion_error(
                            format!(
                                "cannot resolve the concrete type of abstract type {ty_name}: \
                                 value needs a valid __typename"
                            ),
                            path,
                            field,
                        );
                    }
                }
            }
        };

        if !value.is_object() {
            return state.coercion_error(
                format!(
                    "expected an object for type {object_type}, got {}",
                    json_type_name(&value)
                ),
                path,
                field,
            );
        }
        let selection_sets: Vec<&SelectionSet> =
            fields.iter().map(|field| &field.selection_set).collect();
        execute_selection_set(
            state,
            object_type,
            &selection_sets,
            &value,
            exports,
            path,
            ExecutionMode::Normal,
        )
        .await
        .map(Value::Object)
    })
}

/// Built-in scalar result coercion. `String` and `ID` accept numbers and
/// booleans; custom scalars pass through.
fn coerce_scalar(name: &str, value: Value) -> Result<Value, String> {
    match name {
        "Int" => match value.as_i64() {
            Some(int) if i32::try_from(int).is_ok() => Ok(value),
            Some(_) => Err(format!("resolved {value} which overflows Int")),
            None => match value.as_f64() {
                Some(float) if float.fract() == 0.0 && float.abs() <= f64::from(i32::MAX) => {
                    Ok(Value::from(float as i32))
                }
                _ => Err(format!("resolved {value}, expected Int")),
            },
        },
        "Float" => match value.as_f64() {
            Some(_) => Ok(value),
            None => Err(format!("resolved {value}, expected Float")),
        },
        "String" => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(format!("resolved {other}, expected String")),
        },
        "Boolean" => match value {
            Value::Bool(_) => Ok(value),
            other => Err(format!("resolved {other}, expected Boolean")),
        },
        "ID" => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
            other => Err(format!("resolved {other}, expected ID")),
        },
        _ => Ok(value),
    }
}

/// Request variables plus operation defaults for variables not provided.
fn coerce_variables(operation: &Operation, provided: &Map<String, Value>) -> Map<String, Value> {
    let mut variables = provided.clone();
    for definition in &operation.variables {
        if variables.contains_key(definition.name.as_str()) {
            continue;
        }
        if let Some(default) = &definition.default_value {
            variables.insert(definition.name.to_string(), to_json(default, &Map::new()));
        }
    }
    variables
}

/// <https://spec.graphql.org/October2021/#CoerceArgumentValues()>, without
/// input type coercion.
fn coerce_arguments(field: &Field, variables: &Map<String, Value>) -> Map<String, Value> {
    let mut arguments = Map::new();
    for definition in &field.definition.arguments {
        let default = || {
            definition
                .default_value
                .as_deref()
                .map(|value| to_json(value, variables))
        };
        let provided = field
            .arguments
            .iter()
            .find(|argument| argument.name == definition.name);
        let value = match provided.map(|argument| &*argument.value) {
            Some(ast::Value::Variable(name)) if !variables.contains_key(name.as_str()) => {
                default()
            }
            Some(value) => Some(to_json(value, variables)),
            None => default(),
        };
        if let Some(value) = value {
            arguments.insert(definition.name.to_string(), value);
        }
    }
    arguments
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_coercion() {
        assert_eq!(coerce_scalar("Int", json!(3)), Ok(json!(3)));
        assert_eq!(coerce_scalar("Int", json!(3.0)), Ok(json!(3)));
        assert!(coerce_scalar("Int", json!(3.5)).is_err());
        assert!(coerce_scalar("Int", json!(5_000_000_000_i64)).is_err());
        assert_eq!(coerce_scalar("String", json!(12)), Ok(json!("12")));
        assert_eq!(coerce_scalar("ID", json!(7)), Ok(json!("7")));
        assert!(coerce_scalar("Boolean", json!("true")).is_err());
        assert_eq!(
            coerce_scalar("JSON", json!({ "a": [1] })),
            Ok(json!({ "a": [1] }))
        );
    }

    #[test]
    fn try_nullify_respects_nullability() {
        let nullable = Type::Named(apollo_compiler::name!("String"));
        let non_null = nullable.clone().non_null();
        assert_eq!(try_nullify(&nullable, Err(PropagateNull)).ok(), Some(Value::Null));
        assert!(try_nullify(&non_null, Err(PropagateNull)).is_err());
    }
}
