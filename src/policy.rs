//! `@policy(namespace:, name:, args:)`: authorization gates.
//!
//! The gateway does not evaluate policies itself. A [`PolicyEvaluator`]
//! supplied by the host decides; [`StaticPolicyEvaluator`] is a table-driven
//! implementation for tests and the CLI.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::FieldError;
use crate::pipeline::{Behavior, FieldContext, Next, Resolution};
use crate::template::ValueTemplate;
use crate::types::json_type_name;

/// Input handed to a policy evaluator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRequest {
    pub namespace: String,
    pub name: String,
    /// Rendered `args` of the directive, `null` when absent.
    pub args: Value,
    pub type_name: String,
    pub field_name: String,
    /// The field's own arguments.
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny { reason: String },
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PolicyEvaluatorError {
    pub message: String,
}

impl PolicyEvaluatorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Decides whether a policy allows access.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        request: &PolicyRequest,
    ) -> Result<PolicyDecision, PolicyEvaluatorError>;
}

/// Fixed allow/deny table keyed by `(namespace, name)`.
///
/// Unknown policies are reported as evaluator errors, which the gateway
/// treats as a denial.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicyEvaluator {
    decisions: HashMap<(String, String), bool>,
}

impl StaticPolicyEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(self, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        self.with(namespace, name, true)
    }

    pub fn deny(self, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        self.with(namespace, name, false)
    }

    fn with(mut self, namespace: impl Into<String>, name: impl Into<String>, allow: bool) -> Self {
        self.decisions.insert((namespace.into(), name.into()), allow);
        self
    }

    /// Build from `{"namespace": {"policyName": true, ...}, ...}`.
    ///
    /// # Errors
    ///
    /// Returns an error when the value is not an object of objects of
    /// booleans.
    pub fn from_json(value: &Value) -> Result<Self, PolicyEvaluatorError> {
        let namespaces = value.as_object().ok_or_else(|| {
            PolicyEvaluatorError::new(format!(
                "policy table must be an object, got {}",
                json_type_name(value)
            ))
        })?;
        let mut evaluator = Self::new();
        for (namespace, policies) in namespaces {
            let policies = policies.as_object().ok_or_else(|| {
                PolicyEvaluatorError::new(format!(
                    "policies of namespace '{namespace}' must be an object"
                ))
            })?;
            for (name, decision) in policies {
                let allow = decision.as_bool().ok_or_else(|| {
                    PolicyEvaluatorError::new(format!(
                        "decision for {namespace}/{name} must be a boolean"
                    ))
                })?;
                evaluator = evaluator.with(namespace.as_str(), name.as_str(), allow);
            }
        }
        Ok(evaluator)
    }
}

#[async_trait]
impl PolicyEvaluator for StaticPolicyEvaluator {
    async fn evaluate(
        &self,
        request: &PolicyRequest,
    ) -> Result<PolicyDecision, PolicyEvaluatorError> {
        match self
            .decisions
            .get(&(request.namespace.clone(), request.name.clone()))
        {
            Some(true) => Ok(PolicyDecision::Allow),
            Some(false) => Ok(PolicyDecision::Deny {
                reason: format!("{}/{} denies access", request.namespace, request.name),
            }),
            None => Err(PolicyEvaluatorError::new(format!(
                "unknown policy {}/{}",
                request.namespace, request.name
            ))),
        }
    }
}

/// Gates the rest of the chain on a policy decision.
pub struct PolicyBehavior {
    namespace: String,
    name: String,
    args: Option<ValueTemplate>,
    evaluator: Arc<dyn PolicyEvaluator>,
}

impl PolicyBehavior {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        args: Option<ValueTemplate>,
        evaluator: Arc<dyn PolicyEvaluator>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            args,
            evaluator,
        }
    }

    fn unavailable(&self, message: impl Into<String>) -> FieldError {
        FieldError::EvaluatorUnavailable {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            message: message.into(),
        }
    }
}

impl fmt::Debug for PolicyBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyBehavior")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Behavior for PolicyBehavior {
    fn name(&self) -> &'static str {
        "policy"
    }

    async fn run<'a>(
        &'a self,
        ctx: FieldContext<'a>,
        next: Next<'a>,
    ) -> Result<Resolution, FieldError> {
        let args = match &self.args {
            Some(template) => template.render(&ctx.scope()).map_err(|err| match err {
                FieldError::MissingExport { .. } => err,
                other => self.unavailable(format!("cannot render policy args: {other}")),
            })?,
            None => Value::Null,
        };
        let request = PolicyRequest {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            args,
            type_name: ctx.type_name.to_string(),
            field_name: ctx.field_name.to_string(),
            arguments: ctx.arguments.clone(),
        };

        match self.evaluator.evaluate(&request).await {
            Ok(PolicyDecision::Allow) => next.run(ctx).await,
            Ok(PolicyDecision::Deny { reason }) => {
                tracing::debug!(
                    policy = %format_args!("{}/{}", self.namespace, self.name),
                    field = %ctx.coordinate(),
                    "policy denied access"
                );
                Err(FieldError::PolicyDenied {
                    namespace: self.namespace.clone(),
                    name: self.name.clone(),
                    reason,
                })
            }
            Err(err) => {
                tracing::warn!(
                    policy = %format_args!("{}/{}", self.namespace, self.name),
                    field = %ctx.coordinate(),
                    error = %err,
                    "policy evaluation failed"
                );
                Err(self.unavailable(err.message))
            }
        }
    }
}
