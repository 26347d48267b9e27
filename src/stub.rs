//! `@stub(value:)`: serve a literal value instead of calling a resolver.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FieldError;
use crate::pipeline::{Behavior, FieldContext, FieldResolver, Next, Resolution};
use crate::template::ValueTemplate;

/// Installs the stub value as the field's source.
///
/// String leaves of the value may carry placeholders; they are rendered when
/// the terminal resolver runs, so behaviors later in the chain still apply.
#[derive(Debug, Clone)]
pub struct StubBehavior {
    value: Arc<StubValue>,
}

impl StubBehavior {
    pub fn new(value: ValueTemplate) -> Self {
        Self {
            value: Arc::new(StubValue(value)),
        }
    }
}

#[derive(Debug)]
struct StubValue(ValueTemplate);

#[async_trait]
impl FieldResolver for StubValue {
    async fn resolve(&self, ctx: &FieldContext<'_>) -> Result<Value, FieldError> {
        self.0.render(&ctx.scope())
    }
}

#[async_trait]
impl Behavior for StubBehavior {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn run<'a>(
        &'a self,
        ctx: FieldContext<'a>,
        next: Next<'a>,
    ) -> Result<Resolution, FieldError> {
        next.run(ctx.with_source(self.value.clone())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exports::ExportContext;
    use crate::pipeline::{FieldChain, PropertyResolver, RequestState};
    use serde_json::{json, Map};

    #[tokio::test]
    async fn stub_ignores_parent_value() {
        let chain = FieldChain::new(
            vec![Arc::new(StubBehavior::new(
                ValueTemplate::parse(&json!({ "bar": "BAR" })).unwrap(),
            ))],
            Arc::new(PropertyResolver),
        );
        let parent = json!({ "foo": { "bar": "real" } });
        let args = Map::new();
        let exports = ExportContext::default();
        let request = RequestState::new();
        let ctx = FieldContext::new("Query", "foo", &parent, &args, &exports, &request);

        let resolution = chain.resolve(ctx).await.unwrap();
        assert_eq!(resolution.value, json!({ "bar": "BAR" }));
    }

    #[tokio::test]
    async fn stub_reads_exports() {
        let chain = FieldChain::new(
            vec![Arc::new(StubBehavior::new(
                ValueTemplate::parse(&json!("{exports.organizationName}")).unwrap(),
            ))],
            Arc::new(PropertyResolver),
        );
        let parent = Value::Null;
        let args = Map::new();
        let request = RequestState::new();

        let exports = ExportContext::default()
            .extend([("organizationName".to_string(), json!("GoodCorp"))]);
        let ctx = FieldContext::new(
            "Employee",
            "organizationName",
            &parent,
            &args,
            &exports,
            &request,
        );
        assert_eq!(chain.resolve(ctx).await.unwrap().value, json!("GoodCorp"));

        let empty = ExportContext::default();
        let ctx = FieldContext::new(
            "Employee",
            "organizationName",
            &parent,
            &args,
            &empty,
            &request,
        );
        assert!(matches!(
            chain.resolve(ctx).await,
            Err(FieldError::MissingExport { .. })
        ));
    }
}
