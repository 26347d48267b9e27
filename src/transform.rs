//! Value transforms: `@lowerCase` and `@upperCase`.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FieldError;
use crate::pipeline::{Behavior, FieldContext, Next, Resolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTransform {
    Lower,
    Upper,
}

impl CaseTransform {
    /// Apply to every string in `value`, recursing into lists and objects.
    /// Object keys are left alone.
    pub fn apply(&self, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(match self {
                CaseTransform::Lower => s.to_lowercase(),
                CaseTransform::Upper => s.to_uppercase(),
            }),
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.apply(v)).collect()),
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, self.apply(value)))
                    .collect(),
            ),
            other => other,
        }
    }
}

#[async_trait]
impl Behavior for CaseTransform {
    fn name(&self) -> &'static str {
        match self {
            CaseTransform::Lower => "lowerCase",
            CaseTransform::Upper => "upperCase",
        }
    }

    async fn run<'a>(
        &'a self,
        ctx: FieldContext<'a>,
        next: Next<'a>,
    ) -> Result<Resolution, FieldError> {
        let mut resolution = next.run(ctx).await?;
        resolution.value = self.apply(std::mem::take(&mut resolution.value));
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lower_case_recurses() {
        assert_eq!(
            CaseTransform::Lower.apply(json!({ "Bar": "BAR", "n": 1, "list": ["A", null] })),
            json!({ "Bar": "bar", "n": 1, "list": ["a", null] })
        );
    }

    #[test]
    fn upper_case_string() {
        assert_eq!(CaseTransform::Upper.apply(json!("foo")), json!("FOO"));
    }
}
