//! Export context and the `@export` behavior.
//!
//! Every resolution path carries an immutable [`ExportContext`]. Extending a
//! context produces a new one; the parent's context is never modified, so
//! sibling branches cannot observe each other's exports.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::FieldError;
use crate::pipeline::{Behavior, FieldContext, Next, Resolution};

/// Key/value mapping visible to a field and its descendants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportContext {
    values: Arc<Map<String, Value>>,
}

impl ExportContext {
    /// Returns a new context with `entries` added. A key already present is
    /// replaced by the newer value.
    #[must_use]
    pub fn extend<I>(&self, entries: I) -> ExportContext
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut entries = entries.into_iter().peekable();
        if entries.peek().is_none() {
            return self.clone();
        }
        let mut values = (*self.values).clone();
        for (key, value) in entries {
            values.insert(key, value);
        }
        ExportContext {
            values: Arc::new(values),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// `@export(key:)`: publishes the field's resolved value under `key`.
///
/// A failed resolution publishes nothing.
#[derive(Debug, Clone)]
pub struct ExportBehavior {
    key: String,
}

impl ExportBehavior {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl Behavior for ExportBehavior {
    fn name(&self) -> &'static str {
        "export"
    }

    async fn run<'a>(
        &'a self,
        ctx: FieldContext<'a>,
        next: Next<'a>,
    ) -> Result<Resolution, FieldError> {
        let mut resolution = next.run(ctx).await?;
        resolution
            .exports
            .push((self.key.clone(), resolution.value.clone()));
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extend_does_not_modify_parent() {
        let parent = ExportContext::default().extend([("a".to_string(), json!(1))]);
        let child = parent.extend([("b".to_string(), json!(2))]);

        assert_eq!(parent.get("b"), None);
        assert_eq!(child.get("a"), Some(&json!(1)));
        assert_eq!(child.get("b"), Some(&json!(2)));
    }

    #[test]
    fn later_value_wins() {
        let ctx = ExportContext::default()
            .extend([("org".to_string(), json!("EvilCorp"))])
            .extend([("org".to_string(), json!("GoodCorp"))]);
        assert_eq!(ctx.get("org"), Some(&json!("GoodCorp")));
        assert_eq!(ctx.keys().collect::<Vec<_>>(), vec!["org"]);
    }

    #[test]
    fn empty_extend_shares_storage() {
        let ctx = ExportContext::default().extend([("a".to_string(), json!(1))]);
        let same = ctx.extend(Vec::new());
        assert!(Arc::ptr_eq(&ctx.values, &same.values));
    }
}
