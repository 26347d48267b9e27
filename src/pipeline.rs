//! Field resolution pipeline.
//!
//! Each schema field gets a [`FieldChain`]: an ordered list of directive
//! [`Behavior`]s wrapped around a terminal resolver. A behavior receives the
//! [`FieldContext`] and a [`Next`] handle; it may inspect or adjust the
//! context, call `next` at most once (`Next` is consumed by value), and
//! post-process the result.
//!
//! Behaviors that provide data (`@stub`, `@rest`) do not short-circuit:
//! they install a *source* on the context and continue the chain. The
//! terminal resolver calls the installed source, falling back to the
//! field's default resolver. This keeps policies and transforms placed
//! after a data directive in effect.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use crate::error::FieldError;
use crate::exports::ExportContext;
use crate::template::Scope;

/// State shared by every field of one request.
#[derive(Debug, Default)]
pub struct RequestState {
    memo: Mutex<HashMap<String, Arc<OnceCell<Result<Value, FieldError>>>>>,
}

impl RequestState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fetch` once per `key` for the lifetime of the request. Concurrent
    /// callers with the same key wait for the first one and share its result.
    ///
    /// # Errors
    ///
    /// Returns the (cached) error of the first `fetch`.
    pub async fn memoize<F, Fut>(&self, key: String, fetch: F) -> Result<Value, FieldError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, FieldError>>,
    {
        let cell = self.memo.lock().entry(key).or_default().clone();
        cell.get_or_init(fetch).await.clone()
    }
}

/// Everything a behavior or resolver can see about the field being resolved.
#[derive(Clone)]
pub struct FieldContext<'a> {
    pub type_name: &'a str,
    pub field_name: &'a str,
    /// Backing value of the parent object (`null` at the root).
    pub parent: &'a Value,
    /// Coerced field arguments, defaults applied.
    pub arguments: &'a Map<String, Value>,
    pub exports: &'a ExportContext,
    pub request: &'a RequestState,
    source: Option<Arc<dyn FieldResolver>>,
}

impl<'a> FieldContext<'a> {
    pub fn new(
        type_name: &'a str,
        field_name: &'a str,
        parent: &'a Value,
        arguments: &'a Map<String, Value>,
        exports: &'a ExportContext,
        request: &'a RequestState,
    ) -> Self {
        Self {
            type_name,
            field_name,
            parent,
            arguments,
            exports,
            request,
            source: None,
        }
    }

    /// Replace the resolver the terminal step will call.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn FieldResolver>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Placeholder scope for template interpolation.
    pub fn scope(&self) -> Scope<'a> {
        Scope {
            args: self.arguments,
            exports: self.exports,
            parent: self.parent,
        }
    }

    /// `Type.field`
    pub fn coordinate(&self) -> String {
        format!("{}.{}", self.type_name, self.field_name)
    }
}

impl fmt::Debug for FieldContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldContext")
            .field("type_name", &self.type_name)
            .field("field_name", &self.field_name)
            .field("arguments", &self.arguments)
            .field("exports", &self.exports)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

/// Produces the raw value of a field.
#[async_trait]
pub trait FieldResolver: Send + Sync {
    async fn resolve(&self, ctx: &FieldContext<'_>) -> Result<Value, FieldError>;
}

/// Wrap a synchronous closure as a [`FieldResolver`].
///
/// ```
/// use serde_json::json;
/// use stitch_gateway::resolver_fn;
///
/// let hello = resolver_fn(|_ctx| Ok(json!("world")));
/// # let _ = hello;
/// ```
pub fn resolver_fn<F>(f: F) -> Arc<dyn FieldResolver>
where
    F: Fn(&FieldContext<'_>) -> Result<Value, FieldError> + Send + Sync + 'static,
{
    Arc::new(FnResolver(f))
}

struct FnResolver<F>(F);

#[async_trait]
impl<F> FieldResolver for FnResolver<F>
where
    F: Fn(&FieldContext<'_>) -> Result<Value, FieldError> + Send + Sync + 'static,
{
    async fn resolve(&self, ctx: &FieldContext<'_>) -> Result<Value, FieldError> {
        (self.0)(ctx)
    }
}

/// Default resolver: reads the property named like the field from the
/// parent value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyResolver;

#[async_trait]
impl FieldResolver for PropertyResolver {
    async fn resolve(&self, ctx: &FieldContext<'_>) -> Result<Value, FieldError> {
        Ok(ctx.parent.get(ctx.field_name).cloned().unwrap_or(Value::Null))
    }
}

/// Outcome of a field chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub value: Value,
    /// Export entries produced while resolving this field, in order.
    pub exports: Vec<(String, Value)>,
}

impl Resolution {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            exports: Vec::new(),
        }
    }
}

/// A directive's runtime behavior.
#[async_trait]
pub trait Behavior: Send + Sync + fmt::Debug {
    /// Directive name, without `@`.
    fn name(&self) -> &'static str;

    async fn run<'a>(
        &'a self,
        ctx: FieldContext<'a>,
        next: Next<'a>,
    ) -> Result<Resolution, FieldError>;
}

/// The remainder of a chain. Running it consumes the handle.
pub struct Next<'a> {
    inner: &'a dyn Resolve,
}

impl<'a> Next<'a> {
    pub async fn run(self, ctx: FieldContext<'a>) -> Result<Resolution, FieldError> {
        self.inner.resolve(ctx).await
    }
}

#[async_trait]
trait Resolve: Send + Sync {
    async fn resolve<'a>(&'a self, ctx: FieldContext<'a>) -> Result<Resolution, FieldError>;
}

struct Layer {
    behavior: Arc<dyn Behavior>,
    inner: Box<dyn Resolve>,
}

#[async_trait]
impl Resolve for Layer {
    async fn resolve<'a>(&'a self, ctx: FieldContext<'a>) -> Result<Resolution, FieldError> {
        let next = Next {
            inner: self.inner.as_ref(),
        };
        self.behavior.run(ctx, next).await
    }
}

struct Terminal {
    default: Arc<dyn FieldResolver>,
}

#[async_trait]
impl Resolve for Terminal {
    async fn resolve<'a>(&'a self, ctx: FieldContext<'a>) -> Result<Resolution, FieldError> {
        let source = ctx.source.clone().unwrap_or_else(|| self.default.clone());
        let value = source.resolve(&ctx).await?;
        Ok(Resolution::new(value))
    }
}

/// A composed, immutable chain of behaviors for one field.
pub struct FieldChain {
    names: Vec<&'static str>,
    root: Box<dyn Resolve>,
}

impl FieldChain {
    /// Compose `behaviors` (outermost first) around `resolver`.
    pub fn new(behaviors: Vec<Arc<dyn Behavior>>, resolver: Arc<dyn FieldResolver>) -> Self {
        let names = behaviors.iter().map(|b| b.name()).collect();
        let terminal: Box<dyn Resolve> = Box::new(Terminal { default: resolver });
        let root = behaviors
            .into_iter()
            .rev()
            .fold(terminal, |inner, behavior| {
                Box::new(Layer { behavior, inner }) as Box<dyn Resolve>
            });
        Self { names, root }
    }

    /// A chain with no behaviors around the default property resolver.
    pub fn plain() -> Self {
        Self::new(Vec::new(), Arc::new(PropertyResolver))
    }

    /// Behavior names in execution order.
    pub fn behavior_names(&self) -> &[&'static str] {
        &self.names
    }

    pub async fn resolve<'a>(&'a self, ctx: FieldContext<'a>) -> Result<Resolution, FieldError> {
        self.root.resolve(ctx).await
    }
}

impl fmt::Debug for FieldChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldChain")
            .field("behaviors", &self.names)
            .finish()
    }
}
