//! The serving entry point: holds the live schema and swaps it atomically.
//!
//! Queries capture the schema that was current when they started, so a bundle
//! applied mid-flight never changes the behavior of an in-progress request.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;

use crate::assembler::{Assembler, ExecutableSchema, ResolverMap};
use crate::error::AssemblyError;
use crate::executor::execute;
use crate::loader::BundleSource;
use crate::policy::PolicyEvaluator;
use crate::registry::DirectiveRegistry;
use crate::response::{GraphQLError, Request, Response};
use crate::rest::RestClient;
use crate::types::{GatewayOptions, SchemaBundle};

pub struct Gateway {
    registry: DirectiveRegistry,
    resolvers: ResolverMap,
    options: GatewayOptions,
    current: ArcSwapOption<ExecutableSchema>,
    last_error: ArcSwapOption<String>,
    // Serializes assembly so two bundles never race to be stored.
    apply_lock: Mutex<()>,
}

impl Gateway {
    /// Create a gateway with the standard directive registry.
    pub fn new(policy: Arc<dyn PolicyEvaluator>, options: GatewayOptions) -> Self {
        let registry =
            DirectiveRegistry::new(policy).with_rest_client(RestClient::new(options.rest_timeout));
        Self::with_registry(registry, options)
    }

    pub fn with_registry(registry: DirectiveRegistry, options: GatewayOptions) -> Self {
        Self {
            registry,
            resolvers: ResolverMap::new(),
            options,
            current: ArcSwapOption::empty(),
            last_error: ArcSwapOption::empty(),
            apply_lock: Mutex::new(()),
        }
    }

    /// Native resolvers used by every subsequent assembly.
    pub fn with_resolvers(mut self, resolvers: ResolverMap) -> Self {
        self.resolvers = resolvers;
        self
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    /// The schema new queries will run against.
    pub fn current(&self) -> Option<Arc<ExecutableSchema>> {
        self.current.load_full()
    }

    /// Etag of the live schema.
    pub fn etag(&self) -> Option<String> {
        self.current().map(|schema| schema.etag().to_string())
    }

    /// Message of the most recent failed assembly, cleared by the next
    /// successful one.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.load_full().map(|message| message.as_ref().clone())
    }

    /// Assemble `bundle` and make it the live schema.
    ///
    /// Returns `Ok(false)` without assembling when the bundle's etag is
    /// already live.
    ///
    /// # Errors
    ///
    /// Returns the [`AssemblyError`] when the bundle does not assemble. The
    /// previous schema keeps serving.
    #[tracing::instrument(skip_all, fields(etag = %bundle.etag))]
    pub fn apply_bundle(&self, bundle: &SchemaBundle) -> Result<bool, AssemblyError> {
        let _guard = self.apply_lock.lock();

        if let Some(live) = self.current.load_full() {
            if !bundle.etag.is_empty() && live.etag() == bundle.etag {
                tracing::debug!("bundle already live");
                return Ok(false);
            }
        }

        let assembled = Assembler::new(&self.registry)
            .with_resolvers(self.resolvers.clone())
            .assemble(bundle);

        match assembled {
            Ok(schema) => {
                self.current.store(Some(Arc::new(schema)));
                self.last_error.store(None);
                tracing::info!("schema updated");
                Ok(true)
            }
            Err(err) => {
                tracing::error!(error = %err, "schema assembly failed, keeping the current schema");
                self.last_error.store(Some(Arc::new(err.to_string())));
                Err(err)
            }
        }
    }

    /// Apply every bundle pushed on `bundles` until the stream ends.
    pub async fn sync<S>(&self, bundles: S)
    where
        S: Stream<Item = SchemaBundle>,
    {
        futures::pin_mut!(bundles);
        while let Some(bundle) = bundles.next().await {
            // Failures are logged and recorded by apply_bundle.
            let _ = self.apply_bundle(&bundle);
        }
    }

    /// Fetch from `source` every `interval`, forever.
    ///
    /// The first fetch happens immediately. Fetch failures are logged and
    /// retried on the next tick.
    pub async fn poll(&self, source: &dyn BundleSource, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match source.fetch().await {
                Ok(bundle) => {
                    let _ = self.apply_bundle(&bundle);
                }
                Err(err) => {
                    tracing::warn!(
                        source = %source.describe(),
                        error = %err,
                        "could not fetch schema bundle"
                    );
                }
            }
        }
    }

    /// Run a query against the live schema.
    pub async fn execute(&self, request: &Request) -> Response {
        let Some(schema) = self.current() else {
            return Response::from_errors(vec![GraphQLError::new(
                "no schema has been assembled yet",
            )
            .code("SCHEMA_UNAVAILABLE")]);
        };

        let Some(limit) = self.options.request_timeout else {
            return execute(&schema, request).await;
        };

        match tokio::time::timeout(limit, execute(&schema, request)).await {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(timeout_ms = limit.as_millis() as u64, "request timed out");
                Response::from_errors(vec![GraphQLError::new(format!(
                    "request timed out after {}ms",
                    limit.as_millis()
                ))
                .code("REQUEST_TIMEOUT")])
            }
        }
    }
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("etag", &self.etag())
            .field("options", &self.options)
            .field("resolvers", &self.resolvers)
            .finish_non_exhaustive()
    }
}
