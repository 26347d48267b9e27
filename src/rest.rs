//! `@rest(url:, method:, headers:, bodyArg:)`: delegate a field to an HTTP
//! JSON endpoint.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::FieldError;
use crate::pipeline::{Behavior, FieldContext, FieldResolver, Next, Resolution};
use crate::template::Template;
use crate::types::{Upstream, DEFAULT_REST_TIMEOUT};

/// HTTP methods accepted by `@rest(method:)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl RestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestMethod::Get => "GET",
            RestMethod::Post => "POST",
            RestMethod::Put => "PUT",
            RestMethod::Patch => "PATCH",
            RestMethod::Delete => "DELETE",
        }
    }

    fn as_reqwest(&self) -> reqwest::Method {
        match self {
            RestMethod::Get => reqwest::Method::GET,
            RestMethod::Post => reqwest::Method::POST,
            RestMethod::Put => reqwest::Method::PUT,
            RestMethod::Patch => reqwest::Method::PATCH,
            RestMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl FromStr for RestMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(RestMethod::Get),
            "POST" => Ok(RestMethod::Post),
            "PUT" => Ok(RestMethod::Put),
            "PATCH" => Ok(RestMethod::Patch),
            "DELETE" => Ok(RestMethod::Delete),
            _ => Err(format!(
                "unsupported method '{s}', expected one of GET, POST, PUT, PATCH, DELETE"
            )),
        }
    }
}

impl fmt::Display for RestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared HTTP client for REST delegates.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for RestClient {
    fn default() -> Self {
        Self::new(DEFAULT_REST_TIMEOUT)
    }
}

impl RestClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(
        &self,
        method: RestMethod,
        url: Url,
        headers: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Result<Value, FieldError> {
        let target = url.to_string();
        let upstream_error = |status: Option<u16>, message: String| FieldError::Upstream {
            url: target.clone(),
            status,
            message,
        };

        let mut request = self
            .client
            .request(method.as_reqwest(), url)
            .timeout(self.timeout);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        tracing::debug!(method = %method, url = %target, "calling REST upstream");
        let response = request
            .send()
            .await
            .map_err(|err| upstream_error(None, err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(upstream_error(
                Some(status.as_u16()),
                format!("upstream returned {status}"),
            ));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| upstream_error(Some(status.as_u16()), err.to_string()))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|err| {
            upstream_error(
                Some(status.as_u16()),
                format!("invalid JSON response: {err}"),
            )
        })
    }
}

/// A parsed `@rest` annotation.
#[derive(Debug)]
pub struct RestCall {
    pub url: Template,
    pub method: RestMethod,
    pub headers: Vec<(String, Template)>,
    pub body_arg: Option<String>,
}

/// Installs an HTTP call as the field's source.
#[derive(Debug, Clone)]
pub struct RestBehavior {
    source: Arc<RestSource>,
}

impl RestBehavior {
    /// `upstreams` are the bundle's upstream descriptors; those whose host
    /// matches the call's URL contribute headers.
    pub fn new(call: RestCall, upstreams: Arc<Vec<Upstream>>, client: RestClient) -> Self {
        Self {
            source: Arc::new(RestSource {
                call,
                upstreams,
                client,
            }),
        }
    }
}

#[derive(Debug)]
struct RestSource {
    call: RestCall,
    upstreams: Arc<Vec<Upstream>>,
    client: RestClient,
}

impl RestSource {
    fn upstream_headers(&self, url: &Url) -> Vec<(String, String)> {
        let Some(host) = url.host_str() else {
            return Vec::new();
        };
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        self.upstreams
            .iter()
            .filter(|upstream| upstream.host == host || upstream.host == authority)
            .flat_map(|upstream| upstream.headers.iter())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

#[async_trait]
impl FieldResolver for RestSource {
    async fn resolve(&self, ctx: &FieldContext<'_>) -> Result<Value, FieldError> {
        let scope = ctx.scope();
        let target = self.call.url.interpolate_uri(&scope)?;
        let url = Url::parse(&target).map_err(|err| FieldError::Upstream {
            url: target.clone(),
            status: None,
            message: format!("invalid URL: {err}"),
        })?;

        let mut headers = self.upstream_headers(&url);
        for (name, template) in &self.call.headers {
            headers.push((name.clone(), template.interpolate(&scope)?));
        }
        let body = self
            .call
            .body_arg
            .as_ref()
            .map(|arg| ctx.arguments.get(arg).cloned().unwrap_or(Value::Null));

        let method = self.call.method;
        if method == RestMethod::Get {
            let key = format!("GET {url} {headers:?}");
            ctx.request
                .memoize(key, || self.client.send(method, url, headers, body))
                .await
        } else {
            self.client.send(method, url, headers, body).await
        }
    }
}

#[async_trait]
impl Behavior for RestBehavior {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn run<'a>(
        &'a self,
        ctx: FieldContext<'a>,
        next: Next<'a>,
    ) -> Result<Resolution, FieldError> {
        next.run(ctx.with_source(self.source.clone())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exports::ExportContext;
    use crate::pipeline::{FieldChain, PropertyResolver, RequestState};
    use serde_json::{json, Map};

    fn chain(call: RestCall, upstreams: Vec<Upstream>) -> FieldChain {
        FieldChain::new(
            vec![Arc::new(RestBehavior::new(
                call,
                Arc::new(upstreams),
                RestClient::default(),
            ))],
            Arc::new(PropertyResolver),
        )
    }

    fn get(url: &str) -> RestCall {
        RestCall {
            url: url.parse().unwrap(),
            method: RestMethod::Get,
            headers: Vec::new(),
            body_arg: None,
        }
    }

    #[test]
    fn method_parsing() {
        assert_eq!("post".parse::<RestMethod>().unwrap(), RestMethod::Post);
        assert!("TRACE".parse::<RestMethod>().is_err());
    }

    #[tokio::test]
    async fn get_interpolates_url_and_adds_upstream_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/teams/a%20b")
            .match_header("x-api-key", "secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "a b", "name": "Platform"}"#)
            .create();

        let host = server.host_with_port();
        let chain = chain(
            get(&format!("{}/teams/{{args.id}}", server.url())),
            vec![Upstream::new(host).header("x-api-key", "secret")],
        );

        let parent = Value::Null;
        let args = json!({ "id": "a b" }).as_object().cloned().unwrap();
        let exports = ExportContext::default();
        let request = RequestState::new();
        let ctx = FieldContext::new("Query", "team", &parent, &args, &exports, &request);

        let resolution = chain.resolve(ctx).await.unwrap();
        mock.assert();
        assert_eq!(resolution.value["name"], "Platform");
    }

    #[tokio::test]
    async fn identical_gets_are_memoized_per_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/organizations")
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create();

        let chain = chain(get(&format!("{}/organizations", server.url())), Vec::new());
        let parent = Value::Null;
        let args = Map::new();
        let exports = ExportContext::default();
        let request = RequestState::new();

        for _ in 0..2 {
            let ctx = FieldContext::new("Query", "orgs", &parent, &args, &exports, &request);
            assert_eq!(chain.resolve(ctx).await.unwrap().value, json!([]));
        }
        mock.assert();
    }

    #[tokio::test]
    async fn post_sends_body_argument() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/employees")
            .match_body(mockito::Matcher::Json(json!({ "name": "Ada" })))
            .match_header("x-org", "EvilCorp")
            .with_status(201)
            .with_body(r#"{"id": 1}"#)
            .create();

        let call = RestCall {
            url: format!("{}/employees", server.url()).parse().unwrap(),
            method: RestMethod::Post,
            headers: vec![("x-org".to_string(), "{exports.org}".parse().unwrap())],
            body_arg: Some("input".to_string()),
        };
        let chain = chain(call, Vec::new());
        let parent = Value::Null;
        let args = json!({ "input": { "name": "Ada" } })
            .as_object()
            .cloned()
            .unwrap();
        let exports = ExportContext::default().extend([("org".to_string(), json!("EvilCorp"))]);
        let request = RequestState::new();
        let ctx = FieldContext::new(
            "Mutation",
            "addEmployee",
            &parent,
            &args,
            &exports,
            &request,
        );

        assert_eq!(chain.resolve(ctx).await.unwrap().value, json!({ "id": 1 }));
        mock.assert();
    }

    #[tokio::test]
    async fn non_success_status_is_an_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/broken").with_status(503).create();

        let chain = chain(get(&format!("{}/broken", server.url())), Vec::new());
        let parent = Value::Null;
        let args = Map::new();
        let exports = ExportContext::default();
        let request = RequestState::new();
        let ctx = FieldContext::new("Query", "broken", &parent, &args, &exports, &request);

        match chain.resolve(ctx).await {
            Err(FieldError::Upstream { status, .. }) => assert_eq!(status, Some(503)),
            other => panic!("expected upstream error, got {other:?}"),
        }
    }
}
