//! Minimal host client the middleware attaches to.
//!
//! The client turns an endpoint template plus [`Params`] into a concrete
//! request, offers it to every attached middleware in attachment order, and
//! hands whatever is left to its [`Transport`].

use crate::context::{param_to_string, Params};
use crate::error::{BoxError, Error, Result};
use crate::method::HttpMethod;
use crate::middleware::{Middleware, MiddlewareRequest, RequestOutcome};
use crate::response::{Request, Response, APPLICATION_JSON};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Everything outside the RFC 3986 unreserved set gets percent-encoded.
const COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Sends requests over the real network (or whatever stands in for it).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response, BoxError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: Request) -> Result<Response, BoxError> {
        (**self).send(request).await
    }
}

pub struct Client<T> {
    base_url: String,
    transport: T,
    middlewares: Vec<Arc<dyn Middleware>>,
}

fn same_middleware<M: Middleware + ?Sized>(a: &Arc<dyn Middleware>, b: &Arc<M>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl<T: Transport> Client<T> {
    pub fn new(base_url: impl Into<String>, transport: T) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            transport,
            middlewares: Vec::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Attach a middleware. Returns `false` if it was already attached.
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: Arc<M>) -> bool {
        if self.is_attached(&middleware) {
            return false;
        }
        debug!(middleware = middleware.name(), "Attaching middleware");
        self.middlewares.push(middleware);
        true
    }

    /// Detach a middleware. Returns `false` if it was not attached.
    pub fn eject<M: Middleware + ?Sized>(&mut self, middleware: &Arc<M>) -> bool {
        let before = self.middlewares.len();
        self.middlewares.retain(|m| !same_middleware(m, middleware));
        let removed = self.middlewares.len() != before;
        if removed {
            debug!(middleware = middleware.name(), "Ejected middleware");
        }
        removed
    }

    pub fn is_attached<M: Middleware + ?Sized>(&self, middleware: &Arc<M>) -> bool {
        self.middlewares.iter().any(|m| same_middleware(m, middleware))
    }

    /// Send a request for an endpoint template.
    ///
    /// Path parameters fill the `{name}` placeholders of `schema_path`, query
    /// parameters become the query string, header parameters become headers.
    /// A `body`, when given, is sent as JSON.
    pub async fn request<B>(
        &self,
        method: HttpMethod,
        schema_path: &str,
        params: Params,
        body: Option<&B>,
    ) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let request = self.build_request(method, schema_path, &params, body)?;
        let mut pending = MiddlewareRequest {
            request,
            schema_path: schema_path.to_string(),
            params,
        };

        for middleware in &self.middlewares {
            match middleware.on_request(pending).await? {
                RequestOutcome::Continue(next) => pending = next,
                RequestOutcome::Respond(response) => return Ok(response),
            }
        }

        debug!(method = %method, schema_path, uri = %pending.request.uri(), "Sending request");
        self.transport
            .send(pending.request)
            .await
            .map_err(Error::Transport)
    }

    pub async fn get(&self, schema_path: &str, params: Params) -> Result<Response> {
        self.request::<()>(HttpMethod::Get, schema_path, params, None).await
    }

    pub async fn delete(&self, schema_path: &str, params: Params) -> Result<Response> {
        self.request::<()>(HttpMethod::Delete, schema_path, params, None).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        schema_path: &str,
        params: Params,
        body: &B,
    ) -> Result<Response> {
        self.request(HttpMethod::Post, schema_path, params, Some(body)).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        schema_path: &str,
        params: Params,
        body: &B,
    ) -> Result<Response> {
        self.request(HttpMethod::Put, schema_path, params, Some(body)).await
    }

    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        schema_path: &str,
        params: Params,
        body: &B,
    ) -> Result<Response> {
        self.request(HttpMethod::Patch, schema_path, params, Some(body)).await
    }

    fn build_request<B>(
        &self,
        method: HttpMethod,
        schema_path: &str,
        params: &Params,
        body: Option<&B>,
    ) -> Result<Request>
    where
        B: Serialize + ?Sized,
    {
        let mut uri = format!("{}{}", self.base_url, resolve_path(schema_path, params)?);
        let query = encode_query(params);
        if !query.is_empty() {
            uri.push('?');
            uri.push_str(&query);
        }

        let mut builder = http::Request::builder().method(method.to_http()).uri(uri);
        for (name, value) in &params.header {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(http::Error::from)?;
            let value = HeaderValue::from_str(&param_to_string(value)).map_err(http::Error::from)?;
            builder = builder.header(name, value);
        }

        let body = match body {
            Some(body) => {
                builder = builder.header(CONTENT_TYPE, APPLICATION_JSON);
                Bytes::from(serde_json::to_vec(body)?)
            }
            None => Bytes::new(),
        };
        Ok(builder.body(body)?)
    }
}

/// Substitute `{name}` placeholders with percent-encoded path parameters.
fn resolve_path(template: &str, params: &Params) -> Result<String> {
    let mut resolved = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        let name = &rest[open + 1..open + close];
        let value = params
            .path(name)
            .filter(|value| !value.is_null())
            .ok_or_else(|| Error::MissingPathParam {
            name: name.to_string(),
            template: template.to_string(),
        })?;

        resolved.push_str(&rest[..open]);
        resolved.push_str(&encode_component(&param_to_string(value)));
        rest = &rest[open + close + 1..];
    }

    resolved.push_str(rest);
    Ok(resolved)
}

fn encode_query(params: &Params) -> String {
    let mut pairs = Vec::new();
    for (name, value) in &params.query {
        match value {
            serde_json::Value::Null => {}
            serde_json::Value::Array(items) => {
                for item in items {
                    pairs.push(format!(
                        "{}={}",
                        encode_component(name),
                        encode_component(&param_to_string(item))
                    ));
                }
            }
            other => pairs.push(format!(
                "{}={}",
                encode_component(name),
                encode_component(&param_to_string(other))
            )),
        }
    }
    pairs.join("&")
}

fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT_SET).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{HandlerContext, MockRequest};
    use crate::middleware::{create_mock_middleware, MockMiddleware};
    use crate::mock::sync_handler;
    use crate::response::{json_response, read_json};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::{Duration, Instant};
    use tokio_test::assert_ok;

    /// Stand-in for the network: answers `GET /pet/1` and `GET /store/inventory`,
    /// 500 for everything else, and records what it saw.
    #[derive(Default)]
    struct FakeTransport {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, request: Request) -> Result<Response, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.uri().to_string());

            let path = request.uri().path();
            let response = match (request.method().as_str(), path) {
                ("GET", "/pet/1") => json_response(200, &json!({"id": 1, "name": "Fluffy"}))?,
                ("GET", "/store/inventory") => json_response(200, &json!({"available": 3}))?,
                _ => json_response(500, &())?,
            };
            Ok(response)
        }
    }

    fn client() -> Client<Arc<FakeTransport>> {
        Client::new("https://example.com/", Arc::new(FakeTransport::default()))
    }

    fn petstore_mocks() -> Arc<MockMiddleware> {
        Arc::new(create_mock_middleware(|mock| {
            vec![mock.get(
                "/pet/{petId}",
                sync_handler(|_, ctx: HandlerContext| {
                    Ok(ctx.json_response(
                        200,
                        &json!({"id": 2, "name": "Mocked Fluffy", "photoUrls": []}),
                    )?)
                }),
            )]
        }))
    }

    fn pet_one() -> Params {
        Params::new().with_path("petId", 1)
    }

    #[tokio::test]
    async fn test_mocked_request_skips_transport() {
        let mut client = client();
        let middleware = petstore_mocks();
        assert!(client.use_middleware(Arc::clone(&middleware)));

        let response = client.get("/pet/{petId}", pet_one()).await.unwrap();
        let body: Value = read_json(&response).unwrap().unwrap();

        assert_eq!(body, json!({"id": 2, "name": "Mocked Fluffy", "photoUrls": []}));
        assert_eq!(client.transport().calls(), 0);
        assert_eq!(middleware.hits(0), 1);
    }

    #[tokio::test]
    async fn test_unmatched_request_reaches_transport() {
        let mut client = client();
        client.use_middleware(petstore_mocks());

        let response = client.get("/store/inventory", Params::new()).await.unwrap();
        let body: Value = read_json(&response).unwrap().unwrap();

        assert_eq!(body, json!({"available": 3}));
        assert_eq!(client.transport().calls(), 1);
    }

    #[tokio::test]
    async fn test_attach_eject_reattach() {
        let mut client = client();
        let middleware = petstore_mocks();

        let response = client.get("/pet/{petId}", pet_one()).await.unwrap();
        assert_eq!(read_json::<Value>(&response).unwrap().unwrap()["name"], "Fluffy");
        assert_eq!(client.transport().calls(), 1);

        client.use_middleware(Arc::clone(&middleware));
        let response = client.get("/pet/{petId}", pet_one()).await.unwrap();
        assert_eq!(read_json::<Value>(&response).unwrap().unwrap()["name"], "Mocked Fluffy");
        assert_eq!(client.transport().calls(), 1);

        assert!(client.eject(&middleware));
        assert!(!client.is_attached(&middleware));
        let response = client.get("/pet/{petId}", pet_one()).await.unwrap();
        assert_eq!(read_json::<Value>(&response).unwrap().unwrap()["name"], "Fluffy");
        assert_eq!(client.transport().calls(), 2);

        client.use_middleware(Arc::clone(&middleware));
        let response = client.get("/pet/{petId}", pet_one()).await.unwrap();
        assert_eq!(read_json::<Value>(&response).unwrap().unwrap()["name"], "Mocked Fluffy");
        assert_eq!(client.transport().calls(), 2);
        assert_eq!(middleware.hits(0), 2);
    }

    #[tokio::test]
    async fn test_use_and_eject_are_idempotent() {
        let mut client = client();
        let middleware = petstore_mocks();

        assert!(!client.eject(&middleware));
        assert!(client.use_middleware(Arc::clone(&middleware)));
        assert!(!client.use_middleware(Arc::clone(&middleware)));

        assert_ok!(client.get("/pet/{petId}", pet_one()).await);
        assert_eq!(middleware.total_requests(), 1);

        assert!(client.eject(&middleware));
        assert!(!client.eject(&middleware));
    }

    #[tokio::test]
    async fn test_delayed_no_content_response() {
        let mut client = client();
        let handler = |_req: MockRequest, ctx: HandlerContext| async move {
            ctx.delay(50).await;
            Ok::<_, BoxError>(ctx.json_response(204, &Value::Null)?)
        };
        client.use_middleware(Arc::new(create_mock_middleware(|mock| {
            vec![mock.delete("/pet/{petId}", handler)]
        })));

        let start = Instant::now();
        let response = client.delete("/pet/{petId}", pet_one()).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(response.status(), http::StatusCode::NO_CONTENT);
        assert!(response.body().is_empty());
        assert_eq!(client.transport().calls(), 0);
    }

    #[tokio::test]
    async fn test_handler_failure_does_not_fall_back() {
        #[derive(Debug, thiserror::Error)]
        #[error("mock exploded")]
        struct Exploded;

        let mut client = client();
        client.use_middleware(Arc::new(create_mock_middleware(|mock| {
            vec![mock.get(
                "/pet/{petId}",
                sync_handler(|_, _| Err(Box::new(Exploded) as BoxError)),
            )]
        })));

        let err = client.get("/pet/{petId}", pet_one()).await.unwrap_err();
        assert_eq!(err.to_string(), "mock exploded");
        assert!(err.handler_error().unwrap().is::<Exploded>());
        assert_eq!(client.transport().calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_do_not_block_each_other() {
        let mut client = client();
        let handler = |_req: MockRequest, ctx: HandlerContext| async move {
            ctx.delay(60).await;
            Ok::<_, BoxError>(ctx.json_response(200, &json!({"slow": true}))?)
        };
        client.use_middleware(Arc::new(create_mock_middleware(|mock| {
            vec![mock.get("/store/order/{orderId}", handler)]
        })));

        let start = Instant::now();
        let slow = async {
            let response = client
                .get("/store/order/{orderId}", Params::new().with_path("orderId", 1))
                .await;
            (response, start.elapsed())
        };
        let fast = async {
            let response = client.get("/store/inventory", Params::new()).await;
            (response, start.elapsed())
        };
        let ((slow, slow_elapsed), (fast, fast_elapsed)) = tokio::join!(slow, fast);

        assert_eq!(read_json::<Value>(&slow.unwrap()).unwrap().unwrap()["slow"], true);
        assert_eq!(read_json::<Value>(&fast.unwrap()).unwrap().unwrap()["available"], 3);
        assert!(slow_elapsed >= Duration::from_millis(60));
        assert!(
            fast_elapsed < Duration::from_millis(30),
            "pass-through waited on the delayed mock: {:?}",
            fast_elapsed
        );
        assert_eq!(client.transport().calls(), 1);
    }

    #[tokio::test]
    async fn test_transport_error() {
        struct Down;

        #[async_trait]
        impl Transport for Down {
            async fn send(&self, _request: Request) -> Result<Response, BoxError> {
                Err("connection refused".into())
            }
        }

        let client = Client::new("https://example.com", Down);
        let err = client.get("/store/inventory", Params::new()).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_request_building() {
        let client = client();
        let params = Params::new()
            .with_path("username", "jane doe")
            .with_query("tags", json!(["a", "b"]))
            .with_header("api_key", "k");

        let response = client
            .put("/user/{username}", params, &json!({"firstName": "Jane"}))
            .await
            .unwrap();
        assert_eq!(response.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            client.transport().seen.lock().unwrap().as_slice(),
            ["https://example.com/user/jane%20doe?tags=a&tags=b"]
        );
    }

    #[tokio::test]
    async fn test_missing_path_param() {
        let client = client();
        let err = client.get("/pet/{petId}", Params::new()).await.unwrap_err();
        assert!(matches!(err, Error::MissingPathParam { ref name, .. } if name == "petId"));
        assert_eq!(client.transport().calls(), 0);
    }

    #[test]
    fn test_null_path_param_is_missing() {
        let params = Params::new().with_path("petId", Value::Null);
        let err = resolve_path("/pet/{petId}", &params).unwrap_err();
        assert!(matches!(err, Error::MissingPathParam { ref name, .. } if name == "petId"));
    }

    #[test]
    fn test_resolve_path() {
        let params = Params::new().with_path("petId", 12).with_path("name", "a/b");
        assert_eq!(resolve_path("/pet/{petId}", &params).unwrap(), "/pet/12");
        assert_eq!(resolve_path("/pet/{name}/x", &params).unwrap(), "/pet/a%2Fb/x");
        assert_eq!(resolve_path("/store/inventory", &params).unwrap(), "/store/inventory");
    }

    #[test]
    fn test_encode_component() {
        assert_eq!(encode_component("a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(encode_component("x y&z=1"), "x%20y%26z%3D1");
        assert_eq!(encode_component("caf\u{e9}"), "caf%C3%A9");
    }
}
