//! Client middleware hook and the mock interceptor built on it.

use crate::config::{MockConfig, MockSettings};
use crate::context::{HandlerContext, MockRequest, Params};
use crate::error::{Error, Result};
use crate::matcher::MockRegistry;
use crate::method::HttpMethod;
use crate::mock::{Mock, MockCreators};
use crate::response::{Request, Response};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// What a client hands to each middleware before sending a request.
#[derive(Debug)]
pub struct MiddlewareRequest {
    /// The outgoing request
    pub request: Request,
    /// Endpoint template the request was built from, e.g. `/pet/{petId}`
    pub schema_path: String,
    /// Parameters the caller supplied
    pub params: Params,
}

/// Decision returned by [`Middleware::on_request`].
#[derive(Debug)]
pub enum RequestOutcome {
    /// Forward the (possibly modified) request to the next middleware or the
    /// transport.
    Continue(MiddlewareRequest),
    /// Skip the transport and answer with this response.
    Respond(Response),
}

/// Hook a client runs before every outgoing request.
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str {
        "middleware"
    }

    async fn on_request(&self, request: MiddlewareRequest) -> Result<RequestOutcome>;
}

/// Intercepts requests whose `(template, verb)` has a registered mock and
/// answers them with the mock's handler. Everything else passes through.
pub struct MockMiddleware {
    registry: MockRegistry,
    settings: MockSettings,
    /// Hit count per mock, indexed like the registry
    hits: Vec<AtomicU64>,
    /// Total requests seen.
    requests_total: AtomicU64,
    /// Total requests answered by a mock.
    requests_matched: AtomicU64,
    /// Total requests passed through.
    requests_unmatched: AtomicU64,
}

/// Build a mock middleware from a registration callback.
///
/// ```
/// use openapi_mock_middleware::{create_mock_middleware, sync_handler, HandlerContext};
/// use serde_json::json;
///
/// let middleware = create_mock_middleware(|mock| {
///     vec![mock.get(
///         "/pet/{petId}",
///         sync_handler(|_, ctx: HandlerContext| {
///             Ok(ctx.json_response(200, &json!({"id": 2, "name": "Mocked Fluffy", "photoUrls": []}))?)
///         }),
///     )]
/// });
/// assert_eq!(middleware.registry().len(), 1);
/// ```
pub fn create_mock_middleware<F>(mocks: F) -> MockMiddleware
where
    F: FnOnce(&MockCreators) -> Vec<Mock>,
{
    MockMiddleware::new(mocks(&MockCreators::new()))
}

impl MockMiddleware {
    pub fn new(mocks: Vec<Mock>) -> Self {
        Self::with_settings(mocks, MockSettings::default())
    }

    pub fn with_settings(mocks: Vec<Mock>, settings: MockSettings) -> Self {
        let registry = MockRegistry::new(mocks);
        let hits = registry.iter().map(|_| AtomicU64::new(0)).collect();

        info!(mocks = registry.len(), "Mock middleware initialized");

        Self {
            registry,
            settings,
            hits,
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        }
    }

    /// Build from declarative YAML mocks.
    pub fn from_config(config: MockConfig) -> Self {
        let settings = config.settings.clone();
        Self::with_settings(config.into_mocks(), settings)
    }

    pub fn registry(&self) -> &MockRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &MockSettings {
        &self.settings
    }

    /// Get total requests seen.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Get total requests answered by a mock.
    pub fn total_matched(&self) -> u64 {
        self.requests_matched.load(Ordering::Relaxed)
    }

    /// Get total requests passed through.
    pub fn total_unmatched(&self) -> u64 {
        self.requests_unmatched.load(Ordering::Relaxed)
    }

    /// Number of times the mock at `index` handled a request.
    pub fn hits(&self, index: usize) -> u64 {
        self.hits
            .get(index)
            .map(|h| h.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn pass_through(&self, request: MiddlewareRequest) -> Result<RequestOutcome> {
        self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
        if self.settings.log_unmatched {
            debug!(
                method = %request.request.method(),
                schema_path = %request.schema_path,
                "No matching mock, passing through"
            );
        }
        Ok(RequestOutcome::Continue(request))
    }
}

#[async_trait]
impl Middleware for MockMiddleware {
    fn name(&self) -> &str {
        "mock"
    }

    async fn on_request(&self, request: MiddlewareRequest) -> Result<RequestOutcome> {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let Some(method) = HttpMethod::from_http(request.request.method()) else {
            return self.pass_through(request);
        };
        let Some(result) = self.registry.find(&request.schema_path, method) else {
            return self.pass_through(request);
        };

        self.requests_matched.fetch_add(1, Ordering::Relaxed);
        self.hits[result.index].fetch_add(1, Ordering::Relaxed);

        if self.settings.log_matches {
            info!(
                mock_index = result.index,
                method = %method,
                schema_path = %request.schema_path,
                "Request matched mock"
            );
        }

        let MiddlewareRequest {
            request,
            schema_path,
            params,
        } = request;
        let handler = result.mock.handler();
        let response = handler
            .handle(MockRequest::new(request, schema_path), HandlerContext::new(params))
            .await
            .map_err(Error::Handler)?;

        Ok(RequestOutcome::Respond(response))
    }
}
