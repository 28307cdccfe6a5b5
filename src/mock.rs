//! Mock definitions and the per-verb constructors used to declare them.

use crate::context::{HandlerContext, MockRequest};
use crate::error::BoxError;
use crate::method::HttpMethod;
use crate::operation::Operation;
use crate::response::Response;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Produces the substitute response for a matched request.
///
/// Implemented for async closures taking `(MockRequest, HandlerContext)`.
/// Wrap plain closures with [`sync_handler`].
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: MockRequest, ctx: HandlerContext)
        -> Result<Response, BoxError>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(MockRequest, HandlerContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
{
    async fn handle(
        &self,
        request: MockRequest,
        ctx: HandlerContext,
    ) -> Result<Response, BoxError> {
        (self)(request, ctx).await
    }
}

/// Handler backed by a non-async closure.
pub struct SyncHandler<F>(F);

/// Adapt a closure that answers immediately.
pub fn sync_handler<F>(f: F) -> SyncHandler<F>
where
    F: Fn(MockRequest, HandlerContext) -> Result<Response, BoxError> + Send + Sync,
{
    SyncHandler(f)
}

#[async_trait]
impl<F> Handler for SyncHandler<F>
where
    F: Fn(MockRequest, HandlerContext) -> Result<Response, BoxError> + Send + Sync,
{
    async fn handle(
        &self,
        request: MockRequest,
        ctx: HandlerContext,
    ) -> Result<Response, BoxError> {
        (self.0)(request, ctx)
    }
}

/// An `(endpoint template, verb, handler)` triple. Immutable once built.
#[derive(Clone)]
pub struct Mock {
    path: String,
    method: HttpMethod,
    handler: Arc<dyn Handler>,
}

impl Mock {
    pub fn new<H>(method: HttpMethod, path: impl Into<String>, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        Self {
            path: path.into(),
            method,
            handler: Arc::new(handler),
        }
    }

    /// Endpoint template this mock answers for.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub(crate) fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Exact equality on both template and verb.
    pub fn matches(&self, path: &str, method: HttpMethod) -> bool {
        self.method == method && self.path == path
    }
}

impl fmt::Debug for Mock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mock")
            .field("path", &self.path)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Per-verb mock constructors, passed to the registration callback of
/// [`create_mock_middleware`](crate::create_mock_middleware).
///
/// Template correctness is not checked here; an unknown template simply never
/// matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockCreators {
    _private: (),
}

impl MockCreators {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }

    /// Mock `path` for an explicit verb.
    pub fn mock<H>(&self, method: HttpMethod, path: impl Into<String>, handler: H) -> Mock
    where
        H: Handler + 'static,
    {
        Mock::new(method, path, handler)
    }

    /// Mock a typed operation; template and verb come from `O`.
    pub fn operation<O, H>(&self, handler: H) -> Mock
    where
        O: Operation,
        H: Handler + 'static,
    {
        Mock::new(O::METHOD, O::PATH, handler)
    }

    pub fn get<H: Handler + 'static>(&self, path: impl Into<String>, handler: H) -> Mock {
        self.mock(HttpMethod::Get, path, handler)
    }

    pub fn post<H: Handler + 'static>(&self, path: impl Into<String>, handler: H) -> Mock {
        self.mock(HttpMethod::Post, path, handler)
    }

    pub fn put<H: Handler + 'static>(&self, path: impl Into<String>, handler: H) -> Mock {
        self.mock(HttpMethod::Put, path, handler)
    }

    pub fn delete<H: Handler + 'static>(&self, path: impl Into<String>, handler: H) -> Mock {
        self.mock(HttpMethod::Delete, path, handler)
    }

    pub fn patch<H: Handler + 'static>(&self, path: impl Into<String>, handler: H) -> Mock {
        self.mock(HttpMethod::Patch, path, handler)
    }

    pub fn head<H: Handler + 'static>(&self, path: impl Into<String>, handler: H) -> Mock {
        self.mock(HttpMethod::Head, path, handler)
    }

    pub fn options<H: Handler + 'static>(&self, path: impl Into<String>, handler: H) -> Mock {
        self.mock(HttpMethod::Options, path, handler)
    }

    pub fn trace<H: Handler + 'static>(&self, path: impl Into<String>, handler: H) -> Mock {
        self.mock(HttpMethod::Trace, path, handler)
    }
}
