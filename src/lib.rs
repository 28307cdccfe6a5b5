//! Mock Middleware for typed HTTP clients
//!
//! Intercepts outgoing requests whose endpoint template and verb have a
//! registered mock and answers them in-process. Everything else passes
//! through to the real transport.
//!
//! # Features
//!
//! - **Per-verb registration**: `mock.get(..)`, `mock.post(..)`, ... in a single callback
//! - **First match wins**: exact `(template, verb)` lookup in registration order
//! - **Response helpers**: `json_response` and `delay` on every handler context
//! - **Attach / detach**: `Client::use_middleware` and `Client::eject`
//! - **Declarative mocks**: YAML definitions with Handlebars templates,
//!   latency simulation and fault injection
//!
//! # Example
//!
//! ```no_run
//! use openapi_mock_middleware::{
//!     create_mock_middleware, sync_handler, BoxError, Client, HandlerContext, Params, Request,
//!     Response, Transport,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct Network;
//!
//! #[async_trait::async_trait]
//! impl Transport for Network {
//!     async fn send(&self, _request: Request) -> Result<Response, BoxError> {
//!         Err("offline".into())
//!     }
//! }
//!
//! # async fn run() -> openapi_mock_middleware::Result<()> {
//! let middleware = Arc::new(create_mock_middleware(|mock| {
//!     vec![mock.get(
//!         "/pet/{petId}",
//!         sync_handler(|_, ctx: HandlerContext| {
//!             Ok(ctx.json_response(200, &json!({"id": 2, "name": "Mocked Fluffy", "photoUrls": []}))?)
//!         }),
//!     )]
//! }));
//!
//! let mut client = Client::new("https://example.com", Network);
//! client.use_middleware(Arc::clone(&middleware));
//! let response = client.get("/pet/{petId}", Params::new().with_path("petId", 1)).await?;
//! assert_eq!(response.status(), 200);
//!
//! client.eject(&middleware);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod fixture;
pub mod matcher;
pub mod method;
pub mod middleware;
pub mod mock;
pub mod operation;
pub mod response;
pub mod template;

pub use client::{Client, Transport};
pub use config::{MockConfig, MockSettings};
pub use context::{HandlerContext, MockRequest, Params};
pub use error::{BoxError, Error, Result};
pub use matcher::MockRegistry;
pub use method::HttpMethod;
pub use middleware::{
    create_mock_middleware, Middleware, MiddlewareRequest, MockMiddleware, RequestOutcome,
};
pub use mock::{sync_handler, Handler, Mock, MockCreators};
pub use operation::Operation;
pub use response::{delay, json_response, read_json, Request, Response};
