//! Per-request values handed to mock handlers.

use crate::error::Result;
use crate::operation::Operation;
use crate::response::{self, Request, Response};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters the caller supplied for an operation.
///
/// Values stay as JSON so numeric ids (`petId: 1`) keep their type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    #[serde(default)]
    pub path: Map<String, Value>,
    #[serde(default)]
    pub query: Map<String, Value>,
    #[serde(default)]
    pub header: Map<String, Value>,
    #[serde(default)]
    pub cookie: Map<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path parameter.
    pub fn with_path(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.path.insert(name.into(), value.into());
        self
    }

    /// Add a query parameter.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Add a header parameter.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.header.insert(name.into(), value.into());
        self
    }

    pub fn path(&self, name: &str) -> Option<&Value> {
        self.path.get(name)
    }

    /// Deserialize a path parameter into `T`. Returns `None` when absent.
    pub fn path_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.path
            .get(name)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(Into::into)
    }

    pub fn query(&self, name: &str) -> Option<&Value> {
        self.query.get(name)
    }
}

/// Render a parameter value the way it appears in a URL: strings unquoted,
/// everything else in its JSON form.
pub(crate) fn param_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Context for one handler invocation.
#[derive(Debug, Clone, Default)]
pub struct HandlerContext {
    params: Params,
}

impl HandlerContext {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    /// Parameters as provided by the caller of the intercepted request.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Simulate latency. See [`response::delay`].
    pub async fn delay(&self, ms: u64) {
        response::delay(ms).await
    }

    /// Build a JSON response. See [`response::json_response`].
    pub fn json_response<T>(&self, status: u16, data: &T) -> Result<Response>
    where
        T: Serialize + ?Sized,
    {
        response::json_response(status, data)
    }
}

/// The intercepted request, handed to the matching handler.
#[derive(Debug)]
pub struct MockRequest {
    inner: Request,
    schema_path: String,
}

impl MockRequest {
    pub fn new(inner: Request, schema_path: impl Into<String>) -> Self {
        Self {
            inner,
            schema_path: schema_path.into(),
        }
    }

    pub fn method(&self) -> &http::Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &http::Uri {
        self.inner.uri()
    }

    pub fn headers(&self) -> &http::HeaderMap {
        self.inner.headers()
    }

    pub fn body(&self) -> &Bytes {
        self.inner.body()
    }

    /// Endpoint template the request was resolved from, e.g. `/pet/{petId}`.
    pub fn schema_path(&self) -> &str {
        &self.schema_path
    }

    /// Read the body as JSON of the caller's chosen shape.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(self.inner.body())?)
    }

    /// Read the body as the request type declared by operation `O`.
    pub fn json_for<O: Operation>(&self) -> Result<O::RequestBody> {
        self.json()
    }

    pub fn into_inner(self) -> Request {
        self.inner
    }
}
