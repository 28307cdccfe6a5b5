//! Response synthesis helpers.
//!
//! Handlers build their responses with [`json_response`] and simulate latency
//! with [`delay`]. Both are also reachable through
//! [`HandlerContext`](crate::HandlerContext).

use crate::error::{Error, Result};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Outgoing request as seen by middlewares and transports.
pub type Request = http::Request<Bytes>;

/// Response produced either by a mock handler or by the transport.
pub type Response = http::Response<Bytes>;

pub(crate) const APPLICATION_JSON: &str = "application/json";

/// Status codes a mock may answer with.
pub(crate) const VALID_STATUS: RangeInclusive<u16> = 100..=599;

/// Build a response whose body is `data` serialized as JSON.
///
/// A `data` value that serializes to JSON `null` (`None`, `()`,
/// `Value::Null`) produces an empty body, so null-body statuses such as 204
/// stay well-formed. No schema validation happens here.
pub fn json_response<T>(status: u16, data: &T) -> Result<Response>
where
    T: Serialize + ?Sized,
{
    if !VALID_STATUS.contains(&status) {
        return Err(Error::InvalidStatus(status));
    }
    let status = StatusCode::from_u16(status).map_err(|_| Error::InvalidStatus(status))?;
    let encoded = serde_json::to_vec(data)?;
    let body = if encoded == b"null" {
        Bytes::new()
    } else {
        Bytes::from(encoded)
    };

    let response = http::Response::builder()
        .status(status)
        .header(CONTENT_TYPE, APPLICATION_JSON)
        .body(body)?;
    Ok(response)
}

/// Complete after `ms` milliseconds without blocking other tasks.
pub async fn delay(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Parse a response body as JSON. An empty body yields `None`.
pub fn read_json<T: DeserializeOwned>(response: &Response) -> Result<Option<T>> {
    let body = response.body();
    if body.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(body)?))
}
