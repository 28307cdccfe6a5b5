//! Optional compile-time binding between endpoint templates and body types.
//!
//! Code generated from a schema (or written by hand) can describe each
//! operation as a marker type:
//!
//! ```
//! use openapi_mock_middleware::{HttpMethod, Operation};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct NewPet {
//!     name: String,
//! }
//!
//! struct AddPet;
//!
//! impl Operation for AddPet {
//!     const PATH: &'static str = "/pet";
//!     const METHOD: HttpMethod = HttpMethod::Post;
//!     type RequestBody = NewPet;
//! }
//! ```
//!
//! At runtime an operation is nothing more than its `(PATH, METHOD)` pair.

use crate::method::HttpMethod;
use serde::de::DeserializeOwned;

pub trait Operation {
    /// Endpoint template, e.g. `/pet/{petId}`.
    const PATH: &'static str;
    const METHOD: HttpMethod;
    /// Shape of the JSON request body. Use `serde_json::Value` or `()` when
    /// the operation has none worth typing.
    type RequestBody: DeserializeOwned;
}
