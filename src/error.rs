//! Error types.

use thiserror::Error;

/// Boxed error returned by handlers and transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced to the caller of an outgoing request.
#[derive(Debug, Error)]
pub enum Error {
    /// A mock handler failed. The original error is kept as-is.
    #[error(transparent)]
    Handler(BoxError),

    /// The real transport failed.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// Status code outside of 100..=599.
    #[error("invalid status code: {0}")]
    InvalidStatus(u16),

    /// Verb that cannot be mocked (e.g. CONNECT).
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// The endpoint template references a path parameter that was not provided.
    #[error("missing path parameter `{name}` for {template}")]
    MissingPathParam { name: String, template: String },

    #[error("failed to build HTTP message: {0}")]
    Http(#[from] http::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("template error: {0}")]
    Template(#[from] handlebars::RenderError),
}

impl Error {
    /// Returns the handler's original error if this is a handler failure.
    pub fn handler_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Handler(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
