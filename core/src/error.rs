//! Error types for the Scrapyd client.
//!
//! # Design
//! The façade never translates errors coming out of an `HttpDelegate`; it
//! forwards them with `?`. The only errors the façade raises itself are
//! `UnknownEndpoint` (before any request is made), `Url` (joining the target
//! with an endpoint path), and the field-extraction variants `MissingField`
//! and `UnexpectedField`.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScrapydError>;

#[derive(Debug, Error)]
pub enum ScrapydError {
    /// The endpoint name is not present in the client's endpoint map.
    #[error("Unknown endpoint `{0}`")]
    UnknownEndpoint(String),

    /// The target could not be parsed or joined with an endpoint path.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Connection refused, timeout, TLS failure and the like.
    #[error("HTTP transport failed: {0}")]
    Transport(#[from] ureq::Error),

    /// The service answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The service answered 2xx but the body is not JSON.
    #[error("Scrapyd returned an invalid JSON response: {body}")]
    InvalidJson {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    /// The service answered `{"status": "error", "message": ...}`.
    #[error("Scrapyd error: {0}")]
    Response(String),

    #[error("response is missing field `{0}`")]
    MissingField(&'static str),

    #[error("response field `{field}` has an unexpected shape: {source}")]
    UnexpectedField {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A whole response body could not be decoded into the expected type.
    #[error("deserialization failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// Escape hatch for custom delegates with their own transport errors.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}
