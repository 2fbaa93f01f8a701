//! Error types for the HTTP parser.

use thiserror::Error;

/// Errors that can occur during HTTP request parsing.
#[derive(Debug, Error)]
pub enum Error {
    /// The method is not one of the routable methods.
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// The request target is invalid or missing.
    #[error("Invalid HTTP path: {0}")]
    InvalidPath(String),

    /// The request line is malformed (wrong format or missing components).
    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),

    /// The HTTP version in the request is not supported.
    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    /// A required header is missing from the request.
    #[error("Required header is missing: {0}")]
    MissingHeader(String),

    /// A header in the request has an invalid format.
    #[error("Invalid header format: {0}")]
    InvalidHeaderFormat(String),

    /// The request head grew past the configured limit without terminating.
    #[error("Request head exceeds {0} bytes")]
    HeadTooLarge(usize),

    /// The Content-Length header is not a valid length, or is repeated with different values.
    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    /// The request declares a transfer coding other than chunked.
    #[error("Unsupported Transfer-Encoding: {0}")]
    UnsupportedTransferEncoding(String),

    /// Both Content-Length and Transfer-Encoding were sent.
    #[error("Request declares both Content-Length and Transfer-Encoding")]
    AmbiguousBodyLength,

    /// A chunk in a chunked body is malformed.
    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),

    /// The body is shorter than its declared framing.
    #[error("Incomplete body: expected {expected} bytes, got {actual}")]
    IncompleteBody { expected: usize, actual: usize },

    /// The request is empty.
    #[error("Empty request")]
    EmptyRequest,

    /// Error parsing JSON.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}
