//! Error types for the HTTP server.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::parser::Error as ParserError;
use crate::server::response::{HttpResponse, StatusCode};

/// Errors that can occur during HTTP server operation.
#[derive(Debug, Error)]
pub enum Error {
    /// Error parsing an HTTP request.
    #[error("Parse error: {0}")]
    ParseError(#[from] ParserError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    BindError {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The request carried an `Expect` header other than `100-continue`.
    #[error("Unsupported expectation: {0}")]
    ExpectationFailed(String),

    /// The request body exceeds the configured limit.
    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// The peer closed the connection before the request was complete.
    #[error("Connection closed before the request was complete")]
    IncompleteRequest,

    /// The request was not received within the read timeout.
    #[error("Timed out after {0:?} waiting for the request")]
    Timeout(Duration),

    /// A handler returned without ending its response.
    #[error("Handler for {method} {path} returned without ending the response")]
    ResponseNotEnded { method: String, path: String },

    /// The server is already accepting connections.
    #[error("Server is already listening")]
    AlreadyListening,

    /// Configuration could not be loaded or deserialized.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    /// Internal server error.
    #[error("Internal server error: {0}")]
    InternalError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct BadRequestBody {
    err: &'static str,
}

impl Error {
    /// Returns true for requests rejected because they broke the protocol,
    /// as opposed to connections that failed.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Error::ParseError(_) | Error::ExpectationFailed(_) | Error::PayloadTooLarge(_)
        )
    }

    /// The fixed response sent to the client for a protocol violation.
    ///
    /// Transport failures have no rejection: the connection is dropped
    /// without a response.
    pub fn rejection(&self) -> Option<HttpResponse> {
        match self {
            Error::ParseError(_) => {
                let response = HttpResponse::new(StatusCode::BadRequest);
                match response.with_json(&BadRequestBody { err: "Bad Request" }) {
                    Ok(response) => Some(response),
                    Err(_) => Some(
                        HttpResponse::new(StatusCode::BadRequest)
                            .with_content_type("application/json")
                            .with_body_string(r#"{"err":"Bad Request"}"#),
                    ),
                }
            }
            Error::ExpectationFailed(_) => Some(
                HttpResponse::new(StatusCode::ExpectationFailed)
                    .with_content_type("text/plain")
                    .with_body_string("Expectation Failed!"),
            ),
            Error::PayloadTooLarge(_) => Some(
                HttpResponse::new(StatusCode::PayloadTooLarge)
                    .with_content_type("text/plain")
                    .with_body_string("Payload Too Large"),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_rejection() {
        let err = Error::from(ParserError::EmptyRequest);
        assert!(err.is_protocol_violation());

        let response = err.rejection().unwrap();
        assert_eq!(response.status, StatusCode::BadRequest);
        assert_eq!(response.body, br#"{"err":"Bad Request"}"#);
    }

    #[test]
    fn test_expectation_rejection() {
        let err = Error::ExpectationFailed("meow".to_string());
        let response = err.rejection().unwrap();
        assert_eq!(response.status, StatusCode::ExpectationFailed);
        assert_eq!(response.body, b"Expectation Failed!");
    }

    #[test]
    fn test_transport_errors_have_no_rejection() {
        let err = Error::from(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert!(!err.is_protocol_violation());
        assert!(err.rejection().is_none());
        assert!(Error::IncompleteRequest.rejection().is_none());
    }
}
