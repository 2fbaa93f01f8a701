//! HTTP server implementation for microroute-rs.
//!
//! This module owns the listener lifecycle, request ingestion, the method
//! and path route table, and the response writer handed to handlers.

mod response;
mod config;
mod error;
mod handler;
mod writer;
mod router;
mod ingest;
mod dispatch;
mod http_server;

// Re-export public items
pub use response::{HttpResponse, StatusCode};
pub use self::config::{ServerConfig, ADDR_ENV, ENV_PREFIX, PORT_ENV};
pub use error::Error;
pub use handler::{handler_fn, HandlerFn, HandlerFuture};
pub use writer::ResponseWriter;
pub use router::{not_found_handler, RouteMethod, Router, WILDCARD};
pub use ingest::read_request;
pub use dispatch::{dispatch, method_not_allowed};
pub use http_server::{HttpServer, ServerHandle, ServerState};
