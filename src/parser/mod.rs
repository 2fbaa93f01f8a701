//! HTTP parser module.
//!
//! This module turns raw request bytes into a request head and a buffered body.
//! Parsing is split so that the server can validate the head before it commits
//! to reading the body.

mod request;
mod method;
mod version;
mod error;
mod chunked;

// Re-export public items
pub use request::{BodyLength, HttpRequest, RequestHead};
pub use method::Method;
pub use version::HttpVersion;
pub use error::Error;
pub use chunked::ChunkedDecoder;

// Re-export the parsing functions
pub use request::{find_head_end, parse_head, parse_request};
