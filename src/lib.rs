//! A minimal HTTP request router built directly on raw sockets.
//!
//! This library reads each request off a TCP connection, buffers its whole
//! body, and dispatches it to at most one handler registered for its method
//! and path. Requests that match nothing fall through to a per-method default
//! handler which answers `404 Cannot <METHOD> <path>`.
//!
//! # Features
//!
//! - Exact-path registration for GET, POST, PUT, PATCH and DELETE
//! - A replaceable default handler per method, registered under the `*` path
//! - Content-Length and chunked request bodies, buffered before dispatch
//! - `Expect` handling: `100-continue` is honoured, anything else gets 417
//! - Malformed requests answered with `400 {"err":"Bad Request"}`
//! - A restartable listener whose route table is reset on close
//!
//! # Examples
//!
//! ## Registering routes
//!
//! ```no_run
//! use microroute_rs::{HttpServer, Method, ResponseWriter, ServerConfig, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), microroute_rs::ServerError> {
//!     let server = HttpServer::new(ServerConfig::default().with_port(3040));
//!
//!     server
//!         .route(Method::GET, "/testing", |_req, mut res: ResponseWriter| async move {
//!             res.status(StatusCode::Ok).write("Testing...");
//!             res.end();
//!             Ok(())
//!         })
//!         .await;
//!
//!     // Serves until Ctrl+C
//!     server.start().await
//! }
//! ```
//!
//! ## Dispatching without a socket
//!
//! ```
//! use microroute_rs::{dispatch, parse_request, Router, ResponseWriter, StatusCode};
//! use tokio::sync::RwLock;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let router = RwLock::new(Router::new());
//! router.write().await.post("/echo", |req, mut res: ResponseWriter| async move {
//!     res.status(StatusCode::Created).write(req.body);
//!     res.end();
//!     Ok(())
//! });
//!
//! let request = parse_request(b"POST /echo HTTP/1.1\r\nHost: a\r\nContent-Length: 5\r\n\r\nhello").unwrap();
//! let response = dispatch(&router, request).await.unwrap();
//! assert_eq!(response.status, StatusCode::Created);
//! assert_eq!(response.body, b"hello");
//!
//! let request = parse_request(b"GET /other HTTP/1.1\r\nHost: a\r\n\r\n").unwrap();
//! let response = dispatch(&router, request).await.unwrap();
//! assert_eq!(response.status, StatusCode::NotFound);
//! assert_eq!(response.body, b"Cannot GET /other");
//! # });
//! ```
//!
//! ## Error handling
//!
//! ```
//! use microroute_rs::{parse_request, ParserError};
//!
//! let invalid_request = b"GET /index.html\r\nHost: example.com\r\n\r\n";
//!
//! match parse_request(invalid_request) {
//!     Ok(_) => println!("Request parsed successfully"),
//!     Err(ParserError::MalformedRequestLine(line)) => println!("Malformed request line: {}", line),
//!     Err(err) => println!("Other error: {}", err),
//! }
//! ```
//!
//! See `demos/home_server.rs` for a complete server.

// Export the parser module
pub mod parser;

// Export the server module
pub mod server;

// Re-export commonly used items for convenience
pub use parser::{Error as ParserError, HttpRequest, HttpVersion, Method, parse_request};
pub use server::{
    dispatch, Error as ServerError, HttpResponse, HttpServer, ResponseWriter, RouteMethod, Router,
    ServerConfig, ServerHandle, ServerState, StatusCode,
};
