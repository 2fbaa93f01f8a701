//! HTTP request handler types.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::parser::HttpRequest;
use crate::server::error::Error;
use crate::server::writer::ResponseWriter;

/// Type alias for a boxed future returned by a handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), Error>> + Send>>;

/// Type alias for a handler function that takes the request and the response writer.
///
/// A handler owns its [`ResponseWriter`] and must end it, either before its
/// future completes or from a task it spawned.
pub type HandlerFn = Arc<dyn Fn(HttpRequest, ResponseWriter) -> HandlerFuture + Send + Sync>;

/// Box an async closure into a [`HandlerFn`].
pub fn handler_fn<F, Fut>(handler: F) -> HandlerFn
where
    F: Fn(HttpRequest, ResponseWriter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    Arc::new(move |req: HttpRequest, res: ResponseWriter| -> HandlerFuture {
        Box::pin(handler(req, res))
    })
}
