//! Resolves a completed request to exactly one handler invocation.

use log::{debug, error, warn};
use tokio::sync::RwLock;

use crate::parser::{HttpRequest, Method};
use crate::server::error::Error;
use crate::server::response::{HttpResponse, StatusCode};
use crate::server::router::Router;
use crate::server::writer::ResponseWriter;

/// The response for a method outside the routable set.
pub fn method_not_allowed() -> HttpResponse {
    let allowed = Method::ALL
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    HttpResponse::new(StatusCode::MethodNotAllowed).with_header("Allow", allowed)
}

/// Dispatch `request` against `router` and wait for the handler's response.
///
/// Unroutable methods are answered with 405 before the table is consulted.
/// Otherwise the exact handler, or the method's default, is invoked once. The
/// table lock is released before the handler runs.
///
/// # Returns
///
/// The response the handler ended, a 500 if the handler failed without ending
/// one, or [`Error::ResponseNotEnded`] if it returned without ending one
pub async fn dispatch(router: &RwLock<Router>, request: HttpRequest) -> Result<HttpResponse, Error> {
    let method = match request.routable_method() {
        Ok(method) => method,
        Err(_) => {
            debug!("Method {} is not routable", request.method);
            return Ok(method_not_allowed());
        }
    };

    let handler = router.read().await.lookup(method, &request.path);

    let method_text = request.method.clone();
    let path = request.path.clone();
    let (writer, finished) = ResponseWriter::channel();
    let outcome = handler(request, writer).await;

    match (finished.await, outcome) {
        (Ok(response), Ok(())) => Ok(response),
        (Ok(response), Err(e)) => {
            warn!("Handler for {method_text} {path} failed after ending its response: {e}");
            Ok(response)
        }
        (Err(_), Err(e)) => {
            error!("Handler for {method_text} {path} failed: {e}");
            Ok(HttpResponse::new(StatusCode::InternalServerError)
                .with_content_type("text/plain")
                .with_body_string(format!("Internal server error: {e}")))
        }
        (Err(_), Ok(())) => Err(Error::ResponseNotEnded {
            method: method_text,
            path,
        }),
    }
}
