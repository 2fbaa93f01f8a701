//! The response sink handed to route handlers.

use tokio::sync::oneshot;

use crate::server::response::{HttpResponse, StatusCode};

/// Accumulates a handler's response until the handler ends it.
///
/// The status defaults to 200. Body writes are appended in call order.
/// [`ResponseWriter::end`] takes the writer by value, so a response can be
/// ended at most once; dropping the writer without ending it leaves the
/// request unanswered.
#[derive(Debug)]
pub struct ResponseWriter {
    response: HttpResponse,
    sender: oneshot::Sender<HttpResponse>,
}

impl ResponseWriter {
    /// Create a writer together with the receiver that observes its end.
    pub(crate) fn channel() -> (Self, oneshot::Receiver<HttpResponse>) {
        let (sender, receiver) = oneshot::channel();
        let writer = Self {
            response: HttpResponse::new(StatusCode::Ok),
            sender,
        };
        (writer, receiver)
    }

    /// Set the status code.
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.response.status = status;
        self
    }

    /// Add or replace a response header.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.response.set_header(name, value);
        self
    }

    /// Append bytes to the response body.
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) -> &mut Self {
        self.response.body.extend_from_slice(chunk.as_ref());
        self
    }

    /// The status code set so far.
    pub fn current_status(&self) -> StatusCode {
        self.response.status
    }

    /// Finish the response and hand it back to the connection.
    pub fn end(self) {
        let Self { response, sender } = self;
        let content_length = response.body.len().to_string();
        // The receiver is gone only if the connection was already torn down
        let _ = sender.send(response.with_header("Content-Length", content_length));
    }

    /// Replace everything written so far with `response` and end it.
    pub fn send(mut self, response: HttpResponse) {
        self.response = response;
        self.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_are_concatenated_in_order() {
        let (mut writer, receiver) = ResponseWriter::channel();
        writer
            .status(StatusCode::Created)
            .header("Content-Type", "text/plain")
            .write("hel")
            .write(b"lo");
        writer.end();

        let response = receiver.await.unwrap();
        assert_eq!(response.status, StatusCode::Created);
        assert_eq!(response.body, b"hello");
        assert_eq!(response.get_header("content-length"), Some(&"5".to_string()));
        assert_eq!(response.get_header("content-type"), Some(&"text/plain".to_string()));
    }

    #[tokio::test]
    async fn test_default_status_is_ok() {
        let (writer, receiver) = ResponseWriter::channel();
        assert_eq!(writer.current_status(), StatusCode::Ok);
        writer.end();
        assert_eq!(receiver.await.unwrap().status, StatusCode::Ok);
    }

    #[tokio::test]
    async fn test_dropped_writer_never_ends() {
        let (writer, receiver) = ResponseWriter::channel();
        drop(writer);
        assert!(receiver.await.is_err());
    }
}
