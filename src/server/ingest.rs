//! Request ingestion: reads one request off a connection and buffers its body.

use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::parser::{
    find_head_end, parse_head, BodyLength, ChunkedDecoder, Error as ParserError, HttpRequest,
    RequestHead,
};
use crate::server::config::ServerConfig;
use crate::server::error::Error;

const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// A request whose head has been parsed and whose body is still arriving.
///
/// Completing it consumes it, so a request is surfaced at most once.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    head: RequestHead,
    body: Vec<u8>,
}

impl PendingRequest {
    pub(crate) fn new(head: RequestHead) -> Self {
        Self {
            head,
            body: Vec::new(),
        }
    }

    pub(crate) fn push_chunk(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }

    pub(crate) fn len(&self) -> usize {
        self.body.len()
    }

    pub(crate) fn complete(self) -> HttpRequest {
        HttpRequest::from_head(self.head, &self.body)
    }
}

/// Socket reads sized by the configuration.
struct Reader<'a, S> {
    socket: &'a mut S,
    chunk: Vec<u8>,
}

impl<'a, S> Reader<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(socket: &'a mut S, read_buffer_size: usize) -> Self {
        Self {
            socket,
            chunk: vec![0; read_buffer_size.max(1)],
        }
    }

    /// Append the next chunk to `buf`; returns the number of bytes read.
    async fn read_into(&mut self, buf: &mut Vec<u8>) -> Result<usize, Error> {
        let n = self.socket.read(&mut self.chunk).await?;
        buf.extend_from_slice(&self.chunk[..n]);
        Ok(n)
    }

    /// Like [`Reader::read_into`], but EOF means the request was cut short.
    async fn read_more(&mut self, buf: &mut Vec<u8>) -> Result<(), Error> {
        match self.read_into(buf).await? {
            0 => Err(Error::IncompleteRequest),
            _ => Ok(()),
        }
    }
}

/// Read one complete request from `socket`.
///
/// The head is parsed as soon as its terminating blank line arrives. An
/// `Expect` header is answered before any body byte is read: `100-continue`
/// gets an interim response (HTTP/1.1 only), anything else fails the request. The body is
/// then buffered in arrival order until its declared framing is satisfied.
///
/// # Returns
///
/// `Ok(None)` if the peer closed the connection without sending anything,
/// otherwise the completed request
pub async fn read_request<S>(socket: &mut S, config: &ServerConfig) -> Result<Option<HttpRequest>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = Reader::new(socket, config.read_buffer_size);
    let mut buf = Vec::with_capacity(config.read_buffer_size);

    let head_end = loop {
        if let Some(end) = find_head_end(&buf) {
            break end;
        }
        if buf.len() > config.max_header_size {
            return Err(ParserError::HeadTooLarge(config.max_header_size).into());
        }
        if reader.read_into(&mut buf).await? == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            // A truncated head that is already invalid is reported as such
            parse_head(&buf)?;
            return Err(Error::IncompleteRequest);
        }
    };

    if head_end > config.max_header_size {
        return Err(ParserError::HeadTooLarge(config.max_header_size).into());
    }

    let head = parse_head(&buf[..head_end])?;
    let mut rest = buf.split_off(head_end);

    if let Some(expectation) = head.get_header("expect") {
        if !expectation.eq_ignore_ascii_case("100-continue") {
            return Err(Error::ExpectationFailed(expectation.clone()));
        }
        // HTTP/1.0 clients do not understand interim responses
        if rest.is_empty() && head.version.accepts_interim_responses() {
            reader.socket.write_all(CONTINUE).await?;
            reader.socket.flush().await?;
        }
    }

    let framing = head.body_length()?;
    debug!("Request head: {} {} ({framing:?})", head.method, head.target);

    let mut pending = PendingRequest::new(head);
    match framing {
        BodyLength::Empty => {}
        BodyLength::Length(expected) => {
            if expected > config.max_body_size {
                return Err(Error::PayloadTooLarge(config.max_body_size));
            }
            loop {
                let take = rest.len().min(expected - pending.len());
                pending.push_chunk(&rest[..take]);
                if pending.len() == expected {
                    break;
                }
                rest.clear();
                reader.read_more(&mut rest).await?;
            }
        }
        BodyLength::Chunked => {
            let mut decoder = ChunkedDecoder::new();
            let mut decoded = Vec::new();
            loop {
                let done = decoder.decode(&mut rest, &mut decoded)?;
                pending.push_chunk(&decoded);
                decoded.clear();
                if pending.len() > config.max_body_size {
                    return Err(Error::PayloadTooLarge(config.max_body_size));
                }
                if done {
                    break;
                }
                reader.read_more(&mut rest).await?;
            }
        }
    }

    Ok(Some(pending.complete()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn config() -> ServerConfig {
        ServerConfig {
            read_buffer_size: 7,
            max_header_size: 256,
            max_body_size: 64,
            ..ServerConfig::default()
        }
    }

    async fn ingest(raw: &[u8]) -> Result<Option<HttpRequest>, Error> {
        let (mut client, mut server) = duplex(1024);
        client.write_all(raw).await.unwrap();
        client.shutdown().await.unwrap();
        read_request(&mut server, &config()).await
    }

    #[tokio::test]
    async fn test_body_spanning_many_reads() {
        let request = ingest(b"POST /echo HTTP/1.1\r\nHost: a\r\nContent-Length: 26\r\n\r\nabcdefghijklmnopqrstuvwxyz")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.body, "abcdefghijklmnopqrstuvwxyz");
    }

    #[tokio::test]
    async fn test_bytes_beyond_content_length_are_ignored() {
        let request = ingest(b"POST /echo HTTP/1.1\r\nHost: a\r\nContent-Length: 5\r\n\r\nhelloGET / HTTP/1.1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.body, "hello");
    }

    #[tokio::test]
    async fn test_chunked_body() {
        let request = ingest(b"POST /echo HTTP/1.1\r\nHost: a\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n1\r\n!\r\n0\r\n\r\n")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.body, "hello!");
    }

    #[tokio::test]
    async fn test_silent_peer() {
        assert!(ingest(b"").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_body() {
        let result = ingest(b"POST /echo HTTP/1.1\r\nHost: a\r\nContent-Length: 10\r\n\r\nhello").await;
        assert!(matches!(result, Err(Error::IncompleteRequest)));
    }

    #[tokio::test]
    async fn test_truncated_head() {
        let result = ingest(b"GET /echo HTTP/1.1\r\nHost: a\r\n").await;
        assert!(matches!(result, Err(Error::IncompleteRequest)));

        let result = ingest(b"INVALID REQUEST").await;
        assert!(matches!(result, Err(Error::ParseError(_))));
    }

    #[tokio::test]
    async fn test_head_too_large() {
        let mut raw = b"GET / HTTP/1.1\r\nHost: a\r\nX-Filler: ".to_vec();
        raw.extend(std::iter::repeat(b'x').take(400));
        let result = ingest(&raw).await;
        assert!(matches!(result, Err(Error::ParseError(ParserError::HeadTooLarge(256)))));
    }

    #[tokio::test]
    async fn test_declared_body_too_large() {
        let result = ingest(b"POST /echo HTTP/1.1\r\nHost: a\r\nContent-Length: 65\r\n\r\n").await;
        assert!(matches!(result, Err(Error::PayloadTooLarge(64))));
    }

    #[tokio::test]
    async fn test_chunked_body_too_large() {
        let mut raw = b"POST /echo HTTP/1.1\r\nHost: a\r\nTransfer-Encoding: chunked\r\n\r\n41\r\n".to_vec();
        raw.extend(std::iter::repeat(b'x').take(0x41));
        raw.extend_from_slice(b"\r\n0\r\n\r\n");
        let result = ingest(&raw).await;
        assert!(matches!(result, Err(Error::PayloadTooLarge(64))));
    }

    #[tokio::test]
    async fn test_unsupported_expectation() {
        let result = ingest(b"POST /echo HTTP/1.1\r\nHost: a\r\nExpect: meow\r\nContent-Length: 5\r\n\r\nhello").await;
        assert!(matches!(result, Err(Error::ExpectationFailed(ref v)) if v == "meow"));
    }

    #[tokio::test]
    async fn test_continue_sent_before_body() {
        let (mut client, mut server) = duplex(1024);
        let config = config();
        let server_side = tokio::spawn(async move { read_request(&mut server, &config).await });

        client
            .write_all(b"POST /echo HTTP/1.1\r\nHost: a\r\nExpect: 100-Continue\r\nContent-Length: 5\r\n\r\n")
            .await
            .unwrap();

        let mut interim = vec![0; CONTINUE.len()];
        client.read_exact(&mut interim).await.unwrap();
        assert_eq!(interim, CONTINUE);

        client.write_all(b"hello").await.unwrap();
        let request = server_side.await.unwrap().unwrap().unwrap();
        assert_eq!(request.body, "hello");
    }

    #[tokio::test]
    async fn test_continue_not_sent_to_http10() {
        let (mut client, mut server) = duplex(1024);
        let config = config();
        let server_side = tokio::spawn(async move { read_request(&mut server, &config).await });

        client
            .write_all(b"POST /echo HTTP/1.0\r\nExpect: 100-continue\r\nContent-Length: 5\r\n\r\n")
            .await
            .unwrap();
        tokio::task::yield_now().await;
        client.write_all(b"hello").await.unwrap();

        let request = server_side.await.unwrap().unwrap().unwrap();
        assert_eq!(request.body, "hello");

        // The server half is gone, so this reads everything it ever wrote
        let mut written = Vec::new();
        client.read_to_end(&mut written).await.unwrap();
        assert!(written.is_empty(), "{:?}", String::from_utf8_lossy(&written));
    }

    #[tokio::test]
    async fn test_chunks_arrive_in_order() {
        let (mut client, mut server) = duplex(1024);
        let config = config();
        let server_side = tokio::spawn(async move { read_request(&mut server, &config).await });

        client
            .write_all(b"POST /echo HTTP/1.1\r\nHost: a\r\nTransfer-Encoding: chunked\r\n\r\n")
            .await
            .unwrap();
        for part in ["3\r\none\r\n", "3\r\ntwo\r\n", "5\r\nthree\r\n", "0\r\n\r\n"] {
            tokio::task::yield_now().await;
            client.write_all(part.as_bytes()).await.unwrap();
        }

        let request = server_side.await.unwrap().unwrap().unwrap();
        assert_eq!(request.body, "onetwothree");
    }

    #[test]
    fn test_pending_request_decodes_lossily() {
        let head = parse_head(b"POST / HTTP/1.0\r\n\r\n").unwrap();
        let mut pending = PendingRequest::new(head);
        pending.push_chunk(b"caf");
        pending.push_chunk(&[0xC3]);
        pending.push_chunk(&[0xA9]);
        assert_eq!(pending.len(), 5);
        assert_eq!(pending.complete().body, "café");
    }
}
