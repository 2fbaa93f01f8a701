//! HTTP request parsing and representation.

use std::collections::HashMap;
use std::str::FromStr;
use serde::de::DeserializeOwned;

use crate::parser::chunked::ChunkedDecoder;
use crate::parser::error::Error;
use crate::parser::method::Method;
use crate::parser::version::HttpVersion;

/// The request line and headers of a request, before its body is read.
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// The method token exactly as received
    pub method: String,
    /// The request target exactly as received
    pub target: String,
    /// The HTTP version
    pub version: HttpVersion,
    /// The HTTP headers, keyed by lowercase name
    pub headers: HashMap<String, String>,
}

/// How the body of a request is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    /// The request carries no body.
    Empty,
    /// The body is exactly this many bytes.
    Length(usize),
    /// The body uses chunked transfer coding.
    Chunked,
}

impl RequestHead {
    /// Get a header value (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers.get(&name.to_ascii_lowercase())
    }

    /// Determine the body framing declared by the headers.
    ///
    /// Sending both `Content-Length` and `Transfer-Encoding` is rejected rather
    /// than resolved, since the two framings can disagree about where the
    /// request ends.
    pub fn body_length(&self) -> Result<BodyLength, Error> {
        let transfer_encoding = self.get_header("transfer-encoding");
        let content_length = self.get_header("content-length");

        match (transfer_encoding, content_length) {
            (Some(_), Some(_)) => Err(Error::AmbiguousBodyLength),
            (Some(coding), None) => {
                if coding.trim().eq_ignore_ascii_case("chunked") {
                    Ok(BodyLength::Chunked)
                } else {
                    Err(Error::UnsupportedTransferEncoding(coding.clone()))
                }
            }
            (None, Some(length)) => match parse_content_length(length)? {
                0 => Ok(BodyLength::Empty),
                n => Ok(BodyLength::Length(n)),
            },
            (None, None) => Ok(BodyLength::Empty),
        }
    }
}

fn parse_content_length(value: &str) -> Result<usize, Error> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidContentLength(value.to_string()));
    }
    value
        .parse()
        .map_err(|_| Error::InvalidContentLength(value.to_string()))
}

/// Represents a complete HTTP request, body included.
///
/// This is the view handed to route handlers. The method is kept in the
/// textual form the client sent so that responses can echo it verbatim.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The method token exactly as received (GET, POST, etc.)
    pub method: String,
    /// The path component of the target, without query string or fragment
    pub path: String,
    /// The request target exactly as received
    pub raw_target: String,
    /// The HTTP version
    pub version: HttpVersion,
    /// The HTTP headers, keyed by lowercase name
    pub headers: HashMap<String, String>,
    /// The request body, decoded as UTF-8
    pub body: String,
    /// Query parameters parsed from the target
    pub query_params: HashMap<String, String>,
}

impl HttpRequest {
    /// Create a new HTTP request.
    ///
    /// # Arguments
    ///
    /// * `method` - The method token
    /// * `target` - The raw request target
    /// * `version` - The HTTP version
    /// * `headers` - The HTTP headers
    ///
    /// # Returns
    ///
    /// A new HTTP request with an empty body
    pub fn new(
        method: impl Into<String>,
        target: impl Into<String>,
        version: HttpVersion,
        headers: HashMap<String, String>,
    ) -> Self {
        let raw_target = target.into();
        let (path, query) = split_target(&raw_target);
        let query_params = parse_query(query);

        Self {
            method: method.into(),
            path: path.to_string(),
            raw_target,
            version,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
            body: String::new(),
            query_params,
        }
    }

    /// Create a new HTTP request with a body.
    pub fn with_body(
        method: impl Into<String>,
        target: impl Into<String>,
        version: HttpVersion,
        headers: HashMap<String, String>,
        body: impl Into<String>,
    ) -> Self {
        let mut request = Self::new(method, target, version, headers);
        request.body = body.into();
        request
    }

    /// Build a request from a parsed head and its buffered body bytes.
    ///
    /// Invalid UTF-8 sequences in the body are replaced with U+FFFD.
    pub fn from_head(head: RequestHead, body: &[u8]) -> Self {
        let RequestHead {
            method,
            target,
            version,
            headers,
        } = head;
        Self::with_body(
            method,
            target,
            version,
            headers,
            String::from_utf8_lossy(body).into_owned(),
        )
    }

    /// Classify the method against the routable set.
    pub fn routable_method(&self) -> Result<Method, Error> {
        Method::from_str(&self.method)
    }

    /// Get a header value (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers.get(&name.to_ascii_lowercase())
    }

    /// Check if a header exists (case-insensitive).
    pub fn has_header(&self, name: &str) -> bool {
        self.get_header(name).is_some()
    }

    /// Parse the request body as JSON.
    ///
    /// # Returns
    ///
    /// The parsed JSON value, or an error if the body is not valid JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if !self.is_json() {
            return Err(Error::MissingHeader("Content-Type: application/json".to_string()));
        }

        let json = serde_json::from_str(&self.body)?;
        Ok(json)
    }

    /// Check if the Content-Type header is application/json.
    pub fn is_json(&self) -> bool {
        self.get_header("Content-Type")
            .is_some_and(|content_type| content_type.starts_with("application/json"))
    }

    /// Get a query parameter value.
    pub fn get_query_param(&self, name: &str) -> Option<&String> {
        self.query_params.get(name)
    }

    /// Check if a query parameter exists.
    pub fn has_query_param(&self, name: &str) -> bool {
        self.query_params.contains_key(name)
    }
}

/// Split a request target into its path and query components.
///
/// The fragment is dropped. Absolute-form targets (`http://host/path`) are
/// reduced to their path.
fn split_target(target: &str) -> (&str, &str) {
    let origin = match target
        .strip_prefix("http://")
        .or_else(|| target.strip_prefix("https://"))
    {
        Some(rest) => rest.find('/').map_or("/", |i| &rest[i..]),
        None => target,
    };

    let without_fragment = origin.split_once('#').map_or(origin, |(before, _)| before);
    match without_fragment.split_once('?') {
        Some((path, query)) => (path, query),
        None => (without_fragment, ""),
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Returns true if `s` matches the RFC 9110 `token` grammar.
pub(crate) fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^'
                        | b'_' | b'`' | b'|' | b'~'
                )
        })
}

fn is_valid_target(target: &str) -> bool {
    let well_formed = target.starts_with('/')
        || target == "*"
        || target.starts_with("http://")
        || target.starts_with("https://");
    well_formed && !target.bytes().any(|b| b.is_ascii_control())
}

/// Locate the end of the request head.
///
/// # Returns
///
/// The offset just past the blank line that terminates the head, or `None` if
/// the head is not complete yet.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4);
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| i + 2);
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Parse the request line and headers of an HTTP request.
///
/// Anything after the blank line that ends the head is ignored.
///
/// # Arguments
///
/// * `input` - The bytes of the request head
///
/// # Returns
///
/// The parsed request head, or an error if the head is malformed
pub fn parse_head(input: &[u8]) -> Result<RequestHead, Error> {
    if input.is_empty() {
        return Err(Error::EmptyRequest);
    }

    // The request line must be UTF-8; header values may carry obs-text
    let line_end = input.iter().position(|&b| b == b'\n').unwrap_or(input.len());
    let request_line = match std::str::from_utf8(&input[..line_end]) {
        Ok(line) => line.strip_suffix('\r').unwrap_or(line),
        Err(_) => return Err(Error::MalformedRequestLine("Invalid UTF-8".to_string())),
    };
    if request_line.is_empty() {
        return Err(Error::EmptyRequest);
    }

    let header_block = String::from_utf8_lossy(input.get(line_end + 1..).unwrap_or_default());
    let lines = header_block.lines();

    let parts: Vec<&str> = request_line.split(' ').collect();
    if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
        return Err(Error::MalformedRequestLine(request_line.to_string()));
    }

    // Unknown methods survive parsing; only the token grammar is enforced here
    if !is_token(parts[0]) {
        return Err(Error::MalformedRequestLine(request_line.to_string()));
    }
    let method = parts[0].to_string();

    let target = parts[1].to_string();
    if !is_valid_target(&target) {
        return Err(Error::InvalidPath(target));
    }

    let version = HttpVersion::from_str(parts[2])?;

    // Parse the headers
    let mut headers: HashMap<String, String> = HashMap::new();
    for line in lines {
        // Empty line indicates the end of headers
        if line.is_empty() {
            break;
        }

        // Obsolete line folding is not supported
        if line.starts_with(' ') || line.starts_with('\t') {
            return Err(Error::InvalidHeaderFormat(line.to_string()));
        }

        let (name, value) = match line.split_once(':') {
            Some(pair) => pair,
            None => return Err(Error::InvalidHeaderFormat(line.to_string())),
        };
        if !is_token(name) {
            return Err(Error::InvalidHeaderFormat(line.to_string()));
        }

        let name = name.to_ascii_lowercase();
        let value = value.trim().to_string();

        if name == "content-length" {
            if let Some(existing) = headers.get(&name) {
                if *existing != value {
                    return Err(Error::InvalidContentLength(format!("{existing}, {value}")));
                }
            }
        }

        headers.insert(name, value);
    }

    // Host is only required for HTTP/1.1
    if version.requires_host() && !headers.contains_key("host") {
        return Err(Error::MissingHeader("Host".to_string()));
    }

    Ok(RequestHead {
        method,
        target,
        version,
        headers,
    })
}

/// Parse a complete HTTP request, body included, from a byte slice.
///
/// # Arguments
///
/// * `input` - A byte slice containing the whole request
///
/// # Returns
///
/// The parsed HTTP request, or an error if the request is invalid or its body
/// is shorter than declared
pub fn parse_request(input: &[u8]) -> Result<HttpRequest, Error> {
    let head_end = find_head_end(input).unwrap_or(input.len());
    let head = parse_head(&input[..head_end])?;
    let rest = &input[head_end..];

    let body = match head.body_length()? {
        BodyLength::Empty => Vec::new(),
        BodyLength::Length(expected) => {
            if rest.len() < expected {
                return Err(Error::IncompleteBody {
                    expected,
                    actual: rest.len(),
                });
            }
            rest[..expected].to_vec()
        }
        BodyLength::Chunked => {
            let mut pending = rest.to_vec();
            let mut body = Vec::new();
            let mut decoder = ChunkedDecoder::new();
            if !decoder.decode(&mut pending, &mut body)? {
                return Err(Error::InvalidChunk("unterminated chunked body".to_string()));
            }
            body
        }
    };

    Ok(HttpRequest::from_head(head, &body))
}
