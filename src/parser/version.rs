//! Protocol versions accepted on the request line.

use std::fmt;
use std::str::FromStr;

use crate::parser::error::Error;

/// The HTTP/1.x versions a request may declare.
///
/// Anything else, `HTTP/2` included, is an invalid version: HTTP/2 never
/// arrives as a text request line, so seeing it here means a confused client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    /// The version as written on the request line.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVersion::Http10 => "HTTP/1.0",
            HttpVersion::Http11 => "HTTP/1.1",
        }
    }

    /// HTTP/1.1 requests must carry a `Host` header.
    pub fn requires_host(self) -> bool {
        self == HttpVersion::Http11
    }

    /// Whether a `100 Continue` interim response may be sent.
    pub fn accepts_interim_responses(self) -> bool {
        self == HttpVersion::Http11
    }
}

impl FromStr for HttpVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [HttpVersion::Http10, HttpVersion::Http11]
            .into_iter()
            .find(|version| version.as_str() == s)
            .ok_or_else(|| Error::InvalidVersion(s.to_string()))
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
