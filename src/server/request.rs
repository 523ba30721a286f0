use std::net::SocketAddr;

use crate::headers::{Cookies, Headers};
use crate::version::{Method, Version};
use crate::wire::{self, Query};

/// A fully framed request as handed to the application.
///
/// Built incrementally by the parser; once surfaced, headers and body
/// are immutable and `body.len()` equals the declared content length.
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) protocol: Version,
    pub(crate) path: String,
    pub(crate) query: Query,
    pub(crate) headers: Headers,
    pub(crate) cookies: Cookies,
    pub(crate) body: Vec<u8>,
    pub(crate) content_length: usize,
    pub(crate) peer_addr: SocketAddr,
    pub(crate) secure: bool,
}

impl Request {
    pub fn method(&self) -> Method {
        self.method
    }

    /// The request target exactly as it appeared on the request line.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn protocol(&self) -> Version {
        self.protocol
    }

    /// Percent-decoded path portion of the url.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn cookies(&self) -> &Cookies {
        &self.cookies
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn content_length(&self) -> usize {
        self.content_length
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn host(&self) -> &str {
        self.headers.get("host").unwrap_or("")
    }

    pub fn content_type(&self) -> &str {
        self.headers.get("content-type").unwrap_or("")
    }

    /// Decodes the body as JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Decodes an `application/x-www-form-urlencoded` body.
    pub fn form(&self) -> Result<Query, wire::WireError> {
        let mut query = Query::new();
        wire::parse_query(&self.body, &mut query)?;
        Ok(query)
    }
}
