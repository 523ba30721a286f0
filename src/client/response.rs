use std::cell::OnceCell;

use crate::headers::Headers;
use crate::version::Version;

use super::error::Error;

/// A complete response as returned by the client.
#[derive(Debug)]
pub struct Response {
    pub(crate) status: u16,
    pub(crate) status_message: String,
    pub(crate) protocol: Version,
    pub(crate) headers: Headers,
    pub(crate) body: Vec<u8>,
    /// The body ran to end-of-stream instead of a declared length.
    pub(crate) eof_body: bool,
    json: OnceCell<serde_json::Value>,
}

impl Response {
    pub(crate) fn new(
        status: u16,
        status_message: String,
        protocol: Version,
        headers: Headers,
        body: Vec<u8>,
        eof_body: bool,
    ) -> Response {
        Response {
            status,
            status_message,
            protocol,
            headers,
            body,
            eof_body,
            json: OnceCell::new(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn protocol(&self) -> Version {
        self.protocol
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn content_type(&self) -> &str {
        self.headers.get("content-type").unwrap_or("")
    }

    pub fn content_length(&self) -> Option<usize> {
        self.headers
            .get("content-length")
            .and_then(|v| v.parse().ok())
    }

    /// Decodes the body as JSON, memoized on first use.
    pub fn json(&self) -> Result<&serde_json::Value, Error> {
        if let Some(value) = self.json.get() {
            return Ok(value);
        }
        let value: serde_json::Value = serde_json::from_slice(&self.body)?;
        Ok(self.json.get_or_init(|| value))
    }
}
