//! Incremental request parser: feed the inbound buffer, get complete
//! requests out. Framing first locates the end of the head, the head is
//! then parsed in one go and the body is drained byte-counted. Anything
//! past the body stays in the buffer for the next pipelined request.

use std::cmp::min;
use std::mem;
use std::net::SocketAddr;
use std::str::from_utf8;

use netbuf::Buf;

use super::error::RequestError;
use super::request::Request;
use crate::headers::{self, Cookies, Headers};
use crate::version::{Method, Version};
use crate::wire;

/// Note httparse requires we preallocate an array of this size, so be
/// wise. With a 4 KiB default head limit this is plenty.
pub const MAX_HEADERS_NUM: usize = 64;

/// Parser limits, copied from the server configuration.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Bytes from the request line through the blank line.
    pub max_headers_length: usize,
    /// Body bytes.
    pub max_content_length: usize,
    /// Accept bare-LF line endings in the head.
    pub lenient_eol: bool,
}

#[derive(Debug)]
enum Phase {
    ReadHeaders,
    ReadBody { request: Request, left: usize },
}

#[derive(Debug)]
pub struct Parser {
    limits: Limits,
    phase: Phase,
}

impl Parser {
    pub fn new(limits: Limits) -> Parser {
        Parser {
            limits,
            phase: Phase::ReadHeaders,
        }
    }

    /// True while no byte of the current request has been consumed.
    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::ReadHeaders)
    }

    /// Drops any partial state, ready for the next request.
    pub fn reset(&mut self) {
        self.phase = Phase::ReadHeaders;
    }

    /// Consumes as much of `buf` as the current phase allows. Returns a
    /// request once it is fully framed. Errors are fatal for the
    /// connection: the caller answers with the canned response and
    /// closes.
    pub fn feed(
        &mut self,
        buf: &mut Buf,
        peer_addr: SocketAddr,
        secure: bool,
    ) -> Result<Option<Request>, RequestError> {
        loop {
            match mem::replace(&mut self.phase, Phase::ReadHeaders) {
                Phase::ReadHeaders => {
                    let end =
                        match wire::find_head_end(&buf[..], self.limits.lenient_eol) {
                            Some(end) => end,
                            None => {
                                if buf.len() > self.limits.max_headers_length {
                                    return Err(RequestError::HeadersTooLarge);
                                }
                                return Ok(None);
                            }
                        };
                    if end > self.limits.max_headers_length {
                        return Err(RequestError::HeadersTooLarge);
                    }
                    let (request, content_length) = parse_head(
                        &buf[..end],
                        &self.limits,
                        peer_addr,
                        secure,
                    )?;
                    buf.consume(end);
                    if content_length == 0 {
                        return Ok(Some(request));
                    }
                    self.phase = Phase::ReadBody {
                        request,
                        left: content_length,
                    };
                }
                Phase::ReadBody { mut request, left } => {
                    let take = min(left, buf.len());
                    request.body.extend_from_slice(&buf[..take]);
                    buf.consume(take);
                    if left == take {
                        return Ok(Some(request));
                    }
                    self.phase = Phase::ReadBody {
                        request,
                        left: left - take,
                    };
                    return Ok(None);
                }
            }
        }
    }
}

/// Determines the body length while enforcing the anti-smuggling rules:
/// any `Transfer-Encoding` other than `identity` is refused outright,
/// and several `Content-Length` headers are only accepted when they are
/// byte-identical.
fn scan_body_length(
    headers: &Headers,
    limits: &Limits,
) -> Result<usize, RequestError> {
    for value in headers.get_all("transfer-encoding") {
        if !headers::is_identity(value) {
            return Err(RequestError::ForbiddenTransferEncoding);
        }
    }
    let mut lengths = headers.get_all("content-length");
    let first = match lengths.next() {
        Some(first) => first,
        None => return Ok(0),
    };
    if lengths.any(|other| other != first) {
        return Err(RequestError::ConflictingContentLength);
    }
    if first.is_empty() || !first.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RequestError::BadContentLength);
    }
    let length: u64 = first
        .parse()
        .map_err(|_| RequestError::BadContentLength)?;
    if length > limits.max_content_length as u64 {
        return Err(RequestError::PayloadTooLarge);
    }
    Ok(length as usize)
}

fn parse_head(
    head: &[u8],
    limits: &Limits,
    peer_addr: SocketAddr,
    secure: bool,
) -> Result<(Request, usize), RequestError> {
    if !limits.lenient_eol && wire::has_bare_lf(head) {
        return Err(RequestError::BadRequest("bare LF in request head"));
    }
    let mut header_buf = [httparse::EMPTY_HEADER; MAX_HEADERS_NUM];
    let mut raw = httparse::Request::new(&mut header_buf);
    let (method_token, url, version) = match raw.parse(head) {
        Ok(httparse::Status::Complete(parsed)) if parsed == head.len() => {
            let method = raw
                .method
                .ok_or(RequestError::BadRequest("missing method"))?;
            let url = raw
                .path
                .ok_or(RequestError::BadRequest("missing url"))?;
            let version = match raw.version {
                Some(1) => Version::Http11,
                Some(_) => Version::Http10,
                None => return Err(RequestError::UnsupportedProtocol),
            };
            (method, url, version)
        }
        Ok(_) => return Err(RequestError::BadRequest("truncated request head")),
        Err(httparse::Error::Version) => {
            return Err(RequestError::UnsupportedProtocol)
        }
        Err(httparse::Error::TooManyHeaders) => {
            return Err(RequestError::HeadersTooLarge)
        }
        Err(_) => return Err(RequestError::BadRequest("invalid request head")),
    };
    let method = Method::from_token(method_token)
        .ok_or(RequestError::UnsupportedMethod)?;

    let mut request_headers = Headers::new();
    for header in raw.headers.iter() {
        let value = from_utf8(header.value)
            .ok()
            .filter(|v| v.is_ascii())
            .ok_or(RequestError::BadRequest("header value must be ascii"))?;
        request_headers.append(header.name, value.trim());
    }

    let content_length = scan_body_length(&request_headers, limits)?;
    if version == Version::Http11 && !request_headers.contains("host") {
        return Err(RequestError::MissingHost);
    }

    let (path, query) = wire::parse_url(url.as_bytes())?;
    let mut cookies = Cookies::new();
    for value in request_headers.get_all("cookie") {
        wire::parse_cookies(value, &mut cookies);
    }

    let request = Request {
        method,
        url: url.to_string(),
        protocol: version,
        path,
        query,
        headers: request_headers,
        cookies,
        body: Vec::with_capacity(content_length),
        content_length,
        peer_addr,
        secure,
    };
    Ok((request, content_length))
}
