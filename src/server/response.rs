//! Response building and serialization. A `Response` is a plain value
//! describing status, headers, cookies and the typed body; the
//! connection turns it into bytes in its outbound buffer.

use std::io::Write;

use netbuf::Buf;

use crate::headers::{canonical_name as canonical, Cookies, Headers};
use crate::status::status_message;
use crate::wire::{encode_body, Body};

use super::error::RespondError;

/// Boundary used for `multipart/x-mixed-replace` streams.
pub const MULTIPART_BOUNDARY: &str = "frame";

/// Redirect statuses a caller may override the default 302 with.
const REDIRECT_STATUSES: &[u16] = &[301, 303, 307, 308];

#[derive(Debug, Clone)]
pub struct Response {
    pub(crate) status: u16,
    pub(crate) headers: Headers,
    pub(crate) cookies: Cookies,
    pub(crate) body: Body,
}

impl Response {
    pub fn new(status: u16) -> Response {
        Response {
            status,
            headers: Headers::new(),
            cookies: Cookies::new(),
            body: Body::Empty,
        }
    }

    pub fn ok() -> Response {
        Response::new(200)
    }

    /// A redirect to `url` with status 302.
    pub fn redirect(url: &str) -> Response {
        Response::new(302).header("location", url)
    }

    /// A redirect with an explicit status; anything outside
    /// 301/303/307/308 falls back to 302.
    pub fn redirect_with_status(url: &str, status: u16) -> Response {
        let status = if REDIRECT_STATUSES.contains(&status) {
            status
        } else {
            302
        };
        Response::new(status).header("location", url)
    }

    pub fn body<B: Into<Body>>(mut self, body: B) -> Response {
        self.body = body.into();
        self
    }

    pub fn header<V: Into<String>>(mut self, name: &str, value: V) -> Response {
        self.headers.insert(name, value);
        self
    }

    pub fn cookie<N, V>(mut self, name: N, value: V) -> Response
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.cookies.insert(name, value);
        self
    }
}

fn put(out: &mut Buf, data: &[u8]) {
    // writing into a memory buffer cannot fail
    let _ = out.write_all(data);
}

/// Serializes the status line, headers and `set-cookie` lines including
/// the terminating blank line.
pub(crate) fn write_head(
    out: &mut Buf,
    status: u16,
    headers: &Headers,
    cookies: &Cookies,
) {
    put(
        out,
        format!("HTTP/1.1 {} {}\r\n", status, status_message(status)).as_bytes(),
    );
    for (name, value) in headers {
        put(out, format!("{}: {}\r\n", canonical(name), value).as_bytes());
    }
    for (name, value) in cookies.iter() {
        put(out, format!("Set-Cookie: {}={}\r\n", name, value).as_bytes());
    }
    put(out, b"\r\n");
}

/// Serializes a complete plain response. `content-length` is always
/// emitted from the encoded body; the keep-alive decision becomes the
/// `connection` header unless the caller already set one.
pub(crate) fn encode_response(
    out: &mut Buf,
    response: &Response,
    keep_alive: bool,
) -> Result<(), RespondError> {
    let mut headers = response.headers.clone();
    let body = encode_body(&response.body, &mut headers)?;
    headers.insert("content-length", body.len().to_string());
    if !headers.contains("connection") {
        headers.insert(
            "connection",
            if keep_alive { "keep-alive" } else { "close" },
        );
    }
    write_head(out, response.status, &headers, &response.cookies);
    put(out, &body);
    Ok(())
}

/// Head of a file-streaming response; the body follows in chunks read
/// straight from the file handle.
pub(crate) fn encode_file_head(
    out: &mut Buf,
    file_size: u64,
    content_type: &str,
    extra: &Headers,
    keep_alive: bool,
) {
    let mut headers = extra.clone();
    if !headers.contains("content-type") {
        headers.insert("content-type", content_type);
    }
    headers.insert("content-length", file_size.to_string());
    if !headers.contains("connection") {
        headers.insert(
            "connection",
            if keep_alive { "keep-alive" } else { "close" },
        );
    }
    write_head(out, 200, &headers, &Cookies::new());
}

/// Head of a `multipart/x-mixed-replace` stream. Multipart responses
/// never recycle the connection, so the head pins `connection: close`.
pub(crate) fn encode_multipart_head(out: &mut Buf, extra: &Headers) {
    let mut headers = extra.clone();
    if !headers.contains("content-type") {
        headers.insert(
            "content-type",
            format!(
                "multipart/x-mixed-replace; boundary={}",
                MULTIPART_BOUNDARY
            ),
        );
    }
    headers.insert("connection", "close");
    write_head(out, 200, &headers, &Cookies::new());
}

/// One multipart frame: boundary line, part headers (content type and
/// length derived from the payload), blank line, payload.
pub(crate) fn encode_multipart_frame(
    out: &mut Buf,
    body: &Body,
    extra: &Headers,
) -> Result<(), RespondError> {
    let mut headers = extra.clone();
    let payload = encode_body(body, &mut headers)?;
    headers.insert("content-length", payload.len().to_string());
    put(out, format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    for (name, value) in &headers {
        put(out, format!("{}: {}\r\n", canonical(name), value).as_bytes());
    }
    put(out, b"\r\n");
    put(out, &payload);
    put(out, b"\r\n");
    Ok(())
}

pub(crate) fn encode_multipart_end(out: &mut Buf) {
    put(out, format!("--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
}

/// Content type by file extension, `application/octet-stream` when the
/// extension is unknown.
pub(crate) fn mime_by_extension(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit('/')
        .next()
        .and_then(|base| base.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}
