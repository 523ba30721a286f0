//! Incremental response parser: status line, header lines, then a body
//! sized by `content-length`. There is no chunked decoding; a response
//! without a length is only accepted when the server is going to close
//! the connection, in which case the body runs to end-of-stream.

use std::mem;

use netbuf::Buf;

use crate::headers::{self, Headers};
use crate::version::Version;
use crate::wire;

use super::error::Error;
use super::response::Response;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Status,
    Headers,
    Body,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyMode {
    Length(usize),
    /// Body ends when the server closes the connection.
    Eof,
}

#[derive(Debug)]
pub struct Parser {
    max_headers_length: usize,
    max_body_length: usize,
    /// Responses to HEAD never carry a body.
    head_request: bool,
    phase: Phase,
    head_bytes: usize,
    status: u16,
    status_message: String,
    protocol: Version,
    headers: Headers,
    body_mode: BodyMode,
    body: Vec<u8>,
}

impl Parser {
    pub fn new(head_request: bool, max_headers_length: usize, max_body_length: usize)
        -> Parser
    {
        Parser {
            max_headers_length,
            max_body_length,
            head_request,
            phase: Phase::Status,
            head_bytes: 0,
            status: 0,
            status_message: String::new(),
            protocol: Version::Http10,
            headers: Headers::new(),
            body_mode: BodyMode::Length(0),
            body: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True when the body is delimited by connection close.
    pub fn body_until_eof(&self) -> bool {
        self.phase == Phase::Body && self.body_mode == BodyMode::Eof
    }

    fn take_line(&mut self, buf: &mut Buf) -> Result<Option<String>, Error> {
        match wire::find(&buf[..], b"\r\n") {
            Some(pos) => {
                let line = String::from_utf8(buf[..pos].to_vec()).map_err(|_| {
                    Error::BadResponse("header line is not valid utf-8".into())
                })?;
                buf.consume(pos + 2);
                self.head_bytes += pos + 2;
                if self.head_bytes > self.max_headers_length {
                    return Err(Error::BadResponse("response head too large".into()));
                }
                Ok(Some(line))
            }
            None => {
                if buf.len() + self.head_bytes > self.max_headers_length {
                    return Err(Error::BadResponse("response head too large".into()));
                }
                Ok(None)
            }
        }
    }

    fn parse_status_line(&mut self, line: &str) -> Result<(), Error> {
        let mut parts = line.splitn(3, ' ');
        let proto = parts.next().unwrap_or("");
        let code = parts.next().unwrap_or("");
        let message = parts.next().unwrap_or("");
        if !proto.starts_with("HTTP/") {
            return Err(Error::BadResponse(format!(
                "invalid status line: {:?}",
                line
            )));
        }
        // unknown HTTP/1.x minors behave like 1.0 (close by default)
        self.protocol = Version::from_token(proto).unwrap_or(Version::Http10);
        self.status = code.parse().map_err(|_| {
            Error::BadResponse(format!("invalid status code: {:?}", code))
        })?;
        if !(100..=599).contains(&self.status) {
            return Err(Error::BadResponse(format!(
                "status code out of range: {}",
                self.status
            )));
        }
        self.status_message = message.to_string();
        Ok(())
    }

    fn status_forbids_body(&self) -> bool {
        self.head_request
            || (100..200).contains(&self.status)
            || self.status == 204
            || self.status == 304
    }

    /// Decides how the body is delimited once the blank line arrived.
    fn finish_head(&mut self) -> Result<(), Error> {
        if self.status_forbids_body() {
            self.body_mode = BodyMode::Length(0);
            return Ok(());
        }
        match self.headers.get("content-length") {
            Some(value) => {
                let value = value.trim();
                if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::BadResponse(format!(
                        "invalid content-length: {:?}",
                        value
                    )));
                }
                let length: usize = value.parse().map_err(|_| {
                    Error::BadResponse(format!("invalid content-length: {:?}", value))
                })?;
                if length > self.max_body_length {
                    return Err(Error::ResponseTooLarge);
                }
                self.body_mode = BodyMode::Length(length);
                Ok(())
            }
            None => {
                let conn = self.headers.get("connection").unwrap_or("");
                let closes = headers::is_close(conn)
                    || (self.protocol == Version::Http10
                        && !headers::is_keep_alive(conn));
                if closes {
                    self.body_mode = BodyMode::Eof;
                    Ok(())
                } else {
                    Err(Error::BadResponse(
                        "keep-alive response without content-length".into(),
                    ))
                }
            }
        }
    }

    /// Consumes whatever `buf` allows; returns the response once it is
    /// complete.
    pub fn feed(&mut self, buf: &mut Buf) -> Result<Option<Response>, Error> {
        loop {
            match self.phase {
                Phase::Status => {
                    let line = match self.take_line(buf)? {
                        Some(line) => line,
                        None => return Ok(None),
                    };
                    // a stray empty line before the status line is
                    // tolerated the way lenient peers emit it
                    if line.is_empty() {
                        continue;
                    }
                    self.parse_status_line(&line)?;
                    self.phase = Phase::Headers;
                }
                Phase::Headers => {
                    let line = match self.take_line(buf)? {
                        Some(line) => line,
                        None => return Ok(None),
                    };
                    if line.is_empty() {
                        self.finish_head()?;
                        self.phase = Phase::Body;
                        continue;
                    }
                    let (name, value) =
                        wire::parse_header_line(&line).map_err(|err| {
                            Error::BadResponse(err.to_string())
                        })?;
                    self.headers.append(name, value);
                }
                Phase::Body => match self.body_mode {
                    BodyMode::Length(length) => {
                        let left = length - self.body.len();
                        let take = left.min(buf.len());
                        self.body.extend_from_slice(&buf[..take]);
                        buf.consume(take);
                        if self.body.len() == length {
                            self.phase = Phase::Done;
                            return Ok(Some(self.take_response(false)));
                        }
                        return Ok(None);
                    }
                    BodyMode::Eof => {
                        if self.body.len() + buf.len() > self.max_body_length {
                            return Err(Error::ResponseTooLarge);
                        }
                        self.body.extend_from_slice(&buf[..]);
                        let len = buf.len();
                        buf.consume(len);
                        return Ok(None);
                    }
                },
                Phase::Done => return Ok(None),
            }
        }
    }

    /// The peer closed the stream. Completes an end-of-stream body,
    /// anything else is a truncated response.
    pub fn on_eof(&mut self) -> Result<Option<Response>, Error> {
        match (self.phase, self.body_mode) {
            (Phase::Body, BodyMode::Eof) => {
                self.phase = Phase::Done;
                Ok(Some(self.take_response(true)))
            }
            (Phase::Done, _) => Ok(None),
            _ => Err(Error::Closed),
        }
    }

    fn take_response(&mut self, eof_body: bool) -> Response {
        Response::new(
            self.status,
            mem::take(&mut self.status_message),
            self.protocol,
            mem::take(&mut self.headers),
            mem::take(&mut self.body),
            eof_body,
        )
    }
}

#[cfg(test)]
mod test {
    use netbuf::Buf;

    use super::{Parser, Phase};
    use crate::client::error::Error;
    use crate::version::Version;

    fn parser() -> Parser {
        Parser::new(false, 4096, 1024 * 1024)
    }

    fn feed_ok(parser: &mut Parser, buf: &mut Buf, bytes: &[u8])
        -> Option<crate::client::Response>
    {
        buf.extend(bytes);
        parser.feed(buf).unwrap()
    }

    #[test]
    fn simple_response() {
        let mut p = parser();
        let mut buf = Buf::new();
        let response = feed_ok(
            &mut p,
            &mut buf,
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\
              Content-Length: 5\r\n\r\nhello",
        )
        .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.status_message(), "OK");
        assert_eq!(response.protocol(), Version::Http11);
        assert_eq!(response.body(), b"hello");
        assert_eq!(response.content_length(), Some(5));
    }

    #[test]
    fn split_across_reads() {
        let mut p = parser();
        let mut buf = Buf::new();
        assert!(feed_ok(&mut p, &mut buf, b"HTTP/1.1 404 Not ").is_none());
        assert_eq!(p.phase(), Phase::Status);
        assert!(feed_ok(&mut p, &mut buf, b"Found\r\nContent-Le").is_none());
        assert_eq!(p.phase(), Phase::Headers);
        let response =
            feed_ok(&mut p, &mut buf, b"ngth: 2\r\n\r\nno").unwrap();
        assert_eq!(response.status(), 404);
        assert_eq!(response.status_message(), "Not Found");
        assert_eq!(response.body(), b"no");
    }

    #[test]
    fn status_without_message() {
        let mut p = parser();
        let mut buf = Buf::new();
        let response = feed_ok(
            &mut p,
            &mut buf,
            b"HTTP/1.1 204\r\n\r\n",
        )
        .unwrap();
        assert_eq!(response.status(), 204);
        assert_eq!(response.status_message(), "");
        assert_eq!(response.body(), b"");
    }

    #[test]
    fn no_body_statuses_ignore_length() {
        let mut p = parser();
        let mut buf = Buf::new();
        let response = feed_ok(
            &mut p,
            &mut buf,
            b"HTTP/1.1 304 Not Modified\r\nContent-Length: 100\r\n\r\n",
        )
        .unwrap();
        assert_eq!(response.status(), 304);
        assert_eq!(response.body(), b"");
    }

    #[test]
    fn head_request_has_no_body() {
        let mut p = Parser::new(true, 4096, 1024);
        let mut buf = Buf::new();
        let response = feed_ok(
            &mut p,
            &mut buf,
            b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n",
        )
        .unwrap();
        assert_eq!(response.body(), b"");
    }

    #[test]
    fn eof_body_on_closing_response() {
        let mut p = parser();
        let mut buf = Buf::new();
        assert!(feed_ok(
            &mut p,
            &mut buf,
            b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\npartial",
        )
        .is_none());
        assert!(p.body_until_eof());
        assert!(feed_ok(&mut p, &mut buf, b" rest").is_none());
        let response = p.on_eof().unwrap().unwrap();
        assert_eq!(response.body(), b"partial rest");
        assert!(response.eof_body);
    }

    #[test]
    fn keep_alive_without_length_is_error() {
        let mut p = parser();
        let mut buf = Buf::new();
        buf.extend(b"HTTP/1.1 200 OK\r\n\r\nbody");
        let err = p.feed(&mut buf).unwrap_err();
        assert!(matches!(err, Error::BadResponse(_)));
    }

    #[test]
    fn http10_without_length_runs_to_eof() {
        let mut p = parser();
        let mut buf = Buf::new();
        assert!(feed_ok(&mut p, &mut buf, b"HTTP/1.0 200 OK\r\n\r\nold").is_none());
        assert!(p.body_until_eof());
    }

    #[test]
    fn truncated_sized_body_is_error() {
        let mut p = parser();
        let mut buf = Buf::new();
        assert!(feed_ok(
            &mut p,
            &mut buf,
            b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc",
        )
        .is_none());
        assert!(matches!(p.on_eof().unwrap_err(), Error::Closed));
    }

    #[test]
    fn oversized_declared_body_is_refused() {
        let mut p = Parser::new(false, 4096, 16);
        let mut buf = Buf::new();
        buf.extend(b"HTTP/1.1 200 OK\r\nContent-Length: 17\r\n\r\n");
        assert!(matches!(
            p.feed(&mut buf).unwrap_err(),
            Error::ResponseTooLarge
        ));
    }

    #[test]
    fn garbage_status_line() {
        let mut p = parser();
        let mut buf = Buf::new();
        buf.extend(b"SMTP ready\r\n\r\n");
        assert!(matches!(p.feed(&mut buf).unwrap_err(), Error::BadResponse(_)));
    }

    #[test]
    fn set_cookie_headers_kept_separately() {
        let mut p = parser();
        let mut buf = Buf::new();
        let response = feed_ok(
            &mut p,
            &mut buf,
            b"HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\n\
              Content-Length: 0\r\n\r\n",
        )
        .unwrap();
        let cookies: Vec<&str> = response.headers().get_all("set-cookie").collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
    }
}
