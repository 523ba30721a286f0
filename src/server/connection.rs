//! Per-connection lifecycle: reading, dispatching, writing, keep-alive
//! idling and closing. The connection owns its two byte buffers and the
//! optional file handle of a streaming response; all socket I/O happens
//! here, driven by the readiness events the server dispatches.

use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use log::debug;
use mio::Token;
use netbuf::Buf;

use crate::deadline::Deadline;
use crate::headers::{self, Headers};
use crate::stream::Stream;
use crate::version::Version;
use crate::wire::Body;

use super::error::{HttpError, RequestError, RespondError};
use super::parser::{Limits, Parser};
use super::request::Request;
use super::response::{self, Response};

/// Bytes read from the socket per `read()` call.
const READ_CHUNK: usize = 4096;

/// Keep-alive and buffering policy, copied out of the server
/// configuration when the connection is accepted.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Policy {
    pub keep_alive_timeout: Duration,
    pub keep_alive_max_requests: usize,
    pub file_chunk_size: usize,
    pub max_buffered_output: usize,
    /// Inbound buffering pauses beyond this (head limit + body limit).
    pub max_inbound: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    ReadHeaders,
    ReadBody,
    Dispatch,
    Writing,
    Idle,
    Closing,
}

pub struct Connection {
    token: Token,
    stream: Box<dyn Stream>,
    peer_addr: SocketAddr,
    inbound: Buf,
    outbound: Buf,
    parser: Parser,
    request: Option<Request>,
    claimed: bool,
    state: State,
    closed: bool,
    /// Reads stopped at the inbound cap; the kernel may still hold data
    /// that will not produce another readiness event.
    read_paused: bool,
    requests_count: usize,
    idle_deadline: Deadline,
    policy: Policy,
    response_keep_alive: bool,
    multipart: bool,
    file: Option<fs::File>,
}

impl Connection {
    pub(crate) fn new(
        token: Token,
        stream: Box<dyn Stream>,
        peer_addr: SocketAddr,
        limits: Limits,
        policy: Policy,
    ) -> Connection {
        Connection {
            token,
            stream,
            peer_addr,
            inbound: Buf::new(),
            outbound: Buf::new(),
            parser: Parser::new(limits),
            request: None,
            claimed: false,
            state: State::ReadHeaders,
            closed: false,
            read_paused: false,
            requests_count: 0,
            idle_deadline: Deadline::after(policy.keep_alive_timeout),
            policy,
            response_keep_alive: false,
            multipart: false,
            file: None,
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_secure(&self) -> bool {
        self.stream.is_secure()
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The request currently awaiting a response, if any.
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn requests_count(&self) -> usize {
        self.requests_count
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn stream_mut(&mut self) -> &mut Box<dyn Stream> {
        &mut self.stream
    }

    pub(crate) fn has_pending_output(&self) -> bool {
        !self.closed && (self.outbound.len() > 0 || self.file.is_some())
    }

    pub(crate) fn has_unclaimed_request(&self) -> bool {
        self.state == State::Dispatch && self.request.is_some() && !self.claimed
    }

    pub(crate) fn claim(&mut self) {
        self.claimed = true;
    }

    pub(crate) fn read_paused(&self) -> bool {
        !self.closed && self.read_paused
    }

    pub(crate) fn idle_expired(&self) -> bool {
        !self.closed
            && matches!(
                self.state,
                State::ReadHeaders | State::ReadBody | State::Idle
            )
            && self.idle_deadline.expired()
    }

    fn touch(&mut self) {
        self.idle_deadline = Deadline::after(self.policy.keep_alive_timeout);
    }

    /// Idempotent teardown. The socket itself is released when the
    /// server sweeps the connection out of its table.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        debug!("closing connection from {}", self.peer_addr);
        self.file = None;
        self.closed = true;
        self.state = State::Closing;
    }

    /// Readable event: drain the socket into the inbound buffer, then
    /// let the parser make what progress it can. Returns true when a
    /// complete request became available.
    pub(crate) fn event_read(&mut self) -> bool {
        if self.closed {
            return false;
        }
        loop {
            if self.inbound.len() >= self.policy.max_inbound {
                self.read_paused = true;
                break;
            }
            let mut chunk = [0u8; READ_CHUNK];
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    self.close();
                    return false;
                }
                Ok(n) => {
                    self.inbound.extend(&chunk[..n]);
                    self.touch();
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    self.read_paused = false;
                    break;
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("read error from {}: {}", self.peer_addr, e);
                    self.close();
                    return false;
                }
            }
        }
        self.try_parse()
    }

    /// Parses buffered bytes when the connection is in a reading state
    /// and no request is waiting for its response.
    pub(crate) fn try_parse(&mut self) -> bool {
        if self.closed || self.request.is_some() {
            return false;
        }
        if !matches!(
            self.state,
            State::ReadHeaders | State::ReadBody | State::Idle
        ) {
            return false;
        }
        if self.inbound.len() == 0 && self.parser.is_idle() {
            return false;
        }
        let secure = self.stream.is_secure();
        match self.parser.feed(&mut self.inbound, self.peer_addr, secure) {
            Ok(Some(request)) => {
                self.requests_count += 1;
                self.request = Some(request);
                self.claimed = false;
                self.state = State::Dispatch;
                self.touch();
                true
            }
            Ok(None) => {
                self.state = if self.parser.is_idle() {
                    State::ReadHeaders
                } else {
                    State::ReadBody
                };
                false
            }
            Err(err) => {
                debug!("request error from {}: {}", self.peer_addr, err);
                self.emit_error(&err);
                false
            }
        }
    }

    /// Writable event: drain the outbound buffer.
    pub(crate) fn event_write(&mut self) {
        self.try_send();
    }

    /// Pushes buffered bytes (and further file chunks) to the socket
    /// until it would block. Once everything is out, the response turn
    /// is finalized.
    pub(crate) fn try_send(&mut self) {
        if self.closed {
            return;
        }
        loop {
            if self.file.is_some() && self.outbound.len() < self.policy.file_chunk_size
            {
                let mut chunk = vec![0u8; self.policy.file_chunk_size];
                // file handle is present, checked above
                let res = self.file.as_mut().map(|f| f.read(&mut chunk));
                match res {
                    Some(Ok(0)) => {
                        self.file = None;
                    }
                    Some(Ok(n)) => {
                        self.outbound.extend(&chunk[..n]);
                    }
                    Some(Err(e)) => {
                        debug!("file read error: {}", e);
                        self.close();
                        return;
                    }
                    None => {}
                }
            }
            if self.outbound.len() == 0 {
                if self.file.is_some() {
                    continue;
                }
                break;
            }
            match self.stream.write(&self.outbound[..]) {
                Ok(0) => {
                    self.close();
                    return;
                }
                Ok(n) => {
                    self.outbound.consume(n);
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("write error to {}: {}", self.peer_addr, e);
                    self.close();
                    return;
                }
            }
        }
        if self.outbound.len() == 0 && self.file.is_none() {
            self.finalize_sent_response();
        }
    }

    /// Everything is flushed: recycle a keep-alive connection or close.
    /// Active multipart streams stay put until the end sentinel.
    fn finalize_sent_response(&mut self) {
        if self.state != State::Writing {
            return;
        }
        if self.multipart {
            return;
        }
        if self.response_keep_alive {
            self.reset_for_next();
        } else {
            self.close();
        }
    }

    /// Keep-alive recycle. The inbound buffer is kept: it may already
    /// hold the start of the next pipelined request.
    fn reset_for_next(&mut self) {
        self.file = None;
        self.request = None;
        self.claimed = false;
        self.parser.reset();
        self.multipart = false;
        self.response_keep_alive = false;
        self.touch();
        self.state = if self.inbound.len() > 0 {
            State::ReadHeaders
        } else {
            State::Idle
        };
    }

    /// Keep-alive decision for the current request. An explicit
    /// `connection` header in the response wins; otherwise HTTP/1.1
    /// defaults to keep-alive and HTTP/1.0 to close, and the
    /// per-connection request limit caps it.
    fn should_keep_alive(&self, response_headers: &Headers) -> bool {
        if let Some(value) = response_headers.get("connection") {
            return headers::is_keep_alive(value);
        }
        let request = match self.request.as_ref() {
            Some(request) => request,
            None => return false,
        };
        let req_conn = request.headers().get("connection").unwrap_or("");
        let mut keep_alive = match request.protocol() {
            Version::Http11 => !headers::is_close(req_conn),
            Version::Http10 => headers::is_keep_alive(req_conn),
        };
        if keep_alive && self.requests_count >= self.policy.keep_alive_max_requests {
            keep_alive = false;
        }
        keep_alive
    }

    fn check_can_respond(&self) -> Result<(), RespondError> {
        if self.closed {
            return Err(RespondError::ConnectionClosed);
        }
        if self.state != State::Dispatch || self.request.is_none() {
            return Err(RespondError::AlreadyResponded);
        }
        Ok(())
    }

    /// Sends a complete plain (or redirect) response for the current
    /// request.
    pub fn respond(&mut self, response: Response) -> Result<(), RespondError> {
        self.check_can_respond()?;
        let keep_alive = self.should_keep_alive(&response.headers);
        response::encode_response(&mut self.outbound, &response, keep_alive)?;
        self.response_keep_alive = keep_alive;
        self.multipart = false;
        self.state = State::Writing;
        self.try_send();
        Ok(())
    }

    /// Streams a file as the response body. A missing or unreadable
    /// file turns into a plain 404.
    pub fn respond_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        extra: Headers,
    ) -> Result<(), RespondError> {
        self.check_can_respond()?;
        let path = path.as_ref();
        let size = match fs::metadata(path) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                let name = path.display().to_string();
                return self.respond(
                    Response::new(404).body(format!("File not found: {}", name)),
                );
            }
        };
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(_) => {
                let name = path.display().to_string();
                return self.respond(
                    Response::new(404).body(format!("File not found: {}", name)),
                );
            }
        };
        let content_type = response::mime_by_extension(
            &path.file_name().map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        );
        let keep_alive = self.should_keep_alive(&extra);
        response::encode_file_head(
            &mut self.outbound,
            size,
            content_type,
            &extra,
            keep_alive,
        );
        self.file = Some(file);
        self.response_keep_alive = keep_alive;
        self.multipart = false;
        self.state = State::Writing;
        self.try_send();
        Ok(())
    }

    /// Starts a `multipart/x-mixed-replace` stream. Frames follow via
    /// `multipart_frame`, the stream ends with `multipart_end` and the
    /// connection closes once the sentinel is flushed.
    pub fn respond_multipart(&mut self, extra: Headers) -> Result<(), RespondError> {
        self.check_can_respond()?;
        response::encode_multipart_head(&mut self.outbound, &extra);
        self.multipart = true;
        self.response_keep_alive = false;
        self.state = State::Writing;
        self.try_send();
        Ok(())
    }

    /// Appends one frame to the multipart stream. Refused while the
    /// outbound buffer is above the soft cap so a slow reader cannot
    /// grow it without bound.
    pub fn multipart_frame<B: Into<Body>>(
        &mut self,
        body: B,
        extra: Headers,
    ) -> Result<(), RespondError> {
        if self.closed {
            return Err(RespondError::ConnectionClosed);
        }
        if !self.multipart {
            return Err(RespondError::NotMultipart);
        }
        if self.outbound.len() > self.policy.max_buffered_output {
            return Err(RespondError::OutputOverflow);
        }
        response::encode_multipart_frame(&mut self.outbound, &body.into(), &extra)?;
        self.try_send();
        Ok(())
    }

    /// Ends the multipart stream.
    pub fn multipart_end(&mut self) -> Result<(), RespondError> {
        if self.closed {
            return Err(RespondError::ConnectionClosed);
        }
        if !self.multipart {
            return Err(RespondError::NotMultipart);
        }
        response::encode_multipart_end(&mut self.outbound);
        self.multipart = false;
        self.response_keep_alive = false;
        self.try_send();
        Ok(())
    }

    /// Writes the canned response for a fatal request error and flags
    /// the connection for close; no further input is parsed.
    fn emit_error(&mut self, err: &RequestError) {
        let (status, _) = err.http_status();
        let canned = Response::new(status)
            .header("connection", "close")
            .body(err.to_string());
        self.request = None;
        self.multipart = false;
        self.response_keep_alive = false;
        if response::encode_response(&mut self.outbound, &canned, false).is_ok() {
            self.state = State::Writing;
            self.try_send();
        } else {
            self.close();
        }
    }
}
