//! Event-driven HTTP/1.x server.
//!
//! The server owns the listening sockets and one state machine per
//! connection. It never blocks outside of `wait()`: callers that bring
//! their own readiness loop use `poll_ready()` + `process_events()`
//! and respond to completed requests addressed by their `Token`.
//!
//! ```no_run
//! use std::time::Duration;
//! use uhttp::server::{Config, Response, Server};
//!
//! let mut server = Server::bind(Config {
//!     port: 8080,
//!     ..Config::default()
//! }).unwrap();
//! loop {
//!     if let Some(token) = server.wait(Duration::from_secs(1)).unwrap() {
//!         let conn = server.connection_mut(token).unwrap();
//!         conn.respond(Response::ok().body("<p>hi</p>")).unwrap();
//!     }
//! }
//! ```

mod connection;
mod error;
mod parser;
mod request;
mod response;

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};

use crate::stream::{Plain, Stream, StreamWrapper};

pub use self::connection::{Connection, State};
pub use self::error::{HttpError, RequestError, RespondError};
pub use self::parser::{Limits, Parser};
pub use self::request::Request;
pub use self::response::{Response, MULTIPART_BOUNDARY};

use self::connection::Policy;

/// Server configuration. All fields have working defaults; `port` 0
/// binds an ephemeral port.
pub struct Config {
    pub address: String,
    pub port: u16,
    /// Accepted sockets beyond this many live connections are dropped.
    pub max_waiting_clients: usize,
    pub keep_alive_timeout: Duration,
    pub keep_alive_max_requests: usize,
    /// Request line + headers byte cap.
    pub max_headers_length: usize,
    /// Request body byte cap.
    pub max_content_length: usize,
    /// Slice size for file-streaming responses.
    pub file_chunk_size: usize,
    /// Soft cap on buffered output; multipart frames are refused above.
    pub max_buffered_output: usize,
    /// Accept bare-LF line endings in request heads.
    pub lenient_eol: bool,
    /// TLS provider; accepted sockets pass through it when set.
    pub tls: Option<Box<dyn StreamWrapper>>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            address: "0.0.0.0".to_string(),
            port: 80,
            max_waiting_clients: 5,
            keep_alive_timeout: Duration::from_secs(30),
            keep_alive_max_requests: 100,
            max_headers_length: 4096,
            max_content_length: 512 * 1024,
            file_chunk_size: 4096,
            max_buffered_output: 256 * 1024,
            lenient_eol: false,
            tls: None,
        }
    }
}

impl Config {
    fn limits(&self) -> Limits {
        Limits {
            max_headers_length: self.max_headers_length,
            max_content_length: self.max_content_length,
            lenient_eol: self.lenient_eol,
        }
    }

    fn policy(&self) -> Policy {
        Policy {
            keep_alive_timeout: self.keep_alive_timeout,
            keep_alive_max_requests: self.keep_alive_max_requests,
            file_chunk_size: self.file_chunk_size,
            max_buffered_output: self.max_buffered_output,
            max_inbound: self.max_headers_length + self.max_content_length,
        }
    }
}

pub struct Server {
    config: Config,
    poll: Poll,
    listeners: Vec<(Token, TcpListener)>,
    connections: HashMap<Token, Connection>,
    next_token: usize,
}

impl Server {
    /// Binds every address `(config.address, config.port)` resolves to.
    pub fn bind(config: Config) -> io::Result<Server> {
        let poll = Poll::new()?;
        let addrs: Vec<SocketAddr> = (config.address.as_str(), config.port)
            .to_socket_addrs()?
            .collect();
        let mut listeners = Vec::new();
        let mut last_error = None;
        for addr in addrs {
            let token = Token(listeners.len());
            match TcpListener::bind(addr) {
                Ok(mut listener) => {
                    poll.registry().register(
                        &mut listener,
                        token,
                        Interest::READABLE,
                    )?;
                    info!("listening on {}", addr);
                    listeners.push((token, listener));
                }
                Err(err) => {
                    debug!("cannot bind {}: {}", addr, err);
                    last_error = Some(err);
                }
            }
        }
        if listeners.is_empty() {
            return Err(last_error.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::AddrNotAvailable, "no address to bind")
            }));
        }
        let next_token = listeners.len();
        Ok(Server {
            config,
            poll,
            listeners,
            connections: HashMap::new(),
            next_token,
        })
    }

    /// Address of the first bound listener.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listeners.first().and_then(|(_, l)| l.local_addr().ok())
    }

    /// Tokens to watch for readability: listeners plus every open
    /// connection.
    pub fn read_sockets(&self) -> Vec<Token> {
        let mut tokens: Vec<Token> =
            self.listeners.iter().map(|(t, _)| *t).collect();
        tokens.extend(
            self.connections
                .iter()
                .filter(|(_, c)| !c.is_closed())
                .map(|(t, _)| *t),
        );
        tokens
    }

    /// Tokens with pending output.
    pub fn write_sockets(&self) -> Vec<Token> {
        self.connections
            .iter()
            .filter(|(_, c)| c.has_pending_output())
            .map(|(t, _)| *t)
            .collect()
    }

    pub fn connection(&self, token: Token) -> Option<&Connection> {
        self.connections.get(&token)
    }

    pub fn connection_mut(&mut self, token: Token) -> Option<&mut Connection> {
        self.connections.get_mut(&token)
    }

    pub fn connections_count(&self) -> usize {
        self.connections.len()
    }

    /// Runs the owned poll once and returns the ready token sets for
    /// `process_events`.
    pub fn poll_ready(
        &mut self,
        timeout: Duration,
    ) -> io::Result<(Vec<Token>, Vec<Token>)> {
        let mut events = Events::with_capacity(128);
        self.poll.poll(&mut events, Some(timeout))?;
        let mut read = Vec::new();
        let mut write = Vec::new();
        for event in events.iter() {
            if event.is_readable() || event.is_read_closed() {
                read.push(event.token());
            }
            if event.is_writable() {
                write.push(event.token());
            }
        }
        Ok((read, write))
    }

    /// Dispatches ready sets: drains writables, accepts on ready
    /// listeners, reads readables. Returns at most one connection whose
    /// request completed; further completed requests are surfaced by
    /// subsequent calls, preserving per-connection arrival order.
    pub fn process_events(
        &mut self,
        read: &[Token],
        write: &[Token],
    ) -> Option<Token> {
        for token in write {
            if let Some(conn) = self.connections.get_mut(token) {
                conn.event_write();
            }
        }
        for token in read {
            if self.listeners.iter().any(|(t, _)| t == token) {
                self.accept_ready();
            } else if let Some(conn) = self.connections.get_mut(token) {
                conn.event_read();
            }
        }
        let ready = self.next_ready();
        self.sweep();
        ready
    }

    /// Blocking convenience: expire idle connections, flush pending
    /// output, surface a buffered pipelined request if one is already
    /// complete, otherwise poll once and dispatch.
    pub fn wait(&mut self, timeout: Duration) -> io::Result<Option<Token>> {
        self.cleanup_idle();
        self.flush_pending();
        if let Some(token) = self.next_ready() {
            self.sweep();
            return Ok(Some(token));
        }
        self.sweep();
        let (read, write) = self.poll_ready(timeout)?;
        Ok(self.process_events(&read, &write))
    }

    fn accept_ready(&mut self) {
        loop {
            let (sock, addr) = match self
                .listeners
                .iter()
                .find_map(|(_, l)| match l.accept() {
                    Ok(pair) => Some(Ok(pair)),
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => None,
                    Err(e) => Some(Err(e)),
                }) {
                Some(Ok(pair)) => pair,
                Some(Err(err)) => {
                    debug!("accept error: {}", err);
                    return;
                }
                None => return,
            };
            if self.connections.len() >= self.config.max_waiting_clients {
                info!("too many connections, dropping {}", addr);
                drop(sock);
                continue;
            }
            let _ = sock.set_nodelay(true);
            let stream: Box<dyn Stream> = match &self.config.tls {
                Some(wrapper) => match wrapper.wrap_server(sock) {
                    Ok(stream) => stream,
                    Err(err) => {
                        debug!("tls accept failed for {}: {}", addr, err);
                        continue;
                    }
                },
                None => Box::new(Plain(sock)),
            };
            let token = Token(self.next_token);
            self.next_token += 1;
            let mut conn = Connection::new(
                token,
                stream,
                addr,
                self.config.limits(),
                self.config.policy(),
            );
            let registered = self.poll.registry().register(
                conn.stream_mut().socket_mut(),
                token,
                Interest::READABLE | Interest::WRITABLE,
            );
            if let Err(err) = registered {
                debug!("cannot register {}: {}", addr, err);
                continue;
            }
            debug!("accepted connection from {}", addr);
            self.connections.insert(token, conn);
        }
    }

    /// First connection holding a completed, not yet surfaced request.
    /// Buffered pipelined bytes are parsed here, right after the
    /// previous response was queued.
    fn next_ready(&mut self) -> Option<Token> {
        let mut tokens: Vec<Token> = self.connections.keys().copied().collect();
        tokens.sort();
        for token in tokens {
            let conn = match self.connections.get_mut(&token) {
                Some(conn) => conn,
                None => continue,
            };
            if conn.is_closed() {
                continue;
            }
            if conn.read_paused() {
                conn.event_read();
            }
            if !conn.has_unclaimed_request() {
                conn.try_parse();
            }
            if conn.has_unclaimed_request() {
                conn.claim();
                return Some(token);
            }
        }
        None
    }

    fn flush_pending(&mut self) {
        for conn in self.connections.values_mut() {
            if conn.has_pending_output() {
                conn.try_send();
            }
        }
    }

    fn cleanup_idle(&mut self) {
        for conn in self.connections.values_mut() {
            if conn.idle_expired() {
                debug!("idle timeout for {}", conn.peer_addr());
                conn.close();
            }
        }
    }

    /// Drops closed connections, releasing sockets and file handles.
    fn sweep(&mut self) {
        let closed: Vec<Token> = self
            .connections
            .iter()
            .filter(|(_, c)| c.is_closed())
            .map(|(t, _)| *t)
            .collect();
        for token in closed {
            if let Some(mut conn) = self.connections.remove(&token) {
                let _ = self
                    .poll
                    .registry()
                    .deregister(conn.stream_mut().socket_mut());
            }
        }
    }
}
