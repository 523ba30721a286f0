//! uhttp — compact HTTP/1.0 and HTTP/1.1 server and client for
//! readiness-driven event loops.
//!
//! There are no threads, no async runtime and no callbacks here. Both
//! the server and the client expose the sockets they want watched
//! (`read_sockets()` / `write_sockets()`) and a single progress function
//! (`process_events(read, write)`), so one external multiplexer can
//! drive any number of engines; each side also ships a blocking
//! `wait(timeout)` convenience that runs its own poll once. All state
//! lives in explicit per-connection state machines fed by incremental
//! parsers, which keeps the engine usable on very small systems.
//!
//! The server understands keep-alive with pipelining, streams files and
//! `multipart/x-mixed-replace` frames, and defends against request
//! smuggling. The client reuses connections, keeps a cookie jar and
//! retries once on a digest-authentication challenge. TLS is an
//! external concern behind the [`stream::StreamWrapper`] seam; chunked
//! transfer encoding and HTTP/2 are out of scope.

pub mod client;
pub mod deadline;
pub mod headers;
pub mod server;
pub mod status;
pub mod stream;
pub mod version;
pub mod wire;

pub use mio::Token;

pub use crate::headers::{Cookies, Headers};
pub use crate::version::{Method, Version};
pub use crate::wire::{Body, Query};
