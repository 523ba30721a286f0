#![allow(dead_code)]
//! Helpers shared by the socket-level tests: the server runs in the
//! same thread as the peer, so every blocking peer operation is
//! interleaved with short `server.wait()` turns.

use std::io::{ErrorKind, Read};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use uhttp::server::{Config, Server};
use uhttp::Token;

pub fn logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn local_config() -> Config {
    Config {
        address: "127.0.0.1".to_string(),
        port: 0,
        ..Config::default()
    }
}

pub fn bind_local(config: Config) -> Server {
    logger();
    Server::bind(config).expect("bind")
}

/// Drives the server until it surfaces a request.
pub fn next_request(server: &mut Server, secs: u64) -> Option<Token> {
    let deadline = Instant::now() + Duration::from_secs(secs);
    while Instant::now() < deadline {
        if let Some(token) = server.wait(Duration::from_millis(10)).expect("wait") {
            return Some(token);
        }
    }
    None
}

/// Keeps the server turning for a while (flushes, timeouts, sweeps).
pub fn pump(server: &mut Server, ms: u64) {
    let deadline = Instant::now() + Duration::from_millis(ms);
    while Instant::now() < deadline {
        server.wait(Duration::from_millis(5)).expect("wait");
    }
}

fn read_step(
    sock: &mut TcpStream,
    data: &mut Vec<u8>,
    chunk: &mut [u8],
) -> Option<bool> {
    match sock.read(chunk) {
        Ok(0) => Some(true),
        Ok(n) => {
            data.extend_from_slice(&chunk[..n]);
            Some(false)
        }
        Err(ref e)
            if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
        {
            None
        }
        Err(e) => panic!("read error: {}", e),
    }
}

/// Reads until the server closes the connection.
pub fn read_until_close(
    sock: &mut TcpStream,
    server: &mut Server,
    secs: u64,
) -> Vec<u8> {
    sock.set_read_timeout(Some(Duration::from_millis(20)))
        .expect("read timeout");
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];
    let deadline = Instant::now() + Duration::from_secs(secs);
    while Instant::now() < deadline {
        server.wait(Duration::from_millis(5)).expect("wait");
        if let Some(true) = read_step(sock, &mut data, &mut chunk) {
            return data;
        }
    }
    panic!("server did not close the connection within {}s", secs);
}

/// Reads until the collected bytes contain `needle`.
pub fn read_until_contains(
    sock: &mut TcpStream,
    server: &mut Server,
    needle: &[u8],
    secs: u64,
) -> Vec<u8> {
    sock.set_read_timeout(Some(Duration::from_millis(20)))
        .expect("read timeout");
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];
    let deadline = Instant::now() + Duration::from_secs(secs);
    while Instant::now() < deadline {
        server.wait(Duration::from_millis(5)).expect("wait");
        let closed = read_step(sock, &mut data, &mut chunk) == Some(true);
        if data
            .windows(needle.len().max(1))
            .any(|window| window == needle)
        {
            return data;
        }
        if closed {
            break;
        }
    }
    panic!(
        "{:?} not found in {:?}",
        String::from_utf8_lossy(needle),
        String::from_utf8_lossy(&data)
    );
}

/// Reads until at least `len` bytes arrived.
pub fn read_at_least(
    sock: &mut TcpStream,
    server: &mut Server,
    len: usize,
    secs: u64,
) -> Vec<u8> {
    sock.set_read_timeout(Some(Duration::from_millis(20)))
        .expect("read timeout");
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];
    let deadline = Instant::now() + Duration::from_secs(secs);
    while Instant::now() < deadline {
        server.wait(Duration::from_millis(5)).expect("wait");
        match read_step(sock, &mut data, &mut chunk) {
            Some(true) => break,
            _ => {}
        }
        if data.len() >= len {
            return data;
        }
    }
    if data.len() >= len {
        return data;
    }
    panic!(
        "expected {} bytes, got {} within {}s",
        len,
        data.len(),
        secs
    );
}
