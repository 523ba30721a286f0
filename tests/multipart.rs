//! Multipart streaming and file responses.

mod common;

use std::io::Write;
use std::net::TcpStream;

use uhttp::server::{Response, MULTIPART_BOUNDARY};
use uhttp::Headers;

use common::*;

#[test]
fn multipart_stream_frames_in_order() {
    let mut server = bind_local(local_config());
    let addr = server.local_addr().unwrap();
    let mut sock = TcpStream::connect(addr).unwrap();
    sock.write_all(b"GET /stream HTTP/1.1\r\nHost: h\r\n\r\n").unwrap();

    let token = next_request(&mut server, 5).expect("request");
    {
        let conn = server.connection_mut(token).unwrap();
        conn.respond_multipart(Headers::new()).unwrap();
        for frame in [&b"F1"[..], b"F2", b"F3"] {
            conn.multipart_frame(frame, Headers::new()).unwrap();
        }
        conn.multipart_end().unwrap();
    }

    let data = read_until_close(&mut sock, &mut server, 5);
    let text = String::from_utf8_lossy(&data);
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains(&format!(
        "Content-Type: multipart/x-mixed-replace; boundary={}\r\n",
        MULTIPART_BOUNDARY
    )));
    assert!(text.contains("Connection: close\r\n"));

    let boundary = format!("--{}\r\n", MULTIPART_BOUNDARY);
    assert_eq!(text.matches(boundary.as_str()).count(), 3);
    let f1 = text.find("F1").expect("frame 1");
    let f2 = text.find("F2").expect("frame 2");
    let f3 = text.find("F3").expect("frame 3");
    assert!(f1 < f2 && f2 < f3);
    assert!(text.ends_with(&format!("--{}--\r\n", MULTIPART_BOUNDARY)));
    // every frame declares its payload size
    assert_eq!(text.matches("Content-Length: 2\r\n").count(), 3);
}

#[test]
fn multipart_frame_without_start_is_an_error() {
    let mut server = bind_local(local_config());
    let addr = server.local_addr().unwrap();
    let mut sock = TcpStream::connect(addr).unwrap();
    sock.write_all(b"GET / HTTP/1.1\r\nHost: h\r\n\r\n").unwrap();
    let token = next_request(&mut server, 5).expect("request");
    let conn = server.connection_mut(token).unwrap();
    assert!(conn.multipart_frame(&b"x"[..], Headers::new()).is_err());
    assert!(conn.multipart_end().is_err());
    conn.respond(Response::ok()).unwrap();
}

#[test]
fn file_response_streams_with_mime_type() {
    let dir = std::env::temp_dir().join("uhttp-file-test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("page.html");
    let content = "<html><body>static</body></html>".repeat(64);
    std::fs::write(&path, &content).unwrap();

    let mut server = bind_local(local_config());
    let addr = server.local_addr().unwrap();
    let mut sock = TcpStream::connect(addr).unwrap();
    sock.write_all(b"GET /page HTTP/1.1\r\nHost: h\r\n\r\n").unwrap();
    let token = next_request(&mut server, 5).expect("request");
    server
        .connection_mut(token)
        .unwrap()
        .respond_file(&path, Headers::new())
        .unwrap();

    let data = read_until_contains(&mut sock, &mut server, b"</body></html>", 5);
    let text = String::from_utf8_lossy(&data);
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("Content-Type: text/html; charset=utf-8\r\n"));
    assert!(text.contains(&format!("Content-Length: {}\r\n", content.len())));
}

#[test]
fn missing_file_becomes_404() {
    let mut server = bind_local(local_config());
    let addr = server.local_addr().unwrap();
    let mut sock = TcpStream::connect(addr).unwrap();
    sock.write_all(b"GET /nope HTTP/1.1\r\nHost: h\r\n\r\n").unwrap();
    let token = next_request(&mut server, 5).expect("request");
    server
        .connection_mut(token)
        .unwrap()
        .respond_file("/definitely/not/here.bin", Headers::new())
        .unwrap();
    let data = read_until_contains(&mut sock, &mut server, b"\r\n\r\n", 5);
    assert!(data.starts_with(b"HTTP/1.1 404 Not Found\r\n"));
}
