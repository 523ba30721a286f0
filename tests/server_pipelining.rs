//! Pipelining: several requests in one TCP segment are surfaced in
//! arrival order and their responses share the connection in the same
//! order.

mod common;

use std::io::Write;
use std::net::TcpStream;

use uhttp::server::Response;
use uhttp::Method;

use common::*;

#[test]
fn pipelined_post_and_get_in_order() {
    let mut server = bind_local(local_config());
    let addr = server.local_addr().unwrap();
    let mut sock = TcpStream::connect(addr).unwrap();
    sock.write_all(
        b"POST /a HTTP/1.1\r\nHost: h\r\nContent-Length: 3\r\n\r\n\
          abcGET /b HTTP/1.1\r\nHost: h\r\n\r\n",
    )
    .unwrap();

    let token = next_request(&mut server, 5).expect("first request");
    {
        let conn = server.connection_mut(token).unwrap();
        let request = conn.request().unwrap();
        assert_eq!(request.method(), Method::Post);
        assert_eq!(request.path(), "/a");
        assert_eq!(request.body(), b"abc");
        conn.respond(Response::ok().body("first")).unwrap();
    }

    // the follow-on request was already buffered and is surfaced on
    // the same connection right after the response went out
    let token2 = next_request(&mut server, 5).expect("second request");
    assert_eq!(token2, token);
    {
        let conn = server.connection_mut(token2).unwrap();
        let request = conn.request().unwrap();
        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.path(), "/b");
        assert_eq!(request.body(), b"");
        conn.respond(Response::ok().body("second")).unwrap();
    }

    let data = read_until_contains(&mut sock, &mut server, b"second", 5);
    let text = String::from_utf8_lossy(&data);
    let first = text.find("first").expect("first body");
    let second = text.find("second").expect("second body");
    assert!(first < second, "responses out of order: {}", text);
    assert_eq!(text.matches("HTTP/1.1 200 OK\r\n").count(), 2);
}

#[test]
fn many_pipelined_requests_surface_one_by_one() {
    let mut server = bind_local(local_config());
    let addr = server.local_addr().unwrap();
    let mut sock = TcpStream::connect(addr).unwrap();
    let mut burst = Vec::new();
    for i in 0..4 {
        burst.extend_from_slice(
            format!("GET /r{} HTTP/1.1\r\nHost: h\r\n\r\n", i).as_bytes(),
        );
    }
    sock.write_all(&burst).unwrap();

    for i in 0..4 {
        let token = next_request(&mut server, 5).expect("request");
        let conn = server.connection_mut(token).unwrap();
        assert_eq!(conn.request().unwrap().path(), format!("/r{}", i));
        conn.respond(Response::ok().body(format!("resp{}", i))).unwrap();
    }
    let data = read_until_contains(&mut sock, &mut server, b"resp3", 5);
    let text = String::from_utf8_lossy(&data);
    let positions: Vec<usize> = (0..4)
        .map(|i| text.find(&format!("resp{}", i)).expect("body"))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}
