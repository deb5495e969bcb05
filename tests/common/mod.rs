//! Shared plumbing for the end-to-end integration suite: a tiny HTTP/1.1
//! client good enough to drive a real `Server` over a real socket, no mock
//! transport layer.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use threadweb::limits::ServerLimits;
use threadweb::{Server, ServerBuilder};

/// A parsed HTTP response. `100 Continue` interim lines are transparently
/// skipped over by [`read_response`]; this only ever represents the final
/// response of a cycle.
pub struct HttpResponse {
    pub code: u16,
    pub phrase: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A `ServerBuilder` bound to an ephemeral loopback port with a short
/// `poll_interval` so the integration suite doesn't spend real wall-clock
/// time waiting on the default production polling cadence.
pub fn test_builder() -> ServerBuilder {
    Server::builder()
        .bind("127.0.0.1:0")
        .expect("failed to bind ephemeral test port")
        .server_limits(ServerLimits {
            poll_interval: Duration::from_millis(10),
            ..ServerLimits::default()
        })
}

/// Starts `server`, returning its bound address. Gives the selector/manager
/// a brief moment to spin up the initial worker pool before the caller
/// opens its first connection.
pub fn start(server: &mut Server) -> SocketAddr {
    let addr = server.local_addr().expect("server has no local address");
    server.start();
    std::thread::sleep(Duration::from_millis(30));
    addr
}

pub fn connect(addr: SocketAddr) -> TcpStream {
    TcpStream::connect(addr).expect("failed to connect to test server")
}

/// Sends a raw request (verbatim, including its own terminating `\r\n\r\n`)
/// and reads back one parsed response, transparently consuming any number
/// of leading `100 Continue` interim lines on the same connection.
pub fn request(stream: &mut TcpStream, raw: &str) -> HttpResponse {
    stream.write_all(raw.as_bytes()).expect("write failed");
    read_response(stream)
}

pub fn read_response(stream: &mut TcpStream) -> HttpResponse {
    let mut reader = BufReader::new(stream.try_clone().expect("failed to clone stream"));

    loop {
        let mut status_line = String::new();
        let n = reader
            .read_line(&mut status_line)
            .expect("failed to read status line");
        assert!(n > 0, "connection closed before a response was read");

        let mut parts = status_line.trim_end().splitn(3, ' ');
        let _version = parts.next().unwrap_or_default();
        let code: u16 = parts
            .next()
            .expect("missing status code")
            .parse()
            .expect("non-numeric status code");
        let phrase = parts.next().unwrap_or_default().to_string();

        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).expect("failed to read header line");
            if line == "\r\n" || line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.trim_end().split_once(':') {
                headers.push((name.trim().to_string(), value.trim().to_string()));
            }
        }

        if code == 100 {
            continue;
        }

        let chunked = headers
            .iter()
            .any(|(n, v)| n.eq_ignore_ascii_case("transfer-encoding") && v.eq_ignore_ascii_case("chunked"));

        let body = if chunked {
            read_chunked_body(&mut reader)
        } else if let Some((_, len)) = headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        {
            let len: usize = len.parse().expect("non-numeric content-length");
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).expect("body truncated");
            buf
        } else {
            Vec::new()
        };

        return HttpResponse {
            code,
            phrase,
            headers,
            body,
        };
    }
}

fn read_chunked_body(reader: &mut impl BufRead) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut size_line = String::new();
        reader.read_line(&mut size_line).expect("failed to read chunk size");
        let size = usize::from_str_radix(size_line.trim_end(), 16).expect("invalid chunk size");
        if size == 0 {
            let mut trailer = String::new();
            reader.read_line(&mut trailer).expect("failed to read final chunk trailer");
            break;
        }
        let mut chunk = vec![0u8; size];
        reader.read_exact(&mut chunk).expect("chunk body truncated");
        out.extend_from_slice(&chunk);
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf).expect("missing chunk trailer");
    }
    out
}

/// Asserts the peer closed the connection: a zero-byte read.
pub fn assert_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 1];
    let n = stream.read(&mut buf).expect("read after close failed");
    assert_eq!(n, 0, "expected connection to be closed");
}
