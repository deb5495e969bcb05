//! Request-line and header-block parsing.

use crate::errors::ErrorKind;
use crate::http::headers::Headers;
use crate::http::version::Version;
use crate::limits::ReqLimits;
use memchr::memchr;
use std::collections::HashMap;
use std::io::{self, BufRead};

/// A parsed HTTP request.
///
/// Built fresh at the top of every keep-alive cycle. A connection that gets
/// requeued after a lock-wait (see [`crate::server::connection`]) holds onto
/// this same `Request` rather than re-parsing, so a retry never re-reads
/// bytes already consumed off the wire.
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) method: String,
    /// The raw request-target, including any query string.
    pub(crate) target: String,
    /// The unescaped path, without its query string — the coordinator and
    /// router both key off this.
    pub(crate) resource: String,
    pub(crate) version: Version,
    pub(crate) headers: Headers,
    pub(crate) body: Option<Vec<u8>>,
    /// Verbatim request line, newline included, kept for the access log.
    pub(crate) request_line: String,
    pub(crate) keep_alive: bool,
    pub(crate) named_captures: HashMap<String, String>,
    pub(crate) positional_captures: Vec<String>,
}

impl Request {
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The raw request-target (path + optional `?query`).
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The unescaped resource path used for routing and the coordinator key.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// A named capture group from the route regex, e.g. `:id` style groups.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.named_captures.get(name).map(|s| s.as_str())
    }

    /// A positional capture group from the route regex. Indices that
    /// duplicate a named group's value are elided from this list, matching
    /// the route match step's contract.
    pub fn positional_param(&self, index: usize) -> Option<&str> {
        self.positional_captures.get(index).map(|s| s.as_str())
    }

    pub(crate) fn request_line(&self) -> &str {
        self.request_line.trim_end_matches(['\r', '\n'])
    }
}

/// Result of attempting to read and parse one request off a connection.
pub(crate) enum ParseOutcome {
    Parsed(Request),
    /// A parse failure with the version to use when rendering the diagnostic
    /// response (per the spec, always the newest supported version when the
    /// request line itself could not be parsed), and whatever request line
    /// text was actually read (empty if the failure happened before one
    /// could be captured), kept for the access log.
    Failed {
        error: ErrorKind,
        version: Version,
        request_line: String,
    },
    /// The peer closed the connection before sending anything; close
    /// silently, no response.
    PeerClosed,
}

/// Reads and parses one request from `reader`.
///
/// Tolerates a single leading bare `\r\n` before the request line (some
/// clients send one after a prior response). An empty read at that point
/// means the peer closed the connection.
pub(crate) fn parse_request(
    reader: &mut impl BufRead,
    limits: &ReqLimits,
) -> io::Result<ParseOutcome> {
    let first = match read_capped_line(reader, limits.max_line_size + 1)? {
        CappedLine::Eof => return Ok(ParseOutcome::PeerClosed),
        CappedLine::TooLong => {
            return Ok(ParseOutcome::Failed {
                error: ErrorKind::RequestLineTooLong,
                version: Version::Http11,
                request_line: String::new(),
            })
        }
        CappedLine::Line(line) => line,
    };

    let request_line = if first == "\r\n" {
        match read_capped_line(reader, limits.max_line_size + 1)? {
            CappedLine::Eof => return Ok(ParseOutcome::PeerClosed),
            CappedLine::TooLong => {
                return Ok(ParseOutcome::Failed {
                    error: ErrorKind::RequestLineTooLong,
                    version: Version::Http11,
                    request_line: String::new(),
                })
            }
            CappedLine::Line(line) => line,
        }
    } else {
        first
    };

    let (method, target, version) = match parse_request_line(&request_line) {
        Ok(parts) => parts,
        Err(error) => {
            return Ok(ParseOutcome::Failed {
                error,
                version: Version::Http11,
                request_line: request_line.trim_end_matches(['\r', '\n']).to_string(),
            })
        }
    };

    let mut headers = Headers::new(limits.max_line_size, limits.max_headers);
    loop {
        let line = match read_capped_line(reader, limits.max_line_size + 1)? {
            CappedLine::Eof => return Ok(ParseOutcome::PeerClosed),
            CappedLine::TooLong => {
                return Ok(ParseOutcome::Failed {
                    error: ErrorKind::HeaderTooLarge("Field Header Too Large"),
                    version,
                    request_line: request_line.trim_end_matches(['\r', '\n']).to_string(),
                })
            }
            CappedLine::Line(line) => line,
        };
        if line == "\r\n" {
            break;
        }
        if let Err(error) = headers.add(&line) {
            return Ok(ParseOutcome::Failed {
                error,
                version,
                request_line: request_line.trim_end_matches(['\r', '\n']).to_string(),
            });
        }
    }

    let keep_alive = match headers.get("connection") {
        Some(value) if value.eq_ignore_ascii_case("close") => false,
        _ => version == Version::Http11,
    };

    let resource = percent_decode(target.split('?').next().unwrap_or(target.as_str()));

    Ok(ParseOutcome::Parsed(Request {
        method,
        target,
        resource,
        version,
        headers,
        body: None,
        request_line,
        keep_alive,
        named_captures: HashMap::new(),
        positional_captures: Vec::new(),
    }))
}

fn parse_request_line(line: &str) -> Result<(String, String, Version), ErrorKind> {
    let stripped = line.strip_suffix("\r\n").ok_or(ErrorKind::InvalidMethod)?;
    let mut parts = stripped.split_whitespace();
    let method = parts.next().ok_or(ErrorKind::InvalidMethod)?;
    let target = parts.next().ok_or(ErrorKind::InvalidUrl)?;
    let version_token = parts.next().ok_or(ErrorKind::InvalidVersion)?;
    if parts.next().is_some() {
        return Err(ErrorKind::InvalidMethod);
    }
    if method.is_empty() {
        return Err(ErrorKind::InvalidMethod);
    }
    if target.is_empty() {
        return Err(ErrorKind::InvalidUrl);
    }
    let (version, _default_keep_alive) = Version::parse(version_token)?;
    Ok((method.to_ascii_uppercase(), target.to_string(), version))
}

enum CappedLine {
    Line(String),
    TooLong,
    Eof,
}

/// Reads one `\n`-terminated line, capped at `max_len` bytes (inclusive of
/// the terminator). Uses `memchr` to scan each buffered chunk rather than
/// reading byte-by-byte.
fn read_capped_line(reader: &mut impl BufRead, max_len: usize) -> io::Result<CappedLine> {
    let mut buf = Vec::new();
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(if buf.is_empty() {
                CappedLine::Eof
            } else {
                CappedLine::TooLong
            });
        }
        if let Some(pos) = memchr(b'\n', available) {
            buf.extend_from_slice(&available[..=pos]);
            reader.consume(pos + 1);
            return match String::from_utf8(buf) {
                Ok(line) => Ok(CappedLine::Line(line)),
                Err(_) => Ok(CappedLine::TooLong),
            };
        }
        buf.extend_from_slice(available);
        let consumed = available.len();
        reader.consume(consumed);
        if buf.len() > max_len {
            return Ok(CappedLine::TooLong);
        }
    }
}

/// Percent-decodes a path. Invalid escapes are passed through unchanged
/// rather than rejected, matching a permissive resource-key normalization.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn parse(input: &str) -> ParseOutcome {
        let mut reader = BufReader::new(input.as_bytes());
        parse_request(&mut reader, &ReqLimits::default()).unwrap()
    }

    #[test]
    fn parses_simple_get() {
        match parse("GET /hello HTTP/1.1\r\nHost: x\r\n\r\n") {
            ParseOutcome::Parsed(req) => {
                assert_eq!(req.method(), "GET");
                assert_eq!(req.resource(), "/hello");
                assert_eq!(req.version(), Version::Http11);
                assert!(req.keep_alive());
            }
            _ => panic!("expected Parsed"),
        }
    }

    #[test]
    fn connection_close_disables_keep_alive() {
        match parse("GET / HTTP/1.1\r\nConnection: close\r\n\r\n") {
            ParseOutcome::Parsed(req) => assert!(!req.keep_alive()),
            _ => panic!("expected Parsed"),
        }
    }

    #[test]
    fn http_10_defaults_to_no_keep_alive() {
        match parse("GET / HTTP/1.0\r\n\r\n") {
            ParseOutcome::Parsed(req) => assert!(!req.keep_alive()),
            _ => panic!("expected Parsed"),
        }
    }

    #[test]
    fn empty_read_is_peer_closed() {
        assert!(matches!(parse(""), ParseOutcome::PeerClosed));
    }

    #[test]
    fn malformed_request_line_reports_http11() {
        match parse("NOT A REQUEST\r\n\r\n") {
            ParseOutcome::Failed { version, .. } => assert_eq!(version, Version::Http11),
            _ => panic!("expected Failed"),
        }
    }

    #[test]
    fn unsupported_version_is_rejected() {
        match parse("GET / HTTP/2.0\r\n\r\n") {
            ParseOutcome::Failed { error, .. } => {
                assert!(matches!(error, ErrorKind::UnsupportedVersion))
            }
            _ => panic!("expected Failed"),
        }
    }

    #[test]
    fn oversize_request_line_is_rejected() {
        let huge = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(5000));
        match parse(&huge) {
            ParseOutcome::Failed { error, .. } => {
                assert!(matches!(error, ErrorKind::RequestLineTooLong))
            }
            _ => panic!("expected Failed"),
        }
    }

    #[test]
    fn query_string_is_excluded_from_resource() {
        match parse("GET /a/b?x=1 HTTP/1.1\r\n\r\n") {
            ParseOutcome::Parsed(req) => {
                assert_eq!(req.resource(), "/a/b");
                assert_eq!(req.target(), "/a/b?x=1");
            }
            _ => panic!("expected Parsed"),
        }
    }

    #[test]
    fn percent_decoding_applies_to_resource() {
        match parse("GET /a%20b HTTP/1.1\r\n\r\n") {
            ParseOutcome::Parsed(req) => assert_eq!(req.resource(), "/a b"),
            _ => panic!("expected Parsed"),
        }
    }
}
