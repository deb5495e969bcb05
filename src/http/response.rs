//! The response writer: framing decision, header assembly, and body
//! transmission (fixed-length, chunked, or swallowed for `HEAD`).

use crate::http::headers::Headers;
use crate::http::status::phrase_for_code;
use crate::http::version::Version;
use crate::limits::RespLimits;
use std::io::{self, Read, Write};

const SERVER_NAME: &str = concat!("threadweb/", env!("CARGO_PKG_VERSION"));

/// A response body: either a fully materialized byte buffer or an arbitrary
/// stream, read in `stream_chunk_size` pieces as it is written out.
pub enum Body {
    Bytes(Vec<u8>),
    Stream(Box<dyn Read + Send>),
}

impl Body {
    pub fn empty() -> Self {
        Body::Bytes(Vec::new())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Bytes(s.into_bytes())
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::Bytes(s.as_bytes().to_vec())
    }
}

/// The outcome a handler hands back to the response writer: a status, an
/// optional phrase override, response headers, and a body.
///
/// If `phrase` is `None`, the writer looks it up from the built-in status
/// table.
pub struct Response {
    pub(crate) status: u16,
    pub(crate) phrase: Option<String>,
    pub(crate) headers: Headers,
    pub(crate) body: Body,
    /// Set to `false` for `HEAD` so the body is computed (for a correct
    /// `Content-Length`) but never put on the wire.
    pub(crate) write_body: bool,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Response {
            status,
            phrase: None,
            headers: Headers::unbounded(),
            body: Body::empty(),
            write_body: true,
        }
    }

    pub fn phrase(mut self, phrase: impl Into<String>) -> Self {
        self.phrase = Some(phrase.into());
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        let _ = self.headers.set(name, &value.into(), true);
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn stream(mut self, stream: Box<dyn Read + Send>) -> Self {
        self.body = Body::Stream(stream);
        self
    }

    pub(crate) fn set_write_body(&mut self, write_body: bool) {
        self.write_body = write_body;
    }
}

/// Writes a fully assembled response to `stream`, applying the framing and
/// connection-management rules of the response writer component, and
/// returns the number of body bytes written (for the access log's `size`
/// field).
pub(crate) fn write_response(
    stream: &mut impl Write,
    version: Version,
    mut response: Response,
    mut keep_alive: bool,
    resp_limits: &RespLimits,
) -> io::Result<usize> {
    if response.status >= 400 {
        keep_alive = false;
    }

    let phrase = response
        .phrase
        .clone()
        .or_else(|| phrase_for_code(response.status).map(str::to_string))
        .unwrap_or_else(|| "Unknown".to_string());

    // Framing decision: exactly one of Content-Length / chunked, never both.
    let chunked = match &response.body {
        Body::Stream(_) if !response.headers.contains("content-length") => true,
        _ => false,
    };

    if let Body::Bytes(bytes) = &response.body {
        let _ = response
            .headers
            .set("content-length", &bytes.len().to_string(), true);
    }
    if chunked {
        let _ = response
            .headers
            .set("transfer-encoding", "chunked", true);
    }

    let _ = response.headers.set(
        "connection",
        if keep_alive { "keep-alive" } else { "close" },
        true,
    );
    let _ = response
        .headers
        .set("server", SERVER_NAME, true);
    let _ = response
        .headers
        .set("date", &crate::log::rfc1123_now(), true);

    let status_line = format!("{} {} {}\r\n", version, response.status, phrase);
    stream.write_all(status_line.as_bytes())?;
    stream.write_all(response.headers.serialize().as_bytes())?;

    let mut written = 0usize;
    if response.write_body {
        written = match response.body {
            Body::Bytes(bytes) => {
                stream.write_all(&bytes)?;
                bytes.len()
            }
            Body::Stream(mut source) => {
                if chunked {
                    write_chunked(stream, &mut *source, resp_limits.stream_chunk_size)?
                } else {
                    let content_length = response
                        .headers
                        .get("content-length")
                        .and_then(|v| v.parse::<usize>().ok());
                    write_length_delimited(
                        stream,
                        &mut *source,
                        content_length,
                        resp_limits.stream_chunk_size,
                    )?
                }
            }
        };
    }

    Ok(written)
}

fn write_length_delimited(
    stream: &mut impl Write,
    source: &mut impl Read,
    content_length: Option<usize>,
    chunk_size: usize,
) -> io::Result<usize> {
    let mut remaining = content_length.unwrap_or(usize::MAX);
    let mut written = 0usize;
    let mut buf = vec![0u8; chunk_size];
    while remaining > 0 {
        let to_read = chunk_size.min(remaining);
        let n = source.read(&mut buf[..to_read])?;
        if n == 0 {
            break; // stream short-returned; Content-Length may over-state.
        }
        stream.write_all(&buf[..n])?;
        written += n;
        remaining = remaining.saturating_sub(n);
    }
    Ok(written)
}

fn write_chunked(stream: &mut impl Write, source: &mut impl Read, chunk_size: usize) -> io::Result<usize> {
    let mut buf = vec![0u8; chunk_size];
    let mut written = 0usize;
    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            break;
        }
        write!(stream, "{:x}\r\n", n)?;
        stream.write_all(&buf[..n])?;
        stream.write_all(b"\r\n")?;
        written += n;
    }
    stream.write_all(b"0\r\n\r\n")?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::RespLimits;
    use std::io::Cursor;

    fn limits() -> RespLimits {
        RespLimits::default()
    }

    #[test]
    fn bytes_body_sets_content_length_not_chunked() {
        let mut out = Cursor::new(Vec::new());
        let response = Response::new(200).body("OK");
        write_response(&mut out, Version::Http11, response, true, &limits()).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.contains("content-length: 2\r\n"));
        assert!(!text.contains("transfer-encoding"));
        assert!(text.ends_with("OK"));
    }

    #[test]
    fn stream_body_without_content_length_is_chunked() {
        let mut out = Cursor::new(Vec::new());
        let data = b"hello world".to_vec();
        let response = Response::new(200).stream(Box::new(Cursor::new(data)));
        write_response(&mut out, Version::Http11, response, true, &limits()).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.contains("transfer-encoding: chunked\r\n"));
        assert!(!text.contains("content-length"));
        assert!(text.trim_end().ends_with("0\r\n\r\n".trim_end()));
    }

    #[test]
    fn status_gte_400_forces_connection_close() {
        let mut out = Cursor::new(Vec::new());
        let response = Response::new(404).body("not found");
        write_response(&mut out, Version::Http11, response, true, &limits()).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.contains("connection: close\r\n"));
    }

    #[test]
    fn date_and_server_headers_always_present() {
        let mut out = Cursor::new(Vec::new());
        let response = Response::new(200).body("x");
        write_response(&mut out, Version::Http11, response, true, &limits()).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.contains("server: threadweb"));
        assert!(text.contains("date: "));
    }

    #[test]
    fn head_style_response_skips_body_bytes() {
        let mut out = Cursor::new(Vec::new());
        let mut response = Response::new(200).body("hello");
        response.set_write_body(false);
        let written = write_response(&mut out, Version::Http11, response, true, &limits()).unwrap();
        assert_eq!(written, 0);
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.contains("content-length: 5\r\n"));
        assert!(!text.ends_with("hello"));
    }

    #[test]
    fn phrase_falls_back_to_status_table() {
        let mut out = Cursor::new(Vec::new());
        let response = Response::new(204);
        write_response(&mut out, Version::Http11, response, true, &limits()).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.starts_with("HTTP/1.1 204 No Content\r\n"));
    }
}
