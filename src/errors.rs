//! Crate-wide error types.
//!
//! [`ErrorKind`] covers parser/transport failures and is rendered through the
//! same dummy-handler path as any other request (see [`crate::handler`]).
//! [`HttpError`] is what handler code raises with `?` to short-circuit to a
//! specific status; it is caught exactly once, in the response writer.

use crate::http::status::{phrase_for_code, StatusCode};
use std::{error, fmt, io};

/// Failures that can occur while reading and parsing a request off the wire.
#[derive(Debug)]
pub(crate) enum ErrorKind {
    InvalidMethod,
    InvalidUrl,
    InvalidVersion,
    UnsupportedVersion,

    /// A header line had no terminator or no colon.
    InvalidHeader,
    /// Header count or a single field exceeded its configured limit; carries the
    /// status phrase to use (`"<Field> Header Too Large"` or a fixed message).
    HeaderTooLarge(&'static str),
    RequestLineTooLong,

    InvalidContentLength,
    BodyTooLarge,

    Io(io::Error),
}

impl ErrorKind {
    /// Maps a parse failure to the status it renders as, per the request parser
    /// contract: protocol errors disable keep-alive.
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            ErrorKind::InvalidMethod => StatusCode::BadRequest,
            ErrorKind::InvalidUrl => StatusCode::BadRequest,
            ErrorKind::InvalidVersion => StatusCode::BadRequest,
            ErrorKind::UnsupportedVersion => StatusCode::HttpVersionNotSupported,
            ErrorKind::InvalidHeader => StatusCode::BadRequest,
            ErrorKind::HeaderTooLarge(_) => StatusCode::RequestHeaderFieldsTooLarge,
            ErrorKind::RequestLineTooLong => StatusCode::UriTooLong,
            ErrorKind::InvalidContentLength => StatusCode::BadRequest,
            ErrorKind::BodyTooLarge => StatusCode::PayloadTooLarge,
            ErrorKind::Io(_) => StatusCode::InternalServerError,
        }
    }

    /// The phrase to render in the generic plaintext error body, falling back to
    /// the status table's canonical phrase.
    pub(crate) fn phrase(&self) -> &'static str {
        match self {
            ErrorKind::HeaderTooLarge(phrase) => phrase,
            other => phrase_for_code(other.status().code()).unwrap_or("Error"),
        }
    }
}

impl error::Error for ErrorKind {}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidMethod => write!(f, "invalid HTTP method"),
            ErrorKind::InvalidUrl => write!(f, "invalid request target"),
            ErrorKind::InvalidVersion => write!(f, "invalid HTTP version token"),
            ErrorKind::UnsupportedVersion => write!(f, "unsupported HTTP version"),
            ErrorKind::InvalidHeader => write!(f, "malformed header line"),
            ErrorKind::HeaderTooLarge(phrase) => write!(f, "{phrase}"),
            ErrorKind::RequestLineTooLong => write!(f, "request line exceeds configured limit"),
            ErrorKind::InvalidContentLength => write!(f, "invalid Content-Length header"),
            ErrorKind::BodyTooLarge => write!(f, "request body exceeds configured limit"),
            ErrorKind::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(err)
    }
}

/// An HTTP error a handler raises via `?` to short-circuit to a specific status.
///
/// Carries everything the response writer needs to render it without consulting
/// the handler again: the status, an optional header override set, an optional
/// phrase override, and an optional plaintext body override.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub(crate) code: u16,
    pub(crate) phrase: Option<String>,
    pub(crate) headers: Option<Vec<(String, String)>>,
    pub(crate) body: Option<String>,
}

impl HttpError {
    /// Builds a new `HttpError` for the given numeric status code.
    pub fn new(code: u16) -> Self {
        HttpError {
            code,
            phrase: None,
            headers: None,
            body: None,
        }
    }

    /// Convenience constructor from a [`StatusCode`].
    pub fn from_status(status: StatusCode) -> Self {
        HttpError::new(status.code())
    }

    /// Overrides the reason phrase (otherwise looked up from the status table).
    pub fn with_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.phrase = Some(phrase.into());
        self
    }

    /// Overrides the response body (otherwise the built-in plaintext renderer is used).
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Adds a header to send in place of whatever the response already carries.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Vec::new)
            .push((name.into(), value.into()));
        self
    }

    pub(crate) fn phrase_str(&self) -> &str {
        self.phrase
            .as_deref()
            .or_else(|| phrase_for_code(self.code))
            .unwrap_or("Error")
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.phrase_str())
    }
}

impl error::Error for HttpError {}

impl From<StatusCode> for HttpError {
    fn from(status: StatusCode) -> Self {
        HttpError::from_status(status)
    }
}
