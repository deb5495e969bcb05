//! Supported HTTP protocol versions.

use crate::errors::ErrorKind;
use std::fmt;

/// The two wire protocols this server understands. HTTP/0.9's headerless
/// single-line request form is out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    /// Parses the version token from a request line (`"HTTP/1.0"` or
    /// `"HTTP/1.1"`), also returning whether this version defaults to
    /// keep-alive absent a `Connection` header.
    pub(crate) fn parse(token: &str) -> Result<(Version, bool), ErrorKind> {
        match token {
            "HTTP/1.1" => Ok((Version::Http11, true)),
            "HTTP/1.0" => Ok((Version::Http10, false)),
            _ => Err(ErrorKind::UnsupportedVersion),
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
