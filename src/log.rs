//! Structured access logging and RFC-1123 timestamp formatting.
//!
//! Diagnostic events (handler panics, coordinator misuse, dead workers, wire
//! I/O failures) go straight through the ordinary `log::{error,warn,info}!`
//! call sites at their point of occurrence. This module only covers the
//! access-log record emitted once per completed request/response cycle.

use chrono::Utc;
use std::fmt;
use std::net::SocketAddr;

/// One access-log record, emitted after every completed request/response
/// cycle. `ident` and `authuser` are placeholders (`-`) since identd lookups
/// and authenticated-user tracking are outside the core's scope.
pub(crate) struct AccessLogRecord<'a> {
    pub(crate) host: SocketAddr,
    pub(crate) request_line: &'a str,
    pub(crate) status: u16,
    pub(crate) size: usize,
}

impl fmt::Display for AccessLogRecord<'_> {
    /// Common Log Format: `host ident authuser [date] "request" status size`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - - [{}] \"{}\" {} {}",
            self.host.ip(),
            clf_now(),
            self.request_line,
            self.status,
            self.size
        )
    }
}

impl AccessLogRecord<'_> {
    /// Emits this record through the `log` facade at a level derived from
    /// the status class: ERROR for >=500, WARN for >=400, INFO otherwise.
    pub(crate) fn emit(&self) {
        if self.status >= 500 {
            log::error!("{self}");
        } else if self.status >= 400 {
            log::warn!("{self}");
        } else {
            log::info!("{self}");
        }
    }
}

/// The current time formatted as an RFC-1123 `Date` header value, e.g.
/// `Mon, 28 Jul 2026 10:15:00 GMT`.
pub(crate) fn rfc1123_now() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// The current time formatted as a Common Log Format timestamp, e.g.
/// `28/Jul/2026:10:15:00 +0000`.
pub(crate) fn clf_now() -> String {
    Utc::now().format("%d/%b/%Y:%H:%M:%S %z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn access_log_record_formats_as_common_log_format() {
        let record = AccessLogRecord {
            host: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 1234),
            request_line: "GET / HTTP/1.1",
            status: 200,
            size: 2,
        };
        let rendered = record.to_string();
        assert!(rendered.starts_with("127.0.0.1 - - ["));
        assert!(rendered.contains("\"GET / HTTP/1.1\" 200 2"));
    }

    #[test]
    fn rfc1123_now_ends_with_gmt() {
        assert!(rfc1123_now().ends_with("GMT"));
    }

    #[test]
    fn clf_now_uses_slash_delimited_date() {
        let now = clf_now();
        let date_part = now.split(':').next().unwrap();
        assert_eq!(date_part.matches('/').count(), 2);
    }
}
