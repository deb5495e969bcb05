//! Server configuration limits and timeouts.
//!
//! # Security-first defaults
//!
//! Default limits are intentionally conservative to bound:
//! - Slowloris-style idle connections
//! - Oversized request lines and header blocks
//! - Unbounded request bodies
//!
//! # Examples
//!
//! ```no_run
//! use threadweb::{Server, limits::{ServerLimits, ReqLimits}};
//! use std::time::Duration;
//!
//! Server::builder()
//!     .bind("127.0.0.1:8080").unwrap()
//!     .server_limits(ServerLimits {
//!         max_processes: 32,
//!         poll_interval: Duration::from_millis(25),
//!         ..ServerLimits::default()
//!     })
//!     .request_limits(ReqLimits {
//!         max_headers: 96,
//!         ..ReqLimits::default()
//!     });
//! ```

use std::time::Duration;

/// Controls worker pool sizing, supervisory polling, and connection timeouts.
///
/// # Worker pool growth
/// ```text
/// [--------------]              [ request counter >= max_queue ]
/// [ num_processes ] --starts--> [    and workers < max_processes ] --> [ spawn worker ]
/// [--------------]              [-------------------------------]
///
/// [ workers > num_processes ] and [ local queues empty ] --> [ retire last worker ]
/// ```
///
/// `num_processes` workers are started immediately. The manager polls every
/// `poll_interval` and grows the pool toward `max_processes` under sustained
/// load, then shrinks back to `num_processes` once idle.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Workers started at launch and the floor the pool shrinks back to.
    pub num_processes: usize,
    /// Ceiling the manager will grow the worker pool to under load.
    pub max_processes: usize,
    /// Shared request-queue depth that triggers growing the pool, if set.
    pub max_queue: Option<usize>,
    /// Interval at which the selector, manager, and workers poll their
    /// respective signals. Bounds how quickly the pool reacts and how long
    /// shutdown can take to notice.
    pub poll_interval: Duration,
    /// TCP listen backlog passed to the OS.
    pub backlog: u32,
    /// Idle budget between keep-alive requests on the same connection; `None`
    /// disables keep-alive entirely (every response closes the connection).
    pub keepalive_timeout: Option<Duration>,
    /// Read deadline for a request already in flight, applied after the first
    /// byte of a new request line has arrived.
    pub request_timeout: Duration,
}

impl Default for ServerLimits {
    fn default() -> Self {
        ServerLimits {
            num_processes: 4,
            max_processes: 32,
            max_queue: Some(64),
            poll_interval: Duration::from_millis(50),
            backlog: 128,
            keepalive_timeout: Some(Duration::from_secs(5)),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Bounds on the shape of an individual request.
///
/// Each field guards a distinct attack surface: `max_line_size` bounds a
/// request line read before any parsing happens, `max_headers` bounds how
/// many header lines a single request may contribute, and `max_request_size`
/// bounds a length-delimited body before it is read into memory.
#[derive(Debug, Clone, Copy)]
pub struct ReqLimits {
    /// Maximum length of the request line, in bytes, before a `414` is sent.
    pub max_line_size: usize,
    /// Maximum number of header lines accepted per request.
    pub max_headers: usize,
    /// Maximum `Content-Length` accepted for a body-carrying request.
    pub max_request_size: usize,
}

impl Default for ReqLimits {
    fn default() -> Self {
        ReqLimits {
            max_line_size: 4096,
            max_headers: 64,
            max_request_size: 1024 * 1024,
        }
    }
}

/// Bounds on how the response writer streams a body back to the peer.
#[derive(Debug, Clone, Copy)]
pub struct RespLimits {
    /// Chunk size used both for `Content-Length`-framed stream bodies and for
    /// each `Transfer-Encoding: chunked` frame.
    pub stream_chunk_size: usize,
}

impl Default for RespLimits {
    fn default() -> Self {
        RespLimits {
            stream_chunk_size: 8 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_limits_defaults_match_spec_constants() {
        let limits = ServerLimits::default();
        assert_eq!(limits.num_processes, 4);
        assert!(limits.max_processes >= limits.num_processes);
    }

    #[test]
    fn req_limits_defaults_match_spec_constants() {
        let limits = ReqLimits::default();
        assert_eq!(limits.max_line_size, 4096);
        assert_eq!(limits.max_headers, 64);
        assert_eq!(limits.max_request_size, 1024 * 1024);
    }

    #[test]
    fn resp_limits_defaults_match_spec_constants() {
        assert_eq!(RespLimits::default().stream_chunk_size, 8 * 1024);
    }
}
