//! A single TCP (or TLS) connection's request/response cycle.
//!
//! One [`Connection`] is owned by exactly one worker at a time. It survives
//! across keep-alive requests and across a lock-wait requeue (the latter
//! reusing the already-parsed [`Request`] rather than re-reading bytes, per
//! the route/handler resolution staying pinned for the retry).

use crate::coordinator::OwnerId;
use crate::errors::HttpError;
use crate::handler::{self, is_reader, Handler};
use crate::http::request::{parse_request, ParseOutcome, Request};
use crate::http::response::{write_response, Response};
use crate::http::version::Version;
use crate::log::AccessLogRecord;
use crate::server::shared::Shared;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

/// Unifies a plain TCP stream and (under the `tls` feature) a TLS-wrapped
/// one behind the read/write/timeout operations a connection cycle needs.
pub(crate) trait Stream: Read + Write + Send {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
}

impl Stream for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }
}

#[cfg(feature = "tls")]
impl Stream for rustls::StreamOwned<rustls::ServerConnection, TcpStream> {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.sock.set_read_timeout(timeout)
    }
}

/// State retained across a connection's request/response cycles: which
/// route matched, the resource lock it needs, and the already-parsed
/// request when a cycle is being retried after a lock-wait.
struct Pending {
    request: Request,
    handler: Arc<dyn Handler>,
    is_writer: bool,
}

/// A duplex wire handle: buffered reads through the inner `BufReader`,
/// unbuffered writes straight to the underlying stream. Exists so
/// [`handler::respond`] can take a single `impl BufRead + Write` parameter
/// instead of two handles aliasing the same socket, which the borrow
/// checker won't allow as separate `&mut` arguments.
struct Wire(BufReader<Box<dyn Stream>>);

impl Read for Wire {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl BufRead for Wire {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.0.fill_buf()
    }
    fn consume(&mut self, amt: usize) {
        self.0.consume(amt)
    }
}

impl Write for Wire {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.get_mut().write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.0.get_mut().flush()
    }
}

pub(crate) struct Connection {
    wire: Wire,
    peer_addr: SocketAddr,
    request_id: u64,
    pending: Option<Pending>,
}

impl Connection {
    pub(crate) fn new(stream: Box<dyn Stream>, peer_addr: SocketAddr, request_id: u64) -> Self {
        Connection {
            wire: Wire(BufReader::new(stream)),
            peer_addr,
            request_id,
            pending: None,
        }
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) {
        let _ = self.wire.0.get_ref().set_read_timeout(timeout);
    }

    /// Severs the connection. Errors are expected (the peer may already be
    /// gone) and are not worth surfacing.
    pub(crate) fn close(&mut self) {
        let _ = self.wire.flush();
    }
}

/// Outcome of one call to [`run_cycle`].
pub(crate) enum CycleOutcome {
    /// The resource lock was not available; requeue with `already_handled =
    /// false` so the worker retries after a short delay.
    NotYetHandled,
    /// A full request/response cycle completed. `keep_alive` says whether
    /// the connection should be requeued for another request or closed.
    Done { keep_alive: bool },
    /// The peer closed the connection, or a fatal transport error occurred;
    /// close without writing anything further.
    PeerGone,
}

/// Runs one cycle: parse-or-reuse a request, resolve its route, acquire the
/// resource lock, dispatch to the handler, write the response.
///
/// `initial_timeout`, when set, bounds only the wait for the first byte of a
/// *new* request line (the keep-alive idle budget); once any byte has
/// arrived the connection's full `request_timeout` applies. Ignored entirely
/// when resuming a skipped (lock-wait retry) cycle.
pub(crate) fn run_cycle(
    shared: &Shared,
    worker_id: usize,
    conn: &mut Connection,
    initial_timeout: Option<Duration>,
) -> CycleOutcome {
    let pending = match conn.pending.take() {
        Some(pending) => pending,
        None => match read_and_route(shared, conn, initial_timeout) {
            Ok(pending) => pending,
            Err(outcome) => return outcome,
        },
    };

    let Pending {
        mut request,
        handler,
        is_writer,
    } = pending;

    let owner = OwnerId {
        worker_id,
        request_id: conn.request_id,
    };

    if !shared.coordinator.acquire(owner, request.resource(), is_writer) {
        // Liveness probe: a client that already dropped the connection will
        // fail this write, which we treat as a hard close rather than
        // requeuing forever.
        if conn.wire.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").is_err() {
            conn.pending = None;
            return CycleOutcome::PeerGone;
        }
        let _ = conn.wire.flush();
        conn.pending = Some(Pending {
            request,
            handler,
            is_writer,
        });
        return CycleOutcome::NotYetHandled;
    }

    let version = request.version();
    let keep_alive_requested = request.keep_alive();
    let request_line = request.request_line().to_string();

    let result = handler::respond(
        handler.as_ref(),
        &mut request,
        &mut conn.wire,
        &shared.req_limits,
    );

    shared.coordinator.release(request.resource(), is_writer);

    let response = match result {
        Ok(response) => response,
        Err(error) => resolve_error(shared, handler.as_ref(), &error),
    };

    write_cycle_response(
        shared,
        conn,
        version,
        response,
        keep_alive_requested,
        &request_line,
    )
}

/// Reads and parses a fresh request off the wire, then resolves its route.
/// A parse failure or route miss still produces a well-formed cycle outcome
/// (never a panic): the failure is rendered uniformly through the
/// error-route table exactly like a handler-raised [`HttpError`].
fn read_and_route(
    shared: &Shared,
    conn: &mut Connection,
    initial_timeout: Option<Duration>,
) -> Result<Pending, CycleOutcome> {
    conn.set_read_timeout(initial_timeout.or(Some(shared.server_limits.request_timeout)));

    let outcome = match parse_request(&mut conn.wire, &shared.req_limits) {
        Ok(outcome) => outcome,
        Err(_) => return Err(CycleOutcome::PeerGone),
    };

    conn.set_read_timeout(Some(shared.server_limits.request_timeout));

    let (error, version, request_line) = match outcome {
        ParseOutcome::PeerClosed => return Err(CycleOutcome::PeerGone),
        ParseOutcome::Parsed(mut request) => match shared.routes.matched(request.resource()) {
            Some(matched) => {
                request.named_captures = matched.named.into_iter().collect();
                request.positional_captures = matched.positional;
                let is_writer = !is_reader(matched.handler.as_ref(), request.method());
                return Ok(Pending {
                    request,
                    handler: matched.handler,
                    is_writer,
                });
            }
            None => {
                let version = request.version();
                let keep_alive = request.keep_alive();
                let request_line = request.request_line().to_string();
                let response = resolve_error(shared, &DummyHandler, &HttpError::new(404));
                return Err(write_cycle_response(
                    shared,
                    conn,
                    version,
                    response,
                    keep_alive,
                    &request_line,
                ));
            }
        },
        ParseOutcome::Failed {
            error,
            version,
            request_line,
        } => (error, version, request_line),
    };

    let http_error = crate::handler::error_kind_to_http_error(&error);
    let response = resolve_error(shared, &DummyHandler, &http_error);
    Err(write_cycle_response(
        shared,
        conn,
        version,
        response,
        false,
        &request_line,
    ))
}

/// A handler with no routes of its own, used only to render the built-in
/// plaintext error body when no error-route entry matches.
struct DummyHandler;

impl Handler for DummyHandler {
    fn methods(&self) -> &[&str] {
        &[]
    }
    fn call(&self, _method: &str, _request: &Request) -> Result<Response, HttpError> {
        unreachable!("DummyHandler is never routed to directly")
    }
}

/// Resolves an [`HttpError`] (handler-raised, or synthesized from a parse
/// failure/404) by matching its status code against the error-route table,
/// falling back to the origin handler's (or the built-in) plaintext renderer.
fn resolve_error(shared: &Shared, origin: &dyn Handler, error: &HttpError) -> Response {
    let code_str = error.code.to_string();
    match shared.error_routes.matched(&code_str) {
        Some(matched) => matched.handler.render_error(error),
        None => origin.render_error(error),
    }
}

fn write_cycle_response(
    shared: &Shared,
    conn: &mut Connection,
    version: Version,
    response: Response,
    keep_alive_requested: bool,
    request_line: &str,
) -> CycleOutcome {
    let status = response.status;
    let write_result = write_response(
        &mut conn.wire,
        version,
        response,
        keep_alive_requested,
        &shared.resp_limits,
    );

    let size = match write_result {
        Ok(size) => size,
        Err(err) => {
            log::warn!("wire error writing response to {}: {err}", conn.peer_addr);
            return CycleOutcome::PeerGone;
        }
    };

    AccessLogRecord {
        host: conn.peer_addr,
        request_line,
        status,
        size,
    }
    .emit();

    // The writer forces `Connection: close` on any status >= 400; a
    // well-formed response's own framing decision is the final word on
    // whether this connection survives for another request.
    CycleOutcome::Done {
        keep_alive: keep_alive_requested && status < 400,
    }
}
