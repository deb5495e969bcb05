//! The handler contract: per-method dispatch, body pre-processing, and the
//! built-in dummy/error handlers.

use crate::errors::{ErrorKind, HttpError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::limits::ReqLimits;
use std::io::{BufRead, Write};

/// Methods whose requests carry a body the core reads before dispatch.
const BODY_CARRYING_METHODS: &[&str] = &["POST", "PUT", "PATCH"];

/// A registered route target.
///
/// Per-method entry points are looked up in a fixed table built once at
/// registration time (see [`Handler::methods`]), not discovered by name
/// prefix at call time. `HEAD` is not a distinct entry point: it dispatches
/// to the `GET` entry with the effective method passed explicitly, then the
/// response body is suppressed — no field is mutated to fake a `GET`.
pub trait Handler: Send + Sync {
    /// Methods this handler treats as non-mutating; they may run
    /// concurrently against the same resource. Everything else is a writer.
    /// Defaults to the conventional `GET`/`HEAD`/`OPTIONS` set.
    fn reader_methods(&self) -> &[&str] {
        &["GET", "HEAD", "OPTIONS"]
    }

    /// The methods this handler implements an entry point for. Drives both
    /// routing (`405` if the method isn't here) and the computed `Allow`
    /// header. `OPTIONS` and `HEAD` are synthesized by [`respond`] and
    /// should not be listed here unless the handler wants to override them.
    fn methods(&self) -> &[&str];

    /// Invokes the entry point for `method` (already resolved: `HEAD`
    /// requests arrive here as `"GET"`).
    fn call(&self, method: &str, request: &Request) -> Result<Response, HttpError>;

    /// Called once, before the body is read, when the peer sent
    /// `Expect: 100-continue`. Returning `Err` aborts the body read and
    /// renders that error instead of writing the `100 Continue` line.
    fn check_continue(&self, _request: &Request) -> Result<(), HttpError> {
        Ok(())
    }

    /// Transforms the raw inbound body bytes before they're stored on the
    /// request. Identity by default so content-type-aware mixins can layer
    /// on top (JSON, form-encoded, etc.).
    fn decode(&self, body: Vec<u8>) -> Result<Vec<u8>, HttpError> {
        Ok(body)
    }

    /// Transforms the outbound response after `call` returns. Identity by
    /// default.
    fn encode(&self, response: Response) -> Result<Response, HttpError> {
        Ok(response)
    }

    /// Renders an [`HttpError`] that escaped a normal route's dispatch.
    ///
    /// The connection cycle looks this up by matching the error's status
    /// code against the error-route table and calls it on whatever handler
    /// matched; the default (used when no error route matches, and by the
    /// built-in dummy/error handlers) is the plaintext renderer.
    fn render_error(&self, error: &HttpError) -> Response {
        render_http_error(error)
    }
}

/// Whether `method`, per this handler's declared disposition, is a reader
/// (concurrent) or a writer (exclusive) for the resource coordinator.
pub(crate) fn is_reader(handler: &dyn Handler, method: &str) -> bool {
    handler.reader_methods().iter().any(|m| m.eq_ignore_ascii_case(method))
}

fn computed_allow(handler: &dyn Handler) -> String {
    let mut methods: Vec<&str> = handler.methods().to_vec();
    if methods.iter().any(|m| m.eq_ignore_ascii_case("GET")) {
        methods.push("HEAD");
    }
    methods.push("OPTIONS");
    methods.join(", ")
}

/// Runs the full per-request dispatch: method resolution, body pre-read
/// (`Content-Length` validation, `100-continue`, decode), the handler call,
/// and outbound `encode`.
///
/// A handler panic is caught and never propagates outward, but renders
/// straight to a `500` here rather than through the error-route table: a
/// panic isn't a declared `HttpError` the caller can route on. An `Err`
/// returned here is always a handler-raised [`HttpError`], left for the
/// caller (the connection cycle) to resolve through the error-route table
/// before falling back to [`Handler::render_error`].
pub(crate) fn respond(
    handler: &dyn Handler,
    request: &mut Request,
    stream: &mut (impl BufRead + Write),
    req_limits: &ReqLimits,
) -> Result<Response, HttpError> {
    let raw_method = request.method.clone();

    if raw_method.eq_ignore_ascii_case("OPTIONS") {
        return Ok(Response::new(204).header("Allow", computed_allow(handler)));
    }

    let effective_method = if raw_method.eq_ignore_ascii_case("HEAD") {
        "GET"
    } else {
        raw_method.as_str()
    };

    let has_entry = handler
        .methods()
        .iter()
        .any(|m| m.eq_ignore_ascii_case(effective_method));
    if !has_entry {
        return Ok(Response::new(405).header("Allow", computed_allow(handler)));
    }

    if BODY_CARRYING_METHODS
        .iter()
        .any(|m| m.eq_ignore_ascii_case(effective_method))
    {
        read_body(handler, request, stream, req_limits)?;
    }

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        handler.call(effective_method, request)
    }));

    let result = match outcome {
        Ok(result) => result,
        Err(_) => {
            log::error!("handler panicked while serving {effective_method} {}", request.resource());
            return Ok(Response::new(500).body("500 - Internal Server Error\n"));
        }
    };

    let mut response = handler.encode(result?)?;

    if raw_method.eq_ignore_ascii_case("HEAD") {
        response.set_write_body(false);
    }
    Ok(response)
}

fn read_body(
    handler: &dyn Handler,
    request: &mut Request,
    stream: &mut (impl BufRead + Write),
    req_limits: &ReqLimits,
) -> Result<(), HttpError> {
    let content_length = match request.headers().get("content-length") {
        Some(value) => match value.trim().parse::<usize>() {
            Ok(n) => n,
            Err(_) => return Err(error_kind_to_http_error(&ErrorKind::InvalidContentLength)),
        },
        None => 0,
    };

    if content_length > req_limits.max_request_size {
        return Err(error_kind_to_http_error(&ErrorKind::BodyTooLarge));
    }

    let expects_continue = request
        .headers()
        .get("expect")
        .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"));

    if expects_continue {
        handler.check_continue(request)?;
        let _ = stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n");
        let _ = stream.flush();
    }

    let mut raw = vec![0u8; content_length];
    if content_length > 0 && stream.read_exact(&mut raw).is_err() {
        return Err(error_kind_to_http_error(&ErrorKind::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "body truncated",
        ))));
    }

    request.body = Some(handler.decode(raw)?);
    Ok(())
}

pub(crate) fn error_kind_to_http_error(error: &ErrorKind) -> HttpError {
    HttpError::new(error.status().code())
        .with_phrase(error.phrase())
        .with_body(format!("{} - {}\n", error.status().code(), error.phrase()))
}

/// Renders an [`HttpError`] raised by a handler into a plain `Response`,
/// applying any header/phrase/body overrides it carries. The error-route
/// table (see [`crate::routing`]) is consulted by the connection cycle
/// before falling back to this built-in renderer.
pub(crate) fn render_http_error(error: &HttpError) -> Response {
    let phrase = error.phrase_str().to_string();
    let body = error
        .body
        .clone()
        .unwrap_or_else(|| format!("{} - {}\n", error.code, phrase));
    let mut response = Response::new(error.code).phrase(phrase).body(body);
    if let Some(headers) = &error.headers {
        for (name, value) in headers {
            response = response.header(name, value.clone());
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Echo;
    impl Handler for Echo {
        fn methods(&self) -> &[&str] {
            &["GET", "POST"]
        }
        fn call(&self, method: &str, request: &Request) -> Result<Response, HttpError> {
            match method {
                "GET" => Ok(Response::new(200).body("OK")),
                "POST" => Ok(Response::new(200).body(request.body().unwrap_or(&[]).to_vec())),
                _ => unreachable!(),
            }
        }
    }

    fn make_request(method: &str) -> Request {
        match crate::http::request::parse_request(
            &mut Cursor::new(format!("{method} / HTTP/1.1\r\n\r\n").into_bytes()),
            &ReqLimits::default(),
        )
        .unwrap()
        {
            crate::http::request::ParseOutcome::Parsed(req) => req,
            _ => panic!("expected parsed request"),
        }
    }

    #[test]
    fn options_returns_204_with_allow() {
        let handler = Echo;
        let mut request = make_request("OPTIONS");
        let mut stream = Cursor::new(Vec::new());
        let response = respond(&handler, &mut request, &mut stream, &ReqLimits::default()).unwrap();
        assert_eq!(response.status, 204);
        assert_eq!(response.headers.get("allow"), Some("GET, POST, HEAD, OPTIONS"));
    }

    #[test]
    fn unknown_method_is_405_with_allow() {
        let handler = Echo;
        let mut request = make_request("DELETE");
        let mut stream = Cursor::new(Vec::new());
        let response = respond(&handler, &mut request, &mut stream, &ReqLimits::default()).unwrap();
        assert_eq!(response.status, 405);
        assert!(response.headers.get("allow").unwrap().contains("GET"));
    }

    #[test]
    fn head_dispatches_to_get_and_suppresses_body() {
        let handler = Echo;
        let mut request = make_request("HEAD");
        let mut stream = Cursor::new(Vec::new());
        let response = respond(&handler, &mut request, &mut stream, &ReqLimits::default()).unwrap();
        assert_eq!(response.status, 200);
        assert!(!response.write_body);
    }

    #[test]
    fn handler_panic_becomes_500() {
        struct Panicky;
        impl Handler for Panicky {
            fn methods(&self) -> &[&str] {
                &["GET"]
            }
            fn call(&self, _method: &str, _request: &Request) -> Result<Response, HttpError> {
                panic!("boom");
            }
        }
        let handler = Panicky;
        let mut request = make_request("GET");
        let mut stream = Cursor::new(Vec::new());
        let response = respond(&handler, &mut request, &mut stream, &ReqLimits::default()).unwrap();
        assert_eq!(response.status, 500);
    }

    #[test]
    fn handler_raised_http_error_propagates_to_caller() {
        struct Raises;
        impl Handler for Raises {
            fn methods(&self) -> &[&str] {
                &["GET"]
            }
            fn call(&self, _method: &str, _request: &Request) -> Result<Response, HttpError> {
                Err(HttpError::new(409).with_phrase("Conflict"))
            }
        }
        let handler = Raises;
        let mut request = make_request("GET");
        let mut stream = Cursor::new(Vec::new());
        let error = respond(&handler, &mut request, &mut stream, &ReqLimits::default())
            .unwrap_err();
        assert_eq!(error.code, 409);
    }
}
