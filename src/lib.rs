//! threadweb - a thread-per-worker HTTP/1.1 server core.
//!
//! No async runtime: a selector thread waits for the listening socket to
//! become readable and hands that readiness to a supervised pool of worker
//! threads, each of which owns a private FIFO of in-flight connections and
//! accepts, parses, and responds using nothing but blocking OS primitives.
//!
//! # Protocol support
//!
//! - **HTTP/1.1**: persistent connections, chunked transfer encoding, and
//!   the `100-continue` handshake.
//! - **HTTP/1.0**: basic support, no keep-alive by default.
//!
//! # Concurrency model
//!
//! Every registered [`Handler`] declares which of its methods are readers
//! (concurrent) and which are writers (exclusive) against the resource path
//! they're routed to; a per-resource coordinator enforces that split across
//! the whole worker pool, not just within one connection.
//!
//! # Quick start
//!
//! ```no_run
//! use threadweb::{Handler, HttpError, Request, Response, Server};
//! use std::sync::Arc;
//!
//! struct Hello;
//!
//! impl Handler for Hello {
//!     fn methods(&self) -> &[&str] {
//!         &["GET"]
//!     }
//!
//!     fn call(&self, _method: &str, _request: &Request) -> Result<Response, HttpError> {
//!         Ok(Response::new(200).body("Hello, world!\n"))
//!     }
//! }
//!
//! fn main() -> std::io::Result<()> {
//!     let mut server = Server::builder()
//!         .bind("127.0.0.1:8080")?
//!         .route("/", Arc::new(|| Arc::new(Hello) as Arc<dyn Handler>))
//!         .unwrap()
//!         .build();
//!
//!     server.start();
//!     server.join(None);
//!     Ok(())
//! }
//! ```

mod coordinator;
mod errors;
mod handler;
mod log;
mod routing;

pub mod limits;

pub(crate) mod http {
    pub(crate) mod headers;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod status;
    pub(crate) mod version;
}

pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod manager;
    pub(crate) mod selector;
    pub(crate) mod server_impl;
    pub(crate) mod shared;
    pub(crate) mod tls;
    pub(crate) mod worker;
}

pub use crate::errors::HttpError;
pub use crate::handler::Handler;
pub use crate::http::headers::Headers;
pub use crate::http::request::Request;
pub use crate::http::response::{Body, Response};
pub use crate::http::status::StatusCode;
pub use crate::http::version::Version;
pub use crate::routing::HandlerFactory;
pub use crate::server::server_impl::{Server, ServerBuilder};
