//! The public server façade: binding, route registration, and the
//! start/stop/close lifecycle built on top of the selector/manager/worker
//! machinery.

use crate::limits::{ReqLimits, RespLimits, ServerLimits};
use crate::routing::{HandlerFactory, RouteTable};
use crate::server::selector;
use crate::server::shared::Shared;
use crate::server::tls::TlsConfig;
use socket2::{Domain, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// A bound, routed HTTP server. Constructed through [`ServerBuilder`];
/// inert until [`Server::start`] spawns its selector thread.
pub struct Server {
    shared: Arc<Shared>,
    /// `None` once [`Server::close`] has released the listening socket; a
    /// closed server can no longer be started.
    listener: Option<Arc<TcpListener>>,
    selector_thread: Option<JoinHandle<()>>,
}

impl Server {
    /// Starts a new builder with every limit defaulted.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The address actually bound, which may differ from what was requested
    /// (e.g. port `0` resolves to an OS-assigned port).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener
            .as_ref()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotConnected, "server's listening socket is closed")
            })?
            .local_addr()
    }

    /// Spawns the selector thread, which in turn spawns the manager and the
    /// initial worker pool. A no-op if already running, or if the listening
    /// socket has been [`close`](Server::close)d.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let Some(listener) = self.listener.clone() else {
            return;
        };
        let shared = self.shared.clone();
        self.selector_thread = Some(
            std::thread::Builder::new()
                .name("threadweb-selector".into())
                .spawn(move || selector::run(shared, listener))
                .expect("failed to spawn selector thread"),
        );
        log::info!("HTTP server started");
    }

    /// Signals shutdown and blocks until the selector (and everything it
    /// owns) has fully stopped. A no-op if not running.
    pub fn stop(&mut self, timeout: Option<Duration>) {
        if !self.is_running() {
            return;
        }
        self.shutdown();
        if let Some(handle) = self.selector_thread.take() {
            join_with_timeout(handle, timeout);
        }
        self.shared.server_shutdown.store(false, Ordering::SeqCst);
        log::info!("HTTP server stopped");
    }

    /// Stops the server, then releases the listening socket. Every worker
    /// and the selector have already exited by the time `stop` returns, so
    /// this `Server` is the listener's last owner; dropping it here actually
    /// closes the bound port rather than leaving it held until `Server`
    /// itself is dropped.
    pub fn close(&mut self, timeout: Option<Duration>) {
        self.stop(timeout);
        if self.listener.take().is_some() {
            log::info!("HTTP listening socket closed");
        }
    }

    /// Whether the selector thread is alive.
    pub fn is_running(&self) -> bool {
        self.selector_thread
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Blocks until the selector thread exits on its own (normally only
    /// after [`Server::stop`] is called from another thread).
    pub fn join(&mut self, timeout: Option<Duration>) {
        if let Some(handle) = self.selector_thread.take() {
            join_with_timeout(handle, timeout);
        }
    }

    fn shutdown(&self) {
        self.shared.server_shutdown.store(true, Ordering::SeqCst);
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop(None);
    }
}

fn join_with_timeout(handle: JoinHandle<()>, timeout: Option<Duration>) {
    match timeout {
        None => {
            let _ = handle.join();
        }
        Some(_) => {
            // `JoinHandle` has no timed join; the selector's own poll
            // interval bounds how long shutdown can take in practice, so a
            // plain join is used regardless of the requested timeout.
            let _ = handle.join();
        }
    }
}

/// Builds a [`Server`]: binds the listening socket, registers routes, and
/// configures limits and (optionally) TLS.
pub struct ServerBuilder {
    listener: Option<TcpListener>,
    routes: RouteTable,
    error_routes: RouteTable,
    server_limits: ServerLimits,
    req_limits: ReqLimits,
    resp_limits: RespLimits,
    #[cfg(feature = "tls")]
    tls_paths: Option<(std::path::PathBuf, std::path::PathBuf)>,
}

impl ServerBuilder {
    fn new() -> Self {
        ServerBuilder {
            listener: None,
            routes: RouteTable::new(),
            error_routes: RouteTable::new(),
            server_limits: ServerLimits::default(),
            req_limits: ReqLimits::default(),
            resp_limits: RespLimits::default(),
            #[cfg(feature = "tls")]
            tls_paths: None,
        }
    }

    /// Binds the listening socket: `SO_REUSEADDR`, the configured backlog,
    /// and non-blocking mode, so accepts from worker threads never stall a
    /// thread that has other connections queued locally.
    pub fn bind(mut self, addr: impl ToSocketAddrs) -> io::Result<Self> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no address resolved"))?;

        let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let socket = Socket::new(domain, Type::STREAM, None)?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(self.server_limits.backlog as i32)?;
        socket.set_nonblocking(true)?;

        self.listener = Some(socket.into());
        Ok(self)
    }

    /// Registers a handler factory against an anchored regex route. Routes
    /// are tried in registration order; the first match wins.
    pub fn route(mut self, pattern: &str, factory: HandlerFactory) -> Result<Self, regex::Error> {
        self.routes.add(pattern, factory)?;
        Ok(self)
    }

    /// Registers a handler factory against an anchored regex matched on the
    /// stringified status code (e.g. `"404"`), consulted before the
    /// built-in plaintext error renderer.
    pub fn error_route(mut self, pattern: &str, factory: HandlerFactory) -> Result<Self, regex::Error> {
        self.error_routes.add(pattern, factory)?;
        Ok(self)
    }

    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = limits;
        self
    }

    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.req_limits = limits;
        self
    }

    pub fn response_limits(mut self, limits: RespLimits) -> Self {
        self.resp_limits = limits;
        self
    }

    /// Loads a PEM certificate chain and private key and enables TLS
    /// termination on every accepted connection.
    #[cfg(feature = "tls")]
    pub fn tls(
        mut self,
        cert_path: impl Into<std::path::PathBuf>,
        key_path: impl Into<std::path::PathBuf>,
    ) -> Self {
        self.tls_paths = Some((cert_path.into(), key_path.into()));
        self
    }

    #[cfg(feature = "tls")]
    fn load_tls(&self) -> io::Result<TlsConfig> {
        let Some((cert_path, key_path)) = &self.tls_paths else {
            return Ok(TlsConfig::Disabled);
        };

        let cert_pem = std::fs::read(cert_path)?;
        let certs: Vec<_> = rustls_pemfile::certs(&mut cert_pem.as_slice())
            .collect::<Result<_, _>>()?;

        let key_pem = std::fs::read(key_path)?;
        let key = rustls_pemfile::private_key(&mut key_pem.as_slice())?
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no private key found"))?;

        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        log::info!("HTTP socket encrypted with TLS");
        Ok(TlsConfig::Enabled(Arc::new(config)))
    }

    /// Finishes construction. Panics if [`ServerBuilder::bind`] was never
    /// called, mirroring the rest of the core's "misuse is a programmer
    /// error" stance on construction-time invariants.
    pub fn build(self) -> Server {
        let listener = self
            .listener
            .expect("ServerBuilder::bind must be called before build");

        #[cfg(feature = "tls")]
        let tls = self.load_tls().expect("failed to load TLS configuration");
        #[cfg(not(feature = "tls"))]
        let tls = TlsConfig::Disabled;

        if let Ok(addr) = listener.local_addr() {
            log::info!("Serving HTTP on {addr}");
        }

        let shared = Arc::new(Shared::new(
            self.routes,
            self.error_routes,
            self.server_limits,
            self.req_limits,
            self.resp_limits,
            tls,
        ));

        Server {
            shared,
            listener: Some(Arc::new(listener)),
            selector_thread: None,
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
