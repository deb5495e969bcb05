//! Optional TLS termination, layered over the plain TCP stream at accept
//! time. Absent the `tls` feature, [`TlsConfig`] only ever holds `Disabled`
//! and every accepted connection is a bare [`TcpStream`].

use crate::server::connection::Stream;
use std::io;
use std::net::TcpStream;

#[cfg(feature = "tls")]
use std::sync::Arc;

pub(crate) enum TlsConfig {
    Disabled,
    #[cfg(feature = "tls")]
    Enabled(Arc<rustls::ServerConfig>),
}

impl TlsConfig {
    /// Wraps a freshly accepted stream, performing the TLS handshake inline
    /// when enabled. A handshake failure is reported to the caller, which
    /// treats it the same as any other bad accept: drop the connection, keep
    /// serving.
    pub(crate) fn accept(&self, stream: TcpStream) -> io::Result<Box<dyn Stream>> {
        match self {
            TlsConfig::Disabled => Ok(Box::new(stream)),
            #[cfg(feature = "tls")]
            TlsConfig::Enabled(config) => {
                let conn = rustls::ServerConnection::new(config.clone())
                    .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
                let mut tls_stream = rustls::StreamOwned::new(conn, stream);
                tls_stream.conn.complete_io(&mut tls_stream.sock)?;
                Ok(Box::new(tls_stream))
            }
        }
    }
}
