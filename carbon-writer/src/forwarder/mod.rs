use std::{
    fmt, io,
    net::{SocketAddr, ToSocketAddrs as _},
    time::Duration,
};

use thiserror::Error;

pub mod sync;

/// Address of the Carbon line receiver.
///
/// The host name is resolved on every connection attempt, so a receiver that moves to a new address is picked up on
/// the next reconnect.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteAddr {
    host: String,
    port: u16,
}

impl RemoteAddr {
    /// Creates a new `RemoteAddr`.
    pub fn new<H>(host: H, port: u16) -> Self
    where
        H: Into<String>,
    {
        RemoteAddr { host: host.into(), port }
    }

    /// Returns the host name of the receiver.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port of the receiver.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolves the address into the socket addresses to try connecting to, in order.
    ///
    /// This blocks on the system resolver, with no timeout of its own.
    pub fn resolve(&self) -> io::Result<Vec<SocketAddr>> {
        let addrs = (self.host.as_str(), self.port).to_socket_addrs()?.collect::<Vec<_>>();
        if addrs.is_empty() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses"));
        }

        Ok(addrs)
    }
}

impl fmt::Display for RemoteAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Forwarder configuration.
#[derive(Clone, Debug)]
pub struct ForwarderConfiguration {
    /// Address of the line receiver.
    pub remote_addr: RemoteAddr,

    /// Timeout for each connection attempt, per resolved address.
    pub connect_timeout: Duration,

    /// Timeout for writing a payload.
    pub write_timeout: Duration,

    /// Minimum time between a failed connection attempt and the next one.
    pub reconnect_backoff: Duration,
}

/// Errors that could occur while forwarding a payload to the line receiver.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// A previous connection attempt failed too recently to try again.
    #[error("not connected to {addr}; next connection attempt allowed in {retry_in:?}")]
    Throttled {
        /// Address of the line receiver.
        addr: RemoteAddr,

        /// Time remaining until a connection attempt will be made again.
        retry_in: Duration,
    },

    /// Connecting to the line receiver failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Address of the line receiver.
        addr: RemoteAddr,

        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Writing the payload to the line receiver failed.
    #[error("failed to send payload to {addr}: {source}")]
    Send {
        /// Address of the line receiver.
        addr: RemoteAddr,

        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}
