//! Transport endpoint addresses.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Address of one end of a transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransportAddr {
    /// TCP endpoint.
    Inet(SocketAddr),
    /// Unix domain socket endpoint; `None` when the socket is unnamed.
    Unix(Option<PathBuf>),
}

impl fmt::Display for TransportAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportAddr::Inet(addr) => write!(f, "{}", addr),
            TransportAddr::Unix(Some(path)) => write!(f, "unix:{}", path.display()),
            TransportAddr::Unix(None) => f.write_str("unix:(unnamed)"),
        }
    }
}

impl From<SocketAddr> for TransportAddr {
    fn from(addr: SocketAddr) -> Self {
        TransportAddr::Inet(addr)
    }
}

#[cfg(unix)]
impl From<tokio::net::unix::SocketAddr> for TransportAddr {
    fn from(addr: tokio::net::unix::SocketAddr) -> Self {
        TransportAddr::Unix(addr.as_pathname().map(PathBuf::from))
    }
}
