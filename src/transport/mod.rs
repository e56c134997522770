//! Transport module - what a session can run over.
//!
//! A session takes exclusive ownership of an already-connected byte stream.
//! The [`Transport`] trait adds optional address accessors on top of
//! `AsyncRead + AsyncWrite` and is implemented for:
//! - `tokio::net::TcpStream`
//! - `tokio::net::UnixStream` (unix)
//! - `tokio::io::DuplexStream` (in-memory, no addresses)

mod addr;

pub use addr::TransportAddr;

use tokio::io::{AsyncRead, AsyncWrite};

/// A connected, ordered, bidirectional byte stream a session can own.
///
/// Both address accessors default to `None`; implement them for transports
/// that know their endpoints.
pub trait Transport: AsyncRead + AsyncWrite + Send + 'static {
    /// Local endpoint of the connection.
    fn local_addr(&self) -> Option<TransportAddr> {
        None
    }

    /// Remote endpoint of the connection.
    fn peer_addr(&self) -> Option<TransportAddr> {
        None
    }
}

impl Transport for tokio::net::TcpStream {
    fn local_addr(&self) -> Option<TransportAddr> {
        tokio::net::TcpStream::local_addr(self)
            .ok()
            .map(TransportAddr::Inet)
    }

    fn peer_addr(&self) -> Option<TransportAddr> {
        tokio::net::TcpStream::peer_addr(self)
            .ok()
            .map(TransportAddr::Inet)
    }
}

#[cfg(unix)]
impl Transport for tokio::net::UnixStream {
    fn local_addr(&self) -> Option<TransportAddr> {
        tokio::net::UnixStream::local_addr(self)
            .ok()
            .map(TransportAddr::from)
    }

    fn peer_addr(&self) -> Option<TransportAddr> {
        tokio::net::UnixStream::peer_addr(self)
            .ok()
            .map(TransportAddr::from)
    }
}

impl Transport for tokio::io::DuplexStream {}
