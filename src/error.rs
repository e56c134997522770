//! Error types for keepwire.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::MAX_BODY_LEN;

/// Main error type for all session operations.
///
/// The type is `Clone` because a session records its first fatal error once
/// and then hands the same value to every reader that asks afterwards.
#[derive(Debug, Clone, Error)]
pub enum KeepwireError {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// A received header carried a different protocol version.
    #[error("protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version this session speaks.
        expected: u8,
        /// Version found in the received header.
        actual: u8,
    },

    /// A read or write deadline elapsed. The session stays usable.
    #[error("deadline elapsed")]
    Timeout,

    /// The session has been closed and accepts no more work.
    #[error("session closed")]
    SessionClosed,

    /// Payload does not fit the 16-bit body length field.
    #[error("payload of {0} bytes exceeds maximum frame body of {max} bytes", max = MAX_BODY_LEN)]
    PayloadTooLarge(usize),

    /// Nothing was received from the peer within the idle timeout.
    #[error("peer unresponsive for {0:?}")]
    PeerUnresponsive(Duration),

    /// MessagePack serialization/deserialization error.
    #[error("codec error: {0}")]
    Codec(String),
}

impl KeepwireError {
    /// Whether this error ends the session for good.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            KeepwireError::Io(_)
                | KeepwireError::VersionMismatch { .. }
                | KeepwireError::SessionClosed
                | KeepwireError::PeerUnresponsive(_)
        )
    }

    /// Whether this error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, KeepwireError::Timeout)
    }

    /// The `io::ErrorKind` behind an I/O error, if any.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            KeepwireError::Io(e) => Some(e.kind()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for KeepwireError {
    fn from(e: std::io::Error) -> Self {
        KeepwireError::Io(Arc::new(e))
    }
}

impl From<rmp_serde::encode::Error> for KeepwireError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        KeepwireError::Codec(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for KeepwireError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        KeepwireError::Codec(e.to_string())
    }
}

/// Result type alias using KeepwireError.
pub type Result<T> = std::result::Result<T, KeepwireError>;
