//! Frame struct with typed accessors.
//!
//! Represents a complete protocol frame with header and body.
//! Uses `bytes::Bytes` for zero-copy body sharing.
//!
//! # Example
//!
//! ```
//! use keepwire::protocol::{Command, Frame, Header};
//! use bytes::Bytes;
//!
//! let header = Header::new(Command::Data, 1, 5);
//! let frame = Frame::new(header, Bytes::from_static(b"hello"));
//!
//! assert!(frame.is_data());
//! assert_eq!(frame.payload(), b"hello");
//! ```

use bytes::Bytes;

use super::wire_format::{Command, Header, HEADER_SIZE};
use crate::error::Result;

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Body bytes; always empty for commands other than `Data`.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and body.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get a reference to the body bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the body length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Get the command.
    #[inline]
    pub fn command(&self) -> Command {
        self.header.command
    }

    /// Get the version byte.
    #[inline]
    pub fn version(&self) -> u8 {
        self.header.version
    }

    #[inline]
    pub fn is_data(&self) -> bool {
        self.header.command == Command::Data
    }

    #[inline]
    pub fn is_heartbeat(&self) -> bool {
        self.header.command == Command::Heartbeat
    }

    /// Consume the frame, keeping only the body.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

/// Build a complete frame as a single byte vector.
///
/// Produces `[cmd, version, len_hi, len_lo]` followed by `payload`.
///
/// # Example
///
/// ```
/// use keepwire::protocol::{build_frame, Command};
///
/// let bytes = build_frame(Command::Data, 1, b"ping").unwrap();
/// assert_eq!(bytes, [2, 1, 0, 4, b'p', b'i', b'n', b'g']);
/// ```
///
/// # Errors
///
/// Returns `PayloadTooLarge` if `payload` is longer than 65535 bytes.
pub fn build_frame(command: Command, version: u8, payload: &[u8]) -> Result<Vec<u8>> {
    let header = match command {
        Command::Data => Header::data(version, payload.len())?,
        other => Header::new(other, version, 0),
    };
    let body: &[u8] = if command.has_body() { payload } else { &[] };

    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(body);
    Ok(buf)
}
