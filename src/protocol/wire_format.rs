//! Wire format encoding and decoding.
//!
//! Implements the 4-byte header format:
//! ```text
//! ┌────────┬─────────┬──────────┐
//! │ Cmd    │ Version │ Body len │
//! │ 1 byte │ 1 byte  │ 2 bytes  │
//! │        │         │ uint16 BE│
//! └────────┴─────────┴──────────┘
//! ```
//!
//! Only `Data` frames are followed by a body. There is no magic number and no
//! checksum.

use crate::error::{KeepwireError, Result};

/// Header size in bytes (fixed, exactly 4).
pub const HEADER_SIZE: usize = 4;

/// Largest body a single frame can carry.
pub const MAX_BODY_LEN: usize = u16::MAX as usize;

/// Protocol major version spoken by default.
pub const DEFAULT_VERSION: u8 = 1;

/// Raw command byte values.
pub mod cmd {
    /// Connection setup marker. Accepted but never acted on.
    pub const SYN: u8 = 0;
    /// Zero-payload liveness frame.
    pub const HEARTBEAT: u8 = 1;
    /// Application data; the only command that carries a body.
    pub const DATA: u8 = 2;
}

/// Frame command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Syn,
    Heartbeat,
    Data,
    /// A command this version does not know. Kept so newer peers can add
    /// commands without breaking older ones.
    Other(u8),
}

impl Command {
    /// Map a raw command byte.
    pub fn from_u8(value: u8) -> Self {
        match value {
            cmd::SYN => Command::Syn,
            cmd::HEARTBEAT => Command::Heartbeat,
            cmd::DATA => Command::Data,
            other => Command::Other(other),
        }
    }

    /// The raw command byte.
    pub fn as_u8(self) -> u8 {
        match self {
            Command::Syn => cmd::SYN,
            Command::Heartbeat => cmd::HEARTBEAT,
            Command::Data => cmd::DATA,
            Command::Other(value) => value,
        }
    }

    /// Whether a body follows the header on the wire.
    #[inline]
    pub fn has_body(self) -> bool {
        self == Command::Data
    }
}

impl From<u8> for Command {
    fn from(value: u8) -> Self {
        Command::from_u8(value)
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Frame command.
    pub command: Command,
    /// Protocol major version of the sender.
    pub version: u8,
    /// Body length in bytes (meaningful for `Data` only).
    pub body_len: u16,
}

impl Header {
    /// Create a new header.
    pub fn new(command: Command, version: u8, body_len: u16) -> Self {
        Self {
            command,
            version,
            body_len,
        }
    }

    /// Header of a heartbeat frame.
    pub fn heartbeat(version: u8) -> Self {
        Self::new(Command::Heartbeat, version, 0)
    }

    /// Header of a data frame carrying `len` bytes.
    ///
    /// Fails with `PayloadTooLarge` instead of truncating the length.
    pub fn data(version: u8, len: usize) -> Result<Self> {
        let body_len = u16::try_from(len).map_err(|_| KeepwireError::PayloadTooLarge(len))?;
        Ok(Self::new(Command::Data, version, body_len))
    }

    /// Encode header to bytes (Big Endian length).
    ///
    /// # Example
    ///
    /// ```
    /// use keepwire::protocol::{Command, Header};
    ///
    /// let header = Header::new(Command::Data, 1, 4);
    /// assert_eq!(header.encode(), [2, 1, 0, 4]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (4 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0] = self.command.as_u8();
        buf[1] = self.version;
        buf[2..4].copy_from_slice(&self.body_len.to_be_bytes());
    }

    /// Decode header from bytes.
    ///
    /// Returns `None` if buffer is too short.
    ///
    /// # Example
    ///
    /// ```
    /// use keepwire::protocol::{Command, Header};
    ///
    /// let header = Header::decode(&[2, 1, 0x01, 0x00]).unwrap();
    /// assert_eq!(header.command, Command::Data);
    /// assert_eq!(header.version, 1);
    /// assert_eq!(header.body_len, 256);
    /// ```
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            command: Command::from_u8(buf[0]),
            version: buf[1],
            body_len: u16::from_be_bytes([buf[2], buf[3]]),
        })
    }

    /// Number of body bytes that follow this header on the wire.
    #[inline]
    pub fn bodylen(&self) -> usize {
        if self.command.has_body() {
            self.body_len as usize
        } else {
            0
        }
    }

    /// Check the header version against the one this side speaks.
    pub fn validate(&self, expected_version: u8) -> Result<()> {
        if self.version != expected_version {
            return Err(KeepwireError::VersionMismatch {
                expected: expected_version,
                actual: self.version,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let original = Header::new(Command::Data, 1, 100);
        let decoded = Header::decode(&original.encode()).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_header_big_endian_length() {
        let header = Header::new(Command::Data, 3, 0x0102);
        let bytes = header.encode();

        assert_eq!(bytes[0], cmd::DATA);
        assert_eq!(bytes[1], 3);
        assert_eq!(bytes[2], 0x01);
        assert_eq!(bytes[3], 0x02);
    }

    #[test]
    fn test_heartbeat_header_bytes() {
        assert_eq!(Header::heartbeat(1).encode(), [1, 1, 0, 0]);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        assert!(Header::decode(&[2, 1, 0]).is_none());
    }

    #[test]
    fn test_data_header_rejects_oversized_body() {
        assert_eq!(Header::data(1, MAX_BODY_LEN).unwrap().body_len, u16::MAX);

        let result = Header::data(1, MAX_BODY_LEN + 1);
        assert!(matches!(
            result,
            Err(KeepwireError::PayloadTooLarge(65536))
        ));
    }

    #[test]
    fn test_validate_version() {
        let header = Header::new(Command::Heartbeat, 2, 0);
        assert!(header.validate(2).is_ok());

        match header.validate(1) {
            Err(KeepwireError::VersionMismatch { expected, actual }) => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected version mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_only_data_has_body() {
        assert_eq!(Header::new(Command::Data, 1, 9).bodylen(), 9);
        assert_eq!(Header::new(Command::Heartbeat, 1, 9).bodylen(), 0);
        assert_eq!(Header::new(Command::Syn, 1, 9).bodylen(), 0);
        assert_eq!(Header::new(Command::Other(42), 1, 9).bodylen(), 0);
    }

    #[test]
    fn test_command_byte_mapping() {
        for raw in 0..=u8::MAX {
            assert_eq!(Command::from_u8(raw).as_u8(), raw);
        }
        assert_eq!(Command::from(7), Command::Other(7));
    }
}
