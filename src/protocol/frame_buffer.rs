//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: Need at least 4 bytes
//! - `WaitingForBody`: Data header parsed, need N more body bytes
//!
//! [`FrameReader`] drives a `FrameBuffer` from any `AsyncRead`, which is how
//! the session decodes frames off the transport.
//!
//! # Example
//!
//! ```
//! use keepwire::protocol::{build_frame, Command, FrameBuffer};
//!
//! let mut buffer = FrameBuffer::new(1);
//! let bytes = build_frame(Command::Data, 1, b"hello").unwrap();
//!
//! let frames = buffer.push(&bytes).unwrap();
//! assert_eq!(frames[0].payload(), b"hello");
//! ```

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::wire_format::{Header, HEADER_SIZE, MAX_BODY_LEN};
use super::Frame;
use crate::error::Result;

/// Default read buffer size for [`FrameReader`].
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for complete header (need 4 bytes).
    WaitingForHeader,
    /// Data header parsed, waiting for body bytes.
    WaitingForBody { header: Header, remaining: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// Every header is checked against the version this buffer was created
/// with; a mismatch is reported as `VersionMismatch` and nothing past that
/// header is decoded.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Version every header must carry.
    version: u8,
}

impl FrameBuffer {
    /// Create a new frame buffer expecting `version`.
    pub fn new(version: u8) -> Self {
        Self::with_capacity(version, HEADER_SIZE + MAX_BODY_LEN)
    }

    /// Create a new frame buffer with custom initial capacity.
    pub fn with_capacity(version: u8, capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            state: State::WaitingForHeader,
            version,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data is kept internally for the next push.
    ///
    /// # Errors
    ///
    /// Returns `VersionMismatch` if a header carries the wrong version.
    /// Frames decoded before the bad header in the same call are dropped;
    /// use [`extend`](Self::extend) with [`next_frame`](Self::next_frame)
    /// when they matter.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Try to extract a single frame from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` on a version mismatch
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &self.state {
            State::WaitingForHeader => {
                let header = match Header::decode(&self.buffer) {
                    Some(header) => header,
                    None => return Ok(None),
                };

                header.validate(self.version)?;

                // Consume header bytes
                let _ = self.buffer.split_to(HEADER_SIZE);

                let remaining = header.bodylen();
                if remaining == 0 {
                    return Ok(Some(Frame::new(header, Bytes::new())));
                }

                self.state = State::WaitingForBody { header, remaining };
                self.next_frame()
            }

            State::WaitingForBody { header, remaining } => {
                let remaining = *remaining;

                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let payload = self.buffer.split_to(remaining).freeze();
                let header = *header;

                self.state = State::WaitingForHeader;

                Ok(Some(Frame::new(header, payload)))
            }
        }
    }

    /// Append data to the buffer without extracting frames.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Whether some bytes of an incomplete frame are held.
    pub fn has_partial_frame(&self) -> bool {
        !self.buffer.is_empty() || matches!(self.state, State::WaitingForBody { .. })
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForBody { .. } => "WaitingForBody",
        }
    }
}

/// Decodes frames from an async byte stream.
pub struct FrameReader<R> {
    reader: R,
    buffer: FrameBuffer,
    scratch: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a reader expecting `version`, with the default read buffer.
    pub fn new(reader: R, version: u8) -> Self {
        Self::with_read_buffer(reader, version, DEFAULT_READ_BUFFER_SIZE)
    }

    /// Create a reader with a custom read buffer size.
    pub fn with_read_buffer(reader: R, version: u8, read_buffer_size: usize) -> Self {
        Self {
            reader,
            buffer: FrameBuffer::new(version),
            scratch: vec![0u8; read_buffer_size.max(HEADER_SIZE)],
        }
    }

    /// Read the next complete frame.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly between frames.
    ///
    /// # Errors
    ///
    /// - `Io(UnexpectedEof)` if the stream ends inside a frame
    /// - `Io(..)` on any read failure
    /// - `VersionMismatch` if a header carries the wrong version
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.buffer.next_frame()? {
                return Ok(Some(frame));
            }

            let n = self.reader.read(&mut self.scratch).await?;
            if n == 0 {
                if self.buffer.has_partial_frame() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed mid-frame",
                    )
                    .into());
                }
                return Ok(None);
            }

            self.buffer.extend(&self.scratch[..n]);
        }
    }
}
