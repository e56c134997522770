//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the binary protocol spoken on the transport:
//! - 4-byte header encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Frame reader decoding frames from an async stream

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::{FrameBuffer, FrameReader, DEFAULT_READ_BUFFER_SIZE};
pub use wire_format::{cmd, Command, Header, DEFAULT_VERSION, HEADER_SIZE, MAX_BODY_LEN};
