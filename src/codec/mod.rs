//! Codec module - structured payloads on top of data frames.
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde`, one value per frame
//!
//! Plain byte payloads need no codec: [`Session::write`](crate::Session::write)
//! and [`Session::read`](crate::Session::read) carry them as-is.
//!
//! # Example
//!
//! ```
//! use keepwire::codec::MsgPackCodec;
//!
//! let encoded = MsgPackCodec::encode(&"hello").unwrap();
//! let decoded: String = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

mod msgpack;

pub use msgpack::MsgPackCodec;
