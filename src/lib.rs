//! # keepwire
//!
//! Framed, heartbeat-monitored sessions over any connected byte stream.
//!
//! A [`Session`] wraps a transport (TCP, Unix socket, in-memory duplex) and
//! turns it into a message channel:
//!
//! - every `write` becomes one frame `[cmd, version, len_hi, len_lo] + body`
//! - a heartbeat frame goes out every two seconds by default
//! - incoming heartbeats are swallowed, data bodies are queued for `read`
//! - a version mismatch or transport error ends the session for good
//!
//! ## Example
//!
//! ```no_run
//! use keepwire::Session;
//! use tokio::net::TcpStream;
//!
//! #[tokio::main]
//! async fn main() -> keepwire::Result<()> {
//!     let stream = TcpStream::connect("127.0.0.1:7000").await?;
//!     let session = Session::client(stream);
//!
//!     session.write(b"ping").await?;
//!
//!     let mut buf = [0u8; 64];
//!     let n = session.read(&mut buf).await?;
//!     println!("got {:?}", &buf[..n]);
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod protocol;
pub mod transport;

mod config;
mod heartbeat;
mod reader;
mod session;
mod state;
mod writer;

pub use codec::MsgPackCodec;
pub use config::{SessionBuilder, SessionConfig, MIN_HEARTBEAT_INTERVAL};
pub use error::{KeepwireError, Result};
pub use heartbeat::DEFAULT_HEARTBEAT_INTERVAL;
pub use session::{Role, Session};
pub use state::Termination;
pub use transport::{Transport, TransportAddr};
pub use writer::DEFAULT_WRITE_QUEUE_CAPACITY;
