//! The session façade.
//!
//! A [`Session`] takes exclusive ownership of a connected transport and
//! immediately starts three tasks over it:
//! 1. Sender - drains the Write Queue onto the write half
//! 2. Receiver - decodes frames from the read half into the Receive Queue
//! 3. Heartbeat Monitor - queues a heartbeat every interval
//!
//! The first task to hit a fatal condition records it and every other task
//! follows it down. Dropping the last handle closes the session.
//!
//! # Example
//!
//! ```no_run
//! use keepwire::Session;
//! use tokio::net::TcpListener;
//!
//! # async fn run() -> keepwire::Result<()> {
//! let listener = TcpListener::bind("127.0.0.1:7000").await?;
//! let (stream, _) = listener.accept().await?;
//! let session = Session::server(stream);
//!
//! let mut buf = [0u8; 1024];
//! let n = session.read(&mut buf).await?;
//! session.write(&buf[..n]).await?;
//! session.close().await;
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::codec::MsgPackCodec;
use crate::config::{SessionBuilder, SessionConfig};
use crate::error::{KeepwireError, Result};
use crate::heartbeat::spawn_heartbeat;
use crate::reader::spawn_receiver;
use crate::state::{copy_from_head, Shared, Termination};
use crate::transport::{Transport, TransportAddr};
use crate::writer::{spawn_sender, OutboundFrame, WriteQueue};

/// Which side opened the connection. Both roles behave identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The side that initiated the connection.
    Client,
    /// The side that accepted the connection.
    Server,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Client => f.write_str("client"),
            Role::Server => f.write_str("server"),
        }
    }
}

/// A framed, heartbeat-monitored session over one transport.
///
/// Cheap to clone; every clone drives the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    shared: Arc<Shared>,
    queue: WriteQueue,
    version: u8,
    role: Role,
    local_addr: Option<TransportAddr>,
    peer_addr: Option<TransportAddr>,
    /// Sender, Receiver and Heartbeat Monitor; emptied by the first `close`.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shared
            .terminate(Termination::Failed(KeepwireError::SessionClosed));
    }
}

impl Session {
    /// Create a session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Start a session with default settings on the connecting side.
    ///
    /// Must be called within a tokio runtime.
    pub fn client<T: Transport>(transport: T) -> Self {
        Self::start(transport, Role::Client, SessionConfig::default())
    }

    /// Start a session with default settings on the accepting side.
    ///
    /// Must be called within a tokio runtime.
    pub fn server<T: Transport>(transport: T) -> Self {
        Self::start(transport, Role::Server, SessionConfig::default())
    }

    pub(crate) fn start<T: Transport>(transport: T, role: Role, config: SessionConfig) -> Self {
        let config = config.normalized();
        let local_addr = transport.local_addr();
        let peer_addr = transport.peer_addr();

        let (read_half, write_half) = tokio::io::split(transport);
        let shared = Arc::new(Shared::new());

        let (queue, sender) =
            spawn_sender(write_half, shared.clone(), config.write_queue_capacity);
        let receiver = spawn_receiver(
            read_half,
            shared.clone(),
            config.version,
            config.read_buffer_size,
        );
        let heartbeat = spawn_heartbeat(
            queue.clone(),
            shared.clone(),
            config.version,
            config.heartbeat_interval,
            config.idle_timeout,
        );

        tracing::debug!(
            "{} session started (version {}, peer {})",
            role,
            config.version,
            peer_addr
                .as_ref()
                .map_or_else(|| "unknown".to_string(), ToString::to_string)
        );

        Self {
            inner: Arc::new(Inner {
                shared,
                queue,
                version: config.version,
                role,
                local_addr,
                peer_addr,
                tasks: Mutex::new(vec![sender, receiver, heartbeat]),
            }),
        }
    }

    /// Read received data into `buf`.
    ///
    /// Waits until data is queued. Bytes beyond `buf.len()` stay queued for
    /// the next read. Returns `Ok(0)` for an empty `buf` or once the peer
    /// has closed the stream and everything queued has been read.
    ///
    /// # Errors
    ///
    /// - `Timeout` if the read deadline passes first; the session stays usable.
    /// - The session's terminal error once it has failed or been closed.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let shared = &self.inner.shared;
        let n = shared
            .wait_for_data(|queue| copy_from_head(queue, buf))
            .await?;
        Ok(n.unwrap_or(0))
    }

    /// Receive the next whole data frame body.
    ///
    /// Returns `Ok(None)` once the peer has closed the stream and everything
    /// queued has been received. Waiting follows the same rules as
    /// [`read`](Self::read).
    pub async fn recv(&self) -> Result<Option<Bytes>> {
        let shared = &self.inner.shared;
        shared.wait_for_data(VecDeque::pop_front).await
    }

    /// Send `buf` as one data frame, returning `buf.len()` once written.
    ///
    /// # Errors
    ///
    /// - `PayloadTooLarge` if `buf` exceeds 65535 bytes.
    /// - `Timeout` if the write deadline passes first. A frame still waiting
    ///   in the Write Queue is then dropped, but one the Sender had already
    ///   started is still delivered in full, so `Timeout` does not prove the
    ///   peer never got `buf`.
    /// - `SessionClosed` once the session is closed.
    /// - The transport error that ended the session.
    pub async fn write(&self, buf: &[u8]) -> Result<usize> {
        self.write_bytes(Bytes::copy_from_slice(buf)).await
    }

    /// Send `payload` as one data frame without copying it.
    pub async fn write_bytes(&self, payload: Bytes) -> Result<usize> {
        if self.inner.shared.is_closed() {
            return Err(KeepwireError::SessionClosed);
        }

        let len = payload.len();
        let frame = OutboundFrame::data(self.inner.version, payload)?;
        let deadline = self.inner.shared.write_deadline();
        self.inner.queue.submit(frame, deadline).await?;
        Ok(len)
    }

    /// Send `value` MessagePack-encoded in one data frame.
    pub async fn send_msg<T: Serialize>(&self, value: &T) -> Result<()> {
        let payload = MsgPackCodec::encode_frame(value)?;
        self.write_bytes(payload).await?;
        Ok(())
    }

    /// Receive one MessagePack-encoded value sent with
    /// [`send_msg`](Self::send_msg).
    ///
    /// Returns `Ok(None)` at end-of-stream.
    pub async fn recv_msg<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match self.recv().await? {
            Some(payload) => Ok(Some(MsgPackCodec::decode(&payload)?)),
            None => Ok(None),
        }
    }

    /// Set both the read and the write deadline. `None` clears them.
    pub fn set_deadline(&self, deadline: Option<Instant>) {
        self.inner.shared.set_read_deadline(deadline);
        self.inner.shared.set_write_deadline(deadline);
    }

    /// Set the deadline for pending and future reads.
    pub fn set_read_deadline(&self, deadline: Option<Instant>) {
        self.inner.shared.set_read_deadline(deadline);
    }

    /// Set the deadline for future writes.
    pub fn set_write_deadline(&self, deadline: Option<Instant>) {
        self.inner.shared.set_write_deadline(deadline);
    }

    /// The current read deadline.
    pub fn read_deadline(&self) -> Option<Instant> {
        self.inner.shared.read_deadline()
    }

    /// The current write deadline.
    pub fn write_deadline(&self) -> Option<Instant> {
        self.inner.shared.write_deadline()
    }

    /// Close the session and wait for its tasks to release the transport.
    ///
    /// Blocked reads wake with the terminal outcome, later writes fail with
    /// `SessionClosed`. A frame already being written gets up to one second
    /// to finish so the peer sees end-of-stream on a frame boundary; queued
    /// frames not yet started fail with `SessionClosed`. Calling it again is
    /// a no-op.
    pub async fn close(&self) {
        self.inner
            .shared
            .terminate(Termination::Failed(KeepwireError::SessionClosed));

        let mut tasks = self.inner.tasks.lock().await;
        for task in tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!("session task panicked: {}", e);
            }
        }
    }

    /// Wait until the session has ended and return how it ended.
    pub async fn closed(&self) -> Termination {
        self.inner.shared.terminated().await
    }

    /// The recorded terminal outcome, if the session has ended.
    pub fn termination(&self) -> Option<Termination> {
        self.inner.shared.termination()
    }

    /// Whether the session has ended.
    pub fn is_closed(&self) -> bool {
        self.inner.shared.is_closed()
    }

    /// Protocol major version of this session.
    pub fn version(&self) -> u8 {
        self.inner.version
    }

    /// Which side of the connection this is.
    pub fn role(&self) -> Role {
        self.inner.role
    }

    /// When the last frame (data or heartbeat) arrived from the peer.
    pub fn last_seen(&self) -> Instant {
        self.inner.shared.last_seen()
    }

    /// Local address of the transport, if it has one.
    pub fn local_addr(&self) -> Option<TransportAddr> {
        self.inner.local_addr.clone()
    }

    /// Remote address of the transport, if it has one.
    pub fn peer_addr(&self) -> Option<TransportAddr> {
        self.inner.peer_addr.clone()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.inner.role)
            .field("version", &self.inner.version)
            .field("peer_addr", &self.inner.peer_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}
