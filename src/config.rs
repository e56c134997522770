//! Session configuration and the fluent [`SessionBuilder`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use keepwire::Session;
//! use tokio::net::TcpStream;
//!
//! # async fn run() -> keepwire::Result<()> {
//! let stream = TcpStream::connect("127.0.0.1:7000").await?;
//! let session = Session::builder()
//!     .heartbeat_interval(Duration::from_secs(5))
//!     .idle_timeout(Duration::from_secs(15))
//!     .client(stream);
//!
//! session.write(b"hello").await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use crate::heartbeat::DEFAULT_HEARTBEAT_INTERVAL;
use crate::protocol::{DEFAULT_READ_BUFFER_SIZE, DEFAULT_VERSION, HEADER_SIZE};
use crate::session::{Role, Session};
use crate::transport::Transport;
use crate::writer::DEFAULT_WRITE_QUEUE_CAPACITY;

/// Shortest heartbeat interval accepted.
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1);

/// Tunables for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Protocol major version stamped on outgoing frames and required on
    /// incoming ones.
    pub version: u8,
    /// Time between heartbeats.
    pub heartbeat_interval: Duration,
    /// Frames that may wait in the Write Queue before writers block.
    pub write_queue_capacity: usize,
    /// Bytes requested from the transport per read.
    pub read_buffer_size: usize,
    /// Close the session when nothing arrives from the peer for this long.
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            write_queue_capacity: DEFAULT_WRITE_QUEUE_CAPACITY,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            idle_timeout: None,
        }
    }
}

impl SessionConfig {
    /// Replace zero values with the smallest usable ones.
    pub(crate) fn normalized(mut self) -> Self {
        self.heartbeat_interval = self.heartbeat_interval.max(MIN_HEARTBEAT_INTERVAL);
        self.write_queue_capacity = self.write_queue_capacity.max(1);
        self.read_buffer_size = self.read_buffer_size.max(HEADER_SIZE);
        self
    }
}

/// Builder for configuring and starting a [`Session`].
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn with_config(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Set the protocol major version.
    ///
    /// Default: 1
    pub fn version(mut self, version: u8) -> Self {
        self.config.version = version;
        self
    }

    /// Set the heartbeat interval.
    ///
    /// Default: 2 seconds
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Set the Write Queue capacity.
    ///
    /// Default: 1024
    pub fn write_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.write_queue_capacity = capacity;
        self
    }

    /// Set the transport read buffer size.
    ///
    /// Default: 64 KiB
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Close the session once the peer has been silent for `timeout`.
    ///
    /// Checked on every heartbeat tick. Default: disabled
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = Some(timeout);
        self
    }

    /// The configuration built so far.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start a client-side session over `transport`.
    ///
    /// Must be called within a tokio runtime.
    pub fn client<T: Transport>(self, transport: T) -> Session {
        Session::start(transport, Role::Client, self.config)
    }

    /// Start a server-side session over `transport`.
    ///
    /// Must be called within a tokio runtime.
    pub fn server<T: Transport>(self, transport: T) -> Session {
        Session::start(transport, Role::Server, self.config)
    }
}
