//! Write Queue and the single Sender task.
//!
//! Every frame a session emits (application data and heartbeats alike) goes
//! through one bounded mpsc channel drained by one task, so frames are
//! written whole and in the order they were queued.
//!
//! # Architecture
//!
//! ```text
//! write()   ─┐
//! write()   ─┼─► mpsc::Sender<WriteRequest> ─► Sender task ─► transport
//! heartbeat ─┘          (reply: oneshot)
//! ```
//!
//! Each request carries its own `oneshot` reply slot, so the outcome is
//! delivered exactly once to the caller that queued it.

use std::future::Future;
use std::io::IoSlice;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{KeepwireError, Result};
use crate::protocol::{Header, HEADER_SIZE};
use crate::state::{Shared, Termination};

/// Default Write Queue capacity.
pub const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 1024;

/// How long a frame already being written may take to finish once the
/// session closes.
pub(crate) const IN_FLIGHT_GRACE: Duration = Duration::from_secs(1);

/// A frame ready to be written to the transport.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    /// Pre-encoded header (4 bytes).
    pub header: [u8; HEADER_SIZE],
    /// Body bytes (empty for heartbeats).
    pub payload: Bytes,
}

impl OutboundFrame {
    /// Create a new outbound frame.
    #[inline]
    pub fn new(header: &Header, payload: Bytes) -> Self {
        Self {
            header: header.encode(),
            payload,
        }
    }

    /// Create a new outbound frame with empty body.
    #[inline]
    pub fn empty(header: &Header) -> Self {
        Self {
            header: header.encode(),
            payload: Bytes::new(),
        }
    }

    /// A data frame carrying `payload`.
    ///
    /// # Errors
    ///
    /// Returns `PayloadTooLarge` if `payload` exceeds 65535 bytes.
    pub fn data(version: u8, payload: Bytes) -> Result<Self> {
        let header = Header::data(version, payload.len())?;
        Ok(Self::new(&header, payload))
    }

    /// A heartbeat frame.
    pub fn heartbeat(version: u8) -> Self {
        Self::empty(&Header::heartbeat(version))
    }

    /// Total size of this frame (header + body).
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// A queued frame plus the slot its outcome is delivered to.
#[derive(Debug)]
pub(crate) struct WriteRequest {
    frame: OutboundFrame,
    reply: oneshot::Sender<Result<usize>>,
}

impl WriteRequest {
    fn complete(self, outcome: Result<usize>) {
        // The caller may have stopped waiting; nobody is left to tell.
        let _ = self.reply.send(outcome);
    }
}

/// Producer side of the Write Queue.
///
/// This is cheaply cloneable and shared by every writer of a session.
#[derive(Clone)]
pub(crate) struct WriteQueue {
    tx: mpsc::Sender<WriteRequest>,
    shared: Arc<Shared>,
}

impl WriteQueue {
    /// Queue `frame` and wait for the Sender's outcome.
    ///
    /// With a `deadline`, gives up with `Timeout` once it passes. A request
    /// the Sender has not started yet is then skipped; one already being
    /// written completes on the wire.
    pub(crate) async fn submit(
        &self,
        frame: OutboundFrame,
        deadline: Option<Instant>,
    ) -> Result<usize> {
        if self.shared.is_closed() {
            return Err(KeepwireError::SessionClosed);
        }

        let (reply, outcome) = oneshot::channel();
        let request = WriteRequest { frame, reply };

        let exchange = async {
            self.tx
                .send(request)
                .await
                .map_err(|_| KeepwireError::SessionClosed)?;
            // A dropped reply slot means the Sender exited first.
            outcome.await.unwrap_or(Err(KeepwireError::SessionClosed))
        };

        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, exchange)
                .await
                .unwrap_or(Err(KeepwireError::Timeout)),
            None => exchange.await,
        }
    }
}

/// Spawn the Sender task and return the queue feeding it.
pub(crate) fn spawn_sender<W>(
    writer: W,
    shared: Arc<Shared>,
    capacity: usize,
) -> (WriteQueue, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let queue = WriteQueue {
        tx,
        shared: shared.clone(),
    };
    let task = tokio::spawn(sender_loop(rx, writer, shared));
    (queue, task)
}

/// Main Sender loop - drains the Write Queue in arrival order.
async fn sender_loop<W>(mut rx: mpsc::Receiver<WriteRequest>, mut writer: W, shared: Arc<Shared>)
where
    W: AsyncWrite + Unpin,
{
    tracing::trace!("sender started");

    loop {
        let request = tokio::select! {
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
            _ = shared.terminated() => break,
        };

        if shared.is_closed() {
            request.complete(Err(KeepwireError::SessionClosed));
            break;
        }

        if request.reply.is_closed() {
            tracing::trace!("skipping write abandoned by its caller");
            continue;
        }

        let WriteRequest { frame, reply } = request;
        let write = write_frame(&mut writer, &frame);
        tokio::pin!(write);

        let result = tokio::select! {
            result = &mut write => result,
            outcome = shared.terminated() => {
                let finished = finish_in_flight(write, &outcome).await;
                let _ = reply.send(finished.map(|()| frame.size()));
                break;
            }
        };

        match result {
            Ok(()) => {
                let _ = reply.send(Ok(frame.size()));
            }
            Err(e) => {
                tracing::debug!("transport write failed: {}", e);
                let _ = reply.send(Err(e.clone()));
                shared.terminate(Termination::Failed(e));
                break;
            }
        }
    }

    // Whatever is still queued fails with SessionClosed as its reply slot
    // drops along with the receiver.
    shared.terminate(Termination::Failed(KeepwireError::SessionClosed));
    rx.close();
    while let Ok(request) = rx.try_recv() {
        request.complete(Err(KeepwireError::SessionClosed));
    }

    if let Err(e) = writer.shutdown().await {
        tracing::trace!("transport shutdown failed: {}", e);
    }
    tracing::trace!("sender stopped");
}

/// Let a frame interrupted by termination reach the wire whole, so the peer
/// sees end-of-stream on a frame boundary.
///
/// Only done after a local close or peer end-of-stream, and for at most
/// [`IN_FLIGHT_GRACE`]. After a transport failure or an unresponsive peer
/// the frame is abandoned.
async fn finish_in_flight<F>(write: Pin<&mut F>, outcome: &Termination) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let finishable = matches!(
        outcome,
        Termination::Eof | Termination::Failed(KeepwireError::SessionClosed)
    );
    if !finishable {
        return Err(KeepwireError::SessionClosed);
    }

    match tokio::time::timeout(IN_FLIGHT_GRACE, write).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            tracing::debug!("in-flight frame failed after close: {}", e);
            Err(KeepwireError::SessionClosed)
        }
        Err(_) => {
            tracing::debug!("in-flight frame abandoned after {:?}", IN_FLIGHT_GRACE);
            Err(KeepwireError::SessionClosed)
        }
    }
}

/// Write one frame with scatter/gather I/O, then flush.
///
/// Header and body go out in a single `write_vectored` call when the
/// transport accepts everything at once.
async fn write_frame<W>(writer: &mut W, frame: &OutboundFrame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size = frame.size();

    let written = if frame.payload.is_empty() {
        writer.write(&frame.header).await?
    } else {
        let slices = [IoSlice::new(&frame.header), IoSlice::new(&frame.payload)];
        writer.write_vectored(&slices).await?
    };

    if written == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            "transport accepted no bytes",
        )
        .into());
    }

    // Slow path: partial write, finish header then body.
    if written < HEADER_SIZE {
        writer.write_all(&frame.header[written..]).await?;
        writer.write_all(&frame.payload).await?;
    } else if written < total_size {
        writer.write_all(&frame.payload[written - HEADER_SIZE..]).await?;
    }

    writer.flush().await?;
    Ok(())
}
