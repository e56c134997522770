//! State shared between a session's handles and its three tasks.
//!
//! Everything the Sender, Receiver and Heartbeat Monitor coordinate through
//! lives in [`Shared`]:
//!
//! ```text
//!            ┌──────────── closed flag / terminal slot ───────────┐
//! Receiver ──┼─► recv_queue ─► data_ready ─► read()                │
//! Sender   ◄─┼── WriteQueue ◄── write() / Heartbeat Monitor        │
//!            └─────────────────────────────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use bytes::{Buf, Bytes};
use tokio::sync::{watch, Mutex, Notify};
use tokio::time::Instant;

use crate::error::{KeepwireError, Result};

/// How a session ended.
#[derive(Debug, Clone)]
pub enum Termination {
    /// The peer closed the stream between frames.
    Eof,
    /// A fatal error ended the session.
    Failed(KeepwireError),
}

impl Termination {
    /// The error reported to readers, or `None` for end-of-stream.
    pub fn error(&self) -> Option<&KeepwireError> {
        match self {
            Termination::Eof => None,
            Termination::Failed(e) => Some(e),
        }
    }
}

/// Read and write deadlines. `None` means no deadline.
#[derive(Debug, Default, Clone, Copy)]
struct Deadlines {
    read: Option<Instant>,
    write: Option<Instant>,
}

pub(crate) struct Shared {
    /// Set at most once, never cleared.
    closed: AtomicBool,
    /// Decoded data bodies waiting for readers, in arrival order.
    recv_queue: Mutex<VecDeque<Bytes>>,
    /// Holds at most one stored permit; the queue is the source of truth.
    data_ready: Notify,
    /// Write-once terminal outcome.
    terminal: watch::Sender<Option<Termination>>,
    /// Watched so blocked readers pick up a new read deadline.
    deadlines: watch::Sender<Deadlines>,
    last_seen: StdMutex<Instant>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        let (terminal, _) = watch::channel(None);
        let (deadlines, _) = watch::channel(Deadlines::default());
        Self {
            closed: AtomicBool::new(false),
            recv_queue: Mutex::new(VecDeque::new()),
            data_ready: Notify::new(),
            terminal,
            deadlines,
            last_seen: StdMutex::new(Instant::now()),
        }
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the session, recording `outcome` unless an earlier one won.
    ///
    /// Returns `true` if this call recorded the outcome.
    pub(crate) fn terminate(&self, outcome: Termination) -> bool {
        self.closed.store(true, Ordering::Release);

        let recorded = self.terminal.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome.clone());
            true
        });

        if recorded {
            match &outcome {
                Termination::Eof => tracing::debug!("session ended: peer closed the stream"),
                Termination::Failed(KeepwireError::SessionClosed) => {
                    tracing::debug!("session closed locally")
                }
                Termination::Failed(e) => tracing::warn!("session terminated: {}", e),
            }
        }
        recorded
    }

    /// The recorded terminal outcome, if any.
    pub(crate) fn termination(&self) -> Option<Termination> {
        self.terminal.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<Termination>> {
        self.terminal.subscribe()
    }

    /// Resolves once the session has terminated.
    pub(crate) async fn terminated(&self) -> Termination {
        let mut rx = self.subscribe();
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                // Unreachable while `self` holds the sender.
                return Termination::Failed(KeepwireError::SessionClosed);
            }
        }
    }

    /// Append a data body and wake one waiting reader.
    ///
    /// Returns `false` (dropping the chunk) once the session is closed.
    pub(crate) async fn push_chunk(&self, chunk: Bytes) -> bool {
        {
            let mut queue = self.recv_queue.lock().await;
            if self.is_closed() {
                return false;
            }
            queue.push_back(chunk);
        }
        self.data_ready.notify_one();
        true
    }

    /// Run `take` against the queue; if it took something and data is
    /// still queued, hand the wake-up on to the next waiter (coalesced
    /// signals can otherwise leave data queued with nobody woken).
    pub(crate) async fn take<T, F>(&self, take: F) -> Option<T>
    where
        F: FnOnce(&mut VecDeque<Bytes>) -> Option<T>,
    {
        let mut queue = self.recv_queue.lock().await;
        let value = take(&mut queue)?;
        if !queue.is_empty() {
            self.data_ready.notify_one();
        }
        Some(value)
    }

    /// Take the whole head chunk.
    pub(crate) async fn pop_chunk(&self) -> Option<Bytes> {
        self.take(VecDeque::pop_front).await
    }

    pub(crate) async fn queued_chunks(&self) -> usize {
        self.recv_queue.lock().await.len()
    }

    /// Wait for a take from the receive queue to succeed.
    ///
    /// Returns `Ok(None)` on end-of-stream once the queue is drained, the
    /// recorded error once the session has failed, or `Timeout` when the
    /// read deadline elapses first. A deadline changed while waiting
    /// applies immediately.
    pub(crate) async fn wait_for_data<T, F>(&self, mut take: F) -> Result<Option<T>>
    where
        F: FnMut(&mut VecDeque<Bytes>) -> Option<T>,
    {
        let mut terminal = self.subscribe();
        let mut deadlines = self.deadlines.subscribe();

        loop {
            if let Some(value) = self.take(&mut take).await {
                return Ok(Some(value));
            }

            if let Some(outcome) = terminal.borrow_and_update().clone() {
                return match outcome {
                    Termination::Eof => Ok(None),
                    Termination::Failed(e) => Err(e),
                };
            }

            let deadline = deadlines.borrow_and_update().read;

            tokio::select! {
                _ = self.data_ready.notified() => {}
                _ = sleep_until_deadline(deadline) => {
                    return Err(KeepwireError::Timeout);
                }
                _ = terminal.changed() => {}
                _ = deadlines.changed() => {}
            }
        }
    }

    pub(crate) fn read_deadline(&self) -> Option<Instant> {
        self.deadlines.borrow().read
    }

    pub(crate) fn write_deadline(&self) -> Option<Instant> {
        self.deadlines.borrow().write
    }

    pub(crate) fn set_read_deadline(&self, deadline: Option<Instant>) {
        self.deadlines.send_modify(|d| d.read = deadline);
    }

    pub(crate) fn set_write_deadline(&self, deadline: Option<Instant>) {
        self.deadlines.send_modify(|d| d.write = deadline);
    }

    /// Record that a frame just arrived from the peer.
    pub(crate) fn touch(&self) {
        *self
            .last_seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Instant::now();
    }

    pub(crate) fn last_seen(&self) -> Instant {
        *self
            .last_seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Copy bytes from the head chunk into `buf`.
///
/// A partially consumed chunk keeps its remainder at the head.
pub(crate) fn copy_from_head(queue: &mut VecDeque<Bytes>, buf: &mut [u8]) -> Option<usize> {
    let head = queue.front_mut()?;

    let n = head.len().min(buf.len());
    buf[..n].copy_from_slice(&head[..n]);
    head.advance(n);
    if head.is_empty() {
        queue.pop_front();
    }
    Some(n)
}

/// Sleep until `deadline`, or forever when there is none.
pub(crate) async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
