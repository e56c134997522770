//! The Receiver task.
//!
//! Decodes frames off the transport's read half, drops heartbeats, and
//! appends data bodies to the Receive Queue. The first decode or transport
//! failure ends the session.

use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::task::JoinHandle;

use crate::protocol::{Command, Frame, FrameReader};
use crate::state::{Shared, Termination};

/// Spawn the Receiver task.
pub(crate) fn spawn_receiver<R>(
    reader: R,
    shared: Arc<Shared>,
    version: u8,
    read_buffer_size: usize,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let frames = FrameReader::with_read_buffer(reader, version, read_buffer_size);
    tokio::spawn(receiver_loop(frames, shared))
}

/// Main Receiver loop - reads frames and dispatches them by command.
async fn receiver_loop<R>(mut frames: FrameReader<R>, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin,
{
    tracing::trace!("receiver started");

    loop {
        let next = tokio::select! {
            next = frames.next_frame() => next,
            _ = shared.terminated() => break,
        };

        match next {
            Ok(Some(frame)) => {
                shared.touch();
                if !dispatch_frame(frame, &shared).await {
                    break;
                }
            }
            Ok(None) => {
                shared.terminate(Termination::Eof);
                break;
            }
            Err(e) => {
                tracing::debug!("receive failed: {}", e);
                shared.terminate(Termination::Failed(e));
                break;
            }
        }
    }

    tracing::trace!("receiver stopped");
}

/// Handle one decoded frame. Returns `false` once the session is closed.
async fn dispatch_frame(frame: Frame, shared: &Shared) -> bool {
    match frame.command() {
        Command::Heartbeat => {
            tracing::trace!("heartbeat received");
            true
        }
        Command::Data => {
            if frame.payload.is_empty() {
                return true;
            }
            shared.push_chunk(frame.into_payload()).await
        }
        Command::Syn => {
            tracing::debug!("ignoring SYN frame");
            true
        }
        Command::Other(cmd) => {
            tracing::debug!("ignoring frame with unknown command {}", cmd);
            true
        }
    }
}
