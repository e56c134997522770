//! The Heartbeat Monitor task.
//!
//! Emits a heartbeat frame every interval through the same Write Queue as
//! application data, so heartbeats never jump ahead of queued writes. When
//! an idle timeout is configured it also ends sessions whose peer has gone
//! quiet.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::error::KeepwireError;
use crate::state::{Shared, Termination};
use crate::writer::{OutboundFrame, WriteQueue};

/// Default interval between heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

/// Spawn the Heartbeat Monitor task.
pub(crate) fn spawn_heartbeat(
    queue: WriteQueue,
    shared: Arc<Shared>,
    version: u8,
    interval: Duration,
    idle_timeout: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = heartbeat_loop(&queue, &shared, version, interval, idle_timeout) => {}
            _ = shared.terminated() => {}
        }
        tracing::trace!("heartbeat stopped");
    })
}

async fn heartbeat_loop(
    queue: &WriteQueue,
    shared: &Shared,
    version: u8,
    interval: Duration,
    idle_timeout: Option<Duration>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // skip first immediate tick

    loop {
        ticker.tick().await;

        if shared.is_closed() {
            break;
        }

        if let Some(limit) = idle_timeout {
            let idle = shared.last_seen().elapsed();
            if idle > limit {
                tracing::warn!("no frame from peer for {:?}, closing session", idle);
                shared.terminate(Termination::Failed(KeepwireError::PeerUnresponsive(idle)));
                break;
            }
        }

        // Bounded so a stalled transport cannot stop the idle check above.
        let deadline = time::Instant::now() + interval;
        match queue
            .submit(OutboundFrame::heartbeat(version), Some(deadline))
            .await
        {
            Ok(_) => {}
            Err(KeepwireError::Timeout) => {
                tracing::trace!("heartbeat not written within {:?}", interval);
            }
            Err(e) => {
                // The Sender has already terminated the session.
                tracing::debug!("heartbeat failed: {}", e);
                break;
            }
        }
    }
}
