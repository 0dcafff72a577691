//! The per-subsystem inbound task: decode each frame, hand it to a fold.

use bytes::Bytes;
use emberlink_protocol::{DecodeQuality, ServerMessage};
use emberlink_transport::Opcode;
use futures_util::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Owns a subsystem's listener task. Dropping it aborts the task, which
/// drops the subsystem's subscriptions with it.
#[derive(Debug)]
pub struct Listener {
    handle: JoinHandle<()>,
}

impl Listener {
    /// Spawns a task that decodes every `(opcode, payload)` from `frames`
    /// with the shared codec and passes the result to `fold`.
    ///
    /// Truncated payloads are logged and still folded with their
    /// best-effort record.
    pub fn spawn<S, F>(system: &'static str, mut frames: S, mut fold: F) -> Self
    where
        S: Stream<Item = (Opcode, Bytes)> + Send + Unpin + 'static,
        F: FnMut(ServerMessage) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            while let Some((opcode, payload)) = frames.next().await {
                let decoded = ServerMessage::decode(opcode, &payload);
                if decoded.quality == DecodeQuality::Truncated {
                    warn!(
                        system,
                        %opcode,
                        len = payload.len(),
                        "truncated payload, folding best-effort record"
                    );
                } else {
                    trace!(system, %opcode, category = decoded.value.category(), "decoded");
                }
                fold(decoded.value);
            }
            debug!(system, "listener stopped, inbound closed");
        });
        Self { handle }
    }

    /// Stops the task. Frames still queued are never folded.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
