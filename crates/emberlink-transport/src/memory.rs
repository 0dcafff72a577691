//! In-process transport: frames are injected and captured in memory.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Inbound, Opcode, Registry, Transport, TransportError};

/// A frame written through [`MemoryTransport::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    /// Opcode the frame was sent with.
    pub opcode: Opcode,
    /// Encoded payload.
    pub payload: Bytes,
    /// Tokio clock reading at the moment the send completed.
    pub at: Instant,
}

#[derive(Debug)]
struct MemoryState {
    registrations: HashMap<Opcode, usize>,
    sent: Vec<SentFrame>,
    connected: bool,
    rejected: HashSet<Opcode>,
    send_delay: Option<Duration>,
}

/// A [`Transport`] with no network underneath.
///
/// Inbound traffic is produced with [`inject`](Self::inject); outbound
/// frames are recorded and can be inspected with [`sent`](Self::sent).
/// Every `register` call is counted so callers can check how many
/// registrations a consumer actually made.
#[derive(Debug)]
pub struct MemoryTransport {
    registry: Registry,
    state: Mutex<MemoryState>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Creates a connected transport with nothing registered.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            state: Mutex::new(MemoryState {
                registrations: HashMap::new(),
                sent: Vec::new(),
                connected: true,
                rejected: HashSet::new(),
                send_delay: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers an inbound frame. Returns the number of registrations
    /// that received it.
    pub fn inject(&self, opcode: Opcode, payload: impl Into<Bytes>) -> usize {
        self.registry.dispatch(opcode, payload.into())
    }

    /// Total `register` calls made for `opcode`.
    pub fn registrations(&self, opcode: Opcode) -> usize {
        self.state().registrations.get(&opcode).copied().unwrap_or(0)
    }

    /// Registrations for `opcode` whose receiver is still alive.
    pub fn live_registrations(&self, opcode: Opcode) -> usize {
        self.registry.live(opcode)
    }

    /// Every frame sent so far, oldest first.
    pub fn sent(&self) -> Vec<SentFrame> {
        self.state().sent.clone()
    }

    /// Frames sent with `opcode`, oldest first.
    pub fn sent_with(&self, opcode: Opcode) -> Vec<SentFrame> {
        self.state()
            .sent
            .iter()
            .filter(|frame| frame.opcode == opcode)
            .cloned()
            .collect()
    }

    /// Forgets recorded frames.
    pub fn clear_sent(&self) {
        self.state().sent.clear();
    }

    /// Makes every send take `delay` before completing.
    pub fn set_send_delay(&self, delay: Duration) {
        self.state().send_delay = Some(delay);
    }

    /// Makes sends of `opcode` fail while the rest keep going through.
    pub fn reject_sends(&self, opcode: Opcode) {
        self.state().rejected.insert(opcode);
    }

    /// Simulates a dropped connection: later sends fail and every inbound
    /// stream ends.
    pub fn disconnect(&self) {
        self.state().connected = false;
        self.registry.close_all();
    }
}

impl Transport for MemoryTransport {
    fn register(&self, opcode: Opcode) -> Inbound {
        *self.state().registrations.entry(opcode).or_insert(0) += 1;
        self.registry.register(opcode)
    }

    async fn send(
        &self,
        opcode: Opcode,
        payload: Bytes,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let delay = self.state().send_delay;
        if let Some(delay) = delay {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let mut state = self.state();
        if !state.connected {
            return Err(TransportError::ConnectionClosed(
                "memory transport disconnected".into(),
            ));
        }
        if state.rejected.contains(&opcode) {
            return Err(TransportError::ConnectionClosed(format!(
                "memory transport rejects {opcode:?}"
            )));
        }
        state.sent.push(SentFrame {
            opcode,
            payload,
            at: Instant::now(),
        });
        Ok(())
    }
}
