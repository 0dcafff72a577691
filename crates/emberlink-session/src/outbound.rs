//! The outbound command path: validate, wait out the cooldown, send, record.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use bytes::Bytes;
use emberlink_protocol::ClientPacket;
use emberlink_throttle::RateLimiter;
use emberlink_transport::{Opcode, Transport, TransportError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::SessionError;

/// Encodes packets and hands them to the transport.
///
/// Encoding happens first, so an invalid argument is reported as a
/// [`SessionError::Precondition`] before any waiting or I/O.
pub struct Outbound<T> {
    transport: Arc<T>,
}

impl<T> Clone for Outbound<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> Outbound<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Sends `packet` immediately.
    pub async fn send<P: ClientPacket>(
        &self,
        packet: &P,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let payload = packet.encode()?;
        self.deliver(P::OPCODE, payload, cancel).await
    }

    /// Sends `packet` once `key`'s cooldown in `limiter` has elapsed.
    ///
    /// The cooldown is stamped with the instant the send completed, and
    /// only if it succeeded. A cancelled or failed send leaves the previous
    /// stamp in place.
    pub async fn send_throttled<P, K>(
        &self,
        limiter: &RateLimiter<K>,
        key: K,
        packet: &P,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError>
    where
        P: ClientPacket,
        K: Eq + Hash + Clone + fmt::Debug,
    {
        let payload = packet.encode()?;
        let permit = limiter.acquire(key, cancel).await?;
        self.deliver(P::OPCODE, payload, cancel).await?;
        permit.record();
        Ok(())
    }

    async fn deliver(
        &self,
        opcode: Opcode,
        payload: Bytes,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let len = payload.len();
        match self.transport.send(opcode, payload, cancel).await {
            Ok(()) => {
                debug!(%opcode, len, "sent");
                Ok(())
            }
            Err(TransportError::Cancelled) => {
                debug!(%opcode, "send cancelled");
                Err(SessionError::Cancelled)
            }
            Err(e) => {
                warn!(%opcode, error = %e, "send failed");
                Err(SessionError::Transport(e))
            }
        }
    }
}

impl<T> fmt::Debug for Outbound<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outbound").finish_non_exhaustive()
    }
}
