//! Transport abstraction layer for Emberlink.
//!
//! Provides the [`Transport`] trait: an opcode-addressed duplex channel.
//! Inbound frames are delivered per opcode to whoever registered for it,
//! outbound frames are written with their opcode header.
//!
//! ```text
//! wire bytes → Transport (frames by opcode) → Multiplexer → subsystems
//! ```
//!
//! # Feature Flags
//!
//! - `tcp` (default): plain framed TCP transport ([`TcpTransport`])
//!
//! [`MemoryTransport`] is always available; it is the in-process fake used
//! by tests across the workspace.

mod error;
mod memory;
mod registry;
#[cfg(feature = "tcp")]
mod tcp;

pub use error::TransportError;
pub use memory::{MemoryTransport, SentFrame};
pub use registry::Registry;
#[cfg(feature = "tcp")]
pub use tcp::TcpTransport;

use std::fmt;
use std::future::Future;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Wire-level tag identifying a message's type and layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Opcode(pub u16);

impl Opcode {
    /// Returns the underlying tag.
    pub fn into_inner(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:03X}", self.0)
    }
}

/// Receiving half of a registration: one buffer per inbound frame, in wire
/// order. Dropping it withdraws the registration.
pub type Inbound = mpsc::UnboundedReceiver<Bytes>;

/// An opcode-addressed duplex byte channel.
///
/// Implementations must deliver each inbound frame to every live
/// registration for its opcode exactly once, preserving wire order per
/// opcode.
pub trait Transport: Send + Sync + 'static {
    /// Registers interest in `opcode` and returns the stream of payloads.
    fn register(&self, opcode: Opcode) -> Inbound;

    /// Writes one frame.
    ///
    /// If `cancel` fires before the frame is handed to the connection the
    /// send is abandoned with [`TransportError::Cancelled`]; a frame is
    /// never partially written because of cancellation.
    fn send(
        &self,
        opcode: Opcode,
        payload: Bytes,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
