//! Unified error type for the Emberlink client.

use emberlink_protocol::ProtocolError;
use emberlink_session::SessionError;
use emberlink_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// Callers of the `emberlink` meta crate deal with this one type; `?`
/// converts sub-crate errors through the generated `From` impls.
#[derive(Debug, thiserror::Error)]
pub enum EmberlinkError {
    /// Connecting, sending or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A packet argument was refused by the codec.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A subsystem command failed. Cooldown waits that were cancelled
    /// surface here as [`SessionError::Cancelled`].
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The client configuration could not be parsed.
    #[error("invalid client config: {0}")]
    Config(#[from] serde_json::Error),
}
