//! Error types for the protocol layer.
//!
//! Decoding never fails (see [`DecodeQuality`](crate::DecodeQuality)), so
//! every variant here comes from encoding an outbound packet whose
//! arguments can't be represented on the wire.

/// Errors that can occur while encoding an outbound packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A string argument is longer than the wire allows.
    #[error("{field} is {len} bytes, limit is {max}")]
    StringTooLong {
        /// Which argument.
        field: &'static str,
        /// Its encoded length.
        len: usize,
        /// The limit for that field.
        max: usize,
    },

    /// A string argument contains an embedded NUL, which would terminate
    /// it early on the wire.
    #[error("{0} contains a NUL byte")]
    EmbeddedNul(&'static str),

    /// A required string argument is empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// Any other argument the wire format can't carry.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
