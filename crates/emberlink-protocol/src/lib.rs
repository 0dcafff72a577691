//! Wire protocol for Emberlink.
//!
//! This crate is the one authoritative codec shared by every subsystem:
//!
//! - **Primitives** ([`WireReader`], [`WireWriter`]): little-endian
//!   integers, packed GUIDs and NUL-terminated strings.
//! - **Opcodes** ([`opcodes`]): the tag catalogue for both directions.
//! - **Messages** ([`messages`]): one decoded record per server opcode and
//!   one packet per client command, grouped by subsystem.
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (bytes per opcode) and
//! the session layer (state machines). It never touches a connection and
//! holds no state.
//!
//! ```text
//! Transport (opcode, bytes) → Protocol (ServerMessage) → Session
//! ```
//!
//! # Decoding never fails
//!
//! Every decoder is total: empty, short or random input produces a value
//! plus [`DecodeQuality::Truncated`], never a panic or an error. Counted
//! lists stop where the bytes stop and never allocate from the count alone.

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod error;
mod guid;
pub mod messages;
pub mod opcodes;
mod packet;
mod wire;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use emberlink_transport::Opcode;
pub use error::ProtocolError;
pub use guid::Guid;
pub use messages::ServerMessage;
pub use packet::{ClientPacket, ServerPacket};
pub use wire::{check_cstring, DecodeQuality, Decoded, WireReader, WireWriter};
