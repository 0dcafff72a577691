//! Session substrate for Emberlink.
//!
//! Everything the concrete subsystems have in common lives here:
//!
//! - **Fan-out** ([`Multiplexer`]): one transport registration per opcode,
//!   shared by every subscriber through a reference-counted route.
//! - **Outbound** ([`Outbound`]): validate, wait out the rate limit, send,
//!   record.
//! - **State** ([`SessionCell`], [`WindowState`],
//!   [`PendingConfirmations`]): one lock per subsystem, window
//!   transitions, acknowledgement tracking.
//! - **Inbound** ([`Listener`]): the task that decodes frames with the
//!   shared codec and folds them into a [`SessionCell`].
//! - **Views** ([`compose`]): stateless stream adapters over event channels.
//!
//! # How it fits in the stack
//!
//! ```text
//! Systems (above)        ← chat, loot, gossip, mail, quest, spell, party, trainer
//!     ↕
//! Session (this crate)   ← multiplexer, outbound path, state primitives
//!     ↕
//! Protocol / Transport   ← codec, opcodes, bytes in and out
//! ```
//!
//! # Locking
//!
//! State locks are `std::sync::Mutex` and are never held across an
//! `.await`. The only suspension points are the rate-limit wait and the
//! transport send.

mod cell;
pub mod compose;
mod error;
mod listener;
mod multiplexer;
mod outbound;
mod window;

pub use cell::SessionCell;
pub use error::{PreconditionViolation, SessionError};
pub use listener::Listener;
pub use multiplexer::{Multiplexer, MultiplexerConfig, Subscription, TaggedStream};
pub use outbound::Outbound;
pub use window::{PendingConfirmations, Phase, WindowState};
