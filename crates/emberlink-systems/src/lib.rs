//! Emberlink subsystems: the stateful client side of each game feature.
//!
//! Every subsystem follows the same shape:
//!
//! - a state cell behind one lock, mutated only by its listener task (from
//!   decoded server messages) and by successful commands;
//! - async commands that check their preconditions, send through the
//!   shared outbound path and return [`SessionError`] on failure;
//! - sync queries that copy out of the state;
//! - event views built with [`emberlink_session::compose`].
//!
//! ```text
//! Transport ─→ Multiplexer ─→ Listener ─→ state ─→ events ─→ views
//!     ↑                                     │
//!     └──────────── Outbound ←── commands ──┘
//! ```
//!
//! Subsystems share one [`SystemContext`]: the multiplexer they subscribe
//! through, the outbound path and the local player's GUID.

use std::sync::Arc;

use emberlink_protocol::Guid;
use emberlink_session::{Multiplexer, MultiplexerConfig, Outbound};
use emberlink_transport::Transport;

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod base;

pub mod chat;
pub mod gossip;
pub mod loot;
pub mod mail;
pub mod party;
pub mod professions;
pub mod quest;
pub mod spell;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use chat::{ChatCooldowns, ChatSystem, ReceivedLine};
pub use emberlink_session::SessionError;
pub use gossip::GossipSystem;
pub use loot::LootSystem;
pub use mail::MailboxSystem;
pub use party::PartySystem;
pub use professions::ProfessionsSystem;
pub use quest::QuestSystem;
pub use spell::SpellCastSystem;

// ---------------------------------------------------------------------------
// Shared context
// ---------------------------------------------------------------------------

/// Default buffer for each subsystem's event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// What every subsystem is built from.
pub struct SystemContext<T> {
    pub multiplexer: Multiplexer<T>,
    pub outbound: Outbound<T>,
    /// The local player. Loot, spell and party folds compare against it.
    pub player: Guid,
    /// Buffer of each subsystem's event channel. Slow views skip ahead
    /// once they fall this far behind.
    pub event_capacity: usize,
}

impl<T> Clone for SystemContext<T> {
    fn clone(&self) -> Self {
        Self {
            multiplexer: self.multiplexer.clone(),
            outbound: self.outbound.clone(),
            player: self.player,
            event_capacity: self.event_capacity,
        }
    }
}

impl<T: Transport> SystemContext<T> {
    pub fn new(transport: Arc<T>, player: Guid) -> Self {
        Self::with_config(transport, player, MultiplexerConfig::default(), DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_config(
        transport: Arc<T>,
        player: Guid,
        multiplexer: MultiplexerConfig,
        event_capacity: usize,
    ) -> Self {
        Self {
            multiplexer: Multiplexer::new(Arc::clone(&transport), multiplexer),
            outbound: Outbound::new(transport),
            player,
            event_capacity: event_capacity.max(1),
        }
    }
}

impl<T> std::fmt::Debug for SystemContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemContext")
            .field("player", &self.player)
            .field("event_capacity", &self.event_capacity)
            .finish_non_exhaustive()
    }
}
