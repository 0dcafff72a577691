//! # Emberlink
//!
//! Client-side session layer for an opcode-multiplexed binary game
//! protocol.
//!
//! A [`Client`] wires one transport into a shared multiplexer and runs one
//! state machine per game feature on top of it: chat, loot, gossip,
//! mailbox, quests, spell casting, party and trainers. Each subsystem
//! exposes async commands, sync queries over its current state, and event
//! streams.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use emberlink::prelude::*;
//! use futures_util::StreamExt;
//!
//! # async fn run() -> Result<(), EmberlinkError> {
//! emberlink::init_tracing();
//!
//! let client = ClientBuilder::new()
//!     .player(Guid(0x42))
//!     .connect("127.0.0.1:8085")
//!     .await?;
//!
//! let cancel = CancellationToken::new();
//! client.chat().join_channel("world", "", &cancel).await?;
//!
//! let mut lines = Box::pin(client.chat().messages());
//! while let Some(received) = lines.next().await {
//!     println!("{}: {}", received.line.sender, received.line.text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! | Crate | Role |
//! |---|---|
//! | `emberlink-transport` | framed connection, in-memory test transport |
//! | `emberlink-protocol` | wire codec and message catalogue |
//! | `emberlink-throttle` | per-key cooldowns |
//! | `emberlink-session` | multiplexer, outbound path, state cells |
//! | `emberlink-systems` | the subsystems |

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod client;
mod config;
mod error;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use error::EmberlinkError;

pub use emberlink_protocol as protocol;
pub use emberlink_session as session;
pub use emberlink_systems as systems;
pub use emberlink_throttle as throttle;
pub use emberlink_transport as transport;

/// Installs a `tracing` subscriber that logs to stderr.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Returns
/// `false` if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}

/// Common imports for applications.
pub mod prelude {
    pub use crate::{Client, ClientBuilder, ClientConfig, EmberlinkError};
    pub use emberlink_protocol::messages::chat::{ChatLine, ChatType};
    pub use emberlink_protocol::{Guid, Opcode};
    pub use emberlink_session::{Phase, PreconditionViolation, SessionError};
    pub use emberlink_systems::{
        ChatCooldowns, ChatSystem, GossipSystem, LootSystem, MailboxSystem, PartySystem,
        ProfessionsSystem, QuestSystem, ReceivedLine, SpellCastSystem,
    };
    pub use emberlink_transport::{MemoryTransport, TcpTransport, Transport};
    pub use tokio_util::sync::CancellationToken;
}
