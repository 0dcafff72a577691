//! `Client` builder and the wired-up session.
//!
//! One client owns one transport, one multiplexer and one instance of
//! every subsystem, all built from a shared [`SystemContext`].

use std::sync::Arc;

use emberlink_protocol::Guid;
use emberlink_systems::{
    ChatCooldowns, ChatSystem, GossipSystem, LootSystem, MailboxSystem, PartySystem,
    ProfessionsSystem, QuestSystem, SpellCastSystem, SystemContext,
};
use emberlink_transport::{TcpTransport, Transport};
use tracing::info;

use crate::config::millis;
use crate::{ClientConfig, EmberlinkError};

/// Builder for a [`Client`].
///
/// # Example
///
/// ```rust,ignore
/// use emberlink::prelude::*;
///
/// let client = ClientBuilder::new()
///     .player(Guid(0x42))
///     .connect("127.0.0.1:8085")
///     .await?;
/// client.chat().say("hello", &CancellationToken::new()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the local player's GUID.
    pub fn player(mut self, player: Guid) -> Self {
        self.config.player = player.0;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Sets the chat cooldowns, rounded down to whole milliseconds.
    pub fn chat_cooldowns(mut self, cooldowns: ChatCooldowns) -> Self {
        self.config.say_cooldown_ms = millis(cooldowns.say);
        self.config.yell_cooldown_ms = millis(cooldowns.yell);
        self.config.other_cooldown_ms = millis(cooldowns.other);
        self
    }

    /// Wires every subsystem onto `transport`.
    ///
    /// Spawns listener tasks, so it must run inside a Tokio runtime.
    pub fn build<T: Transport>(self, transport: Arc<T>) -> Client<T> {
        let config = self.config.validated();
        let context = SystemContext::with_config(
            Arc::clone(&transport),
            config.player_guid(),
            config.multiplexer(),
            config.event_capacity,
        );

        let client = Client {
            chat: ChatSystem::new(&context, config.chat_cooldowns()),
            loot: LootSystem::new(&context),
            gossip: GossipSystem::new(&context),
            mail: MailboxSystem::new(&context),
            quest: QuestSystem::new(&context),
            spell: SpellCastSystem::new(&context),
            party: PartySystem::new(&context),
            professions: ProfessionsSystem::new(&context),
            transport,
            context,
        };
        info!(
            player = %client.context.player,
            routes = client.context.multiplexer.active_routes().len(),
            "client ready"
        );
        client
    }

    /// Connects to `addr` over framed TCP and builds the client on it.
    pub async fn connect(self, addr: &str) -> Result<Client<TcpTransport>, EmberlinkError> {
        let transport = TcpTransport::connect(addr).await?;
        Ok(self.build(Arc::new(transport)))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A connected game session with every subsystem running.
///
/// Dropping the client stops every listener. [`dispose`](Self::dispose)
/// does the same while keeping the handles around, so later commands fail
/// with a disposed error instead of panicking on a dropped value.
pub struct Client<T> {
    transport: Arc<T>,
    context: SystemContext<T>,
    chat: ChatSystem<T>,
    loot: LootSystem<T>,
    gossip: GossipSystem<T>,
    mail: MailboxSystem<T>,
    quest: QuestSystem<T>,
    spell: SpellCastSystem<T>,
    party: PartySystem<T>,
    professions: ProfessionsSystem<T>,
}

impl<T: Transport> Client<T> {
    /// Builds a client on `transport` from `config`.
    pub fn new(transport: Arc<T>, config: ClientConfig) -> Self {
        ClientBuilder::new().config(config).build(transport)
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// The shared context, for building extra views or subsystems.
    pub fn context(&self) -> &SystemContext<T> {
        &self.context
    }

    pub fn player(&self) -> Guid {
        self.context.player
    }

    pub fn chat(&self) -> &ChatSystem<T> {
        &self.chat
    }

    pub fn loot(&self) -> &LootSystem<T> {
        &self.loot
    }

    pub fn gossip(&self) -> &GossipSystem<T> {
        &self.gossip
    }

    pub fn mail(&self) -> &MailboxSystem<T> {
        &self.mail
    }

    pub fn quest(&self) -> &QuestSystem<T> {
        &self.quest
    }

    pub fn spell(&self) -> &SpellCastSystem<T> {
        &self.spell
    }

    pub fn party(&self) -> &PartySystem<T> {
        &self.party
    }

    pub fn professions(&self) -> &ProfessionsSystem<T> {
        &self.professions
    }

    /// Disposes every subsystem. Idempotent.
    pub fn dispose(&self) {
        self.chat.dispose();
        self.loot.dispose();
        self.gossip.dispose();
        self.mail.dispose();
        self.quest.dispose();
        self.spell.dispose();
        self.party.dispose();
        self.professions.dispose();
        info!(player = %self.context.player, "client disposed");
    }

    /// Returns `true` once [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.chat.is_disposed()
            && self.loot.is_disposed()
            && self.gossip.is_disposed()
            && self.mail.is_disposed()
            && self.quest.is_disposed()
            && self.spell.is_disposed()
            && self.party.is_disposed()
            && self.professions.is_disposed()
    }
}

impl<T> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
