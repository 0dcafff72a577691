//! Chat: rate-limited outbound lines and the active-channel set.
//!
//! There is no window here. The channel set follows the server's
//! you-joined / you-left notices, with one optimistic step: a channel is
//! listed as soon as [`ChatSystem::join_channel`] is called and removed
//! again if the send fails or the server rejects the join.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use emberlink_protocol::messages::chat::{
    ChannelNotify, ChannelNotifyKind, ChatLine, ChatMessage, ChatType, JoinChannel, LeaveChannel,
    SendChatMessage,
};
use emberlink_protocol::{ClientPacket, Guid, ServerMessage};
use emberlink_session::{compose, SessionError};
use emberlink_throttle::{CooldownConfig, RateLimiter};
use emberlink_transport::Transport;
use futures_util::Stream;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::base::SystemCore;
use crate::SystemContext;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Minimum spacing between two outbound lines of the same chat type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCooldowns {
    pub say: Duration,
    pub yell: Duration,
    /// Every other type: whisper, party, guild, officer, raid, raid
    /// warning, battleground, channel and emote.
    pub other: Duration,
}

impl Default for ChatCooldowns {
    fn default() -> Self {
        Self {
            say: Duration::from_secs(1),
            yell: Duration::from_secs(2),
            other: Duration::from_millis(500),
        }
    }
}

impl ChatCooldowns {
    /// Longest cooldown accepted per type.
    pub const MAX: Duration = Duration::from_secs(10);

    /// Clamps every cooldown to [`Self::MAX`].
    pub fn validated(mut self) -> Self {
        for (name, cooldown) in [
            ("say", &mut self.say),
            ("yell", &mut self.yell),
            ("other", &mut self.other),
        ] {
            if *cooldown > Self::MAX {
                warn!(kind = name, cooldown_ms = cooldown.as_millis() as u64, "chat cooldown too long, clamping");
                *cooldown = Self::MAX;
            }
        }
        self
    }

    /// The limiter table keyed by chat type.
    pub fn to_config(&self) -> CooldownConfig<ChatType> {
        CooldownConfig::uniform(self.other)
            .with(ChatType::Say, self.say)
            .with(ChatType::Yell, self.yell)
    }
}

// ---------------------------------------------------------------------------
// Events and views
// ---------------------------------------------------------------------------

/// Everything the chat system publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A chat line.
    Message(ReceivedLine),
    /// A channel notice.
    Channel(ChannelNotify),
    /// A whisper went to a name that doesn't exist.
    PlayerNotFound(String),
}

/// A chat line as it came off the wire, stamped on arrival.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedLine {
    pub line: ChatLine,
    /// Sent through the GM chat opcode.
    pub gm: bool,
    /// When the listener folded the line in.
    pub received_at: Instant,
}

impl ReceivedLine {
    fn now(line: ChatLine, gm: bool) -> Self {
        Self {
            line,
            gm,
            received_at: Instant::now(),
        }
    }
}

/// What a [`Notification`] is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    ChannelJoined,
    ChannelLeft,
    ChannelNotice,
    System,
}

/// A channel or system notice, flattened for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub channel: Option<String>,
    pub player: Option<Guid>,
    pub text: String,
}

impl Notification {
    fn from_notify(notify: &ChannelNotify) -> Option<Self> {
        let kind = match notify.kind {
            ChannelNotifyKind::Joined | ChannelNotifyKind::YouJoined => NotificationKind::ChannelJoined,
            ChannelNotifyKind::Left | ChannelNotifyKind::YouLeft => NotificationKind::ChannelLeft,
            kind if kind.is_join_rejection() => return None,
            _ => NotificationKind::ChannelNotice,
        };
        Some(Self {
            kind,
            channel: Some(notify.channel.clone()),
            player: notify.player,
            text: String::new(),
        })
    }

    fn from_line(line: &ChatLine) -> Option<Self> {
        let kind = match line.chat_type {
            ChatType::System => NotificationKind::System,
            ChatType::ChannelJoin => NotificationKind::ChannelJoined,
            ChatType::ChannelLeave => NotificationKind::ChannelLeft,
            ChatType::ChannelNotice => NotificationKind::ChannelNotice,
            _ => return None,
        };
        Some(Self {
            kind,
            channel: line.channel.clone(),
            player: line.sender.non_empty(),
            text: line.text.clone(),
        })
    }
}

/// A server-side chat failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    PlayerNotFound(String),
    ChannelRejected {
        channel: String,
        kind: ChannelNotifyKind,
    },
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ChatState {
    /// Lower-cased name → name as the server spells it.
    channels: BTreeMap<String, String>,
    /// Joins listed optimistically and not yet confirmed.
    pending_joins: HashSet<String>,
}

fn channel_key(name: &str) -> String {
    name.to_lowercase()
}

impl ChatState {
    fn apply(&mut self, message: ServerMessage, events: &mut Vec<ChatEvent>) {
        let ServerMessage::Chat(message) = message else {
            return;
        };
        match message {
            ChatMessage::Line(line) => events.push(ChatEvent::Message(ReceivedLine::now(line, false))),
            ChatMessage::GmLine(line) => events.push(ChatEvent::Message(ReceivedLine::now(line, true))),
            ChatMessage::ChannelNotify(notify) => {
                self.apply_notify(&notify);
                events.push(ChatEvent::Channel(notify));
            }
            ChatMessage::PlayerNotFound(not_found) => {
                events.push(ChatEvent::PlayerNotFound(not_found.name));
            }
        }
    }

    fn apply_notify(&mut self, notify: &ChannelNotify) {
        let key = channel_key(&notify.channel);
        match notify.kind {
            ChannelNotifyKind::YouJoined => {
                self.pending_joins.remove(&key);
                info!(channel = %notify.channel, "joined channel");
                self.channels.insert(key, notify.channel.clone());
            }
            ChannelNotifyKind::YouLeft => {
                self.pending_joins.remove(&key);
                info!(channel = %notify.channel, "left channel");
                self.channels.remove(&key);
            }
            kind if kind.is_join_rejection() => {
                let was_pending = self.pending_joins.remove(&key);
                if self.channels.remove(&key).is_some() {
                    debug!(channel = %notify.channel, ?kind, was_pending, "channel membership reverted");
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// The chat subsystem.
pub struct ChatSystem<T> {
    core: SystemCore<T, ChatState, ChatEvent>,
    limiter: RateLimiter<ChatType>,
    language: AtomicU32,
}

impl<T: Transport> ChatSystem<T> {
    pub fn new(ctx: &SystemContext<T>, cooldowns: ChatCooldowns) -> Self {
        let cooldowns = cooldowns.validated();
        Self {
            core: SystemCore::start(
                ctx,
                "chat",
                ChatState::default(),
                ChatMessage::OPCODES,
                ChatState::apply,
            ),
            limiter: RateLimiter::new(cooldowns.to_config()),
            language: AtomicU32::new(0),
        }
    }

    /// Language id stamped on outbound lines.
    pub fn set_language(&self, language: u32) {
        self.language.store(language, Ordering::Relaxed);
    }

    // -- commands -----------------------------------------------------------

    async fn send_line(
        &self,
        chat_type: ChatType,
        target: Option<&str>,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.core.cell.ensure_live()?;
        let mut packet = SendChatMessage::new(chat_type, text);
        packet.language = self.language.load(Ordering::Relaxed);
        if let Some(target) = target {
            packet = packet.with_target(target);
        }
        self.core
            .outbound
            .send_throttled(&self.limiter, chat_type, &packet, cancel)
            .await
    }

    pub async fn say(&self, text: &str, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.send_line(ChatType::Say, None, text, cancel).await
    }

    pub async fn yell(&self, text: &str, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.send_line(ChatType::Yell, None, text, cancel).await
    }

    pub async fn emote(&self, text: &str, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.send_line(ChatType::Emote, None, text, cancel).await
    }

    pub async fn party(&self, text: &str, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.send_line(ChatType::Party, None, text, cancel).await
    }

    pub async fn guild(&self, text: &str, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.send_line(ChatType::Guild, None, text, cancel).await
    }

    pub async fn officer(&self, text: &str, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.send_line(ChatType::Officer, None, text, cancel).await
    }

    pub async fn raid(&self, text: &str, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.send_line(ChatType::Raid, None, text, cancel).await
    }

    pub async fn raid_warning(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.send_line(ChatType::RaidWarning, None, text, cancel).await
    }

    pub async fn battleground(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.send_line(ChatType::Battleground, None, text, cancel).await
    }

    pub async fn whisper(
        &self,
        target: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.send_line(ChatType::Whisper, Some(target), text, cancel).await
    }

    /// Speaks in a joined channel.
    pub async fn channel(
        &self,
        channel: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.send_line(ChatType::Channel, Some(channel), text, cancel).await
    }

    /// Joins `name`. The channel is listed immediately and removed again if
    /// the send fails or the server rejects the join.
    pub async fn join_channel(
        &self,
        name: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.core.cell.ensure_live()?;
        let packet = JoinChannel {
            name: name.to_owned(),
            password: password.to_owned(),
        };
        // A name the codec refuses is never listed.
        packet.encode()?;

        let key = channel_key(name);
        let inserted = self.core.cell.update(|state| {
            if state.channels.contains_key(&key) {
                return false;
            }
            state.channels.insert(key.clone(), name.to_owned());
            state.pending_joins.insert(key.clone());
            true
        });

        let result = self.core.outbound.send(&packet, cancel).await;
        if result.is_err() && inserted {
            self.core.cell.update(|state| {
                if state.pending_joins.remove(&key) {
                    state.channels.remove(&key);
                }
            });
        }
        result
    }

    /// Leaves `name`. Membership ends when the server confirms.
    pub async fn leave_channel(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.core
            .send(&LeaveChannel { name: name.to_owned() }, cancel)
            .await
    }

    // -- queries ------------------------------------------------------------

    /// Joined channels, alphabetically.
    pub fn active_channels(&self) -> Vec<String> {
        self.core
            .cell
            .read(|state| state.channels.values().cloned().collect())
    }

    /// Case-insensitive membership test.
    pub fn is_in_channel(&self, name: &str) -> bool {
        self.core
            .cell
            .read(|state| state.channels.contains_key(&channel_key(name)))
    }

    // -- views --------------------------------------------------------------

    pub fn events(&self) -> impl Stream<Item = ChatEvent> + Send + 'static {
        self.core.events()
    }

    /// Every chat line, GM lines included.
    pub fn messages(&self) -> impl Stream<Item = ReceivedLine> + Send + 'static {
        compose::projected(self.events(), |event| match event {
            ChatEvent::Message(received) => Some(received),
            _ => None,
        })
    }

    /// Lines of one chat type.
    pub fn messages_of(
        &self,
        chat_type: ChatType,
    ) -> impl Stream<Item = ReceivedLine> + Send + 'static {
        compose::filtered(self.messages(), move |received| received.line.chat_type == chat_type)
    }

    pub fn says(&self) -> impl Stream<Item = ReceivedLine> + Send + 'static {
        self.messages_of(ChatType::Say)
    }

    pub fn whispers(&self) -> impl Stream<Item = ReceivedLine> + Send + 'static {
        self.messages_of(ChatType::Whisper)
    }

    /// Channel joins, leaves and notices plus system lines.
    pub fn notifications(&self) -> impl Stream<Item = Notification> + Send + 'static {
        compose::projected(self.events(), |event| match event {
            ChatEvent::Channel(notify) => Notification::from_notify(&notify),
            ChatEvent::Message(received) => Notification::from_line(&received.line),
            ChatEvent::PlayerNotFound(_) => None,
        })
    }

    /// Unknown whisper targets and rejected channel joins.
    pub fn errors(&self) -> impl Stream<Item = ChatError> + Send + 'static {
        let not_found = compose::projected(self.events(), |event| match event {
            ChatEvent::PlayerNotFound(name) => Some(ChatError::PlayerNotFound(name)),
            _ => None,
        });
        let rejected = compose::projected(self.events(), |event| match event {
            ChatEvent::Channel(notify) if notify.kind.is_join_rejection() => {
                Some(ChatError::ChannelRejected {
                    channel: notify.channel,
                    kind: notify.kind,
                })
            }
            _ => None,
        });
        compose::merged(not_found, rejected)
    }

    // -- lifecycle ----------------------------------------------------------

    /// Stops the listener. Later commands fail with
    /// [`SessionError::Disposed`].
    pub fn dispose(&self) {
        self.core.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}
