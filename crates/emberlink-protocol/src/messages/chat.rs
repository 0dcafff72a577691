//! Chat and channel messages.

use emberlink_transport::Opcode;

use crate::opcodes::{
    CMSG_JOIN_CHANNEL, CMSG_LEAVE_CHANNEL, CMSG_MESSAGECHAT, SMSG_CHANNEL_NOTIFY,
    SMSG_CHAT_PLAYER_NOT_FOUND, SMSG_GM_MESSAGECHAT, SMSG_MESSAGECHAT,
};
use crate::packet::{wire_enum, ClientPacket, ServerPacket};
use crate::wire::{check_cstring, Decoded, WireReader, WireWriter};
use crate::{Guid, ProtocolError};

/// Longest chat text the server accepts.
pub const MAX_CHAT_TEXT: usize = 255;
/// Longest channel name or whisper target.
pub const MAX_CHAT_TARGET: usize = 64;

wire_enum! {
    /// Chat message kind.
    pub enum ChatType: u8 {
        System = 0x00,
        Say = 0x01,
        Party = 0x02,
        Raid = 0x03,
        Guild = 0x04,
        Officer = 0x05,
        Yell = 0x06,
        Whisper = 0x07,
        WhisperInform = 0x09,
        Emote = 0x0A,
        TextEmote = 0x0B,
        MonsterSay = 0x0C,
        MonsterParty = 0x0D,
        MonsterYell = 0x0E,
        MonsterWhisper = 0x0F,
        MonsterEmote = 0x10,
        Channel = 0x11,
        ChannelJoin = 0x12,
        ChannelLeave = 0x13,
        ChannelNotice = 0x15,
        Afk = 0x17,
        Dnd = 0x18,
        Ignored = 0x19,
        Loot = 0x1B,
        RaidLeader = 0x27,
        RaidWarning = 0x28,
        Battleground = 0x2C,
        BattlegroundLeader = 0x2D,
        PartyLeader = 0x33,
    }
}

impl ChatType {
    /// Types spoken by creatures, which carry the speaker's name inline.
    pub fn is_monster(self) -> bool {
        matches!(
            self,
            Self::MonsterSay
                | Self::MonsterParty
                | Self::MonsterYell
                | Self::MonsterWhisper
                | Self::MonsterEmote
        )
    }
}

wire_enum! {
    /// What a channel notice reports.
    pub enum ChannelNotifyKind: u8 {
        Joined = 0x00,
        Left = 0x01,
        YouJoined = 0x02,
        YouLeft = 0x03,
        WrongPassword = 0x04,
        NotMember = 0x05,
        NotModerator = 0x06,
        PasswordChanged = 0x07,
        OwnerChanged = 0x08,
        PlayerNotFound = 0x09,
        NotOwner = 0x0A,
        ChannelOwner = 0x0B,
        ModeChange = 0x0C,
        AnnouncementsOn = 0x0D,
        AnnouncementsOff = 0x0E,
        Muted = 0x11,
        PlayerKicked = 0x12,
        Banned = 0x13,
        PlayerAlreadyMember = 0x17,
        WrongFaction = 0x1A,
        InvalidName = 0x1B,
        Throttled = 0x1F,
        NotInArea = 0x20,
    }
}

impl ChannelNotifyKind {
    /// Notices that mean a join attempt did not take effect.
    pub fn is_join_rejection(self) -> bool {
        matches!(
            self,
            Self::WrongPassword
                | Self::NotMember
                | Self::Banned
                | Self::WrongFaction
                | Self::InvalidName
                | Self::Throttled
                | Self::NotInArea
        )
    }

    fn carries_player(self) -> bool {
        matches!(self, Self::Joined | Self::Left)
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// One received chat line.
///
/// ```text
/// u8 type, u32 language,
///   channel:  cstring channel, u32 rank, u64 sender
///   say/party/yell: u64 sender, u64 sender
///   monster:  u64 sender, u32 nameLen, cstring name, u64 target
///   other:    u64 sender
/// u32 textLen, cstring text, u8 tag
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ChatLine {
    pub chat_type: ChatType,
    pub language: u32,
    pub sender: Guid,
    /// Creature name for monster lines, GM name for GM lines.
    pub sender_name: Option<String>,
    pub target: Guid,
    pub channel: Option<String>,
    pub rank: u32,
    pub text: String,
    pub tag: u8,
}

impl ChatLine {
    /// A plain line of `chat_type` from `sender`.
    pub fn new(chat_type: ChatType, sender: Guid, text: impl Into<String>) -> Self {
        Self {
            chat_type,
            language: 0,
            sender,
            sender_name: None,
            target: Guid::EMPTY,
            channel: None,
            rank: 0,
            text: text.into(),
            tag: 0,
        }
    }

    fn read_body(r: &mut WireReader<'_>, gm: bool) -> Self {
        let chat_type = ChatType::from_raw(r.u8());
        let mut line = Self::new(chat_type, Guid::EMPTY, String::new());
        line.language = r.u32();
        match chat_type {
            ChatType::Channel => {
                line.channel = Some(r.cstring());
                line.rank = r.u32();
                line.sender = r.guid();
            }
            ChatType::Say | ChatType::Party | ChatType::Yell => {
                line.sender = r.guid();
                r.skip(8);
            }
            t if t.is_monster() => {
                line.sender = r.guid();
                r.skip(4);
                line.sender_name = Some(r.cstring());
                line.target = r.guid();
            }
            _ => line.sender = r.guid(),
        }
        if gm && !chat_type.is_monster() {
            r.skip(4);
            line.sender_name = Some(r.cstring());
        }
        r.skip(4);
        line.text = r.cstring();
        line.tag = r.u8();
        line
    }

    fn write_body(&self, w: &mut WireWriter, gm: bool) {
        w.u8(self.chat_type.raw()).u32(self.language);
        match self.chat_type {
            ChatType::Channel => {
                w.cstring(self.channel.as_deref().unwrap_or_default())
                    .u32(self.rank)
                    .guid(self.sender);
            }
            ChatType::Say | ChatType::Party | ChatType::Yell => {
                w.guid(self.sender).guid(self.sender);
            }
            t if t.is_monster() => {
                let name = self.sender_name.as_deref().unwrap_or_default();
                w.guid(self.sender)
                    .u32(cstring_len(name))
                    .cstring(name)
                    .guid(self.target);
            }
            _ => {
                w.guid(self.sender);
            }
        }
        if gm && !self.chat_type.is_monster() {
            let name = self.sender_name.as_deref().unwrap_or_default();
            w.u32(cstring_len(name)).cstring(name);
        }
        w.u32(cstring_len(&self.text)).cstring(&self.text).u8(self.tag);
    }
}

fn cstring_len(s: &str) -> u32 {
    u32::try_from(s.len() + 1).unwrap_or(u32::MAX)
}

impl ServerPacket for ChatLine {
    const OPCODE: Opcode = SMSG_MESSAGECHAT;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self::read_body(r, false)
    }

    fn write(&self, w: &mut WireWriter) {
        self.write_body(w, false);
    }
}

/// A chat line sent by a game master; carries the GM's name after the
/// sender.
#[derive(Debug, Clone, PartialEq)]
pub struct GmChatLine(pub ChatLine);

impl ServerPacket for GmChatLine {
    const OPCODE: Opcode = SMSG_GM_MESSAGECHAT;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self(ChatLine::read_body(r, true))
    }

    fn write(&self, w: &mut WireWriter) {
        self.0.write_body(w, true);
    }
}

/// A channel notice.
///
/// ```text
/// u8 kind, cstring channel,
///   joined/left: u64 player
///   you-joined:  [u8 flags, u32 channelId]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNotify {
    pub kind: ChannelNotifyKind,
    pub channel: String,
    pub player: Option<Guid>,
    pub flags: u8,
    pub channel_id: Option<u32>,
}

impl ChannelNotify {
    pub fn new(kind: ChannelNotifyKind, channel: impl Into<String>) -> Self {
        Self {
            kind,
            channel: channel.into(),
            player: None,
            flags: 0,
            channel_id: None,
        }
    }
}

impl ServerPacket for ChannelNotify {
    const OPCODE: Opcode = SMSG_CHANNEL_NOTIFY;

    fn read(r: &mut WireReader<'_>) -> Self {
        let kind = ChannelNotifyKind::from_raw(r.u8());
        let mut notify = Self::new(kind, r.cstring());
        if kind.carries_player() {
            notify.player = Some(r.guid());
        } else if kind == ChannelNotifyKind::YouJoined && r.remaining() >= 5 {
            notify.flags = r.u8();
            notify.channel_id = Some(r.u32());
        }
        notify
    }

    fn write(&self, w: &mut WireWriter) {
        w.u8(self.kind.raw()).cstring(&self.channel);
        if self.kind.carries_player() {
            w.guid(self.player.unwrap_or_default());
        } else if let Some(id) = self.channel_id {
            w.u8(self.flags).u32(id);
        }
    }
}

/// A whisper target that doesn't exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerNotFound {
    pub name: String,
}

impl ServerPacket for PlayerNotFound {
    const OPCODE: Opcode = SMSG_CHAT_PLAYER_NOT_FOUND;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self { name: r.cstring() }
    }

    fn write(&self, w: &mut WireWriter) {
        w.cstring(&self.name);
    }
}

/// Every chat-category server message.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    Line(ChatLine),
    GmLine(ChatLine),
    ChannelNotify(ChannelNotify),
    PlayerNotFound(PlayerNotFound),
}

impl ChatMessage {
    pub const OPCODES: &'static [Opcode] = &[
        SMSG_MESSAGECHAT,
        SMSG_GM_MESSAGECHAT,
        SMSG_CHANNEL_NOTIFY,
        SMSG_CHAT_PLAYER_NOT_FOUND,
    ];

    /// Decodes a chat-category payload, or `None` if `opcode` isn't one.
    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Option<Decoded<Self>> {
        Some(match opcode {
            SMSG_MESSAGECHAT => ChatLine::decode(bytes).map(Self::Line),
            SMSG_GM_MESSAGECHAT => GmChatLine::decode(bytes).map(|gm| Self::GmLine(gm.0)),
            SMSG_CHANNEL_NOTIFY => ChannelNotify::decode(bytes).map(Self::ChannelNotify),
            SMSG_CHAT_PLAYER_NOT_FOUND => PlayerNotFound::decode(bytes).map(Self::PlayerNotFound),
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Sends a chat line.
///
/// ```text
/// u32 type, u32 language, [cstring target], cstring text
/// ```
///
/// Whispers carry the recipient name and channel lines the channel name as
/// `target`; other types have none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendChatMessage {
    pub chat_type: ChatType,
    pub language: u32,
    pub target: Option<String>,
    pub text: String,
}

impl SendChatMessage {
    pub fn new(chat_type: ChatType, text: impl Into<String>) -> Self {
        Self {
            chat_type,
            language: 0,
            target: None,
            text: text.into(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    fn needs_target(&self) -> bool {
        matches!(self.chat_type, ChatType::Whisper | ChatType::Channel)
    }
}

impl ClientPacket for SendChatMessage {
    const OPCODE: Opcode = CMSG_MESSAGECHAT;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        check_cstring("text", &self.text, MAX_CHAT_TEXT)?;
        let target = if self.needs_target() {
            let target = self.target.as_deref().unwrap_or_default();
            if target.is_empty() {
                return Err(ProtocolError::Empty("target"));
            }
            check_cstring("target", target, MAX_CHAT_TARGET)?;
            Some(target)
        } else {
            None
        };

        w.u32(u32::from(self.chat_type.raw())).u32(self.language);
        if let Some(target) = target {
            w.cstring(target);
        }
        w.cstring(&self.text);
        Ok(())
    }
}

/// Joins a chat channel: `cstring name, cstring password`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinChannel {
    pub name: String,
    pub password: String,
}

impl ClientPacket for JoinChannel {
    const OPCODE: Opcode = CMSG_JOIN_CHANNEL;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        if self.name.is_empty() {
            return Err(ProtocolError::Empty("channel"));
        }
        check_cstring("channel", &self.name, MAX_CHAT_TARGET)?;
        check_cstring("password", &self.password, MAX_CHAT_TARGET)?;
        w.cstring(&self.name).cstring(&self.password);
        Ok(())
    }
}

/// Leaves a chat channel: `cstring name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveChannel {
    pub name: String,
}

impl ClientPacket for LeaveChannel {
    const OPCODE: Opcode = CMSG_LEAVE_CHANNEL;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        if self.name.is_empty() {
            return Err(ProtocolError::Empty("channel"));
        }
        check_cstring("channel", &self.name, MAX_CHAT_TARGET)?;
        w.cstring(&self.name);
        Ok(())
    }
}
