//! Decoded records and outbound packets, one module per subsystem.
//!
//! Each module owns the authoritative codec for its opcodes and a closed
//! category enum (`ChatMessage`, `LootMessage`, ...). [`ServerMessage`]
//! ties the categories together for callers that don't know in advance
//! which category an opcode belongs to.

pub mod chat;
pub mod gossip;
pub mod loot;
pub mod mail;
pub mod object;
pub mod party;
pub mod quest;
pub mod spell;
pub mod trainer;

use emberlink_transport::Opcode;

use crate::wire::Decoded;
use chat::ChatMessage;
use gossip::GossipMessage;
use loot::LootMessage;
use mail::MailMessage;
use party::PartyMessage;
use quest::QuestMessage;
use spell::SpellMessage;
use trainer::TrainerMessage;

/// Any server message this client understands.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Chat(ChatMessage),
    Loot(LootMessage),
    Gossip(GossipMessage),
    Mail(MailMessage),
    Quest(QuestMessage),
    Spell(SpellMessage),
    Party(PartyMessage),
    Trainer(TrainerMessage),
    /// An opcode with no decoder here. The payload is not inspected.
    Unknown(Opcode),
}

impl ServerMessage {
    /// Decodes `bytes` as the layout `opcode` names.
    ///
    /// Total: never fails and never panics. Unknown opcodes come back as
    /// [`ServerMessage::Unknown`]; short or malformed payloads come back
    /// [`Truncated`](crate::DecodeQuality::Truncated) with whatever could be
    /// read.
    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Decoded<Self> {
        ChatMessage::decode(opcode, bytes)
            .map(|d| d.map(Self::Chat))
            .or_else(|| LootMessage::decode(opcode, bytes).map(|d| d.map(Self::Loot)))
            .or_else(|| GossipMessage::decode(opcode, bytes).map(|d| d.map(Self::Gossip)))
            .or_else(|| MailMessage::decode(opcode, bytes).map(|d| d.map(Self::Mail)))
            .or_else(|| QuestMessage::decode(opcode, bytes).map(|d| d.map(Self::Quest)))
            .or_else(|| SpellMessage::decode(opcode, bytes).map(|d| d.map(Self::Spell)))
            .or_else(|| PartyMessage::decode(opcode, bytes).map(|d| d.map(Self::Party)))
            .or_else(|| TrainerMessage::decode(opcode, bytes).map(|d| d.map(Self::Trainer)))
            .unwrap_or_else(|| Decoded::complete(Self::Unknown(opcode)))
    }

    /// Every server opcode with a decoder.
    pub fn opcodes() -> impl Iterator<Item = Opcode> {
        [
            ChatMessage::OPCODES,
            LootMessage::OPCODES,
            GossipMessage::OPCODES,
            MailMessage::OPCODES,
            QuestMessage::OPCODES,
            SpellMessage::OPCODES,
            PartyMessage::OPCODES,
            TrainerMessage::OPCODES,
        ]
        .into_iter()
        .flatten()
        .copied()
    }

    /// Short category name, for logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Chat(_) => "chat",
            Self::Loot(_) => "loot",
            Self::Gossip(_) => "gossip",
            Self::Mail(_) => "mail",
            Self::Quest(_) => "quest",
            Self::Spell(_) => "spell",
            Self::Party(_) => "party",
            Self::Trainer(_) => "trainer",
            Self::Unknown(_) => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::opcodes;

    #[test]
    fn test_unknown_opcode_is_complete_unknown() {
        let decoded = ServerMessage::decode(Opcode(0x7FF), &[1, 2, 3]);
        assert!(decoded.is_complete());
        assert_eq!(decoded.value, ServerMessage::Unknown(Opcode(0x7FF)));
    }

    #[test]
    fn test_gossip_complete_routes_to_gossip() {
        let decoded = ServerMessage::decode(opcodes::SMSG_GOSSIP_COMPLETE, &[]);
        assert_eq!(decoded.value, ServerMessage::Gossip(GossipMessage::Complete));
    }

    #[test]
    fn test_group_list_routes_to_party() {
        let decoded = ServerMessage::decode(opcodes::SMSG_GROUP_LIST, &[]);
        assert_eq!(decoded.value.category(), "party");
        assert!(!decoded.is_complete());
    }

    #[test]
    fn test_opcode_catalogue_has_no_duplicates() {
        let all: Vec<Opcode> = ServerMessage::opcodes().collect();
        let unique: HashSet<Opcode> = all.iter().copied().collect();
        assert_eq!(all.len(), unique.len());
    }

    #[test]
    fn test_every_listed_opcode_decodes_to_its_category() {
        for opcode in ServerMessage::opcodes() {
            let decoded = ServerMessage::decode(opcode, &[]);
            assert_ne!(decoded.value, ServerMessage::Unknown(opcode), "{opcode}");
        }
    }
}
