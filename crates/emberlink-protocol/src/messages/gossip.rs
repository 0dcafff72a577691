//! NPC gossip dialogs.

use emberlink_transport::Opcode;

use crate::messages::quest::QuestSummary;
use crate::opcodes::{
    CMSG_GOSSIP_HELLO, CMSG_GOSSIP_SELECT_OPTION, CMSG_NPC_TEXT_QUERY, SMSG_GOSSIP_COMPLETE,
    SMSG_GOSSIP_MESSAGE, SMSG_NPC_TEXT_UPDATE,
};
use crate::packet::{guid_client_packet, wire_enum, ClientPacket, ServerPacket};
use crate::wire::{check_cstring, Decoded, WireReader, WireWriter};
use crate::{Guid, ProtocolError};

/// Number of text variants an NPC text record holds.
pub const NPC_TEXT_VARIANTS: usize = 8;
/// Longest code a coded gossip option accepts.
pub const MAX_GOSSIP_CODE: usize = 64;

wire_enum! {
    /// Icon shown beside a gossip option; hints at the service behind it.
    pub enum GossipIcon: u8 {
        Chat = 0,
        Vendor = 1,
        Taxi = 2,
        Trainer = 3,
        Interact = 4,
        Interact2 = 5,
        MoneyBag = 6,
        Talk = 7,
        Tabard = 8,
        Battle = 9,
        Dot = 10,
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// One selectable line of a gossip menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipOption {
    pub index: u32,
    pub icon: GossipIcon,
    /// The option asks for a code before it runs.
    pub coded: bool,
    pub box_money: u32,
    pub text: String,
    pub box_text: String,
}

impl GossipOption {
    const MIN_LEN: usize = 12;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            index: r.u32(),
            icon: GossipIcon::from_raw(r.u8()),
            coded: r.bool(),
            box_money: r.u32(),
            text: r.cstring(),
            box_text: r.cstring(),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.u32(self.index)
            .u8(self.icon.raw())
            .bool(self.coded)
            .u32(self.box_money)
            .cstring(&self.text)
            .cstring(&self.box_text);
    }
}

/// A gossip menu. Each one replaces the previous menu wholesale.
///
/// ```text
/// u64 npc, u32 menu, u32 text, u32 optionCount, optionCount × option,
/// u32 questCount, questCount × quest
/// option: u32 index, u8 icon, u8 coded, u32 boxMoney, cstring text,
///         cstring boxText
/// quest:  u32 id, u32 icon, i32 level, u32 flags, u8 repeatable,
///         cstring title
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipMenu {
    pub npc: Guid,
    pub menu_id: u32,
    pub text_id: u32,
    pub options: Vec<GossipOption>,
    pub quests: Vec<QuestSummary>,
}

impl ServerPacket for GossipMenu {
    const OPCODE: Opcode = SMSG_GOSSIP_MESSAGE;

    fn read(r: &mut WireReader<'_>) -> Self {
        let npc = r.guid();
        let menu_id = r.u32();
        let text_id = r.u32();
        let option_count = r.u32() as usize;
        let options = r.list(option_count, GossipOption::MIN_LEN, GossipOption::read);
        let quest_count = r.u32() as usize;
        let quests = r.list(quest_count, QuestSummary::MIN_LEN, QuestSummary::read);
        Self {
            npc,
            menu_id,
            text_id,
            options,
            quests,
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.guid(self.npc)
            .u32(self.menu_id)
            .u32(self.text_id)
            .u32(self.options.len() as u32);
        for option in &self.options {
            option.write(w);
        }
        w.u32(self.quests.len() as u32);
        for quest in &self.quests {
            quest.write(w);
        }
    }
}

/// The server closed the gossip window. Empty payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GossipComplete;

impl ServerPacket for GossipComplete {
    const OPCODE: Opcode = SMSG_GOSSIP_COMPLETE;

    fn read(_r: &mut WireReader<'_>) -> Self {
        Self
    }

    fn write(&self, _w: &mut WireWriter) {}
}

/// One variant of an NPC's text.
#[derive(Debug, Clone, PartialEq)]
pub struct NpcTextVariant {
    pub probability: f32,
    pub text_male: String,
    pub text_female: String,
    pub language: u32,
    pub emotes: [(u32, u32); 3],
}

impl NpcTextVariant {
    const MIN_LEN: usize = 34;

    fn read(r: &mut WireReader<'_>) -> Self {
        let probability = r.f32();
        let text_male = r.cstring();
        let text_female = r.cstring();
        let language = r.u32();
        let mut emotes = [(0, 0); 3];
        for emote in &mut emotes {
            *emote = (r.u32(), r.u32());
        }
        Self {
            probability,
            text_male,
            text_female,
            language,
            emotes,
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.f32(self.probability)
            .cstring(&self.text_male)
            .cstring(&self.text_female)
            .u32(self.language);
        for (delay, emote) in self.emotes {
            w.u32(delay).u32(emote);
        }
    }

    /// The first non-empty text of the pair.
    pub fn text(&self) -> &str {
        if self.text_male.is_empty() {
            &self.text_female
        } else {
            &self.text_male
        }
    }
}

/// The body text of a gossip menu, answered to an NPC text query.
///
/// ```text
/// u32 text, up to 8 × (f32 probability, cstring text0, cstring text1,
///                      u32 language, 3 × (u32 delay, u32 emote))
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NpcTextUpdate {
    pub text_id: u32,
    pub variants: Vec<NpcTextVariant>,
}

impl NpcTextUpdate {
    /// A record with one variant carrying `text`.
    pub fn single(text_id: u32, text: impl Into<String>) -> Self {
        Self {
            text_id,
            variants: vec![NpcTextVariant {
                probability: 1.0,
                text_male: text.into(),
                text_female: String::new(),
                language: 0,
                emotes: [(0, 0); 3],
            }],
        }
    }

    /// The text of the most likely variant that has any.
    pub fn best_text(&self) -> Option<&str> {
        self.variants
            .iter()
            .filter(|v| !v.text().is_empty())
            .max_by(|a, b| a.probability.total_cmp(&b.probability))
            .map(NpcTextVariant::text)
    }
}

impl ServerPacket for NpcTextUpdate {
    const OPCODE: Opcode = SMSG_NPC_TEXT_UPDATE;

    fn read(r: &mut WireReader<'_>) -> Self {
        let text_id = r.u32();
        let mut variants = Vec::new();
        while variants.len() < NPC_TEXT_VARIANTS && r.remaining() >= NpcTextVariant::MIN_LEN {
            let variant = NpcTextVariant::read(r);
            if r.is_truncated() {
                break;
            }
            variants.push(variant);
        }
        Self { text_id, variants }
    }

    fn write(&self, w: &mut WireWriter) {
        w.u32(self.text_id);
        for variant in self.variants.iter().take(NPC_TEXT_VARIANTS) {
            variant.write(w);
        }
    }
}

/// Every gossip-category server message.
#[derive(Debug, Clone, PartialEq)]
pub enum GossipMessage {
    Menu(GossipMenu),
    Complete,
    TextUpdate(NpcTextUpdate),
}

impl GossipMessage {
    pub const OPCODES: &'static [Opcode] =
        &[SMSG_GOSSIP_MESSAGE, SMSG_GOSSIP_COMPLETE, SMSG_NPC_TEXT_UPDATE];

    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Option<Decoded<Self>> {
        Some(match opcode {
            SMSG_GOSSIP_MESSAGE => GossipMenu::decode(bytes).map(Self::Menu),
            SMSG_GOSSIP_COMPLETE => GossipComplete::decode(bytes).map(|_| Self::Complete),
            SMSG_NPC_TEXT_UPDATE => NpcTextUpdate::decode(bytes).map(Self::TextUpdate),
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

guid_client_packet! {
    /// Starts talking to an NPC.
    GossipHello => CMSG_GOSSIP_HELLO
}

/// Picks a gossip option.
///
/// ```text
/// u64 npc, u32 menu, u32 index, [cstring code]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectGossipOption {
    pub npc: Guid,
    pub menu_id: u32,
    pub index: u32,
    pub code: Option<String>,
}

impl ClientPacket for SelectGossipOption {
    const OPCODE: Opcode = CMSG_GOSSIP_SELECT_OPTION;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        if let Some(code) = &self.code {
            check_cstring("code", code, MAX_GOSSIP_CODE)?;
        }
        w.guid(self.npc).u32(self.menu_id).u32(self.index);
        if let Some(code) = &self.code {
            w.cstring(code);
        }
        Ok(())
    }
}

/// Asks for an NPC text record: `u32 text, u64 npc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryNpcText {
    pub text_id: u32,
    pub npc: Guid,
}

impl ClientPacket for QueryNpcText {
    const OPCODE: Opcode = CMSG_NPC_TEXT_QUERY;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.u32(self.text_id).guid(self.npc);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DecodeQuality;

    fn menu() -> GossipMenu {
        GossipMenu {
            npc: Guid(0xF130_0000_0000_0042),
            menu_id: 4,
            text_id: 68,
            options: vec![
                GossipOption {
                    index: 0,
                    icon: GossipIcon::Vendor,
                    coded: false,
                    box_money: 0,
                    text: "Let me browse your goods.".into(),
                    box_text: String::new(),
                },
                GossipOption {
                    index: 1,
                    icon: GossipIcon::Trainer,
                    coded: false,
                    box_money: 0,
                    text: "Train me.".into(),
                    box_text: String::new(),
                },
            ],
            quests: vec![QuestSummary {
                quest_id: 783,
                icon: 2,
                level: 1,
                flags: 0,
                repeatable: false,
                title: "A Threat Within".into(),
            }],
        }
    }

    #[test]
    fn test_gossip_menu_decodes_options_and_quests() {
        let decoded = GossipMenu::decode(&menu().encode());
        assert!(decoded.is_complete());
        assert_eq!(decoded.value, menu());
    }

    #[test]
    fn test_gossip_menu_truncated_inside_option() {
        let bytes = menu().encode();
        let cut = &bytes[..30];
        let decoded = GossipMenu::decode(cut);
        assert_eq!(decoded.quality, DecodeQuality::Truncated);
        assert!(decoded.value.options.is_empty());
        assert_eq!(decoded.value.menu_id, 4);
    }

    #[test]
    fn test_npc_text_update_reads_variants() {
        let update = NpcTextUpdate::single(68, "Greetings, traveler.");
        let decoded = NpcTextUpdate::decode(&update.encode());
        assert!(decoded.is_complete());
        assert_eq!(decoded.value.best_text(), Some("Greetings, traveler."));
    }

    #[test]
    fn test_best_text_prefers_probable_variant() {
        let mut update = NpcTextUpdate::single(1, "rare");
        update.variants[0].probability = 0.1;
        let mut common = update.variants[0].clone();
        common.probability = 0.9;
        common.text_male = "common".into();
        update.variants.push(common);
        assert_eq!(update.best_text(), Some("common"));
    }

    #[test]
    fn test_select_option_with_code() {
        let packet = SelectGossipOption {
            npc: Guid(1),
            menu_id: 2,
            index: 3,
            code: Some("1234".into()),
        };
        let bytes = packet.encode().unwrap();
        assert_eq!(bytes.len(), 8 + 4 + 4 + 5);
        assert_eq!(&bytes[16..], b"1234\0");
    }

    #[test]
    fn test_query_npc_text_layout() {
        let bytes = QueryNpcText {
            text_id: 0x44,
            npc: Guid(7),
        }
        .encode()
        .unwrap();
        assert_eq!(bytes.as_ref(), &[0x44, 0, 0, 0, 7, 0, 0, 0, 0, 0, 0, 0]);
    }
}
