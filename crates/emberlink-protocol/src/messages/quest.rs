//! Quest-giver dialogs and quest log commands.

use emberlink_transport::Opcode;

use crate::opcodes::{
    CMSG_QUESTGIVER_ACCEPT_QUEST, CMSG_QUESTGIVER_CANCEL, CMSG_QUESTGIVER_CHOOSE_REWARD,
    CMSG_QUESTGIVER_COMPLETE_QUEST, CMSG_QUESTGIVER_HELLO, CMSG_QUESTGIVER_QUERY_QUEST,
    CMSG_QUESTGIVER_REQUEST_REWARD, CMSG_QUESTGIVER_STATUS_QUERY, CMSG_QUESTLOG_REMOVE_QUEST,
    SMSG_QUESTGIVER_OFFER_REWARD, SMSG_QUESTGIVER_QUEST_COMPLETE, SMSG_QUESTGIVER_QUEST_DETAILS,
    SMSG_QUESTGIVER_QUEST_FAILED, SMSG_QUESTGIVER_QUEST_INVALID, SMSG_QUESTGIVER_QUEST_LIST,
    SMSG_QUESTGIVER_REQUEST_ITEMS, SMSG_QUESTGIVER_STATUS,
};
use crate::packet::{empty_client_packet, guid_client_packet, wire_enum, ClientPacket, ServerPacket};
use crate::wire::{Decoded, WireReader, WireWriter};
use crate::{Guid, ProtocolError};

/// Quest log capacity; slots run from 0 to this minus one.
pub const QUEST_LOG_SLOTS: u8 = 25;

wire_enum! {
    /// The marker over a quest giver's head.
    pub enum QuestGiverStatus: u8 {
        Hidden = 0,
        Unavailable = 1,
        LowLevelAvailable = 2,
        LowLevelRewardRepeatable = 3,
        LowLevelAvailableRepeatable = 4,
        Incomplete = 5,
        RewardRepeatable = 6,
        AvailableRepeatable = 7,
        Available = 8,
        RewardNoDot = 9,
        Reward = 10,
    }
}

// ---------------------------------------------------------------------------
// Shared pieces
// ---------------------------------------------------------------------------

/// A quest offered in a list or gossip menu.
///
/// ```text
/// u32 id, u32 icon, i32 level, u32 flags, u8 repeatable, cstring title
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestSummary {
    pub quest_id: u32,
    pub icon: u32,
    pub level: i32,
    pub flags: u32,
    pub repeatable: bool,
    pub title: String,
}

impl QuestSummary {
    pub(crate) const MIN_LEN: usize = 18;

    pub(crate) fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            quest_id: r.u32(),
            icon: r.u32(),
            level: r.i32(),
            flags: r.u32(),
            repeatable: r.bool(),
            title: r.cstring(),
        }
    }

    pub(crate) fn write(&self, w: &mut WireWriter) {
        w.u32(self.quest_id)
            .u32(self.icon)
            .i32(self.level)
            .u32(self.flags)
            .bool(self.repeatable)
            .cstring(&self.title);
    }
}

/// An item reward or requirement: `u32 item, u32 count, u32 display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestItem {
    pub item_id: u32,
    pub count: u32,
    pub display_id: u32,
}

impl QuestItem {
    const WIRE_LEN: usize = 12;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            item_id: r.u32(),
            count: r.u32(),
            display_id: r.u32(),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.u32(self.item_id).u32(self.count).u32(self.display_id);
    }
}

fn read_items(r: &mut WireReader<'_>) -> Vec<QuestItem> {
    let count = r.u32() as usize;
    r.list(count, QuestItem::WIRE_LEN, QuestItem::read)
}

fn write_items(w: &mut WireWriter, items: &[QuestItem]) {
    w.u32(items.len() as u32);
    for item in items {
        item.write(w);
    }
}

/// Rewards shown on details and offer-reward dialogs.
///
/// ```text
/// u32 choiceCount, choices, u32 fixedCount, fixed, u32 money, u32 xp
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestRewards {
    pub choices: Vec<QuestItem>,
    pub fixed: Vec<QuestItem>,
    pub money: u32,
    pub xp: u32,
}

impl QuestRewards {
    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            choices: read_items(r),
            fixed: read_items(r),
            money: r.u32(),
            xp: r.u32(),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        write_items(w, &self.choices);
        write_items(w, &self.fixed);
        w.u32(self.money).u32(self.xp);
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Marker for one quest giver: `u64 npc, u8 status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestGiverStatusUpdate {
    pub npc: Guid,
    pub status: QuestGiverStatus,
}

impl ServerPacket for QuestGiverStatusUpdate {
    const OPCODE: Opcode = SMSG_QUESTGIVER_STATUS;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            npc: r.guid(),
            status: QuestGiverStatus::from_raw(r.u8()),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.guid(self.npc).u8(self.status.raw());
    }
}

/// A quest giver's list of quests.
///
/// ```text
/// u64 npc, cstring greeting, u32 emoteDelay, u32 emote, u8 count,
/// count × quest summary
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestList {
    pub npc: Guid,
    pub greeting: String,
    pub emote_delay: u32,
    pub emote: u32,
    pub quests: Vec<QuestSummary>,
}

impl ServerPacket for QuestList {
    const OPCODE: Opcode = SMSG_QUESTGIVER_QUEST_LIST;

    fn read(r: &mut WireReader<'_>) -> Self {
        let npc = r.guid();
        let greeting = r.cstring();
        let emote_delay = r.u32();
        let emote = r.u32();
        let count = usize::from(r.u8());
        let quests = r.list(count, QuestSummary::MIN_LEN, QuestSummary::read);
        Self {
            npc,
            greeting,
            emote_delay,
            emote,
            quests,
        }
    }

    fn write(&self, w: &mut WireWriter) {
        let count = u8::try_from(self.quests.len()).unwrap_or(u8::MAX);
        w.guid(self.npc)
            .cstring(&self.greeting)
            .u32(self.emote_delay)
            .u32(self.emote)
            .u8(count);
        for quest in self.quests.iter().take(usize::from(count)) {
            quest.write(w);
        }
    }
}

/// A quest's description, offered for acceptance.
///
/// ```text
/// u64 npc, u32 quest, cstring title, cstring details, cstring objectives,
/// u8 autoAccept, rewards
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestDetails {
    pub npc: Guid,
    pub quest_id: u32,
    pub title: String,
    pub details: String,
    pub objectives: String,
    pub auto_accept: bool,
    pub rewards: QuestRewards,
}

impl ServerPacket for QuestDetails {
    const OPCODE: Opcode = SMSG_QUESTGIVER_QUEST_DETAILS;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            npc: r.guid(),
            quest_id: r.u32(),
            title: r.cstring(),
            details: r.cstring(),
            objectives: r.cstring(),
            auto_accept: r.bool(),
            rewards: QuestRewards::read(r),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.guid(self.npc)
            .u32(self.quest_id)
            .cstring(&self.title)
            .cstring(&self.details)
            .cstring(&self.objectives)
            .bool(self.auto_accept);
        self.rewards.write(w);
    }
}

/// What a quest still needs before it can be handed in.
///
/// ```text
/// u64 npc, u32 quest, cstring title, cstring text, u32 emoteDelay,
/// u32 emote, u8 closeOnCancel, u32 money, u32 itemCount, items,
/// u32 completable
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestRequestItems {
    pub npc: Guid,
    pub quest_id: u32,
    pub title: String,
    pub text: String,
    pub emote_delay: u32,
    pub emote: u32,
    pub close_on_cancel: bool,
    pub money: u32,
    pub items: Vec<QuestItem>,
    pub completable: bool,
}

impl ServerPacket for QuestRequestItems {
    const OPCODE: Opcode = SMSG_QUESTGIVER_REQUEST_ITEMS;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            npc: r.guid(),
            quest_id: r.u32(),
            title: r.cstring(),
            text: r.cstring(),
            emote_delay: r.u32(),
            emote: r.u32(),
            close_on_cancel: r.bool(),
            money: r.u32(),
            items: read_items(r),
            completable: r.u32() != 0,
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.guid(self.npc)
            .u32(self.quest_id)
            .cstring(&self.title)
            .cstring(&self.text)
            .u32(self.emote_delay)
            .u32(self.emote)
            .bool(self.close_on_cancel)
            .u32(self.money);
        write_items(w, &self.items);
        w.u32(if self.completable { 3 } else { 0 });
    }
}

/// The reward choice shown when handing a quest in.
///
/// ```text
/// u64 npc, u32 quest, cstring title, cstring text, u8 autoFinish,
/// u32 emoteCount, emoteCount × (u32 delay, u32 emote), rewards
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestOfferReward {
    pub npc: Guid,
    pub quest_id: u32,
    pub title: String,
    pub text: String,
    pub auto_finish: bool,
    pub emotes: Vec<(u32, u32)>,
    pub rewards: QuestRewards,
}

impl ServerPacket for QuestOfferReward {
    const OPCODE: Opcode = SMSG_QUESTGIVER_OFFER_REWARD;

    fn read(r: &mut WireReader<'_>) -> Self {
        let npc = r.guid();
        let quest_id = r.u32();
        let title = r.cstring();
        let text = r.cstring();
        let auto_finish = r.bool();
        let emote_count = r.u32() as usize;
        let emotes = r.list(emote_count, 8, |r| (r.u32(), r.u32()));
        Self {
            npc,
            quest_id,
            title,
            text,
            auto_finish,
            emotes,
            rewards: QuestRewards::read(r),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.guid(self.npc)
            .u32(self.quest_id)
            .cstring(&self.title)
            .cstring(&self.text)
            .bool(self.auto_finish)
            .u32(self.emotes.len() as u32);
        for (delay, emote) in &self.emotes {
            w.u32(*delay).u32(*emote);
        }
        self.rewards.write(w);
    }
}

/// A quest was handed in.
///
/// ```text
/// u32 quest, u32 xp, u32 money, u32 honor, u32 talents, u32 arena,
/// u32 itemCount, itemCount × (u32 item, u32 count)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestComplete {
    pub quest_id: u32,
    pub xp: u32,
    pub money: u32,
    pub honor: u32,
    pub talents: u32,
    pub arena: u32,
    pub items: Vec<(u32, u32)>,
}

impl ServerPacket for QuestComplete {
    const OPCODE: Opcode = SMSG_QUESTGIVER_QUEST_COMPLETE;

    fn read(r: &mut WireReader<'_>) -> Self {
        let quest_id = r.u32();
        let xp = r.u32();
        let money = r.u32();
        let honor = r.u32();
        let talents = r.u32();
        let arena = r.u32();
        let count = r.u32() as usize;
        let items = r.list(count, 8, |r| (r.u32(), r.u32()));
        Self {
            quest_id,
            xp,
            money,
            honor,
            talents,
            arena,
            items,
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.u32(self.quest_id)
            .u32(self.xp)
            .u32(self.money)
            .u32(self.honor)
            .u32(self.talents)
            .u32(self.arena)
            .u32(self.items.len() as u32);
        for (item, count) in &self.items {
            w.u32(*item).u32(*count);
        }
    }
}

/// The server refused a quest action: `u32 reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestInvalid {
    pub reason: u32,
}

impl ServerPacket for QuestInvalid {
    const OPCODE: Opcode = SMSG_QUESTGIVER_QUEST_INVALID;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self { reason: r.u32() }
    }

    fn write(&self, w: &mut WireWriter) {
        w.u32(self.reason);
    }
}

/// A quest failed: `u32 quest, u32 reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestFailed {
    pub quest_id: u32,
    pub reason: u32,
}

impl ServerPacket for QuestFailed {
    const OPCODE: Opcode = SMSG_QUESTGIVER_QUEST_FAILED;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            quest_id: r.u32(),
            reason: r.u32(),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.u32(self.quest_id).u32(self.reason);
    }
}

/// Every quest-category server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestMessage {
    GiverStatus(QuestGiverStatusUpdate),
    List(QuestList),
    Details(QuestDetails),
    RequestItems(QuestRequestItems),
    OfferReward(QuestOfferReward),
    Complete(QuestComplete),
    Invalid(QuestInvalid),
    Failed(QuestFailed),
}

impl QuestMessage {
    pub const OPCODES: &'static [Opcode] = &[
        SMSG_QUESTGIVER_STATUS,
        SMSG_QUESTGIVER_QUEST_LIST,
        SMSG_QUESTGIVER_QUEST_DETAILS,
        SMSG_QUESTGIVER_REQUEST_ITEMS,
        SMSG_QUESTGIVER_OFFER_REWARD,
        SMSG_QUESTGIVER_QUEST_COMPLETE,
        SMSG_QUESTGIVER_QUEST_INVALID,
        SMSG_QUESTGIVER_QUEST_FAILED,
    ];

    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Option<Decoded<Self>> {
        Some(match opcode {
            SMSG_QUESTGIVER_STATUS => QuestGiverStatusUpdate::decode(bytes).map(Self::GiverStatus),
            SMSG_QUESTGIVER_QUEST_LIST => QuestList::decode(bytes).map(Self::List),
            SMSG_QUESTGIVER_QUEST_DETAILS => QuestDetails::decode(bytes).map(Self::Details),
            SMSG_QUESTGIVER_REQUEST_ITEMS => {
                QuestRequestItems::decode(bytes).map(Self::RequestItems)
            }
            SMSG_QUESTGIVER_OFFER_REWARD => QuestOfferReward::decode(bytes).map(Self::OfferReward),
            SMSG_QUESTGIVER_QUEST_COMPLETE => QuestComplete::decode(bytes).map(Self::Complete),
            SMSG_QUESTGIVER_QUEST_INVALID => QuestInvalid::decode(bytes).map(Self::Invalid),
            SMSG_QUESTGIVER_QUEST_FAILED => QuestFailed::decode(bytes).map(Self::Failed),
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

guid_client_packet! {
    /// Asks for a quest giver's marker.
    QueryQuestGiverStatus => CMSG_QUESTGIVER_STATUS_QUERY
}

guid_client_packet! {
    /// Opens a quest giver's dialog.
    QuestGiverHello => CMSG_QUESTGIVER_HELLO
}

empty_client_packet! {
    /// Closes the quest dialog.
    CancelQuestDialog => CMSG_QUESTGIVER_CANCEL
}

/// Client packets addressed to a quest on a quest giver.
macro_rules! npc_quest_packet {
    ($(#[$meta:meta])* $name:ident => $opcode:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            pub npc: Guid,
            pub quest_id: u32,
        }

        impl ClientPacket for $name {
            const OPCODE: Opcode = $opcode;

            fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
                w.guid(self.npc).u32(self.quest_id);
                Ok(())
            }
        }
    };
}

npc_quest_packet! {
    /// Opens a quest's details: `u64 npc, u32 quest`.
    QueryQuest => CMSG_QUESTGIVER_QUERY_QUEST
}

npc_quest_packet! {
    /// Accepts a quest: `u64 npc, u32 quest`.
    AcceptQuest => CMSG_QUESTGIVER_ACCEPT_QUEST
}

npc_quest_packet! {
    /// Starts handing a quest in: `u64 npc, u32 quest`.
    CompleteQuest => CMSG_QUESTGIVER_COMPLETE_QUEST
}

npc_quest_packet! {
    /// Asks for the reward dialog: `u64 npc, u32 quest`.
    RequestQuestReward => CMSG_QUESTGIVER_REQUEST_REWARD
}

/// Picks a reward: `u64 npc, u32 quest, u32 choice`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChooseQuestReward {
    pub npc: Guid,
    pub quest_id: u32,
    pub choice: u32,
}

impl ClientPacket for ChooseQuestReward {
    const OPCODE: Opcode = CMSG_QUESTGIVER_CHOOSE_REWARD;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.guid(self.npc).u32(self.quest_id).u32(self.choice);
        Ok(())
    }
}

/// Abandons the quest in a log slot: `u8 slot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveQuestFromLog {
    pub slot: u8,
}

impl ClientPacket for RemoveQuestFromLog {
    const OPCODE: Opcode = CMSG_QUESTLOG_REMOVE_QUEST;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        if self.slot >= QUEST_LOG_SLOTS {
            return Err(ProtocolError::InvalidArgument(format!(
                "quest log slot {} out of range",
                self.slot
            )));
        }
        w.u8(self.slot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DecodeQuality;

    #[test]
    fn test_quest_details_with_rewards() {
        let details = QuestDetails {
            npc: Guid(0xF130_0000_0000_0001),
            quest_id: 7,
            title: "Kobold Camp Cleanup".into(),
            details: "Kill kobolds.".into(),
            objectives: "Kill 10 Kobold Vermin.".into(),
            auto_accept: false,
            rewards: QuestRewards {
                choices: vec![QuestItem {
                    item_id: 1,
                    count: 1,
                    display_id: 2,
                }],
                fixed: Vec::new(),
                money: 35,
                xp: 170,
            },
        };
        let decoded = QuestDetails::decode(&details.encode());
        assert!(decoded.is_complete());
        assert_eq!(decoded.value, details);
    }

    #[test]
    fn test_request_items_completable_flag() {
        let mut w = WireWriter::new();
        w.u64(1).u32(2).cstring("t").cstring("x").u32(0).u32(0).u8(0).u32(0);
        w.u32(0).u32(3);
        let decoded = QuestRequestItems::decode(&w.finish());
        assert!(decoded.is_complete());
        assert!(decoded.value.completable);
    }

    #[test]
    fn test_quest_complete_layout() {
        let mut w = WireWriter::new();
        w.u32(7).u32(170).u32(35).u32(0).u32(0).u32(0).u32(1).u32(2589).u32(1);
        let decoded = QuestComplete::decode(&w.finish());
        assert!(decoded.is_complete());
        assert_eq!(decoded.value.quest_id, 7);
        assert_eq!(decoded.value.items, vec![(2589, 1)]);
    }

    #[test]
    fn test_quest_list_claims_more_than_it_carries() {
        let mut w = WireWriter::new();
        w.u64(1).cstring("Hello").u32(0).u32(0).u8(5);
        let decoded = QuestList::decode(&w.finish());
        assert_eq!(decoded.quality, DecodeQuality::Truncated);
        assert!(decoded.value.quests.is_empty());
        assert_eq!(decoded.value.greeting, "Hello");
    }

    #[test]
    fn test_accept_quest_layout() {
        let bytes = AcceptQuest {
            npc: Guid(1),
            quest_id: 0x0102,
        }
        .encode()
        .unwrap();
        assert_eq!(bytes.as_ref(), &[1, 0, 0, 0, 0, 0, 0, 0, 0x02, 0x01, 0, 0]);
    }

    #[test]
    fn test_remove_from_log_rejects_bad_slot() {
        assert!(RemoveQuestFromLog { slot: 25 }.encode().is_err());
        assert_eq!(RemoveQuestFromLog { slot: 3 }.encode().unwrap().as_ref(), &[3]);
    }
}
