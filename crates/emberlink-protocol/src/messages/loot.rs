//! Loot window and group roll messages.

use emberlink_transport::Opcode;

use crate::opcodes::{
    CMSG_AUTOSTORE_LOOT_ITEM, CMSG_LOOT, CMSG_LOOT_MASTER_GIVE, CMSG_LOOT_MONEY,
    CMSG_LOOT_RELEASE, CMSG_LOOT_ROLL, SMSG_LOOT_ALL_PASSED, SMSG_LOOT_CLEAR_MONEY,
    SMSG_LOOT_MASTER_LIST, SMSG_LOOT_MONEY_NOTIFY, SMSG_LOOT_RELEASE_RESPONSE,
    SMSG_LOOT_REMOVED, SMSG_LOOT_RESPONSE, SMSG_LOOT_ROLL, SMSG_LOOT_ROLL_WON,
    SMSG_LOOT_START_ROLL,
};
use crate::packet::{empty_client_packet, guid_client_packet, wire_enum, ClientPacket, ServerPacket};
use crate::wire::{Decoded, WireReader, WireWriter};
use crate::{Guid, ProtocolError};

wire_enum! {
    /// Why a corpse or object was opened. `Failed` marks a refused open.
    pub enum LootType: u8 {
        Failed = 0,
        Corpse = 1,
        Pickpocketing = 2,
        Fishing = 3,
        Disenchanting = 4,
        Skinning = 6,
        Prospecting = 7,
        Milling = 8,
        Insignia = 22,
    }
}

wire_enum! {
    /// Who may take a slot.
    pub enum LootSlotType: u8 {
        AllowLoot = 0,
        RollOngoing = 1,
        Master = 2,
        Locked = 3,
        Owner = 4,
    }
}

wire_enum! {
    /// A vote on a group roll.
    pub enum RollVote: u8 {
        Pass = 0,
        Need = 1,
        Greed = 2,
        Disenchant = 3,
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// One slot in an open loot window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootItem {
    pub slot: u8,
    pub item_id: u32,
    pub count: u32,
    pub display_id: u32,
    pub random_suffix: u32,
    pub random_property: u32,
    pub slot_type: LootSlotType,
}

impl LootItem {
    const WIRE_LEN: usize = 22;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            slot: r.u8(),
            item_id: r.u32(),
            count: r.u32(),
            display_id: r.u32(),
            random_suffix: r.u32(),
            random_property: r.u32(),
            slot_type: LootSlotType::from_raw(r.u8()),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.u8(self.slot)
            .u32(self.item_id)
            .u32(self.count)
            .u32(self.display_id)
            .u32(self.random_suffix)
            .u32(self.random_property)
            .u8(self.slot_type.raw());
    }
}

/// Contents of a loot window, or the reason it didn't open.
///
/// ```text
/// u64 source, u8 lootType,
///   lootType == 0: u8 error
///   otherwise:     u32 gold, u8 count, count × item
/// item: u8 slot, u32 item, u32 count, u32 display, u32 randomSuffix,
///       u32 randomProperty, u8 slotType
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootResponse {
    pub source: Guid,
    pub loot_type: LootType,
    pub gold: u32,
    pub items: Vec<LootItem>,
    pub error: Option<u8>,
}

impl LootResponse {
    pub fn is_failure(&self) -> bool {
        self.loot_type == LootType::Failed
    }
}

impl ServerPacket for LootResponse {
    const OPCODE: Opcode = SMSG_LOOT_RESPONSE;

    fn read(r: &mut WireReader<'_>) -> Self {
        let source = r.guid();
        let loot_type = LootType::from_raw(r.u8());
        if loot_type == LootType::Failed {
            return Self {
                source,
                loot_type,
                gold: 0,
                items: Vec::new(),
                error: Some(r.u8()),
            };
        }
        let gold = r.u32();
        let count = usize::from(r.u8());
        let items = r.list(count, LootItem::WIRE_LEN, LootItem::read);
        Self {
            source,
            loot_type,
            gold,
            items,
            error: None,
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.guid(self.source).u8(self.loot_type.raw());
        if self.is_failure() {
            w.u8(self.error.unwrap_or_default());
            return;
        }
        let count = u8::try_from(self.items.len()).unwrap_or(u8::MAX);
        w.u32(self.gold).u8(count);
        for item in self.items.iter().take(usize::from(count)) {
            item.write(w);
        }
    }
}

/// The server closed the loot window: `u64 source, u8 unk`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootReleaseResponse {
    pub source: Guid,
}

impl ServerPacket for LootReleaseResponse {
    const OPCODE: Opcode = SMSG_LOOT_RELEASE_RESPONSE;

    fn read(r: &mut WireReader<'_>) -> Self {
        let source = r.guid();
        r.skip(1);
        Self { source }
    }

    fn write(&self, w: &mut WireWriter) {
        w.guid(self.source).u8(1);
    }
}

/// A slot was emptied: `u8 slot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootRemoved {
    pub slot: u8,
}

impl ServerPacket for LootRemoved {
    const OPCODE: Opcode = SMSG_LOOT_REMOVED;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self { slot: r.u8() }
    }

    fn write(&self, w: &mut WireWriter) {
        w.u8(self.slot);
    }
}

/// Money received from loot: `u32 amount, u8 soleLooter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootMoneyNotify {
    pub amount: u32,
    pub sole_looter: bool,
}

impl ServerPacket for LootMoneyNotify {
    const OPCODE: Opcode = SMSG_LOOT_MONEY_NOTIFY;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            amount: r.u32(),
            sole_looter: r.bool(),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.u32(self.amount).bool(self.sole_looter);
    }
}

/// The window's money was taken. Empty payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LootClearMoney;

impl ServerPacket for LootClearMoney {
    const OPCODE: Opcode = SMSG_LOOT_CLEAR_MONEY;

    fn read(_r: &mut WireReader<'_>) -> Self {
        Self
    }

    fn write(&self, _w: &mut WireWriter) {}
}

/// An item the group rolls for.
///
/// ```text
/// u64 source, u32 map, u32 slot, u32 item, u32 randomSuffix,
/// u32 randomProperty, u32 count, u32 countdownMs, u8 voteMask
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootStartRoll {
    pub source: Guid,
    pub map_id: u32,
    pub slot: u32,
    pub item_id: u32,
    pub random_suffix: u32,
    pub random_property: u32,
    pub count: u32,
    pub countdown_ms: u32,
    pub vote_mask: u8,
}

impl ServerPacket for LootStartRoll {
    const OPCODE: Opcode = SMSG_LOOT_START_ROLL;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            source: r.guid(),
            map_id: r.u32(),
            slot: r.u32(),
            item_id: r.u32(),
            random_suffix: r.u32(),
            random_property: r.u32(),
            count: r.u32(),
            countdown_ms: r.u32(),
            vote_mask: r.u8(),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.guid(self.source)
            .u32(self.map_id)
            .u32(self.slot)
            .u32(self.item_id)
            .u32(self.random_suffix)
            .u32(self.random_property)
            .u32(self.count)
            .u32(self.countdown_ms)
            .u8(self.vote_mask);
    }
}

/// One player's roll result.
///
/// ```text
/// u64 source, u32 slot, u64 player, u32 item, u32 randomSuffix,
/// u32 randomProperty, u8 rollNumber, u8 vote, u8 autoPass
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootRoll {
    pub source: Guid,
    pub slot: u32,
    pub player: Guid,
    pub item_id: u32,
    pub random_suffix: u32,
    pub random_property: u32,
    pub roll_number: u8,
    pub vote: RollVote,
    pub auto_pass: bool,
}

impl ServerPacket for LootRoll {
    const OPCODE: Opcode = SMSG_LOOT_ROLL;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            source: r.guid(),
            slot: r.u32(),
            player: r.guid(),
            item_id: r.u32(),
            random_suffix: r.u32(),
            random_property: r.u32(),
            roll_number: r.u8(),
            vote: RollVote::from_raw(r.u8()),
            auto_pass: r.bool(),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.guid(self.source)
            .u32(self.slot)
            .guid(self.player)
            .u32(self.item_id)
            .u32(self.random_suffix)
            .u32(self.random_property)
            .u8(self.roll_number)
            .u8(self.vote.raw())
            .bool(self.auto_pass);
    }
}

/// A roll finished with a winner.
///
/// ```text
/// u64 source, u32 slot, u32 item, u32 randomSuffix, u32 randomProperty,
/// u64 winner, u8 rollNumber, u8 vote
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootRollWon {
    pub source: Guid,
    pub slot: u32,
    pub item_id: u32,
    pub random_suffix: u32,
    pub random_property: u32,
    pub winner: Guid,
    pub roll_number: u8,
    pub vote: RollVote,
}

impl ServerPacket for LootRollWon {
    const OPCODE: Opcode = SMSG_LOOT_ROLL_WON;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            source: r.guid(),
            slot: r.u32(),
            item_id: r.u32(),
            random_suffix: r.u32(),
            random_property: r.u32(),
            winner: r.guid(),
            roll_number: r.u8(),
            vote: RollVote::from_raw(r.u8()),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.guid(self.source)
            .u32(self.slot)
            .u32(self.item_id)
            .u32(self.random_suffix)
            .u32(self.random_property)
            .guid(self.winner)
            .u8(self.roll_number)
            .u8(self.vote.raw());
    }
}

/// Everyone passed on a roll.
///
/// ```text
/// u64 source, u32 slot, u32 item, u32 randomSuffix, u32 randomProperty
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootAllPassed {
    pub source: Guid,
    pub slot: u32,
    pub item_id: u32,
    pub random_suffix: u32,
    pub random_property: u32,
}

impl ServerPacket for LootAllPassed {
    const OPCODE: Opcode = SMSG_LOOT_ALL_PASSED;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            source: r.guid(),
            slot: r.u32(),
            item_id: r.u32(),
            random_suffix: r.u32(),
            random_property: r.u32(),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.guid(self.source)
            .u32(self.slot)
            .u32(self.item_id)
            .u32(self.random_suffix)
            .u32(self.random_property);
    }
}

/// Players the master looter may hand items to: `u8 count, count × u64`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootMasterList {
    pub candidates: Vec<Guid>,
}

impl ServerPacket for LootMasterList {
    const OPCODE: Opcode = SMSG_LOOT_MASTER_LIST;

    fn read(r: &mut WireReader<'_>) -> Self {
        let count = usize::from(r.u8());
        Self {
            candidates: r.list(count, 8, WireReader::guid),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        let count = u8::try_from(self.candidates.len()).unwrap_or(u8::MAX);
        w.u8(count);
        for guid in self.candidates.iter().take(usize::from(count)) {
            w.guid(*guid);
        }
    }
}

/// Every loot-category server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LootMessage {
    Response(LootResponse),
    ReleaseResponse(LootReleaseResponse),
    Removed(LootRemoved),
    MoneyNotify(LootMoneyNotify),
    ClearMoney,
    StartRoll(LootStartRoll),
    Roll(LootRoll),
    RollWon(LootRollWon),
    AllPassed(LootAllPassed),
    MasterList(LootMasterList),
}

impl LootMessage {
    pub const OPCODES: &'static [Opcode] = &[
        SMSG_LOOT_RESPONSE,
        SMSG_LOOT_RELEASE_RESPONSE,
        SMSG_LOOT_REMOVED,
        SMSG_LOOT_MONEY_NOTIFY,
        SMSG_LOOT_CLEAR_MONEY,
        SMSG_LOOT_START_ROLL,
        SMSG_LOOT_ROLL,
        SMSG_LOOT_ROLL_WON,
        SMSG_LOOT_ALL_PASSED,
        SMSG_LOOT_MASTER_LIST,
    ];

    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Option<Decoded<Self>> {
        Some(match opcode {
            SMSG_LOOT_RESPONSE => LootResponse::decode(bytes).map(Self::Response),
            SMSG_LOOT_RELEASE_RESPONSE => {
                LootReleaseResponse::decode(bytes).map(Self::ReleaseResponse)
            }
            SMSG_LOOT_REMOVED => LootRemoved::decode(bytes).map(Self::Removed),
            SMSG_LOOT_MONEY_NOTIFY => LootMoneyNotify::decode(bytes).map(Self::MoneyNotify),
            SMSG_LOOT_CLEAR_MONEY => LootClearMoney::decode(bytes).map(|_| Self::ClearMoney),
            SMSG_LOOT_START_ROLL => LootStartRoll::decode(bytes).map(Self::StartRoll),
            SMSG_LOOT_ROLL => LootRoll::decode(bytes).map(Self::Roll),
            SMSG_LOOT_ROLL_WON => LootRollWon::decode(bytes).map(Self::RollWon),
            SMSG_LOOT_ALL_PASSED => LootAllPassed::decode(bytes).map(Self::AllPassed),
            SMSG_LOOT_MASTER_LIST => LootMasterList::decode(bytes).map(Self::MasterList),
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

guid_client_packet! {
    /// Opens the loot window of a corpse or object.
    OpenLoot => CMSG_LOOT
}

guid_client_packet! {
    /// Closes the loot window of `source`.
    ReleaseLoot => CMSG_LOOT_RELEASE
}

empty_client_packet! {
    /// Takes the money in the open window.
    TakeLootMoney => CMSG_LOOT_MONEY
}

/// Moves a slot's item into the bags: `u8 slot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TakeLootItem {
    pub slot: u8,
}

impl ClientPacket for TakeLootItem {
    const OPCODE: Opcode = CMSG_AUTOSTORE_LOOT_ITEM;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.u8(self.slot);
        Ok(())
    }
}

/// Votes on a group roll: `u64 source, u32 slot, u8 vote`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollOnLoot {
    pub source: Guid,
    pub slot: u32,
    pub vote: RollVote,
}

impl ClientPacket for RollOnLoot {
    const OPCODE: Opcode = CMSG_LOOT_ROLL;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        if let RollVote::Other(raw) = self.vote {
            return Err(ProtocolError::InvalidArgument(format!("roll vote {raw}")));
        }
        w.guid(self.source).u32(self.slot).u8(self.vote.raw());
        Ok(())
    }
}

/// Hands a slot to a group member: `u64 source, u8 slot, u64 target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterGiveLoot {
    pub source: Guid,
    pub slot: u8,
    pub target: Guid,
}

impl ClientPacket for MasterGiveLoot {
    const OPCODE: Opcode = CMSG_LOOT_MASTER_GIVE;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        if self.target.is_empty() {
            return Err(ProtocolError::InvalidArgument("empty loot recipient".into()));
        }
        w.guid(self.source).u8(self.slot).guid(self.target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DecodeQuality;

    fn item(slot: u8, slot_type: LootSlotType) -> LootItem {
        LootItem {
            slot,
            item_id: 2589,
            count: 2,
            display_id: 7418,
            random_suffix: 0,
            random_property: 0,
            slot_type,
        }
    }

    #[test]
    fn test_loot_response_two_slots() {
        let response = LootResponse {
            source: Guid(0xF130_0000_0000_0010),
            loot_type: LootType::Corpse,
            gold: 125,
            items: vec![item(0, LootSlotType::AllowLoot), item(1, LootSlotType::Owner)],
            error: None,
        };
        let decoded = LootResponse::decode(&response.encode());
        assert!(decoded.is_complete());
        assert_eq!(decoded.value, response);
    }

    #[test]
    fn test_loot_response_failure_reads_error() {
        let mut w = WireWriter::new();
        w.u64(1).u8(0).u8(6);
        let decoded = LootResponse::decode(&w.finish());
        assert!(decoded.is_complete());
        assert!(decoded.value.is_failure());
        assert_eq!(decoded.value.error, Some(6));
    }

    #[test]
    fn test_loot_response_count_larger_than_payload() {
        let mut w = WireWriter::new();
        w.u64(1).u8(1).u32(0).u8(200);
        item(0, LootSlotType::AllowLoot).write(&mut w);
        w.u8(1).u32(99);
        let decoded = LootResponse::decode(&w.finish());
        assert_eq!(decoded.quality, DecodeQuality::Truncated);
        assert_eq!(decoded.value.items.len(), 1);
    }

    #[test]
    fn test_master_list_layout() {
        let mut w = WireWriter::new();
        w.u8(2).u64(10).u64(11);
        let decoded = LootMasterList::decode(&w.finish());
        assert_eq!(decoded.value.candidates, vec![Guid(10), Guid(11)]);
    }

    #[test]
    fn test_take_loot_item_layout() {
        assert_eq!(TakeLootItem { slot: 3 }.encode().unwrap().as_ref(), &[3]);
    }

    #[test]
    fn test_open_loot_layout() {
        let bytes = OpenLoot(Guid(0x0102)).encode().unwrap();
        assert_eq!(bytes.as_ref(), &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_take_loot_money_is_empty() {
        assert!(TakeLootMoney.encode().unwrap().is_empty());
    }

    #[test]
    fn test_roll_rejects_unknown_vote() {
        let packet = RollOnLoot {
            source: Guid(1),
            slot: 0,
            vote: RollVote::Other(9),
        };
        assert!(matches!(packet.encode(), Err(ProtocolError::InvalidArgument(_))));
    }

    #[test]
    fn test_roll_layout() {
        let bytes = RollOnLoot {
            source: Guid(1),
            slot: 2,
            vote: RollVote::Greed,
        }
        .encode()
        .unwrap();
        assert_eq!(bytes.as_ref(), &[1, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 2]);
    }
}
