//! Group membership and loot rules.

use emberlink_transport::Opcode;

use crate::opcodes::{
    CMSG_GROUP_ACCEPT, CMSG_GROUP_DECLINE, CMSG_GROUP_DISBAND, CMSG_GROUP_INVITE,
    CMSG_GROUP_SET_LEADER, CMSG_GROUP_UNINVITE_GUID, CMSG_LOOT_METHOD, SMSG_GROUP_DECLINE,
    SMSG_GROUP_DESTROYED, SMSG_GROUP_INVITE, SMSG_GROUP_LIST, SMSG_GROUP_SET_LEADER,
    SMSG_GROUP_UNINVITE, SMSG_PARTY_COMMAND_RESULT,
};
use crate::packet::{empty_client_packet, guid_client_packet, wire_enum, ClientPacket, ServerPacket};
use crate::wire::{check_cstring, Decoded, WireReader, WireWriter};
use crate::{Guid, ProtocolError};

/// Longest character name.
pub const MAX_PLAYER_NAME: usize = 48;
/// Group type bit marking a dungeon-finder group.
pub const GROUP_TYPE_LFG: u8 = 0x08;

wire_enum! {
    /// How a group distributes loot.
    pub enum LootMethod: u8 {
        FreeForAll = 0,
        RoundRobin = 1,
        MasterLoot = 2,
        GroupLoot = 3,
        NeedBeforeGreed = 4,
    }
}

wire_enum! {
    /// Which group command a result answers.
    pub enum PartyOperation: u32 {
        Invite = 0,
        Uninvite = 1,
        Leave = 2,
        Swap = 4,
    }
}

wire_enum! {
    /// Outcome of a group command.
    pub enum PartyResult: u32 {
        Ok = 0,
        BadPlayerName = 1,
        TargetNotInGroup = 2,
        TargetNotInInstance = 3,
        GroupFull = 4,
        AlreadyInGroup = 5,
        NotInGroup = 6,
        NotLeader = 7,
        WrongFaction = 8,
        IgnoringYou = 9,
        LfgPending = 12,
        InviteRestricted = 13,
    }
}

/// A group's loot settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootRules {
    pub method: LootMethod,
    pub master_looter: Guid,
    /// Minimum item quality that triggers a roll.
    pub threshold: u8,
    pub dungeon_difficulty: u8,
    pub raid_difficulty: u8,
    pub dynamic_difficulty: u8,
}

impl Default for LootRules {
    fn default() -> Self {
        Self {
            method: LootMethod::FreeForAll,
            master_looter: Guid::EMPTY,
            threshold: 2,
            dungeon_difficulty: 0,
            raid_difficulty: 0,
            dynamic_difficulty: 0,
        }
    }
}

impl LootRules {
    /// Whether `player` hands out master-loot slots.
    pub fn is_master_looter(&self, player: Guid) -> bool {
        self.method == LootMethod::MasterLoot && !player.is_empty() && self.master_looter == player
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Someone invited the local player: `u8 canAccept, cstring inviter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInvite {
    pub can_accept: bool,
    pub inviter: String,
}

impl ServerPacket for GroupInvite {
    const OPCODE: Opcode = SMSG_GROUP_INVITE;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            can_accept: r.bool(),
            inviter: r.cstring(),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.bool(self.can_accept).cstring(&self.inviter);
    }
}

/// One member in a group list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub name: String,
    pub guid: Guid,
    pub online: bool,
    pub subgroup: u8,
    pub flags: u8,
    pub roles: u8,
}

impl GroupMember {
    const MIN_LEN: usize = 13;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            name: r.cstring(),
            guid: r.guid(),
            online: r.bool(),
            subgroup: r.u8(),
            flags: r.u8(),
            roles: r.u8(),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.cstring(&self.name)
            .guid(self.guid)
            .bool(self.online)
            .u8(self.subgroup)
            .u8(self.flags)
            .u8(self.roles);
    }
}

/// The full group roster. An empty roster means the local player has no
/// group.
///
/// ```text
/// u8 type, u8 subgroup, u8 flags, u8 roles,
/// [u8 lfgState, u32 dungeon when type has the LFG bit],
/// u64 group, u32 counter, u32 memberCount, memberCount × member, u64 leader,
/// [u8 lootMethod, u64 looter, u8 threshold, u8 dungeonDifficulty,
///  u8 raidDifficulty, u8 dynamic when memberCount > 0]
/// member: cstring name, u64 guid, u8 online, u8 subgroup, u8 flags, u8 roles
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupList {
    pub group_type: u8,
    pub subgroup: u8,
    pub flags: u8,
    pub roles: u8,
    pub lfg: Option<(u8, u32)>,
    pub group_guid: Guid,
    pub counter: u32,
    pub members: Vec<GroupMember>,
    pub leader: Guid,
    pub loot: Option<LootRules>,
}

impl GroupList {
    /// A roster with no members, as sent when the group is left.
    pub fn empty() -> Self {
        Self {
            group_type: 0,
            subgroup: 0,
            flags: 0,
            roles: 0,
            lfg: None,
            group_guid: Guid::EMPTY,
            counter: 0,
            members: Vec::new(),
            leader: Guid::EMPTY,
            loot: None,
        }
    }
}

impl ServerPacket for GroupList {
    const OPCODE: Opcode = SMSG_GROUP_LIST;

    fn read(r: &mut WireReader<'_>) -> Self {
        let mut list = Self::empty();
        list.group_type = r.u8();
        list.subgroup = r.u8();
        list.flags = r.u8();
        list.roles = r.u8();
        if list.group_type & GROUP_TYPE_LFG != 0 {
            list.lfg = Some((r.u8(), r.u32()));
        }
        list.group_guid = r.guid();
        list.counter = r.u32();
        let count = r.u32() as usize;
        list.members = r.list(count, GroupMember::MIN_LEN, GroupMember::read);
        list.leader = r.guid();
        if count > 0 {
            list.loot = Some(LootRules {
                method: LootMethod::from_raw(r.u8()),
                master_looter: r.guid(),
                threshold: r.u8(),
                dungeon_difficulty: r.u8(),
                raid_difficulty: r.u8(),
                dynamic_difficulty: r.u8(),
            });
        }
        list
    }

    fn write(&self, w: &mut WireWriter) {
        w.u8(self.group_type)
            .u8(self.subgroup)
            .u8(self.flags)
            .u8(self.roles);
        if self.group_type & GROUP_TYPE_LFG != 0 {
            let (state, dungeon) = self.lfg.unwrap_or_default();
            w.u8(state).u32(dungeon);
        }
        w.guid(self.group_guid)
            .u32(self.counter)
            .u32(self.members.len() as u32);
        for member in &self.members {
            member.write(w);
        }
        w.guid(self.leader);
        if !self.members.is_empty() {
            let loot = self.loot.unwrap_or_default();
            w.u8(loot.method.raw())
                .guid(loot.master_looter)
                .u8(loot.threshold)
                .u8(loot.dungeon_difficulty)
                .u8(loot.raid_difficulty)
                .u8(loot.dynamic_difficulty);
        }
    }
}

/// Declares a server record carrying one player name.
macro_rules! name_server_packet {
    ($(#[$meta:meta])* $name:ident => $opcode:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub name: String,
        }

        impl ServerPacket for $name {
            const OPCODE: Opcode = $opcode;

            fn read(r: &mut WireReader<'_>) -> Self {
                Self { name: r.cstring() }
            }

            fn write(&self, w: &mut WireWriter) {
                w.cstring(&self.name);
            }
        }
    };
}

name_server_packet! {
    /// A player declined the local player's invite: `cstring name`.
    GroupDecline => SMSG_GROUP_DECLINE
}

name_server_packet! {
    /// Leadership moved: `cstring name`.
    GroupSetLeader => SMSG_GROUP_SET_LEADER
}

/// Result of a group command.
///
/// ```text
/// u32 operation, cstring member, u32 result, u32 value
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyCommandResult {
    pub operation: PartyOperation,
    pub member: String,
    pub result: PartyResult,
    pub value: u32,
}

impl PartyCommandResult {
    pub fn is_ok(&self) -> bool {
        self.result == PartyResult::Ok
    }
}

impl ServerPacket for PartyCommandResult {
    const OPCODE: Opcode = SMSG_PARTY_COMMAND_RESULT;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            operation: PartyOperation::from_raw(r.u32()),
            member: r.cstring(),
            result: PartyResult::from_raw(r.u32()),
            value: r.u32(),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.u32(self.operation.raw())
            .cstring(&self.member)
            .u32(self.result.raw())
            .u32(self.value);
    }
}

/// Every party-category server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyMessage {
    Invite(GroupInvite),
    List(GroupList),
    Decline(GroupDecline),
    /// The local player was removed from the group. Empty payload.
    Uninvite,
    SetLeader(GroupSetLeader),
    /// The group was disbanded. Empty payload.
    Destroyed,
    CommandResult(PartyCommandResult),
}

impl PartyMessage {
    pub const OPCODES: &'static [Opcode] = &[
        SMSG_GROUP_INVITE,
        SMSG_GROUP_LIST,
        SMSG_GROUP_DECLINE,
        SMSG_GROUP_UNINVITE,
        SMSG_GROUP_SET_LEADER,
        SMSG_GROUP_DESTROYED,
        SMSG_PARTY_COMMAND_RESULT,
    ];

    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Option<Decoded<Self>> {
        Some(match opcode {
            SMSG_GROUP_INVITE => GroupInvite::decode(bytes).map(Self::Invite),
            SMSG_GROUP_LIST => GroupList::decode(bytes).map(Self::List),
            SMSG_GROUP_DECLINE => GroupDecline::decode(bytes).map(Self::Decline),
            SMSG_GROUP_UNINVITE => Decoded::complete(Self::Uninvite),
            SMSG_GROUP_SET_LEADER => GroupSetLeader::decode(bytes).map(Self::SetLeader),
            SMSG_GROUP_DESTROYED => Decoded::complete(Self::Destroyed),
            SMSG_PARTY_COMMAND_RESULT => {
                PartyCommandResult::decode(bytes).map(Self::CommandResult)
            }
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Invites a player by name: `cstring name, u32 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitePlayer {
    pub name: String,
}

impl ClientPacket for InvitePlayer {
    const OPCODE: Opcode = CMSG_GROUP_INVITE;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        if self.name.is_empty() {
            return Err(ProtocolError::Empty("name"));
        }
        check_cstring("name", &self.name, MAX_PLAYER_NAME)?;
        w.cstring(&self.name).u32(0);
        Ok(())
    }
}

empty_client_packet! {
    /// Accepts the pending invite.
    AcceptInvite => CMSG_GROUP_ACCEPT
}

empty_client_packet! {
    /// Declines the pending invite.
    DeclineInvite => CMSG_GROUP_DECLINE
}

empty_client_packet! {
    /// Leaves the group.
    DisbandGroup => CMSG_GROUP_DISBAND
}

guid_client_packet! {
    /// Hands leadership to a member.
    SetGroupLeader => CMSG_GROUP_SET_LEADER
}

/// Removes a member: `u64 member, cstring reason`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninviteMember {
    pub member: Guid,
    pub reason: String,
}

impl ClientPacket for UninviteMember {
    const OPCODE: Opcode = CMSG_GROUP_UNINVITE_GUID;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        check_cstring("reason", &self.reason, 255)?;
        w.guid(self.member).cstring(&self.reason);
        Ok(())
    }
}

/// Changes loot rules: `u32 method, u64 master, u32 threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetLootMethod {
    pub method: LootMethod,
    pub master_looter: Guid,
    pub threshold: u8,
}

impl ClientPacket for SetLootMethod {
    const OPCODE: Opcode = CMSG_LOOT_METHOD;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        if let LootMethod::Other(raw) = self.method {
            return Err(ProtocolError::InvalidArgument(format!("loot method {raw}")));
        }
        if self.method == LootMethod::MasterLoot && self.master_looter.is_empty() {
            return Err(ProtocolError::InvalidArgument(
                "master loot needs a master looter".into(),
            ));
        }
        w.u32(u32::from(self.method.raw()))
            .guid(self.master_looter)
            .u32(u32::from(self.threshold));
        Ok(())
    }
}
