//! Spell casting messages.

use emberlink_transport::Opcode;

use crate::opcodes::{
    CMSG_CANCEL_CAST, CMSG_CAST_SPELL, SMSG_CAST_FAILED, SMSG_LEARNED_SPELL, SMSG_SPELL_COOLDOWN,
    SMSG_SPELL_FAILURE, SMSG_SPELL_GO, SMSG_SPELL_START,
};
use crate::packet::{ClientPacket, ServerPacket};
use crate::wire::{Decoded, WireReader, WireWriter};
use crate::{Guid, ProtocolError};

pub const TARGET_FLAG_SELF: u16 = 0x0000;
pub const TARGET_FLAG_UNIT: u16 = 0x0002;
pub const TARGET_FLAG_OBJECT: u16 = 0x0800;

/// Who or what a spell is cast on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpellTarget {
    /// The caster itself; no GUID on the wire.
    #[default]
    Caster,
    Unit(Guid),
    Object(Guid),
}

impl SpellTarget {
    pub fn flags(self) -> u16 {
        match self {
            Self::Caster => TARGET_FLAG_SELF,
            Self::Unit(_) => TARGET_FLAG_UNIT,
            Self::Object(_) => TARGET_FLAG_OBJECT,
        }
    }

    pub fn guid(self) -> Option<Guid> {
        match self {
            Self::Caster => None,
            Self::Unit(guid) | Self::Object(guid) => Some(guid),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A cast began.
///
/// ```text
/// packed casterItem, packed caster, u32 spell, u16 castFlags, u32 castTime
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpellStart {
    pub caster_item: Guid,
    pub caster: Guid,
    pub spell_id: u32,
    pub cast_flags: u16,
    pub cast_time_ms: u32,
}

impl ServerPacket for SpellStart {
    const OPCODE: Opcode = SMSG_SPELL_START;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            caster_item: r.packed_guid(),
            caster: r.packed_guid(),
            spell_id: r.u32(),
            cast_flags: r.u16(),
            cast_time_ms: r.u32(),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.packed_guid(self.caster_item)
            .packed_guid(self.caster)
            .u32(self.spell_id)
            .u16(self.cast_flags)
            .u32(self.cast_time_ms);
    }
}

/// A cast completed and hit (or missed) its targets.
///
/// ```text
/// packed casterItem, packed caster, u32 spell, u16 castFlags,
/// u8 hitCount, hitCount × u64, u8 missCount, missCount × (u64, u8 reason)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellGo {
    pub caster_item: Guid,
    pub caster: Guid,
    pub spell_id: u32,
    pub cast_flags: u16,
    pub hits: Vec<Guid>,
    pub misses: Vec<(Guid, u8)>,
}

impl ServerPacket for SpellGo {
    const OPCODE: Opcode = SMSG_SPELL_GO;

    fn read(r: &mut WireReader<'_>) -> Self {
        let caster_item = r.packed_guid();
        let caster = r.packed_guid();
        let spell_id = r.u32();
        let cast_flags = r.u16();
        let hit_count = usize::from(r.u8());
        let hits = r.list(hit_count, 8, WireReader::guid);
        let miss_count = usize::from(r.u8());
        let misses = r.list(miss_count, 9, |r| (r.guid(), r.u8()));
        Self {
            caster_item,
            caster,
            spell_id,
            cast_flags,
            hits,
            misses,
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.packed_guid(self.caster_item)
            .packed_guid(self.caster)
            .u32(self.spell_id)
            .u16(self.cast_flags);
        let hits = u8::try_from(self.hits.len()).unwrap_or(u8::MAX);
        w.u8(hits);
        for guid in self.hits.iter().take(usize::from(hits)) {
            w.guid(*guid);
        }
        let misses = u8::try_from(self.misses.len()).unwrap_or(u8::MAX);
        w.u8(misses);
        for (guid, reason) in self.misses.iter().take(usize::from(misses)) {
            w.guid(*guid).u8(*reason);
        }
    }
}

/// The server rejected the local player's cast.
///
/// ```text
/// u32 spell, u8 status, [u8 reason when status != 0]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastFailed {
    pub spell_id: u32,
    pub status: u8,
    pub reason: Option<u8>,
}

impl ServerPacket for CastFailed {
    const OPCODE: Opcode = SMSG_CAST_FAILED;

    fn read(r: &mut WireReader<'_>) -> Self {
        let spell_id = r.u32();
        let status = r.u8();
        let reason = if status != 0 { Some(r.u8()) } else { None };
        Self {
            spell_id,
            status,
            reason,
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.u32(self.spell_id).u8(self.status);
        if self.status != 0 {
            w.u8(self.reason.unwrap_or_default());
        }
    }
}

/// A cast in progress was interrupted: `packed caster, u32 spell, u8 reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpellFailure {
    pub caster: Guid,
    pub spell_id: u32,
    pub reason: u8,
}

impl ServerPacket for SpellFailure {
    const OPCODE: Opcode = SMSG_SPELL_FAILURE;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            caster: r.packed_guid(),
            spell_id: r.u32(),
            reason: r.u8(),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.packed_guid(self.caster).u32(self.spell_id).u8(self.reason);
    }
}

/// Cooldowns started by a cast.
///
/// ```text
/// u64 caster, u8 flags, then (u32 spell, u32 cooldownMs) to the end
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellCooldown {
    pub caster: Guid,
    pub flags: u8,
    pub cooldowns: Vec<(u32, u32)>,
}

impl ServerPacket for SpellCooldown {
    const OPCODE: Opcode = SMSG_SPELL_COOLDOWN;

    fn read(r: &mut WireReader<'_>) -> Self {
        let caster = r.guid();
        let flags = r.u8();
        let mut cooldowns = Vec::new();
        while r.remaining() >= 8 {
            cooldowns.push((r.u32(), r.u32()));
        }
        if !r.is_empty() {
            r.mark_truncated();
        }
        Self {
            caster,
            flags,
            cooldowns,
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.guid(self.caster).u8(self.flags);
        for (spell, ms) in &self.cooldowns {
            w.u32(*spell).u32(*ms);
        }
    }
}

/// The local player learned a spell: `u32 spell`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnedSpell {
    pub spell_id: u32,
}

impl ServerPacket for LearnedSpell {
    const OPCODE: Opcode = SMSG_LEARNED_SPELL;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self { spell_id: r.u32() }
    }

    fn write(&self, w: &mut WireWriter) {
        w.u32(self.spell_id);
    }
}

/// Every spell-category server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpellMessage {
    Start(SpellStart),
    Go(SpellGo),
    CastFailed(CastFailed),
    Failure(SpellFailure),
    Cooldown(SpellCooldown),
    Learned(LearnedSpell),
}

impl SpellMessage {
    pub const OPCODES: &'static [Opcode] = &[
        SMSG_SPELL_START,
        SMSG_SPELL_GO,
        SMSG_CAST_FAILED,
        SMSG_SPELL_FAILURE,
        SMSG_SPELL_COOLDOWN,
        SMSG_LEARNED_SPELL,
    ];

    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Option<Decoded<Self>> {
        Some(match opcode {
            SMSG_SPELL_START => SpellStart::decode(bytes).map(Self::Start),
            SMSG_SPELL_GO => SpellGo::decode(bytes).map(Self::Go),
            SMSG_CAST_FAILED => CastFailed::decode(bytes).map(Self::CastFailed),
            SMSG_SPELL_FAILURE => SpellFailure::decode(bytes).map(Self::Failure),
            SMSG_SPELL_COOLDOWN => SpellCooldown::decode(bytes).map(Self::Cooldown),
            SMSG_LEARNED_SPELL => LearnedSpell::decode(bytes).map(Self::Learned),
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Casts a spell.
///
/// ```text
/// u32 spell, u16 targetFlags, [packed target when flags name a unit or object]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastSpell {
    pub spell_id: u32,
    pub target: SpellTarget,
}

impl ClientPacket for CastSpell {
    const OPCODE: Opcode = CMSG_CAST_SPELL;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        if self.spell_id == 0 {
            return Err(ProtocolError::InvalidArgument("spell id 0".into()));
        }
        w.u32(self.spell_id).u16(self.target.flags());
        if let Some(guid) = self.target.guid() {
            w.packed_guid(guid);
        }
        Ok(())
    }
}

/// Cancels the local player's cast: `u32 spell`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelCast {
    pub spell_id: u32,
}

impl ClientPacket for CancelCast {
    const OPCODE: Opcode = CMSG_CANCEL_CAST;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.u32(self.spell_id);
        Ok(())
    }
}
