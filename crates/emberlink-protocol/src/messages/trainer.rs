//! Class and profession trainer messages.

use emberlink_transport::Opcode;

use crate::opcodes::{
    CMSG_TRAINER_BUY_SPELL, CMSG_TRAINER_LIST, SMSG_TRAINER_BUY_FAILED,
    SMSG_TRAINER_BUY_SUCCEEDED, SMSG_TRAINER_LIST,
};
use crate::packet::{guid_client_packet, wire_enum, ClientPacket, ServerPacket};
use crate::wire::{Decoded, WireReader, WireWriter};
use crate::{Guid, ProtocolError};

wire_enum! {
    /// Whether the local player can learn a trainer's service.
    pub enum ServiceState: u8 {
        Available = 0,
        Unavailable = 1,
        Known = 2,
    }
}

wire_enum! {
    /// Why a purchase was refused.
    pub enum BuyFailure: u32 {
        Unavailable = 0,
        NotEnoughMoney = 1,
        NotEnoughSkill = 2,
    }
}

/// One spell a trainer teaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainerService {
    pub spell_id: u32,
    pub state: ServiceState,
    pub cost: u32,
    pub profession_first_rank: u32,
    pub profession_button: u32,
    pub required_level: u8,
    pub required_skill: u32,
    pub required_skill_value: u32,
    pub previous_spell: u32,
    pub required_spell: u32,
}

impl TrainerService {
    const WIRE_LEN: usize = 38;

    fn read(r: &mut WireReader<'_>) -> Self {
        let service = Self {
            spell_id: r.u32(),
            state: ServiceState::from_raw(r.u8()),
            cost: r.u32(),
            profession_first_rank: r.u32(),
            profession_button: r.u32(),
            required_level: r.u8(),
            required_skill: r.u32(),
            required_skill_value: r.u32(),
            previous_spell: r.u32(),
            required_spell: r.u32(),
        };
        r.skip(4);
        service
    }

    fn write(&self, w: &mut WireWriter) {
        w.u32(self.spell_id)
            .u8(self.state.raw())
            .u32(self.cost)
            .u32(self.profession_first_rank)
            .u32(self.profession_button)
            .u8(self.required_level)
            .u32(self.required_skill)
            .u32(self.required_skill_value)
            .u32(self.previous_spell)
            .u32(self.required_spell)
            .u32(0);
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A trainer's service list.
///
/// ```text
/// u64 trainer, u32 type, u32 count, count × service, cstring greeting
/// service: u32 spell, u8 state, u32 cost, u32 profFirstRank,
///          u32 profButton, u8 reqLevel, u32 reqSkill, u32 reqSkillValue,
///          u32 chainPrev, u32 reqSpell, u32 unk
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainerList {
    pub trainer: Guid,
    pub trainer_type: u32,
    pub services: Vec<TrainerService>,
    pub greeting: String,
}

impl ServerPacket for TrainerList {
    const OPCODE: Opcode = SMSG_TRAINER_LIST;

    fn read(r: &mut WireReader<'_>) -> Self {
        let trainer = r.guid();
        let trainer_type = r.u32();
        let count = r.u32() as usize;
        let services = r.list(count, TrainerService::WIRE_LEN, TrainerService::read);
        Self {
            trainer,
            trainer_type,
            services,
            greeting: r.cstring(),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.guid(self.trainer)
            .u32(self.trainer_type)
            .u32(self.services.len() as u32);
        for service in &self.services {
            service.write(w);
        }
        w.cstring(&self.greeting);
    }
}

/// A purchase went through: `u64 trainer, u32 spell`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainerBuySucceeded {
    pub trainer: Guid,
    pub spell_id: u32,
}

impl ServerPacket for TrainerBuySucceeded {
    const OPCODE: Opcode = SMSG_TRAINER_BUY_SUCCEEDED;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            trainer: r.guid(),
            spell_id: r.u32(),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.guid(self.trainer).u32(self.spell_id);
    }
}

/// A purchase was refused: `u64 trainer, u32 spell, u32 reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainerBuyFailed {
    pub trainer: Guid,
    pub spell_id: u32,
    pub reason: BuyFailure,
}

impl ServerPacket for TrainerBuyFailed {
    const OPCODE: Opcode = SMSG_TRAINER_BUY_FAILED;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self {
            trainer: r.guid(),
            spell_id: r.u32(),
            reason: BuyFailure::from_raw(r.u32()),
        }
    }

    fn write(&self, w: &mut WireWriter) {
        w.guid(self.trainer).u32(self.spell_id).u32(self.reason.raw());
    }
}

/// Every trainer-category server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainerMessage {
    List(TrainerList),
    BuySucceeded(TrainerBuySucceeded),
    BuyFailed(TrainerBuyFailed),
}

impl TrainerMessage {
    pub const OPCODES: &'static [Opcode] = &[
        SMSG_TRAINER_LIST,
        SMSG_TRAINER_BUY_SUCCEEDED,
        SMSG_TRAINER_BUY_FAILED,
    ];

    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Option<Decoded<Self>> {
        Some(match opcode {
            SMSG_TRAINER_LIST => TrainerList::decode(bytes).map(Self::List),
            SMSG_TRAINER_BUY_SUCCEEDED => {
                TrainerBuySucceeded::decode(bytes).map(Self::BuySucceeded)
            }
            SMSG_TRAINER_BUY_FAILED => TrainerBuyFailed::decode(bytes).map(Self::BuyFailed),
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

guid_client_packet! {
    /// Asks a trainer for its service list.
    RequestTrainerList => CMSG_TRAINER_LIST
}

/// Buys a service: `u64 trainer, u32 spell`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyTrainerSpell {
    pub trainer: Guid,
    pub spell_id: u32,
}

impl ClientPacket for BuyTrainerSpell {
    const OPCODE: Opcode = CMSG_TRAINER_BUY_SPELL;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.guid(self.trainer).u32(self.spell_id);
        Ok(())
    }
}
