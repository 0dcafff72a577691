//! Opcode catalogue.
//!
//! `SMSG_*` tags travel server → client, `CMSG_*` client → server. Both
//! directions share one numbering space.

use emberlink_transport::Opcode;

// ---------------------------------------------------------------------------
// Party
// ---------------------------------------------------------------------------

pub const CMSG_GROUP_INVITE: Opcode = Opcode(0x06E);
pub const SMSG_GROUP_INVITE: Opcode = Opcode(0x06F);
pub const CMSG_GROUP_ACCEPT: Opcode = Opcode(0x072);
pub const CMSG_GROUP_DECLINE: Opcode = Opcode(0x073);
pub const SMSG_GROUP_DECLINE: Opcode = Opcode(0x074);
pub const CMSG_GROUP_UNINVITE_GUID: Opcode = Opcode(0x076);
pub const SMSG_GROUP_UNINVITE: Opcode = Opcode(0x077);
pub const CMSG_GROUP_SET_LEADER: Opcode = Opcode(0x078);
pub const SMSG_GROUP_SET_LEADER: Opcode = Opcode(0x079);
pub const CMSG_LOOT_METHOD: Opcode = Opcode(0x07A);
pub const CMSG_GROUP_DISBAND: Opcode = Opcode(0x07B);
pub const SMSG_GROUP_DESTROYED: Opcode = Opcode(0x07C);
pub const SMSG_GROUP_LIST: Opcode = Opcode(0x07D);
pub const SMSG_PARTY_COMMAND_RESULT: Opcode = Opcode(0x07F);

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

pub const CMSG_MESSAGECHAT: Opcode = Opcode(0x095);
pub const SMSG_MESSAGECHAT: Opcode = Opcode(0x096);
pub const CMSG_JOIN_CHANNEL: Opcode = Opcode(0x097);
pub const CMSG_LEAVE_CHANNEL: Opcode = Opcode(0x098);
pub const SMSG_CHANNEL_NOTIFY: Opcode = Opcode(0x099);
pub const SMSG_CHAT_PLAYER_NOT_FOUND: Opcode = Opcode(0x2A9);
pub const SMSG_GM_MESSAGECHAT: Opcode = Opcode(0x3B3);

// ---------------------------------------------------------------------------
// World objects
// ---------------------------------------------------------------------------

pub const CMSG_GAMEOBJ_USE: Opcode = Opcode(0x0B1);

// ---------------------------------------------------------------------------
// Loot
// ---------------------------------------------------------------------------

pub const CMSG_AUTOSTORE_LOOT_ITEM: Opcode = Opcode(0x108);
pub const CMSG_LOOT: Opcode = Opcode(0x15D);
pub const CMSG_LOOT_MONEY: Opcode = Opcode(0x15E);
pub const CMSG_LOOT_RELEASE: Opcode = Opcode(0x15F);
pub const SMSG_LOOT_RESPONSE: Opcode = Opcode(0x160);
pub const SMSG_LOOT_RELEASE_RESPONSE: Opcode = Opcode(0x161);
pub const SMSG_LOOT_REMOVED: Opcode = Opcode(0x162);
pub const SMSG_LOOT_MONEY_NOTIFY: Opcode = Opcode(0x163);
pub const SMSG_LOOT_CLEAR_MONEY: Opcode = Opcode(0x165);
pub const SMSG_LOOT_ALL_PASSED: Opcode = Opcode(0x29E);
pub const SMSG_LOOT_ROLL_WON: Opcode = Opcode(0x29F);
pub const CMSG_LOOT_ROLL: Opcode = Opcode(0x2A0);
pub const SMSG_LOOT_START_ROLL: Opcode = Opcode(0x2A1);
pub const SMSG_LOOT_ROLL: Opcode = Opcode(0x2A2);
pub const CMSG_LOOT_MASTER_GIVE: Opcode = Opcode(0x2A3);
pub const SMSG_LOOT_MASTER_LIST: Opcode = Opcode(0x2A4);

// ---------------------------------------------------------------------------
// Spells
// ---------------------------------------------------------------------------

pub const SMSG_LEARNED_SPELL: Opcode = Opcode(0x12B);
pub const CMSG_CAST_SPELL: Opcode = Opcode(0x12E);
pub const CMSG_CANCEL_CAST: Opcode = Opcode(0x12F);
pub const SMSG_CAST_FAILED: Opcode = Opcode(0x130);
pub const SMSG_SPELL_START: Opcode = Opcode(0x131);
pub const SMSG_SPELL_GO: Opcode = Opcode(0x132);
pub const SMSG_SPELL_FAILURE: Opcode = Opcode(0x133);
pub const SMSG_SPELL_COOLDOWN: Opcode = Opcode(0x134);

// ---------------------------------------------------------------------------
// Gossip
// ---------------------------------------------------------------------------

pub const CMSG_GOSSIP_HELLO: Opcode = Opcode(0x17B);
pub const CMSG_GOSSIP_SELECT_OPTION: Opcode = Opcode(0x17C);
pub const SMSG_GOSSIP_MESSAGE: Opcode = Opcode(0x17D);
pub const SMSG_GOSSIP_COMPLETE: Opcode = Opcode(0x17E);
pub const CMSG_NPC_TEXT_QUERY: Opcode = Opcode(0x17F);
pub const SMSG_NPC_TEXT_UPDATE: Opcode = Opcode(0x180);

// ---------------------------------------------------------------------------
// Quests
// ---------------------------------------------------------------------------

pub const CMSG_QUESTGIVER_STATUS_QUERY: Opcode = Opcode(0x182);
pub const SMSG_QUESTGIVER_STATUS: Opcode = Opcode(0x183);
pub const CMSG_QUESTGIVER_HELLO: Opcode = Opcode(0x184);
pub const SMSG_QUESTGIVER_QUEST_LIST: Opcode = Opcode(0x185);
pub const CMSG_QUESTGIVER_QUERY_QUEST: Opcode = Opcode(0x186);
pub const SMSG_QUESTGIVER_QUEST_DETAILS: Opcode = Opcode(0x188);
pub const CMSG_QUESTGIVER_ACCEPT_QUEST: Opcode = Opcode(0x189);
pub const CMSG_QUESTGIVER_COMPLETE_QUEST: Opcode = Opcode(0x18A);
pub const SMSG_QUESTGIVER_REQUEST_ITEMS: Opcode = Opcode(0x18B);
pub const CMSG_QUESTGIVER_REQUEST_REWARD: Opcode = Opcode(0x18C);
pub const SMSG_QUESTGIVER_OFFER_REWARD: Opcode = Opcode(0x18D);
pub const CMSG_QUESTGIVER_CHOOSE_REWARD: Opcode = Opcode(0x18E);
pub const SMSG_QUESTGIVER_QUEST_INVALID: Opcode = Opcode(0x18F);
pub const CMSG_QUESTGIVER_CANCEL: Opcode = Opcode(0x190);
pub const SMSG_QUESTGIVER_QUEST_COMPLETE: Opcode = Opcode(0x191);
pub const SMSG_QUESTGIVER_QUEST_FAILED: Opcode = Opcode(0x192);
pub const CMSG_QUESTLOG_REMOVE_QUEST: Opcode = Opcode(0x194);

// ---------------------------------------------------------------------------
// Trainers
// ---------------------------------------------------------------------------

pub const CMSG_TRAINER_LIST: Opcode = Opcode(0x1B0);
pub const SMSG_TRAINER_LIST: Opcode = Opcode(0x1B1);
pub const CMSG_TRAINER_BUY_SPELL: Opcode = Opcode(0x1B2);
pub const SMSG_TRAINER_BUY_SUCCEEDED: Opcode = Opcode(0x1B3);
pub const SMSG_TRAINER_BUY_FAILED: Opcode = Opcode(0x1B4);

// ---------------------------------------------------------------------------
// Mail
// ---------------------------------------------------------------------------

pub const CMSG_SEND_MAIL: Opcode = Opcode(0x238);
pub const SMSG_SEND_MAIL_RESULT: Opcode = Opcode(0x239);
pub const CMSG_GET_MAIL_LIST: Opcode = Opcode(0x23A);
pub const SMSG_MAIL_LIST_RESULT: Opcode = Opcode(0x23B);
pub const CMSG_MAIL_TAKE_MONEY: Opcode = Opcode(0x245);
pub const CMSG_MAIL_TAKE_ITEM: Opcode = Opcode(0x246);
pub const CMSG_MAIL_MARK_AS_READ: Opcode = Opcode(0x247);
pub const CMSG_MAIL_RETURN_TO_SENDER: Opcode = Opcode(0x248);
pub const CMSG_MAIL_DELETE: Opcode = Opcode(0x249);
pub const SMSG_RECEIVED_MAIL: Opcode = Opcode(0x285);
