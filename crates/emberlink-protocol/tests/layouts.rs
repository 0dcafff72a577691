//! Byte-exact layouts for outbound packets and the decode behaviour of the
//! records whose layout is easiest to get wrong.

use emberlink_protocol::messages::chat::{ChatType, JoinChannel, SendChatMessage};
use emberlink_protocol::messages::mail::{Mail, MailListResult};
use emberlink_protocol::messages::spell::{CastSpell, SpellTarget};
use emberlink_protocol::{
    ClientPacket, DecodeQuality, Guid, ProtocolError, ServerMessage, ServerPacket, WireWriter,
    opcodes,
};

// =========================================================================
// Outbound
// =========================================================================

#[test]
fn test_cast_spell_on_unit_uses_packed_target() {
    let bytes = CastSpell {
        spell_id: 133,
        target: SpellTarget::Unit(Guid(0xF130_0000_0000_00AB)),
    }
    .encode()
    .unwrap();

    assert_eq!(
        bytes.as_ref(),
        &[
            133, 0, 0, 0, // spell
            0x02, 0x00, // unit flag
            0b1100_0001, 0xAB, 0x30, 0xF1, // packed guid
        ]
    );
}

#[test]
fn test_cast_spell_on_self_has_no_target_guid() {
    let bytes = CastSpell {
        spell_id: 1459,
        target: SpellTarget::Caster,
    }
    .encode()
    .unwrap();

    assert_eq!(bytes.as_ref(), &[0xB3, 0x05, 0, 0, 0, 0]);
}

#[test]
fn test_whisper_layout_carries_target_before_text() {
    let bytes = SendChatMessage::new(ChatType::Whisper, "hi")
        .with_target("Bob")
        .encode()
        .unwrap();

    let mut expected = WireWriter::new();
    expected
        .u32(u32::from(ChatType::Whisper.raw()))
        .u32(0)
        .cstring("Bob")
        .cstring("hi");
    assert_eq!(bytes, expected.finish());
}

#[test]
fn test_whisper_without_target_is_rejected() {
    let err = SendChatMessage::new(ChatType::Whisper, "hi").encode().unwrap_err();
    assert_eq!(err, ProtocolError::Empty("target"));
}

#[test]
fn test_chat_text_over_limit_is_rejected() {
    let err = SendChatMessage::new(ChatType::Say, "x".repeat(256))
        .encode()
        .unwrap_err();
    assert!(matches!(err, ProtocolError::StringTooLong { field: "text", .. }));
}

#[test]
fn test_join_channel_layout() {
    let bytes = JoinChannel {
        name: "Trade".into(),
        password: String::new(),
    }
    .encode()
    .unwrap();
    assert_eq!(bytes.as_ref(), b"Trade\0\0");
}

// =========================================================================
// Mail list
// =========================================================================

fn framed(mail: &Mail) -> Vec<u8> {
    let list = MailListResult {
        total: 1,
        mails: vec![mail.clone()],
    };
    // Strip the list header: u32 total, u8 shown.
    list.encode()[5..].to_vec()
}

#[test]
fn test_mail_list_skips_malformed_mail_and_resumes() {
    let first = Mail::new(1, Guid(0x10), "first");
    let third = Mail::new(3, Guid(0x30), "third");

    let mut w = WireWriter::new();
    w.u32(3).u8(3);
    w.bytes(&framed(&first));
    w.u16(3).bytes(&[0xDE, 0xAD, 0xBE]);
    w.bytes(&framed(&third));

    let decoded = MailListResult::decode(&w.finish());

    assert_eq!(decoded.quality, DecodeQuality::Truncated);
    let ids: Vec<u32> = decoded.value.mails.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn test_mail_list_size_past_end_stops() {
    let mut w = WireWriter::new();
    w.u32(1).u8(1).u16(400).bytes(&[0; 10]);

    let decoded = MailListResult::decode(&w.finish());

    assert_eq!(decoded.quality, DecodeQuality::Truncated);
    assert!(decoded.value.mails.is_empty());
}

#[test]
fn test_mail_list_roundtrip_through_server_message() {
    let mut mail = Mail::new(9, Guid(0x0000_0000_0000_0042), "Hello");
    mail.body = "See you at the inn".into();
    mail.money = 1500;
    let list = MailListResult {
        total: 1,
        mails: vec![mail],
    };

    let decoded = ServerMessage::decode(opcodes::SMSG_MAIL_LIST_RESULT, &list.encode());

    assert!(decoded.is_complete());
    assert_eq!(decoded.value.category(), "mail");
}
