//! A fully wired client over the in-memory transport: one frame fans out to
//! every subsystem that cares about it.

use std::sync::Arc;
use std::time::Duration;

use emberlink::prelude::*;
use emberlink::protocol::messages::party::{GroupList, GroupMember, LootMethod, LootRules};
use emberlink::protocol::{opcodes, ServerPacket};
use futures_util::StreamExt;

// =========================================================================
// Helpers
// =========================================================================

const PLAYER: Guid = Guid(0x42);
const LEADER: Guid = Guid(0x77);

fn client_with(config: ClientConfig) -> (Arc<MemoryTransport>, Client<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    let client = ClientBuilder::new()
        .config(config)
        .player(PLAYER)
        .build(Arc::clone(&transport));
    (transport, client)
}

fn client() -> (Arc<MemoryTransport>, Client<MemoryTransport>) {
    client_with(ClientConfig::default())
}

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn member(name: &str, guid: Guid) -> GroupMember {
    GroupMember {
        name: name.into(),
        guid,
        online: true,
        subgroup: 0,
        flags: 0,
        roles: 0,
    }
}

// =========================================================================
// Wiring
// =========================================================================

#[tokio::test]
async fn test_build_registers_each_opcode_once() {
    let (transport, client) = client();

    // Loot and party both follow the roster.
    assert_eq!(transport.registrations(opcodes::SMSG_GROUP_LIST), 1);
    assert_eq!(
        client.context().multiplexer.subscriber_count(opcodes::SMSG_GROUP_LIST),
        2
    );
    assert_eq!(transport.registrations(opcodes::SMSG_MESSAGECHAT), 1);
}

#[tokio::test]
async fn test_group_list_updates_party_and_loot() {
    let (transport, client) = client();

    let mut list = GroupList::empty();
    list.members = vec![member("Leader", LEADER), member("Me", PLAYER)];
    list.leader = LEADER;
    list.loot = Some(LootRules {
        method: LootMethod::MasterLoot,
        master_looter: PLAYER,
        ..LootRules::default()
    });
    transport.inject(opcodes::SMSG_GROUP_LIST, list.encode());
    settle().await;

    assert!(client.party().in_group());
    assert_eq!(client.party().leader(), Some(LEADER));
    assert!(!client.party().is_leader());
    assert!(client.loot().is_master_looter());
}

#[tokio::test]
async fn test_chat_line_reaches_messages_view() {
    let (transport, client) = client();
    let mut lines = Box::pin(client.chat().messages());

    let line = ChatLine::new(ChatType::Say, LEADER, "well met");
    transport.inject(opcodes::SMSG_MESSAGECHAT, line.encode());

    let received = lines.next().await.unwrap();
    assert_eq!(received.line.text, "well met");
    assert_eq!(received.line.sender, LEADER);
}

// =========================================================================
// Configuration
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_json_cooldown_spaces_says() {
    let config = ClientConfig::from_json(r#"{ "say_cooldown_ms": 3000 }"#).unwrap();
    let (transport, client) = client_with(config);
    let cancel = CancellationToken::new();

    client.chat().say("one", &cancel).await.unwrap();
    client.chat().say("two", &cancel).await.unwrap();

    let sent = transport.sent_with(opcodes::CMSG_MESSAGECHAT);
    assert_eq!(sent.len(), 2);
    assert!(sent[1].at - sent[0].at >= Duration::from_secs(3));
}

// =========================================================================
// Disposal
// =========================================================================

#[tokio::test]
async fn test_disposed_client_refuses_commands() {
    let (transport, client) = client();
    client.dispose();

    let cancel = CancellationToken::new();
    let err = client.chat().say("hello?", &cancel).await.unwrap_err();
    assert!(matches!(err, SessionError::Disposed));
    let err = client.loot().open(Guid(5), &cancel).await.unwrap_err();
    assert!(matches!(err, SessionError::Disposed));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_session_error_converts_to_emberlink_error() {
    let (_transport, client) = client();

    async fn take(client: &Client<MemoryTransport>) -> Result<(), EmberlinkError> {
        client.loot().take(0, &CancellationToken::new()).await?;
        Ok(())
    }

    let err = take(&client).await.unwrap_err();
    assert!(matches!(
        err,
        EmberlinkError::Session(SessionError::Precondition(PreconditionViolation::NotOpen(_)))
    ));
}
