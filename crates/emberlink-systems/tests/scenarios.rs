//! End-to-end subsystem scenarios over the in-memory transport: commands go
//! out through the outbound path, server frames come back through the
//! multiplexer and the listener folds them.

use std::sync::Arc;
use std::time::Duration;

use emberlink_protocol::messages::chat::{ChannelNotify, ChannelNotifyKind, ChatLine, ChatType};
use emberlink_protocol::messages::gossip::{GossipIcon, GossipMenu, GossipOption, NpcTextUpdate};
use emberlink_protocol::messages::loot::{LootItem, LootRemoved, LootResponse, LootSlotType, LootType};
use emberlink_protocol::messages::mail::{Mail, MailListResult};
use emberlink_protocol::messages::party::{GroupList, GroupMember, LootMethod, LootRules};
use emberlink_protocol::messages::spell::{SpellCooldown, SpellTarget};
use emberlink_protocol::{opcodes, Guid, ServerPacket};
use emberlink_session::{Phase, SessionError};
use emberlink_systems::chat::ChatEvent;
use emberlink_systems::mail::MailDraft;
use emberlink_systems::{
    ChatCooldowns, ChatSystem, GossipSystem, LootSystem, MailboxSystem, SpellCastSystem,
    SystemContext,
};
use emberlink_transport::MemoryTransport;
use futures_util::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// =========================================================================
// Helpers
// =========================================================================

const PLAYER: Guid = Guid(0x0000_0000_0000_0042);

fn setup() -> (Arc<MemoryTransport>, SystemContext<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    let ctx = SystemContext::new(Arc::clone(&transport), PLAYER);
    (transport, ctx)
}

/// Lets pumps and listeners fold whatever was injected.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn loot_item(slot: u8) -> LootItem {
    LootItem {
        slot,
        item_id: 2589 + u32::from(slot),
        count: 1,
        display_id: 0,
        random_suffix: 0,
        random_property: 0,
        slot_type: LootSlotType::AllowLoot,
    }
}

fn vendor_menu(npc: Guid, text_id: u32) -> GossipMenu {
    GossipMenu {
        npc,
        menu_id: 1,
        text_id,
        options: vec![GossipOption {
            index: 0,
            icon: GossipIcon::Vendor,
            coded: false,
            box_money: 0,
            text: "Let me browse your goods.".into(),
            box_text: String::new(),
        }],
        quests: Vec::new(),
    }
}

// =========================================================================
// Loot
// =========================================================================

#[tokio::test]
async fn test_loot_open_take_removes_only_that_slot() {
    let (transport, ctx) = setup();
    let loot = LootSystem::new(&ctx);
    let cancel = CancellationToken::new();
    let corpse = Guid(0x1234);

    loot.open(corpse, &cancel).await.unwrap();
    assert_eq!(loot.phase(), Phase::Opening);
    let sent = transport.sent_with(opcodes::CMSG_LOOT);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload.as_ref(), &0x1234u64.to_le_bytes());

    let response = LootResponse {
        source: corpse,
        loot_type: LootType::Corpse,
        gold: 0,
        items: vec![loot_item(0), loot_item(1)],
        error: None,
    };
    transport.inject(opcodes::SMSG_LOOT_RESPONSE, response.encode());
    settle().await;

    assert!(loot.is_open());
    assert_eq!(loot.current_target(), Some(corpse));
    assert_eq!(loot.available_loot(), vec![loot_item(0), loot_item(1)]);

    loot.take(0, &cancel).await.unwrap();
    assert_eq!(loot.available_loot(), vec![loot_item(1)]);
    let taken = transport.sent_with(opcodes::CMSG_AUTOSTORE_LOOT_ITEM);
    assert_eq!(taken[0].payload.as_ref(), &[0]);
}

#[tokio::test]
async fn test_loot_take_unknown_slot_sends_nothing() {
    let (transport, ctx) = setup();
    let loot = LootSystem::new(&ctx);

    let err = loot.take(3, &CancellationToken::new()).await.unwrap_err();
    assert!(err.is_precondition());
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_loot_master_give_refused_after_group_destroyed() {
    let (transport, ctx) = setup();
    let loot = LootSystem::new(&ctx);
    let cancel = CancellationToken::new();
    let corpse = Guid(0x1234);
    let raider = Guid(0x0000_0000_0000_0051);

    let mut list = GroupList::empty();
    list.members = vec![GroupMember {
        name: "Raider".into(),
        guid: raider,
        online: true,
        subgroup: 0,
        flags: 0,
        roles: 0,
    }];
    list.leader = PLAYER;
    list.loot = Some(LootRules {
        method: LootMethod::MasterLoot,
        master_looter: PLAYER,
        ..LootRules::default()
    });
    transport.inject(opcodes::SMSG_GROUP_LIST, list.encode());
    let mut master_item = loot_item(0);
    master_item.slot_type = LootSlotType::Master;
    let response = LootResponse {
        source: corpse,
        loot_type: LootType::Corpse,
        gold: 0,
        items: vec![master_item],
        error: None,
    };
    transport.inject(opcodes::SMSG_LOOT_RESPONSE, response.encode());
    settle().await;
    assert!(loot.is_master_looter());
    assert_eq!(loot.takeable_slots(), vec![0]);

    transport.inject(opcodes::SMSG_GROUP_DESTROYED, Vec::<u8>::new());
    settle().await;

    assert!(!loot.is_master_looter());
    assert!(loot.takeable_slots().is_empty());
    let err = loot.master_give(0, raider, &cancel).await.unwrap_err();
    assert!(err.is_precondition());
    assert!(transport.sent_with(opcodes::CMSG_LOOT_MASTER_GIVE).is_empty());
}

// =========================================================================
// Gossip
// =========================================================================

#[tokio::test]
async fn test_gossip_text_patch_for_open_npc_only() {
    let (transport, ctx) = setup();
    let gossip = GossipSystem::new(&ctx);
    let other = Guid(0xBBBB);
    let npc = Guid(0xAAAA);

    // Text 200 belongs to the NPC the player talked to before.
    transport.inject(opcodes::SMSG_GOSSIP_MESSAGE, vendor_menu(other, 200).encode());
    transport.inject(opcodes::SMSG_GOSSIP_MESSAGE, vendor_menu(npc, 100).encode());
    settle().await;
    assert_eq!(gossip.current_target(), Some(npc));

    transport.inject(
        opcodes::SMSG_NPC_TEXT_UPDATE,
        NpcTextUpdate::single(100, "Welcome, traveller.").encode(),
    );
    settle().await;

    let snapshot = gossip.menu().unwrap();
    assert_eq!(snapshot.text.as_deref(), Some("Welcome, traveller."));
    assert_eq!(snapshot.menu, vendor_menu(npc, 100));

    transport.inject(
        opcodes::SMSG_NPC_TEXT_UPDATE,
        NpcTextUpdate::single(200, "Not for you.").encode(),
    );
    settle().await;

    let snapshot = gossip.menu().unwrap();
    assert_eq!(snapshot.text.as_deref(), Some("Welcome, traveller."));
    assert_eq!(snapshot.menu.options, vendor_menu(npc, 100).options);
}

#[tokio::test]
async fn test_gossip_services_discovered() {
    let (transport, ctx) = setup();
    let gossip = GossipSystem::new(&ctx);
    let mut services = Box::pin(gossip.services_discovered());

    transport.inject(opcodes::SMSG_GOSSIP_MESSAGE, vendor_menu(Guid(0xAAAA), 1).encode());

    let found = services.next().await.unwrap();
    assert_eq!(found.npc, Guid(0xAAAA));
    assert_eq!(found.kind, emberlink_systems::gossip::ServiceKind::Vendor);
}

// =========================================================================
// Mailbox
// =========================================================================

#[tokio::test]
async fn test_mail_actions_before_open_send_nothing() {
    let (transport, ctx) = setup();
    let mail = MailboxSystem::new(&ctx);
    let cancel = CancellationToken::new();

    let results = [
        mail.take_money(1, &cancel).await,
        mail.take_item(1, 0x4001, &cancel).await,
        mail.mark_read(1, &cancel).await,
        mail.delete(1, &cancel).await,
        mail.return_to_sender(1, &cancel).await,
        mail.send_mail(MailDraft::new("Thrall", "hi"), &cancel).await,
        mail.refresh(&cancel).await,
    ];

    for result in results {
        assert!(matches!(result, Err(SessionError::Precondition(_))), "{result:?}");
    }
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_mail_open_uses_object_then_lists() {
    let (transport, ctx) = setup();
    let mail = MailboxSystem::new(&ctx);
    let cancel = CancellationToken::new();
    let mailbox = Guid(0xF110_0000_0000_0777);

    mail.open(mailbox, &cancel).await.unwrap();
    let opcodes_sent: Vec<_> = transport.sent().iter().map(|f| f.opcode).collect();
    assert_eq!(opcodes_sent, vec![opcodes::CMSG_GAMEOBJ_USE, opcodes::CMSG_GET_MAIL_LIST]);

    let list = MailListResult {
        total: 1,
        mails: vec![Mail::new(9, Guid(0x77), "Your auction")],
    };
    transport.inject(opcodes::SMSG_MAIL_LIST_RESULT, list.encode());
    settle().await;

    assert!(mail.is_open());
    assert_eq!(mail.mails().len(), 1);

    // Known id but no money on it.
    let err = mail.take_money(9, &cancel).await.unwrap_err();
    assert!(err.is_precondition());

    mail.mark_read(9, &cancel).await.unwrap();
    assert!(mail.mail(9).unwrap().is_read());
}

#[tokio::test]
async fn test_mail_open_keeps_previous_mailbox_when_list_request_fails() {
    let (transport, ctx) = setup();
    let mail = MailboxSystem::new(&ctx);
    let cancel = CancellationToken::new();
    let first = Guid(0xF110_0000_0000_0777);
    let second = Guid(0xF110_0000_0000_0888);

    mail.open(first, &cancel).await.unwrap();
    let list = MailListResult {
        total: 1,
        mails: vec![Mail::new(9, Guid(0x77), "Your auction")],
    };
    transport.inject(opcodes::SMSG_MAIL_LIST_RESULT, list.encode());
    settle().await;
    assert!(mail.is_open());

    transport.reject_sends(opcodes::CMSG_GET_MAIL_LIST);
    let err = mail.open(second, &cancel).await.unwrap_err();

    assert!(matches!(err, SessionError::Transport(_)), "{err:?}");
    assert_eq!(mail.current_target(), Some(first));
    assert_eq!(mail.phase(), Phase::Open);
    assert_eq!(mail.mails().len(), 1);
    assert!(mail.mail(9).is_some());
}

// =========================================================================
// Chat
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_second_say_delayed_by_cooldown() {
    let (transport, ctx) = setup();
    let chat = ChatSystem::new(&ctx, ChatCooldowns::default());
    let cancel = CancellationToken::new();

    chat.say("first", &cancel).await.unwrap();
    chat.say("second", &cancel).await.unwrap();

    let sent = transport.sent_with(opcodes::CMSG_MESSAGECHAT);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].at - sent[0].at, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_say_and_yell_do_not_share_cooldown() {
    let (transport, ctx) = setup();
    let chat = ChatSystem::new(&ctx, ChatCooldowns::default());
    let cancel = CancellationToken::new();

    chat.say("hello", &cancel).await.unwrap();
    chat.yell("HELLO", &cancel).await.unwrap();

    let sent = transport.sent_with(opcodes::CMSG_MESSAGECHAT);
    assert_eq!(sent[0].at, sent[1].at);
}

#[tokio::test(start_paused = true)]
async fn test_says_carry_arrival_time() {
    let (transport, ctx) = setup();
    let chat = ChatSystem::new(&ctx, ChatCooldowns::default());
    let mut says = Box::pin(chat.says());
    let start = Instant::now();

    tokio::time::advance(Duration::from_secs(10)).await;
    let line = ChatLine::new(ChatType::Say, Guid(0x51), "well met");
    transport.inject(opcodes::SMSG_MESSAGECHAT, line.encode());

    let received = says.next().await.unwrap();
    assert_eq!(received.line.text, "well met");
    assert!(!received.gm);
    assert_eq!(received.received_at, start + Duration::from_secs(10));
}

#[tokio::test]
async fn test_join_channel_reverted_on_rejection() {
    let (transport, ctx) = setup();
    let chat = ChatSystem::new(&ctx, ChatCooldowns::default());
    let cancel = CancellationToken::new();

    chat.join_channel("Secret", "guess", &cancel).await.unwrap();
    assert!(chat.is_in_channel("secret"));

    let rejected = ChannelNotify::new(ChannelNotifyKind::WrongPassword, "Secret");
    transport.inject(opcodes::SMSG_CHANNEL_NOTIFY, rejected.encode());
    settle().await;

    assert!(!chat.is_in_channel("Secret"));
    assert!(chat.active_channels().is_empty());
}

#[tokio::test]
async fn test_join_channel_reverted_on_send_failure() {
    let (transport, ctx) = setup();
    let chat = ChatSystem::new(&ctx, ChatCooldowns::default());
    transport.disconnect();

    let err = chat
        .join_channel("Trade", "", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Transport(_)));
    assert!(!chat.is_in_channel("Trade"));
}

#[tokio::test]
async fn test_chat_errors_view_reports_rejection() {
    let (transport, ctx) = setup();
    let chat = ChatSystem::new(&ctx, ChatCooldowns::default());
    let mut errors = Box::pin(chat.errors());
    let mut events = Box::pin(chat.events());

    let banned = ChannelNotify::new(ChannelNotifyKind::Banned, "Trade");
    transport.inject(opcodes::SMSG_CHANNEL_NOTIFY, banned.encode());

    assert!(matches!(events.next().await, Some(ChatEvent::Channel(_))));
    let error = errors.next().await.unwrap();
    assert_eq!(
        error,
        emberlink_systems::chat::ChatError::ChannelRejected {
            channel: "Trade".into(),
            kind: ChannelNotifyKind::Banned,
        }
    );
}

// =========================================================================
// Spell
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_cast_refused_during_cooldown() {
    let (transport, ctx) = setup();
    let spells = SpellCastSystem::new(&ctx);
    let cancel = CancellationToken::new();

    let cooldown = SpellCooldown {
        caster: PLAYER,
        flags: 0,
        cooldowns: vec![(133, 1_500)],
    };
    transport.inject(opcodes::SMSG_SPELL_COOLDOWN, cooldown.encode());
    settle().await;

    let err = spells.cast(133, SpellTarget::Caster, &cancel).await.unwrap_err();
    assert!(err.is_precondition());
    assert!(transport.sent().is_empty());

    tokio::time::advance(Duration::from_millis(1_500)).await;
    spells.cast(133, SpellTarget::Caster, &cancel).await.unwrap();
    assert!(spells.is_casting());
    assert_eq!(spells.current_spell(), Some(133));
}

// =========================================================================
// Disposal
// =========================================================================

#[tokio::test]
async fn test_disposed_loot_ignores_inbound_and_refuses_commands() {
    let (transport, ctx) = setup();
    let loot = LootSystem::new(&ctx);
    let cancel = CancellationToken::new();
    let corpse = Guid(0x1234);

    loot.open(corpse, &cancel).await.unwrap();
    let response = LootResponse {
        source: corpse,
        loot_type: LootType::Corpse,
        gold: 10,
        items: vec![loot_item(0), loot_item(1)],
        error: None,
    };
    transport.inject(opcodes::SMSG_LOOT_RESPONSE, response.encode());
    settle().await;

    loot.dispose();
    assert!(loot.is_disposed());
    transport.clear_sent();

    transport.inject(opcodes::SMSG_LOOT_REMOVED, LootRemoved { slot: 0 }.encode());
    settle().await;
    assert_eq!(loot.available_loot().len(), 2);
    assert_eq!(loot.gold(), 10);

    let err = loot.take(0, &cancel).await.unwrap_err();
    assert!(matches!(err, SessionError::Disposed));
    assert!(matches!(loot.release(&cancel).await, Err(SessionError::Disposed)));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_disposed_chat_refuses_say() {
    let (transport, ctx) = setup();
    let chat = ChatSystem::new(&ctx, ChatCooldowns::default());
    chat.dispose();

    let err = chat.say("anyone?", &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, SessionError::Disposed));
    assert!(transport.sent().is_empty());
}
