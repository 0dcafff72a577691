//! Mailbox messages.

use emberlink_transport::Opcode;

use crate::opcodes::{
    CMSG_GET_MAIL_LIST, CMSG_MAIL_DELETE, CMSG_MAIL_MARK_AS_READ, CMSG_MAIL_RETURN_TO_SENDER,
    CMSG_MAIL_TAKE_ITEM, CMSG_MAIL_TAKE_MONEY, CMSG_SEND_MAIL, SMSG_MAIL_LIST_RESULT,
    SMSG_RECEIVED_MAIL, SMSG_SEND_MAIL_RESULT,
};
use crate::packet::{guid_client_packet, wire_enum, ClientPacket, ServerPacket};
use crate::wire::{check_cstring, Decoded, WireReader, WireWriter};
use crate::{Guid, ProtocolError};

pub const MAX_MAIL_RECIPIENT: usize = 48;
pub const MAX_MAIL_SUBJECT: usize = 64;
pub const MAX_MAIL_BODY: usize = 500;
pub const MAX_MAIL_ITEMS: usize = 12;
/// Stationery used for player mail.
pub const DEFAULT_STATIONERY: u32 = 41;

pub const MAIL_FLAG_READ: u32 = 0x01;
pub const MAIL_FLAG_RETURNED: u32 = 0x02;
pub const MAIL_FLAG_COPIED: u32 = 0x04;
pub const MAIL_FLAG_COD_PAYMENT: u32 = 0x08;
pub const MAIL_FLAG_HAS_BODY: u32 = 0x10;

wire_enum! {
    /// Where a mail came from.
    pub enum MailType: u8 {
        Normal = 0,
        Auction = 2,
        Creature = 3,
        GameObject = 4,
        Item = 5,
    }
}

wire_enum! {
    /// The mailbox action a send-mail result answers.
    pub enum MailAction: u32 {
        Send = 0,
        MoneyTaken = 1,
        ItemTaken = 2,
        ReturnedToSender = 3,
        Deleted = 4,
        MadePermanent = 5,
    }
}

wire_enum! {
    /// Outcome of a mailbox action.
    pub enum MailResult: u32 {
        Ok = 0,
        EquipError = 1,
        CannotSendToSelf = 2,
        NotEnoughMoney = 3,
        RecipientNotFound = 4,
        NotYourTeam = 5,
        InternalError = 6,
        DisabledForTrialAccount = 14,
        RecipientCapReached = 15,
        CantSendWrappedCod = 16,
        MailAndChatSuspended = 17,
        TooManyAttachments = 18,
        AttachmentInvalid = 19,
        ItemHasExpired = 21,
    }
}

/// The sender of a mail: a player GUID for normal mail, an entry id for
/// everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailSender {
    Player(Guid),
    Entry(u32),
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// An item attached to a mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailItem {
    pub index: u8,
    pub guid_low: u32,
    pub entry: u32,
    /// `(id, duration, charges)` per enchantment slot.
    pub enchantments: [(u32, u32, u32); 7],
    pub random_property: i32,
    pub suffix: u32,
    pub count: u32,
    pub spell_charges: u32,
    pub max_durability: u32,
    pub durability: u32,
    pub locked: bool,
}

impl MailItem {
    const WIRE_LEN: usize = 118;

    pub fn new(index: u8, guid_low: u32, entry: u32, count: u32) -> Self {
        Self {
            index,
            guid_low,
            entry,
            enchantments: [(0, 0, 0); 7],
            random_property: 0,
            suffix: 0,
            count,
            spell_charges: 0,
            max_durability: 0,
            durability: 0,
            locked: false,
        }
    }

    fn read(r: &mut WireReader<'_>) -> Self {
        let mut item = Self::new(r.u8(), r.u32(), r.u32(), 0);
        for slot in &mut item.enchantments {
            *slot = (r.u32(), r.u32(), r.u32());
        }
        item.random_property = r.i32();
        item.suffix = r.u32();
        item.count = r.u32();
        item.spell_charges = r.u32();
        item.max_durability = r.u32();
        item.durability = r.u32();
        item.locked = r.bool();
        item
    }

    fn write(&self, w: &mut WireWriter) {
        w.u8(self.index).u32(self.guid_low).u32(self.entry);
        for (id, duration, charges) in self.enchantments {
            w.u32(id).u32(duration).u32(charges);
        }
        w.i32(self.random_property)
            .u32(self.suffix)
            .u32(self.count)
            .u32(self.spell_charges)
            .u32(self.max_durability)
            .u32(self.durability)
            .bool(self.locked);
    }
}

/// One mail in the mailbox.
#[derive(Debug, Clone, PartialEq)]
pub struct Mail {
    pub id: u32,
    pub mail_type: MailType,
    pub sender: MailSender,
    pub cod: u32,
    pub package: u32,
    pub stationery: u32,
    pub money: u32,
    pub flags: u32,
    pub days_left: f32,
    pub template_id: u32,
    pub subject: String,
    pub body: String,
    pub items: Vec<MailItem>,
}

impl Mail {
    /// A plain player mail with no attachments.
    pub fn new(id: u32, sender: Guid, subject: impl Into<String>) -> Self {
        Self {
            id,
            mail_type: MailType::Normal,
            sender: MailSender::Player(sender),
            cod: 0,
            package: 0,
            stationery: DEFAULT_STATIONERY,
            money: 0,
            flags: 0,
            days_left: 30.0,
            template_id: 0,
            subject: subject.into(),
            body: String::new(),
            items: Vec::new(),
        }
    }

    pub fn is_read(&self) -> bool {
        self.flags & MAIL_FLAG_READ != 0
    }

    fn read(r: &mut WireReader<'_>) -> Self {
        let id = r.u32();
        let mail_type = MailType::from_raw(r.u8());
        let sender = match mail_type {
            MailType::Normal => MailSender::Player(r.guid()),
            _ => MailSender::Entry(r.u32()),
        };
        let mut mail = Self {
            id,
            mail_type,
            sender,
            cod: r.u32(),
            package: r.u32(),
            stationery: r.u32(),
            money: r.u32(),
            flags: r.u32(),
            days_left: r.f32(),
            template_id: r.u32(),
            subject: r.cstring(),
            body: r.cstring(),
            items: Vec::new(),
        };
        let count = usize::from(r.u8());
        mail.items = r.list(count, MailItem::WIRE_LEN, MailItem::read);
        mail
    }

    fn write(&self, w: &mut WireWriter) {
        w.u32(self.id).u8(self.mail_type.raw());
        match self.sender {
            MailSender::Player(guid) => w.guid(guid),
            MailSender::Entry(entry) => w.u32(entry),
        };
        let count = u8::try_from(self.items.len()).unwrap_or(u8::MAX);
        w.u32(self.cod)
            .u32(self.package)
            .u32(self.stationery)
            .u32(self.money)
            .u32(self.flags)
            .f32(self.days_left)
            .u32(self.template_id)
            .cstring(&self.subject)
            .cstring(&self.body)
            .u8(count);
        for item in self.items.iter().take(usize::from(count)) {
            item.write(w);
        }
    }
}

/// The mailbox contents. Each list replaces the previous one wholesale.
///
/// ```text
/// u32 total, u8 shown, shown × (u16 size, mail within size bytes)
/// mail: u32 id, u8 type, sender (u64 when normal, u32 entry otherwise),
///       u32 cod, u32 package, u32 stationery, u32 money, u32 flags,
///       f32 daysLeft, u32 template, cstring subject, cstring body,
///       u8 itemCount, itemCount × item
/// item: u8 index, u32 guidLow, u32 entry, 7 × (u32 enchant, u32 duration,
///       u32 charges), i32 randomProperty, u32 suffix, u32 count,
///       u32 spellCharges, u32 maxDurability, u32 durability, u8 locked
/// ```
///
/// A mail that is malformed inside its size bound is dropped and the list
/// marked truncated; decoding resumes at the next mail.
#[derive(Debug, Clone, PartialEq)]
pub struct MailListResult {
    pub total: u32,
    pub mails: Vec<Mail>,
}

impl ServerPacket for MailListResult {
    const OPCODE: Opcode = SMSG_MAIL_LIST_RESULT;

    fn read(r: &mut WireReader<'_>) -> Self {
        let total = r.u32();
        let shown = usize::from(r.u8());
        let mut mails = Vec::with_capacity(shown.min(r.remaining() / 2));
        let mut damaged = false;
        for _ in 0..shown {
            if r.remaining() < 2 {
                r.mark_truncated();
                break;
            }
            let size = usize::from(r.u16());
            let mut inner = r.sub(size);
            if r.is_truncated() {
                break;
            }
            let mail = Mail::read(&mut inner);
            if inner.is_truncated() {
                tracing::debug!(id = mail.id, size, "dropping malformed mail");
                damaged = true;
                continue;
            }
            mails.push(mail);
        }
        if damaged {
            r.mark_truncated();
        }
        Self { total, mails }
    }

    fn write(&self, w: &mut WireWriter) {
        let shown = u8::try_from(self.mails.len()).unwrap_or(u8::MAX);
        w.u32(self.total).u8(shown);
        for mail in self.mails.iter().take(usize::from(shown)) {
            let mut body = WireWriter::new();
            mail.write(&mut body);
            let body = body.finish();
            w.u16(u16::try_from(body.len()).unwrap_or(u16::MAX)).bytes(&body);
        }
    }
}

/// Result of a mailbox action.
///
/// ```text
/// u32 mail, u32 action, u32 error,
///   error == equip error:  u32 equipError
///   action == item taken:  u32 itemGuid, u32 count
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendMailResult {
    pub mail_id: u32,
    pub action: MailAction,
    pub result: MailResult,
    pub equip_error: Option<u32>,
    /// `(item guid, count)` for a taken item.
    pub item: Option<(u32, u32)>,
}

impl SendMailResult {
    pub fn new(mail_id: u32, action: MailAction, result: MailResult) -> Self {
        Self {
            mail_id,
            action,
            result,
            equip_error: None,
            item: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result == MailResult::Ok
    }
}

impl ServerPacket for SendMailResult {
    const OPCODE: Opcode = SMSG_SEND_MAIL_RESULT;

    fn read(r: &mut WireReader<'_>) -> Self {
        let mut result = Self::new(
            r.u32(),
            MailAction::from_raw(r.u32()),
            MailResult::from_raw(r.u32()),
        );
        if result.result == MailResult::EquipError {
            result.equip_error = Some(r.u32());
        } else if result.action == MailAction::ItemTaken {
            result.item = Some((r.u32(), r.u32()));
        }
        result
    }

    fn write(&self, w: &mut WireWriter) {
        w.u32(self.mail_id).u32(self.action.raw()).u32(self.result.raw());
        if self.result == MailResult::EquipError {
            w.u32(self.equip_error.unwrap_or_default());
        } else if self.action == MailAction::ItemTaken {
            let (guid, count) = self.item.unwrap_or_default();
            w.u32(guid).u32(count);
        }
    }
}

/// New mail arrived: `f32 delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceivedMail {
    pub delay: f32,
}

impl ServerPacket for ReceivedMail {
    const OPCODE: Opcode = SMSG_RECEIVED_MAIL;

    fn read(r: &mut WireReader<'_>) -> Self {
        Self { delay: r.f32() }
    }

    fn write(&self, w: &mut WireWriter) {
        w.f32(self.delay);
    }
}

/// Every mail-category server message.
#[derive(Debug, Clone, PartialEq)]
pub enum MailMessage {
    List(MailListResult),
    SendResult(SendMailResult),
    Received(ReceivedMail),
}

impl MailMessage {
    pub const OPCODES: &'static [Opcode] =
        &[SMSG_MAIL_LIST_RESULT, SMSG_SEND_MAIL_RESULT, SMSG_RECEIVED_MAIL];

    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Option<Decoded<Self>> {
        Some(match opcode {
            SMSG_MAIL_LIST_RESULT => MailListResult::decode(bytes).map(Self::List),
            SMSG_SEND_MAIL_RESULT => SendMailResult::decode(bytes).map(Self::SendResult),
            SMSG_RECEIVED_MAIL => ReceivedMail::decode(bytes).map(Self::Received),
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

guid_client_packet! {
    /// Requests the mail list from a mailbox.
    GetMailList => CMSG_GET_MAIL_LIST
}

/// Per-mail actions: `u64 mailbox, u32 mail`.
macro_rules! mail_action_packet {
    ($(#[$meta:meta])* $name:ident => $opcode:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            pub mailbox: Guid,
            pub mail_id: u32,
        }

        impl ClientPacket for $name {
            const OPCODE: Opcode = $opcode;

            fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
                w.guid(self.mailbox).u32(self.mail_id);
                Ok(())
            }
        }
    };
}

mail_action_packet! {
    /// Takes a mail's money.
    TakeMailMoney => CMSG_MAIL_TAKE_MONEY
}

mail_action_packet! {
    /// Marks a mail read.
    MarkMailRead => CMSG_MAIL_MARK_AS_READ
}

/// Takes one attached item: `u64 mailbox, u32 mail, u32 itemGuid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TakeMailItem {
    pub mailbox: Guid,
    pub mail_id: u32,
    pub item_guid: u32,
}

impl ClientPacket for TakeMailItem {
    const OPCODE: Opcode = CMSG_MAIL_TAKE_ITEM;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.guid(self.mailbox).u32(self.mail_id).u32(self.item_guid);
        Ok(())
    }
}

/// Sends a mail back: `u64 mailbox, u32 mail, u64 sender`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnMail {
    pub mailbox: Guid,
    pub mail_id: u32,
    pub sender: Guid,
}

impl ClientPacket for ReturnMail {
    const OPCODE: Opcode = CMSG_MAIL_RETURN_TO_SENDER;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.guid(self.mailbox).u32(self.mail_id).guid(self.sender);
        Ok(())
    }
}

/// Deletes a mail: `u64 mailbox, u32 mail, u32 template`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteMail {
    pub mailbox: Guid,
    pub mail_id: u32,
    pub template_id: u32,
}

impl ClientPacket for DeleteMail {
    const OPCODE: Opcode = CMSG_MAIL_DELETE;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.guid(self.mailbox).u32(self.mail_id).u32(self.template_id);
        Ok(())
    }
}

/// Composes a new mail.
///
/// ```text
/// u64 mailbox, cstring recipient, cstring subject, cstring body,
/// u32 stationery, u32 0, u8 itemCount, itemCount × (u8 index, u64 item),
/// u32 money, u32 cod, u64 0, u8 0
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMail {
    pub mailbox: Guid,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub items: Vec<Guid>,
    pub money: u32,
    pub cod: u32,
}

impl ClientPacket for SendMail {
    const OPCODE: Opcode = CMSG_SEND_MAIL;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        if self.recipient.is_empty() {
            return Err(ProtocolError::Empty("recipient"));
        }
        check_cstring("recipient", &self.recipient, MAX_MAIL_RECIPIENT)?;
        check_cstring("subject", &self.subject, MAX_MAIL_SUBJECT)?;
        check_cstring("body", &self.body, MAX_MAIL_BODY)?;
        if self.items.len() > MAX_MAIL_ITEMS {
            return Err(ProtocolError::InvalidArgument(format!(
                "{} attachments, limit is {MAX_MAIL_ITEMS}",
                self.items.len()
            )));
        }
        if self.cod > 0 && self.items.is_empty() {
            return Err(ProtocolError::InvalidArgument(
                "cash on delivery needs an attachment".into(),
            ));
        }

        w.guid(self.mailbox)
            .cstring(&self.recipient)
            .cstring(&self.subject)
            .cstring(&self.body)
            .u32(DEFAULT_STATIONERY)
            .u32(0)
            .u8(self.items.len() as u8);
        for (index, item) in self.items.iter().enumerate() {
            w.u8(index as u8).guid(*item);
        }
        w.u32(self.money).u32(self.cod).u64(0).u8(0);
        Ok(())
    }
}
