//! Mailbox window and per-mail actions.
//!
//! Every per-mail command needs the mailbox open and the mail id present in
//! the last list; both are checked before anything is sent. Results come
//! back as `SMSG_SEND_MAIL_RESULT`: successes are applied to the cached
//! list, failures are published as [`MailEvent::Rejected`].

use std::collections::BTreeMap;

use emberlink_protocol::messages::mail::{
    DeleteMail, GetMailList, Mail, MailAction, MailMessage, MailSender, MarkMailRead, ReturnMail,
    SendMail, SendMailResult, TakeMailItem, TakeMailMoney, MAIL_FLAG_READ,
};
use emberlink_protocol::messages::object::UseGameObject;
use emberlink_protocol::{Guid, ServerMessage};
use emberlink_session::{compose, Phase, SessionError, WindowState};
use emberlink_transport::Transport;
use futures_util::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::base::SystemCore;
use crate::SystemContext;

/// An outgoing mail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailDraft {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub items: Vec<Guid>,
    pub money: u32,
    pub cod: u32,
}

impl MailDraft {
    pub fn new(recipient: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            ..Self::default()
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn attach(mut self, item: Guid) -> Self {
        self.items.push(item);
        self
    }

    pub fn money(mut self, copper: u32) -> Self {
        self.money = copper;
        self
    }

    pub fn cash_on_delivery(mut self, copper: u32) -> Self {
        self.cod = copper;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MailEvent {
    /// The list was rebuilt. `total` counts mails the server didn't send.
    Listed { total: u32, shown: usize },
    Succeeded(SendMailResult),
    Rejected(SendMailResult),
    /// New mail arrived, readable after `delay` seconds.
    NewMail { delay: f32 },
    Closed { mailbox: Option<Guid> },
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MailState {
    window: WindowState,
    mails: BTreeMap<u32, Mail>,
    total: u32,
}

impl MailState {
    fn close(&mut self) -> Option<Guid> {
        self.mails.clear();
        self.total = 0;
        self.window.close()
    }

    fn mail(&self, id: u32) -> Result<(Guid, &Mail), SessionError> {
        let mailbox = self.window.require_open("mailbox")?;
        let mail = self
            .mails
            .get(&id)
            .ok_or_else(|| SessionError::not_found("mail", id))?;
        Ok((mailbox, mail))
    }

    fn apply(&mut self, message: ServerMessage, events: &mut Vec<MailEvent>) {
        let ServerMessage::Mail(message) = message else {
            return;
        };
        match message {
            MailMessage::List(list) => {
                let Some(mailbox) = self.window.target() else {
                    debug!(mails = list.mails.len(), "mail list with no mailbox open, ignoring");
                    return;
                };
                self.window.confirm_open(mailbox);
                self.total = list.total;
                self.mails = list.mails.into_iter().map(|mail| (mail.id, mail)).collect();
                info!(%mailbox, shown = self.mails.len(), total = self.total, "mail list");
                events.push(MailEvent::Listed {
                    total: self.total,
                    shown: self.mails.len(),
                });
            }
            MailMessage::SendResult(result) if result.is_ok() => {
                self.apply_success(&result);
                events.push(MailEvent::Succeeded(result));
            }
            MailMessage::SendResult(result) => {
                debug!(mail_id = result.mail_id, action = ?result.action, result = ?result.result, "mail action rejected");
                events.push(MailEvent::Rejected(result));
            }
            MailMessage::Received(received) => {
                events.push(MailEvent::NewMail {
                    delay: received.delay,
                });
            }
        }
    }

    fn apply_success(&mut self, result: &SendMailResult) {
        match result.action {
            MailAction::MoneyTaken => {
                if let Some(mail) = self.mails.get_mut(&result.mail_id) {
                    mail.money = 0;
                }
            }
            MailAction::ItemTaken => {
                if let (Some(mail), Some((item_guid, _))) =
                    (self.mails.get_mut(&result.mail_id), result.item)
                {
                    mail.items.retain(|item| item.guid_low != item_guid);
                }
            }
            MailAction::Deleted | MailAction::ReturnedToSender => {
                if self.mails.remove(&result.mail_id).is_some() {
                    self.total = self.total.saturating_sub(1);
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

pub struct MailboxSystem<T> {
    core: SystemCore<T, MailState, MailEvent>,
}

impl<T: Transport> MailboxSystem<T> {
    pub fn new(ctx: &SystemContext<T>) -> Self {
        Self {
            core: SystemCore::start(
                ctx,
                "mailbox",
                MailState::default(),
                MailMessage::OPCODES,
                MailState::apply,
            ),
        }
    }

    /// Uses the `mailbox` object and asks for the list.
    pub async fn open(&self, mailbox: Guid, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.core.send(&UseGameObject(mailbox), cancel).await?;
        let previous = self.core.cell.update(|state| {
            let previous = std::mem::take(state);
            state.window.begin_open(mailbox);
            previous
        });
        if let Err(e) = self.core.send(&GetMailList(mailbox), cancel).await {
            debug!(%mailbox, error = %e, "mail list request failed, keeping previous mailbox");
            self.core.cell.update(|state| *state = previous);
            return Err(e);
        }
        Ok(())
    }

    /// Asks for the list again.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<(), SessionError> {
        let mailbox = self
            .core
            .cell
            .read(|state| state.window.target())
            .ok_or_else(|| SessionError::not_open("mailbox"))?;
        self.core.send(&GetMailList(mailbox), cancel).await
    }

    pub async fn take_money(&self, id: u32, cancel: &CancellationToken) -> Result<(), SessionError> {
        let mailbox = self.core.cell.read(|state| {
            let (mailbox, mail) = state.mail(id)?;
            if mail.money == 0 {
                return Err(SessionError::not_allowed("mail carries no money"));
            }
            Ok(mailbox)
        })?;
        self.core
            .send(&TakeMailMoney { mailbox, mail_id: id }, cancel)
            .await
    }

    /// Takes the attachment whose item GUID low part is `item_guid`.
    pub async fn take_item(
        &self,
        id: u32,
        item_guid: u32,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let mailbox = self.core.cell.read(|state| {
            let (mailbox, mail) = state.mail(id)?;
            if !mail.items.iter().any(|item| item.guid_low == item_guid) {
                return Err(SessionError::not_found("mail item", item_guid));
            }
            Ok(mailbox)
        })?;
        let packet = TakeMailItem {
            mailbox,
            mail_id: id,
            item_guid,
        };
        self.core.send(&packet, cancel).await
    }

    /// Marks a mail read. The flag is set locally once the send succeeds;
    /// the server doesn't answer this one.
    pub async fn mark_read(&self, id: u32, cancel: &CancellationToken) -> Result<(), SessionError> {
        let mailbox = self.core.cell.read(|state| state.mail(id).map(|(mailbox, _)| mailbox))?;
        self.core
            .send(&MarkMailRead { mailbox, mail_id: id }, cancel)
            .await?;
        self.core.cell.update(|state| {
            if let Some(mail) = state.mails.get_mut(&id) {
                mail.flags |= MAIL_FLAG_READ;
            }
        });
        Ok(())
    }

    pub async fn delete(&self, id: u32, cancel: &CancellationToken) -> Result<(), SessionError> {
        let packet = self.core.cell.read(|state| {
            let (mailbox, mail) = state.mail(id)?;
            Ok::<_, SessionError>(DeleteMail {
                mailbox,
                mail_id: id,
                template_id: mail.template_id,
            })
        })?;
        self.core.send(&packet, cancel).await
    }

    /// Sends a player's mail back. Mail from NPCs or the auction house
    /// can't be returned.
    pub async fn return_to_sender(
        &self,
        id: u32,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let packet = self.core.cell.read(|state| {
            let (mailbox, mail) = state.mail(id)?;
            match mail.sender {
                MailSender::Player(sender) => Ok(ReturnMail {
                    mailbox,
                    mail_id: id,
                    sender,
                }),
                MailSender::Entry(_) => Err(SessionError::not_allowed(
                    "only player mail can be returned",
                )),
            }
        })?;
        self.core.send(&packet, cancel).await
    }

    pub async fn send_mail(
        &self,
        draft: MailDraft,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let mailbox = self
            .core
            .cell
            .read(|state| state.window.require_open("mailbox"))?;
        let packet = SendMail {
            mailbox,
            recipient: draft.recipient,
            subject: draft.subject,
            body: draft.body,
            items: draft.items,
            money: draft.money,
            cod: draft.cod,
        };
        self.core.send(&packet, cancel).await
    }

    /// Closes the mailbox locally and drops the cached list.
    pub fn close(&self) -> Result<(), SessionError> {
        self.core.cell.ensure_live()?;
        let mailbox = self.core.cell.update(MailState::close);
        if mailbox.is_some() {
            self.core.cell.emit(MailEvent::Closed { mailbox });
        }
        Ok(())
    }

    // -- queries ------------------------------------------------------------

    pub fn is_open(&self) -> bool {
        self.core.cell.read(|state| state.window.is_open())
    }

    pub fn phase(&self) -> Phase {
        self.core.cell.read(|state| state.window.phase())
    }

    pub fn current_target(&self) -> Option<Guid> {
        self.core.cell.read(|state| state.window.target())
    }

    /// Mails from the last list, by id.
    pub fn mails(&self) -> Vec<Mail> {
        self.core.cell.read(|state| state.mails.values().cloned().collect())
    }

    pub fn mail(&self, id: u32) -> Option<Mail> {
        self.core.cell.read(|state| state.mails.get(&id).cloned())
    }

    pub fn unread_count(&self) -> usize {
        self.core
            .cell
            .read(|state| state.mails.values().filter(|mail| !mail.is_read()).count())
    }

    // -- views --------------------------------------------------------------

    pub fn events(&self) -> impl Stream<Item = MailEvent> + Send + 'static {
        self.core.events()
    }

    pub fn rejections(&self) -> impl Stream<Item = SendMailResult> + Send + 'static {
        compose::projected(self.events(), |event| match event {
            MailEvent::Rejected(result) => Some(result),
            _ => None,
        })
    }

    // -- lifecycle ----------------------------------------------------------

    pub fn dispose(&self) {
        self.core.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

#[cfg(test)]
mod tests {
    use emberlink_protocol::messages::mail::{MailItem, MailListResult, MailResult};

    use super::*;

    const MAILBOX: Guid = Guid(0xF110_0000_0000_0777);

    fn open_with(state: &mut MailState, mails: Vec<Mail>) {
        state.window.begin_open(MAILBOX);
        let list = MailListResult {
            total: mails.len() as u32,
            mails,
        };
        state.apply(ServerMessage::Mail(MailMessage::List(list)), &mut Vec::new());
    }

    fn result(mail_id: u32, action: MailAction, result: MailResult) -> ServerMessage {
        ServerMessage::Mail(MailMessage::SendResult(SendMailResult::new(mail_id, action, result)))
    }

    #[test]
    fn test_list_ignored_when_closed() {
        let mut state = MailState::default();
        let list = MailListResult {
            total: 1,
            mails: vec![Mail::new(1, Guid(5), "hi")],
        };
        state.apply(ServerMessage::Mail(MailMessage::List(list)), &mut Vec::new());
        assert!(state.mails.is_empty());
        assert_eq!(state.window.phase(), Phase::Closed);
    }

    #[test]
    fn test_list_opens_window() {
        let mut state = MailState::default();
        open_with(&mut state, vec![Mail::new(1, Guid(5), "a"), Mail::new(2, Guid(6), "b")]);
        assert_eq!(state.window.phase(), Phase::Open);
        assert_eq!(state.mails.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_successful_results_update_cache() {
        let mut state = MailState::default();
        let mut with_money = Mail::new(1, Guid(5), "gold");
        with_money.money = 500;
        let mut with_item = Mail::new(2, Guid(5), "sword");
        with_item.items.push(MailItem::new(0, 0x4001, 2589, 1));
        open_with(&mut state, vec![with_money, with_item, Mail::new(3, Guid(5), "junk")]);

        state.apply(result(1, MailAction::MoneyTaken, MailResult::Ok), &mut Vec::new());
        let mut taken = SendMailResult::new(2, MailAction::ItemTaken, MailResult::Ok);
        taken.item = Some((0x4001, 1));
        state.apply(ServerMessage::Mail(MailMessage::SendResult(taken)), &mut Vec::new());
        state.apply(result(3, MailAction::Deleted, MailResult::Ok), &mut Vec::new());

        assert_eq!(state.mails[&1].money, 0);
        assert!(state.mails[&2].items.is_empty());
        assert!(!state.mails.contains_key(&3));
    }

    #[test]
    fn test_rejection_leaves_cache_alone() {
        let mut state = MailState::default();
        open_with(&mut state, vec![Mail::new(3, Guid(5), "junk")]);

        let mut events = Vec::new();
        state.apply(result(3, MailAction::Deleted, MailResult::InternalError), &mut events);

        assert!(state.mails.contains_key(&3));
        assert!(matches!(events.as_slice(), [MailEvent::Rejected(_)]));
    }

    #[test]
    fn test_mail_lookup_requires_open_window() {
        let state = MailState::default();
        let err = state.mail(1).unwrap_err();
        assert!(err.is_precondition());
    }
}
