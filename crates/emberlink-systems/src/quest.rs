//! Quest giver dialogs.

use std::collections::HashMap;

use emberlink_protocol::messages::gossip::GossipMessage;
use emberlink_protocol::messages::quest::{
    AcceptQuest, CancelQuestDialog, ChooseQuestReward, CompleteQuest, QueryQuest,
    QueryQuestGiverStatus, QuestComplete, QuestDetails, QuestFailed, QuestGiverHello,
    QuestGiverStatus, QuestGiverStatusUpdate, QuestList, QuestMessage, QuestOfferReward,
    QuestRequestItems, RemoveQuestFromLog, RequestQuestReward,
};
use emberlink_protocol::{opcodes, ClientPacket, Guid, ServerMessage};
use emberlink_session::{compose, Phase, SessionError, WindowState};
use emberlink_transport::Transport;
use futures_util::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::base::SystemCore;
use crate::SystemContext;

/// The dialog page a quest giver is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestDialog {
    List(QuestList),
    Details(QuestDetails),
    RequestItems(QuestRequestItems),
    OfferReward(QuestOfferReward),
}

impl QuestDialog {
    pub fn npc(&self) -> Guid {
        match self {
            Self::List(list) => list.npc,
            Self::Details(details) => details.npc,
            Self::RequestItems(request) => request.npc,
            Self::OfferReward(offer) => offer.npc,
        }
    }

    /// The quest the page is about; `None` for a list.
    pub fn quest_id(&self) -> Option<u32> {
        match self {
            Self::List(_) => None,
            Self::Details(details) => Some(details.quest_id),
            Self::RequestItems(request) => Some(request.quest_id),
            Self::OfferReward(offer) => Some(offer.quest_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestEvent {
    Dialog(QuestDialog),
    Completed(QuestComplete),
    /// The server refused the last quest action.
    Invalid { reason: u32 },
    Failed(QuestFailed),
    GiverStatus(QuestGiverStatusUpdate),
    Closed { npc: Option<Guid> },
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct QuestState {
    window: WindowState,
    dialog: Option<QuestDialog>,
    giver_status: HashMap<Guid, QuestGiverStatus>,
}

impl QuestState {
    fn close(&mut self) -> Option<Guid> {
        self.dialog = None;
        let npc = self.window.close();
        self.forget_other_givers(npc);
        npc
    }

    /// Keeps only the cached giver status of `npc`.
    fn forget_other_givers(&mut self, npc: Option<Guid>) {
        self.giver_status.retain(|giver, _| Some(*giver) == npc);
    }

    fn show(&mut self, dialog: QuestDialog, events: &mut Vec<QuestEvent>) {
        let npc = dialog.npc();
        let solicited = self.window.confirm_open(npc);
        if self.dialog.as_ref().map(QuestDialog::npc) != Some(npc) {
            self.forget_other_givers(Some(npc));
        }
        info!(%npc, quest_id = ?dialog.quest_id(), solicited, "quest dialog");
        self.dialog = Some(dialog.clone());
        events.push(QuestEvent::Dialog(dialog));
    }

    fn apply(&mut self, message: ServerMessage, events: &mut Vec<QuestEvent>) {
        let message = match message {
            ServerMessage::Quest(message) => message,
            ServerMessage::Gossip(GossipMessage::Complete) => {
                if self.window.phase() != Phase::Closed {
                    let npc = self.close();
                    events.push(QuestEvent::Closed { npc });
                }
                return;
            }
            _ => return,
        };

        match message {
            QuestMessage::List(list) => self.show(QuestDialog::List(list), events),
            QuestMessage::Details(details) => self.show(QuestDialog::Details(details), events),
            QuestMessage::RequestItems(request) => {
                self.show(QuestDialog::RequestItems(request), events);
            }
            QuestMessage::OfferReward(offer) => {
                self.show(QuestDialog::OfferReward(offer), events);
            }
            QuestMessage::Complete(complete) => {
                let npc = self.close();
                info!(quest_id = complete.quest_id, xp = complete.xp, money = complete.money, "quest completed");
                events.push(QuestEvent::Completed(complete));
                events.push(QuestEvent::Closed { npc });
            }
            QuestMessage::Invalid(invalid) => {
                debug!(reason = invalid.reason, "quest action refused");
                self.dialog = None;
                self.window.fail();
                events.push(QuestEvent::Invalid {
                    reason: invalid.reason,
                });
            }
            QuestMessage::Failed(failed) => events.push(QuestEvent::Failed(failed)),
            QuestMessage::GiverStatus(update) => {
                self.giver_status.insert(update.npc, update.status);
                events.push(QuestEvent::GiverStatus(update));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

pub struct QuestSystem<T> {
    core: SystemCore<T, QuestState, QuestEvent>,
}

impl<T: Transport> QuestSystem<T> {
    pub fn new(ctx: &SystemContext<T>) -> Self {
        let subscribed = [QuestMessage::OPCODES, &[opcodes::SMSG_GOSSIP_COMPLETE]].concat();
        Self {
            core: SystemCore::start(
                ctx,
                "quest",
                QuestState::default(),
                &subscribed,
                QuestState::apply,
            ),
        }
    }

    fn open_target(&self) -> Result<Guid, SessionError> {
        self.core.cell.read(|state| state.window.require_open("quest"))
    }

    /// Sends `packet` for the open dialog, then waits for the next page.
    async fn step<P: ClientPacket>(
        &self,
        packet: &P,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.core.send(packet, cancel).await?;
        self.core.cell.update(|state| state.window.begin_wait());
        Ok(())
    }

    // -- commands -----------------------------------------------------------

    pub async fn talk(&self, npc: Guid, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.core.send(&QuestGiverHello(npc), cancel).await?;
        self.core.cell.update(|state| {
            if !(state.window.is_open() && state.window.target() == Some(npc)) {
                state.dialog = None;
                state.window.begin_open(npc);
            }
        });
        Ok(())
    }

    /// Asks the open giver for a quest's details.
    pub async fn query(&self, quest_id: u32, cancel: &CancellationToken) -> Result<(), SessionError> {
        let npc = self.open_target()?;
        self.step(&QueryQuest { npc, quest_id }, cancel).await
    }

    /// Accepts the quest whose details are showing.
    pub async fn accept(&self, quest_id: u32, cancel: &CancellationToken) -> Result<(), SessionError> {
        let npc = self.core.cell.read(|state| {
            let npc = state.window.require_open("quest")?;
            match &state.dialog {
                Some(QuestDialog::Details(details)) if details.quest_id == quest_id => Ok(npc),
                _ => Err(SessionError::not_found("quest details", quest_id)),
            }
        })?;
        self.core.send(&AcceptQuest { npc, quest_id }, cancel).await
    }

    /// Turns a quest in; the giver answers with its item request or reward.
    pub async fn complete(
        &self,
        quest_id: u32,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let npc = self.open_target()?;
        self.step(&CompleteQuest { npc, quest_id }, cancel).await
    }

    pub async fn request_reward(
        &self,
        quest_id: u32,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let npc = self.open_target()?;
        self.step(&RequestQuestReward { npc, quest_id }, cancel).await
    }

    /// Picks reward `choice` from the offer that is showing. Offers without
    /// choices accept only index 0.
    pub async fn choose_reward(
        &self,
        quest_id: u32,
        choice: u32,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let npc = self.core.cell.read(|state| {
            let npc = state.window.require_open("quest")?;
            let Some(QuestDialog::OfferReward(offer)) = &state.dialog else {
                return Err(SessionError::not_found("quest reward offer", quest_id));
            };
            if offer.quest_id != quest_id {
                return Err(SessionError::not_found("quest reward offer", quest_id));
            }
            let choices = offer.rewards.choices.len().max(1);
            if choice as usize >= choices {
                return Err(SessionError::not_found("quest reward choice", choice));
            }
            Ok(npc)
        })?;
        let packet = ChooseQuestReward {
            npc,
            quest_id,
            choice,
        };
        self.step(&packet, cancel).await
    }

    /// Closes the dialog on both sides.
    pub async fn cancel(&self, cancel: &CancellationToken) -> Result<(), SessionError> {
        if self.core.cell.read(|state| state.window.target()).is_none() {
            return Err(SessionError::not_open("quest"));
        }
        self.core.send(&CancelQuestDialog, cancel).await?;
        let npc = self.core.cell.update(QuestState::close);
        self.core.cell.emit(QuestEvent::Closed { npc });
        Ok(())
    }

    /// Drops the quest in log `slot`. Needs no dialog.
    pub async fn abandon(&self, slot: u8, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.core.send(&RemoveQuestFromLog { slot }, cancel).await
    }

    /// Asks for the marker over `npc`. Needs no dialog.
    pub async fn query_status(
        &self,
        npc: Guid,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.core.send(&QueryQuestGiverStatus(npc), cancel).await
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

    pub fn dialog(&self) -> Option<QuestDialog> {
        self.core.cell.read(|state| state.dialog.clone())
    }

    pub fn giver_status(&self, npc: Guid) -> Option<QuestGiverStatus> {
        self.core.cell.read(|state| state.giver_status.get(&npc).copied())
    }

    // -- views --------------------------------------------------------------

    pub fn events(&self) -> impl Stream<Item = QuestEvent> + Send + 'static {
        self.core.events()
    }

    pub fn dialogs(&self) -> impl Stream<Item = QuestDialog> + Send + 'static {
        compose::projected(self.events(), |event| match event {
            QuestEvent::Dialog(dialog) => Some(dialog),
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
    use emberlink_protocol::messages::quest::{QuestInvalid, QuestRewards};

    use super::*;

    const NPC: Guid = Guid(0xF130_0000_0000_0BEE);

    fn details(quest_id: u32) -> QuestDetails {
        QuestDetails {
            npc: NPC,
            quest_id,
            title: "Wolves Across the Border".into(),
            details: String::new(),
            objectives: String::new(),
            auto_accept: false,
            rewards: QuestRewards::default(),
        }
    }

    #[test]
    fn test_details_confirms_and_ends_wait() {
        let mut state = QuestState::default();
        state.window.begin_open(NPC);
        state.apply(ServerMessage::Quest(QuestMessage::Details(details(33))), &mut Vec::new());
        assert_eq!(state.window.phase(), Phase::Open);

        state.window.begin_wait();
        state.apply(ServerMessage::Quest(QuestMessage::Details(details(34))), &mut Vec::new());
        assert_eq!(state.window.phase(), Phase::Open);
        assert_eq!(state.dialog.as_ref().and_then(QuestDialog::quest_id), Some(34));
    }

    #[test]
    fn test_invalid_sets_error() {
        let mut state = QuestState::default();
        state.apply(ServerMessage::Quest(QuestMessage::Details(details(33))), &mut Vec::new());
        let mut events = Vec::new();
        state.apply(
            ServerMessage::Quest(QuestMessage::Invalid(QuestInvalid { reason: 7 })),
            &mut events,
        );
        assert_eq!(state.window.phase(), Phase::Error);
        assert!(state.dialog.is_none());
        assert_eq!(events, vec![QuestEvent::Invalid { reason: 7 }]);
    }

    #[test]
    fn test_gossip_complete_closes_dialog() {
        let mut state = QuestState::default();
        state.apply(ServerMessage::Quest(QuestMessage::Details(details(33))), &mut Vec::new());
        let mut events = Vec::new();
        state.apply(ServerMessage::Gossip(GossipMessage::Complete), &mut events);
        assert_eq!(state.window.phase(), Phase::Closed);
        assert_eq!(events, vec![QuestEvent::Closed { npc: Some(NPC) }]);
    }

    #[test]
    fn test_giver_status_cached() {
        let mut state = QuestState::default();
        let update = QuestGiverStatusUpdate {
            npc: NPC,
            status: QuestGiverStatus::Available,
        };
        state.apply(ServerMessage::Quest(QuestMessage::GiverStatus(update)), &mut Vec::new());
        assert_eq!(state.giver_status.get(&NPC), Some(&QuestGiverStatus::Available));
    }

    fn status(npc: Guid, status: QuestGiverStatus) -> ServerMessage {
        ServerMessage::Quest(QuestMessage::GiverStatus(QuestGiverStatusUpdate { npc, status }))
    }

    #[test]
    fn test_dialog_for_new_npc_drops_other_giver_status() {
        const OTHER: Guid = Guid(0xF130_0000_0000_0CAF);
        let mut state = QuestState::default();
        state.apply(status(NPC, QuestGiverStatus::Available), &mut Vec::new());
        state.apply(status(OTHER, QuestGiverStatus::Reward), &mut Vec::new());

        state.apply(ServerMessage::Quest(QuestMessage::Details(details(33))), &mut Vec::new());
        assert_eq!(state.giver_status, HashMap::from([(NPC, QuestGiverStatus::Available)]));

        state.apply(status(OTHER, QuestGiverStatus::Reward), &mut Vec::new());
        state.apply(ServerMessage::Quest(QuestMessage::Details(details(34))), &mut Vec::new());
        assert_eq!(state.giver_status.len(), 2);
    }

    #[test]
    fn test_close_keeps_only_closed_npc_status() {
        const OTHER: Guid = Guid(0xF130_0000_0000_0CAF);
        let mut state = QuestState::default();
        state.apply(ServerMessage::Quest(QuestMessage::Details(details(33))), &mut Vec::new());
        state.apply(status(NPC, QuestGiverStatus::Incomplete), &mut Vec::new());
        state.apply(status(OTHER, QuestGiverStatus::Available), &mut Vec::new());

        state.apply(ServerMessage::Gossip(GossipMessage::Complete), &mut Vec::new());

        assert_eq!(state.giver_status, HashMap::from([(NPC, QuestGiverStatus::Incomplete)]));
    }
}
