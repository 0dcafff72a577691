//! Trainer windows: what a trainer teaches and buying from it.

use std::collections::{BTreeSet, HashSet};

use emberlink_protocol::messages::spell::SpellMessage;
use emberlink_protocol::messages::trainer::{
    BuyFailure, BuyTrainerSpell, RequestTrainerList, ServiceState, TrainerMessage, TrainerService,
};
use emberlink_protocol::{opcodes, Guid, ServerMessage};
use emberlink_session::{compose, Phase, SessionError, WindowState};
use emberlink_transport::Transport;
use futures_util::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::base::SystemCore;
use crate::SystemContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainerEvent {
    Listed {
        trainer: Guid,
        services: usize,
        greeting: String,
    },
    Learned(u32),
    BuyFailed { spell_id: u32, reason: BuyFailure },
    Closed { trainer: Option<Guid> },
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct TrainerState {
    window: WindowState,
    services: Vec<TrainerService>,
    /// Purchases sent and not yet answered.
    pending: HashSet<u32>,
    known: BTreeSet<u32>,
}

impl TrainerState {
    fn close(&mut self) -> Option<Guid> {
        self.services.clear();
        self.pending.clear();
        self.window.close()
    }

    fn learn(&mut self, spell_id: u32) {
        self.pending.remove(&spell_id);
        self.known.insert(spell_id);
        if let Some(service) = self.services.iter_mut().find(|s| s.spell_id == spell_id) {
            service.state = ServiceState::Known;
        }
    }

    fn apply(&mut self, message: ServerMessage, events: &mut Vec<TrainerEvent>) {
        let message = match message {
            ServerMessage::Trainer(message) => message,
            ServerMessage::Spell(SpellMessage::Learned(learned)) => {
                self.learn(learned.spell_id);
                return;
            }
            _ => return,
        };
        match message {
            TrainerMessage::List(list) => {
                let solicited = self.window.confirm_open(list.trainer);
                info!(trainer = %list.trainer, services = list.services.len(), solicited, "trainer list");
                self.pending.clear();
                self.known.extend(
                    list.services
                        .iter()
                        .filter(|s| s.state == ServiceState::Known)
                        .map(|s| s.spell_id),
                );
                events.push(TrainerEvent::Listed {
                    trainer: list.trainer,
                    services: list.services.len(),
                    greeting: list.greeting,
                });
                self.services = list.services;
            }
            TrainerMessage::BuySucceeded(bought) => {
                self.learn(bought.spell_id);
                self.window.end_wait();
                events.push(TrainerEvent::Learned(bought.spell_id));
            }
            TrainerMessage::BuyFailed(failed) => {
                debug!(spell_id = failed.spell_id, reason = ?failed.reason, "trainer refused purchase");
                self.pending.remove(&failed.spell_id);
                self.window.end_wait();
                events.push(TrainerEvent::BuyFailed {
                    spell_id: failed.spell_id,
                    reason: failed.reason,
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

pub struct ProfessionsSystem<T> {
    core: SystemCore<T, TrainerState, TrainerEvent>,
}

impl<T: Transport> ProfessionsSystem<T> {
    pub fn new(ctx: &SystemContext<T>) -> Self {
        let subscribed = [TrainerMessage::OPCODES, &[opcodes::SMSG_LEARNED_SPELL]].concat();
        Self {
            core: SystemCore::start(
                ctx,
                "professions",
                TrainerState::default(),
                &subscribed,
                TrainerState::apply,
            ),
        }
    }

    /// Asks `trainer` for its service list.
    pub async fn open(&self, trainer: Guid, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.core.send(&RequestTrainerList(trainer), cancel).await?;
        self.core.cell.update(|state| {
            if !(state.window.is_open() && state.window.target() == Some(trainer)) {
                state.close();
                state.window.begin_open(trainer);
            }
        });
        Ok(())
    }

    /// Buys `spell_id`. It must be listed as available and not already
    /// being bought.
    pub async fn buy(&self, spell_id: u32, cancel: &CancellationToken) -> Result<(), SessionError> {
        let trainer = self.core.cell.read(|state| {
            let trainer = state.window.require_open("trainer")?;
            let service = state
                .services
                .iter()
                .find(|s| s.spell_id == spell_id)
                .ok_or_else(|| SessionError::not_found("trainer service", spell_id))?;
            if service.state != ServiceState::Available {
                return Err(SessionError::not_allowed("service is not available"));
            }
            if state.pending.contains(&spell_id) {
                return Err(SessionError::not_allowed("purchase already pending"));
            }
            Ok(trainer)
        })?;
        self.core
            .send(&BuyTrainerSpell { trainer, spell_id }, cancel)
            .await?;
        self.core.cell.update(|state| {
            state.pending.insert(spell_id);
            state.window.begin_wait();
        });
        Ok(())
    }

    /// Closes the window locally.
    pub fn close(&self) -> Result<(), SessionError> {
        self.core.cell.ensure_live()?;
        let trainer = self.core.cell.update(TrainerState::close);
        if trainer.is_some() {
            self.core.cell.emit(TrainerEvent::Closed { trainer });
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

    pub fn services(&self) -> Vec<TrainerService> {
        self.core.cell.read(|state| state.services.clone())
    }

    /// Services the local player can buy right now.
    pub fn available_services(&self) -> Vec<TrainerService> {
        self.core.cell.read(|state| {
            state
                .services
                .iter()
                .filter(|s| s.state == ServiceState::Available && !state.pending.contains(&s.spell_id))
                .copied()
                .collect()
        })
    }

    /// Spells known from trainer lists, purchases and learned-spell
    /// notices, ascending.
    pub fn known_spells(&self) -> Vec<u32> {
        self.core.cell.read(|state| state.known.iter().copied().collect())
    }

    // -- views --------------------------------------------------------------

    pub fn events(&self) -> impl Stream<Item = TrainerEvent> + Send + 'static {
        self.core.events()
    }

    pub fn failures(&self) -> impl Stream<Item = TrainerEvent> + Send + 'static {
        compose::filtered(self.events(), |event| matches!(event, TrainerEvent::BuyFailed { .. }))
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
    use emberlink_protocol::messages::spell::LearnedSpell;
    use emberlink_protocol::messages::trainer::{TrainerBuyFailed, TrainerBuySucceeded, TrainerList};

    use super::*;

    const TRAINER: Guid = Guid(0xF130_0000_0000_0099);

    fn service(spell_id: u32, state: ServiceState) -> TrainerService {
        TrainerService {
            spell_id,
            state,
            cost: 100,
            profession_first_rank: 0,
            profession_button: 0,
            required_level: 5,
            required_skill: 0,
            required_skill_value: 0,
            previous_spell: 0,
            required_spell: 0,
        }
    }

    fn listed() -> TrainerState {
        let mut state = TrainerState::default();
        state.window.begin_open(TRAINER);
        let list = TrainerList {
            trainer: TRAINER,
            trainer_type: 2,
            services: vec![
                service(2259, ServiceState::Available),
                service(3101, ServiceState::Unavailable),
                service(2275, ServiceState::Known),
            ],
            greeting: String::new(),
        };
        state.apply(ServerMessage::Trainer(TrainerMessage::List(list)), &mut Vec::new());
        state
    }

    #[test]
    fn test_list_opens_and_records_known() {
        let state = listed();
        assert_eq!(state.window.phase(), Phase::Open);
        assert_eq!(state.known.iter().copied().collect::<Vec<_>>(), vec![2275]);
    }

    #[test]
    fn test_buy_succeeded_marks_known() {
        let mut state = listed();
        state.pending.insert(2259);
        state.window.begin_wait();
        let bought = TrainerBuySucceeded {
            trainer: TRAINER,
            spell_id: 2259,
        };
        state.apply(ServerMessage::Trainer(TrainerMessage::BuySucceeded(bought)), &mut Vec::new());

        assert_eq!(state.services[0].state, ServiceState::Known);
        assert!(state.pending.is_empty());
        assert_eq!(state.window.phase(), Phase::Open);
    }

    #[test]
    fn test_buy_failed_emits_and_clears_pending() {
        let mut state = listed();
        state.pending.insert(2259);
        let failed = TrainerBuyFailed {
            trainer: TRAINER,
            spell_id: 2259,
            reason: BuyFailure::NotEnoughMoney,
        };
        let mut events = Vec::new();
        state.apply(ServerMessage::Trainer(TrainerMessage::BuyFailed(failed)), &mut events);

        assert!(state.pending.is_empty());
        assert_eq!(state.services[0].state, ServiceState::Available);
        assert_eq!(
            events,
            vec![TrainerEvent::BuyFailed {
                spell_id: 2259,
                reason: BuyFailure::NotEnoughMoney
            }]
        );
    }

    #[test]
    fn test_learned_spell_outside_window() {
        let mut state = TrainerState::default();
        let learned = LearnedSpell { spell_id: 818 };
        state.apply(ServerMessage::Spell(SpellMessage::Learned(learned)), &mut Vec::new());
        assert!(state.known.contains(&818));
    }
}
