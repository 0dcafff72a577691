//! Loot windows, group rolls and master loot.

use std::collections::{BTreeMap, HashMap};

use emberlink_protocol::messages::loot::{
    LootAllPassed, LootItem, LootMessage, LootRoll, LootRollWon, LootSlotType, LootStartRoll,
    MasterGiveLoot, OpenLoot, ReleaseLoot, RollOnLoot, RollVote, TakeLootItem, TakeLootMoney,
};
use emberlink_protocol::messages::party::{LootRules, PartyMessage};
use emberlink_protocol::{opcodes, Guid, ServerMessage};
use emberlink_session::{compose, Phase, PendingConfirmations, SessionError, WindowState};
use emberlink_transport::Transport;
use futures_util::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::base::SystemCore;
use crate::SystemContext;

/// A group roll is identified by its loot source and slot.
pub type RollKey = (Guid, u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LootEvent {
    Opened { source: Guid, gold: u32, slots: usize },
    /// The server refused to open `source`.
    OpenFailed { source: Guid, error: Option<u8> },
    Closed { source: Option<Guid> },
    SlotRemoved(u8),
    /// Money was split with the group or taken alone.
    Money { amount: u32, sole_looter: bool },
    MoneyCleared,
    RollStarted(LootStartRoll),
    Rolled(LootRoll),
    RollWon(LootRollWon),
    AllPassed(LootAllPassed),
    MasterCandidates(Vec<Guid>),
}

impl LootEvent {
    fn is_roll(&self) -> bool {
        matches!(
            self,
            Self::RollStarted(_) | Self::Rolled(_) | Self::RollWon(_) | Self::AllPassed(_)
        )
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct LootState {
    player: Guid,
    window: WindowState,
    slots: BTreeMap<u8, LootItem>,
    gold: u32,
    rules: LootRules,
    rolls: HashMap<RollKey, LootStartRoll>,
    votes: PendingConfirmations<RollKey>,
    master_candidates: Vec<Guid>,
}

impl LootState {
    fn new(player: Guid) -> Self {
        Self {
            player,
            window: WindowState::new(),
            slots: BTreeMap::new(),
            gold: 0,
            rules: LootRules::default(),
            rolls: HashMap::new(),
            votes: PendingConfirmations::new(),
            master_candidates: Vec::new(),
        }
    }

    fn is_takeable(&self, item: &LootItem) -> bool {
        match item.slot_type {
            LootSlotType::AllowLoot | LootSlotType::Owner => true,
            LootSlotType::Master => self.rules.is_master_looter(self.player),
            _ => false,
        }
    }

    fn clear_window(&mut self) -> Option<Guid> {
        self.slots.clear();
        self.gold = 0;
        self.rolls.clear();
        self.votes.clear();
        self.window.close()
    }

    fn apply(&mut self, message: ServerMessage, events: &mut Vec<LootEvent>) {
        let message = match message {
            ServerMessage::Loot(message) => message,
            ServerMessage::Party(PartyMessage::List(list)) => {
                self.rules = list.loot.unwrap_or_default();
                return;
            }
            ServerMessage::Party(PartyMessage::Destroyed | PartyMessage::Uninvite) => {
                debug!("group gone, loot rules back to free-for-all");
                self.rules = LootRules::default();
                self.master_candidates.clear();
                return;
            }
            _ => return,
        };

        match message {
            LootMessage::Response(response) if response.is_failure() => {
                debug!(source = %response.source, error = ?response.error, "loot refused");
                self.clear_window();
                self.window.fail();
                events.push(LootEvent::OpenFailed {
                    source: response.source,
                    error: response.error,
                });
            }
            LootMessage::Response(response) => {
                let solicited = self.window.confirm_open(response.source);
                info!(source = %response.source, slots = response.items.len(), solicited, "loot window opened");
                self.slots = response
                    .items
                    .into_iter()
                    .map(|item| (item.slot, item))
                    .collect();
                self.gold = response.gold;
                events.push(LootEvent::Opened {
                    source: response.source,
                    gold: self.gold,
                    slots: self.slots.len(),
                });
            }
            LootMessage::ReleaseResponse(release) => {
                if self.window.target().is_some_and(|t| t != release.source) {
                    debug!(source = %release.source, "release for another source, ignoring");
                    return;
                }
                let source = self.clear_window();
                info!(source = %release.source, "loot window closed");
                events.push(LootEvent::Closed { source });
            }
            LootMessage::Removed(removed) => {
                if self.slots.remove(&removed.slot).is_some() {
                    events.push(LootEvent::SlotRemoved(removed.slot));
                }
            }
            LootMessage::MoneyNotify(notify) => events.push(LootEvent::Money {
                amount: notify.amount,
                sole_looter: notify.sole_looter,
            }),
            LootMessage::ClearMoney => {
                self.gold = 0;
                events.push(LootEvent::MoneyCleared);
            }
            LootMessage::StartRoll(start) => {
                self.rolls.insert((start.source, start.slot), start);
                events.push(LootEvent::RollStarted(start));
            }
            LootMessage::Roll(roll) => {
                if roll.player == self.player {
                    self.votes.resolve(&(roll.source, roll.slot));
                }
                events.push(LootEvent::Rolled(roll));
            }
            LootMessage::RollWon(won) => {
                let key = (won.source, won.slot);
                self.rolls.remove(&key);
                self.votes.resolve(&key);
                events.push(LootEvent::RollWon(won));
            }
            LootMessage::AllPassed(passed) => {
                let key = (passed.source, passed.slot);
                self.rolls.remove(&key);
                self.votes.resolve(&key);
                events.push(LootEvent::AllPassed(passed));
            }
            LootMessage::MasterList(list) => {
                self.master_candidates = list.candidates.clone();
                events.push(LootEvent::MasterCandidates(list.candidates));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

pub struct LootSystem<T> {
    core: SystemCore<T, LootState, LootEvent>,
}

impl<T: Transport> LootSystem<T> {
    pub fn new(ctx: &SystemContext<T>) -> Self {
        let subscribed = [
            LootMessage::OPCODES,
            &[
                opcodes::SMSG_GROUP_LIST,
                opcodes::SMSG_GROUP_DESTROYED,
                opcodes::SMSG_GROUP_UNINVITE,
            ],
        ]
        .concat();
        Self {
            core: SystemCore::start(
                ctx,
                "loot",
                LootState::new(ctx.player),
                &subscribed,
                LootState::apply,
            ),
        }
    }

    // -- commands -----------------------------------------------------------

    /// Opens the loot window on `target`.
    pub async fn open(&self, target: Guid, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.core.send(&OpenLoot(target), cancel).await?;
        self.core.cell.update(|state| {
            // The response may already have been folded.
            if !(state.window.is_open() && state.window.target() == Some(target)) {
                state.clear_window();
                state.window.begin_open(target);
            }
        });
        Ok(())
    }

    /// Takes one slot. The slot must exist and be takeable by the local
    /// player.
    pub async fn take(&self, slot: u8, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.core.cell.read(|state| {
            state.window.require_open("loot")?;
            let item = state
                .slots
                .get(&slot)
                .ok_or_else(|| SessionError::not_found("loot slot", slot))?;
            if !state.is_takeable(item) {
                return Err(SessionError::not_allowed("loot slot is not takeable"));
            }
            Ok(())
        })?;
        self.core.send(&TakeLootItem { slot }, cancel).await?;
        self.core.cell.update(|state| state.slots.remove(&slot));
        Ok(())
    }

    pub async fn take_money(&self, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.core.cell.read(|state| {
            state.window.require_open("loot")?;
            if state.gold == 0 {
                return Err(SessionError::not_allowed("no money to take"));
            }
            Ok(())
        })?;
        self.core.send(&TakeLootMoney, cancel).await?;
        self.core.cell.update(|state| state.gold = 0);
        Ok(())
    }

    /// Closes the window. Slots and pending rolls are cleared.
    pub async fn release(&self, cancel: &CancellationToken) -> Result<(), SessionError> {
        let target = self
            .core
            .cell
            .read(|state| state.window.target())
            .ok_or_else(|| SessionError::not_open("loot"))?;
        self.core.send(&ReleaseLoot(target), cancel).await?;
        let source = self.core.cell.update(|state| state.clear_window());
        self.core.cell.emit(LootEvent::Closed { source });
        Ok(())
    }

    /// Votes on a started roll. One vote per roll until the server echoes
    /// it back or the roll ends.
    pub async fn roll(
        &self,
        source: Guid,
        slot: u32,
        vote: RollVote,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let key = (source, slot);
        self.core.cell.read(|state| {
            let start = state
                .rolls
                .get(&key)
                .ok_or_else(|| SessionError::not_found("loot roll", slot))?;
            if state.votes.contains(&key) {
                return Err(SessionError::not_allowed("already voted on this roll"));
            }
            if vote != RollVote::Pass && start.vote_mask & (1 << vote.raw()) == 0 {
                return Err(SessionError::not_allowed("vote not permitted for this roll"));
            }
            Ok(())
        })?;
        self.core.send(&RollOnLoot { source, slot, vote }, cancel).await?;
        self.core.cell.update(|state| {
            state.votes.insert(key, opcodes::SMSG_LOOT_ROLL);
        });
        Ok(())
    }

    /// Hands a slot to `player`. Only the master looter may.
    pub async fn master_give(
        &self,
        slot: u8,
        player: Guid,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let source = self.core.cell.read(|state| {
            let source = state.window.require_open("loot")?;
            if !state.rules.is_master_looter(state.player) {
                return Err(SessionError::not_allowed("not the master looter"));
            }
            if !state.slots.contains_key(&slot) {
                return Err(SessionError::not_found("loot slot", slot));
            }
            if !state.master_candidates.is_empty() && !state.master_candidates.contains(&player) {
                return Err(SessionError::not_found("loot candidate", player.0));
            }
            Ok(source)
        })?;
        let packet = MasterGiveLoot {
            source,
            slot,
            target: player,
        };
        self.core.send(&packet, cancel).await?;
        self.core.cell.update(|state| state.slots.remove(&slot));
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

    /// Every slot still in the window, by slot index.
    pub fn available_loot(&self) -> Vec<LootItem> {
        self.core
            .cell
            .read(|state| state.slots.values().cloned().collect())
    }

    /// Slots the local player may take under the current loot rules.
    pub fn takeable_slots(&self) -> Vec<u8> {
        self.core.cell.read(|state| {
            state
                .slots
                .values()
                .filter(|item| state.is_takeable(item))
                .map(|item| item.slot)
                .collect()
        })
    }

    pub fn gold(&self) -> u32 {
        self.core.cell.read(|state| state.gold)
    }

    pub fn loot_rules(&self) -> LootRules {
        self.core.cell.read(|state| state.rules)
    }

    pub fn is_master_looter(&self) -> bool {
        self.core
            .cell
            .read(|state| state.rules.is_master_looter(state.player))
    }

    /// Rolls started and not yet won or passed.
    pub fn pending_rolls(&self) -> Vec<LootStartRoll> {
        self.core.cell.read(|state| {
            let mut rolls: Vec<_> = state.rolls.values().copied().collect();
            rolls.sort_by_key(|roll| (roll.source, roll.slot));
            rolls
        })
    }

    pub fn has_voted(&self, source: Guid, slot: u32) -> bool {
        self.core.cell.read(|state| state.votes.contains(&(source, slot)))
    }

    // -- views --------------------------------------------------------------

    pub fn events(&self) -> impl Stream<Item = LootEvent> + Send + 'static {
        self.core.events()
    }

    /// Refused opens.
    pub fn failures(&self) -> impl Stream<Item = LootEvent> + Send + 'static {
        compose::filtered(self.events(), |event| matches!(event, LootEvent::OpenFailed { .. }))
    }

    /// Roll starts, votes, wins and all-passed notices.
    pub fn rolls(&self) -> impl Stream<Item = LootEvent> + Send + 'static {
        compose::filtered(self.events(), LootEvent::is_roll)
    }

    // -- lifecycle ----------------------------------------------------------

    pub fn dispose(&self) {
        self.core.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}
