//! Spell casting, cooldowns and the learned-spell set.
//!
//! The cast bar reuses [`WindowState`]: `Opening` once the cast command is
//! sent, `Open` when the server starts the cast, `Closed` when it goes off
//! or is cancelled and `Error` when it fails. Only the local player's casts
//! are tracked.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use emberlink_protocol::messages::spell::{
    CancelCast, CastFailed, CastSpell, SpellFailure, SpellGo, SpellMessage, SpellStart,
    SpellTarget,
};
use emberlink_protocol::{Guid, ServerMessage};
use emberlink_session::{compose, Phase, SessionError, WindowState};
use emberlink_transport::Transport;
use futures_util::Stream;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::base::SystemCore;
use crate::SystemContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpellEvent {
    Started(SpellStart),
    Went(SpellGo),
    CastFailed(CastFailed),
    Interrupted(SpellFailure),
    /// Cooldowns began: `(spell, duration)`.
    Cooldowns(Vec<(u32, Duration)>),
    Learned(u32),
}

/// A cast that didn't go off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastFailure {
    /// Refused before it started.
    Rejected(CastFailed),
    /// Interrupted while casting.
    Interrupted(SpellFailure),
}

impl CastFailure {
    pub fn spell_id(&self) -> u32 {
        match self {
            Self::Rejected(failed) => failed.spell_id,
            Self::Interrupted(failure) => failure.spell_id,
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SpellState {
    player: Guid,
    cast: WindowState,
    spell: Option<u32>,
    cooldowns: HashMap<u32, Instant>,
    learned: BTreeSet<u32>,
}

impl SpellState {
    fn new(player: Guid) -> Self {
        Self {
            player,
            cast: WindowState::new(),
            spell: None,
            cooldowns: HashMap::new(),
            learned: BTreeSet::new(),
        }
    }

    fn remaining(&self, spell_id: u32, now: Instant) -> Option<Duration> {
        self.cooldowns
            .get(&spell_id)
            .map(|expiry| expiry.saturating_duration_since(now))
            .filter(|left| !left.is_zero())
    }

    fn end_cast(&mut self, spell_id: u32, failed: bool) {
        if self.spell != Some(spell_id) {
            return;
        }
        if failed {
            self.cast.fail();
        } else {
            self.cast.close();
        }
        self.spell = None;
    }

    fn apply(&mut self, message: ServerMessage, events: &mut Vec<SpellEvent>) {
        let ServerMessage::Spell(message) = message else {
            return;
        };
        match message {
            SpellMessage::Start(start) if start.caster == self.player => {
                let target = self.cast.target().unwrap_or(self.player);
                self.cast.confirm_open(target);
                self.spell = Some(start.spell_id);
                events.push(SpellEvent::Started(start));
            }
            SpellMessage::Go(go) if go.caster == self.player => {
                self.end_cast(go.spell_id, false);
                events.push(SpellEvent::Went(go));
            }
            SpellMessage::Failure(failure) if failure.caster == self.player => {
                debug!(spell_id = failure.spell_id, reason = failure.reason, "cast interrupted");
                self.end_cast(failure.spell_id, true);
                events.push(SpellEvent::Interrupted(failure));
            }
            SpellMessage::CastFailed(failed) => {
                debug!(spell_id = failed.spell_id, status = failed.status, reason = ?failed.reason, "cast failed");
                self.end_cast(failed.spell_id, true);
                events.push(SpellEvent::CastFailed(failed));
            }
            SpellMessage::Cooldown(cooldown) if cooldown.caster == self.player => {
                let now = Instant::now();
                let started: Vec<_> = cooldown
                    .cooldowns
                    .iter()
                    .map(|&(spell_id, ms)| (spell_id, Duration::from_millis(u64::from(ms))))
                    .collect();
                for &(spell_id, duration) in &started {
                    self.cooldowns.insert(spell_id, now + duration);
                }
                self.cooldowns.retain(|_, expiry| *expiry > now);
                events.push(SpellEvent::Cooldowns(started));
            }
            SpellMessage::Learned(learned) => {
                self.learned.insert(learned.spell_id);
                events.push(SpellEvent::Learned(learned.spell_id));
            }
            // Someone else's cast.
            SpellMessage::Start(_)
            | SpellMessage::Go(_)
            | SpellMessage::Failure(_)
            | SpellMessage::Cooldown(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

pub struct SpellCastSystem<T> {
    core: SystemCore<T, SpellState, SpellEvent>,
}

impl<T: Transport> SpellCastSystem<T> {
    pub fn new(ctx: &SystemContext<T>) -> Self {
        Self {
            core: SystemCore::start(
                ctx,
                "spell",
                SpellState::new(ctx.player),
                SpellMessage::OPCODES,
                SpellState::apply,
            ),
        }
    }

    /// Casts `spell_id` on `target`. Refused while the spell is cooling
    /// down.
    pub async fn cast(
        &self,
        spell_id: u32,
        target: SpellTarget,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let on_cooldown = self
            .core
            .cell
            .read(|state| state.remaining(spell_id, Instant::now()).is_some());
        if on_cooldown {
            return Err(SessionError::not_allowed("spell is on cooldown"));
        }
        self.core.send(&CastSpell { spell_id, target }, cancel).await?;
        self.core.cell.update(|state| {
            let guid = target.guid().unwrap_or(state.player);
            state.cast.begin_open(guid);
            state.spell = Some(spell_id);
        });
        Ok(())
    }

    /// Cancels the cast of `spell_id` in progress.
    pub async fn cancel(&self, spell_id: u32, cancel: &CancellationToken) -> Result<(), SessionError> {
        let casting = self.core.cell.read(|state| state.spell == Some(spell_id));
        if !casting {
            return Err(SessionError::not_found("active cast", spell_id));
        }
        self.core.send(&CancelCast { spell_id }, cancel).await?;
        self.core.cell.update(|state| state.end_cast(spell_id, false));
        Ok(())
    }

    // -- queries ------------------------------------------------------------

    pub fn is_casting(&self) -> bool {
        self.core
            .cell
            .read(|state| matches!(state.cast.phase(), Phase::Opening | Phase::Open))
    }

    pub fn phase(&self) -> Phase {
        self.core.cell.read(|state| state.cast.phase())
    }

    pub fn current_spell(&self) -> Option<u32> {
        self.core.cell.read(|state| state.spell)
    }

    /// Time left on `spell_id`'s cooldown; `None` when it's ready.
    pub fn cooldown(&self, spell_id: u32) -> Option<Duration> {
        self.core
            .cell
            .read(|state| state.remaining(spell_id, Instant::now()))
    }

    /// Spells learned this session, ascending.
    pub fn learned(&self) -> Vec<u32> {
        self.core.cell.read(|state| state.learned.iter().copied().collect())
    }

    // -- views --------------------------------------------------------------

    pub fn events(&self) -> impl Stream<Item = SpellEvent> + Send + 'static {
        self.core.events()
    }

    pub fn failures(&self) -> impl Stream<Item = CastFailure> + Send + 'static {
        let rejected = compose::projected(self.events(), |event| match event {
            SpellEvent::CastFailed(failed) => Some(CastFailure::Rejected(failed)),
            _ => None,
        });
        let interrupted = compose::projected(self.events(), |event| match event {
            SpellEvent::Interrupted(failure) => Some(CastFailure::Interrupted(failure)),
            _ => None,
        });
        compose::merged(rejected, interrupted)
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
    use emberlink_protocol::messages::spell::SpellCooldown;

    use super::*;

    const PLAYER: Guid = Guid(0x42);
    const FIREBALL: u32 = 133;

    fn start(caster: Guid) -> ServerMessage {
        ServerMessage::Spell(SpellMessage::Start(SpellStart {
            caster_item: caster,
            caster,
            spell_id: FIREBALL,
            cast_flags: 0,
            cast_time_ms: 2500,
        }))
    }

    #[test]
    fn test_other_casters_ignored() {
        let mut state = SpellState::new(PLAYER);
        let mut events = Vec::new();
        state.apply(start(Guid(0x99)), &mut events);
        assert!(events.is_empty());
        assert_eq!(state.cast.phase(), Phase::Closed);
    }

    #[test]
    fn test_start_then_failure() {
        let mut state = SpellState::new(PLAYER);
        state.cast.begin_open(Guid(0xF130_0000_0000_0001));
        state.spell = Some(FIREBALL);
        state.apply(start(PLAYER), &mut Vec::new());
        assert_eq!(state.cast.phase(), Phase::Open);
        assert_eq!(state.cast.target(), Some(Guid(0xF130_0000_0000_0001)));

        let failed = CastFailed {
            spell_id: FIREBALL,
            status: 2,
            reason: Some(12),
        };
        state.apply(ServerMessage::Spell(SpellMessage::CastFailed(failed)), &mut Vec::new());
        assert_eq!(state.cast.phase(), Phase::Error);
        assert_eq!(state.spell, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_counts_down() {
        let mut state = SpellState::new(PLAYER);
        let cooldown = SpellCooldown {
            caster: PLAYER,
            flags: 0,
            cooldowns: vec![(FIREBALL, 8_000)],
        };
        state.apply(ServerMessage::Spell(SpellMessage::Cooldown(cooldown)), &mut Vec::new());
        assert_eq!(state.remaining(FIREBALL, Instant::now()), Some(Duration::from_secs(8)));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(state.remaining(FIREBALL, Instant::now()), Some(Duration::from_secs(3)));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(state.remaining(FIREBALL, Instant::now()), None);
    }
}
