//! Window state shared by the interactive subsystems.
//!
//! ```text
//! Closed ──begin_open──→ Opening ──confirm_open──→ Open ⇄ Waiting
//!    ↑                                               │
//!    └────────────── close (command or server) ──────┘
//!                    fail → Error
//! ```
//!
//! The fields are private: the phase and target change only through the
//! transition methods, which subsystems call from their opcode folds and
//! command paths while holding their state lock.

use std::collections::HashMap;
use std::hash::Hash;

use emberlink_protocol::Guid;
use emberlink_transport::Opcode;

use crate::{PreconditionViolation, SessionError};

/// Where an interaction window is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No window.
    #[default]
    Closed,
    /// Open command sent, nothing confirmed yet.
    Opening,
    /// The server confirmed the window.
    Open,
    /// A sub-action was sent and its follow-up hasn't arrived.
    Waiting,
    /// The server refused or aborted the interaction.
    Error,
}

/// Phase plus the entity the window is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowState {
    phase: Phase,
    target: Option<Guid>,
}

impl WindowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The entity the window is open (or opening) on.
    pub fn target(&self) -> Option<Guid> {
        self.target
    }

    /// `true` while [`Open`](Phase::Open) or [`Waiting`](Phase::Waiting).
    pub fn is_open(&self) -> bool {
        matches!(self.phase, Phase::Open | Phase::Waiting)
    }

    /// An open command for `target` was sent.
    pub fn begin_open(&mut self, target: Guid) {
        self.phase = Phase::Opening;
        self.target = Some(target);
    }

    /// The server opened a window on `target`. Returns `true` if it answers
    /// the pending open for the same target; an unsolicited window is still
    /// accepted.
    pub fn confirm_open(&mut self, target: Guid) -> bool {
        let expected = self.phase == Phase::Opening && self.target == Some(target);
        self.phase = Phase::Open;
        self.target = Some(target);
        expected
    }

    /// A sub-action went out. No-op unless open.
    pub fn begin_wait(&mut self) -> bool {
        if self.phase != Phase::Open {
            return false;
        }
        self.phase = Phase::Waiting;
        true
    }

    /// The awaited follow-up arrived.
    pub fn end_wait(&mut self) -> bool {
        if self.phase != Phase::Waiting {
            return false;
        }
        self.phase = Phase::Open;
        true
    }

    /// Closes the window and returns the target it had.
    pub fn close(&mut self) -> Option<Guid> {
        self.phase = Phase::Closed;
        self.target.take()
    }

    /// The server refused the interaction.
    pub fn fail(&mut self) {
        self.phase = Phase::Error;
        self.target = None;
    }

    /// Target of the open window, or [`PreconditionViolation::NotOpen`].
    pub fn require_open(&self, window: &'static str) -> Result<Guid, SessionError> {
        match self.target {
            Some(target) if self.is_open() => Ok(target),
            _ => Err(PreconditionViolation::NotOpen(window).into()),
        }
    }
}

/// Actions sent and not yet acknowledged, keyed by what they act on, with
/// the opcode expected to settle each.
#[derive(Debug, Clone)]
pub struct PendingConfirmations<K> {
    pending: HashMap<K, Opcode>,
}

impl<K> Default for PendingConfirmations<K> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> PendingConfirmations<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `key` awaits `expected`. Returns `false` (and changes
    /// nothing) if `key` is already pending.
    pub fn insert(&mut self, key: K, expected: Opcode) -> bool {
        if self.pending.contains_key(&key) {
            return false;
        }
        self.pending.insert(key, expected);
        true
    }

    pub fn contains(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Settles `key`, returning the opcode it was waiting for.
    pub fn resolve(&mut self, key: &K) -> Option<Opcode> {
        self.pending.remove(key)
    }

    /// Settles every key waiting for `opcode`. Returns how many.
    pub fn resolve_all(&mut self, opcode: Opcode) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, expected| *expected != opcode);
        before - self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.pending.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_confirm_close() {
        let mut window = WindowState::new();
        window.begin_open(Guid(7));
        assert_eq!(window.phase(), Phase::Opening);
        assert!(!window.is_open());

        assert!(window.confirm_open(Guid(7)));
        assert!(window.is_open());
        assert_eq!(window.target(), Some(Guid(7)));

        assert_eq!(window.close(), Some(Guid(7)));
        assert_eq!(window.phase(), Phase::Closed);
        assert_eq!(window.target(), None);
    }

    #[test]
    fn test_unsolicited_open_is_accepted() {
        let mut window = WindowState::new();
        assert!(!window.confirm_open(Guid(9)));
        assert_eq!(window.require_open("loot").unwrap(), Guid(9));
    }

    #[test]
    fn test_wait_only_from_open() {
        let mut window = WindowState::new();
        assert!(!window.begin_wait());
        window.confirm_open(Guid(1));
        assert!(window.begin_wait());
        assert!(window.is_open());
        assert!(window.end_wait());
        assert_eq!(window.phase(), Phase::Open);
    }

    #[test]
    fn test_require_open_while_opening_fails() {
        let mut window = WindowState::new();
        window.begin_open(Guid(1));
        let err = window.require_open("mailbox").unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_fail_clears_target() {
        let mut window = WindowState::new();
        window.begin_open(Guid(1));
        window.fail();
        assert_eq!(window.phase(), Phase::Error);
        assert_eq!(window.target(), None);
    }

    #[test]
    fn test_pending_rejects_duplicate() {
        let mut pending = PendingConfirmations::new();
        assert!(pending.insert((Guid(1), 0u32), Opcode(0x2A2)));
        assert!(!pending.insert((Guid(1), 0u32), Opcode(0x29F)));
        assert_eq!(pending.resolve(&(Guid(1), 0)), Some(Opcode(0x2A2)));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_pending_resolve_all_by_opcode() {
        let mut pending = PendingConfirmations::new();
        pending.insert(1u32, Opcode(1));
        pending.insert(2u32, Opcode(1));
        pending.insert(3u32, Opcode(2));
        assert_eq!(pending.resolve_all(Opcode(1)), 2);
        assert!(pending.contains(&3));
    }
}
