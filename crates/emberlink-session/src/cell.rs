//! State, event bus and disposal flag for one subsystem instance.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::SessionError;

/// The single lock guarding a subsystem's state, plus the channel its
/// events go out on.
///
/// Inbound folds go through [`fold`](Self::fold), which is a no-op once the
/// cell is disposed. Events collected during a fold are published after the
/// lock is released, in the order they were pushed.
pub struct SessionCell<S, E> {
    name: &'static str,
    state: Mutex<S>,
    events: broadcast::Sender<E>,
    disposed: AtomicBool,
}

impl<S, E: Clone> SessionCell<S, E> {
    /// `capacity` bounds how far an event subscriber may lag; it is raised
    /// to 1 if zero.
    pub fn new(name: &'static str, state: S, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            name,
            state: Mutex::new(state),
            events,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads the state.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.lock())
    }

    /// Mutates the state from a command path.
    pub fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.lock())
    }

    /// Applies an inbound message. Returns `false` without calling `f` if
    /// the cell is disposed.
    pub fn fold(&self, f: impl FnOnce(&mut S, &mut Vec<E>)) -> bool {
        if self.is_disposed() {
            debug!(system = self.name, "ignoring inbound after dispose");
            return false;
        }
        let mut events = Vec::new();
        {
            let mut state = self.lock();
            // Re-check under the lock so a concurrent dispose wins.
            if self.is_disposed() {
                return false;
            }
            f(&mut state, &mut events);
        }
        for event in events {
            self.emit(event);
        }
        true
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn emit(&self, event: E) {
        let _ = self.events.send(event);
    }

    /// A receiver for events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.events.subscribe()
    }

    /// `Err(Disposed)` once [`dispose`](Self::dispose) has run.
    pub fn ensure_live(&self) -> Result<(), SessionError> {
        if self.is_disposed() {
            Err(SessionError::Disposed)
        } else {
            Ok(())
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Marks the cell disposed. Returns `true` the first time.
    pub fn dispose(&self) -> bool {
        let _guard = self.lock();
        let first = !self.disposed.swap(true, Ordering::AcqRel);
        if first {
            info!(system = self.name, "disposed");
        }
        first
    }
}

impl<S, E> std::fmt::Debug for SessionCell<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCell")
            .field("name", &self.name)
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fold_emits_after_mutation() {
        let cell: SessionCell<u32, u32> = SessionCell::new("test", 0, 8);
        let mut rx = cell.subscribe();

        cell.fold(|n, events| {
            *n += 1;
            events.push(*n);
        });

        assert_eq!(cell.read(|n| *n), 1);
        assert_eq!(rx.recv().await.unwrap(), 1);
    }

    #[test]
    fn test_fold_after_dispose_is_ignored() {
        let cell: SessionCell<u32, u32> = SessionCell::new("test", 0, 8);
        assert!(cell.dispose());
        assert!(!cell.dispose());

        assert!(!cell.fold(|n, _| *n += 1));
        assert_eq!(cell.read(|n| *n), 0);
        assert!(matches!(cell.ensure_live(), Err(SessionError::Disposed)));
    }
}
