//! Per-opcode delivery table shared by the transport implementations.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{Inbound, Opcode};

/// Routes inbound frames to the registrations for their opcode.
///
/// Closed registrations (receiver dropped) are pruned lazily on the next
/// dispatch for that opcode.
#[derive(Debug, Default)]
pub struct Registry {
    routes: Mutex<HashMap<Opcode, Vec<mpsc::UnboundedSender<Bytes>>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn routes(&self) -> MutexGuard<'_, HashMap<Opcode, Vec<mpsc::UnboundedSender<Bytes>>>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a registration for `opcode`.
    pub fn register(&self, opcode: Opcode) -> Inbound {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes().entry(opcode).or_default().push(tx);
        rx
    }

    /// Delivers `payload` to every live registration for `opcode`.
    ///
    /// Returns how many registrations received it.
    pub fn dispatch(&self, opcode: Opcode, payload: Bytes) -> usize {
        let mut routes = self.routes();
        let Some(senders) = routes.get_mut(&opcode) else {
            tracing::trace!(%opcode, "no registration for opcode");
            return 0;
        };
        senders.retain(|tx| tx.send(payload.clone()).is_ok());
        let delivered = senders.len();
        if senders.is_empty() {
            routes.remove(&opcode);
        }
        delivered
    }

    /// Number of live registrations for `opcode`.
    pub fn live(&self, opcode: Opcode) -> usize {
        self.routes()
            .get(&opcode)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Drops every registration, ending all inbound streams.
    pub fn close_all(&self) {
        self.routes().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_reaches_every_registration() {
        let registry = Registry::new();
        let mut a = registry.register(Opcode(1));
        let mut b = registry.register(Opcode(1));

        let delivered = registry.dispatch(Opcode(1), Bytes::from_static(b"x"));

        assert_eq!(delivered, 2);
        assert_eq!(a.try_recv().unwrap(), Bytes::from_static(b"x"));
        assert_eq!(b.try_recv().unwrap(), Bytes::from_static(b"x"));
    }

    #[test]
    fn test_dispatch_unknown_opcode_delivers_nothing() {
        let registry = Registry::new();
        assert_eq!(registry.dispatch(Opcode(9), Bytes::new()), 0);
    }

    #[test]
    fn test_dropped_registration_is_pruned() {
        let registry = Registry::new();
        let rx = registry.register(Opcode(1));
        assert_eq!(registry.live(Opcode(1)), 1);

        drop(rx);

        assert_eq!(registry.live(Opcode(1)), 0);
        assert_eq!(registry.dispatch(Opcode(1), Bytes::new()), 0);
    }

    #[test]
    fn test_close_all_ends_streams() {
        let registry = Registry::new();
        let mut rx = registry.register(Opcode(1));
        registry.close_all();
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
