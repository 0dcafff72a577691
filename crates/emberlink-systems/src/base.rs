//! Wiring every subsystem shares: the state cell, its listener task and the
//! outbound path.

use std::sync::Arc;

use emberlink_protocol::{ClientPacket, ServerMessage};
use emberlink_session::{compose, Listener, Outbound, SessionCell, SessionError};
use emberlink_transport::{Opcode, Transport};
use futures_util::Stream;
use tokio_util::sync::CancellationToken;

use crate::SystemContext;

pub(crate) struct SystemCore<T, S, E> {
    pub(crate) cell: Arc<SessionCell<S, E>>,
    pub(crate) outbound: Outbound<T>,
    listener: Listener,
}

impl<T, S, E> SystemCore<T, S, E>
where
    T: Transport,
    S: Send + 'static,
    E: Clone + Send + 'static,
{
    /// Subscribes to `opcodes` and starts the listener that folds each
    /// decoded message into `state` with `apply`.
    pub(crate) fn start<F>(
        ctx: &SystemContext<T>,
        name: &'static str,
        state: S,
        opcodes: &[Opcode],
        mut apply: F,
    ) -> Self
    where
        F: FnMut(&mut S, ServerMessage, &mut Vec<E>) + Send + 'static,
    {
        let cell = Arc::new(SessionCell::new(name, state, ctx.event_capacity));
        let frames = ctx.multiplexer.subscribe_many(opcodes);
        let listener = {
            let cell = Arc::clone(&cell);
            Listener::spawn(name, frames, move |message| {
                cell.fold(|state, events| apply(state, message, events));
            })
        };
        Self {
            cell,
            outbound: ctx.outbound.clone(),
            listener,
        }
    }

    /// Sends `packet` unless the subsystem is disposed.
    pub(crate) async fn send<P: ClientPacket>(
        &self,
        packet: &P,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.cell.ensure_live()?;
        self.outbound.send(packet, cancel).await
    }

    pub(crate) fn events(&self) -> impl Stream<Item = E> + Send + 'static {
        compose::broadcast_stream(self.cell.subscribe())
    }

    pub(crate) fn dispose(&self) {
        if self.cell.dispose() {
            self.listener.abort();
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.cell.is_disposed()
    }
}
