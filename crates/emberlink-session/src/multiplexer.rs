//! Reference-counted, per-opcode fan-out over a [`Transport`].
//!
//! The first [`Multiplexer::subscribe`] for an opcode registers with the
//! transport and spawns a pump task that forwards every inbound payload into
//! a `broadcast` channel. Later subscribers for the same opcode share that
//! route. When the last [`Subscription`] is dropped the route is removed,
//! the pump aborted and the transport registration released with it.
//!
//! Payloads are forwarded as raw [`Bytes`]; nothing here decodes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bytes::Bytes;
use emberlink_transport::{Inbound, Opcode, Transport};
use futures_util::stream::{self, BoxStream, SelectAll, Stream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Multiplexer settings.
#[derive(Debug, Clone)]
pub struct MultiplexerConfig {
    /// Payloads buffered per opcode for the slowest subscriber. A subscriber
    /// that falls further behind skips ahead and logs a warning.
    pub channel_capacity: usize,
}

impl Default for MultiplexerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

impl MultiplexerConfig {
    /// Upper bound for `channel_capacity`.
    pub const MAX_CHANNEL_CAPACITY: usize = 65_536;

    /// Clamps `channel_capacity` to `1..=MAX_CHANNEL_CAPACITY`.
    pub fn validated(mut self) -> Self {
        let clamped = self.channel_capacity.clamp(1, Self::MAX_CHANNEL_CAPACITY);
        if clamped != self.channel_capacity {
            warn!(
                requested = self.channel_capacity,
                using = clamped,
                "channel_capacity out of range, clamping"
            );
            self.channel_capacity = clamped;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Route table
// ---------------------------------------------------------------------------

struct Route {
    id: u64,
    tx: broadcast::Sender<Bytes>,
    subscribers: usize,
    pump: JoinHandle<()>,
}

#[derive(Default)]
struct RouteTable {
    routes: Mutex<HashMap<Opcode, Route>>,
    next_id: AtomicU64,
}

impl RouteTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<Opcode, Route>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops one subscriber from route `id`; the route goes away with its
    /// last subscriber.
    fn release(&self, opcode: Opcode, id: u64) {
        let mut routes = self.lock();
        let Some(route) = routes.get_mut(&opcode).filter(|route| route.id == id) else {
            return;
        };
        route.subscribers = route.subscribers.saturating_sub(1);
        if route.subscribers == 0 {
            if let Some(route) = routes.remove(&opcode) {
                route.pump.abort();
                debug!(%opcode, "route released");
            }
        }
    }

    /// Called by a pump whose inbound stream ended.
    fn retire(&self, opcode: Opcode, id: u64) {
        let mut routes = self.lock();
        if routes.get(&opcode).is_some_and(|route| route.id == id) {
            routes.remove(&opcode);
        }
    }
}

async fn pump(
    opcode: Opcode,
    id: u64,
    mut inbound: Inbound,
    tx: broadcast::Sender<Bytes>,
    table: Weak<RouteTable>,
) {
    while let Some(payload) = inbound.recv().await {
        trace!(%opcode, len = payload.len(), "dispatch");
        // No receivers only happens between the last unsubscribe and the
        // abort; the frame has nobody to go to either way.
        let _ = tx.send(payload);
    }
    debug!(%opcode, "inbound stream ended");
    if let Some(table) = table.upgrade() {
        table.retire(opcode, id);
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// One subscriber's view of an opcode's payloads.
///
/// Only payloads dispatched after the subscription was created are seen.
/// Dropping it releases the subscriber's share of the route.
pub struct Subscription {
    opcode: Opcode,
    route_id: u64,
    rx: broadcast::Receiver<Bytes>,
    table: Arc<RouteTable>,
}

impl Subscription {
    /// The opcode this subscription follows.
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Waits for the next payload. Returns `None` once the route is gone
    /// (transport disconnected).
    ///
    /// A subscriber that lagged past the channel capacity logs a warning and
    /// continues with the oldest payload still buffered.
    pub async fn recv(&mut self) -> Option<Bytes> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(opcode = %self.opcode, skipped, "subscriber lagging, skipping ahead");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Turns the subscription into a stream of payloads.
    pub fn into_stream(self) -> impl Stream<Item = Bytes> + Send + 'static {
        stream::unfold(self, |mut sub| async move {
            let payload = sub.recv().await?;
            Some((payload, sub))
        })
    }

    /// Like [`into_stream`](Self::into_stream) with each payload tagged by
    /// its opcode.
    pub fn into_tagged_stream(self) -> impl Stream<Item = (Opcode, Bytes)> + Send + 'static {
        let opcode = self.opcode;
        self.into_stream().map(move |payload| (opcode, payload))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.table.release(self.opcode, self.route_id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("opcode", &self.opcode)
            .field("route_id", &self.route_id)
            .finish_non_exhaustive()
    }
}

/// Stream returned by [`Multiplexer::subscribe_many`].
pub type TaggedStream = SelectAll<BoxStream<'static, (Opcode, Bytes)>>;

// ---------------------------------------------------------------------------
// Multiplexer
// ---------------------------------------------------------------------------

/// Shared fan-out point between one transport and every subsystem.
///
/// Cheap to clone; clones share the route table.
pub struct Multiplexer<T> {
    transport: Arc<T>,
    config: MultiplexerConfig,
    table: Arc<RouteTable>,
}

impl<T> Clone for Multiplexer<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
            table: Arc::clone(&self.table),
        }
    }
}

impl<T: Transport> Multiplexer<T> {
    /// Creates a multiplexer over `transport`.
    pub fn new(transport: Arc<T>, config: MultiplexerConfig) -> Self {
        Self {
            transport,
            config: config.validated(),
            table: Arc::new(RouteTable::default()),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Subscribes to `opcode`, registering with the transport only if no
    /// route for it exists yet.
    ///
    /// Must be called within a Tokio runtime: a new route spawns its pump.
    pub fn subscribe(&self, opcode: Opcode) -> Subscription {
        let mut routes = self.table.lock();
        let (route_id, rx) = match routes.get_mut(&opcode) {
            Some(route) => {
                route.subscribers += 1;
                (route.id, route.tx.subscribe())
            }
            None => {
                let id = self.table.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = broadcast::channel(self.config.channel_capacity);
                let inbound = self.transport.register(opcode);
                let pump = tokio::spawn(pump(
                    opcode,
                    id,
                    inbound,
                    tx.clone(),
                    Arc::downgrade(&self.table),
                ));
                routes.insert(
                    opcode,
                    Route {
                        id,
                        tx,
                        subscribers: 1,
                        pump,
                    },
                );
                debug!(%opcode, "route created");
                (id, rx)
            }
        };
        drop(routes);

        Subscription {
            opcode,
            route_id,
            rx,
            table: Arc::clone(&self.table),
        }
    }

    /// Subscribes to every opcode in `opcodes` and merges them into one
    /// stream. Order is preserved per opcode, not across opcodes.
    pub fn subscribe_many(&self, opcodes: &[Opcode]) -> TaggedStream {
        stream::select_all(
            opcodes
                .iter()
                .map(|&opcode| self.subscribe(opcode).into_tagged_stream().boxed()),
        )
    }

    /// Opcodes that currently have a route, ascending.
    pub fn active_routes(&self) -> Vec<Opcode> {
        let mut opcodes: Vec<Opcode> = self.table.lock().keys().copied().collect();
        opcodes.sort_unstable();
        opcodes
    }

    /// Live subscriptions for `opcode`.
    pub fn subscriber_count(&self, opcode: Opcode) -> usize {
        self.table
            .lock()
            .get(&opcode)
            .map(|route| route.subscribers)
            .unwrap_or(0)
    }
}

impl<T> std::fmt::Debug for Multiplexer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("config", &self.config)
            .field("routes", &self.table.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberlink_transport::MemoryTransport;

    fn mux() -> (Arc<MemoryTransport>, Multiplexer<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let mux = Multiplexer::new(Arc::clone(&transport), MultiplexerConfig::default());
        (transport, mux)
    }

    #[test]
    fn test_config_clamps_zero_capacity() {
        let config = MultiplexerConfig { channel_capacity: 0 }.validated();
        assert_eq!(config.channel_capacity, 1);
    }

    #[tokio::test]
    async fn test_same_opcode_shares_one_registration() {
        let (transport, mux) = mux();
        let _a = mux.subscribe(Opcode(0x96));
        let _b = mux.subscribe(Opcode(0x96));
        let _c = mux.subscribe(Opcode(0x96));

        assert_eq!(transport.registrations(Opcode(0x96)), 1);
        assert_eq!(mux.subscriber_count(Opcode(0x96)), 3);
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_each_payload() {
        let (transport, mux) = mux();
        let mut a = mux.subscribe(Opcode(1));
        let mut b = mux.subscribe(Opcode(1));

        transport.inject(Opcode(1), vec![9u8]);

        assert_eq!(a.recv().await.unwrap(), Bytes::from(vec![9u8]));
        assert_eq!(b.recv().await.unwrap(), Bytes::from(vec![9u8]));
    }

    #[tokio::test]
    async fn test_drop_last_subscription_removes_route() {
        let (_transport, mux) = mux();
        let a = mux.subscribe(Opcode(1));
        let b = mux.subscribe(Opcode(1));

        drop(a);
        assert_eq!(mux.active_routes(), vec![Opcode(1)]);
        drop(b);
        assert!(mux.active_routes().is_empty());
        assert_eq!(mux.subscriber_count(Opcode(1)), 0);
    }
}
