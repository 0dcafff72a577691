//! Stateless views over subsystem event channels.
//!
//! Subsystems publish events on a `broadcast` channel. These helpers turn a
//! receiver into a [`Stream`] and then filter, project or merge streams.
//! None of them keep state of their own.

use std::future;

use futures_util::stream::{self, Stream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

/// Adapts a broadcast receiver into a stream that ends when the sender is
/// gone. A lagging receiver logs and skips ahead.
pub fn broadcast_stream<T>(rx: broadcast::Receiver<T>) -> impl Stream<Item = T> + Send + 'static
where
    T: Clone + Send + 'static,
{
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(item) => return Some((item, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event view lagging, skipping ahead");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

/// Items of `source` for which `keep` returns `true`.
pub fn filtered<S, F>(source: S, mut keep: F) -> impl Stream<Item = S::Item> + Send
where
    S: Stream + Send,
    S::Item: Send,
    F: FnMut(&S::Item) -> bool + Send,
{
    source.filter(move |item| future::ready(keep(item)))
}

/// `project` applied to every item, dropping the `None`s.
pub fn projected<S, F, U>(source: S, project: F) -> impl Stream<Item = U> + Send
where
    S: Stream + Send,
    S::Item: Send,
    F: FnMut(S::Item) -> Option<U> + Send,
    U: Send,
{
    let mut project = project;
    source.filter_map(move |item| future::ready(project(item)))
}

/// Items from either stream as they arrive. Ends when both have ended.
pub fn merged<A, B>(a: A, b: B) -> impl Stream<Item = A::Item> + Send
where
    A: Stream + Send,
    B: Stream<Item = A::Item> + Send,
{
    stream::select(a, b)
}
