//! The event bus implementation.

use std::collections::HashMap;
use std::sync::Arc;

use banyan_types::Context;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::trace;

use crate::TypedEvent;

/// Shared event payload handed to every subscriber.
pub type EventPayload = Arc<dyn TypedEvent>;

/// Buffer capacity of every subscription sink.
pub const SINK_CAPACITY: usize = 16;

#[derive(Default)]
struct BusState {
    topics: HashMap<String, HashMap<u64, mpsc::Sender<EventPayload>>>,
    next_id: u64,
    closed: bool,
}

/// Topic-based pub/sub bus.
///
/// Cloning is cheap and every clone operates on the same topic table; the
/// kernel hands a clone to each component at registration time.
///
/// # Locking
///
/// A single readers-writer lock guards the topic table. Publishing
/// snapshots the subscriber set under the read lock and releases it before
/// delivering, so a slow subscriber never holds up writers.
#[derive(Clone, Default)]
pub struct EventBus {
    state: Arc<RwLock<BusState>>,
}

impl EventBus {
    /// Creates a new, open bus with no topics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to a topic.
    ///
    /// Returns a [`Subscription`] bundling a bounded receiver (capacity
    /// [`SINK_CAPACITY`]) with a cancel handle. If the bus is already
    /// closed the receiver is closed from the start and the handle is a
    /// no-op.
    #[must_use]
    pub fn subscribe(&self, topic: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(SINK_CAPACITY);

        let mut state = self.state.write();
        if state.closed {
            // Dropping the sender yields a pre-closed sink.
            drop(tx);
            return Subscription {
                receiver: Some(rx),
                handle: SubscriptionHandle {
                    state: Arc::clone(&self.state),
                    topic: topic.to_string(),
                    id: u64::MAX,
                },
            };
        }

        let id = state.next_id;
        state.next_id += 1;
        state
            .topics
            .entry(topic.to_string())
            .or_default()
            .insert(id, tx);

        Subscription {
            receiver: Some(rx),
            handle: SubscriptionHandle {
                state: Arc::clone(&self.state),
                topic: topic.to_string(),
                id,
            },
        }
    }

    /// Publishes an event to every subscriber of `topic`.
    ///
    /// Never blocks: each sink gets a `try_send`, and a full sink silently
    /// drops the event. Delivery aborts early if `ctx` is cancelled. On a
    /// closed bus this is a no-op.
    pub fn publish(&self, ctx: &Context, topic: &str, payload: EventPayload) {
        let senders: Vec<mpsc::Sender<EventPayload>> = {
            let state = self.state.read();
            if state.closed {
                return;
            }
            match state.topics.get(topic) {
                Some(subs) => subs.values().cloned().collect(),
                None => return,
            }
        };

        for tx in senders {
            if ctx.is_cancelled() {
                return;
            }
            if tx.try_send(Arc::clone(&payload)).is_err() {
                trace!(topic, event = payload.event_type(), "dropped event for slow or gone subscriber");
            }
        }
    }

    /// Closes the bus.
    ///
    /// Idempotent. Every open sink is closed and all topics are cleared;
    /// subsequent subscribes return closed sinks and subsequent publishes
    /// are no-ops.
    pub fn close(&self) {
        let mut state = self.state.write();
        if state.closed {
            return;
        }
        state.closed = true;
        // Dropping the senders closes every receiver.
        state.topics.clear();
    }

    /// Returns the number of live topics, for diagnostics and tests.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.state.read().topics.len()
    }

    /// Returns the number of subscribers on a topic.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.state.read().topics.get(topic).map_or(0, HashMap::len)
    }
}

/// A live subscription: bounded sink plus cancel handle.
///
/// Dropping the subscription cancels it. To consume the sink on a separate
/// task while keeping cancellation elsewhere, split it with
/// [`into_parts`](Self::into_parts).
pub struct Subscription {
    receiver: Option<mpsc::Receiver<EventPayload>>,
    handle: SubscriptionHandle,
}

impl Subscription {
    /// Receives the next event; `None` once the sink is closed and drained.
    pub async fn recv(&mut self) -> Option<EventPayload> {
        match self.receiver.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Attempts to receive without waiting.
    pub fn try_recv(&mut self) -> Option<EventPayload> {
        self.receiver.as_mut()?.try_recv().ok()
    }

    /// Detaches this subscription from its topic and closes the sink.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Returns a clone of the cancel handle.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Splits into the raw receiver and the cancel handle.
    ///
    /// After splitting, cancellation is explicit: dropping the receiver
    /// alone does not detach the topic entry.
    #[must_use]
    pub fn into_parts(mut self) -> (mpsc::Receiver<EventPayload>, SubscriptionHandle) {
        let rx = self
            .receiver
            .take()
            .expect("receiver present until into_parts");
        (rx, self.handle.clone())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Split subscriptions manage cancellation through their handle.
        if self.receiver.is_some() {
            self.handle.cancel();
        }
    }
}

/// Detaches a subscription from the bus.
///
/// Cancelling removes the sink from the topic (closing it) exactly once;
/// concurrent or repeated cancels are no-ops. When the last subscriber of
/// a topic cancels, the topic entry itself is removed.
#[derive(Clone)]
pub struct SubscriptionHandle {
    state: Arc<RwLock<BusState>>,
    topic: String,
    id: u64,
}

impl SubscriptionHandle {
    /// Cancels the subscription. Idempotent.
    pub fn cancel(&self) {
        let mut state = self.state.write();
        if let Some(subs) = state.topics.get_mut(&self.topic) {
            // Removing the sender closes the sink; first caller wins.
            if subs.remove(&self.id).is_some() && subs.is_empty() {
                state.topics.remove(&self.topic);
            }
        }
    }
}
