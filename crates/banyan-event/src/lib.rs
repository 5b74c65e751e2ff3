//! Topic-based event bus with non-blocking fan-out.
//!
//! The bus routes typed events from publishers to subscribers by topic
//! string. Delivery is deliberately lightweight:
//!
//! ```text
//! ┌───────────┐ publish("t", e)  ┌──────────────────────────┐
//! │ Publisher │ ───────────────► │ EventBus                 │
//! └───────────┘                  │  topics: t -> {s1, s2}   │
//!                                └─────┬──────────────┬─────┘
//!                             try_send │     try_send │  (drop if full)
//!                                      ▼              ▼
//!                                ┌──────────┐   ┌──────────┐
//!                                │ sink s1  │   │ sink s2  │  capacity 16
//!                                └──────────┘   └──────────┘
//! ```
//!
//! # Delivery Semantics
//!
//! - Publishers never block on subscribers: a full sink drops the event
//!   (slow-subscriber protection).
//! - No ordering across topics. Within a topic, a sink that receives two
//!   events from the same publisher receives them in publish order, but it
//!   may miss either to a full-buffer drop.
//! - Delivery is best-effort and in-process only; nothing is persisted.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use banyan_event::{EventBus, TypedEvent};
//! use banyan_types::Context;
//!
//! #[derive(Debug)]
//! struct Ping;
//!
//! impl TypedEvent for Ping {
//!     fn event_type(&self) -> &str { "ping" }
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let bus = EventBus::new();
//! let mut sub = bus.subscribe("health");
//!
//! bus.publish(&Context::new(), "health", Arc::new(Ping));
//! let event = sub.recv().await.expect("delivered");
//! assert_eq!(event.event_type(), "ping");
//! # });
//! ```

pub mod bus;

pub use bus::{EventBus, EventPayload, Subscription, SubscriptionHandle, SINK_CAPACITY};

/// A payload that can name its own event type.
///
/// The bus does not inspect payloads beyond this accessor; routing is by
/// topic, and `event_type` exists for logging, filtering, and permission
/// derivation (`core.events.publish.<type>`).
pub trait TypedEvent: Send + Sync + std::fmt::Debug {
    /// Returns a stable string identifier for this event type.
    fn event_type(&self) -> &str;
}
