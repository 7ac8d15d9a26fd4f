//! # Event bus for supervisor lifecycle events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. The process
//! controller, the escalator and the supervisor publish into it; the
//! supervisor's listener forwards every event to the
//! [`SubscriberSet`](crate::SubscriberSet).
//!
//! ```text
//! ProcessController ──┐
//! Escalator         ──┼──► Bus ──► listener ──► SubscriberSet ──► Subscribe::on_event
//! Supervisor        ──┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks.
//! - Slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - Events published with no receiver are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for supervisor events.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver for events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
