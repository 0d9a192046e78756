//! Replication events and scoped subscriptions
//!
//! Listeners are registered with [`EventHub::subscribe`] and stay registered
//! for as long as the returned [`Subscription`] lives. Dropping it removes
//! the listener; there is no explicit unsubscribe.
//!
//! Listeners run synchronously on the thread that drives the replication
//! tick and must not subscribe or drop subscriptions from inside the
//! callback.

use parking_lot::Mutex;
use sightline_core::{ConnectionId, EntityId};
use std::sync::{Arc, Weak};

/// Something the replication driver did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplicationEvent {
    /// A sync message left for one connection
    Sent {
        entity: EntityId,
        to: ConnectionId,
        bytes: usize,
        full: bool,
    },
    /// A sync message was decoded and buffered
    Received {
        entity: EntityId,
        from: ConnectionId,
        bytes: usize,
    },
    /// A send interval passed with nothing worth sending
    Skipped { entity: EntityId },
    /// A stale buffer was rewritten before inserting
    Corrected { entity: EntityId, gap: f64 },
    /// An entity jumped without interpolation
    Teleported { entity: EntityId },
}

type Listener = Box<dyn FnMut(&ReplicationEvent) + Send>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Fan-out point for [`ReplicationEvent`]s
#[derive(Clone, Default)]
pub struct EventHub {
    listeners: Arc<Mutex<Listeners>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener until the returned guard is dropped
    #[must_use = "dropping the subscription unregisters the listener"]
    pub fn subscribe(
        &self,
        listener: impl FnMut(&ReplicationEvent) + Send + 'static,
    ) -> Subscription {
        let mut listeners = self.listeners.lock();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Box::new(listener)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Register a [`ReplicationStats`] counter
    #[must_use = "dropping the handle stops counting"]
    pub fn track_stats(&self) -> StatsHandle {
        let stats = Arc::new(Mutex::new(ReplicationStats::default()));
        let sink = Arc::clone(&stats);
        let subscription = self.subscribe(move |event| sink.lock().record(event));
        StatsHandle {
            stats,
            _subscription: subscription,
        }
    }

    /// Deliver an event to every listener, in subscription order
    pub fn emit(&self, event: ReplicationEvent) {
        let mut listeners = self.listeners.lock();
        for (_, listener) in listeners.entries.iter_mut() {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Keeps a listener registered; dropping it unregisters
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().entries.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Running totals over replication events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicationStats {
    pub messages_sent: u64,
    pub full_messages_sent: u64,
    pub bytes_sent: u64,
    pub messages_received: u64,
    pub bytes_received: u64,
    pub skipped: u64,
    pub corrections: u64,
    pub teleports: u64,
}

impl ReplicationStats {
    /// Fold one event into the totals
    pub fn record(&mut self, event: &ReplicationEvent) {
        match *event {
            ReplicationEvent::Sent { bytes, full, .. } => {
                self.messages_sent += 1;
                self.bytes_sent += bytes as u64;
                if full {
                    self.full_messages_sent += 1;
                }
            }
            ReplicationEvent::Received { bytes, .. } => {
                self.messages_received += 1;
                self.bytes_received += bytes as u64;
            }
            ReplicationEvent::Skipped { .. } => self.skipped += 1,
            ReplicationEvent::Corrected { .. } => self.corrections += 1,
            ReplicationEvent::Teleported { .. } => self.teleports += 1,
        }
    }

    /// Mean payload size of sent messages
    pub fn average_sent_bytes(&self) -> f64 {
        if self.messages_sent == 0 {
            0.0
        } else {
            self.bytes_sent as f64 / self.messages_sent as f64
        }
    }
}

/// Live [`ReplicationStats`] fed by a subscription
#[derive(Debug)]
pub struct StatsHandle {
    stats: Arc<Mutex<ReplicationStats>>,
    _subscription: Subscription,
}

impl StatsHandle {
    /// Current totals
    pub fn snapshot(&self) -> ReplicationStats {
        *self.stats.lock()
    }

    /// Zero the totals
    pub fn reset(&self) {
        *self.stats.lock() = ReplicationStats::default();
    }
}
