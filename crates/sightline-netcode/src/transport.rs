//! Transport trait for delivering replication messages
//!
//! The driver never opens sockets. Hosts implement [`Transport`] for their
//! network stack (UDP, WebSocket, etc.) and feed received payloads back in
//! as [`Incoming`] values. [`MemoryNetwork`] is an in-process implementation
//! for simulations and tests.

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sightline_core::{ConnectionId, TimeSource};
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::sync::Arc;

/// Delivery channel, keyed by a small integer id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Channel {
    /// Guaranteed delivery, ordered
    #[default]
    Reliable = 0,
    /// Best effort, may be dropped or reordered
    Unreliable = 1,
}

impl Channel {
    /// Wire id of the channel
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Channel for a wire id
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Channel::Reliable),
            1 => Some(Channel::Unreliable),
            _ => None,
        }
    }
}

/// A payload handed to the driver by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct Incoming {
    /// Sending connection
    pub from: ConnectionId,
    /// Sender's clock when the payload was sent
    pub remote_time: f64,
    /// Channel it arrived on
    pub channel: Channel,
    pub payload: Bytes,
}

/// Outbound half of a network stack
///
/// Implementations stamp each payload with the sender's clock; the receiving
/// side reports that stamp as [`Incoming::remote_time`].
pub trait Transport: Send {
    /// Error type for this transport
    type Error: std::error::Error + Send + Sync + 'static;

    /// Queue `payload` for delivery to `to` on `channel`
    fn send(&mut self, to: ConnectionId, channel: Channel, payload: Bytes)
        -> Result<(), Self::Error>;
}

type Mailboxes = HashMap<ConnectionId, VecDeque<Incoming>>;

/// In-process network connecting any number of [`MemoryTransport`] endpoints
///
/// Clones share the same mailboxes.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    mailboxes: Arc<Mutex<Mailboxes>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the endpoint for `local`, stamping sends with `clock`
    pub fn endpoint(&self, local: ConnectionId, clock: Arc<dyn TimeSource>) -> MemoryTransport {
        self.mailboxes.lock().entry(local).or_default();
        MemoryTransport {
            local,
            clock,
            network: self.clone(),
        }
    }

    /// Number of payloads waiting for `connection`
    pub fn pending(&self, connection: ConnectionId) -> usize {
        self.mailboxes.lock().get(&connection).map_or(0, VecDeque::len)
    }
}

/// One endpoint of a [`MemoryNetwork`]
///
/// Sends to a connection without an endpoint are silently dropped, like
/// packets to a peer that already left.
pub struct MemoryTransport {
    local: ConnectionId,
    clock: Arc<dyn TimeSource>,
    network: MemoryNetwork,
}

impl MemoryTransport {
    pub fn local(&self) -> ConnectionId {
        self.local
    }

    /// Take every payload delivered to this endpoint, oldest first
    pub fn poll(&self) -> Vec<Incoming> {
        self.network
            .mailboxes
            .lock()
            .get_mut(&self.local)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }
}

impl Transport for MemoryTransport {
    type Error = Infallible;

    fn send(
        &mut self,
        to: ConnectionId,
        channel: Channel,
        payload: Bytes,
    ) -> Result<(), Self::Error> {
        let incoming = Incoming {
            from: self.local,
            remote_time: self.clock.now(),
            channel,
            payload,
        };
        if let Some(queue) = self.network.mailboxes.lock().get_mut(&to) {
            queue.push_back(incoming);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_core::ManualClock;

    #[test]
    fn test_channel_ids() {
        assert_eq!(Channel::Reliable.id(), 0);
        assert_eq!(Channel::Unreliable.id(), 1);
        assert_eq!(Channel::from_id(1), Some(Channel::Unreliable));
        assert_eq!(Channel::from_id(7), None);
    }

    #[test]
    fn test_memory_delivery() {
        let clock = ManualClock::new(2.5);
        let network = MemoryNetwork::new();
        let mut server = network.endpoint(ConnectionId::SERVER, Arc::new(clock.clone()));
        let client = network.endpoint(ConnectionId(1), Arc::new(clock.clone()));

        server
            .send(ConnectionId(1), Channel::Unreliable, Bytes::from_static(b"hi"))
            .unwrap();
        // Nobody listens on 9
        server
            .send(ConnectionId(9), Channel::Reliable, Bytes::from_static(b"lost"))
            .unwrap();
        assert_eq!(network.pending(ConnectionId(1)), 1);

        let received = client.poll();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].from, ConnectionId::SERVER);
        assert_eq!(received[0].remote_time, 2.5);
        assert_eq!(received[0].channel, Channel::Unreliable);
        assert_eq!(&received[0].payload[..], b"hi");
        assert!(client.poll().is_empty());
    }
}
