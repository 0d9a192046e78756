//! The replication driver
//!
//! One [`ReplicationDriver`] runs per peer and is ticked from the host loop:
//!
//! - [`broadcast`](ReplicationDriver::broadcast) once per server tick (or
//!   client frame) sends state this peer is authoritative for
//! - [`receive`](ReplicationDriver::receive) for every payload the transport
//!   delivered since the last tick
//! - [`render`](ReplicationDriver::render) once per frame writes
//!   interpolated poses into the world
//!
//! On the server an interest strategy decides who receives what. A
//! client-authoritative entity flows from its owner to the server, which
//! plays it back and relays it to everyone else observing it.

use crate::events::{EventHub, ReplicationEvent, StatsHandle, Subscription};
use crate::message::{encode_teleport, Baseline, Message, SyncMessage};
use crate::receiver::TransformReceiver;
use crate::sender::{SendDecision, TransformSender};
use crate::settings::ReplicationSettings;
use crate::transport::{Channel, Incoming, Transport};
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use indexmap::IndexMap;
use log::{debug, trace, warn};
use sightline_core::{
    Authority, ConnectionId, EntityId, EntityRecord, Pose, Registry, RegistryMut, TimeSource,
};
use sightline_interest::{InterestManagement, ObserverSets, TickReport, VisibilityChange};
use sightline_snapshot::{
    BufferKey, BufferStats, Direction, Interpolation, SnapshotStore, Timeline,
};
use std::sync::Arc;

/// Which peer a driver runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Server,
    /// A client, identified by its own connection id
    Client(ConnectionId),
}

impl Side {
    /// Connection id this peer sends as
    pub fn local(self) -> ConnectionId {
        match self {
            Side::Server => ConnectionId::SERVER,
            Side::Client(id) => id,
        }
    }

    /// Direction of the buffers this peer fills from the network
    pub fn incoming_direction(self) -> Direction {
        match self {
            Side::Server => Direction::ServerHeld,
            Side::Client(_) => Direction::ClientHeld,
        }
    }
}

/// What one broadcast did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BroadcastReport {
    /// Interest tick result (server only)
    pub interest: TickReport,
    /// Sync messages handed to the transport
    pub sent: usize,
    /// Entities whose interval elapsed with nothing to send
    pub skipped: usize,
    /// Observer changes the host should turn into spawns and despawns
    pub visibility: Vec<VisibilityChange>,
}

/// Per-peer transform replication
pub struct ReplicationDriver<T: Transport> {
    side: Side,
    settings: ReplicationSettings,
    transport: T,
    clock: Arc<dyn TimeSource>,
    interest: Option<Box<dyn InterestManagement>>,
    observers: ObserverSets,
    senders: IndexMap<EntityId, TransformSender>,
    receivers: IndexMap<EntityId, TransformReceiver>,
    store: SnapshotStore,
    timelines: IndexMap<ConnectionId, Timeline>,
    events: EventHub,
    scratch: BytesMut,
}

impl<T: Transport> ReplicationDriver<T> {
    /// Create the server driver
    pub fn server(
        settings: ReplicationSettings,
        transport: T,
        clock: Arc<dyn TimeSource>,
        interest: Box<dyn InterestManagement>,
    ) -> Result<Self> {
        Self::new(Side::Server, settings, transport, clock, Some(interest))
    }

    /// Create the driver for the client connected as `local`
    pub fn client(
        settings: ReplicationSettings,
        transport: T,
        clock: Arc<dyn TimeSource>,
        local: ConnectionId,
    ) -> Result<Self> {
        Self::new(Side::Client(local), settings, transport, clock, None)
    }

    fn new(
        side: Side,
        settings: ReplicationSettings,
        transport: T,
        clock: Arc<dyn TimeSource>,
        interest: Option<Box<dyn InterestManagement>>,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            side,
            store: SnapshotStore::new(&settings.snapshot),
            settings,
            transport,
            clock,
            interest,
            observers: ObserverSets::new(),
            senders: IndexMap::new(),
            receivers: IndexMap::new(),
            timelines: IndexMap::new(),
            events: EventHub::new(),
            scratch: BytesMut::new(),
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn settings(&self) -> &ReplicationSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Current observer sets (empty on clients)
    pub fn observers(&self) -> &ObserverSets {
        &self.observers
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.store
    }

    /// Playback timeline for state coming from `source`
    pub fn timeline(&self, source: ConnectionId) -> Option<&Timeline> {
        self.timelines.get(&source)
    }

    /// Stats of the buffer fed by the network for `entity`
    pub fn buffer_stats(&self, entity: EntityId) -> Option<BufferStats> {
        let key = BufferKey::new(entity, self.side.incoming_direction());
        self.store.get(key).map(|buffer| buffer.stats())
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Listen to replication events until the subscription is dropped
    pub fn subscribe(
        &self,
        listener: impl FnMut(&ReplicationEvent) + Send + 'static,
    ) -> Subscription {
        self.events.subscribe(listener)
    }

    /// Count replication events until the handle is dropped
    pub fn track_stats(&self) -> StatsHandle {
        self.events.track_stats()
    }

    /// Whether this peer sends state for `record`
    ///
    /// The server sends everything, relaying client-authoritative entities;
    /// a client only sends the client-authoritative entities it owns.
    pub fn is_authority(&self, record: &EntityRecord) -> bool {
        match self.side {
            Side::Server => true,
            Side::Client(local) => {
                record.authority == Authority::Client && record.owner == Some(local)
            }
        }
    }

    /// Whether this peer renders `record` from buffered snapshots instead of
    /// owning its live pose
    fn plays_back(&self, record: &EntityRecord) -> bool {
        match self.side {
            Side::Server => record.is_client_authoritative(),
            Side::Client(_) => !self.is_authority(record),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// A replicated entity was spawned
    pub fn register(&mut self, entity: EntityId, registry: &dyn Registry) {
        if let Some(interest) = self.interest.as_mut() {
            interest.on_spawned(entity, registry);
        }
    }

    /// A replicated entity was despawned
    ///
    /// Its observers show up as removed in the next broadcast report.
    pub fn unregister(&mut self, entity: EntityId) {
        if let Some(interest) = self.interest.as_mut() {
            interest.on_destroyed(entity);
        }
        self.observers.remove_entity(entity);
        self.store.remove_entity(entity);
        self.senders.shift_remove(&entity);
        self.receivers.shift_remove(&entity);
    }

    /// Hand `entity` over to a new authority
    ///
    /// Every peer calls this when ownership changes. Buffered snapshots and
    /// decoder state for the entity are dropped and its send baseline
    /// restarts, so whoever drives it now sends a full message on the next
    /// broadcast. On the server that full message also reaches a former
    /// client owner, which has no baseline to decode deltas against.
    pub fn set_authority<R>(
        &mut self,
        entity: EntityId,
        authority: Authority,
        owner: Option<ConnectionId>,
        registry: &mut R,
    ) -> Result<()>
    where
        R: RegistryMut + ?Sized,
    {
        registry.set_authority(entity, authority, owner)?;
        self.receivers.shift_remove(&entity);
        self.senders.shift_remove(&entity);
        self.store
            .reset(BufferKey::new(entity, Direction::ServerHeld));
        self.store
            .reset(BufferKey::new(entity, Direction::ClientHeld));
        debug!("{} authority -> {:?} (owner {:?})", entity, authority, owner);
        Ok(())
    }

    /// A connection went away
    pub fn disconnect(&mut self, connection: ConnectionId) {
        self.observers.remove_connection(connection);
        self.timelines.shift_remove(&connection);

        let direction = self.side.incoming_direction();
        let store = &mut self.store;
        self.receivers.retain(|entity, receiver| {
            let keep = receiver.source() != connection;
            if !keep {
                store.remove(BufferKey::new(*entity, direction));
            }
            keep
        });
    }

    // ========================================================================
    // Broadcast
    // ========================================================================

    /// Send state for every entity this peer is authoritative for
    pub fn broadcast(&mut self, registry: &dyn Registry) -> Result<BroadcastReport> {
        let now = self.clock.now();
        let channel = self.settings.channel;
        let mut report = BroadcastReport::default();

        if let Some(interest) = self.interest.as_mut() {
            report.interest = interest.tick(now, registry, &mut self.observers);
            report.visibility = self.observers.drain_changes();
        }
        for change in &report.visibility {
            self.send_initial(change, registry)?;
        }

        for record in registry.entities() {
            if !self.is_authority(record) {
                continue;
            }
            let sender = self.senders.entry(record.id).or_default();
            match sender.tick(record.id, now, &record.pose, &self.settings) {
                SendDecision::Wait => {}
                SendDecision::Skip => {
                    report.skipped += 1;
                    self.events
                        .emit(ReplicationEvent::Skipped { entity: record.id });
                }
                SendDecision::Send { message, baseline } => {
                    let recipients = self.recipients(record);
                    let payload = self.encode(&message, &baseline);
                    for to in recipients {
                        self.send(to, channel, payload.clone(), &message)?;
                        report.sent += 1;
                    }
                }
            }
        }
        Ok(report)
    }

    /// Bring newly added observers up to the shared baseline
    fn send_initial(&mut self, change: &VisibilityChange, registry: &dyn Registry) -> Result<()> {
        if change.added.is_empty() {
            return Ok(());
        }
        let Some(message) = self
            .senders
            .get(&change.entity)
            .and_then(|sender| sender.initial_message(change.entity, &self.settings))
        else {
            return Ok(());
        };
        let owner = registry
            .entity(change.entity)
            .filter(|record| record.authority == Authority::Client)
            .and_then(|record| record.owner);

        let channel = self.settings.channel;
        let payload = self.encode(&message, &Baseline::default());
        for &to in &change.added {
            if Some(to) != owner {
                self.send(to, channel, payload.clone(), &message)?;
            }
        }
        Ok(())
    }

    /// Connections that should receive state for `record` from this peer
    fn recipients(&self, record: &EntityRecord) -> Vec<ConnectionId> {
        match self.side {
            Side::Server => {
                let owner = match record.authority {
                    Authority::Client => record.owner,
                    Authority::Server => None,
                };
                let mut recipients: Vec<_> = self
                    .observers
                    .observers_of(record.id)
                    .filter(|connection| Some(*connection) != owner)
                    .collect();
                recipients.sort();
                recipients
            }
            Side::Client(_) => vec![ConnectionId::SERVER],
        }
    }

    fn encode(&mut self, message: &SyncMessage, baseline: &Baseline) -> Bytes {
        self.scratch.clear();
        message.encode(&mut self.scratch, baseline, self.settings.compress_rotation);
        self.scratch.split().freeze()
    }

    fn send(
        &mut self,
        to: ConnectionId,
        channel: Channel,
        payload: Bytes,
        message: &SyncMessage,
    ) -> Result<()> {
        let bytes = payload.len();
        self.transport
            .send(to, channel, payload)
            .map_err(|e| Error::Transport(e.to_string()))?;
        trace!(
            "{} -> {}: {} bytes{}",
            message.entity,
            to,
            bytes,
            if message.full { " (full)" } else { "" }
        );
        self.events.emit(ReplicationEvent::Sent {
            entity: message.entity,
            to,
            bytes,
            full: message.full,
        });
        Ok(())
    }

    // ========================================================================
    // Receive
    // ========================================================================

    /// Decode one payload from the transport and buffer or apply it
    ///
    /// Malformed payloads and state from peers without authority are
    /// dropped with an error; nothing is buffered for them.
    pub fn receive<R>(&mut self, incoming: &Incoming, registry: &mut R) -> Result<()>
    where
        R: RegistryMut + ?Sized,
    {
        let receivers = &self.receivers;
        let message = Message::decode(&incoming.payload, |entity| {
            receivers.get(&entity).and_then(TransformReceiver::baseline)
        })
        .inspect_err(|err| warn!("Dropping message from {}: {}", incoming.from, err))?;

        let entity = message.entity();
        let record = registry
            .entity(entity)
            .ok_or(sightline_core::Error::EntityNotFound(entity))?;
        if !self.accepts(record, incoming.from) {
            warn!("Dropping state for {} from {}", entity, incoming.from);
            return Err(Error::NotAuthoritative {
                entity,
                from: incoming.from,
            });
        }
        let live = record.pose;

        match message {
            Message::Sync(sync) => self.receive_sync(incoming, &sync, &live),
            Message::Teleport { entity, pose } => {
                self.apply_teleport(entity, pose, registry)?;
                if self.side == Side::Server {
                    // Relay the owner's teleport as is
                    let recipients = match registry.entity(entity) {
                        Some(record) => self.recipients(record),
                        None => Vec::new(),
                    };
                    for to in recipients {
                        self.transport
                            .send(to, Channel::Reliable, incoming.payload.clone())
                            .map_err(|e| Error::Transport(e.to_string()))?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Whether state for `record` from `from` is accepted here
    fn accepts(&self, record: &EntityRecord, from: ConnectionId) -> bool {
        match self.side {
            Side::Server => record.authority == Authority::Client && record.owner == Some(from),
            Side::Client(_) => from == ConnectionId::SERVER && !self.is_authority(record),
        }
    }

    fn receive_sync(&mut self, incoming: &Incoming, sync: &SyncMessage, live: &Pose) -> Result<()> {
        let now = self.clock.now();
        let key = BufferKey::new(sync.entity, self.side.incoming_direction());

        let receiver = self
            .receivers
            .entry(sync.entity)
            .or_insert_with(|| TransformReceiver::new(incoming.from));
        receiver.set_source(incoming.from);

        let settings = &self.settings;
        self.timelines
            .entry(incoming.from)
            .or_insert_with(|| Timeline::new(settings.send_interval, &settings.snapshot))
            .insert_and_adjust(incoming.remote_time, now);

        let buffer = self.store.buffer_mut(key);
        let outcome = receiver.receive(buffer, sync, incoming.remote_time, now, live, settings);

        if let Some(gap) = outcome.corrected {
            self.events.emit(ReplicationEvent::Corrected {
                entity: sync.entity,
                gap,
            });
        }
        self.events.emit(ReplicationEvent::Received {
            entity: sync.entity,
            from: incoming.from,
            bytes: incoming.payload.len(),
        });
        Ok(())
    }

    // ========================================================================
    // Render
    // ========================================================================

    /// Advance playback by `delta_time` and write interpolated poses
    ///
    /// Entities this peer drives itself are never written. Returns how many
    /// entities were updated.
    pub fn render<R>(&mut self, delta_time: f64, registry: &mut R) -> Result<usize>
    where
        R: RegistryMut + ?Sized,
    {
        for timeline in self.timelines.values_mut() {
            timeline.advance(delta_time);
        }

        let direction = self.side.incoming_direction();
        let mut updated = 0;
        for (&entity, receiver) in &self.receivers {
            let Some(record) = registry.entity(entity) else {
                continue;
            };
            if !self.plays_back(record) {
                continue;
            }
            let Some(timeline) = self.timelines.get(&receiver.source()) else {
                continue;
            };
            let buffer = self.store.buffer_mut(BufferKey::new(entity, direction));
            let Some(step) = buffer.step_interpolation(timeline.local_time()) else {
                continue;
            };
            let pose = blend(&self.settings, &record.pose, &step);
            registry.set_pose(entity, pose)?;
            updated += 1;
        }
        Ok(updated)
    }

    // ========================================================================
    // Teleport
    // ========================================================================

    /// Move an entity this peer is authoritative for without interpolation
    pub fn teleport<R>(&mut self, entity: EntityId, pose: Pose, registry: &mut R) -> Result<()>
    where
        R: RegistryMut + ?Sized,
    {
        let record = registry
            .entity(entity)
            .ok_or(sightline_core::Error::EntityNotFound(entity))?;
        if !self.is_authority(record) {
            return Err(Error::NotAuthoritative {
                entity,
                from: self.side.local(),
            });
        }
        let recipients = self.recipients(record);

        self.apply_teleport(entity, pose, registry)?;

        self.scratch.clear();
        encode_teleport(&mut self.scratch, entity, &pose);
        let payload = self.scratch.split().freeze();
        for to in recipients {
            self.transport
                .send(to, Channel::Reliable, payload.clone())
                .map_err(|e| Error::Transport(e.to_string()))?;
        }
        Ok(())
    }

    fn apply_teleport<R>(&mut self, entity: EntityId, pose: Pose, registry: &mut R) -> Result<()>
    where
        R: RegistryMut + ?Sized,
    {
        self.store
            .reset(BufferKey::new(entity, Direction::ServerHeld));
        self.store
            .reset(BufferKey::new(entity, Direction::ClientHeld));
        registry.set_pose(entity, pose)?;
        debug!("{} teleported to {}", entity, pose.position);
        self.events.emit(ReplicationEvent::Teleported { entity });
        Ok(())
    }
}

/// Pick each pose component from the live pose, the interpolated value or
/// the `to` endpoint according to the sync and interpolate toggles
fn blend(settings: &ReplicationSettings, live: &Pose, step: &Interpolation) -> Pose {
    let interpolated = step.snapshot();
    let target = step.to;
    Pose {
        position: match (settings.sync_position, settings.interpolate_position) {
            (false, _) => live.position,
            (true, true) => interpolated.position,
            (true, false) => target.position,
        },
        rotation: match (settings.sync_rotation, settings.interpolate_rotation) {
            (false, _) => live.rotation,
            (true, true) => interpolated.rotation,
            (true, false) => target.rotation,
        },
        scale: match (settings.sync_scale, settings.interpolate_scale) {
            (false, _) => live.scale,
            (true, true) => interpolated.scale,
            (true, false) => target.scale,
        },
    }
}

impl<T: Transport> std::fmt::Debug for ReplicationDriver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationDriver")
            .field("side", &self.side)
            .field("senders", &self.senders.len())
            .field("receivers", &self.receivers.len())
            .field("buffers", &self.store.len())
            .field("timelines", &self.timelines.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryNetwork, MemoryTransport};
    use sightline_core::{ConnectionRecord, ManualClock, RegistryMut, Vec3, World};
    use sightline_interest::DistanceInterest;

    fn server(clock: &ManualClock, network: &MemoryNetwork) -> ReplicationDriver<MemoryTransport> {
        let clock: Arc<dyn TimeSource> = Arc::new(clock.clone());
        let transport = network.endpoint(ConnectionId::SERVER, Arc::clone(&clock));
        ReplicationDriver::server(
            ReplicationSettings::default(),
            transport,
            clock,
            Box::new(DistanceInterest::new(100.0, 0.0)),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let network = MemoryNetwork::new();
        let clock: Arc<dyn TimeSource> = Arc::new(ManualClock::new(0.0));
        let settings = ReplicationSettings {
            channel: Channel::Unreliable,
            ..Default::default()
        };
        let transport = network.endpoint(ConnectionId(1), Arc::clone(&clock));
        let result = ReplicationDriver::client(settings, transport, clock, ConnectionId(1));
        assert!(matches!(result, Err(Error::InvalidSettings(_))));
    }

    #[test]
    fn test_client_authority() {
        let network = MemoryNetwork::new();
        let clock: Arc<dyn TimeSource> = Arc::new(ManualClock::new(0.0));
        let transport = network.endpoint(ConnectionId(1), Arc::clone(&clock));
        let driver = ReplicationDriver::client(
            ReplicationSettings::default(),
            transport,
            clock,
            ConnectionId(1),
        )
        .unwrap();

        let mine = EntityRecord::new(EntityId(1), Pose::IDENTITY)
            .with_authority(Authority::Client)
            .with_owner(ConnectionId(1));
        let theirs = EntityRecord::new(EntityId(2), Pose::IDENTITY)
            .with_authority(Authority::Client)
            .with_owner(ConnectionId(2));
        let servers = EntityRecord::new(EntityId(3), Pose::IDENTITY);
        assert!(driver.is_authority(&mine));
        assert!(!driver.is_authority(&theirs));
        assert!(!driver.is_authority(&servers));
    }

    #[test]
    fn test_server_skips_unobserved_and_counts() {
        let clock = ManualClock::new(0.0);
        let network = MemoryNetwork::new();
        let mut driver = server(&clock, &network);
        let stats = driver.track_stats();

        let mut world = World::new();
        let crate_box = world.entities.spawn(Pose::IDENTITY).id;
        driver.register(crate_box, &world);

        // Nobody is connected: the first full send has no recipients
        let report = driver.broadcast(&world).unwrap();
        assert_eq!(report.sent, 0);
        assert_eq!(stats.snapshot().messages_sent, 0);

        // A player connects next to it and gets the initial state
        let _endpoint = network.endpoint(ConnectionId(1), Arc::new(clock.clone()));
        let player = world.entities.spawn(Pose::at(Vec3::X)).id;
        world
            .connections
            .insert(ConnectionRecord::new(ConnectionId(1)).controlling(player));
        driver.register(player, &world);
        clock.advance(1.0);

        let report = driver.broadcast(&world).unwrap();
        assert_eq!(report.visibility.len(), 2);
        // Initial state for the crate, then confirm crate + first full player
        assert_eq!(network.pending(ConnectionId(1)), 3);
        assert_eq!(stats.snapshot().full_messages_sent, 2);
    }

    #[test]
    fn test_handoff_stops_playback_over_owner() {
        let network = MemoryNetwork::new();
        let clock: Arc<dyn TimeSource> = Arc::new(ManualClock::new(0.0));
        let transport = network.endpoint(ConnectionId(1), Arc::clone(&clock));
        let mut driver = ReplicationDriver::client(
            ReplicationSettings::default(),
            transport,
            clock,
            ConnectionId(1),
        )
        .unwrap();
        let mut world = World::new();
        let id = world.entities.spawn(Pose::IDENTITY).id;

        let sync = SyncMessage {
            entity: id,
            full: true,
            position: Some(sightline_codec::QuantizedVec3::new(300, 0, 0)),
            rotation: Some(sightline_core::Quat::IDENTITY),
            scale: None,
        };
        let mut payload = BytesMut::new();
        sync.encode(&mut payload, &Baseline::default(), true);
        let incoming = Incoming {
            from: ConnectionId::SERVER,
            remote_time: 0.0,
            channel: Channel::Reliable,
            payload: payload.freeze(),
        };
        driver.receive(&incoming, &mut world).unwrap();
        assert_eq!(driver.render(0.01, &mut world).unwrap(), 1);
        assert!((world.entities.get(id).unwrap().pose.position.x - 3.0).abs() < 1e-5);

        driver
            .set_authority(id, Authority::Client, Some(ConnectionId(1)), &mut world)
            .unwrap();
        assert!(driver.is_authority(world.entities.get(id).unwrap()));
        assert_eq!(driver.buffer_stats(id).map(|s| s.count), Some(0));

        world.set_pose(id, Pose::at(Vec3::new(50.0, 0.0, 0.0))).unwrap();
        assert_eq!(driver.render(0.01, &mut world).unwrap(), 0);
        assert_eq!(world.entities.get(id).unwrap().pose.position.x, 50.0);

        // Stale state from the server is refused from now on
        let stale = driver.receive(&incoming, &mut world);
        assert!(matches!(stale, Err(Error::NotAuthoritative { .. })));
    }

    #[test]
    fn test_teleport_requires_authority() {
        let clock = ManualClock::new(0.0);
        let network = MemoryNetwork::new();
        let mut driver = server(&clock, &network);
        let mut world = World::new();
        let id = world.entities.spawn(Pose::IDENTITY).id;

        driver
            .teleport(id, Pose::at(Vec3::new(50.0, 0.0, 0.0)), &mut world)
            .unwrap();
        assert_eq!(world.entities.get(id).unwrap().pose.position.x, 50.0);

        let missing = driver.teleport(EntityId(99), Pose::IDENTITY, &mut world);
        assert!(matches!(missing, Err(Error::Core(_))));
    }
}
